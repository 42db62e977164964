//! Monte Carlo ray-tracing simulation of a Scanning Helium Microscope.
//!
//! Neutral-atom trajectories are traced from a virtual pinhole source
//! through a scene of a triangulated sample, a pinhole plate carrying
//! detector apertures, and an optional analytic sphere. Per-pixel detection
//! tallies, binned by scatter count, form the output image.

#![warn(missing_docs)]
#![warn(rustdoc::broken_intra_doc_links)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod geometry;
pub mod intersect;
pub mod material;
pub mod output;
pub mod plate;
pub mod random;
pub mod ray;
pub mod scan;
pub mod scene;
pub mod source;
pub mod sphere;
pub mod surface;
pub mod trace;
