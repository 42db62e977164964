//! Error taxonomy for scene construction, configuration, and scan execution.

use thiserror::Error;

/// Fatal problems detected while validating geometry at scene construction.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// The per-face arrays (faces, normals, scattering ids, parameters) must
    /// all have the same length.
    #[error("mismatched per-face arrays: {faces} faces, {normals} normals, {materials} material entries")]
    MismatchedArrays {
        /// Number of faces supplied.
        faces: usize,
        /// Number of normals supplied.
        normals: usize,
        /// Number of material id / parameter entries supplied.
        materials: usize,
    },

    /// A face references a vertex that does not exist.
    #[error("face {face} references vertex {index}, but only {n_vertices} vertices exist")]
    IndexOutOfRange {
        /// Offending face.
        face: usize,
        /// Offending vertex index.
        index: usize,
        /// Number of vertices in the surface.
        n_vertices: usize,
    },

    /// A stored normal is not unit length.
    #[error("normal of face {face} is not unit length (|n| = {len})")]
    NonUnitNormal {
        /// Offending face.
        face: usize,
        /// Measured length.
        len: f64,
    },

    /// A face has (numerically) zero area.
    #[error("face {face} is degenerate (zero area)")]
    ZeroAreaFace {
        /// Offending face.
        face: usize,
    },

    /// A material id does not name a known scattering law.
    #[error("unknown scattering id {id}")]
    UnknownScattering {
        /// The unrecognised id.
        id: u32,
    },

    /// A scattering parameter is outside the law's valid range.
    #[error("invalid parameter {param} for scattering id {id}: {reason}")]
    InvalidScatteringParameter {
        /// Law id the parameter belongs to.
        id: u32,
        /// The rejected value.
        param: f64,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// Sphere radius must be strictly positive.
    #[error("sphere radius must be positive, got {0}")]
    NonPositiveRadius(f64),

    /// Aperture full axes must be strictly positive.
    #[error("aperture {index} has non-positive axes ({x}, {z})")]
    NonPositiveAxes {
        /// Offending aperture.
        index: usize,
        /// Full axis along x.
        x: f64,
        /// Full axis along z.
        z: f64,
    },
}

/// Fatal problems with the parameter file or contradictory settings.
///
/// All of these are reported before any tracing starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The parameter file could not be read.
    #[error("cannot read parameter file: {0}")]
    Io(#[from] std::io::Error),

    /// A non-comment line did not match `Key: Value`.
    #[error("line {line}: expected `Key: Value`, got `{text}`")]
    MalformedLine {
        /// 1-based line number.
        line: usize,
        /// The offending text.
        text: String,
    },

    /// A value failed to parse for a recognised key.
    #[error("invalid value `{value}` for `{key}`: {reason}")]
    InvalidValue {
        /// The parameter key.
        key: &'static str,
        /// The raw value text.
        value: String,
        /// Why parsing failed.
        reason: String,
    },

    /// A required parameter was never supplied.
    #[error("missing required parameter `{0}`")]
    MissingKey(&'static str),

    /// Two settings cannot both hold.
    #[error("contradictory settings: {0}")]
    Contradiction(String),

    /// A requested feature is outside what the binary supports.
    #[error("{0}")]
    Unsupported(String),

    /// Scene construction from the parsed settings failed.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

/// Failures of the Monte Carlo driver itself.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The cancel flag was raised; tallies are incomplete and discarded.
    #[error("scan cancelled before completion")]
    Cancelled,

    /// The scan grid has no pixels or a non-positive step.
    #[error("invalid scan grid: {0}")]
    InvalidGrid(String),
}
