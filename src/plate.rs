//! Detector apertures and the analytic back-wall plate model.

use glam::{DVec2, DVec3};

use crate::error::GeometryError;

/// Outward normal of the back wall: the plate lies in the plane y = 0 and
/// faces the sample below it.
pub const BACK_WALL_NORMAL: DVec3 = DVec3::new(0.0, -1.0, 0.0);

/// An elliptic opening in the plate plane.
///
/// The centre is given in plate-local (x, z) coordinates and the axes are
/// *full* axes: the opening is x^2/(a/2)^2 + z^2/(b/2)^2 = 1.
#[derive(Debug, Clone, Copy)]
pub struct Aperture {
    /// Centre on the plate plane.
    pub centre: DVec2,
    /// Full axes (a, b) of the ellipse.
    pub axes: DVec2,
}

impl Aperture {
    /// Validated constructor; both axes must be strictly positive.
    pub fn new(centre: DVec2, axes: DVec2, index: usize) -> Result<Self, GeometryError> {
        if axes.x <= 0.0 || axes.y <= 0.0 {
            return Err(GeometryError::NonPositiveAxes {
                index,
                x: axes.x,
                z: axes.y,
            });
        }
        Ok(Self { centre, axes })
    }

    /// Whether the plate-plane point (x, z) lies strictly inside the opening.
    #[inline]
    pub fn contains(&self, x: f64, z: f64) -> bool {
        let dx = x - self.centre.x;
        let dz = z - self.centre.y;
        dx * dx / (0.25 * self.axes.x * self.axes.x) + dz * dz / (0.25 * self.axes.y * self.axes.y)
            < 1.0
    }
}

/// The simple analytic pinhole-plate model: a flat disc of the given radius
/// in the plane y = 0.
///
/// When `plate_represent` is set, rays striking the disc outside every
/// aperture scatter off it; otherwise they pass through as if the plate were
/// absent.
#[derive(Debug, Clone, Copy)]
pub struct BackWall {
    /// Radius of the plate disc.
    pub radius: f64,
    /// Whether the disc blocks (and scatters) rays that miss the apertures.
    pub plate_represent: bool,
}
