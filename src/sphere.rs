//! Analytic sphere resting on the sample surface.

use glam::DVec3;

use crate::error::GeometryError;
use crate::geometry;
use crate::material::Scattering;

/// A sphere defined analytically rather than by triangulation.
///
/// Used for the `sphere` sample type: a single ball sitting on the flat
/// sample at the scan origin. Absence is modelled by the scene holding
/// `None`, which removes the sphere from every intersection test.
#[derive(Debug, Clone, Copy)]
pub struct AnalytSphere {
    /// Centre position.
    pub centre: DVec3,
    /// Radius, strictly positive.
    pub radius: f64,
    /// Scattering law of the whole surface.
    pub scattering: Scattering,
}

impl AnalytSphere {
    /// Validated constructor.
    pub fn new(centre: DVec3, radius: f64, scattering: Scattering) -> Result<Self, GeometryError> {
        if radius <= 0.0 || !radius.is_finite() {
            return Err(GeometryError::NonPositiveRadius(radius));
        }
        Ok(Self {
            centre,
            radius,
            scattering,
        })
    }

    /// Distance along the ray to the sphere, if hit.
    #[inline]
    pub fn intersect(&self, position: DVec3, direction: DVec3) -> Option<f64> {
        geometry::ray_sphere(position, direction, self.centre, self.radius)
    }

    /// Outward unit normal at a point on the surface.
    #[inline]
    pub fn normal_at(&self, point: DVec3) -> DVec3 {
        ((point - self.centre) / self.radius).normalize()
    }

    /// Copy shifted by `offset`; the sphere travels with the sample.
    pub fn translated(&self, offset: DVec3) -> Self {
        Self {
            centre: self.centre + offset,
            ..*self
        }
    }
}
