//! The immutable scene and its per-pixel translated views.

use glam::DVec3;

use crate::plate::{Aperture, BackWall};
use crate::sphere::AnalytSphere;
use crate::surface::TriangleSurface;

/// Identifies which surface a ray last touched.
///
/// Stored on the ray as a small value (never a reference into the scene) so
/// the next intersection test can suppress the facet just scattered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceId {
    /// The triangulated sample mesh.
    Sample,
    /// The pinhole plate (mesh or back wall).
    Plate,
    /// The analytic sphere.
    Sphere,
}

/// Physical model of the pinhole plate.
///
/// Either a triangulated mesh of the real plate or the simple back-wall
/// disc. The detector apertures live on the scene, not here: with a mesh
/// plate the apertures are real holes in the mesh, and detection is still
/// decided by the analytic ellipse test on the plane y = 0.
#[derive(Debug, Clone)]
pub enum Plate {
    /// Full triangulated pinhole plate.
    Mesh(TriangleSurface),
    /// Flat-disc approximation.
    BackWall(BackWall),
}

/// Everything the intersection kernel needs, built once per run.
///
/// Read-only during tracing; per-pixel sample positioning goes through
/// [`Scene::at_offset`].
#[derive(Debug, Clone)]
pub struct Scene {
    /// The sample mesh in its scan-origin pose.
    pub sample: TriangleSurface,
    /// The pinhole plate.
    pub plate: Plate,
    /// Optional analytic sphere resting on the sample.
    pub sphere: Option<AnalytSphere>,
    /// Detector apertures, in detection-priority order. Aperture indices
    /// reported by the kernel are 1-based; 0 means no detection.
    pub apertures: Vec<Aperture>,
}

impl Scene {
    /// Number of detectors.
    pub fn detector_count(&self) -> usize {
        self.apertures.len()
    }

    /// View of the scene with the sample (and its sphere) translated by
    /// `offset`, sharing the plate and apertures.
    ///
    /// This is the per-pixel positioning mechanism: a cheap owned copy of
    /// the moving geometry, so workers never synchronise.
    pub fn at_offset(&self, offset: DVec3) -> PixelScene<'_> {
        PixelScene {
            sample: self.sample.translated(offset),
            sphere: self.sphere.map(|s| s.translated(offset)),
            plate: &self.plate,
            apertures: &self.apertures,
        }
    }
}

/// The scene as one pixel's rays see it.
#[derive(Debug)]
pub struct PixelScene<'a> {
    /// Sample mesh, already translated to this pixel's scan position.
    pub sample: TriangleSurface,
    /// Sphere translated along with the sample.
    pub sphere: Option<AnalytSphere>,
    /// Shared plate geometry.
    pub plate: &'a Plate,
    /// Shared aperture set.
    pub apertures: &'a [Aperture],
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Scattering;
    use glam::DVec2;

    #[test]
    fn offset_view_moves_sample_and_sphere() {
        let scene = Scene {
            sample: TriangleSurface::flat_square(2.0, -1.0, Scattering::Cosine),
            plate: Plate::BackWall(BackWall {
                radius: 3.0,
                plate_represent: true,
            }),
            sphere: Some(
                AnalytSphere::new(DVec3::new(0.0, -0.9, 0.0), 0.1, Scattering::Cosine).unwrap(),
            ),
            apertures: vec![Aperture::new(DVec2::new(1.0, 0.0), DVec2::ONE, 0).unwrap()],
        };
        let view = scene.at_offset(DVec3::new(0.25, 0.0, -0.5));
        let (a, ..) = view.sample.element(0);
        assert_eq!(a, DVec3::new(-0.75, -1.0, -1.5));
        assert_eq!(
            view.sphere.unwrap().centre,
            DVec3::new(0.25, -0.9, -0.5)
        );
        assert_eq!(view.apertures.len(), 1);
    }
}
