//! Per-ray state machine: alternate intersection and scattering until the
//! ray is detected, escapes, or exhausts its scatter budget.

use crate::diagnostics::Diagnostics;
use crate::intersect::nearest_hit;
use crate::random::RayRng;
use crate::ray::Ray;
use crate::scene::{PixelScene, SurfaceId};

/// Terminal outcome of one ray.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RayFate {
    /// Entered a detector aperture.
    Detected {
        /// 1-based aperture index.
        aperture: u32,
        /// Sample scattering events undergone, in [1, maxScatter].
        scatters: u32,
    },
    /// Left the scene without striking anything.
    Escaped,
    /// Would have exceeded the scatter budget.
    Killed,
}

/// Drive one ray to termination.
///
/// `plate_first` controls whether the plate participates in the very first
/// intersection test; a freshly emitted ray cannot re-strike the pinhole it
/// just left, so most configurations disable it.
///
/// The scatter count advances on sample and sphere events only; back-wall
/// bounces redirect the ray without moving the histogram index. A ray that
/// reaches an aperture without a single counted scatter is dropped from the
/// tallies and recorded in the diagnostics.
pub fn trace_ray(
    ray: &mut Ray,
    scene: &PixelScene<'_>,
    max_scatter: u32,
    plate_first: bool,
    rng: &mut RayRng,
    diag: &mut Diagnostics,
) -> RayFate {
    let mut first_flight = true;
    loop {
        debug_assert!(
            (ray.direction.length() - 1.0).abs() < crate::geometry::UNIT_TOL,
            "ray direction drifted off unit length"
        );
        let include_plate = plate_first || !first_flight;
        let hit = match nearest_hit(ray, scene, include_plate, diag) {
            Some(hit) => hit,
            None => return RayFate::Escaped,
        };
        first_flight = false;

        if hit.aperture > 0 {
            if ray.scatters == 0 {
                diag.zero_scatter_detections += 1;
                return RayFate::Escaped;
            }
            return RayFate::Detected {
                aperture: hit.aperture,
                scatters: ray.scatters,
            };
        }

        ray.position = hit.point;
        ray.on_surface = Some(hit.surface);
        ray.on_element = hit.element;

        if matches!(hit.surface, SurfaceId::Sample | SurfaceId::Sphere) {
            // A ray that already spent its budget dies instead of scattering
            // again; one that reaches the budget here still gets a final
            // flight towards a detector.
            if ray.scatters >= max_scatter {
                return RayFate::Killed;
            }
            ray.scatters += 1;
        }

        ray.direction = hit.scattering.scatter(ray.direction, hit.normal, rng, diag);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::material::Scattering;
    use crate::plate::{Aperture, BackWall};
    use crate::scene::{Plate, Scene};
    use crate::surface::TriangleSurface;
    use glam::{DVec2, DVec3};

    /// Flat specular sample 2.1 below the plate, detector centred where a
    /// 45-degree beam lands after one bounce.
    fn specular_scene() -> Scene {
        Scene {
            sample: TriangleSurface::flat_square(10.0, -2.1, Scattering::Specular),
            plate: Plate::BackWall(BackWall {
                radius: 4.0,
                plate_represent: true,
            }),
            sphere: None,
            apertures: vec![
                Aperture::new(DVec2::new(2.1, 0.0), DVec2::new(1.4, 1.0), 0).unwrap(),
            ],
        }
    }

    /// Pencil ray entering at 45 degrees, aimed at the scan origin.
    fn beam_ray() -> Ray {
        let dir = DVec3::new(1.0, -1.0, 0.0).normalize();
        Ray::new(DVec3::new(-2.1, 0.0, 0.0), dir)
    }

    #[test]
    fn single_specular_bounce_is_detected() {
        let scene = specular_scene();
        let view = scene.at_offset(DVec3::ZERO);
        let mut rng = RayRng::for_pixel(0, 0);
        let mut diag = Diagnostics::default();
        let mut ray = beam_ray();
        let fate = trace_ray(&mut ray, &view, 20, false, &mut rng, &mut diag);
        assert_eq!(
            fate,
            RayFate::Detected {
                aperture: 1,
                scatters: 1
            }
        );
        assert_eq!(diag.total(), 0);
    }

    #[test]
    fn ray_missing_everything_escapes() {
        let scene = specular_scene();
        let view = scene.at_offset(DVec3::ZERO);
        let mut rng = RayRng::for_pixel(0, 1);
        let mut diag = Diagnostics::default();
        let mut ray = Ray::new(DVec3::new(20.0, 1.0, 0.0), DVec3::X);
        assert_eq!(
            trace_ray(&mut ray, &view, 20, false, &mut rng, &mut diag),
            RayFate::Escaped
        );
    }

    #[test]
    fn zero_scatter_detection_is_dropped() {
        let scene = specular_scene();
        let view = scene.at_offset(DVec3::ZERO);
        let mut rng = RayRng::for_pixel(0, 2);
        let mut diag = Diagnostics::default();
        // Straight up through the aperture without touching the sample.
        let mut ray = Ray::new(DVec3::new(2.1, -1.0, 0.0), DVec3::Y);
        assert_eq!(
            trace_ray(&mut ray, &view, 20, true, &mut rng, &mut diag),
            RayFate::Escaped
        );
        assert_eq!(diag.zero_scatter_detections, 1);
    }

    /// Two facing specular walls trap a horizontal ray until the budget
    /// runs out.
    #[test]
    fn trench_exhausts_scatter_budget() {
        let wall = |x: f64, nx: f64| {
            TriangleSurface::new(
                vec![
                    DVec3::new(x, -10.0, -5.0),
                    DVec3::new(x, -10.0, 5.0),
                    DVec3::new(x, 10.0, 5.0),
                    DVec3::new(x, 10.0, -5.0),
                ],
                vec![[0, 1, 2], [0, 2, 3]],
                vec![DVec3::new(nx, 0.0, 0.0); 2],
                &[0, 0],
                &[0.0, 0.0],
            )
            .unwrap()
        };
        // Merge the two walls into one surface list by hand: left wall faces
        // +x, right wall faces -x.
        let left = wall(-1.0, 1.0);
        let right = wall(1.0, -1.0);
        let mut vertices = Vec::new();
        let mut faces = Vec::new();
        let mut normals = Vec::new();
        for s in [&left, &right] {
            let base = vertices.len();
            for j in 0..s.num_faces() {
                let (a, b, c, n) = s.element(j);
                vertices.extend([a, b, c]);
                faces.push([base + 3 * j, base + 3 * j + 1, base + 3 * j + 2]);
                normals.push(n);
            }
        }
        let n_faces = faces.len();
        let sample =
            TriangleSurface::new(vertices, faces, normals, &vec![0; n_faces], &vec![0.0; n_faces])
                .unwrap();

        let scene = Scene {
            sample,
            plate: Plate::BackWall(BackWall {
                radius: 4.0,
                plate_represent: false,
            }),
            sphere: None,
            apertures: vec![
                Aperture::new(DVec2::new(2.0, 0.0), DVec2::new(0.5, 0.5), 0).unwrap(),
            ],
        };
        let view = scene.at_offset(DVec3::ZERO);
        let mut rng = RayRng::for_pixel(0, 3);
        let mut diag = Diagnostics::default();
        let mut ray = Ray::new(DVec3::new(0.0, -1.0, 0.0), DVec3::X);
        let max_scatter = 20;
        assert_eq!(
            trace_ray(&mut ray, &view, max_scatter, false, &mut rng, &mut diag),
            RayFate::Killed
        );
        assert_eq!(ray.scatters, max_scatter);
    }

    #[test]
    fn detected_count_can_reach_the_budget() {
        // One specular bounce with a budget of exactly one must still detect.
        let scene = specular_scene();
        let view = scene.at_offset(DVec3::ZERO);
        let mut rng = RayRng::for_pixel(0, 4);
        let mut diag = Diagnostics::default();
        let mut ray = beam_ray();
        assert_eq!(
            trace_ray(&mut ray, &view, 1, false, &mut rng, &mut diag),
            RayFate::Detected {
                aperture: 1,
                scatters: 1
            }
        );
    }
}
