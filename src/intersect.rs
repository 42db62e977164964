//! The intersection kernel: nearest forward hit of a ray against the scene.
//!
//! Candidates are evaluated in a fixed order (sample mesh, sphere, plate)
//! and compared by squared distance with strict inequality, so an exact tie
//! is won by the earlier candidate. This loop dominates the runtime of the
//! whole simulation.

use glam::DVec3;

use crate::diagnostics::Diagnostics;
use crate::geometry::{ray_triangle, TriangleTest};
use crate::material::Scattering;
use crate::plate::{Aperture, BACK_WALL_NORMAL};
use crate::ray::Ray;
use crate::scene::{PixelScene, Plate, SurfaceId};
use crate::surface::TriangleSurface;

/// Context of the nearest forward intersection.
#[derive(Debug, Clone, Copy)]
pub struct Hit {
    /// Squared distance from the ray origin.
    pub dist2: f64,
    /// Intersection point.
    pub point: DVec3,
    /// Outward unit normal at the point.
    pub normal: DVec3,
    /// Surface that was struck.
    pub surface: SurfaceId,
    /// Triangle index for mesh hits, `None` for the sphere and back wall.
    pub element: Option<usize>,
    /// 1-based index of the detector aperture entered, 0 if none.
    pub aperture: u32,
    /// Scattering law at the hit point.
    pub scattering: Scattering,
}

/// Nearest forward intersection of `ray` with the scene, if any.
///
/// `include_plate` disables candidate 3 on the very first flight step when
/// the configuration says a fresh ray cannot re-strike its own pinhole.
pub fn nearest_hit(
    ray: &Ray,
    scene: &PixelScene<'_>,
    include_plate: bool,
    diag: &mut Diagnostics,
) -> Option<Hit> {
    let mut best: Option<Hit> = None;
    let mut min_dist2 = f64::INFINITY;

    mesh_candidates(
        ray,
        &scene.sample,
        SurfaceId::Sample,
        &mut best,
        &mut min_dist2,
        diag,
    );

    if let Some(sphere) = &scene.sphere {
        if let Some(t) = sphere.intersect(ray.position, ray.direction) {
            let dist2 = t * t;
            if dist2 < min_dist2 {
                let point = ray.at(t);
                best = Some(Hit {
                    dist2,
                    point,
                    normal: sphere.normal_at(point),
                    surface: SurfaceId::Sphere,
                    element: None,
                    aperture: 0,
                    scattering: sphere.scattering,
                });
                min_dist2 = dist2;
            }
        }
    }

    if include_plate {
        match scene.plate {
            Plate::Mesh(mesh) => {
                mesh_candidates(ray, mesh, SurfaceId::Plate, &mut best, &mut min_dist2, diag);
                plane_candidate(ray, scene.apertures, None, &mut best, &mut min_dist2);
            }
            Plate::BackWall(wall) => {
                plane_candidate(
                    ray,
                    scene.apertures,
                    Some(*wall),
                    &mut best,
                    &mut min_dist2,
                );
            }
        }
    }

    best
}

/// Run every face of a mesh through the ray-triangle test, updating the
/// candidate when a closer forward hit is found.
fn mesh_candidates(
    ray: &Ray,
    surface: &TriangleSurface,
    id: SurfaceId,
    best: &mut Option<Hit>,
    min_dist2: &mut f64,
    diag: &mut Diagnostics,
) {
    let e = ray.position;
    let d = ray.direction;
    let own = ray.on_surface == Some(id);

    for j in 0..surface.num_faces() {
        // Never re-test the facet the ray just left.
        if own && ray.on_element == Some(j) {
            continue;
        }
        let (a, b, c, normal) = surface.element(j);
        // Back-facing triangles cannot be struck.
        if d.dot(normal) > 0.0 {
            continue;
        }
        // If all three vertices are behind the origin the triangle is too.
        if (a - e).dot(d) < 0.0 && (b - e).dot(d) < 0.0 && (c - e).dot(d) < 0.0 {
            continue;
        }
        match ray_triangle(e, d, a, b, c) {
            TriangleTest::Degenerate => diag.singular_solves += 1,
            TriangleTest::Miss => {}
            TriangleTest::Hit(t) => {
                let dist2 = t * t;
                if dist2 < *min_dist2 {
                    *best = Some(Hit {
                        dist2,
                        point: ray.at(t),
                        normal,
                        surface: id,
                        element: Some(j),
                        aperture: 0,
                        scattering: surface.scattering(j),
                    });
                    *min_dist2 = dist2;
                }
            }
        }
    }
}

/// Intersect with the plate plane y = 0: detector apertures first (in
/// order), then, for the back-wall model, the absorbing disc.
fn plane_candidate(
    ray: &Ray,
    apertures: &[Aperture],
    wall: Option<crate::plate::BackWall>,
    best: &mut Option<Hit>,
    min_dist2: &mut f64,
) {
    let d = ray.direction;
    // Only rays travelling back up can meet the plate.
    if d.y <= 0.0 {
        return;
    }
    let t = -ray.position.y / d.y;
    if t <= 0.0 {
        return;
    }
    let dist2 = t * t;
    if dist2 >= *min_dist2 {
        return;
    }
    let point = ray.at(t);

    for (i, ap) in apertures.iter().enumerate() {
        if ap.contains(point.x, point.z) {
            *best = Some(Hit {
                dist2,
                point,
                normal: BACK_WALL_NORMAL,
                surface: SurfaceId::Plate,
                element: None,
                aperture: (i + 1) as u32,
                scattering: Scattering::Cosine,
            });
            *min_dist2 = dist2;
            return;
        }
    }

    if let Some(wall) = wall {
        if wall.plate_represent && point.x * point.x + point.z * point.z <= wall.radius * wall.radius
        {
            // Struck the plate disc itself; the plate scatters cosine.
            *best = Some(Hit {
                dist2,
                point,
                normal: BACK_WALL_NORMAL,
                surface: SurfaceId::Plate,
                element: None,
                aperture: 0,
                scattering: Scattering::Cosine,
            });
            *min_dist2 = dist2;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plate::BackWall;
    use crate::scene::Scene;
    use crate::sphere::AnalytSphere;
    use glam::DVec2;

    fn basic_scene(plate_represent: bool, sphere: bool) -> Scene {
        Scene {
            sample: TriangleSurface::flat_square(10.0, -2.0, Scattering::Cosine),
            plate: Plate::BackWall(BackWall {
                radius: 4.0,
                plate_represent,
            }),
            sphere: sphere.then(|| {
                AnalytSphere::new(DVec3::new(0.0, -1.5, 0.0), 0.5, Scattering::Cosine).unwrap()
            }),
            apertures: vec![
                Aperture::new(DVec2::new(2.0, 0.0), DVec2::new(1.0, 1.0), 0).unwrap(),
            ],
        }
    }

    fn downward_ray() -> Ray {
        Ray::new(DVec3::new(0.0, 1.0, 0.0), DVec3::new(0.0, -1.0, 0.0))
    }

    #[test]
    fn sphere_shadows_sample() {
        let scene = basic_scene(true, true);
        let view = scene.at_offset(DVec3::ZERO);
        let mut diag = Diagnostics::default();
        let hit = nearest_hit(&downward_ray(), &view, true, &mut diag).unwrap();
        assert_eq!(hit.surface, SurfaceId::Sphere);
        assert_eq!(hit.element, None);
        // Top of the sphere is at y = -1.0, two units below the origin.
        assert!((hit.dist2 - 4.0).abs() < 1e-12);
        assert!((hit.normal - DVec3::Y).length() < 1e-12);
    }

    #[test]
    fn without_sphere_the_sample_is_hit() {
        let scene = basic_scene(true, false);
        let view = scene.at_offset(DVec3::ZERO);
        let mut diag = Diagnostics::default();
        let hit = nearest_hit(&downward_ray(), &view, true, &mut diag).unwrap();
        assert_eq!(hit.surface, SurfaceId::Sample);
        assert!(hit.element.is_some());
        assert_eq!(hit.aperture, 0);
    }

    #[test]
    fn own_facet_is_excluded() {
        let scene = basic_scene(true, false);
        let view = scene.at_offset(DVec3::ZERO);
        let mut diag = Diagnostics::default();
        let first = nearest_hit(&downward_ray(), &view, true, &mut diag).unwrap();
        // Re-launch from the hit point along the surface: without the facet
        // exclusion this would immediately re-intersect at t = 0 territory.
        let mut ray = downward_ray();
        ray.position = first.point;
        ray.direction = DVec3::new(0.0, -1.0, 0.0);
        ray.on_surface = Some(SurfaceId::Sample);
        ray.on_element = first.element;
        let again = nearest_hit(&ray, &view, true, &mut diag);
        // The other half of the square can still be struck edge-on or not at
        // all; what must never happen is re-hitting the same element.
        if let Some(h) = again {
            assert_ne!((h.surface, h.element), (SurfaceId::Sample, first.element));
        }
    }

    #[test]
    fn backfacing_sample_is_invisible() {
        let scene = basic_scene(false, false);
        let view = scene.at_offset(DVec3::ZERO);
        let mut diag = Diagnostics::default();
        // From below the sample looking up: normals point up, so the mesh is
        // back-facing; with no absorbing plate the ray escapes through the
        // aperture plane only if an aperture contains it.
        let ray = Ray::new(DVec3::new(0.0, -3.0, 0.0), DVec3::new(0.0, 1.0, 0.0));
        let hit = nearest_hit(&ray, &view, true, &mut diag);
        assert!(hit.is_none());
    }

    #[test]
    fn aperture_detection_and_index() {
        let scene = basic_scene(true, false);
        let view = scene.at_offset(DVec3::ZERO);
        let mut diag = Diagnostics::default();
        // Upward ray passing through the aperture centred at (2, 0).
        let ray = Ray::new(DVec3::new(2.0, -1.0, 0.0), DVec3::new(0.0, 1.0, 0.0));
        let hit = nearest_hit(&ray, &view, true, &mut diag).unwrap();
        assert_eq!(hit.aperture, 1);
        assert_eq!(hit.surface, SurfaceId::Plate);
        assert!((hit.dist2 - 1.0).abs() < 1e-12);
    }

    #[test]
    fn plate_absorbs_only_when_represented() {
        let mut diag = Diagnostics::default();
        let up = Ray::new(DVec3::new(0.0, -1.0, 0.0), DVec3::new(0.0, 1.0, 0.0));

        let opaque = basic_scene(true, false);
        let view = opaque.at_offset(DVec3::ZERO);
        let hit = nearest_hit(&up, &view, true, &mut diag).unwrap();
        assert_eq!((hit.surface, hit.aperture), (SurfaceId::Plate, 0));

        let transparent = basic_scene(false, false);
        let view = transparent.at_offset(DVec3::ZERO);
        assert!(nearest_hit(&up, &view, true, &mut diag).is_none());
    }

    #[test]
    fn first_flight_can_skip_the_plate() {
        let scene = basic_scene(true, false);
        let view = scene.at_offset(DVec3::ZERO);
        let mut diag = Diagnostics::default();
        let up = Ray::new(DVec3::new(0.0, -1.0, 0.0), DVec3::new(0.0, 1.0, 0.0));
        assert!(nearest_hit(&up, &view, false, &mut diag).is_none());
    }

    #[test]
    fn mesh_plate_blocks_while_apertures_still_detect() {
        // Plate modelled as a mesh square over x in [1, 3], facing the
        // sample, with the analytic aperture off to the other side.
        let plate_mesh = TriangleSurface::new(
            vec![
                DVec3::new(1.0, 0.0, -1.0),
                DVec3::new(3.0, 0.0, -1.0),
                DVec3::new(3.0, 0.0, 1.0),
                DVec3::new(1.0, 0.0, 1.0),
            ],
            vec![[0, 1, 2], [0, 2, 3]],
            vec![DVec3::new(0.0, -1.0, 0.0); 2],
            &[1, 1],
            &[0.0, 0.0],
        )
        .unwrap();
        let scene = Scene {
            sample: TriangleSurface::flat_square(10.0, -2.0, Scattering::Cosine),
            plate: Plate::Mesh(plate_mesh),
            sphere: None,
            apertures: vec![
                Aperture::new(DVec2::new(-2.0, 0.0), DVec2::new(1.0, 1.0), 0).unwrap(),
            ],
        };
        let view = scene.at_offset(DVec3::ZERO);
        let mut diag = Diagnostics::default();

        let blocked = Ray::new(DVec3::new(2.0, -1.0, 0.0), DVec3::Y);
        let hit = nearest_hit(&blocked, &view, true, &mut diag).unwrap();
        assert_eq!((hit.surface, hit.aperture), (SurfaceId::Plate, 0));
        assert!(hit.element.is_some());

        let through = Ray::new(DVec3::new(-2.0, -1.0, 0.0), DVec3::Y);
        let hit = nearest_hit(&through, &view, true, &mut diag).unwrap();
        assert_eq!(hit.aperture, 1);
        assert_eq!(hit.element, None);
    }

    #[test]
    fn overlapping_apertures_resolve_in_order() {
        let mut scene = basic_scene(true, false);
        scene.apertures = vec![
            Aperture::new(DVec2::new(0.1, 0.0), DVec2::new(2.0, 2.0), 0).unwrap(),
            Aperture::new(DVec2::new(-0.1, 0.0), DVec2::new(2.0, 2.0), 1).unwrap(),
        ];
        let view = scene.at_offset(DVec3::ZERO);
        let mut diag = Diagnostics::default();
        let up = Ray::new(DVec3::new(0.0, -1.0, 0.0), DVec3::new(0.0, 1.0, 0.0));
        let hit = nearest_hit(&up, &view, true, &mut diag).unwrap();
        assert_eq!(hit.aperture, 1);
    }
}
