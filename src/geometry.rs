//! Geometric primitives shared by the intersection kernels.
//!
//! Everything here is f64: the determinant and unit-norm tolerances used by
//! the tracing loop sit below f32 resolution.

use glam::DVec3;

/// Determinant magnitude below which a 3x3 system is treated as singular.
pub const DET_EPS: f64 = 1e-10;

/// Tolerance on |d| = 1 for ray directions.
pub const UNIT_TOL: f64 = 1e-10;

/// Tolerance on stored mesh normals before they are renormalised.
pub const NORMAL_TOL: f64 = 1e-6;

/// Point reached after travelling distance `t` from `origin` along `dir`.
#[inline]
pub fn propagate(origin: DVec3, dir: DVec3, t: f64) -> DVec3 {
    origin + t * dir
}

/// Mirror reflection of `d` about the plane with unit normal `n`.
#[inline]
pub fn reflect(d: DVec3, n: DVec3) -> DVec3 {
    d - 2.0 * d.dot(n) * n
}

/// Solve the 3x3 system whose columns are `c0`, `c1`, `c2` for `rhs`.
///
/// Returns `None` when |det| <= [`DET_EPS`]. Uses Cramer's rule expressed as
/// scalar triple products, which is the entire cost of the ray-triangle test.
#[inline]
pub fn solve3x3(c0: DVec3, c1: DVec3, c2: DVec3, rhs: DVec3) -> Option<DVec3> {
    let det = c0.cross(c1).dot(c2);
    if det.abs() <= DET_EPS {
        return None;
    }
    let inv = 1.0 / det;
    Some(DVec3::new(
        rhs.cross(c1).dot(c2) * inv,
        c0.cross(rhs).dot(c2) * inv,
        c0.cross(c1).dot(rhs) * inv,
    ))
}

/// Outcome of the parametric ray-triangle solve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TriangleTest {
    /// Forward hit inside the triangle at distance `t` along the ray.
    Hit(f64),
    /// Solvable, but the point lies outside the triangle or behind the ray.
    Miss,
    /// |det| <= [`DET_EPS`]: the ray is parallel to the triangle plane.
    Degenerate,
}

/// Intersect the ray `e + t d` with triangle `(a, b, c)`.
///
/// Solves `e + t d = a + beta (b - a) + gamma (c - a)`; a hit requires
/// `beta >= 0`, `gamma >= 0`, `beta + gamma <= 1` and `t > 0`.
#[inline]
pub fn ray_triangle(e: DVec3, d: DVec3, a: DVec3, b: DVec3, c: DVec3) -> TriangleTest {
    match solve3x3(a - b, a - c, d, a - e) {
        None => TriangleTest::Degenerate,
        Some(u) => {
            let (beta, gamma, t) = (u.x, u.y, u.z);
            if beta >= 0.0 && gamma >= 0.0 && beta + gamma <= 1.0 && t > 0.0 {
                TriangleTest::Hit(t)
            } else {
                TriangleTest::Miss
            }
        }
    }
}

/// Intersect the ray `e + t d` (unit `d`) with the sphere at `centre`.
///
/// Solves `t^2 + beta t + gamma = 0` with `beta = 2 d . (e - c)` and
/// `gamma = |e - c|^2 - r^2`, keeping only the smaller root. A ray leaving
/// the sphere surface has that root at or below zero, so no explicit
/// self-intersection guard is needed.
#[inline]
pub fn ray_sphere(e: DVec3, d: DVec3, centre: DVec3, radius: f64) -> Option<f64> {
    let oc = e - centre;
    let beta = 2.0 * d.dot(oc);
    let gamma = oc.length_squared() - radius * radius;
    let disc = beta * beta - 4.0 * gamma;
    if disc < 0.0 {
        return None;
    }
    let t = (-beta - disc.sqrt()) / 2.0;
    (t > 0.0).then_some(t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflect_preserves_angle() {
        let n = DVec3::Y;
        let d = DVec3::new(1.0, -1.0, 0.0).normalize();
        let r = reflect(d, n);
        assert!((r - DVec3::new(1.0, 1.0, 0.0).normalize()).length() < 1e-12);
        assert!((d.dot(n).abs() - r.dot(n).abs()).abs() < 1e-12);
    }

    #[test]
    fn double_reflection_restores_direction() {
        let d = DVec3::new(0.3, -0.8, 0.1).normalize();
        let once = reflect(d, DVec3::Y);
        let twice = reflect(once, DVec3::Y);
        assert!((twice - d).length() < 1e-12);
    }

    #[test]
    fn solve3x3_identity() {
        let u = solve3x3(DVec3::X, DVec3::Y, DVec3::Z, DVec3::new(2.0, -3.0, 4.5)).unwrap();
        assert!((u - DVec3::new(2.0, -3.0, 4.5)).length() < 1e-12);
    }

    #[test]
    fn solve3x3_singular() {
        // Two identical columns: determinant is exactly zero.
        assert!(solve3x3(DVec3::X, DVec3::X, DVec3::Z, DVec3::ONE).is_none());
    }

    #[test]
    fn triangle_hit_and_miss() {
        let (a, b, c) = (
            DVec3::new(-1.0, 0.0, -1.0),
            DVec3::new(1.0, 0.0, -1.0),
            DVec3::new(0.0, 0.0, 1.0),
        );
        let e = DVec3::new(0.0, 2.0, 0.0);
        let down = DVec3::new(0.0, -1.0, 0.0);
        assert_eq!(ray_triangle(e, down, a, b, c), TriangleTest::Hit(2.0));
        // Pointing away: solvable but t < 0.
        assert_eq!(ray_triangle(e, -down, a, b, c), TriangleTest::Miss);
        // Outside the triangle.
        let e2 = DVec3::new(5.0, 2.0, 0.0);
        assert_eq!(ray_triangle(e2, down, a, b, c), TriangleTest::Miss);
        // In-plane ray: singular system.
        let e3 = DVec3::new(-3.0, 0.0, 0.0);
        assert_eq!(ray_triangle(e3, DVec3::X, a, b, c), TriangleTest::Degenerate);
    }

    #[test]
    fn sphere_roots() {
        let centre = DVec3::new(0.0, 0.0, 5.0);
        let hit = ray_sphere(DVec3::ZERO, DVec3::Z, centre, 1.0).unwrap();
        assert!((hit - 4.0).abs() < 1e-12);
        // Behind the origin.
        assert!(ray_sphere(DVec3::ZERO, -DVec3::Z, centre, 1.0).is_none());
        // Clean miss.
        assert!(ray_sphere(DVec3::ZERO, DVec3::X, centre, 1.0).is_none());
    }

    #[test]
    fn sphere_no_rehit_from_surface() {
        // A ray on the surface heading outward must not see the sphere again.
        let centre = DVec3::ZERO;
        let p = DVec3::new(0.0, 1.0, 0.0);
        assert!(ray_sphere(p, DVec3::Y, centre, 1.0).is_none());
    }
}
