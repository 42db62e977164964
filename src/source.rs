//! Virtual source models: where rays are born.

use glam::DVec3;

use crate::material::cosine_about;
use crate::plate::BACK_WALL_NORMAL;
use crate::random::RayRng;
use crate::ray::Ray;

/// Angular distribution of emitted rays about the mean beam direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceModel {
    /// Uniform pencil: tilt angle uniform on [0, `angular_size`].
    Uniform {
        /// Maximum tilt from the mean direction, radians.
        angular_size: f64,
    },
    /// Gaussian spread of the given stddev (radians) about the mean.
    Gaussian {
        /// Angular stddev in radians.
        stddev: f64,
    },
    /// Effusive component: cosine-distributed about the pinhole normal,
    /// ignoring the mean beam direction.
    Effuse,
}

/// A circular pinhole source in the plate plane.
#[derive(Debug, Clone, Copy)]
pub struct Source {
    /// Pinhole centre (in the plane y = 0).
    pub centre: DVec3,
    /// Mean beam direction, unit.
    pub direction: DVec3,
    /// Pinhole radius; positions are uniform over the disc.
    pub radius: f64,
    /// Angular model.
    pub model: SourceModel,
}

impl Source {
    /// New source with the mean direction normalised.
    pub fn new(centre: DVec3, direction: DVec3, radius: f64, model: SourceModel) -> Self {
        Self {
            centre,
            direction: direction.normalize(),
            radius,
            model,
        }
    }

    /// Draw one ray. The sampler is stateless apart from the RNG.
    pub fn sample_ray(&self, rng: &mut RayRng) -> Ray {
        let disk = rng.in_unit_disk() * self.radius;
        let position = self.centre + DVec3::new(disk.x, 0.0, disk.y);
        let direction = match self.model {
            SourceModel::Uniform { angular_size } => {
                tilt(self.direction, angular_size * rng.uniform(), rng)
            }
            SourceModel::Gaussian { stddev } => {
                let (g1, g2) = rng.gaussian_pair(0.0, stddev);
                let (t1, t2) = self.direction.any_orthonormal_pair();
                (self.direction + g1 * t1 + g2 * t2).normalize()
            }
            // The pinhole faces the sample; effusing atoms leave cosine-
            // distributed about that normal.
            SourceModel::Effuse => cosine_about(BACK_WALL_NORMAL, rng),
        };
        Ray::new(position, direction)
    }
}

/// Rotate `mean` by polar angle `theta` about a uniformly random azimuth.
fn tilt(mean: DVec3, theta: f64, rng: &mut RayRng) -> DVec3 {
    let (t1, t2) = mean.any_orthonormal_pair();
    let phi = 2.0 * std::f64::consts::PI * rng.uniform();
    let (sin_t, cos_t) = theta.sin_cos();
    mean * cos_t + (t1 * phi.cos() + t2 * phi.sin()) * sin_t
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beam() -> DVec3 {
        DVec3::new(1.0, -1.0, 0.0).normalize()
    }

    #[test]
    fn directions_are_unit_and_positions_on_disc() {
        let src = Source::new(
            DVec3::new(-2.1, 0.0, 0.0),
            beam(),
            0.05,
            SourceModel::Uniform {
                angular_size: 0.01,
            },
        );
        let mut rng = RayRng::for_pixel(0, 0);
        for _ in 0..1000 {
            let ray = src.sample_ray(&mut rng);
            assert!((ray.direction.length() - 1.0).abs() < 1e-10);
            assert!((ray.position - src.centre).length() <= 0.05);
            assert_eq!(ray.position.y, 0.0);
        }
    }

    #[test]
    fn uniform_tilt_stays_inside_the_cone() {
        let angular_size = 0.2;
        let src = Source::new(
            DVec3::ZERO,
            beam(),
            0.0,
            SourceModel::Uniform { angular_size },
        );
        let mut rng = RayRng::for_pixel(1, 0);
        for _ in 0..2000 {
            let ray = src.sample_ray(&mut rng);
            let angle = ray.direction.dot(beam()).clamp(-1.0, 1.0).acos();
            assert!(angle <= angular_size + 1e-9);
        }
    }

    #[test]
    fn effuse_points_down_with_cosine_mean() {
        let src = Source::new(DVec3::ZERO, beam(), 0.05, SourceModel::Effuse);
        let mut rng = RayRng::for_pixel(2, 0);
        let samples = 100_000;
        let mut mean = 0.0;
        for _ in 0..samples {
            let d = src.sample_ray(&mut rng).direction;
            assert!(d.y < 0.0);
            mean += -d.y;
        }
        mean /= samples as f64;
        assert!((mean - 2.0 / 3.0).abs() < 5e-3, "mean cos = {mean}");
    }
}
