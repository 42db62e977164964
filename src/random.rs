//! Random number generation for the tracing loop.
//!
//! Each pixel owns an independent ChaCha20 stream seeded from the run seed
//! and the pixel index only, so tallies are bit-identical for any worker
//! count or pixel traversal order.

use glam::{DVec2, DVec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Owned pseudorandom stream for one worker / pixel.
#[derive(Debug, Clone)]
pub struct RayRng {
    inner: ChaCha20Rng,
}

impl RayRng {
    /// Stream for pixel `pixel` of a run with the given seed.
    ///
    /// The pixel index is scrambled (splitmix64 finaliser) before mixing so
    /// neighbouring pixels land on unrelated streams.
    pub fn for_pixel(seed: u64, pixel: u64) -> Self {
        let mut z = pixel.wrapping_add(0x9e3779b97f4a7c15);
        z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
        z ^= z >> 31;
        Self {
            inner: ChaCha20Rng::seed_from_u64(seed ^ z),
        }
    }

    /// Uniform real on [0, 1).
    #[inline]
    pub fn uniform(&mut self) -> f64 {
        self.inner.random()
    }

    /// Uniform real on [-1, 1).
    #[inline]
    pub fn uniform_sym(&mut self) -> f64 {
        2.0 * self.uniform() - 1.0
    }

    /// Uniform unit vector on the sphere.
    #[inline]
    pub fn unit_vector(&mut self) -> DVec3 {
        let theta = 2.0 * std::f64::consts::PI * self.uniform();
        let cos_phi = self.uniform_sym();
        let sin_phi = (1.0 - cos_phi * cos_phi).sqrt();
        DVec3::new(sin_phi * theta.cos(), sin_phi * theta.sin(), cos_phi)
    }

    /// Uniform point in the unit disk, by rejection.
    #[inline]
    pub fn in_unit_disk(&mut self) -> DVec2 {
        loop {
            let p = DVec2::new(self.uniform_sym(), self.uniform_sym());
            if p.length_squared() < 1.0 {
                return p;
            }
        }
    }

    /// Box-Muller pair of independent Gaussians with mean `mu`, stddev `sigma`.
    #[inline]
    pub fn gaussian_pair(&mut self, mu: f64, sigma: f64) -> (f64, f64) {
        // 1 - u keeps the log argument in (0, 1].
        let r = (-2.0 * (1.0 - self.uniform()).ln()).sqrt();
        let phi = 2.0 * std::f64::consts::PI * self.uniform();
        (mu + sigma * r * phi.cos(), mu + sigma * r * phi.sin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn streams_are_deterministic() {
        let mut a = RayRng::for_pixel(7, 123);
        let mut b = RayRng::for_pixel(7, 123);
        for _ in 0..64 {
            assert_eq!(a.uniform().to_bits(), b.uniform().to_bits());
        }
    }

    #[test]
    fn pixels_get_distinct_streams() {
        let mut a = RayRng::for_pixel(7, 0);
        let mut b = RayRng::for_pixel(7, 1);
        let same = (0..16).filter(|_| a.uniform() == b.uniform()).count();
        assert!(same < 16);
    }

    #[test]
    fn unit_vectors_are_unit() {
        let mut rng = RayRng::for_pixel(1, 0);
        for _ in 0..1000 {
            assert!((rng.unit_vector().length() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn gaussian_moments() {
        let mut rng = RayRng::for_pixel(3, 0);
        let n = 50_000;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for _ in 0..n {
            let (a, b) = rng.gaussian_pair(2.0, 0.5);
            sum += a + b;
            sum_sq += (a - 2.0) * (a - 2.0) + (b - 2.0) * (b - 2.0);
        }
        let mean = sum / (2 * n) as f64;
        let var = sum_sq / (2 * n) as f64;
        assert!((mean - 2.0).abs() < 0.01);
        assert!((var - 0.25).abs() < 0.01);
    }

    #[test]
    fn disk_points_inside() {
        let mut rng = RayRng::for_pixel(5, 9);
        for _ in 0..1000 {
            assert!(rng.in_unit_disk().length_squared() < 1.0);
        }
    }
}
