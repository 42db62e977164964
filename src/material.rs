//! Surface scattering laws.
//!
//! Given an incoming direction, the outward surface normal and a pixel RNG,
//! each law samples a new unit outgoing direction with `d' . n > 0`.

use glam::DVec3;

use crate::diagnostics::Diagnostics;
use crate::error::GeometryError;
use crate::geometry::reflect;
use crate::random::RayRng;

/// Resampling budget for broadened specular before falling back to the
/// nominal mirror direction.
const BROADEN_ATTEMPTS: usize = 10;

/// Directions shorter than this after perturbation are treated as underflow.
const MIN_DIR_LEN: f64 = 1e-12;

/// Per-facet scattering law with its parameter baked in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scattering {
    /// Mirror reflection about the facet normal.
    Specular,
    /// Cosine (Lambertian) distribution about the normal.
    Cosine,
    /// Uniform distribution over the hemisphere about the normal.
    Uniform,
    /// Specular direction perturbed by a Gaussian of the given stddev
    /// (radians) in the two tangent axes.
    Broadened {
        /// Angular stddev in radians.
        sigma: f64,
    },
    /// Cosine with probability `diffuse`, otherwise specular.
    Mixed {
        /// Probability of a cosine event, in (0, 1).
        diffuse: f64,
    },
}

impl Scattering {
    /// Decode the external (material id, parameter) pair.
    ///
    /// Ids: 0 specular, 1 cosine, 2 uniform hemisphere, 3 broadened
    /// specular, 4 mixed.
    pub fn from_id(id: u32, param: f64) -> Result<Self, GeometryError> {
        match id {
            0 => Ok(Self::Specular),
            1 => Ok(Self::Cosine),
            2 => Ok(Self::Uniform),
            3 => {
                if param < 0.0 || !param.is_finite() {
                    Err(GeometryError::InvalidScatteringParameter {
                        id,
                        param,
                        reason: "broadening stddev must be finite and non-negative",
                    })
                } else {
                    Ok(Self::Broadened { sigma: param })
                }
            }
            4 => {
                if param <= 0.0 || param >= 1.0 {
                    Err(GeometryError::InvalidScatteringParameter {
                        id,
                        param,
                        reason: "mixing fraction must lie strictly inside (0, 1)",
                    })
                } else {
                    Ok(Self::Mixed { diffuse: param })
                }
            }
            _ => Err(GeometryError::UnknownScattering { id }),
        }
    }

    /// Sample an outgoing direction for an incident ray direction `d` at a
    /// facet with unit outward normal `n`.
    pub fn scatter(&self, d: DVec3, n: DVec3, rng: &mut RayRng, diag: &mut Diagnostics) -> DVec3 {
        match *self {
            Self::Specular => reflect(d, n),
            Self::Cosine => cosine_about(n, rng),
            Self::Uniform => uniform_about(n, rng),
            Self::Broadened { sigma } => broadened_specular(d, n, sigma, rng, diag),
            Self::Mixed { diffuse } => {
                if rng.uniform() < diffuse {
                    cosine_about(n, rng)
                } else {
                    reflect(d, n)
                }
            }
        }
    }
}

/// Unit direction with density proportional to cos(theta) about `n`.
///
/// The polar angle is drawn from p(theta) = sin(2 theta) on [0, pi/2], i.e.
/// sin(theta) = sqrt(u), then assembled in a local frame whose z-axis is `n`.
pub(crate) fn cosine_about(n: DVec3, rng: &mut RayRng) -> DVec3 {
    let phi = 2.0 * std::f64::consts::PI * rng.uniform();
    let sin_t = rng.uniform().sqrt();
    let cos_t = (1.0 - sin_t * sin_t).sqrt();
    let (t1, t2) = n.any_orthonormal_pair();
    (t1 * phi.cos() + t2 * phi.sin()) * sin_t + n * cos_t
}

/// Unit direction uniform over the hemisphere about `n`.
fn uniform_about(n: DVec3, rng: &mut RayRng) -> DVec3 {
    let v = rng.unit_vector();
    if v.dot(n) > 0.0 {
        v
    } else {
        -v
    }
}

/// Specular direction perturbed by Gaussians of stddev `sigma` in the two
/// tangent axes, renormalised. Resamples on an inward or underflowed result,
/// falling back to the unperturbed mirror direction after
/// [`BROADEN_ATTEMPTS`] tries.
fn broadened_specular(
    d: DVec3,
    n: DVec3,
    sigma: f64,
    rng: &mut RayRng,
    diag: &mut Diagnostics,
) -> DVec3 {
    let spec = reflect(d, n);
    let (t1, t2) = spec.any_orthonormal_pair();
    for _ in 0..BROADEN_ATTEMPTS {
        let (g1, g2) = rng.gaussian_pair(0.0, sigma);
        let cand = spec + g1 * t1 + g2 * t2;
        let len = cand.length();
        if len < MIN_DIR_LEN {
            continue;
        }
        let cand = cand / len;
        if cand.dot(n) > 0.0 {
            return cand;
        }
    }
    diag.broaden_fallbacks += 1;
    spec
}
