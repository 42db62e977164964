//! Ray state carried through the tracing loop.

use glam::DVec3;

use crate::scene::SurfaceId;

/// A single helium atom trajectory segment.
///
/// The facet the ray was last emitted from is recorded as a
/// `(SurfaceId, element index)` pair rather than any reference into the
/// scene, so rays and surfaces stay fully decoupled. The element index is
/// `None` for the analytic sphere and the back wall.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// Current position.
    pub position: DVec3,
    /// Unit direction of travel.
    pub direction: DVec3,
    /// Number of sample scattering events undergone so far.
    pub scatters: u32,
    /// Surface the ray last scattered from, if any.
    pub on_surface: Option<SurfaceId>,
    /// Triangle index on that surface, if it was a mesh facet.
    pub on_element: Option<usize>,
}

impl Ray {
    /// Fresh ray from the source: no scatters, on no surface.
    pub fn new(position: DVec3, direction: DVec3) -> Self {
        Self {
            position,
            direction,
            scatters: 0,
            on_surface: None,
            on_element: None,
        }
    }

    /// Point at distance `t` along the ray.
    #[inline]
    pub fn at(&self, t: f64) -> DVec3 {
        self.position + t * self.direction
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_propagates() {
        let r = Ray::new(DVec3::new(1.0, 2.0, 3.0), DVec3::X);
        assert_eq!(r.at(2.5), DVec3::new(3.5, 2.0, 3.0));
        assert_eq!(r.scatters, 0);
        assert!(r.on_surface.is_none());
    }
}
