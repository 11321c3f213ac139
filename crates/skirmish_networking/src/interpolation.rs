//! # Drawn Position Blending
//!
//! The simulated position jumps whenever an authoritative correction is
//! applied. The drawn position does not: it glides from where the entity
//! was before the correction to where the simulation now says it is, over
//! one blend window (the server's broadcast interval).
//!
//! ## Rules
//! - **Simulated position**: physics truth, used for every decision
//! - **Drawn position**: what the renderer shows
//! - If the two are `snap_distance` or more apart, the drawn position
//!   snaps instead of gliding
//!
//! ```ignore
//! let mut blender = PositionBlender::new(spawn, 0.05, 50.0);
//!
//! // On correction:
//! blender.begin_correction(simulated_before);
//!
//! // Each frame:
//! let drawn = blender.update(dt, simulated);
//! ```

use skirmish_core::Vec2;

/// Blends the drawn position of the local entity toward its simulated one.
#[derive(Clone, Debug)]
pub struct PositionBlender {
    drawn: Vec2,
    position_before_lerp: Vec2,
    elapsed: f64,
    blend_window: f64,
    snap_distance: f32,
    /// Statistics: corrections started.
    pub total_corrections: u32,
    /// Statistics: snaps performed.
    pub total_snaps: u32,
}

impl PositionBlender {
    /// Creates a blender resting at `position`.
    ///
    /// # Arguments
    /// * `blend_window` - Seconds a correction takes to blend in
    /// * `snap_distance` - Distance at which the drawn position snaps
    #[must_use]
    pub fn new(position: Vec2, blend_window: f64, snap_distance: f32) -> Self {
        Self {
            drawn: position,
            position_before_lerp: position,
            elapsed: blend_window,
            blend_window,
            snap_distance,
            total_corrections: 0,
            total_snaps: 0,
        }
    }

    /// Restarts the blend window from `from`.
    ///
    /// Call with the simulated position as it was before the correction.
    pub fn begin_correction(&mut self, from: Vec2) {
        self.position_before_lerp = from;
        self.elapsed = 0.0;
        self.total_corrections += 1;
    }

    /// Advances the blend by `dt` and returns the new drawn position.
    pub fn update(&mut self, dt: f64, simulated: Vec2) -> Vec2 {
        self.elapsed += dt.max(0.0);

        let snap = self.snap_distance * self.snap_distance;
        if self.drawn.distance_squared(simulated) >= snap {
            self.drawn = simulated;
            self.position_before_lerp = simulated;
            self.elapsed = 0.0;
            self.total_snaps += 1;
            return self.drawn;
        }

        self.drawn = self.position_before_lerp.lerp(simulated, self.progress());
        self.drawn
    }

    /// Blend progress in `[0, 1]`.
    #[must_use]
    pub fn progress(&self) -> f32 {
        if self.blend_window <= 0.0 {
            return 1.0;
        }
        (self.elapsed / self.blend_window).clamp(0.0, 1.0) as f32
    }

    /// Current drawn position.
    #[inline]
    #[must_use]
    pub const fn drawn_position(&self) -> Vec2 {
        self.drawn
    }

    /// Returns true while a correction is still blending in.
    #[must_use]
    pub fn is_blending(&self) -> bool {
        self.progress() < 1.0
    }

    /// Places the drawn position at `position` with no blend in progress.
    pub fn reset(&mut self, position: Vec2) {
        self.drawn = position;
        self.position_before_lerp = position;
        self.elapsed = self.blend_window;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_follows_simulation_when_idle() {
        let mut blender = PositionBlender::new(Vec2::ZERO, 0.05, 50.0);
        let drawn = blender.update(0.016, Vec2::new(3.0, 0.0));
        assert_eq!(drawn, Vec2::new(3.0, 0.0));
        assert!(!blender.is_blending());
    }

    #[test]
    fn test_blends_over_window() {
        let mut blender = PositionBlender::new(Vec2::new(100.0, 0.0), 0.05, 50.0);
        blender.begin_correction(Vec2::new(100.0, 0.0));

        let target = Vec2::new(120.0, 0.0);
        let half = blender.update(0.025, target);
        assert!(half.approx_eq(Vec2::new(110.0, 0.0), 1e-3));
        assert!(blender.is_blending());

        let done = blender.update(0.05, target);
        assert_eq!(done, target);
        assert!(!blender.is_blending());
    }

    #[test]
    fn test_snaps_when_far() {
        let mut blender = PositionBlender::new(Vec2::ZERO, 0.05, 50.0);
        blender.begin_correction(Vec2::ZERO);

        let far = Vec2::new(50.0, 0.0);
        assert_eq!(blender.update(0.001, far), far);
        assert_eq!(blender.total_snaps, 1);
    }

    #[test]
    fn test_progress_clamped() {
        let mut blender = PositionBlender::new(Vec2::ZERO, 0.05, 50.0);
        blender.begin_correction(Vec2::ZERO);
        blender.update(10.0, Vec2::new(1.0, 0.0));
        assert!((blender.progress() - 1.0).abs() < f32::EPSILON);
    }
}
