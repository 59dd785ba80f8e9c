/// Narrowest field of view the zoom may reach, in degrees.
pub const FOV_MIN_DEGREES: f32 = 1.0;
/// Widest field of view the zoom may reach, in degrees.
pub const FOV_MAX_DEGREES: f32 = 45.0;
/// Time, in seconds, for a zoom transition to settle on its target.
pub const FOV_EASING_DURATION: f32 = 1.0;
/// Field-of-view change per unit of scroll, in degrees.
pub const FOV_SCROLL_STEP_DEGREES: f32 = 3.0;

/// Quartic ease-out: `-c * ((t/d - 1)^4 - 1) + b`.
///
/// `b` is the start value, `c` the total change, `d` the duration. Inputs with
/// `t` outside `[0, d]` are not clamped here.
pub fn ease_out_quart(t: f32, b: f32, c: f32, d: f32) -> f32 {
    let t = t / d - 1.0;
    -c * (t * t * t * t - 1.0) + b
}

/// Animated field of view.
///
/// A scroll event retargets the curve mid-flight: the value currently on
/// screen becomes the new start, so the zoom never jumps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FovEasing {
    current: f32,
    start: f32,
    target: f32,
    elapsed: f32,
}

impl FovEasing {
    /// A settled easing state at `fov` degrees (clamped into range).
    pub fn settled(fov: f32) -> Self {
        let fov = clamp_fov(fov);
        Self {
            current: fov,
            start: fov,
            target: fov,
            elapsed: FOV_EASING_DURATION,
        }
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn start(&self) -> f32 {
        self.start
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn is_settled(&self) -> bool {
        self.elapsed >= FOV_EASING_DURATION
    }

    /// Advance the easing clock by `dt` seconds and recompute the current fov.
    pub fn advance(&mut self, dt: f32) {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        self.elapsed = (self.elapsed + dt).min(FOV_EASING_DURATION);

        self.current = if self.is_settled() {
            self.target
        } else {
            let eased = ease_out_quart(
                self.elapsed,
                self.start,
                self.target - self.start,
                FOV_EASING_DURATION,
            );
            clamp_fov(eased)
        };
    }

    /// Restart the curve from the current value toward a target shifted by
    /// `-scroll * FOV_SCROLL_STEP_DEGREES`.
    pub fn retarget(&mut self, scroll: f32) {
        if !scroll.is_finite() {
            return;
        }
        self.elapsed = 0.0;
        self.start = self.current;
        self.target = clamp_fov(self.target - scroll * FOV_SCROLL_STEP_DEGREES);
    }
}

fn clamp_fov(fov: f32) -> f32 {
    fov.clamp(FOV_MIN_DEGREES, FOV_MAX_DEGREES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ease_out_quart_hits_endpoints() {
        assert_eq!(ease_out_quart(0.0, 45.0, -44.0, 1.0), 45.0);
        assert!((ease_out_quart(1.0, 45.0, -44.0, 1.0) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn ease_out_quart_front_loads_change() {
        // Half the time covers far more than half the distance.
        let half = ease_out_quart(0.5, 0.0, 1.0, 1.0);
        assert!((half - 0.9375).abs() < 1e-6);
    }

    #[test]
    fn zoom_in_settles_exactly_on_target() {
        let mut easing = FovEasing::settled(45.0);
        easing.retarget(100.0);
        assert_eq!(easing.target(), FOV_MIN_DEGREES);
        assert_eq!(easing.start(), 45.0);

        let mut previous = easing.current();
        let mut steps = 0;
        while easing.elapsed() < FOV_EASING_DURATION {
            easing.advance(0.016);
            assert!(easing.current() <= previous, "zoom must be monotonic");
            assert!(easing.current() >= easing.target(), "zoom must not overshoot");
            previous = easing.current();
            steps += 1;
            assert!(steps < 1000);
        }
        assert_eq!(easing.current(), easing.target());
    }

    #[test]
    fn retarget_mid_flight_starts_from_current() {
        let mut easing = FovEasing::settled(45.0);
        easing.retarget(5.0);
        easing.advance(0.25);
        let mid = easing.current();
        easing.retarget(-2.0);
        assert_eq!(easing.start(), mid);
        assert_eq!(easing.elapsed(), 0.0);
        assert_eq!(easing.target(), 36.0);
        easing.advance(0.0);
        assert_eq!(easing.current(), mid);
    }

    #[test]
    fn bad_time_steps_are_ignored() {
        let mut easing = FovEasing::settled(45.0);
        easing.retarget(1.0);
        easing.advance(f32::NAN);
        easing.advance(-3.0);
        assert_eq!(easing.elapsed(), 0.0);
        assert_eq!(easing.current(), 45.0);
    }

    #[test]
    fn settled_clamps_out_of_range_fov() {
        assert_eq!(FovEasing::settled(90.0).current(), FOV_MAX_DEGREES);
        assert_eq!(FovEasing::settled(0.0).current(), FOV_MIN_DEGREES);
    }
}
