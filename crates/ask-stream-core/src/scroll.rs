//! Follow-the-bottom scroll policy.
//!
//! The viewport auto-follows streamed text only while the user is at (or
//! near) the bottom. Scrolling up to re-read stops the following; scrolling
//! back down resumes it. The decision is re-evaluated on every scroll.

/// Default distance from the bottom still counted as "at the bottom".
pub const DEFAULT_THRESHOLD: f64 = 100.0;

/// What the viewport should do after content grew.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollRequest {
    /// Leave the viewport where the user put it.
    Stay,
    /// Scroll to the end of the content.
    ScrollToEnd {
        /// Animate the scroll where the viewport supports it.
        smooth: bool,
    },
}

impl ScrollRequest {
    /// Returns `true` if the viewport should move to the end.
    #[must_use]
    pub const fn is_scroll(self) -> bool {
        matches!(self, Self::ScrollToEnd { .. })
    }
}

/// Stick-to-bottom state for one viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollFollow {
    stick_to_bottom: bool,
    threshold: f64,
}

impl ScrollFollow {
    /// Create a policy with the given tolerance, in the viewport's units.
    ///
    /// Negative thresholds are clamped to zero.
    #[must_use]
    pub fn new(threshold: f64) -> Self {
        Self {
            stick_to_bottom: true,
            threshold: threshold.max(0.0),
        }
    }

    /// Record a user scroll and recompute whether the viewport is at the bottom.
    pub fn on_viewport_scroll(&mut self, scroll_top: f64, scroll_height: f64, viewport_height: f64) {
        let distance = scroll_height - scroll_top - viewport_height;
        self.stick_to_bottom = distance <= self.threshold;
    }

    /// Decide whether new content should pull the viewport down.
    #[must_use]
    pub fn on_content_grow(&self) -> ScrollRequest {
        if self.stick_to_bottom {
            ScrollRequest::ScrollToEnd { smooth: true }
        } else {
            ScrollRequest::Stay
        }
    }

    /// Resume following, e.g. when a new query starts.
    pub fn stick(&mut self) {
        self.stick_to_bottom = true;
    }

    /// Whether the viewport currently follows new content.
    #[must_use]
    pub const fn stick_to_bottom(&self) -> bool {
        self.stick_to_bottom
    }

    /// The configured tolerance.
    #[must_use]
    pub const fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Default for ScrollFollow {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn follows_by_default() {
        let policy = ScrollFollow::default();
        assert!(policy.stick_to_bottom());
        assert_eq!(
            policy.on_content_grow(),
            ScrollRequest::ScrollToEnd { smooth: true }
        );
    }

    #[test]
    fn at_bottom_requests_scroll() {
        let mut policy = ScrollFollow::default();
        policy.on_viewport_scroll(900.0, 1000.0, 100.0);
        assert!(policy.on_content_grow().is_scroll());
    }

    #[test]
    fn scrolled_up_does_not_yank() {
        let mut policy = ScrollFollow::default();
        policy.on_viewport_scroll(200.0, 1000.0, 100.0);
        assert_eq!(policy.on_content_grow(), ScrollRequest::Stay);
    }

    #[test]
    fn within_threshold_counts_as_bottom() {
        let mut policy = ScrollFollow::new(100.0);
        policy.on_viewport_scroll(800.0, 1000.0, 100.0);
        assert!(policy.stick_to_bottom());

        policy.on_viewport_scroll(799.5, 1000.0, 100.0);
        assert!(!policy.stick_to_bottom());
    }

    #[test]
    fn re_evaluates_on_every_scroll() {
        let mut policy = ScrollFollow::default();
        policy.on_viewport_scroll(0.0, 1000.0, 100.0);
        assert!(!policy.on_content_grow().is_scroll());

        policy.on_viewport_scroll(900.0, 1000.0, 100.0);
        assert!(policy.on_content_grow().is_scroll());

        policy.on_viewport_scroll(100.0, 1000.0, 100.0);
        assert!(!policy.on_content_grow().is_scroll());
    }

    #[test]
    fn content_growth_does_not_change_state() {
        let mut policy = ScrollFollow::default();
        policy.on_viewport_scroll(0.0, 1000.0, 100.0);
        let _ = policy.on_content_grow();
        let _ = policy.on_content_grow();
        assert!(!policy.stick_to_bottom());
    }

    #[test]
    fn stick_re_arms_following() {
        let mut policy = ScrollFollow::new(2.0);
        policy.on_viewport_scroll(0.0, 50.0, 10.0);
        assert!(!policy.stick_to_bottom());
        policy.stick();
        assert!(policy.on_content_grow().is_scroll());
    }

    #[test]
    fn sub_pixel_jitter_is_absorbed() {
        let mut policy = ScrollFollow::new(1.0);
        policy.on_viewport_scroll(899.4, 1000.0, 100.0);
        assert!(policy.stick_to_bottom());
    }

    #[test]
    fn negative_threshold_is_clamped() {
        assert!(ScrollFollow::new(-5.0).threshold().abs() < f64::EPSILON);
    }
}
