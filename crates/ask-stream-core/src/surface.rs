//! Visibility of the hosting surface.

use crate::supervisor::SessionSupervisor;

/// Open/closed flag for the panel that shows the answer.
///
/// Closing the surface resets the supervisor, so a dismissed panel never
/// keeps streaming in the background.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SurfaceGate {
    open: bool,
}

impl SurfaceGate {
    /// Create a closed gate.
    #[must_use]
    pub const fn new() -> Self {
        Self { open: false }
    }

    /// Whether the surface is showing.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }

    /// Open or close the surface. Closing resets `supervisor`.
    ///
    /// Returns `true` if visibility changed.
    pub fn set_open(&mut self, open: bool, supervisor: &mut SessionSupervisor) -> bool {
        if self.open == open {
            return false;
        }
        self.open = open;
        if !open {
            tracing::debug!("Surface closed, resetting answer");
            supervisor.reset();
        }
        true
    }

    /// Flip visibility.
    pub fn toggle(&mut self, supervisor: &mut SessionSupervisor) {
        self.set_open(!self.open, supervisor);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::state::{ResponseState, ResponseStatus};
    use crate::transport::MockTransport;

    #[tokio::test]
    async fn closing_cancels_and_clears() {
        let mock = Arc::new(MockTransport::new());
        let _body = mock.push_stream();
        let (mut supervisor, _rx) = SessionSupervisor::new(mock);
        let mut gate = SurfaceGate::new();

        assert!(gate.set_open(true, &mut supervisor));
        supervisor.submit("What is a Collection?").unwrap();
        assert_eq!(supervisor.state().status, ResponseStatus::Loading);

        assert!(gate.set_open(false, &mut supervisor));
        assert!(!gate.is_open());
        assert!(supervisor.active_session().is_none());
        assert_eq!(*supervisor.state(), ResponseState::default());
    }

    #[tokio::test]
    async fn opening_keeps_state() {
        let mock = Arc::new(MockTransport::new());
        let (mut supervisor, _rx) = SessionSupervisor::new(mock);
        supervisor.set_query("draft");

        let mut gate = SurfaceGate::new();
        gate.toggle(&mut supervisor);
        assert!(gate.is_open());
        assert_eq!(supervisor.state().query, "draft");

        assert!(!gate.set_open(true, &mut supervisor));
        gate.toggle(&mut supervisor);
        assert!(supervisor.state().query.is_empty());
    }
}
