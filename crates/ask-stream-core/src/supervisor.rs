//! Session supervisor.
//!
//! Owns the single current [`StreamSession`] and the [`ResponseState`] it
//! feeds. Sessions report over a shared channel; every event carries the id of
//! the session that produced it, and events from anything but the current
//! session are dropped. That guard is what keeps a cancelled stream from
//! writing into a newer answer, since cancellation is only observed by the
//! session task at its next suspension point.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};

use crate::query::Query;
use crate::session::{SessionEvent, SessionEventKind, SessionId, SessionStatus, StreamSession};
use crate::state::ResponseState;
use crate::transport::QueryTransport;

/// Capacity of the channel sessions report on.
pub const EVENT_CHANNEL_CAPACITY: usize = 128;

/// Starts, supersedes and stops sessions, and applies their events.
pub struct SessionSupervisor {
    transport: Arc<dyn QueryTransport>,
    events: mpsc::Sender<SessionEvent>,
    state: watch::Sender<ResponseState>,
    active: Option<StreamSession>,
    last_id: SessionId,
}

impl std::fmt::Debug for SessionSupervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionSupervisor")
            .field("active", &self.active)
            .field("last_id", &self.last_id)
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl SessionSupervisor {
    /// Create a supervisor and the receiver its sessions report on.
    ///
    /// The caller pumps the receiver and hands every event back to
    /// [`SessionSupervisor::handle_event`].
    #[must_use]
    pub fn new(transport: Arc<dyn QueryTransport>) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (events, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let (state, _) = watch::channel(ResponseState::default());

        let supervisor = Self {
            transport,
            events,
            state,
            active: None,
            last_id: SessionId::default(),
        };
        (supervisor, rx)
    }

    /// Current response state.
    ///
    /// Do not hold the returned guard across an `.await`.
    #[must_use]
    pub fn state(&self) -> watch::Ref<'_, ResponseState> {
        self.state.borrow()
    }

    /// Subscribe to response state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ResponseState> {
        self.state.subscribe()
    }

    /// Id of the current session, if one is in flight.
    #[must_use]
    pub fn active_session(&self) -> Option<SessionId> {
        self.active.as_ref().map(StreamSession::id)
    }

    /// Status of the current session, if one is in flight.
    #[must_use]
    pub fn active_status(&self) -> Option<SessionStatus> {
        self.active.as_ref().map(StreamSession::status)
    }

    /// Record edited query text without submitting it.
    pub fn set_query(&mut self, text: impl Into<String>) {
        let text = text.into();
        self.state.send_if_modified(|state| {
            if state.query == text {
                false
            } else {
                state.query = text;
                true
            }
        });
    }

    /// Submit a query, superseding any session in flight.
    ///
    /// Blank input is ignored and returns `None`. Otherwise the previous
    /// session is cancelled before the new one starts, the answer is cleared
    /// and the new session's id is returned.
    pub fn submit(&mut self, input: &str) -> Option<SessionId> {
        let Ok(query) = Query::parse(input) else {
            tracing::debug!("Ignoring blank query");
            return None;
        };

        if let Some(previous) = self.cancel_active() {
            tracing::debug!(session = %previous, "Superseded by new query");
        }

        self.last_id = self.last_id.next();
        let id = self.last_id;

        self.state.send_modify(|state| state.begin(input));
        tracing::info!(session = %id, query = %query, "Submitting query");

        self.active = Some(StreamSession::start(
            Arc::clone(&self.transport),
            query,
            id,
            self.events.clone(),
        ));
        Some(id)
    }

    /// Stop the current session, keeping whatever text already arrived.
    ///
    /// Returns `true` if a session was in flight.
    pub fn stop(&mut self) -> bool {
        match self.cancel_active() {
            Some(id) => {
                tracing::info!(session = %id, "Stopped by user");
                self.state.send_modify(ResponseState::cancel);
                true
            }
            None => {
                self.state.send_if_modified(|state| {
                    let was_loading = state.is_loading;
                    state.is_loading = false;
                    was_loading
                });
                false
            }
        }
    }

    /// Cancel anything in flight and clear the answer and query.
    pub fn reset(&mut self) {
        if let Some(id) = self.cancel_active() {
            tracing::debug!(session = %id, "Cancelled by reset");
        }
        self.state.send_modify(ResponseState::clear);
    }

    /// Apply an event reported by a session.
    ///
    /// Events from sessions other than the current one are dropped. Returns
    /// `true` if the response state changed.
    pub fn handle_event(&mut self, event: SessionEvent) -> bool {
        let SessionEvent { session, kind } = event;

        let Some(active) = self.active.as_mut().filter(|active| active.id() == session) else {
            tracing::trace!(session = %session, "Dropping event from stale session");
            return false;
        };
        active.observe(&kind);

        match kind {
            SessionEventKind::Accepted => {
                tracing::debug!(session = %session, "Answer stream accepted");
                false
            }
            SessionEventKind::Delta(text) => {
                self.state.send_modify(|state| state.append(&text));
                true
            }
            SessionEventKind::Completed => {
                self.active = None;
                tracing::info!(session = %session, "Answer complete");
                self.state.send_modify(ResponseState::complete);
                true
            }
            SessionEventKind::Failed(error) => {
                self.active = None;
                tracing::error!(session = %session, error = %error, "Query failed");
                self.state.send_modify(ResponseState::fail);
                true
            }
            SessionEventKind::Cancelled => {
                self.active = None;
                self.state.send_modify(ResponseState::cancel);
                true
            }
        }
    }

    fn cancel_active(&mut self) -> Option<SessionId> {
        let mut session = self.active.take()?;
        session.cancel();
        Some(session.id())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::error::{Result, TransportError};
    use crate::state::{ResponseStatus, GENERIC_ERROR_MESSAGE};
    use crate::transport::MockTransport;

    fn data(text: &str) -> Result<Vec<u8>> {
        Ok(format!("data: {}\n", json!({ "response": text })).into_bytes())
    }

    fn supervisor() -> (Arc<MockTransport>, SessionSupervisor, mpsc::Receiver<SessionEvent>) {
        let mock = Arc::new(MockTransport::new());
        let (supervisor, rx) = SessionSupervisor::new(mock.clone());
        (mock, supervisor, rx)
    }

    async fn next_event(rx: &mut mpsc::Receiver<SessionEvent>) -> SessionEvent {
        tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for session event")
            .expect("event channel closed")
    }

    /// Apply events until the answer stops loading.
    async fn settle(supervisor: &mut SessionSupervisor, rx: &mut mpsc::Receiver<SessionEvent>) {
        while supervisor.state().is_loading {
            let event = next_event(rx).await;
            supervisor.handle_event(event);
        }
    }

    /// Apply events until the answer text equals `text`.
    async fn until_text(
        supervisor: &mut SessionSupervisor,
        rx: &mut mpsc::Receiver<SessionEvent>,
        text: &str,
    ) {
        while supervisor.state().accumulated_text != text {
            let event = next_event(rx).await;
            supervisor.handle_event(event);
        }
    }

    /// Assert every event still queued is discarded.
    async fn drain_ignored(supervisor: &mut SessionSupervisor, rx: &mut mpsc::Receiver<SessionEvent>) {
        while let Ok(Some(event)) = tokio::time::timeout(Duration::from_millis(50), rx.recv()).await {
            assert!(!supervisor.handle_event(event));
        }
    }

    #[tokio::test]
    async fn blank_query_is_a_noop() {
        let (mock, mut supervisor, _rx) = supervisor();

        assert!(supervisor.submit("   \n\t").is_none());
        tokio::task::yield_now().await;

        assert_eq!(mock.calls(), 0);
        assert_eq!(*supervisor.state(), ResponseState::default());
        assert!(supervisor.active_session().is_none());
    }

    #[tokio::test]
    async fn submitted_text_is_kept_as_typed() {
        let (mock, mut supervisor, mut rx) = supervisor();
        drop(mock.push_stream());

        assert!(supervisor.submit("  forms ").is_some());
        assert_eq!(supervisor.state().query, "  forms ");
        settle(&mut supervisor, &mut rx).await;

        assert_eq!(mock.queries(), vec!["forms"]);
        assert_eq!(supervisor.state().query, "  forms ");
    }

    #[tokio::test]
    async fn streams_deltas_in_order_and_completes_idle() {
        let (mock, mut supervisor, mut rx) = supervisor();
        let body = mock.push_stream();

        supervisor.submit("What is a Canopy element?").unwrap();
        {
            let state = supervisor.state();
            assert_eq!(state.query, "What is a Canopy element?");
            assert_eq!(state.status, ResponseStatus::Loading);
            assert!(state.is_loading);
        }

        body.send(data("Hel")).unwrap();
        until_text(&mut supervisor, &mut rx, "Hel").await;
        assert_eq!(supervisor.state().status, ResponseStatus::Streaming);
        assert_eq!(supervisor.active_status(), Some(SessionStatus::Active));

        body.send(data("lo")).unwrap();
        drop(body);
        settle(&mut supervisor, &mut rx).await;

        let state = supervisor.state();
        assert_eq!(state.accumulated_text, "Hello");
        assert_eq!(state.status, ResponseStatus::Idle);
        assert!(!state.is_loading);
        assert!(state.error.is_none());
        drop(state);
        assert!(supervisor.active_session().is_none());
    }

    #[tokio::test]
    async fn newer_query_supersedes_without_interleaving() {
        let (mock, mut supervisor, mut rx) = supervisor();
        let first_body = mock.push_stream();
        let second_body = mock.push_stream();

        let first = supervisor.submit("first").unwrap();
        first_body.send(data("one-a")).unwrap();
        until_text(&mut supervisor, &mut rx, "one-a").await;

        let second = supervisor.submit("second").unwrap();
        assert!(second > first);
        assert_eq!(supervisor.active_session(), Some(second));
        assert!(supervisor.state().accumulated_text.is_empty());
        assert_eq!(supervisor.state().status, ResponseStatus::Loading);

        // A delta read by the first session before it noticed cancellation.
        let late = SessionEvent {
            session: first,
            kind: SessionEventKind::Delta("one-b".into()),
        };
        assert!(!supervisor.handle_event(late));
        let _ = first_body.send(data("one-c"));

        second_body.send(data("two")).unwrap();
        drop(second_body);
        settle(&mut supervisor, &mut rx).await;

        assert_eq!(supervisor.state().accumulated_text, "two");
        assert_eq!(supervisor.state().status, ResponseStatus::Idle);
        assert_eq!(mock.queries(), vec!["first", "second"]);
        drain_ignored(&mut supervisor, &mut rx).await;
    }

    #[tokio::test]
    async fn stop_preserves_partial_text() {
        let (mock, mut supervisor, mut rx) = supervisor();
        let body = mock.push_stream();

        supervisor.submit("q").unwrap();
        body.send(data("partial")).unwrap();
        until_text(&mut supervisor, &mut rx, "partial").await;

        assert!(supervisor.stop());
        {
            let state = supervisor.state();
            assert_eq!(state.accumulated_text, "partial");
            assert_eq!(state.status, ResponseStatus::Cancelled);
            assert!(!state.is_loading);
            assert!(state.error.is_none());
        }

        let _ = body.send(data(" more"));
        drain_ignored(&mut supervisor, &mut rx).await;
        assert_eq!(supervisor.state().accumulated_text, "partial");
    }

    #[tokio::test]
    async fn stop_without_session_only_clears_loading() {
        let (_mock, mut supervisor, _rx) = supervisor();
        supervisor.set_query("draft");

        assert!(!supervisor.stop());
        let state = supervisor.state();
        assert_eq!(state.query, "draft");
        assert_eq!(state.status, ResponseStatus::Idle);
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn reset_after_completion_clears_everything() {
        let (mock, mut supervisor, mut rx) = supervisor();
        let body = mock.push_stream();

        supervisor.submit("q").unwrap();
        body.send(data("answer")).unwrap();
        drop(body);
        settle(&mut supervisor, &mut rx).await;
        assert_eq!(supervisor.state().accumulated_text, "answer");

        supervisor.reset();
        assert_eq!(*supervisor.state(), ResponseState::default());
    }

    #[tokio::test]
    async fn reset_mid_stream_discards_late_events() {
        let (mock, mut supervisor, mut rx) = supervisor();
        let body = mock.push_stream();

        supervisor.submit("q").unwrap();
        body.send(data("a")).unwrap();
        until_text(&mut supervisor, &mut rx, "a").await;

        supervisor.reset();
        let _ = body.send(data("b"));
        drain_ignored(&mut supervisor, &mut rx).await;
        assert_eq!(*supervisor.state(), ResponseState::default());
    }

    #[tokio::test]
    async fn rejected_request_sets_generic_error() {
        let (mock, mut supervisor, mut rx) = supervisor();
        mock.push_failure(TransportError::Status { status: 500 });

        supervisor.submit("q").unwrap();
        settle(&mut supervisor, &mut rx).await;

        let state = supervisor.state();
        assert_eq!(state.status, ResponseStatus::Error);
        assert_eq!(state.error.as_deref(), Some(GENERIC_ERROR_MESSAGE));
        assert!(state.accumulated_text.is_empty());
        assert!(!state.is_loading);
    }

    #[tokio::test]
    async fn body_error_keeps_partial_text() {
        let (mock, mut supervisor, mut rx) = supervisor();
        let body = mock.push_stream();

        supervisor.submit("q").unwrap();
        body.send(data("par")).unwrap();
        body.send(Err(TransportError::Body("connection reset".into()))).unwrap();
        settle(&mut supervisor, &mut rx).await;

        let state = supervisor.state();
        assert_eq!(state.status, ResponseStatus::Error);
        assert_eq!(state.accumulated_text, "par");
        assert_eq!(state.error.as_deref(), Some(GENERIC_ERROR_MESSAGE));
    }

    #[tokio::test]
    async fn malformed_line_does_not_break_the_stream() {
        let (mock, mut supervisor, mut rx) = supervisor();
        let body = mock.push_stream();

        supervisor.submit("q").unwrap();
        body.send(Ok(b"data: {\"response\":\"A\"}\ndata: {oops\n".to_vec()))
            .unwrap();
        body.send(data("B")).unwrap();
        drop(body);
        settle(&mut supervisor, &mut rx).await;

        assert_eq!(supervisor.state().accumulated_text, "AB");
        assert_eq!(supervisor.state().status, ResponseStatus::Idle);
    }

    #[tokio::test]
    async fn events_after_completion_are_ignored() {
        let (mock, mut supervisor, mut rx) = supervisor();
        let body = mock.push_stream();

        let id = supervisor.submit("q").unwrap();
        drop(body);
        settle(&mut supervisor, &mut rx).await;

        let late = SessionEvent {
            session: id,
            kind: SessionEventKind::Delta("late".into()),
        };
        assert!(!supervisor.handle_event(late));
        assert!(supervisor.state().accumulated_text.is_empty());
    }

    #[tokio::test]
    async fn subscribers_see_updates() {
        let (mock, mut supervisor, mut rx) = supervisor();
        let body = mock.push_stream();
        let mut watcher = supervisor.subscribe();

        supervisor.submit("q").unwrap();
        assert!(watcher.has_changed().unwrap());
        assert_eq!(watcher.borrow_and_update().status, ResponseStatus::Loading);

        body.send(data("x")).unwrap();
        drop(body);
        settle(&mut supervisor, &mut rx).await;
        assert_eq!(watcher.borrow_and_update().accumulated_text, "x");
    }

    #[tokio::test]
    async fn set_query_only_notifies_on_change() {
        let (_mock, mut supervisor, _rx) = supervisor();
        let mut watcher = supervisor.subscribe();

        supervisor.set_query("abc");
        assert!(watcher.has_changed().unwrap());
        let _ = watcher.borrow_and_update();

        supervisor.set_query("abc");
        assert!(!watcher.has_changed().unwrap());
    }
}
