//! One in-flight query.
//!
//! A [`StreamSession`] runs as a spawned task: it opens the transport, feeds
//! body chunks through a [`FrameDecoder`] and reports what happened as
//! [`SessionEvent`]s over a channel. It never touches the response state
//! itself; the supervisor applies events after checking that the session is
//! still current.

use std::fmt;
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::TransportError;
use crate::frame::{EventFrame, FrameDecoder};
use crate::query::Query;
use crate::transport::QueryTransport;

/// Generation number identifying a session.
///
/// Ids grow monotonically within one supervisor, so an event can be matched
/// against the current session without any shared state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SessionId(u64);

impl SessionId {
    /// Create an id for the given generation.
    #[must_use]
    pub const fn new(generation: u64) -> Self {
        Self(generation)
    }

    /// The generation number.
    #[must_use]
    pub const fn generation(self) -> u64 {
        self.0
    }

    /// The id following this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

/// Lifecycle of a single session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionStatus {
    /// Request issued, not yet accepted by the endpoint.
    Pending,
    /// Endpoint accepted the request; body is streaming.
    Active,
    /// Body ended normally.
    Completed,
    /// Stopped by the user or superseded by a newer query.
    Cancelled,
    /// Transport failed.
    Failed,
}

impl SessionStatus {
    /// Returns `true` once the session can no longer change.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// What a session reports.
#[derive(Debug)]
pub enum SessionEventKind {
    /// The endpoint accepted the request.
    Accepted,
    /// A piece of answer text, in arrival order.
    Delta(String),
    /// The body ended.
    Completed,
    /// The request or body failed. Kept for diagnostics only.
    Failed(TransportError),
    /// The session was cancelled.
    Cancelled,
}

impl SessionEventKind {
    /// Returns `true` for events after which the session emits nothing more.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed(_) | Self::Cancelled)
    }
}

/// An event tagged with the session that produced it.
#[derive(Debug)]
pub struct SessionEvent {
    /// Session that emitted the event.
    pub session: SessionId,
    /// What happened.
    pub kind: SessionEventKind,
}

/// Handle to a running session.
///
/// Dropping the handle cancels the session.
#[derive(Debug)]
pub struct StreamSession {
    id: SessionId,
    status: SessionStatus,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl StreamSession {
    /// Spawn a session that streams the answer to `query`.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn start(
        transport: Arc<dyn QueryTransport>,
        query: Query,
        id: SessionId,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_session(
            transport,
            query,
            Reporter { id, events },
            cancel.clone(),
        ));

        Self {
            id,
            status: SessionStatus::Pending,
            cancel,
            task,
        }
    }

    /// The session's id.
    #[must_use]
    pub const fn id(&self) -> SessionId {
        self.id
    }

    /// Last known status.
    #[must_use]
    pub const fn status(&self) -> SessionStatus {
        self.status
    }

    /// Returns `true` once the session task has exited.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Signal the session to stop.
    ///
    /// A read already in progress may still complete; its output is reported
    /// with this session's id and must be discarded by the receiver.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        if !self.status.is_terminal() {
            self.status = SessionStatus::Cancelled;
        }
    }

    /// Track the status implied by an event from this session.
    pub(crate) fn observe(&mut self, kind: &SessionEventKind) {
        if self.status.is_terminal() {
            return;
        }
        self.status = match kind {
            SessionEventKind::Accepted | SessionEventKind::Delta(_) => SessionStatus::Active,
            SessionEventKind::Completed => SessionStatus::Completed,
            SessionEventKind::Failed(_) => SessionStatus::Failed,
            SessionEventKind::Cancelled => SessionStatus::Cancelled,
        };
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Sends events tagged with one session id.
struct Reporter {
    id: SessionId,
    events: mpsc::Sender<SessionEvent>,
}

impl Reporter {
    /// Returns `false` if nobody is listening anymore.
    async fn send(&self, kind: SessionEventKind) -> bool {
        self.events
            .send(SessionEvent {
                session: self.id,
                kind,
            })
            .await
            .is_ok()
    }
}

async fn run_session(
    transport: Arc<dyn QueryTransport>,
    query: Query,
    reporter: Reporter,
    cancel: CancellationToken,
) {
    let outcome = tokio::select! {
        biased;
        () = cancel.cancelled() => SessionEventKind::Cancelled,
        outcome = stream_answer(transport.as_ref(), &query, &reporter) => outcome,
    };

    match &outcome {
        SessionEventKind::Failed(error) => {
            tracing::debug!(session = %reporter.id, error = %error, "Session failed");
        }
        other => {
            tracing::debug!(session = %reporter.id, outcome = ?other, "Session finished");
        }
    }

    reporter.send(outcome).await;
}

/// Open the request and forward deltas until the body ends.
async fn stream_answer(
    transport: &dyn QueryTransport,
    query: &Query,
    reporter: &Reporter,
) -> SessionEventKind {
    let mut body = match transport.open(query).await {
        Ok(body) => body,
        Err(error) => return SessionEventKind::Failed(error),
    };

    if !reporter.send(SessionEventKind::Accepted).await {
        return SessionEventKind::Cancelled;
    }

    let mut decoder = FrameDecoder::new();
    while let Some(chunk) = body.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(error) => return SessionEventKind::Failed(error),
        };

        for delta in decoder.push(&chunk).filter_map(EventFrame::into_delta) {
            if !reporter.send(SessionEventKind::Delta(delta)).await {
                return SessionEventKind::Cancelled;
            }
        }
    }

    decoder.finish();
    SessionEventKind::Completed
}
