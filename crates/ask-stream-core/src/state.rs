//! Observable response state.
//!
//! One `ResponseState` exists per supervisor. Only the supervisor mutates it;
//! presentation reads it through [`crate::SessionSupervisor::state`] or a
//! `watch` subscription.

/// Fixed user-facing message shown when a query fails.
pub const GENERIC_ERROR_MESSAGE: &str = "Sorry, something went wrong.";

/// Lifecycle status of the answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ResponseStatus {
    /// Nothing in flight. Text, if any, is a completed answer.
    #[default]
    Idle,
    /// Request sent, no text received yet.
    Loading,
    /// Text is arriving.
    Streaming,
    /// The request failed.
    Error,
    /// The request was stopped or superseded.
    Cancelled,
}

impl ResponseStatus {
    /// Human-readable display string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "Idle",
            Self::Loading => "Loading",
            Self::Streaming => "Streaming",
            Self::Error => "Error",
            Self::Cancelled => "Cancelled",
        }
    }

    /// Returns `true` while a request is in flight.
    #[must_use]
    pub const fn is_in_flight(&self) -> bool {
        matches!(self, Self::Loading | Self::Streaming)
    }
}

/// The answer as presentation sees it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseState {
    /// Query text, as last edited or submitted.
    pub query: String,
    /// Answer text received so far.
    pub accumulated_text: String,
    /// Current lifecycle status.
    pub status: ResponseStatus,
    /// Whether a request is in flight.
    pub is_loading: bool,
    /// User-facing failure message, set only while `status` is `Error`.
    pub error: Option<String>,
}

impl ResponseState {
    /// Returns `true` if any answer text has arrived.
    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.accumulated_text.is_empty()
    }

    /// Start a new answer. `input` is kept as typed; only the request trims it.
    pub(crate) fn begin(&mut self, input: &str) {
        input.clone_into(&mut self.query);
        self.accumulated_text.clear();
        self.status = ResponseStatus::Loading;
        self.is_loading = true;
        self.error = None;
    }

    pub(crate) fn append(&mut self, delta: &str) {
        self.accumulated_text.push_str(delta);
        if self.status == ResponseStatus::Loading {
            self.status = ResponseStatus::Streaming;
        }
    }

    pub(crate) fn complete(&mut self) {
        self.status = ResponseStatus::Idle;
        self.is_loading = false;
    }

    pub(crate) fn fail(&mut self) {
        self.status = ResponseStatus::Error;
        self.is_loading = false;
        self.error = Some(GENERIC_ERROR_MESSAGE.to_string());
    }

    pub(crate) fn cancel(&mut self) {
        self.status = ResponseStatus::Cancelled;
        self.is_loading = false;
    }

    pub(crate) fn clear(&mut self) {
        *self = Self::default();
    }
}
