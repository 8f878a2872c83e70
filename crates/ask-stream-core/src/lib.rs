//! Streaming query client core.
//!
//! This crate submits a natural-language query to an answer endpoint and
//! reassembles the streamed `data:` frames into a growing answer:
//!
//! - **Frame decoding**: [`FrameDecoder`] turns arbitrarily split byte chunks
//!   into [`EventFrame`]s
//! - **Sessions**: [`StreamSession`] drives one request and reports
//!   [`SessionEvent`]s
//! - **Supervision**: [`SessionSupervisor`] keeps at most one session active
//!   and owns the observable [`ResponseState`]
//! - **Scrolling**: [`ScrollFollow`] decides when a viewport follows new text
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐ submit  ┌─────────────────────┐ spawn ┌──────────────────┐
//! │  Presentation    │────────▶│  SessionSupervisor  │──────▶│  StreamSession   │
//! │  (TUI / stdout)  │◀────────│  (ResponseState)    │◀──────│  (task)          │
//! └──────────────────┘  watch  └─────────────────────┘ mpsc  └────────┬─────────┘
//!                                                                     │ bytes
//!                                                            ┌────────▼─────────┐
//!                                                            │  QueryTransport  │
//!                                                            │  + FrameDecoder  │
//!                                                            └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use ask_stream_core::{ClientConfig, HttpTransport, SessionSupervisor};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = HttpTransport::new(&ClientConfig::default())?;
//! let (mut supervisor, mut events) = SessionSupervisor::new(Arc::new(transport));
//!
//! supervisor.submit("How do I create a form?");
//! while supervisor.state().is_loading {
//!     let Some(event) = events.recv().await else { break };
//!     supervisor.handle_event(event);
//! }
//!
//! println!("{}", supervisor.state().accumulated_text);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod error;
pub mod frame;
pub mod query;
pub mod scroll;
pub mod session;
pub mod state;
pub mod supervisor;
pub mod surface;
pub mod transport;

pub use config::ClientConfig;
pub use error::{QueryError, Result, TransportError};
pub use frame::{EventFrame, FrameDecoder, DATA_PREFIX};
pub use query::Query;
pub use scroll::{ScrollFollow, ScrollRequest, DEFAULT_THRESHOLD};
pub use session::{SessionEvent, SessionEventKind, SessionId, SessionStatus, StreamSession};
pub use state::{ResponseState, ResponseStatus, GENERIC_ERROR_MESSAGE};
pub use supervisor::SessionSupervisor;
pub use surface::SurfaceGate;
pub use transport::{ByteStream, HttpTransport, QueryTransport};

#[cfg(any(test, feature = "test-utils"))]
pub use transport::{MockReply, MockTransport};
