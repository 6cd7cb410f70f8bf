//! `dashpush-agent`: drives the Claude CLI and turns its conversation into
//! a line protocol.
//!
//! # Architecture
//!
//! ```text
//! QueryOptions
//!     │
//!     ▼
//! AgentProcess    ← spawns `claude --output-format stream-json …`
//!     │              reads JSONL from stdout
//!     ▼
//! QueryStream     ← futures::Stream<Item = Result<Message>>
//!     │              background task + mpsc channel
//!     ▼
//! events()        ← Message → AgentEvent (Thought / ToolInvocation / TerminalResult)
//!     │
//!     ▼
//! Translator      ← one JSON line per event on any `io::Write`
//! ```
//!
//! # Quick start
//!
//! ```rust,ignore
//! use dashpush_agent::{events, query, QueryOptions, Translator};
//!
//! let stream = query("Build the dashboard.", QueryOptions::default());
//! let outcome = Translator::new(std::io::stdout()).run(events(stream)).await?;
//! println!("session {}", outcome.session_id);
//! ```

pub mod error;
pub mod event;
pub mod translate;
pub mod types;

pub(crate) mod process;
pub mod stream;


pub use error::AgentError;
pub use event::AgentEvent;
pub use stream::QueryStream;
pub use translate::{events, RunOutcome, Translator};
pub use types::{
    AssistantContent, AssistantMessage, ContentBlock, McpServerConfig, Message, PermissionMode,
    QueryOptions, ResultMessage, ResultSubtype, SystemMessage, UserMessage,
};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, AgentError>;

/// Start one agent query.
///
/// The returned stream yields messages as the subprocess emits them and
/// ends after the first [`Message::Result`] or on process exit. Must be
/// called inside a Tokio runtime.
pub fn query(prompt: impl Into<String>, opts: QueryOptions) -> QueryStream {
    QueryStream::new(prompt.into(), opts)
}
