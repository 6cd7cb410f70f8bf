//! Line protocol for whoever supervises an agent run.
//!
//! Every [`AgentEvent`] becomes exactly one JSON object on its own line:
//!
//! ```text
//! {"type":"think","content":"…"}
//! {"type":"tool","tool":"Write","input":"{\"file_path\":\"…\"}"}
//! {"type":"result","status":"success","cost":0.02,"session_id":"…"}
//! ```

use std::io::Write;

use futures::{Stream, StreamExt};
use serde::Serialize;

use crate::event::AgentEvent;
use crate::types::Message;
use crate::{AgentError, Result};

// ─── Records ──────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum OutputRecord<'a> {
    Think {
        content: &'a str,
    },
    Tool {
        tool: &'a str,
        input: String,
    },
    Result {
        status: &'static str,
        cost: Option<f64>,
        session_id: &'a str,
    },
}

impl<'a> From<&'a AgentEvent> for OutputRecord<'a> {
    fn from(event: &'a AgentEvent) -> Self {
        match event {
            AgentEvent::Thought { text } => OutputRecord::Think { content: text },
            AgentEvent::ToolInvocation { name, input } => OutputRecord::Tool {
                tool: name,
                input: input.to_string(),
            },
            AgentEvent::TerminalResult {
                succeeded,
                cost,
                session_id,
            } => OutputRecord::Result {
                status: if *succeeded { "success" } else { "error" },
                cost: *cost,
                session_id,
            },
        }
    }
}

// ─── Translator ───────────────────────────────────────────────────────────

/// How the run ended, taken from the terminal event.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub succeeded: bool,
    pub cost: Option<f64>,
    pub session_id: String,
}

/// Writes one record per event to `out`, flushing after every line.
pub struct Translator<W: Write> {
    out: W,
}

impl<W: Write> Translator<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Emit one line for `event`.
    pub fn emit(&mut self, event: &AgentEvent) -> Result<()> {
        let record = OutputRecord::from(event);
        let line = serde_json::to_string(&record)
            .map_err(|e| AgentError::Process(format!("failed to encode record: {e}")))?;
        writeln!(self.out, "{line}")?;
        self.out.flush()?;
        Ok(())
    }

    /// Consume `events` until the terminal result and return it.
    ///
    /// The stream is not polled again once the terminal result has been
    /// written. A stream that ends first yields [`AgentError::Incomplete`].
    pub async fn run<S>(&mut self, events: S) -> Result<RunOutcome>
    where
        S: Stream<Item = Result<AgentEvent>>,
    {
        futures::pin_mut!(events);
        while let Some(event) = events.next().await {
            let event = event?;
            self.emit(&event)?;
            if let AgentEvent::TerminalResult {
                succeeded,
                cost,
                session_id,
            } = event
            {
                return Ok(RunOutcome {
                    succeeded,
                    cost,
                    session_id,
                });
            }
        }
        Err(AgentError::Incomplete)
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

/// Adapt a message stream into an event stream.
pub fn events<S>(messages: S) -> impl Stream<Item = Result<AgentEvent>>
where
    S: Stream<Item = Result<Message>>,
{
    messages.flat_map(|msg| {
        let items: Vec<Result<AgentEvent>> = match msg {
            Ok(m) => AgentEvent::from_message(m).into_iter().map(Ok).collect(),
            Err(e) => vec![Err(e)],
        };
        futures::stream::iter(items)
    })
}

// ─── Tests ────────────────────────────────────────────────────────────────
