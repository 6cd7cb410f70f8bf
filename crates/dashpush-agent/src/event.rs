//! The agent conversation reduced to the three things a supervisor cares about.

use crate::types::{ContentBlock, Message};
use serde_json::Value;

/// One observable step of an agent run.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentEvent {
    /// Free text the assistant produced.
    Thought { text: String },
    /// The assistant called a tool.
    ToolInvocation { name: String, input: Value },
    /// The run is over. Always the last event of a stream.
    TerminalResult {
        succeeded: bool,
        cost: Option<f64>,
        session_id: String,
    },
}

impl AgentEvent {
    /// Flatten a wire message into events, preserving block order.
    ///
    /// System and user messages, and content blocks other than text and
    /// tool use, produce nothing.
    pub fn from_message(msg: Message) -> Vec<AgentEvent> {
        match msg {
            Message::Assistant(a) => a
                .message
                .content
                .into_iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(AgentEvent::Thought { text }),
                    ContentBlock::ToolUse { name, input, .. } => {
                        Some(AgentEvent::ToolInvocation { name, input })
                    }
                    ContentBlock::Thinking { .. } | ContentBlock::Other => None,
                })
                .collect(),
            Message::Result(r) => vec![AgentEvent::TerminalResult {
                succeeded: r.succeeded(),
                cost: r.total_cost_usd,
                session_id: r.session_id,
            }],
            Message::System(_) | Message::User(_) => Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentEvent::TerminalResult { .. })
    }
}
