use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

// ─── Wire messages ────────────────────────────────────────────────────────

/// Messages emitted by `claude --output-format stream-json`, discriminated by
/// the JSON `"type"` field.
///
/// Only the fields the translator reads are modelled; everything else on the
/// wire is ignored during deserialization.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    System(SystemMessage),
    Assistant(AssistantMessage),
    User(UserMessage),
    Result(ResultMessage),
}

impl Message {
    pub fn session_id(&self) -> &str {
        match self {
            Message::System(m) => &m.session_id,
            Message::Assistant(m) => &m.session_id,
            Message::User(m) => &m.session_id,
            Message::Result(m) => &m.session_id,
        }
    }

    pub fn is_result(&self) -> bool {
        matches!(self, Message::Result(_))
    }
}

/// `type = "system"`: init, status and task notifications. Only the subtype
/// is kept for logging.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SystemMessage {
    pub subtype: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// `type = "assistant"`: one model turn, possibly several content blocks.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssistantMessage {
    pub message: AssistantContent,
    #[serde(default)]
    pub parent_tool_use_id: Option<String>,
    pub session_id: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AssistantContent {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
}

/// Content blocks within an assistant message.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        /// Tool inputs vary per tool, so `Value` is the honest type here.
        input: serde_json::Value,
    },
    Thinking {
        thinking: String,
    },
    /// Block kinds this driver does not render (e.g. `redacted_thinking`).
    #[serde(other)]
    Other,
}

/// `type = "user"`: tool results fed back to the model. Not rendered.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserMessage {
    pub session_id: String,
}

/// `type = "result"`: the terminal message of every query.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ResultMessage {
    pub subtype: ResultSubtype,
    pub session_id: String,
    #[serde(default)]
    pub is_error: bool,
    /// Absent or `null` when the CLI could not price the run.
    #[serde(default)]
    pub total_cost_usd: Option<f64>,
    #[serde(default)]
    pub num_turns: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl ResultMessage {
    pub fn succeeded(&self) -> bool {
        !self.is_error && self.subtype == ResultSubtype::Success
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultSubtype {
    Success,
    ErrorDuringExecution,
    ErrorMaxTurns,
    ErrorMaxBudgetUsd,
    #[serde(other)]
    Other,
}

// ─── QueryOptions ─────────────────────────────────────────────────────────

/// Options for one agent query.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Claude model name
    pub model: Option<String>,
    /// Maximum number of agentic turns
    pub max_turns: Option<u32>,
    /// Tool names that are auto-approved
    pub allowed_tools: Vec<String>,
    pub permission_mode: PermissionMode,
    /// Setting sources to load (`project` picks up CLAUDE.md and skills from `cwd`)
    pub setting_sources: Vec<String>,
    /// Session ID to resume
    pub resume: Option<String>,
    pub mcp_servers: Vec<McpServerConfig>,
    /// Working directory for the subprocess (default: current dir)
    pub cwd: Option<PathBuf>,
    /// Additional environment variables for the subprocess
    pub env: HashMap<String, String>,
    /// Custom path to the `claude` binary (default: `"claude"`)
    pub path_to_executable: Option<String>,
}

/// Permission mode. Controls how tool executions are authorized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PermissionMode {
    #[default]
    Default,
    /// Auto-accept file edit operations
    AcceptEdits,
    BypassPermissions,
    Plan,
}

impl PermissionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionMode::Default => "default",
            PermissionMode::AcceptEdits => "acceptEdits",
            PermissionMode::BypassPermissions => "bypassPermissions",
            PermissionMode::Plan => "plan",
        }
    }
}

/// An stdio MCP server the agent should start.
#[derive(Debug, Clone)]
pub struct McpServerConfig {
    /// Logical name; tools show up as `mcp__<name>__<tool>`
    pub name: String,
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
}

impl McpServerConfig {
    /// Fully qualified tool name as the agent sees it.
    pub fn tool_name(&self, tool: &str) -> String {
        format!("mcp__{}__{}", self.name, tool)
    }
}
