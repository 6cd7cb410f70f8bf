use std::process::Stdio;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};

use crate::types::{McpServerConfig, Message, PermissionMode, QueryOptions};
use crate::{AgentError, Result};

// ─── AgentProcess ─────────────────────────────────────────────────────────

/// A running `claude --output-format stream-json --input-format stream-json`
/// subprocess.
///
/// The prompt goes in as one JSON user message on stdin; responses come back
/// as JSONL on stdout. Stderr is drained in a background task and surfaced
/// if the process exits non-zero.
pub(crate) struct AgentProcess {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    stdin: Option<ChildStdin>,
    stderr_buf: Arc<Mutex<String>>,
}

impl AgentProcess {
    /// Spawn the `claude` binary, send `prompt`, and close stdin.
    ///
    /// `CLAUDECODE` is removed from the environment so the driver also works
    /// when launched from inside another Claude session.
    pub(crate) async fn spawn(prompt: &str, opts: &QueryOptions) -> Result<Self> {
        let mut cmd = build_command(opts);
        cmd.env_remove("CLAUDECODE");
        for (k, v) in &opts.env {
            cmd.env(k, v);
        }

        let mut process = Self::from_command(cmd)?;

        let user_msg = serde_json::json!({
            "type": "user",
            "message": {
                "role": "user",
                "content": [{"type": "text", "text": prompt}]
            }
        });
        process.send_message(&user_msg).await?;
        process.stdin.take();

        Ok(process)
    }

    /// Spawn an arbitrary command in place of `claude`.
    #[cfg(test)]
    pub(crate) fn spawn_command(cmd: Command) -> Result<Self> {
        Self::from_command(cmd)
    }

    fn from_command(mut cmd: Command) -> Result<Self> {
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(AgentError::Io)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| AgentError::Process("stdout not captured".into()))?;
        let stdin = child.stdin.take();

        let stderr_buf = Arc::new(Mutex::new(String::new()));
        if let Some(stderr) = child.stderr.take() {
            let buf = Arc::clone(&stderr_buf);
            tokio::spawn(async move {
                let mut reader = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = reader.next_line().await {
                    if let Ok(mut b) = buf.lock() {
                        if !b.is_empty() {
                            b.push('\n');
                        }
                        b.push_str(&line);
                    }
                }
            });
        }

        Ok(Self {
            child,
            lines: BufReader::new(stdout).lines(),
            stdin,
            stderr_buf,
        })
    }

    async fn send_message(&mut self, msg: &serde_json::Value) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| AgentError::Process("stdin already closed".into()))?;

        let mut buf = serde_json::to_vec(msg)
            .map_err(|e| AgentError::Process(format!("failed to serialize stdin message: {e}")))?;
        buf.push(b'\n');

        stdin.write_all(&buf).await?;
        stdin.flush().await?;
        Ok(())
    }

    /// Read the next non-empty JSONL line from stdout and deserialize it.
    ///
    /// Lines with a `type` this driver does not model (`rate_limit_event`,
    /// `tool_progress`, `stream_event`, …) are skipped. A modelled type that
    /// fails to parse is an error. Returns `Ok(None)` on EOF.
    pub(crate) async fn next_message(&mut self) -> Result<Option<Message>> {
        loop {
            let Some(line) = self.lines.next_line().await? else {
                return Ok(None);
            };
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<Message>(trimmed) {
                Ok(msg) => return Ok(Some(msg)),
                Err(e) => {
                    if is_unknown_message_type(trimmed) {
                        tracing::debug!(line = trimmed, "skipping unrecognised message");
                        continue;
                    }
                    return Err(AgentError::Parse {
                        line: trimmed.to_owned(),
                        source: e,
                    });
                }
            }
        }
    }

    /// Wait for exit; `Some(error)` for a non-zero exit or a signal, with the
    /// captured stderr attached.
    pub(crate) async fn wait_exit_error(&mut self) -> Option<AgentError> {
        let status = match self.child.wait().await {
            Ok(s) => s,
            Err(e) => return Some(AgentError::Io(e)),
        };
        if status.success() {
            return None;
        }

        let stderr = self
            .stderr_buf
            .lock()
            .map(|b| b.clone())
            .unwrap_or_default();
        let what = match status.code() {
            Some(code) => format!("agent process exited with code {code}"),
            None => "agent process terminated by signal".to_string(),
        };
        let msg = if stderr.is_empty() {
            what
        } else {
            format!("{what}\nstderr: {stderr}")
        };
        Some(AgentError::Process(msg))
    }

    /// Best-effort kill.
    pub(crate) async fn kill(&mut self) {
        let _ = self.child.kill().await;
    }
}

/// `type` values [`Message`] models. A line carrying one of these must parse.
const MODELLED_TYPES: &[&str] = &["system", "assistant", "user", "result"];

/// Valid JSON whose `type` is not modelled is skipped. Anything else that
/// failed to parse is a protocol error.
fn is_unknown_message_type(line: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(line)
        .ok()
        .and_then(|v| v.get("type").and_then(|t| t.as_str()).map(str::to_owned))
        .is_some_and(|t| !MODELLED_TYPES.contains(&t.as_str()))
}

// ─── Command builder ──────────────────────────────────────────────────────

fn build_command(opts: &QueryOptions) -> Command {
    let exe = opts.path_to_executable.as_deref().unwrap_or("claude");
    let mut cmd = Command::new(exe);
    cmd.args(build_args(opts));
    if let Some(cwd) = &opts.cwd {
        cmd.current_dir(cwd);
    }
    cmd
}

fn build_args(opts: &QueryOptions) -> Vec<String> {
    let mut args: Vec<String> = [
        "--output-format",
        "stream-json",
        "--verbose",
        "--input-format",
        "stream-json",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    if let Some(model) = &opts.model {
        args.extend(["--model".into(), model.clone()]);
    }
    if let Some(max_turns) = opts.max_turns {
        args.extend(["--max-turns".into(), max_turns.to_string()]);
    }
    if !opts.allowed_tools.is_empty() {
        args.push("--allowed-tools".into());
        args.extend(opts.allowed_tools.iter().cloned());
    }
    if opts.permission_mode != PermissionMode::Default {
        args.push("--permission-mode".into());
        args.push(opts.permission_mode.as_str().to_string());
    }
    if !opts.setting_sources.is_empty() {
        args.extend(["--setting-sources".into(), opts.setting_sources.join(",")]);
    }
    if let Some(resume) = &opts.resume {
        args.extend(["--resume".into(), resume.clone()]);
    }
    if !opts.mcp_servers.is_empty() {
        args.extend(["--mcp-config".into(), mcp_config_json(&opts.mcp_servers)]);
    }
    args
}

/// `{"mcpServers":{"<name>":{"type":"stdio","command":…,"args":[…],"env":{…}}}}`
fn mcp_config_json(servers: &[McpServerConfig]) -> String {
    let mut mcp_servers = serde_json::Map::new();
    for srv in servers {
        let mut cfg = serde_json::json!({
            "type": "stdio",
            "command": srv.command,
        });
        if !srv.args.is_empty() {
            cfg["args"] = serde_json::json!(srv.args);
        }
        if !srv.env.is_empty() {
            cfg["env"] = serde_json::json!(srv.env);
        }
        mcp_servers.insert(srv.name.clone(), cfg);
    }
    serde_json::json!({ "mcpServers": mcp_servers }).to_string()
}

// ─── Tests ────────────────────────────────────────────────────────────────
