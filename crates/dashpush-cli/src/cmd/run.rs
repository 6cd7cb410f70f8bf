use crate::cmd::mcp::SERVER_NAME;
use crate::settings::child_env;
use crate::tools::deploy_to_github::TOOL_NAME;
use anyhow::{Context, Result};
use dashpush_agent::{events, McpServerConfig, PermissionMode, QueryOptions, Translator};
use dashpush_core::DeployConfig;
use std::path::Path;

pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";

/// Built-in agent tools that run without a permission prompt.
const BUILTIN_TOOLS: &[&str] = &[
    "Bash",
    "Write",
    "Read",
    "Edit",
    "Glob",
    "Grep",
    "Task",
    "TodoWrite",
];

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Default, clap::Args)]
pub struct RunArgs {
    /// Agent session to resume
    #[arg(long, env = "RESUME_SESSION_ID")]
    pub resume: Option<String>,

    /// Change request for an existing dashboard (switches to continue mode)
    #[arg(long, env = "USER_PROMPT")]
    pub prompt: Option<String>,

    /// Model override
    #[arg(long, env = "DASHPUSH_MODEL")]
    pub model: Option<String>,

    /// Maximum agent turns (default: unlimited)
    #[arg(long)]
    pub max_turns: Option<u32>,
}

// ---------------------------------------------------------------------------
// Entry point
// ---------------------------------------------------------------------------

/// Drive the agent over the working tree and stream its line protocol to
/// stdout.
pub fn run(config: &DeployConfig, args: RunArgs) -> Result<()> {
    let exe = std::env::current_exe().context("cannot locate the dashpush executable")?;
    let prompt = match args.prompt.as_deref().filter(|p| !p.trim().is_empty()) {
        Some(request) => {
            tracing::info!(request, "continue mode");
            continue_prompt(request)
        }
        None => {
            tracing::info!("build mode");
            build_prompt()
        }
    };
    if let Some(session) = &args.resume {
        tracing::info!(session = %session, "resuming session");
    }
    let opts = query_options(config, &exe, args);

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;

    let outcome = rt
        .block_on(async {
            let stream = dashpush_agent::query(prompt, opts);
            Translator::new(std::io::stdout()).run(events(stream)).await
        })
        .context("agent run failed")?;

    tracing::info!(
        session = %outcome.session_id,
        cost = ?outcome.cost,
        succeeded = outcome.succeeded,
        "agent run finished"
    );
    if !outcome.succeeded {
        anyhow::bail!(
            "agent run ended with an error result (session {})",
            outcome.session_id
        );
    }
    Ok(())
}

fn query_options(config: &DeployConfig, exe: &Path, args: RunArgs) -> QueryOptions {
    let server = McpServerConfig {
        name: SERVER_NAME.into(),
        command: exe.to_string_lossy().into_owned(),
        args: vec!["mcp".into()],
        env: child_env(config),
    };

    let mut allowed_tools: Vec<String> = BUILTIN_TOOLS.iter().map(|t| t.to_string()).collect();
    allowed_tools.push(server.tool_name(TOOL_NAME));

    QueryOptions {
        model: args.model.or_else(|| Some(DEFAULT_MODEL.into())),
        max_turns: args.max_turns,
        allowed_tools,
        permission_mode: PermissionMode::AcceptEdits,
        // Picks up CLAUDE.md and .claude/skills/ from the working tree
        setting_sources: vec!["project".into()],
        resume: args.resume,
        mcp_servers: vec![server],
        cwd: Some(config.workdir.clone()),
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Prompt builders
// ---------------------------------------------------------------------------

fn build_prompt() -> String {
    "Use the frontend-design skill to analyse the app structure and generate design_brief.md. \
     Build src/pages/Dashboard.tsx following design_brief.md exactly. \
     Use the existing types and services from src/types/ and src/services/. \
     Deploy when done using the deploy_to_github tool."
        .to_string()
}

fn continue_prompt(request: &str) -> String {
    format!(
        "TASK: You MUST change the existing dashboard and deploy it.\n\n\
         User request: \"{request}\"\n\n\
         REQUIRED STEPS (all of them):\n\n\
         1. READ: read src/pages/Dashboard.tsx to understand the current structure\n\
         2. CHANGE: implement the user request with the Edit tool\n\
         3. BUILD: run 'npm run build' and make sure it compiles\n\
         4. DEPLOY: call deploy_to_github to push the changes\n\n\
         CRITICAL:\n\
         - You MUST change the code (use the Edit tool).\n\
         - You MUST call deploy_to_github at the end.\n\
         - Do NOT finish without deploying.\n\
         - Analysis alone is NOT enough; act on it.\n\n\
         The dashboard already exists. Make ONLY the requested changes, nothing more.\n\
         Start with step 1 NOW."
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
