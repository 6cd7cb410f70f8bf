use dashpush_core::DeployConfig;

pub mod deploy_to_github;

/// A tool the `mcp` server exposes to the agent.
///
/// `Ok` and `Err` both carry the text shown to the agent; `Err` marks the
/// call as failed.
pub trait DeployTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    fn schema(&self) -> serde_json::Value;
    fn call(&self, args: serde_json::Value, config: &DeployConfig) -> Result<String, String>;
}

pub fn all_tools() -> Vec<Box<dyn DeployTool>> {
    vec![Box::new(deploy_to_github::DeployToGithubTool)]
}
