use super::DeployTool;
use dashpush_core::DeployConfig;

pub const TOOL_NAME: &str = "deploy_to_github";

pub struct DeployToGithubTool;

impl DeployTool for DeployToGithubTool {
    fn name(&self) -> &str {
        TOOL_NAME
    }

    fn description(&self) -> &str {
        "Initializes Git, commits EVERYTHING, and pushes it to the configured repository. \
         Then links the deployed dashboard into every app of the app group. \
         Use this ONLY at the very end."
    }

    fn schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {}
        })
    }

    fn call(&self, _args: serde_json::Value, config: &DeployConfig) -> Result<String, String> {
        tracing::info!(workdir = %config.workdir.display(), "deploy_to_github called");
        let result = dashpush_core::deploy(config);
        if result.is_error() {
            Err(result.text())
        } else {
            Ok(result.text())
        }
    }
}
