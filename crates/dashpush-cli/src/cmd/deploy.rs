use crate::cmd::mcp::ToolCallResult;
use anyhow::Result;
use dashpush_core::DeployConfig;

/// Run one deployment and print the same payload the `deploy_to_github`
/// tool returns.
pub fn run(config: &DeployConfig) -> Result<()> {
    let result = dashpush_core::deploy(config);
    let payload = ToolCallResult::text(result.text(), result.is_error());
    println!("{}", serde_json::to_string_pretty(&payload)?);

    if result.is_error() {
        anyhow::bail!("deployment failed");
    }
    Ok(())
}
