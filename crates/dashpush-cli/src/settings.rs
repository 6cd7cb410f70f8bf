use anyhow::{Context, Result};
use dashpush_core::DeployConfig;
use std::collections::HashMap;
use std::path::PathBuf;

pub const ENV_APP_DIR: &str = "APP_DIR";
pub const ENV_PUSH_URL: &str = "GIT_PUSH_URL";
pub const ENV_APP_GROUP: &str = "REPO_NAME";
pub const ENV_API_KEY: &str = "LIVINGAPPS_API_KEY";
pub const ENV_API_BASE: &str = "DASHPUSH_API_BASE";
pub const ENV_DASHBOARD_BASE: &str = "DASHPUSH_DASHBOARD_BASE";

/// Deployment settings shared by every subcommand, read once from flags or
/// the environment.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct Settings {
    /// Working tree to deploy (default: current directory)
    #[arg(long, global = true, env = ENV_APP_DIR)]
    pub workdir: Option<PathBuf>,

    /// Remote URL the working tree is pushed to
    #[arg(long, global = true, env = ENV_PUSH_URL, hide_env_values = true)]
    pub push_url: Option<String>,

    /// Dashboard app-group id
    #[arg(long, global = true, env = ENV_APP_GROUP)]
    pub app_group: Option<String>,

    /// Dashboard API key
    #[arg(long, global = true, env = ENV_API_KEY, hide_env_values = true)]
    pub api_key: Option<String>,

    /// Dashboard REST API base URL
    #[arg(long, global = true, env = ENV_API_BASE)]
    pub api_base: Option<String>,

    /// Base URL under which deployed dashboards are served
    #[arg(long, global = true, env = ENV_DASHBOARD_BASE)]
    pub dashboard_base: Option<String>,
}

impl Settings {
    /// Fold the settings into the immutable config the core operates on.
    pub fn deploy_config(&self) -> Result<DeployConfig> {
        let workdir = match &self.workdir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("cannot determine current directory")?,
        };
        Ok(DeployConfig::new(workdir)
            .with_push_url(self.push_url.clone())
            .with_app_group(self.app_group.clone())
            .with_api_key(self.api_key.clone())
            .with_api_base(self.api_base.clone())
            .with_dashboard_base(self.dashboard_base.clone()))
    }
}

/// Environment handed to the `mcp` child so it deploys exactly what this
/// process resolved.
pub fn child_env(config: &DeployConfig) -> HashMap<String, String> {
    let mut env = HashMap::from([
        (
            ENV_APP_DIR.to_string(),
            config.workdir.to_string_lossy().into_owned(),
        ),
        (ENV_API_BASE.to_string(), config.api_base_url.clone()),
        (
            ENV_DASHBOARD_BASE.to_string(),
            config.dashboard_base_url.clone(),
        ),
    ]);
    let optional = [
        (ENV_PUSH_URL, &config.push_url),
        (ENV_APP_GROUP, &config.app_group_id),
        (ENV_API_KEY, &config.api_key),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            env.insert(key.to_string(), value.clone());
        }
    }
    env
}
