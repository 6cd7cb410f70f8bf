use crate::dashboard::RetryPolicy;
use crate::error::{DeployError, Result};
use reqwest::Url;
use std::path::{Path, PathBuf};

// ---------------------------------------------------------------------------
// Defaults
// ---------------------------------------------------------------------------

pub const DEFAULT_API_BASE: &str = "https://my.living-apps.de/rest";
pub const DEFAULT_DASHBOARD_BASE: &str = "https://my.living-apps.de/github";
pub const DEFAULT_BRANCH: &str = "main";
pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_COMMIT_MESSAGE: &str = "Auto-Deploy";
pub const DEFAULT_DASHBOARD_TITLE: &str = "Dashboard";

// ---------------------------------------------------------------------------
// GitIdentity
// ---------------------------------------------------------------------------

/// Author and committer identity stamped on the deployment commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitIdentity {
    pub name: String,
    pub email: String,
}

impl Default for GitIdentity {
    fn default() -> Self {
        Self {
            name: "dashpush".to_string(),
            email: "dashpush@users.noreply.localhost".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// DeployConfig
// ---------------------------------------------------------------------------

/// Process-wide deployment settings.
///
/// Built once at startup from flags/environment and handed by reference to
/// the synchronizer, the activator, and the orchestrator. Nothing below this
/// value reads the environment.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub workdir: PathBuf,
    pub push_url: Option<String>,
    pub app_group_id: Option<String>,
    pub api_key: Option<String>,
    pub identity: GitIdentity,
    pub commit_message: String,
    pub branch: String,
    pub remote: String,
    pub api_base_url: String,
    pub dashboard_base_url: String,
    pub dashboard_title: String,
    pub retry: RetryPolicy,
}

/// The pair of settings that enables dashboard activation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationTarget {
    pub group_id: String,
    pub api_key: String,
}

impl DeployConfig {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
            push_url: None,
            app_group_id: None,
            api_key: None,
            identity: GitIdentity::default(),
            commit_message: DEFAULT_COMMIT_MESSAGE.to_string(),
            branch: DEFAULT_BRANCH.to_string(),
            remote: DEFAULT_REMOTE.to_string(),
            api_base_url: DEFAULT_API_BASE.to_string(),
            dashboard_base_url: DEFAULT_DASHBOARD_BASE.to_string(),
            dashboard_title: DEFAULT_DASHBOARD_TITLE.to_string(),
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_push_url(mut self, url: Option<String>) -> Self {
        self.push_url = non_empty(url);
        self
    }

    pub fn with_app_group(mut self, id: Option<String>) -> Self {
        self.app_group_id = non_empty(id);
        self
    }

    pub fn with_api_key(mut self, key: Option<String>) -> Self {
        self.api_key = non_empty(key);
        self
    }

    pub fn with_api_base(mut self, base: Option<String>) -> Self {
        if let Some(base) = non_empty(base) {
            self.api_base_url = base;
        }
        self
    }

    pub fn with_dashboard_base(mut self, base: Option<String>) -> Self {
        if let Some(base) = non_empty(base) {
            self.dashboard_base_url = base;
        }
        self
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Activation runs only when both the API key and the group id are set.
    pub fn activation(&self) -> Option<ActivationTarget> {
        match (&self.app_group_id, &self.api_key) {
            (Some(group_id), Some(api_key)) => Some(ActivationTarget {
                group_id: group_id.clone(),
                api_key: api_key.clone(),
            }),
            _ => None,
        }
    }

    /// Public URL of the deployed dashboard for `group_id`.
    pub fn dashboard_url(&self, group_id: &str) -> String {
        format!(
            "{}/{}/",
            self.dashboard_base_url.trim_end_matches('/'),
            group_id
        )
    }

    /// REST endpoint under the API base. Each segment is percent-encoded, so
    /// an id can never reach a different endpoint.
    pub fn api_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.api_base_url)
            .map_err(|e| DeployError::Config(format!("invalid API base URL: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| {
                DeployError::Config(format!(
                    "API base URL cannot take a path: {}",
                    self.api_base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
