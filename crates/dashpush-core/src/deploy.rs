//! Deployment orchestrator: push first, then activate dashboard links.
//!
//! Only a failed push is a hard failure. Everything after a successful push
//! degrades to a success summary that explains what did not happen.

use crate::config::{ActivationTarget, DeployConfig};
use crate::dashboard::{
    ActivationOutcome, Activator, AppStatus, HttpDashboardApi, ThreadSleeper,
};
use crate::error::Result;
use crate::sync::{SyncReport, Synchronizer};
use serde::Serialize;
use tracing::{error, info};

// ---------------------------------------------------------------------------
// DeploymentResult
// ---------------------------------------------------------------------------

/// The single result of one deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DeploymentResult {
    Success { summary: String },
    Failure { reason: String },
}

impl DeploymentResult {
    pub fn is_error(&self) -> bool {
        matches!(self, DeploymentResult::Failure { .. })
    }

    /// Text handed back to the agent.
    pub fn text(&self) -> String {
        match self {
            DeploymentResult::Success { summary } => summary.clone(),
            DeploymentResult::Failure { reason } => format!("Deployment failed: {reason}"),
        }
    }
}

// ---------------------------------------------------------------------------
// Publisher
// ---------------------------------------------------------------------------

/// Pushes the working tree. Implemented by [`Synchronizer`].
pub trait Publisher {
    fn publish(&self, push_url: &str) -> Result<SyncReport>;
}

impl Publisher for Synchronizer<'_> {
    fn publish(&self, push_url: &str) -> Result<SyncReport> {
        self.sync(push_url)
    }
}

// ---------------------------------------------------------------------------
// Entry points
// ---------------------------------------------------------------------------

/// Run a full deployment against the real git binary and dashboard API.
pub fn deploy(config: &DeployConfig) -> DeploymentResult {
    let publisher = match Synchronizer::new(config) {
        Ok(s) => s,
        Err(e) => return failure(e.to_string()),
    };
    deploy_with(config, &publisher, |target| {
        let api = HttpDashboardApi::new(config, &target.api_key)?;
        Ok(Activator::new(&api, &ThreadSleeper, config).activate(&target.group_id))
    })
}

/// Deployment with injectable publisher and activation step.
///
/// `activate` only runs after a successful push and only when the config
/// carries both an API key and an app group.
pub fn deploy_with<F>(
    config: &DeployConfig,
    publisher: &dyn Publisher,
    activate: F,
) -> DeploymentResult
where
    F: FnOnce(&ActivationTarget) -> Result<ActivationOutcome>,
{
    let Some(push_url) = config.push_url.as_deref() else {
        return failure("no push URL configured (GIT_PUSH_URL)".to_string());
    };

    let report = match publisher.publish(push_url) {
        Ok(r) => r,
        Err(e) => return failure(e.to_string()),
    };

    let summary = match config.activation() {
        None => {
            info!("dashboard activation not configured, skipping");
            format!("Deployment successful! Code pushed ({}).", report.head)
        }
        Some(target) => match activate(&target) {
            Ok(outcome) => summarize(&outcome),
            Err(e) => format!(
                "Deployment successful! Code pushed, but dashboard links could not be added: {e}"
            ),
        },
    };

    info!(summary = %summary, "deployment finished");
    DeploymentResult::Success { summary }
}

fn failure(reason: String) -> DeploymentResult {
    error!(reason = %reason, "deployment failed");
    DeploymentResult::Failure { reason }
}

fn summarize(outcome: &ActivationOutcome) -> String {
    match outcome {
        ActivationOutcome::NoApps => {
            "Deployment successful! No apps found in app group, dashboard links skipped."
                .to_string()
        }
        ActivationOutcome::LookupFailed { reason } => format!(
            "Deployment successful! Code pushed, but dashboard links could not be added: {reason}"
        ),
        ActivationOutcome::DashboardUnreachable { .. } => {
            "Deployment successful! Dashboard links could not be activated.".to_string()
        }
        ActivationOutcome::Activated { apps, .. } => {
            let failed: Vec<String> = apps
                .iter()
                .filter_map(|a| match &a.status {
                    AppStatus::Updated => None,
                    AppStatus::Failed { reason } => Some(format!("{}: {reason}", a.app_id)),
                })
                .collect();
            if failed.is_empty() {
                "Deployment successful! Code pushed and dashboard links added.".to_string()
            } else {
                format!(
                    "Deployment successful! Dashboard links added for {} of {} apps; failed: {}",
                    apps.len() - failed.len(),
                    apps.len(),
                    failed.join(", ")
                )
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
