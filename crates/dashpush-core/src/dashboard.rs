//! Dashboard activator.
//!
//! After a push, the hosting side needs a while to build and serve the
//! dashboard. The activator polls the public dashboard URL under a bounded
//! [`RetryPolicy`] and, once it answers 200, writes two link parameters onto
//! every app of the app group so the dashboard shows up in each app's header.
//!
//! Network access goes through [`DashboardApi`] and waiting goes through
//! [`Sleeper`], so the polling loop can be driven by fakes in tests.

use crate::config::DeployConfig;
use crate::error::{DeployError, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::redirect::Policy;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const URL_PARAM: &str = "la_page_header_additional_url";
pub const TITLE_PARAM: &str = "la_page_header_additional_title";

const GROUP_TIMEOUT: Duration = Duration::from_secs(30);
const PARAM_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Bounded polling schedule for the dashboard reachability check.
///
/// `max_attempts` probes in total, `interval` between consecutive probes
/// (no sleep after the last one), each probe capped at `attempt_timeout`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
    pub attempt_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 180,
            interval: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(5),
        }
    }
}

// ---------------------------------------------------------------------------
// Seams
// ---------------------------------------------------------------------------

/// One parameter write on an app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamUpdate<'a> {
    pub name: &'a str,
    pub description: &'a str,
    pub value: &'a str,
}

pub trait DashboardApi {
    /// App ids of the group, in the order the group lists them.
    fn app_ids(&self, group_id: &str) -> Result<Vec<String>>;
    /// `true` only for an HTTP 200 answer; every other status or transport
    /// error is "not yet".
    fn is_reachable(&self, url: &str, timeout: Duration) -> bool;
    fn set_param(&self, app_id: &str, update: &ParamUpdate<'_>) -> Result<()>;
}

pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Blocks the current thread.
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

// ---------------------------------------------------------------------------
// HttpDashboardApi
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AppGroup {
    #[serde(default)]
    apps: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ParamBody<'a> {
    description: &'a str,
    r#type: &'static str,
    value: &'a str,
}

/// `DashboardApi` over the REST API, authenticated with an API key header.
pub struct HttpDashboardApi {
    api: Client,
    probe: Client,
    config: DeployConfig,
}

impl HttpDashboardApi {
    pub fn new(config: &DeployConfig, api_key: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key)
            .map_err(|_| DeployError::Config("API key is not a valid header value".into()))?;
        headers.insert("x-api-key", key);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let api = Client::builder().default_headers(headers).build()?;
        // The public dashboard URL gets no credentials. Only a direct 200
        // counts, so redirects are not followed.
        let probe = Client::builder().redirect(Policy::none()).build()?;

        // Reject a malformed API base before any request goes out.
        config.api_url(&[])?;
        Ok(Self {
            api,
            probe,
            config: config.clone(),
        })
    }
}

impl DashboardApi for HttpDashboardApi {
    fn app_ids(&self, group_id: &str) -> Result<Vec<String>> {
        let url = self.config.api_url(&["appgroups", group_id])?;
        let resp = self.api.get(url.clone()).timeout(GROUP_TIMEOUT).send()?;
        if !resp.status().is_success() {
            return Err(DeployError::Status {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }
        let group: AppGroup = resp.json()?;

        group
            .apps
            .iter()
            .map(|(key, app)| {
                app.get("id")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| DeployError::AppGroup(format!("app '{key}' has no id")))
            })
            .collect()
    }

    fn is_reachable(&self, url: &str, timeout: Duration) -> bool {
        match self.probe.get(url).timeout(timeout).send() {
            Ok(resp) => resp.status() == reqwest::StatusCode::OK,
            Err(e) => {
                debug!(error = %e, "dashboard probe failed");
                false
            }
        }
    }

    fn set_param(&self, app_id: &str, update: &ParamUpdate<'_>) -> Result<()> {
        let url = self.config.api_url(&["apps", app_id, "params", update.name])?;
        let body = ParamBody {
            description: update.description,
            r#type: "string",
            value: update.value,
        };
        let resp = self
            .api
            .put(url.clone())
            .json(&body)
            .timeout(PARAM_TIMEOUT)
            .send()?;
        if !resp.status().is_success() {
            return Err(DeployError::Status {
                url: url.to_string(),
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppStatus {
    Updated,
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppActivation {
    pub app_id: String,
    pub status: AppStatus,
}

/// Result of one activation pass. None of these is a hard failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// The group has no apps; nothing was polled.
    NoApps,
    /// The group could not be read.
    LookupFailed { reason: String },
    /// The dashboard never answered 200 within the retry policy.
    DashboardUnreachable { attempts: u32 },
    Activated {
        url: String,
        apps: Vec<AppActivation>,
    },
}

impl ActivationOutcome {
    pub fn failed_apps(&self) -> Vec<&AppActivation> {
        match self {
            ActivationOutcome::Activated { apps, .. } => apps
                .iter()
                .filter(|a| matches!(a.status, AppStatus::Failed { .. }))
                .collect(),
            _ => Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Activator
// ---------------------------------------------------------------------------

pub struct Activator<'a> {
    api: &'a dyn DashboardApi,
    sleeper: &'a dyn Sleeper,
    config: &'a DeployConfig,
}

impl<'a> Activator<'a> {
    pub fn new(
        api: &'a dyn DashboardApi,
        sleeper: &'a dyn Sleeper,
        config: &'a DeployConfig,
    ) -> Self {
        Self {
            api,
            sleeper,
            config,
        }
    }

    /// Wait for the group's dashboard and point every app of the group at it.
    pub fn activate(&self, group_id: &str) -> ActivationOutcome {
        info!(group_id, "loading app group");
        let app_ids = match self.api.app_ids(group_id) {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "could not load app group");
                return ActivationOutcome::LookupFailed {
                    reason: e.to_string(),
                };
            }
        };
        info!(count = app_ids.len(), "apps found");

        if app_ids.is_empty() {
            warn!("no apps found in app group");
            return ActivationOutcome::NoApps;
        }

        let url = self.config.dashboard_url(group_id);
        info!(url = %url, "waiting for dashboard");
        let Some(attempt) = self.wait_until_reachable(&url) else {
            let attempts = self.config.retry.max_attempts;
            warn!(attempts, "timed out waiting for dashboard");
            return ActivationOutcome::DashboardUnreachable { attempts };
        };
        info!(attempt, "dashboard is reachable");

        let apps = app_ids
            .iter()
            .map(|app_id| self.activate_app(app_id, &url))
            .collect();
        ActivationOutcome::Activated { url, apps }
    }

    /// Probe `url` under the retry policy. Returns the 1-indexed attempt that
    /// saw a 200, or `None` once the ceiling is reached.
    pub fn wait_until_reachable(&self, url: &str) -> Option<u32> {
        let policy = self.config.retry;
        for attempt in 1..=policy.max_attempts {
            if self.api.is_reachable(url, policy.attempt_timeout) {
                return Some(attempt);
            }
            if attempt < policy.max_attempts {
                self.sleeper.sleep(policy.interval);
            }
        }
        None
    }

    /// Write both link parameters; both are attempted even if the first fails.
    fn activate_app(&self, app_id: &str, url: &str) -> AppActivation {
        let updates = [
            ParamUpdate {
                name: URL_PARAM,
                description: "dashboard_url",
                value: url,
            },
            ParamUpdate {
                name: TITLE_PARAM,
                description: "dashboard_title",
                value: &self.config.dashboard_title,
            },
        ];

        let errors: Vec<String> = updates
            .iter()
            .filter_map(|u| {
                self.api
                    .set_param(app_id, u)
                    .err()
                    .map(|e| format!("{}: {e}", u.name))
            })
            .collect();

        let status = if errors.is_empty() {
            info!(app_id, "app activated");
            AppStatus::Updated
        } else {
            let reason = errors.join("; ");
            warn!(app_id, reason = %reason, "app activation failed");
            AppStatus::Failed { reason }
        };

        AppActivation {
            app_id: app_id.to_string(),
            status,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
