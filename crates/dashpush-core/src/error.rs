use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("Git Error ({command}): {stderr}")]
    Git { command: String, stderr: String },

    #[error("git executable not found on PATH")]
    GitNotFound(#[source] which::Error),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("dashboard returned HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("malformed app group: {0}")]
    AppGroup(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, DeployError>;
