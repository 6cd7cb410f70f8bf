pub mod config;
pub mod dashboard;
pub mod deploy;
pub mod error;
pub mod git;
pub mod sync;

pub use config::{ActivationTarget, DeployConfig, GitIdentity};
pub use deploy::{deploy, DeploymentResult};
pub use error::{DeployError, Result};
