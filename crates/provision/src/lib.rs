use thiserror::Error;

pub mod binder;
pub mod firewall;
pub mod fstab;
pub mod packages;

pub use binder::{BinderProvisioner, BinderResolution, LoadOutcome};
pub use firewall::FirewallOutcome;
pub use packages::PackageFamily;

/// Failing external steps surface as `runner::RunnerError::StepFailed`.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("unsupported distribution: {0}")]
    UnsupportedDistro(String),
    #[error("binder is still unavailable after every provisioning attempt")]
    BinderUnavailable,
}
