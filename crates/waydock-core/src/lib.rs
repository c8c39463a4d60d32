pub mod apps;
pub mod config;
pub mod env;
pub mod error;
pub mod lock;
pub mod prompt;
pub mod types;

pub use apps::{AppSelection, AppToken};
pub use config::{Config, ConfigPaths, HostRoot};
pub use env::EnvSnapshot;
pub use error::CoreError;
pub use lock::{LockError, LockGuard, LockManager, LockRecord, LockState, ProcessTable, SystemProcessTable};
pub use prompt::{Answer, Prompter, ScriptedPrompter, StdinPrompter};
pub use types::{BinderState, HostProfile, KernelFlavor, SessionContext, WaydroidState};
