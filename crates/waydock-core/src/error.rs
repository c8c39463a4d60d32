use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("this command must be run as root (try: sudo {0})")]
    RootRequired(String),
    #[error("unknown app token: {0}")]
    UnknownToken(String),
    #[error("prompt failed: {0}")]
    Prompt(String),
}
