use std::fmt;

/// A child started in its own process group and never waited on.
///
/// The orchestrator does not track, reap or synchronise with it; callers that
/// need the session to be up wait a fixed settle interval instead.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetachedSession {
    pub pid: u32,
    pub command: String,
}

impl fmt::Display for DetachedSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (pid {})", self.command, self.pid)
    }
}
