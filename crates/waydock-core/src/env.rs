use std::collections::HashMap;

/// Environment variables and effective uid captured once at startup.
#[derive(Debug, Clone, Default)]
pub struct EnvSnapshot {
    vars: HashMap<String, String>,
    euid: u32,
}

impl EnvSnapshot {
    pub fn capture() -> Self {
        let euid = unsafe { libc::geteuid() };
        Self {
            vars: std::env::vars().collect(),
            euid,
        }
    }

    pub fn from_vars<I, K, V>(vars: I, euid: u32) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
            euid,
        }
    }

    /// Returns the value only when it is set and non-empty.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn euid(&self) -> u32 {
        self.euid
    }

    pub fn is_root(&self) -> bool {
        self.euid == 0
    }
}
