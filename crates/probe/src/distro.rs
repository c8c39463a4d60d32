use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub const UNKNOWN_DISTRO: &str = "unknown";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistroInfo {
    pub id: String,
    pub id_like: Vec<String>,
    pub pretty_name: Option<String>,
}

impl DistroInfo {
    pub fn unknown() -> Self {
        Self {
            id: UNKNOWN_DISTRO.to_string(),
            id_like: Vec::new(),
            pretty_name: None,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.id == UNKNOWN_DISTRO
    }

    pub fn parse(contents: &str) -> Self {
        let mut info = Self::unknown();
        for line in contents.lines() {
            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            let value = unquote(value);
            match key {
                "ID" if !value.is_empty() => info.id = value.to_lowercase(),
                "ID_LIKE" => {
                    info.id_like = value.split_whitespace().map(str::to_lowercase).collect();
                }
                "PRETTY_NAME" => info.pretty_name = Some(value.to_string()),
                _ => {}
            }
        }
        info
    }
}

/// Reads an os-release file; a missing or unreadable file yields `unknown`.
pub fn read_os_release(path: &Path) -> DistroInfo {
    match fs::read_to_string(path) {
        Ok(contents) => DistroInfo::parse(&contents),
        Err(_) => DistroInfo::unknown(),
    }
}

fn unquote(value: &str) -> &str {
    let value = value.trim();
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .or_else(|| value.strip_prefix('\'').and_then(|v| v.strip_suffix('\'')))
        .unwrap_or(value)
}
