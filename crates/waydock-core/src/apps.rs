use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Tokens understood by the helper tool's `install`, `uninstall` and `hack` commands.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AppToken {
    Gapps,
    Microg,
    Libndk,
    Libhoudini,
    Magisk,
    Widevine,
    Smartdock,
    Fdroidpriv,
    Nodataperm,
    Hidestatusbar,
    Mitm,
}

impl AppToken {
    pub const ALL: [AppToken; 11] = [
        AppToken::Gapps,
        AppToken::Microg,
        AppToken::Libndk,
        AppToken::Libhoudini,
        AppToken::Magisk,
        AppToken::Widevine,
        AppToken::Smartdock,
        AppToken::Fdroidpriv,
        AppToken::Nodataperm,
        AppToken::Hidestatusbar,
        AppToken::Mitm,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AppToken::Gapps => "gapps",
            AppToken::Microg => "microg",
            AppToken::Libndk => "libndk",
            AppToken::Libhoudini => "libhoudini",
            AppToken::Magisk => "magisk",
            AppToken::Widevine => "widevine",
            AppToken::Smartdock => "smartdock",
            AppToken::Fdroidpriv => "fdroidpriv",
            AppToken::Nodataperm => "nodataperm",
            AppToken::Hidestatusbar => "hidestatusbar",
            AppToken::Mitm => "mitm",
        }
    }

    /// One-line description shown in the interactive menu.
    pub fn label(&self) -> &'static str {
        match self {
            AppToken::Gapps => "Google Apps (OpenGApps)",
            AppToken::Microg => "MicroG (open Google services)",
            AppToken::Libndk => "libndk ARM translation (AMD)",
            AppToken::Libhoudini => "libhoudini ARM translation (Intel)",
            AppToken::Magisk => "Magisk root",
            AppToken::Widevine => "Widevine L3 DRM",
            AppToken::Smartdock => "SmartDock desktop launcher",
            AppToken::Fdroidpriv => "F-Droid privileged extension",
            AppToken::Nodataperm => "Hack: remove data permission checks",
            AppToken::Hidestatusbar => "Hack: hide the status bar",
            AppToken::Mitm => "MITM CA certificate (needs a cert file)",
        }
    }
}

impl FromStr for AppToken {
    type Err = CoreError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_lowercase();
        AppToken::ALL
            .iter()
            .copied()
            .find(|token| token.as_str() == normalized)
            .ok_or_else(|| CoreError::UnknownToken(value.to_string()))
    }
}

impl fmt::Display for AppToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ordered, duplicate-free token list forwarded to the helper unmodified.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AppSelection {
    tokens: Vec<AppToken>,
    ca_cert: Option<PathBuf>,
}

impl AppSelection {
    pub fn new(tokens: Vec<AppToken>, ca_cert: Option<PathBuf>) -> Result<Self, CoreError> {
        let ordered = dedup(tokens);
        if ordered.contains(&AppToken::Mitm) && ca_cert.is_none() {
            return Err(CoreError::InvalidConfig(
                "mitm needs a certificate file (--ca-cert <path>)".to_string(),
            ));
        }
        let ca_cert = if ordered.contains(&AppToken::Mitm) {
            ca_cert
        } else {
            None
        };
        Ok(Self {
            tokens: ordered,
            ca_cert,
        })
    }

    /// Selection for removal, where `mitm` needs no certificate.
    pub fn without_certificate(tokens: Vec<AppToken>) -> Self {
        Self {
            tokens: dedup(tokens),
            ca_cert: None,
        }
    }

    pub fn tokens(&self) -> &[AppToken] {
        &self.tokens
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn ca_cert(&self) -> Option<&PathBuf> {
        self.ca_cert.as_ref()
    }

    /// Argument vector appended after the helper subcommand.
    pub fn to_args(&self) -> Vec<String> {
        let mut args: Vec<String> = self.tokens.iter().map(|token| token.to_string()).collect();
        if let Some(cert) = &self.ca_cert {
            args.push("--ca-cert".to_string());
            args.push(cert.display().to_string());
        }
        args
    }
}

fn dedup(tokens: Vec<AppToken>) -> Vec<AppToken> {
    let mut ordered = Vec::with_capacity(tokens.len());
    for token in tokens {
        if !ordered.contains(&token) {
            ordered.push(token);
        }
    }
    ordered
}
