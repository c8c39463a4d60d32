use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KernelFlavor {
    Zen,
    Lts,
    Hardened,
    Cachyos,
    Default,
}

impl KernelFlavor {
    /// Checked in this order; the first suffix contained in the release wins.
    pub const ORDERED: [(KernelFlavor, &'static str); 4] = [
        (KernelFlavor::Zen, "-zen"),
        (KernelFlavor::Lts, "-lts"),
        (KernelFlavor::Hardened, "-hardened"),
        (KernelFlavor::Cachyos, "-cachyos"),
    ];

    pub fn from_release(release: &str) -> Self {
        Self::ORDERED
            .iter()
            .find(|(_, suffix)| release.contains(suffix))
            .map(|(flavor, _)| *flavor)
            .unwrap_or(KernelFlavor::Default)
    }

    /// Arch-style headers package for this flavor.
    pub fn headers_package(&self) -> &'static str {
        match self {
            KernelFlavor::Zen => "linux-zen-headers",
            KernelFlavor::Lts => "linux-lts-headers",
            KernelFlavor::Hardened => "linux-hardened-headers",
            KernelFlavor::Cachyos => "linux-cachyos-headers",
            KernelFlavor::Default => "linux-headers",
        }
    }
}

impl fmt::Display for KernelFlavor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            KernelFlavor::Zen => "zen",
            KernelFlavor::Lts => "lts",
            KernelFlavor::Hardened => "hardened",
            KernelFlavor::Cachyos => "cachyos",
            KernelFlavor::Default => "default",
        };
        write!(f, "{value}")
    }
}

/// Host facts derived fresh on every invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HostProfile {
    pub distro_id: String,
    pub distro_like: Vec<String>,
    pub kernel_version: String,
    pub kernel_flavor: KernelFlavor,
    pub arch: String,
}

/// Who is running us and on whose desktop the container UI must appear.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionContext {
    pub is_root: bool,
    pub invoking_user: String,
    pub invoking_uid: u32,
    /// True when running elevated on behalf of a different desktop user.
    pub elevated_for_user: bool,
    pub is_wayland_active: bool,
    pub is_secure_boot_enabled: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BinderState {
    Working,
    AvailableNotLoaded,
    Unavailable,
}

impl BinderState {
    pub fn is_working(&self) -> bool {
        matches!(self, BinderState::Working)
    }
}

impl fmt::Display for BinderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            BinderState::Working => "working",
            BinderState::AvailableNotLoaded => "available, not loaded",
            BinderState::Unavailable => "unavailable",
        };
        write!(f, "{value}")
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WaydroidState {
    pub installed: bool,
    pub initialized: bool,
    pub container_active: bool,
}
