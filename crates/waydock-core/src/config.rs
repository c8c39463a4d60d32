use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "/etc/waydock/config.toml";
pub const CONFIG_ENV: &str = "WAYDOCK_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub paths: PathsConfig,
    pub lock: LockConfig,
    pub binder: BinderConfig,
    pub firewall: FirewallConfig,
    pub helper: HelperConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PathsConfig {
    pub lock_file: PathBuf,
    pub log_file: PathBuf,
    pub helper_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LockConfig {
    pub stale_after_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BinderConfig {
    pub module: String,
    pub devices: Vec<String>,
    pub binderfs_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct FirewallConfig {
    pub interface: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HelperConfig {
    pub repo_url: String,
    pub python: String,
    pub entry_point: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    pub settle_secs: u64,
    pub init_image: String,
}

impl Default for Config {
    fn default() -> Self {
        Self::default_config()
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            lock_file: PathBuf::from("/tmp/waydock.lock"),
            log_file: PathBuf::from("/var/log/waydock.log"),
            helper_dir: None,
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            stale_after_secs: 3600,
        }
    }
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            module: "binder_linux".to_string(),
            devices: vec![
                "binder".to_string(),
                "hwbinder".to_string(),
                "vndbinder".to_string(),
            ],
            binderfs_dir: PathBuf::from("/dev/binderfs"),
        }
    }
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self {
            interface: "waydroid0".to_string(),
        }
    }
}

impl Default for HelperConfig {
    fn default() -> Self {
        Self {
            repo_url: "https://github.com/casualsnek/waydroid_script".to_string(),
            python: "python3".to_string(),
            entry_point: "main.py".to_string(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            settle_secs: 5,
            init_image: "VANILLA".to_string(),
        }
    }
}

impl BinderConfig {
    /// Value for the module's `devices=` parameter.
    pub fn devices_param(&self) -> String {
        self.devices.join(",")
    }
}

impl Config {
    pub fn default_config() -> Self {
        Self {
            paths: PathsConfig::default(),
            lock: LockConfig::default(),
            binder: BinderConfig::default(),
            firewall: FirewallConfig::default(),
            helper: HelperConfig::default(),
            session: SessionConfig::default(),
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("parse config TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        let output = toml::to_string_pretty(self).context("render config TOML")?;
        Ok(output)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("read config at {}", path.display()))?;
        Self::from_toml_str(&contents)
    }

    /// Loads the file at `path`, falling back to defaults when it does not exist.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default_config());
        }
        Self::load(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create config dir {}", parent.display()))?;
        }
        let contents = self.to_toml_string()?;
        fs::write(path, contents).with_context(|| format!("write config at {}", path.display()))?;
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.lock.stale_after_secs <= 0 {
            return Err(crate::CoreError::InvalidConfig(
                "lock.stale_after_secs must be positive".to_string(),
            )
            .into());
        }
        if self.binder.module.trim().is_empty() {
            return Err(
                crate::CoreError::InvalidConfig("binder.module must not be empty".to_string()).into(),
            );
        }
        if self.firewall.interface.trim().is_empty() {
            return Err(crate::CoreError::InvalidConfig(
                "firewall.interface must not be empty".to_string(),
            )
            .into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct ConfigPaths {
    pub config_path: PathBuf,
    pub data_dir: PathBuf,
    pub lock_file: PathBuf,
    pub log_file: PathBuf,
    pub helper_dir: PathBuf,
}

impl ConfigPaths {
    pub fn default_config_path() -> PathBuf {
        match std::env::var_os(CONFIG_ENV) {
            Some(value) => PathBuf::from(value),
            None => PathBuf::from(DEFAULT_CONFIG_PATH),
        }
    }

    pub fn resolve(config_path: PathBuf, config: &Config) -> Result<Self> {
        let project_dirs = ProjectDirs::from("io", "waydock", "waydock")
            .ok_or_else(|| anyhow::anyhow!("unable to determine project directories"))?;
        let data_dir = project_dirs.data_dir().to_path_buf();
        let helper_dir = config
            .paths
            .helper_dir
            .clone()
            .unwrap_or_else(|| data_dir.join("waydroid_script"));
        Ok(Self {
            config_path,
            data_dir,
            lock_file: config.paths.lock_file.clone(),
            log_file: config.paths.log_file.clone(),
            helper_dir,
        })
    }
}

/// Prefix applied to every host file the prober reads or the provisioners write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRoot(PathBuf);

impl Default for HostRoot {
    fn default() -> Self {
        Self(PathBuf::from("/"))
    }
}

impl HostRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self(root.into())
    }

    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Maps an absolute host path such as `/proc/modules` under this root.
    pub fn join(&self, absolute: impl AsRef<Path>) -> PathBuf {
        let absolute = absolute.as_ref();
        let relative = absolute.strip_prefix("/").unwrap_or(absolute);
        self.0.join(relative)
    }

    pub fn os_release(&self) -> PathBuf {
        self.join("/etc/os-release")
    }

    pub fn kernel_release(&self) -> PathBuf {
        self.join("/proc/sys/kernel/osrelease")
    }

    pub fn proc_modules(&self) -> PathBuf {
        self.join("/proc/modules")
    }

    pub fn proc_mounts(&self) -> PathBuf {
        self.join("/proc/mounts")
    }

    pub fn proc_filesystems(&self) -> PathBuf {
        self.join("/proc/filesystems")
    }

    pub fn fstab(&self) -> PathBuf {
        self.join("/etc/fstab")
    }

    pub fn modules_load_dir(&self) -> PathBuf {
        self.join("/etc/modules-load.d")
    }

    pub fn modprobe_dir(&self) -> PathBuf {
        self.join("/etc/modprobe.d")
    }

    pub fn user_runtime_dir(&self, uid: u32) -> PathBuf {
        self.join(format!("/run/user/{uid}"))
    }

    pub fn waydroid_config(&self) -> PathBuf {
        self.join("/var/lib/waydroid/waydroid.cfg")
    }
}
