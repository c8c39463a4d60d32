use std::fs;

use anyhow::Result;
use log::debug;
use serde::{Deserialize, Serialize};

use runner::{CommandRunner, DesktopUser, RunnerCommand};
use waydock_core::config::{Config, HostRoot};
use waydock_core::env::EnvSnapshot;
use waydock_core::types::{BinderState, HostProfile, KernelFlavor, SessionContext, WaydroidState};

pub mod binder;
pub mod distro;
pub mod firewall;
pub mod session;

pub use binder::BinderSignal;
pub use distro::DistroInfo;
pub use firewall::FirewallBackend;
pub use session::{InvokingUser, WaylandProbe};

/// Read-only queries against the host. Nothing here mutates state.
pub struct Prober<'a> {
    root: HostRoot,
    runner: &'a dyn CommandRunner,
    env: &'a EnvSnapshot,
    config: &'a Config,
}

/// Everything the `info` command reports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentReport {
    pub host: HostProfile,
    pub session: SessionContext,
    pub binder: BinderState,
    pub firewall_backend: Option<FirewallBackend>,
    pub firewall_configured: bool,
    pub waydroid: WaydroidState,
}

impl<'a> Prober<'a> {
    pub fn new(
        root: HostRoot,
        runner: &'a dyn CommandRunner,
        env: &'a EnvSnapshot,
        config: &'a Config,
    ) -> Self {
        Self {
            root,
            runner,
            env,
            config,
        }
    }

    pub fn root(&self) -> &HostRoot {
        &self.root
    }

    pub fn detect_distro(&self) -> DistroInfo {
        distro::read_os_release(&self.root.os_release())
    }

    pub fn kernel_release(&self) -> String {
        fs::read_to_string(self.root.kernel_release())
            .map(|release| release.trim().to_string())
            .unwrap_or_default()
    }

    pub fn detect_kernel_flavor(&self) -> KernelFlavor {
        KernelFlavor::from_release(&self.kernel_release())
    }

    pub fn host_profile(&self) -> HostProfile {
        let distro = self.detect_distro();
        let kernel_version = self.kernel_release();
        HostProfile {
            distro_id: distro.id,
            distro_like: distro.id_like,
            kernel_flavor: KernelFlavor::from_release(&kernel_version),
            kernel_version,
            arch: std::env::consts::ARCH.to_string(),
        }
    }

    pub fn invoking_user(&self) -> InvokingUser {
        session::resolve_invoking_user(self.env, self.runner)
    }

    pub fn wayland(&self, user: &InvokingUser) -> WaylandProbe {
        session::probe_wayland(&self.root, self.env, self.runner, user)
    }

    pub fn is_wayland_active(&self) -> bool {
        self.wayland(&self.invoking_user()).active
    }

    pub fn is_secure_boot_enabled(&self) -> bool {
        session::secure_boot_enabled(self.runner)
    }

    pub fn session_context(&self) -> SessionContext {
        let user = self.invoking_user();
        let wayland = self.wayland(&user);
        SessionContext {
            is_root: self.env.is_root(),
            invoking_user: user.name,
            invoking_uid: user.uid,
            elevated_for_user: user.elevated_for_user,
            is_wayland_active: wayland.active,
            is_secure_boot_enabled: self.is_secure_boot_enabled(),
        }
    }

    /// Identity used for commands that must appear on the user's desktop.
    pub fn desktop_user(&self) -> DesktopUser {
        let user = self.invoking_user();
        let wayland = self.wayland(&user);
        DesktopUser {
            name: user.name,
            uid: user.uid,
            wayland_display: wayland.display,
            switch_user: user.elevated_for_user,
        }
    }

    pub fn binder_state(&self) -> BinderState {
        let (state, signal) = binder::detect(&self.root, &self.config.binder);
        debug!("binder state {state} via {signal:?}");
        state
    }

    pub fn firewall_backend(&self) -> Option<FirewallBackend> {
        firewall::detect_backend(self.runner)
    }

    pub fn is_firewall_configured(&self) -> Result<bool> {
        match self.firewall_backend() {
            Some(backend) => {
                firewall::is_configured(self.runner, backend, &self.config.firewall.interface)
            }
            None => Ok(false),
        }
    }

    pub fn waydroid_state(&self) -> WaydroidState {
        let container_active = self.runner.is_available("systemctl")
            && self
                .runner
                .run(&RunnerCommand::new(
                    "systemctl",
                    ["is-active", "waydroid-container"],
                ))
                .map(|outcome| outcome.first_stdout_line() == Some("active"))
                .unwrap_or(false);
        WaydroidState {
            installed: self.runner.is_available("waydroid"),
            initialized: self.root.waydroid_config().exists(),
            container_active,
        }
    }

    pub fn report(&self) -> Result<EnvironmentReport> {
        let firewall_backend = self.firewall_backend();
        let firewall_configured = self.is_firewall_configured()?;
        Ok(EnvironmentReport {
            host: self.host_profile(),
            session: self.session_context(),
            binder: self.binder_state(),
            firewall_backend,
            firewall_configured,
            waydroid: self.waydroid_state(),
        })
    }
}
