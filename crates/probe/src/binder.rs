use std::fs;

use log::debug;

use waydock_core::config::{BinderConfig, HostRoot};
use waydock_core::types::BinderState;

/// Device nodes that prove a usable binder, in the order they are checked.
pub const DEVICE_CANDIDATES: [&str; 3] = ["/dev/binder", "/dev/binderfs/binder", "/dev/anbox-binder"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinderSignal {
    ModuleLoaded,
    Mounted,
    DeviceNode,
    FilesystemRegistered,
}

/// Checks module list, mount table, device nodes, then binderfs registration.
pub fn detect(root: &HostRoot, config: &BinderConfig) -> (BinderState, Option<BinderSignal>) {
    if module_loaded(root, &config.module) {
        return (BinderState::Working, Some(BinderSignal::ModuleLoaded));
    }
    if mount_present(root) {
        return (BinderState::Working, Some(BinderSignal::Mounted));
    }
    if device_node_present(root) {
        return (BinderState::Working, Some(BinderSignal::DeviceNode));
    }
    if filesystem_registered(root) && root.join(&config.binderfs_dir).is_dir() {
        return (
            BinderState::AvailableNotLoaded,
            Some(BinderSignal::FilesystemRegistered),
        );
    }
    debug!("no binder signal found under {}", root.path().display());
    (BinderState::Unavailable, None)
}

pub fn module_loaded(root: &HostRoot, module: &str) -> bool {
    read(root.proc_modules())
        .lines()
        .any(|line| line.split_whitespace().next() == Some(module))
}

pub fn mount_present(root: &HostRoot) -> bool {
    read(root.proc_mounts()).lines().any(|line| {
        let mut fields = line.split_whitespace();
        let source = fields.next().unwrap_or_default();
        let target = fields.next().unwrap_or_default();
        let fstype = fields.next().unwrap_or_default();
        fstype == "binder" || source == "binder" || target.contains("binder")
    })
}

pub fn device_node_present(root: &HostRoot) -> bool {
    DEVICE_CANDIDATES
        .iter()
        .any(|candidate| root.join(candidate).exists())
}

pub fn filesystem_registered(root: &HostRoot) -> bool {
    read(root.proc_filesystems())
        .lines()
        .any(|line| line.split_whitespace().last() == Some("binder"))
}

fn read(path: std::path::PathBuf) -> String {
    fs::read_to_string(path).unwrap_or_default()
}
