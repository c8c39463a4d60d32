use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info};

use waydock_core::config::{BinderConfig, HostRoot};

pub const AUTOLOAD_FILE: &str = "waydroid-binder.conf";

pub fn canonical_entry(binderfs_dir: &Path) -> String {
    format!("binder {} binder nofail 0 0", binderfs_dir.display())
}

/// Drops every binder-related entry except the first canonical one and appends the
/// canonical entry when it is missing. Returns the new contents and whether they changed.
pub fn normalize_fstab(contents: &str, binderfs_dir: &Path) -> (String, bool) {
    let canonical = canonical_entry(binderfs_dir);
    let canonical_fields: Vec<&str> = canonical.split_whitespace().collect();
    let mountpoint = binderfs_dir.to_string_lossy().into_owned();

    let mut kept = Vec::new();
    let mut has_canonical = false;
    for line in contents.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            kept.push(line.to_string());
            continue;
        }
        let fields: Vec<&str> = trimmed.split_whitespace().collect();
        let conflicting = fields.get(1).copied() == Some(mountpoint.as_str())
            || fields.get(2).copied() == Some("binder");
        if !conflicting {
            kept.push(line.to_string());
        } else if fields == canonical_fields && !has_canonical {
            has_canonical = true;
            kept.push(line.to_string());
        } else {
            debug!("dropping conflicting fstab entry: {trimmed}");
        }
    }
    if !has_canonical {
        kept.push(canonical);
    }

    let mut output = kept.join("\n");
    output.push('\n');
    let changed = output != contents;
    (output, changed)
}

/// Idempotently registers the binderfs mount in the host's fstab.
pub fn register_binderfs(root: &HostRoot, binderfs_dir: &Path) -> Result<bool> {
    let path = root.fstab();
    let contents = match fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(err) => {
            return Err(err).with_context(|| format!("read {}", path.display()));
        }
    };
    let (updated, changed) = normalize_fstab(&contents, binderfs_dir);
    if changed {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        fs::write(&path, updated).with_context(|| format!("write {}", path.display()))?;
        info!("registered binderfs in {}", path.display());
    }
    Ok(changed)
}

/// Makes the binder module load at boot with the configured device list.
pub fn write_autoload(root: &HostRoot, config: &BinderConfig) -> Result<bool> {
    let load = format!("{}\n", config.module);
    let options = format!(
        "options {} devices={}\n",
        config.module,
        config.devices_param()
    );
    let mut changed = write_if_different(&root.modules_load_dir().join(AUTOLOAD_FILE), &load)?;
    changed |= write_if_different(&root.modprobe_dir().join(AUTOLOAD_FILE), &options)?;
    Ok(changed)
}

fn write_if_different(path: &Path, contents: &str) -> Result<bool> {
    if fs::read_to_string(path).ok().as_deref() == Some(contents) {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("write {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    const FSTAB: &str = "# /etc/fstab\nUUID=1234 / ext4 defaults 0 1\n";

    #[test]
    fn test_appends_canonical_entry() {
        let (output, changed) = normalize_fstab(FSTAB, Path::new("/dev/binderfs"));
        assert!(changed);
        assert!(output.starts_with(FSTAB));
        assert!(output.ends_with("binder /dev/binderfs binder nofail 0 0\n"));
    }

    #[test]
    fn test_replaces_conflicting_entries() {
        let input = format!("{FSTAB}none /dev/binderfs binder defaults 0 0\nbinder /mnt/other binder rw 0 0\n");
        let (output, _) = normalize_fstab(&input, Path::new("/dev/binderfs"));
        assert_eq!(
            output,
            format!("{FSTAB}binder /dev/binderfs binder nofail 0 0\n")
        );
    }

    #[test]
    fn test_registration_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let root = HostRoot::new(dir.path());
        fs::create_dir_all(dir.path().join("etc")).unwrap();
        fs::write(
            root.fstab(),
            format!("{FSTAB}binder /dev/binderfs binder nofail 0 0\n"),
        )
        .unwrap();

        assert!(!register_binderfs(&root, Path::new("/dev/binderfs")).unwrap());
        assert!(!register_binderfs(&root, Path::new("/dev/binderfs")).unwrap());
        let contents = fs::read_to_string(root.fstab()).unwrap();
        assert_eq!(contents.matches("/dev/binderfs").count(), 1);
    }

    #[test]
    fn test_duplicate_canonical_lines_collapse() {
        let dir = tempfile::tempdir().unwrap();
        let root = HostRoot::new(dir.path());
        fs::create_dir_all(dir.path().join("etc")).unwrap();
        let line = "binder /dev/binderfs binder nofail 0 0\n";
        fs::write(root.fstab(), format!("{FSTAB}{line}{line}")).unwrap();

        assert!(register_binderfs(&root, Path::new("/dev/binderfs")).unwrap());
        assert!(!register_binderfs(&root, Path::new("/dev/binderfs")).unwrap());
        assert_eq!(fs::read_to_string(root.fstab()).unwrap(), format!("{FSTAB}{line}"));
    }

    #[test]
    fn test_autoload_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let root = HostRoot::new(dir.path());
        let config = BinderConfig::default();
        assert!(write_autoload(&root, &config).unwrap());
        assert!(!write_autoload(&root, &config).unwrap());
        assert_eq!(
            fs::read_to_string(root.modprobe_dir().join(AUTOLOAD_FILE)).unwrap(),
            "options binder_linux devices=binder,hwbinder,vndbinder\n"
        );
        assert_eq!(
            fs::read_to_string(root.modules_load_dir().join(AUTOLOAD_FILE)).unwrap(),
            "binder_linux\n"
        );
    }
}
