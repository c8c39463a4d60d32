use std::fmt;

use anyhow::Result;
use log::info;

use probe::DistroInfo;
use runner::{run_step, CommandRunner, RunnerCommand};
use waydock_core::prompt::Prompter;
use waydock_core::types::{HostProfile, KernelFlavor};

use crate::ProvisionError;

pub const WAYDROID_APT_REPO: &str = "curl -fsSL https://repo.waydro.id | bash";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageFamily {
    Pacman,
    Apt,
    Dnf,
    Zypper,
}

impl PackageFamily {
    pub const ALL: [PackageFamily; 4] = [
        PackageFamily::Pacman,
        PackageFamily::Apt,
        PackageFamily::Dnf,
        PackageFamily::Zypper,
    ];

    fn from_id(id: &str) -> Option<Self> {
        match id {
            "arch" | "manjaro" | "endeavouros" | "cachyos" | "garuda" => Some(PackageFamily::Pacman),
            "ubuntu" | "debian" | "linuxmint" | "pop" | "zorin" | "elementary" => {
                Some(PackageFamily::Apt)
            }
            "fedora" | "nobara" | "rhel" => Some(PackageFamily::Dnf),
            "opensuse-tumbleweed" | "opensuse-leap" | "opensuse" | "suse" => {
                Some(PackageFamily::Zypper)
            }
            _ => None,
        }
    }

    /// Matches `ID` first, then each `ID_LIKE` entry in order.
    pub fn resolve(id: &str, id_like: &[String]) -> Option<Self> {
        Self::from_id(id).or_else(|| id_like.iter().find_map(|like| Self::from_id(like)))
    }

    pub fn for_distro(distro: &DistroInfo) -> Option<Self> {
        Self::resolve(&distro.id, &distro.id_like)
    }

    pub fn for_host(profile: &HostProfile) -> Option<Self> {
        Self::resolve(&profile.distro_id, &profile.distro_like)
    }

    pub fn program(&self) -> &'static str {
        match self {
            PackageFamily::Pacman => "pacman",
            PackageFamily::Apt => "apt-get",
            PackageFamily::Dnf => "dnf",
            PackageFamily::Zypper => "zypper",
        }
    }

    pub fn refresh_command(&self) -> RunnerCommand {
        match self {
            PackageFamily::Pacman => RunnerCommand::new("pacman", ["-Sy", "--noconfirm"]),
            PackageFamily::Apt => RunnerCommand::new("apt-get", ["update"]),
            PackageFamily::Dnf => RunnerCommand::new("dnf", ["makecache"]),
            PackageFamily::Zypper => RunnerCommand::new("zypper", ["--non-interactive", "refresh"]),
        }
    }

    pub fn install_command(&self, packages: &[String]) -> RunnerCommand {
        let base: &[&str] = match self {
            PackageFamily::Pacman => &["-S", "--needed", "--noconfirm"],
            PackageFamily::Apt => &["install", "-y"],
            PackageFamily::Dnf => &["install", "-y"],
            PackageFamily::Zypper => &["--non-interactive", "install"],
        };
        let args = base
            .iter()
            .map(|arg| arg.to_string())
            .chain(packages.iter().cloned());
        RunnerCommand::new(self.program(), args).inherit_output()
    }

    /// Container runtime plus what the helper tool needs to bootstrap itself.
    pub fn base_packages(&self) -> Vec<String> {
        let packages: &[&str] = match self {
            PackageFamily::Pacman => &["waydroid", "git", "python", "python-pip", "curl", "lzip"],
            PackageFamily::Apt => &[
                "waydroid",
                "git",
                "python3",
                "python3-venv",
                "python3-pip",
                "curl",
                "lzip",
            ],
            PackageFamily::Dnf | PackageFamily::Zypper => {
                &["waydroid", "git", "python3", "python3-pip", "curl", "lzip"]
            }
        };
        packages.iter().map(|package| package.to_string()).collect()
    }

    /// Kernel headers and the out-of-tree binder module for the running kernel.
    pub fn dkms_packages(&self, flavor: KernelFlavor, kernel_release: &str) -> Vec<String> {
        match self {
            PackageFamily::Pacman => vec![
                flavor.headers_package().to_string(),
                "dkms".to_string(),
                "binder_linux-dkms".to_string(),
            ],
            PackageFamily::Apt => vec![
                format!("linux-headers-{kernel_release}"),
                "dkms".to_string(),
                "anbox-modules-dkms".to_string(),
            ],
            PackageFamily::Dnf | PackageFamily::Zypper => {
                vec!["kernel-devel".to_string(), "dkms".to_string()]
            }
        }
    }
}

impl fmt::Display for PackageFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            PackageFamily::Pacman => "pacman",
            PackageFamily::Apt => "apt",
            PackageFamily::Dnf => "dnf",
            PackageFamily::Zypper => "zypper",
        };
        write!(f, "{value}")
    }
}

/// Resolves the package family, asking the operator when the distribution is not recognized.
pub fn resolve_family(profile: &HostProfile, prompter: &dyn Prompter) -> Result<PackageFamily> {
    if let Some(family) = PackageFamily::for_host(profile) {
        return Ok(family);
    }
    reporting::warning(&format!(
        "Distribution '{}' is not recognized. Install waydroid, git, python3 (with venv and pip), curl and lzip manually, or pick a package manager.",
        profile.distro_id
    ));
    let mut options: Vec<String> = PackageFamily::ALL
        .iter()
        .map(|family| format!("Use {family}"))
        .collect();
    options.push("Abort".to_string());
    let labels: Vec<&str> = options.iter().map(String::as_str).collect();
    match prompter.select("How should dependencies be installed?", &labels)? {
        Some(index) if index < PackageFamily::ALL.len() => Ok(PackageFamily::ALL[index]),
        _ => Err(ProvisionError::UnsupportedDistro(profile.distro_id.clone()).into()),
    }
}

/// Installs the container runtime and helper prerequisites with the native package manager.
pub fn install_dependencies(runner: &dyn CommandRunner, family: PackageFamily) -> Result<()> {
    if family == PackageFamily::Apt && !runner.is_available("waydroid") {
        reporting::step("Adding the WayDroid apt repository");
        run_step(
            runner,
            "add waydroid repository",
            &RunnerCommand::new("sh", ["-c", WAYDROID_APT_REPO]).inherit_output(),
        )?;
    }
    reporting::step(&format!("Refreshing the {family} package index"));
    run_step(runner, "refresh package index", &family.refresh_command())?;

    let packages = family.base_packages();
    info!("installing {} packages with {family}", packages.len());
    reporting::step(&format!("Installing {}", packages.join(" ")));
    run_step(runner, "install packages", &family.install_command(&packages))?;
    reporting::success("Dependencies installed");
    Ok(())
}
