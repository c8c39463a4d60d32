use std::fmt;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use runner::{CommandRunner, RunnerCommand};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FirewallBackend {
    Ufw,
    Firewalld,
    Iptables,
}

impl FirewallBackend {
    /// Selection priority: the first installed backend wins.
    pub const PRIORITY: [FirewallBackend; 3] = [
        FirewallBackend::Ufw,
        FirewallBackend::Firewalld,
        FirewallBackend::Iptables,
    ];

    pub fn program(&self) -> &'static str {
        match self {
            FirewallBackend::Ufw => "ufw",
            FirewallBackend::Firewalld => "firewall-cmd",
            FirewallBackend::Iptables => "iptables",
        }
    }

    /// Rule-listing query whose output mentions the interface once rules exist.
    pub fn query_command(&self) -> RunnerCommand {
        match self {
            FirewallBackend::Ufw => RunnerCommand::new("ufw", ["status"]),
            FirewallBackend::Firewalld => {
                RunnerCommand::new("firewall-cmd", ["--direct", "--get-all-rules"])
            }
            FirewallBackend::Iptables => RunnerCommand::new("iptables", ["-S", "FORWARD"]),
        }
    }
}

impl fmt::Display for FirewallBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let value = match self {
            FirewallBackend::Ufw => "ufw",
            FirewallBackend::Firewalld => "firewalld",
            FirewallBackend::Iptables => "iptables",
        };
        write!(f, "{value}")
    }
}

pub fn detect_backend(runner: &dyn CommandRunner) -> Option<FirewallBackend> {
    FirewallBackend::PRIORITY
        .into_iter()
        .find(|backend| runner.is_available(backend.program()))
}

pub fn is_configured(
    runner: &dyn CommandRunner,
    backend: FirewallBackend,
    interface: &str,
) -> Result<bool> {
    let outcome = runner.run(&backend.query_command())?;
    Ok(outcome.success() && outcome.stdout.lines().any(|line| line.contains(interface)))
}
