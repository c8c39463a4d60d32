use anyhow::Result;
use log::info;

use probe::firewall::{detect_backend, is_configured, FirewallBackend};
use runner::{run_step, CommandRunner, RunnerCommand};


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirewallOutcome {
    AlreadyConfigured(FirewallBackend),
    Applied(FirewallBackend),
    /// Rules were accepted but are not visible yet; usually a reboot away.
    PendingReboot(FirewallBackend),
    NoBackend,
}

/// Inbound and outbound forwarding rules for `interface`, in application order.
pub fn allow_rules(backend: FirewallBackend, interface: &str) -> Vec<RunnerCommand> {
    match backend {
        FirewallBackend::Ufw => vec![
            RunnerCommand::new("ufw", ["route", "allow", "in", "on", interface]),
            RunnerCommand::new("ufw", ["route", "allow", "out", "on", interface]),
        ],
        FirewallBackend::Firewalld => {
            let rule = |direction: &str| {
                RunnerCommand::new(
                    "firewall-cmd",
                    [
                        "--permanent",
                        "--direct",
                        "--add-rule",
                        "ipv4",
                        "filter",
                        "FORWARD",
                        "0",
                        direction,
                        interface,
                        "-j",
                        "ACCEPT",
                    ],
                )
            };
            vec![
                rule("-i"),
                rule("-o"),
                RunnerCommand::new("firewall-cmd", ["--reload"]),
            ]
        }
        FirewallBackend::Iptables => vec![
            RunnerCommand::new("iptables", ["-A", "FORWARD", "-i", interface, "-j", "ACCEPT"]),
            RunnerCommand::new("iptables", ["-A", "FORWARD", "-o", interface, "-j", "ACCEPT"]),
        ],
    }
}

/// Applies forwarding rules with the first installed backend and verifies them.
pub fn configure(runner: &dyn CommandRunner, interface: &str) -> Result<FirewallOutcome> {
    let Some(backend) = detect_backend(runner) else {
        reporting::warning("No supported firewall backend (ufw, firewalld, iptables) was found.");
        reporting::troubleshoot::print_block(
            "Manual firewall setup",
            &reporting::troubleshoot::firewall_manual_steps(interface),
        );
        return Ok(FirewallOutcome::NoBackend);
    };

    if is_configured(runner, backend, interface)? {
        reporting::success(&format!("{backend} already forwards {interface}"));
        return Ok(FirewallOutcome::AlreadyConfigured(backend));
    }

    reporting::step(&format!("Allowing {interface} forwarding with {backend}"));
    for rule in allow_rules(backend, interface) {
        run_step(runner, &format!("{backend} rule"), &rule)?;
    }

    if is_configured(runner, backend, interface)? {
        info!("{backend} rules for {interface} verified");
        reporting::success("Firewall configured");
        Ok(FirewallOutcome::Applied(backend))
    } else {
        reporting::warning(&format!(
            "{backend} accepted the rules but {interface} is not listed yet; a reboot may be required"
        ));
        Ok(FirewallOutcome::PendingReboot(backend))
    }
}
