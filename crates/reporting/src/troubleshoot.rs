use colored::Colorize;
use log::warn;

use waydock_core::types::KernelFlavor;

/// Manual checklist shown when every automatic binder strategy has failed.
pub fn binder_checklist(flavor: KernelFlavor, secure_boot: bool) -> Vec<String> {
    let mut items = vec![
        format!(
            "Install the headers for the running kernel ({}) and reboot into it.",
            flavor.headers_package()
        ),
        "Check `dkms status` for a binder module built against this kernel.".to_string(),
        "Try `sudo modprobe binder_linux devices=binder,hwbinder,vndbinder` and read `dmesg | tail`."
            .to_string(),
        "Consider a kernel that ships binder built in (linux-zen, linux-cachyos, or linux-xanmod)."
            .to_string(),
    ];
    if secure_boot {
        items.insert(
            0,
            "Secure Boot is enabled: sign the DKMS module with your MOK key or disable Secure Boot."
                .to_string(),
        );
    }
    items
}

pub fn firewall_manual_steps(interface: &str) -> Vec<String> {
    vec![
        format!("Allow forwarding in and out of {interface} in your firewall."),
        format!("iptables: iptables -A FORWARD -i {interface} -j ACCEPT"),
        format!("iptables: iptables -A FORWARD -o {interface} -j ACCEPT"),
        "Enable IP forwarding: sysctl -w net.ipv4.ip_forward=1".to_string(),
    ]
}

pub fn print_block(title: &str, items: &[String]) {
    warn!("{title}");
    println!("\n{}", title.yellow().bold());
    for (index, item) in items.iter().enumerate() {
        warn!("  {}. {item}", index + 1);
        println!("  {}. {item}", index + 1);
    }
}
