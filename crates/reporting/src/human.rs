use probe::EnvironmentReport;

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

pub fn environment_summary(report: &EnvironmentReport) -> String {
    let host = &report.host;
    let session = &report.session;
    let distro = if host.distro_like.is_empty() {
        host.distro_id.clone()
    } else {
        format!("{} (like {})", host.distro_id, host.distro_like.join(" "))
    };
    let firewall = match report.firewall_backend {
        Some(backend) if report.firewall_configured => format!("{backend}, waydroid rules present"),
        Some(backend) => format!("{backend}, no waydroid rules"),
        None => "no supported backend".to_string(),
    };

    [
        format!("Distribution:   {distro}"),
        format!("Kernel:         {} ({})", host.kernel_version, host.kernel_flavor),
        format!("Architecture:   {}", host.arch),
        format!(
            "User:           {} (uid {}){}",
            session.invoking_user,
            session.invoking_uid,
            if session.elevated_for_user { ", elevated" } else { "" }
        ),
        format!("Wayland:        {}", yes_no(session.is_wayland_active)),
        format!("Secure Boot:    {}", yes_no(session.is_secure_boot_enabled)),
        format!("Binder:         {}", report.binder),
        format!("Firewall:       {firewall}"),
        format!(
            "Waydroid:       installed {}, initialized {}, container {}",
            yes_no(report.waydroid.installed),
            yes_no(report.waydroid.initialized),
            if report.waydroid.container_active { "running" } else { "stopped" }
        ),
    ]
    .join("\n")
}
