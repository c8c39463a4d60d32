use colored::Colorize;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

pub mod human;
pub mod json;
pub mod troubleshoot;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warn,
    Error,
}

impl Severity {
    fn marker(&self) -> &'static str {
        match self {
            Severity::Info => "[*]",
            Severity::Success => "[+]",
            Severity::Warn => "[!]",
            Severity::Error => "[x]",
        }
    }
}

/// Renders one operator-facing line; colour is dropped when stdout is not a terminal.
pub fn format_status(severity: Severity, message: &str) -> String {
    let marker = severity.marker();
    let marker = match severity {
        Severity::Info => marker.blue(),
        Severity::Success => marker.green().bold(),
        Severity::Warn => marker.yellow().bold(),
        Severity::Error => marker.red().bold(),
    };
    format!("{marker} {message}")
}

/// Prints a status line and mirrors it into the log file.
pub fn status(severity: Severity, message: &str) {
    match severity {
        Severity::Info | Severity::Success => {
            info!("{message}");
            println!("{}", format_status(severity, message));
        }
        Severity::Warn => {
            warn!("{message}");
            println!("{}", format_status(severity, message));
        }
        Severity::Error => {
            error!("{message}");
            eprintln!("{}", format_status(severity, message));
        }
    }
}

pub fn step(message: &str) {
    status(Severity::Info, message);
}

pub fn success(message: &str) {
    status(Severity::Success, message);
}

pub fn warning(message: &str) {
    status(Severity::Warn, message);
}

pub fn failure(message: &str) {
    status(Severity::Error, message);
}

pub fn heading(title: &str) {
    info!("== {title} ==");
    println!("\n{}", title.bold());
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Done,
    Skipped,
    Degraded,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepRecord {
    pub name: String,
    pub status: StepStatus,
    pub detail: Option<String>,
}

/// Per-step outcome of a multi-step flow such as the full install.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339::option")]
    pub ended_at: Option<OffsetDateTime>,
    pub steps: Vec<StepRecord>,
}

impl RunSummary {
    pub fn start(title: &str) -> Self {
        Self {
            title: title.to_string(),
            started_at: OffsetDateTime::now_utc(),
            ended_at: None,
            steps: Vec::new(),
        }
    }

    pub fn record(&mut self, name: &str, status: StepStatus, detail: Option<String>) {
        self.steps.push(StepRecord {
            name: name.to_string(),
            status,
            detail,
        });
    }

    pub fn finish(&mut self) {
        self.ended_at = Some(OffsetDateTime::now_utc());
    }

    pub fn duration(&self) -> Option<Duration> {
        let end = self.ended_at?;
        Some(end - self.started_at)
    }

    pub fn is_degraded(&self) -> bool {
        self.steps
            .iter()
            .any(|step| matches!(step.status, StepStatus::Degraded | StepStatus::Failed))
    }

    pub fn human_summary(&self) -> String {
        let duration = self
            .duration()
            .map(format_duration)
            .unwrap_or_else(|| "unknown".to_string());
        let mut lines = vec![format!("{} finished in {duration}.", self.title)];
        for step in &self.steps {
            let status = match step.status {
                StepStatus::Done => "done",
                StepStatus::Skipped => "skipped",
                StepStatus::Degraded => "degraded",
                StepStatus::Failed => "failed",
            };
            match &step.detail {
                Some(detail) => lines.push(format!("  {:<10} {} ({detail})", status, step.name)),
                None => lines.push(format!("  {:<10} {}", status, step.name)),
            }
        }
        if self.is_degraded() {
            lines.push("Some steps did not complete; see the log for details.".to_string());
        }
        lines.join("\n")
    }
}

fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_seconds_f64().max(0.0) as i64;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else if minutes > 0 {
        format!("{minutes}m {seconds}s")
    } else {
        format!("{seconds}s")
    }
}
