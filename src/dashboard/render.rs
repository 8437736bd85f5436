//! HTML rendering of the dashboard page
//!
//! Rendering is split from querying: [`load_view`] reads the store, [`render`]
//! is a pure function of the view, so it can be tested without a server.

use std::fmt::{self, Write};
use std::time::Duration;

use crate::storage::{StorageResult, TelemetryStore};
use crate::{Alert, MetricSample};

/// Window the dashboard looks back over
pub const VIEW_WINDOW: Duration = Duration::from_secs(60 * 60);

/// Display band of a metric card
///
/// The band boundaries are lower than the alert thresholds; they only drive
/// the colouring of the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusBand {
    Good,
    Warning,
    Critical,
}

impl StatusBand {
    /// `Good` below `warning_from`, `Warning` below `critical_from`, else `Critical`
    pub fn classify(value: f64, warning_from: f64, critical_from: f64) -> Self {
        if value < warning_from {
            StatusBand::Good
        } else if value < critical_from {
            StatusBand::Warning
        } else {
            StatusBand::Critical
        }
    }

    pub fn for_cpu(percent: f64) -> Self {
        Self::classify(percent, 50.0, 80.0)
    }

    pub fn for_memory(percent: f64) -> Self {
        Self::classify(percent, 70.0, 85.0)
    }

    pub fn for_disk(percent: f64) -> Self {
        Self::classify(percent, 80.0, 90.0)
    }

    pub fn css_class(&self) -> &'static str {
        match self {
            StatusBand::Good => "good",
            StatusBand::Warning => "warning",
            StatusBand::Critical => "critical",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StatusBand::Good => "Normal",
            StatusBand::Warning => "High",
            StatusBand::Critical => "Critical",
        }
    }
}

/// Fixed facts about the running agent shown on every page
#[derive(Debug, Clone)]
pub struct OperationalSummary {
    pub collection_interval: Duration,
    pub refresh_secs: u64,
    /// How an operator stops the agent
    pub stop_hint: String,
}

/// Everything a page shows, read from the store in one go
#[derive(Debug, Clone, Default)]
pub struct DashboardView {
    /// Most recent sample of the window
    pub latest: Option<MetricSample>,
    /// Samples stored within the window
    pub data_points: usize,
    pub alerts: Vec<Alert>,
}

pub async fn load_view(store: &dyn TelemetryStore) -> StorageResult<DashboardView> {
    let mut samples = store.query_metrics(VIEW_WINDOW).await?;
    let alerts = store.query_active_alerts().await?;

    let data_points = samples.len();
    samples.truncate(1);

    Ok(DashboardView {
        latest: samples.pop(),
        data_points,
        alerts,
    })
}

/// Escape text for use in element content and quoted attributes
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

const STYLE: &str = r#"
    body { font-family: system-ui, sans-serif; background: #10141c; color: #e6e9ef; margin: 0; }
    .container { max-width: 1100px; margin: 0 auto; padding: 24px; }
    .header h1 { margin: 0 0 4px 0; }
    .header p { color: #9aa3b5; margin: 0; }
    .metrics { display: grid; grid-template-columns: repeat(auto-fit, minmax(220px, 1fr)); gap: 16px; margin: 24px 0; }
    .metric-card { background: #1a2030; border-radius: 10px; padding: 18px; }
    .metric-card h3 { margin: 0; font-size: 15px; color: #9aa3b5; }
    .metric-value { font-size: 34px; font-weight: 600; margin: 10px 0; }
    .status { padding: 3px 10px; border-radius: 12px; font-size: 13px; }
    .status.good { background: #1f5f3a; }
    .status.warning { background: #7a5a12; }
    .status.critical { background: #7c1f24; }
    .alerts, .summary { background: #1a2030; border-radius: 10px; padding: 18px; margin-bottom: 16px; }
    .alert { border-left: 4px solid #9aa3b5; padding: 8px 12px; margin: 8px 0; background: #141926; }
    .alert.info { border-color: #3d7bd9; }
    .alert.warning { border-color: #d9a13d; }
    .alert.critical { border-color: #d93d4a; }
    .alert small { color: #9aa3b5; }
"#;

fn metric_card(out: &mut String, title: &str, value: &str, css: &str, label: &str) -> fmt::Result {
    write!(
        out,
        r#"
            <div class="metric-card">
                <h3>{title}</h3>
                <div class="metric-value">{value}</div>
                <span class="status {css}">{label}</span>
            </div>"#
    )
}

fn percent_card(out: &mut String, title: &str, percent: f64, band: StatusBand) -> fmt::Result {
    metric_card(
        out,
        title,
        &format!("{percent:.1}%"),
        band.css_class(),
        band.label(),
    )
}

fn alert_list(out: &mut String, alerts: &[Alert]) -> fmt::Result {
    if alerts.is_empty() {
        return write!(out, "\n            <p>No security threats detected</p>");
    }

    for alert in alerts {
        write!(
            out,
            r#"
            <div class="alert {class}">
                <strong>{level}</strong>: {message}
                <small> - {timestamp}</small>
            </div>"#,
            class = alert.level.as_str().to_ascii_lowercase(),
            level = alert.level,
            message = escape_html(&alert.message),
            timestamp = alert.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        )?;
    }
    Ok(())
}

/// Render the full page
///
/// A missing sample renders as zero on every card.
pub fn render(view: &DashboardView, summary: &OperationalSummary) -> Result<String, fmt::Error> {
    let (cpu, memory, disk, processes) = view
        .latest
        .as_ref()
        .map(|s| {
            (
                s.cpu_percent,
                s.memory_percent,
                s.disk_usage_percent,
                s.process_count,
            )
        })
        .unwrap_or_default();

    let latest_at = view
        .latest
        .as_ref()
        .map(|s| s.timestamp.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| "no samples yet".to_string());

    let mut out = String::with_capacity(8 * 1024);

    write!(
        out,
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Host Telemetry Dashboard</title>
    <meta charset="utf-8">
    <meta name="viewport" content="width=device-width, initial-scale=1">
    <style>{STYLE}</style>
    <script>setTimeout(function () {{ window.location.reload(); }}, {refresh_ms});</script>
</head>
<body>
    <div class="container">
        <div class="header">
            <h1>Host Telemetry</h1>
            <p>Latest sample: {latest_at}</p>
        </div>
        <div class="metrics">"#,
        refresh_ms = summary.refresh_secs.saturating_mul(1000),
    )?;

    percent_card(&mut out, "CPU Usage", cpu, StatusBand::for_cpu(cpu))?;
    percent_card(&mut out, "Memory Usage", memory, StatusBand::for_memory(memory))?;
    percent_card(&mut out, "Disk Usage", disk, StatusBand::for_disk(disk))?;
    metric_card(
        &mut out,
        "Active Processes",
        &processes.to_string(),
        StatusBand::Good.css_class(),
        "Running",
    )?;

    write!(
        out,
        r#"
        </div>
        <div class="alerts">
            <h2>Active Alerts ({count})</h2>"#,
        count = view.alerts.len(),
    )?;
    alert_list(&mut out, &view.alerts)?;

    write!(
        out,
        r#"
        </div>
        <div class="summary">
            <h2>Operational Summary</h2>
            <p><strong>Data points (last hour):</strong> {data_points}</p>
            <p><strong>Collection interval:</strong> every {interval} seconds</p>
            <p><strong>Auto-refresh:</strong> every {refresh} seconds</p>
            <p><strong>Stop agent:</strong> {stop_hint}</p>
        </div>
    </div>
</body>
</html>
"#,
        data_points = view.data_points,
        interval = summary.collection_interval.as_secs(),
        refresh = summary.refresh_secs,
        stop_hint = escape_html(&summary.stop_hint),
    )?;

    Ok(out)
}
