//! Report renderers.
//!
//! Every format shows the same three sections: the ranges in their current
//! order, the declared shared networks, and the "All networks" summary.
//! Backup columns appear only when the lease file contained backup leases.
//! The text and CSV renderers honor an [`OutputLimit`]; JSON always carries
//! the whole report.

use std::fmt;
use std::io::Write;
use std::path::Path;
use std::str::FromStr;

use chrono::{DateTime, Local};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::status::StatusCounts;
use crate::summary::{Report, Utilization};

const NAME_WIDTH: usize = 20;
const MIN_IP_WIDTH: usize = 16;
const NUMBER_WIDTH: usize = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
    Csv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Ranges,
    SharedNetworks,
    Summary,
}

impl Section {
    fn bit(self) -> u8 {
        match self {
            Self::Ranges => 1,
            Self::SharedNetworks => 2,
            Self::Summary => 4,
        }
    }
}

/// Which report sections print their header and which print their rows.
///
/// Written as two octal digits, headers first and rows second. Each digit is
/// the sum of 1 (ranges), 2 (shared networks) and 4 (summary), so `77` prints
/// everything and `04` prints only the summary row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct OutputLimit {
    headers: u8,
    rows: u8,
}

impl OutputLimit {
    pub const ALL: Self = Self {
        headers: 7,
        rows: 7,
    };

    pub fn shows_header(self, section: Section) -> bool {
        self.headers & section.bit() != 0
    }

    pub fn shows_rows(self, section: Section) -> bool {
        self.rows & section.bit() != 0
    }
}

impl Default for OutputLimit {
    fn default() -> Self {
        Self::ALL
    }
}

impl FromStr for OutputLimit {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let digits: Vec<u8> = s
            .chars()
            .map(|c| c.to_digit(8).map(|digit| digit as u8))
            .collect::<Option<_>>()
            .unwrap_or_default();
        match digits[..] {
            [headers, rows] => Ok(Self { headers, rows }),
            _ => Err(Error::InvalidConfig(format!(
                "output limit '{}' must be two digits between 0 and 7",
                s
            ))),
        }
    }
}

impl TryFrom<String> for OutputLimit {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<OutputLimit> for String {
    fn from(limit: OutputLimit) -> Self {
        limit.to_string()
    }
}

impl fmt::Display for OutputLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.headers, self.rows)
    }
}

/// Modification time of the lease file, if the file system reports one.
pub fn lease_file_mtime(path: &Path) -> Option<DateTime<Local>> {
    std::fs::metadata(path)
        .and_then(|metadata| metadata.modified())
        .ok()
        .map(DateTime::<Local>::from)
}

pub fn render(report: &Report, format: OutputFormat, limit: OutputLimit) -> Result<String> {
    match format {
        OutputFormat::Text => Ok(render_text(report, limit)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(report)? + "\n"),
        OutputFormat::Csv => render_csv(report, limit),
    }
}

/// Renders `report` and writes it to `output`, or to stdout when `None`.
pub fn write_report(
    report: &Report,
    format: OutputFormat,
    limit: OutputLimit,
    output: Option<&Path>,
) -> Result<()> {
    let text = render(report, format, limit)?;
    match output {
        Some(path) => {
            debug!("Writing {:?} report to {}", format, path.display());
            std::fs::write(path, text)?;
        }
        None => std::io::stdout().lock().write_all(text.as_bytes())?,
    }
    Ok(())
}

fn status_counts(label: &str, counts: &StatusCounts) -> String {
    format!(
        "{} - crit: {} warn: {} ok: {} ignored: {} suppressed: {}",
        label, counts.critical, counts.warning, counts.ok, counts.ignored, counts.suppressed
    )
}

/// One-line alarm summary in the style of a monitoring plugin.
pub fn render_status_line(report: &Report) -> String {
    let ranges = report.range_statuses();
    let networks = report.network_statuses();
    let mut line = format!(
        "{}: {}",
        report.worst_status(),
        status_counts("Ranges", &ranges)
    );
    if !report.shared_networks.is_empty() {
        line.push_str("; ");
        line.push_str(&status_counts("Shared nets", &networks));
    }
    line
}

fn usage_headers(backups: bool) -> Vec<&'static str> {
    let mut headers = vec!["max", "cur", "percent", "touch", "t+c", "t+c perc"];
    if backups {
        headers.extend(["bu", "bu perc"]);
    }
    headers
}

fn usage_columns(usage: &Utilization, backups: bool) -> Vec<String> {
    let mut columns = vec![
        format!("{:.0}", usage.size),
        usage.used.to_string(),
        format!("{:.3}", usage.percent),
        usage.touched.to_string(),
        usage.touched_and_used.to_string(),
        format!("{:.3}", usage.touched_and_used_percent),
    ];
    if backups {
        columns.push(usage.backups.to_string());
        columns.push(format!("{:.3}", usage.backup_percent));
    }
    columns
}

fn right_aligned<S: AsRef<str>>(columns: &[S]) -> String {
    columns
        .iter()
        .map(|column| format!("{:>width$}", column.as_ref(), width = NUMBER_WIDTH))
        .collect::<Vec<_>>()
        .join("")
}

fn render_text(report: &Report, limit: OutputLimit) -> String {
    let backups = report.backups_found;
    let ip_width = report
        .subnets
        .iter()
        .flat_map(|range| [range.first_ip.len(), range.last_ip.len()])
        .max()
        .unwrap_or(0)
        .max(MIN_IP_WIDTH);
    let headers = right_aligned(&usage_headers(backups));

    let mut sections: Vec<Vec<String>> = Vec::new();

    let mut lines = Vec::new();
    if limit.shows_header(Section::Ranges) {
        lines.push("Ranges:".to_string());
        lines.push(format!(
            "{:<NAME_WIDTH$} {:<ip_width$} {:<ip_width$}{}",
            "shared net name", "first ip", "last ip", headers
        ));
    }
    if limit.shows_rows(Section::Ranges) {
        for range in &report.subnets {
            lines.push(format!(
                "{:<NAME_WIDTH$} {:<ip_width$} {:<ip_width$}{}",
                range.location,
                range.first_ip,
                range.last_ip,
                right_aligned(&usage_columns(&range.usage, backups))
            ));
        }
    }
    sections.push(lines);

    if !report.shared_networks.is_empty() {
        let mut lines = Vec::new();
        if limit.shows_header(Section::SharedNetworks) {
            lines.push("Shared networks:".to_string());
            lines.push(format!("{:<NAME_WIDTH$}{}", "name", headers));
        }
        if limit.shows_rows(Section::SharedNetworks) {
            for network in &report.shared_networks {
                lines.push(format!(
                    "{:<NAME_WIDTH$}{}",
                    network.location,
                    right_aligned(&usage_columns(&network.usage, backups))
                ));
            }
        }
        sections.push(lines);
    }

    let mut lines = Vec::new();
    if limit.shows_header(Section::Summary) {
        lines.push("Sum of all ranges:".to_string());
        lines.push(format!("{:<NAME_WIDTH$}{}", "name", headers));
    }
    if limit.shows_rows(Section::Summary) {
        lines.push(format!(
            "{:<NAME_WIDTH$}{}",
            report.summary.location,
            right_aligned(&usage_columns(&report.summary.usage, backups))
        ));
    }
    sections.push(lines);

    let mut text = sections
        .into_iter()
        .filter(|lines| !lines.is_empty())
        .map(|lines| lines.join("\n"))
        .collect::<Vec<_>>()
        .join("\n\n");
    if !text.is_empty() {
        text.push('\n');
    }
    text
}

fn render_csv(report: &Report, limit: OutputLimit) -> Result<String> {
    let backups = report.backups_found;
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(Vec::new());

    if limit.shows_header(Section::Ranges) {
        writer.write_record(["Ranges:"])?;
        let mut header = vec!["shared net name", "first ip", "last ip"];
        header.extend(usage_headers(backups));
        writer.write_record(&header)?;
    }
    if limit.shows_rows(Section::Ranges) {
        for range in &report.subnets {
            let mut record = vec![
                range.location.clone(),
                range.first_ip.clone(),
                range.last_ip.clone(),
            ];
            record.extend(usage_columns(&range.usage, backups));
            writer.write_record(&record)?;
        }
    }

    let mut header = vec!["name"];
    header.extend(usage_headers(backups));

    if !report.shared_networks.is_empty() {
        if limit.shows_header(Section::SharedNetworks) {
            writer.write_record(["Shared networks:"])?;
            writer.write_record(&header)?;
        }
        if limit.shows_rows(Section::SharedNetworks) {
            for network in &report.shared_networks {
                let mut record = vec![network.location.clone()];
                record.extend(usage_columns(&network.usage, backups));
                writer.write_record(&record)?;
            }
        }
    }

    if limit.shows_header(Section::Summary) {
        writer.write_record(["Sum of all ranges:"])?;
        writer.write_record(&header)?;
    }
    if limit.shows_rows(Section::Summary) {
        let mut record = vec![report.summary.location.clone()];
        record.extend(usage_columns(&report.summary.usage, backups));
        writer.write_record(&record)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|error| Error::Io(error.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
