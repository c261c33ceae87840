//! Scrape progress reporting.
//!
//! Reports per-page progress during `catalog scrape` so operators can see
//! which page is being fetched and how many products have been gathered.
//! Progress is emitted on **stderr** so stdout remains parseable for scripts.

use std::io::Write;

/// A single progress event for a scrape run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScrapeProgressEvent {
    /// About to fetch this page.
    Fetching { page: u32, url: String },
    /// Page fetched and extracted.
    Extracted { page: u32, records: u64, total: u64 },
}

/// Reports scrape progress. Implementations write to stderr (human or JSON).
pub trait ScrapeProgressReporter {
    /// Emit a progress event. Called from the pagination driver.
    fn report(&self, event: ScrapeProgressEvent);
}

/// Human-friendly progress on stderr: "scrape  page 3  24 products (1,234 total)".
pub struct StderrProgress;

impl ScrapeProgressReporter for StderrProgress {
    fn report(&self, event: ScrapeProgressEvent) {
        let line = match &event {
            ScrapeProgressEvent::Fetching { page, url } => {
                format!("scrape  page {}  fetching {}\n", page, url)
            }
            ScrapeProgressEvent::Extracted {
                page,
                records,
                total,
            } => format!(
                "scrape  page {}  {} products ({} total)\n",
                page,
                format_number(*records),
                format_number(*total)
            ),
        };
        let mut stderr = std::io::stderr().lock();
        let _ = stderr.write_all(line.as_bytes());
        let _ = stderr.flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl ScrapeProgressReporter for JsonProgress {
    fn report(&self, event: ScrapeProgressEvent) {
        let obj = match &event {
            ScrapeProgressEvent::Fetching { page, url } => serde_json::json!({
                "event": "progress",
                "phase": "fetching",
                "page": page,
                "url": url
            }),
            ScrapeProgressEvent::Extracted {
                page,
                records,
                total,
            } => serde_json::json!({
                "event": "progress",
                "phase": "extracted",
                "page": page,
                "records": records,
                "total": total
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let mut stderr = std::io::stderr().lock();
            let _ = writeln!(stderr, "{}", line);
            let _ = stderr.flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl ScrapeProgressReporter for NoProgress {
    fn report(&self, _event: ScrapeProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    /// Parse the `--progress` flag value.
    pub fn from_flag(flag: &str) -> anyhow::Result<Self> {
        match flag {
            "auto" => Ok(Self::default_for_tty()),
            "human" => Ok(ProgressMode::Human),
            "json" => Ok(ProgressMode::Json),
            "off" => Ok(ProgressMode::Off),
            other => anyhow::bail!(
                "Unknown progress mode: '{}'. Must be auto, human, json, or off.",
                other
            ),
        }
    }

    /// Build a reporter for this mode.
    pub fn reporter(&self) -> Box<dyn ScrapeProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_comma() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1_234_567), "1,234,567");
    }

    #[test]
    fn progress_flag_parsing() {
        assert_eq!(ProgressMode::from_flag("json").unwrap(), ProgressMode::Json);
        assert_eq!(ProgressMode::from_flag("off").unwrap(), ProgressMode::Off);
        assert!(ProgressMode::from_flag("loud").is_err());
    }
}
