use chrono::{DateTime, NaiveDateTime};
use eyre::{Context, Result};
use std::path::PathBuf;
use url::Url;

/// Configuration required to run the export process.
/// This decouples the logic from how the arguments were parsed (CLI/Config file).
#[derive(Clone, Debug)]
pub struct ExportConfig {
    pub source_dir: PathBuf,
    pub target_dir: PathBuf,
    pub custom_data: Option<PathBuf>,
    pub verbose: bool,
    pub quiet: bool,
}

impl ExportConfig {
    pub fn new(source_dir: impl Into<PathBuf>, target_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            target_dir: target_dir.into(),
            custom_data: None,
            verbose: false,
            quiet: false,
        }
    }

    pub fn source_attachments(&self) -> PathBuf {
        self.source_dir.join(ATTACHMENTS_DIR)
    }

    pub fn target_attachments(&self) -> PathBuf {
        self.target_dir.join(ATTACHMENTS_DIR)
    }
}

/// Directory name used for attachment payloads on both sides of the export.
pub const ATTACHMENTS_DIR: &str = "attachments";

/// Timestamp layout used by the tracker's REST API, e.g. `2023-04-05T14:03:09.000+0200`.
const TRACKER_TIMESTAMP: &str = "%Y-%m-%dT%H:%M:%S%.f%z";

/// Render a tracker timestamp as `05. Apr 2023 14:03 (UTC)`.
///
/// The wall-clock value is kept as exported; the offset is dropped, not converted.
pub fn format_timestamp(raw: &str) -> Result<String> {
    let clock = DateTime::parse_from_str(raw, TRACKER_TIMESTAMP)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.naive_local())
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f"))
        .wrap_err_with(|| format!("Unrecognized timestamp: {raw:?}"))?;
    Ok(clock.format("%d. %b %Y %H:%M (UTC)").to_string())
}

/// Swap the API path of `self_url` for the human-facing `/browse/{key}` page.
pub fn browse_url(self_url: &Url, key: &str) -> Url {
    let mut url = self_url.clone();
    url.set_path(&format!("/browse/{key}"));
    url
}

/// Uppercase the first character, leave the rest alone.
pub fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamps_keep_the_exported_clock() {
        assert_eq!(
            format_timestamp("2023-04-05T14:03:09.000+0200").unwrap(),
            "05. Apr 2023 14:03 (UTC)"
        );
        assert_eq!(
            format_timestamp("2021-12-24T23:59:00-05:00").unwrap(),
            "24. Dec 2021 23:59 (UTC)"
        );
        assert_eq!(
            format_timestamp("2020-01-02T03:04:05.123").unwrap(),
            "02. Jan 2020 03:04 (UTC)"
        );
        assert!(format_timestamp("yesterday").is_err());
    }

    #[test]
    fn browse_url_replaces_the_path() {
        let url = Url::parse("https://host/rest/api/2/issue/10001").unwrap();
        assert_eq!(browse_url(&url, "ABC-1").as_str(), "https://host/browse/ABC-1");

        let url = Url::parse("https://host:8443/jira/rest/api/2/issue/7").unwrap();
        assert_eq!(
            browse_url(&url, "XYZ-9").as_str(),
            "https://host:8443/browse/XYZ-9"
        );
    }

    #[test]
    fn capitalize_only_touches_the_first_letter() {
        assert_eq!(capitalize("is blocked by"), "Is blocked by");
        assert_eq!(capitalize("relates to JIRA"), "Relates to JIRA");
        assert_eq!(capitalize(""), "");
    }
}
