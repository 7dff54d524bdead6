//! Record loading and type definitions for exported issue-tracker records.
//!
//! Each issue is one JSON document in the tracker's REST shape:
//!
//! ```json
//! {
//!   "key": "ABC-1",
//!   "self": "https://tracker.example.com/rest/api/2/issue/10001",
//!   "fields": {
//!     "issuetype": { "name": "Bug" },
//!     "summary": "...",
//!     "status": { "name": "Open" },
//!     "reporter": { "name": "jdoe" },
//!     "description": "...",
//!     "labels": ["backend"],
//!     "created": "2023-04-05T14:03:09.000+0200",
//!     "updated": "2023-04-06T08:00:00.000+0200",
//!     "project": { "key": "ABC" },
//!     "comment": { "comments": [ ... ] },
//!     "issuelinks": [ ... ],
//!     "attachment": [ ... ]
//!   }
//! }
//! ```
//!
//! Only `key`, `self` and `fields` are decoded eagerly. Everything below `fields`
//! stays a generic [`Value`] tree and is pulled out on demand, either through
//! [`IssueRecord::field`] (required, fails with the missing path) or through
//! [`lookup_path`] (optional, never fails).
use std::fs;
use std::path::{Path, PathBuf};

use eyre::{Context, Result, eyre};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use url::Url;

/// Base name of the sync bookkeeping file that lives next to the issue files.
pub const SYNC_STATE_STEM: &str = "sync_state";

// ---------------------------------------------------------------------------
// Issue record
// ---------------------------------------------------------------------------

/// One exported issue. Immutable once loaded.
#[derive(Debug, Clone, Deserialize)]
pub struct IssueRecord {
    pub key: String,
    #[serde(rename = "self")]
    pub self_url: Url,
    pub fields: Map<String, Value>,
}

impl IssueRecord {
    /// Walk `fields` along `path`, failing with the dotted path if any step is absent.
    pub fn field(&self, path: &[&str]) -> Result<&Value> {
        lookup_path(&self.fields, path)
            .filter(|v| !v.is_null())
            .ok_or_else(|| eyre!("Missing field `{}` in issue {}", path.join("."), self.key))
    }

    /// Like [`IssueRecord::field`], but the value must also be a string.
    pub fn field_str(&self, path: &[&str]) -> Result<&str> {
        self.field(path)?.as_str().ok_or_else(|| {
            eyre!(
                "Field `{}` in issue {} is not a string",
                path.join("."),
                self.key
            )
        })
    }

    /// Decode an optional list below `fields`. Absent or null means empty.
    pub fn list<T>(&self, path: &[&str]) -> Result<Vec<T>>
    where
        T: for<'de> Deserialize<'de>,
    {
        match lookup_path(&self.fields, path) {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(value) => Vec::<T>::deserialize(value)
                .wrap_err_with(|| format!("Malformed `{}` in issue {}", path.join("."), self.key)),
        }
    }

    pub fn comments(&self) -> Result<Vec<Comment>> {
        self.list(&["comment", "comments"])
    }

    pub fn links(&self) -> Result<Vec<IssueLink>> {
        self.list(&["issuelinks"])
    }

    pub fn attachments(&self) -> Result<Vec<Attachment>> {
        self.list(&["attachment"])
    }
}

/// Walk a nested tree along `path`, short-circuiting to `None` on the first absent step.
///
/// Objects are indexed by key. Arrays are indexed when the key parses as a position,
/// so `["components", "0", "name"]` reaches the first component's name.
/// An empty path resolves to nothing.
pub fn lookup_path<'a, S: AsRef<str>>(
    root: &'a Map<String, Value>,
    path: &[S],
) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    rest.iter()
        .try_fold(root.get(first.as_ref())?, |node, key| step(node, key.as_ref()))
}

fn step<'a>(node: &'a Value, key: &str) -> Option<&'a Value> {
    match node {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct UserRef {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub author: UserRef,
    /// ISO-8601 timestamp as exported, offset included.
    pub updated: String,
    /// Already formatted by the tracker; inserted verbatim.
    pub body: String,
}

// ---------------------------------------------------------------------------
// Issue links
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct LinkType {
    pub name: String,
    /// Relationship as seen from the inward side, e.g. "is blocked by".
    pub inward: String,
    /// Relationship as seen from the outward side, e.g. "blocks".
    pub outward: String,
}

/// The other end of a link.
#[derive(Debug, Clone, Deserialize)]
pub struct LinkedIssue {
    pub key: String,
    #[serde(rename = "self")]
    pub self_url: Url,
}

/// Which side of the link the current issue sits on.
#[derive(Debug, Clone)]
pub enum LinkDirection {
    Outward(LinkedIssue),
    Inward(LinkedIssue),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(try_from = "RawIssueLink")]
pub struct IssueLink {
    pub link_type: LinkType,
    pub direction: LinkDirection,
}

impl IssueLink {
    pub fn target(&self) -> &LinkedIssue {
        match &self.direction {
            LinkDirection::Outward(issue) | LinkDirection::Inward(issue) => issue,
        }
    }

    /// Relationship name for this direction, as written by the tracker.
    pub fn relation(&self) -> &str {
        match self.direction {
            LinkDirection::Outward(_) => &self.link_type.outward,
            LinkDirection::Inward(_) => &self.link_type.inward,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawIssueLink {
    #[serde(rename = "type")]
    link_type: LinkType,
    outward_issue: Option<LinkedIssue>,
    inward_issue: Option<LinkedIssue>,
}

impl TryFrom<RawIssueLink> for IssueLink {
    type Error = String;

    // Outward wins when a link carries both ends.
    fn try_from(raw: RawIssueLink) -> Result<Self, Self::Error> {
        let direction = match (raw.outward_issue, raw.inward_issue) {
            (Some(issue), _) => LinkDirection::Outward(issue),
            (None, Some(issue)) => LinkDirection::Inward(issue),
            (None, None) => {
                return Err(format!(
                    "issue link `{}` has neither outwardIssue nor inwardIssue",
                    raw.link_type.name
                ));
            }
        };
        Ok(Self {
            link_type: raw.link_type,
            direction,
        })
    }
}

// ---------------------------------------------------------------------------
// Attachments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Attachment {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    pub filename: String,
    /// Remote download URL, used when no local copy exists.
    pub content: String,
}

impl Attachment {
    /// Name of the payload file inside the export's `attachments/` directory.
    pub fn local_filename(&self, issue_key: &str) -> String {
        format!(
            "{}-{}-{}",
            issue_key,
            self.id,
            self.filename.replace(' ', "_")
        )
    }

    /// `.png` and `.jpg` are rendered inline. Case-sensitive.
    pub fn is_image(&self) -> bool {
        self.filename.ends_with(".png") || self.filename.ends_with(".jpg")
    }
}

fn string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(serde_json::Number),
    }
    Ok(match Id::deserialize(deserializer)? {
        Id::Text(s) => s,
        Id::Number(n) => n.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Custom data configuration
// ---------------------------------------------------------------------------

/// A configured extra field: display label plus the key path below `fields`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "(String, Vec<String>)")]
pub struct FieldSpec {
    pub label: String,
    pub path: Vec<String>,
}

impl From<(String, Vec<String>)> for FieldSpec {
    fn from((label, path): (String, Vec<String>)) -> Self {
        Self { label, path }
    }
}

/// Extra metadata fields and sections, in render order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CustomDataConfig {
    #[serde(default)]
    pub simple_fields: Vec<FieldSpec>,
    #[serde(default)]
    pub sections: Vec<FieldSpec>,
}

impl CustomDataConfig {
    /// Load from a JSON file. No path means no extra fields.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path)
            .wrap_err_with(|| format!("Failed to read custom data config: {}", path.display()))?;
        serde_json::from_str(&content)
            .wrap_err_with(|| format!("Failed to parse custom data config: {}", path.display()))
    }
}

// ---------------------------------------------------------------------------
// Loading
// ---------------------------------------------------------------------------

/// List the issue files in `source_dir`, skipping the sync state file.
pub fn list_issue_files(source_dir: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(source_dir)
        .wrap_err_with(|| format!("Failed to read source directory: {}", source_dir.display()))?;

    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
        .filter(|path| path.file_stem().is_some_and(|stem| stem != SYNC_STATE_STEM))
        .collect();
    files.sort();
    Ok(files)
}

pub fn load_issue(path: &Path) -> Result<IssueRecord> {
    let bytes = fs::read(path).wrap_err_with(|| format!("Failed to read: {}", path.display()))?;
    serde_json::from_slice(&bytes)
        .wrap_err_with(|| format!("Failed to parse issue: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(fields: Value) -> IssueRecord {
        serde_json::from_value(json!({
            "key": "ABC-1",
            "self": "https://host/rest/api/2/issue/10001",
            "fields": fields,
        }))
        .unwrap()
    }

    #[test]
    fn lookup_path_short_circuits_on_missing_key() {
        let issue = record(json!({ "customfield_1": { "value": "x" } }));
        assert_eq!(
            lookup_path(&issue.fields, &["customfield_1", "value"]),
            Some(&json!("x"))
        );
        assert_eq!(lookup_path(&issue.fields, &["customfield_2", "value"]), None);
        assert_eq!(
            lookup_path(&issue.fields, &["customfield_1", "value", "deeper"]),
            None
        );
        assert_eq!(lookup_path::<&str>(&issue.fields, &[]), None);
    }

    #[test]
    fn lookup_path_indexes_arrays() {
        let issue = record(json!({ "components": [{ "name": "api" }, { "name": "ui" }] }));
        assert_eq!(
            lookup_path(&issue.fields, &["components", "1", "name"]),
            Some(&json!("ui"))
        );
        assert_eq!(lookup_path(&issue.fields, &["components", "5", "name"]), None);
        assert_eq!(lookup_path(&issue.fields, &["components", "x"]), None);
    }

    #[test]
    fn field_reports_missing_path() {
        let issue = record(json!({ "status": null }));
        let err = issue.field(&["issuetype", "name"]).unwrap_err();
        assert!(err.to_string().contains("issuetype.name"));
        assert!(issue.field(&["status", "name"]).is_err());
    }

    #[test]
    fn links_pick_direction_with_outward_precedence() {
        let issue = record(json!({
            "issuelinks": [
                {
                    "type": { "name": "Blocks", "inward": "is blocked by", "outward": "blocks" },
                    "inwardIssue": { "key": "ABC-3", "self": "https://host/rest/api/2/issue/3" }
                },
                {
                    "type": { "name": "Relates", "inward": "relates to", "outward": "relates to" },
                    "outwardIssue": { "key": "XYZ-9", "self": "https://other/rest/api/2/issue/9" },
                    "inwardIssue": { "key": "ABC-4", "self": "https://host/rest/api/2/issue/4" }
                }
            ]
        }));
        let links = issue.links().unwrap();
        assert!(matches!(links[0].direction, LinkDirection::Inward(_)));
        assert_eq!(links[0].relation(), "is blocked by");
        assert!(matches!(links[1].direction, LinkDirection::Outward(_)));
        assert_eq!(links[1].target().key, "XYZ-9");
    }

    #[test]
    fn link_without_either_end_is_rejected() {
        let issue = record(json!({
            "issuelinks": [{ "type": { "name": "Blocks", "inward": "a", "outward": "b" } }]
        }));
        let err = issue.links().unwrap_err();
        assert!(format!("{err:#}").contains("neither outwardIssue nor inwardIssue"));
    }

    #[test]
    fn absent_lists_are_empty() {
        let issue = record(json!({ "comment": null }));
        assert!(issue.comments().unwrap().is_empty());
        assert!(issue.links().unwrap().is_empty());
        assert!(issue.attachments().unwrap().is_empty());
    }

    #[test]
    fn attachment_ids_accept_numbers_and_strings() {
        let issue = record(json!({
            "attachment": [
                { "id": 42, "filename": "my photo.png", "content": "https://host/a/42" },
                { "id": "43", "filename": "log.TXT", "content": "https://host/a/43" }
            ]
        }));
        let attachments = issue.attachments().unwrap();
        assert_eq!(attachments[0].local_filename("ABC-1"), "ABC-1-42-my_photo.png");
        assert!(attachments[0].is_image());
        assert_eq!(attachments[1].id, "43");
        assert!(!attachments[1].is_image());
    }

    #[test]
    fn custom_config_parses_label_path_pairs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.json");
        fs::write(
            &path,
            r#"{"simple_fields": [["Sprint", ["customfield_10010", "name"]]]}"#,
        )
        .unwrap();

        let config = CustomDataConfig::load(Some(&path)).unwrap();
        assert_eq!(
            config.simple_fields,
            vec![FieldSpec {
                label: "Sprint".into(),
                path: vec!["customfield_10010".into(), "name".into()],
            }]
        );
        assert!(config.sections.is_empty());
        assert_eq!(CustomDataConfig::load(None).unwrap(), CustomDataConfig::default());
    }

    #[test]
    fn list_issue_files_skips_sync_state_and_other_extensions() {
        let dir = TempDir::new().unwrap();
        for name in ["ABC-2.json", "ABC-1.json", "sync_state.json", "notes.txt"] {
            fs::write(dir.path().join(name), "{}").unwrap();
        }
        fs::create_dir(dir.path().join("attachments")).unwrap();

        let names: Vec<_> = list_issue_files(dir.path())
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["ABC-1.json", "ABC-2.json"]);
    }
}
