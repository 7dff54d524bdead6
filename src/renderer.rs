//! Markdown rendering for a single issue record.
//!
//! Layout, top to bottom, with one blank line between parts:
//!
//! 1. title (setext level-1 heading linking back to the tracker)
//! 2. metadata as a definition list, built-in pairs first, then custom ones
//! 3. the description and any configured custom sections
//! 4. links, comments and attachments, each only when non-empty
use crate::importer::{Attachment, Comment, CustomDataConfig, IssueLink, IssueRecord, lookup_path};
use crate::utils::{ATTACHMENTS_DIR, browse_url, capitalize, format_timestamp};
use eyre::{Context, Result};
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::PathBuf;

const COMMENT_SEPARATOR: &str = "\n\n----------\n\n";
const MISSING_VALUE: &str = "-";

/// A rendered document plus the local attachment files it references.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedIssue {
    pub markdown: String,
    pub found_attachments: Vec<String>,
}

/// Renders issues to Markdown and remembers which attachments were found locally.
pub struct IssueRenderer {
    config: CustomDataConfig,
    attachments_dir: PathBuf,
    found_attachments: BTreeSet<String>,
}

impl IssueRenderer {
    /// `attachments_dir` is the source-side directory holding attachment payloads.
    pub fn new(config: CustomDataConfig, attachments_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            attachments_dir: attachments_dir.into(),
            found_attachments: BTreeSet::new(),
        }
    }

    /// Local attachment file names referenced by every successful render so far.
    pub fn found_attachments(&self) -> &BTreeSet<String> {
        &self.found_attachments
    }

    /// Render one issue and record its attachments. On error nothing is recorded.
    pub fn render(&mut self, issue: &IssueRecord) -> Result<String> {
        let rendered = self.render_issue(issue)?;
        self.record_found(rendered.found_attachments);
        Ok(rendered.markdown)
    }

    /// Render without touching the found set; see [`IssueRenderer::record_found`].
    pub fn render_issue(&self, issue: &IssueRecord) -> Result<RenderedIssue> {
        let mut parts = vec![title(issue)?, self.metadata(issue)?];
        parts.extend(self.sections(issue));
        parts.extend(links_section(issue)?);
        parts.extend(comments_section(issue)?);

        let (attachments, found) = self.attachments_section(issue)?;
        parts.extend(attachments);

        Ok(RenderedIssue {
            markdown: parts.join("\n\n"),
            found_attachments: found,
        })
    }

    pub fn record_found(&mut self, names: impl IntoIterator<Item = String>) {
        self.found_attachments.extend(names);
    }

    fn metadata(&self, issue: &IssueRecord) -> Result<String> {
        let labels = issue
            .list::<String>(&["labels"])?
            .join(", ");

        let mut pairs: Vec<(&str, Option<String>)> = vec![
            ("Type", Some(issue.field_str(&["issuetype", "name"])?.to_string())),
            ("Status", Some(issue.field_str(&["status", "name"])?.to_string())),
            ("Reporter", Some(issue.field_str(&["reporter", "name"])?.to_string())),
            ("Labels", Some(labels)),
            ("Updated", Some(format_timestamp(issue.field_str(&["updated"])?)?)),
            ("Created", Some(format_timestamp(issue.field_str(&["created"])?)?)),
        ];
        pairs.extend(self.config.simple_fields.iter().map(|spec| {
            (
                spec.label.as_str(),
                lookup_path(&issue.fields, &spec.path).and_then(display_value),
            )
        }));

        Ok(pairs
            .into_iter()
            .map(|(label, value)| {
                let value = value.filter(|v| !v.is_empty());
                format!("{}\n:   {}", label, value.as_deref().unwrap_or(MISSING_VALUE))
            })
            .collect::<Vec<_>>()
            .join("\n"))
    }

    fn sections(&self, issue: &IssueRecord) -> Vec<String> {
        let description = ("Description", lookup_path(&issue.fields, &["description"]));
        let custom = self
            .config
            .sections
            .iter()
            .map(|spec| (spec.label.as_str(), lookup_path(&issue.fields, &spec.path)));

        std::iter::once(description)
            .chain(custom)
            .filter_map(|(label, value)| {
                let content = value.and_then(display_value)?;
                Some(format!("{}\n\n{}", heading(label, '-'), content))
            })
            .collect()
    }

    fn attachments_section(&self, issue: &IssueRecord) -> Result<(Option<String>, Vec<String>)> {
        let attachments = issue.attachments()?;
        if attachments.is_empty() {
            return Ok((None, Vec::new()));
        }

        let mut found = Vec::new();
        let bullets: Vec<String> = attachments
            .iter()
            .map(|attachment| {
                let url = match self.local_attachment(issue, attachment) {
                    Some(local) => {
                        let url = format!("{}/{}", ATTACHMENTS_DIR, local);
                        found.push(local);
                        url
                    }
                    None => attachment.content.clone(),
                };
                let marker = if attachment.is_image() { "!" } else { "" };
                format!("* {}[{}]({})", marker, attachment.filename, url)
            })
            .collect();

        Ok((
            Some(format!("{}\n\n{}", heading("Attachments", '-'), bullets.join("\n"))),
            found,
        ))
    }

    fn local_attachment(&self, issue: &IssueRecord, attachment: &Attachment) -> Option<String> {
        let local = attachment.local_filename(&issue.key);
        self.attachments_dir.join(&local).is_file().then_some(local)
    }
}

fn title(issue: &IssueRecord) -> Result<String> {
    let summary = issue.field_str(&["summary"])?;
    let text = format!(
        "[{}]({}): {}",
        issue.key,
        browse_url(&issue.self_url, &issue.key),
        summary
    );
    Ok(heading(&text, '='))
}

fn links_section(issue: &IssueRecord) -> Result<Option<String>> {
    let links = issue.links()?;
    if links.is_empty() {
        return Ok(None);
    }

    let project_key = issue.field_str(&["project", "key"])?;
    let bullets: Vec<String> = links
        .iter()
        .map(|link| link_bullet(link, project_key))
        .collect();

    Ok(Some(format!(
        "{}\n\n{}",
        heading("Links", '-'),
        bullets.join("\n")
    )))
}

fn link_bullet(link: &IssueLink, project_key: &str) -> String {
    let target = link.target();
    let href = if belongs_to_project(&target.key, project_key) {
        format!("{}.md", target.key)
    } else {
        browse_url(&target.self_url, &target.key).to_string()
    };
    format!("* {} [{}]({})", capitalize(link.relation()), target.key, href)
}

// Plain prefix match on the key, so `ABCD-1` counts as part of project `ABC`.
fn belongs_to_project(issue_key: &str, project_key: &str) -> bool {
    issue_key.starts_with(project_key)
}

fn comments_section(issue: &IssueRecord) -> Result<Option<String>> {
    let comments = issue.comments()?;
    if comments.is_empty() {
        return Ok(None);
    }

    let rendered = comments
        .iter()
        .map(render_comment)
        .collect::<Result<Vec<_>>>()?;

    Ok(Some(format!(
        "{}\n\n{}",
        heading("Comments", '-'),
        rendered.join(COMMENT_SEPARATOR)
    )))
}

fn render_comment(comment: &Comment) -> Result<String> {
    let date = format_timestamp(&comment.updated)
        .wrap_err_with(|| format!("Bad timestamp on comment by {}", comment.author.name))?;
    Ok(format!(
        "### {} - {}:\n\n{}",
        comment.author.name, date, comment.body
    ))
}

/// Setext heading: the text underlined with `underline` to the same width.
fn heading(text: &str, underline: char) -> String {
    let rule: String = std::iter::repeat_n(underline, text.chars().count()).collect();
    format!("{}\n{}", text, rule)
}

/// Text for a custom value, or `None` when the value is falsy: null, `false`, zero,
/// or an empty string, array or object.
fn display_value(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::Number(n) if n.as_f64() == Some(0.0) => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(_) | Value::Number(_) => Some(value.to_string()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(display_value).collect();
            (!parts.is_empty()).then(|| parts.join(", "))
        }
        Value::Object(map) if map.is_empty() => None,
        Value::Object(map) => ["name", "value", "displayName"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .or_else(|| Some(value.to_string())),
    }
}
