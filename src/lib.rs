//! # issue-md-export
//!
//! A CLI tool that turns an issue-tracker export (one JSON document per issue) into
//! a directory of linked Markdown files.
//!
//! ## What it does
//!
//! Every `*.json` file in the source directory is parsed as one issue and rendered to
//! `{target}/{name}.md`: a title linking back to the tracker, a definition list of
//! metadata, the description, links to related issues, comments and attachments.
//! Links to issues of the same project point at the sibling Markdown file; anything
//! else points at the tracker's browse page.
//!
//! Attachment payloads found under `{source}/attachments/` are referenced locally and
//! copied to `{target}/attachments/`. Attachments without a local payload keep their
//! remote URL.
//!
//! A file that fails to parse or render is reported and skipped; the rest of the
//! batch still runs.
//!
//! ## Usage
//!
//! ```sh
//! issue-md-export ./jira-dump ./notes/issues
//!
//! # With extra fields pulled from custom field paths
//! issue-md-export ./jira-dump ./notes/issues --custom-data custom.json
//! ```
//!
//! `custom.json` lists `[label, path]` pairs, where `path` walks the issue's `fields`:
//!
//! ```json
//! {
//!   "simple_fields": [["Sprint", ["customfield_10010", "name"]]],
//!   "sections": [["Acceptance criteria", ["customfield_10020"]]]
//! }
//! ```
//!
//! Preferences can be persisted in `~/.config/issue-md-export/config.toml`.
pub mod importer;
pub mod renderer;
pub mod sequential;
pub mod utils;
