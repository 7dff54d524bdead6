use crate::importer::{CustomDataConfig, list_issue_files, load_issue};
use crate::renderer::IssueRenderer;
use crate::utils::ExportConfig;
use eyre::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

/// Counters reported once the batch finishes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    pub written: usize,
    pub attachments_copied: usize,
    pub errors: usize,
}

/// The main entry point for the export.
///
/// Fails only on pre-flight problems (unreadable custom config, source or target
/// directory). Every per-issue failure is logged, counted and skipped.
pub fn execute(config: &ExportConfig) -> Result<ExportSummary> {
    let custom = CustomDataConfig::load(config.custom_data.as_deref())?;

    fs::create_dir_all(&config.target_dir).wrap_err_with(|| {
        format!(
            "Failed to create target directory: {}",
            config.target_dir.display()
        )
    })?;

    let files = list_issue_files(&config.source_dir)?;
    let pb = progress_bar(files.len() as u64, config.quiet)?;

    let mut renderer = IssueRenderer::new(custom, config.source_attachments());
    let mut summary = ExportSummary::default();

    for path in &files {
        match export_issue(path, config, &mut renderer) {
            Ok(written) => {
                summary.written += 1;
                debug!(source = %path.display(), target = %written.display(), "exported issue");
                if config.verbose {
                    pb.println(format!("Wrote:    {}", written.display()));
                }
            }
            Err(e) => {
                summary.errors += 1;
                pb.suspend(|| error!(path = %path.display(), "{:#}", e));
            }
        }
        pb.inc(1);
    }

    pb.finish_and_clear();

    let (copied, copy_errors) = copy_attachments(
        renderer.found_attachments(),
        &config.source_attachments(),
        &config.target_attachments(),
    );
    summary.attachments_copied = copied;
    summary.errors += copy_errors;

    if !config.quiet {
        let mut line = format!(
            "Done. {} written, {} attachments copied.",
            summary.written, summary.attachments_copied
        );
        if summary.errors > 0 {
            line.push_str(&format!(" Completed with {} error(s).", summary.errors));
        }
        eprintln!("{}", line);
    }

    Ok(summary)
}

fn progress_bar(total: u64, quiet: bool) -> Result<ProgressBar> {
    if quiet {
        return Ok(ProgressBar::hidden());
    }
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)",
        )
        .wrap_err("Invalid progress bar template")?
        .progress_chars("=>-"),
    );
    bar.println(format!("Found {} issues.", total));
    Ok(bar)
}

/// Load, render and write a single issue. Nothing is written unless rendering succeeds,
/// and its attachments only count once the Markdown file is on disk.
fn export_issue(path: &Path, config: &ExportConfig, renderer: &mut IssueRenderer) -> Result<PathBuf> {
    let issue = load_issue(path)?;
    let rendered = renderer
        .render_issue(&issue)
        .wrap_err("Failed to render issue")?;

    let stem = path.file_stem().unwrap_or_default().to_string_lossy();
    let target = config.target_dir.join(format!("{}.md", stem));
    fs::write(&target, format!("{}\n", rendered.markdown))
        .wrap_err_with(|| format!("Failed to write: {}", target.display()))?;

    renderer.record_found(rendered.found_attachments);
    Ok(target)
}

/// Copy every found attachment byte-for-byte. Returns `(copied, failed)`.
fn copy_attachments(names: &BTreeSet<String>, from: &Path, to: &Path) -> (usize, usize) {
    if names.is_empty() {
        return (0, 0);
    }
    if let Err(e) = fs::create_dir_all(to) {
        error!(path = %to.display(), "Failed to create attachments directory: {}", e);
        return (0, names.len());
    }

    let mut copied = 0;
    let mut failed = 0;
    for name in names {
        match fs::copy(from.join(name), to.join(name)) {
            Ok(_) => copied += 1,
            Err(e) => {
                failed += 1;
                warn!(attachment = %name, "Failed to copy attachment: {}", e);
            }
        }
    }
    (copied, failed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn copy_attachments_reports_missing_sources() {
        let src = TempDir::new().unwrap();
        let dst = TempDir::new().unwrap();
        fs::write(src.path().join("ABC-1-1-a.txt"), b"payload").unwrap();

        let names: BTreeSet<String> = ["ABC-1-1-a.txt", "ABC-1-2-gone.txt"]
            .into_iter()
            .map(String::from)
            .collect();
        let out = dst.path().join("attachments");

        assert_eq!(copy_attachments(&names, src.path(), &out), (1, 1));
        assert_eq!(fs::read(out.join("ABC-1-1-a.txt")).unwrap(), b"payload");
    }

    #[test]
    fn nothing_found_means_no_attachments_dir() {
        let dst = TempDir::new().unwrap();
        let out = dst.path().join("attachments");
        assert_eq!(copy_attachments(&BTreeSet::new(), dst.path(), &out), (0, 0));
        assert!(!out.exists());
    }
}
