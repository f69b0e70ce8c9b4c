//! JSON output files.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;

use crate::error::{HarvesterError, Result};

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static UNSAFE_TITLE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9åäöÅÄÖ\s]").expect("valid regex"));

#[allow(clippy::expect_used)] // Static regex that is guaranteed to be valid
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Timestamp used in default file names, e.g. `20250101_120000`.
#[must_use]
pub fn file_timestamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

/// Make a title usable as part of a file name.
///
/// # Examples
/// ```
/// use lagboken_harvester::output::clean_title;
///
/// assert_eq!(clean_title("Arbetsrätt & arbetsmiljörätt"), "Arbetsrätt_arbetsmiljörätt");
/// ```
#[must_use]
pub fn clean_title(title: &str) -> String {
    let kept = UNSAFE_TITLE_CHARS.replace_all(title, "");
    WHITESPACE_RUN.replace_all(kept.trim(), "_").into_owned()
}

/// Default file name for a multi-topic crawl.
#[must_use]
pub fn crawl_file_name(with_metadata: bool, at: DateTime<Utc>) -> String {
    let kind = if with_metadata { "comprehensive" } else { "links" };
    format!("multiple_topics_{kind}_{}.json", file_timestamp(at))
}

/// Default file name for a single topic.
#[must_use]
pub fn topic_file_name(title: &str, at: DateTime<Utc>) -> String {
    format!("topic_laws_{}_{}.json", clean_title(title), file_timestamp(at))
}

/// Default file name for a single law page.
#[must_use]
pub fn law_file_name(reference: Option<&str>, at: DateTime<Utc>) -> String {
    let reference = reference.map_or_else(|| "unknown".to_string(), |r| r.replace(':', "_"));
    format!("law_data_{reference}_{}.json", file_timestamp(at))
}

/// Decide where to write an output file.
///
/// `None` writes `default_name` into the current directory; an existing
/// directory receives `default_name`; anything else is taken as a file path
/// whose parent directory must exist.
pub fn resolve_output_path(output: Option<&Path>, default_name: &str) -> Result<PathBuf> {
    let Some(output) = output else {
        return Ok(PathBuf::from(default_name));
    };

    if output.is_dir() {
        return Ok(output.join(default_name));
    }

    match output.parent().filter(|p| !p.as_os_str().is_empty()) {
        Some(parent) if !parent.is_dir() => Err(HarvesterError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("Output directory does not exist: {}", parent.display()),
        ))),
        _ => Ok(output.to_path_buf()),
    }
}

/// Write `value` as pretty-printed UTF-8 JSON.
pub fn save_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let mut file = fs::File::create(path)?;
    file.write_all(json.as_bytes())?;
    file.write_all(b"\n")?;
    tracing::info!(path = %path.display(), bytes = json.len(), "Saved JSON output");
    Ok(())
}
