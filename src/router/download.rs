//! Local persistence of downloaded files.
//!
//! Files are written to a temporary file in the target directory and
//! then moved into place without overwriting, so a partial download is
//! never visible under its final name.

// ============================================================================
// Imports
// ============================================================================

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::DownloadReceipt;

// ============================================================================
// Constants
// ============================================================================

/// Characters that cannot appear in a saved file name.
static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[\\/:*?"<>|\x00-\x1f]"#).expect("valid pattern"));

/// Name used when the display name sanitizes to nothing.
const FALLBACK_NAME: &str = "download";

/// Upper bound on ` (n)` suffixes tried for a free name.
const MAX_SUFFIX: u32 = 1000;

// ============================================================================
// Functions
// ============================================================================

/// Turns a display name into a safe single path component.
#[must_use]
pub fn sanitize_filename(display_name: &str) -> String {
    let replaced = UNSAFE_CHARS.replace_all(display_name, "_");
    let trimmed = replaced.trim().trim_matches('.').trim();

    if trimmed.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Returns `name`, or `stem (n).ext` for the n-th alternative.
fn candidate_name(name: &str, n: u32) -> String {
    if n == 0 {
        return name.to_string();
    }

    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem} ({n}).{ext}"),
        _ => format!("{name} ({n})"),
    }
}

/// Saves `bytes` into `dir` under the sanitized display name.
///
/// Existing files are never overwritten; a numeric suffix is added.
///
/// # Errors
///
/// Returns [`Error::Io`] if the directory or file cannot be written.
pub fn save(dir: &Path, display_name: &str, bytes: &[u8]) -> Result<DownloadReceipt> {
    std::fs::create_dir_all(dir)?;

    let name = sanitize_filename(display_name);
    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(bytes)?;
    temp.flush()?;

    for n in 0..=MAX_SUFFIX {
        let path: PathBuf = dir.join(candidate_name(&name, n));

        match temp.persist_noclobber(&path) {
            Ok(_) => {
                debug!(path = %path.display(), bytes = bytes.len(), "Download saved");
                return Ok(DownloadReceipt {
                    path,
                    bytes: bytes.len() as u64,
                });
            }
            Err(e) if e.error.kind() == ErrorKind::AlreadyExists => temp = e.file,
            Err(e) => return Err(Error::Io(e.error)),
        }
    }

    Err(Error::Io(std::io::Error::new(
        ErrorKind::AlreadyExists,
        format!("no free file name for {name}"),
    )))
}

// ============================================================================
// Tests
// ============================================================================
