//! Text reference resolution.
//!
//! Query statements and credentials may be given inline or as references:
//!
//! | Prefix | Resolution |
//! |--------|------------|
//! | `classpath:` / `cp:` | Looked up on the resource search path (`ROWPORT_RESOURCE_PATH`, colon-separated; falls back to the working directory) |
//! | `file:` / `filepath:` | Read from the named file |
//! | anything else | Returned unchanged |

use crate::{Error, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};

/// Environment variable holding the ordered resource search path.
pub const RESOURCE_PATH_VAR: &str = "ROWPORT_RESOURCE_PATH";

static CLASSPATH_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:classpath|cp):(.+)$").expect("valid pattern"));

static FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^file(?:path)?:(.+)$").expect("valid pattern"));

/// Resolves a text reference to its contents.
///
/// Called once for the query statement and, when configured, once for the
/// credential. Plain text passes through unchanged.
///
/// # Errors
///
/// Returns [`Error::Configuration`] when a `classpath:` reference matches
/// nothing on the search path, or [`Error::Io`] when a referenced file
/// cannot be read.
pub fn resolve_text(reference: &str) -> Result<String> {
    if let Some(captures) = CLASSPATH_RE.captures(reference) {
        let name = &captures[1];
        tracing::debug!(resource = name, "loading text from resource path");
        return read_resource(name);
    }

    if let Some(captures) = FILE_RE.captures(reference) {
        let path = &captures[1];
        tracing::debug!(path, "loading text from file");
        return read_file(Path::new(path));
    }

    Ok(reference.to_string())
}

/// Looks a resource up on the ordered search path.
fn read_resource(name: &str) -> Result<String> {
    for dir in search_path() {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return read_file(&candidate);
        }
    }

    Err(Error::Configuration(format!(
        "resource '{name}' not found on {RESOURCE_PATH_VAR}"
    )))
}

/// Returns the ordered resource search directories.
fn search_path() -> Vec<PathBuf> {
    std::env::var(RESOURCE_PATH_VAR)
        .ok()
        .filter(|raw| !raw.trim().is_empty())
        .map_or_else(
            || vec![PathBuf::from(".")],
            |raw| raw.split(':').map(PathBuf::from).collect(),
        )
}

fn read_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::Io {
        operation: format!("read '{}'", path.display()),
        cause: e.to_string(),
    })
}
