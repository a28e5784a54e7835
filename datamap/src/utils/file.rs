//! File and input helpers

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// Expand `~` and make relative paths absolute against the working directory
///
/// Absolute paths come back unchanged; an empty string yields the working
/// directory.
pub fn expand_path(path: &str) -> PathBuf {
    let path = path.trim();
    let cwd = || std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));

    if path.is_empty() {
        return cwd();
    }

    let expanded = match dirs::home_dir() {
        Some(home) if path == "~" => home,
        Some(home) => match path.strip_prefix("~/") {
            Some(rest) => home.join(rest),
            None => PathBuf::from(path),
        },
        None => PathBuf::from(path),
    };

    if expanded.is_relative() {
        cwd().join(expanded)
    } else {
        expanded
    }
}

/// Read a whole input document from `path`, or from stdin when absent
///
/// Fails when the document is larger than `max_bytes`.
pub fn read_input(path: Option<&Path>, max_bytes: usize) -> Result<String> {
    let limit = max_bytes as u64;
    let mut content = String::new();

    match path {
        Some(path) => {
            let path = expand_path(&path.to_string_lossy());
            tracing::debug!(path = %path.display(), "Reading input file");
            let file = fs::File::open(&path)
                .with_context(|| format!("Failed to read input file: {}", path.display()))?;
            let len = file
                .metadata()
                .with_context(|| format!("Failed to read input file: {}", path.display()))?
                .len();
            if len > limit {
                anyhow::bail!("Input exceeds maximum size of {} bytes", max_bytes);
            }
            // The file may grow between the size check and the read
            file.take(limit + 1)
                .read_to_string(&mut content)
                .with_context(|| format!("Failed to read input file: {}", path.display()))?;
        }
        None => {
            tracing::debug!("Reading input from stdin");
            std::io::stdin()
                .take(limit + 1)
                .read_to_string(&mut content)
                .context("Failed to read input from stdin")?;
        }
    }

    if content.len() > max_bytes {
        anyhow::bail!("Input exceeds maximum size of {} bytes", max_bytes);
    }
    Ok(content)
}
