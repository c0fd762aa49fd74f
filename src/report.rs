use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use tracing::debug;

/// Writes reports as timestamped JSON files that are never overwritten
pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Serialize `payload` to `<output_dir>/<name_hint>_<timestamp>.json` and return the path
    pub fn write<T: Serialize>(&self, payload: &T, name_hint: &str) -> Result<PathBuf> {
        let json_content = serde_json::to_string_pretty(payload)
            .context("Failed to serialize report to JSON")?;

        self.ensure_directory_exists()?;

        let stem = format!(
            "{}_{}",
            sanitize_name(name_hint),
            Local::now().format("%Y%m%d_%H%M%S")
        );
        let path = self.write_new_file(&stem, &json_content)?;
        debug!(path = %path.display(), "Report written");

        Ok(path)
    }

    fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create directory: {}", self.output_dir.display())
        })
    }

    /// Create `<stem>.json`, or `<stem>_N.json` if that name is taken
    fn write_new_file(&self, stem: &str, content: &str) -> Result<PathBuf> {
        let mut suffix = 0usize;

        loop {
            let file_name = match suffix {
                0 => format!("{stem}.json"),
                n => format!("{stem}_{n}.json"),
            };
            let path = self.output_dir.join(file_name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(content.as_bytes())
                        .with_context(|| format!("Failed to write report to: {}", path.display()))?;
                    return Ok(path);
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => suffix += 1,
                Err(err) => {
                    return Err(err)
                        .with_context(|| format!("Failed to create report: {}", path.display()));
                }
            }
        }
    }
}

/// Keep only characters that are safe in file names
fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned.is_empty() {
        "report".to_string()
    } else {
        cleaned
    }
}
