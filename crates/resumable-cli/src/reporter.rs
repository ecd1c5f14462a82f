use colored::Colorize;
use std::path::Path;

use crate::driver::BatchResult;

pub struct Reporter {
    color: bool,
}

impl Reporter {
    pub const fn new(color: bool) -> Self {
        Reporter { color }
    }

    /// `<path> - error: <message>: <cause>...`
    pub fn format_failure(&self, path: &Path, error: &anyhow::Error) -> String {
        let location = path.display().to_string();
        let location = if self.color {
            location.cyan().to_string()
        } else {
            location
        };
        format!("{location} - {}: {error:#}", self.paint_error("error"))
    }

    /// Header printed above each file's output when there are several.
    pub fn format_header(&self, path: &Path) -> String {
        let header = format!("// {}", path.display());
        if self.color {
            header.bold().to_string()
        } else {
            header
        }
    }

    pub fn format_summary(&self, batch: &BatchResult) -> String {
        let total = batch.files.len();
        let failed = batch.failed();
        let noun = if total == 1 { "file" } else { "files" };
        if failed == 0 {
            return format!("Lowered {total} {noun}.");
        }
        let errors = format!("{failed} failed");
        format!(
            "Lowered {} of {total} {noun}, {}.",
            batch.succeeded(),
            self.paint_error(&errors)
        )
    }

    fn paint_error(&self, text: &str) -> String {
        if self.color {
            text.red().bold().to_string()
        } else {
            text.to_string()
        }
    }
}
