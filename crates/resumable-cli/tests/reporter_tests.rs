use std::path::{Path, PathBuf};

use super::driver::{BatchResult, FileResult};
use super::reporter::Reporter;

fn file(path: &str, output: anyhow::Result<String>) -> FileResult {
    FileResult {
        path: PathBuf::from(path),
        output,
    }
}

#[test]
fn formats_failure_with_cause_chain() {
    let reporter = Reporter::new(false);
    let error = anyhow::anyhow!("region body is not an expression").context("lowering failed");
    assert_eq!(
        reporter.format_failure(Path::new("a.json"), &error),
        "a.json - error: lowering failed: region body is not an expression"
    );
}

#[test]
fn formats_header() {
    let reporter = Reporter::new(false);
    assert_eq!(reporter.format_header(Path::new("dir/a.json")), "// dir/a.json");
}

#[test]
fn summarizes_clean_batch() {
    let reporter = Reporter::new(false);
    let batch = BatchResult {
        files: vec![file("a.json", Ok(String::new()))],
    };
    assert_eq!(reporter.format_summary(&batch), "Lowered 1 file.");
}

#[test]
fn summarizes_failed_batch() {
    let reporter = Reporter::new(false);
    let batch = BatchResult {
        files: vec![
            file("a.json", Ok(String::new())),
            file("b.json", Err(anyhow::anyhow!("boom"))),
            file("c.json", Err(anyhow::anyhow!("boom"))),
        ],
    };
    assert_eq!(
        reporter.format_summary(&batch),
        "Lowered 1 of 3 files, 2 failed."
    );
}
