use clap::Parser;
use std::path::Path;

use super::args::{CliArgs, OutputFormat};

#[test]
fn parses_defaults() {
    let args = CliArgs::try_parse_from(["resumable", "region.json"])
        .expect("a single input should parse");

    assert_eq!(args.inputs, vec![Path::new("region.json").to_path_buf()]);
    assert_eq!(args.format, OutputFormat::Text);
    assert!(!args.no_optimize);
    assert!(!args.run);
    assert!(!args.no_color);
    assert!(args.config.is_none());
}

#[test]
fn parses_all_flags() {
    let args = CliArgs::try_parse_from([
        "resumable",
        "--no-optimize",
        "--format",
        "json",
        "--config",
        "configs/resumable.json",
        "--run",
        "--no-color",
        "a.json",
        "b.json",
    ])
    .expect("flagged args should parse");

    assert!(args.no_optimize);
    assert!(args.run);
    assert!(args.no_color);
    assert_eq!(args.format, OutputFormat::Json);
    assert_eq!(
        args.config.as_deref(),
        Some(Path::new("configs/resumable.json"))
    );
    assert_eq!(args.inputs.len(), 2);
}

#[test]
fn format_is_case_insensitive() {
    let args = CliArgs::try_parse_from(["resumable", "--format", "JSON", "a.json"])
        .expect("uppercase format should parse");
    assert_eq!(args.format, OutputFormat::Json);
}

#[test]
fn accepts_camel_case_aliases() {
    let args = CliArgs::try_parse_from(["resumable", "--noOptimize", "--noColor", "a.json"])
        .expect("aliases should parse");
    assert!(args.no_optimize);
    assert!(args.no_color);
}

#[test]
fn rejects_missing_inputs() {
    assert!(CliArgs::try_parse_from(["resumable", "--run"]).is_err());
}

#[test]
fn rejects_unknown_format() {
    assert!(CliArgs::try_parse_from(["resumable", "--format", "dot", "a.json"]).is_err());
}
