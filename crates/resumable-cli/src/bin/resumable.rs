#![allow(clippy::print_stderr)]

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;

use resumable_cli::args::CliArgs;
use resumable_cli::driver::{self, Job};
use resumable_cli::{config, reporter::Reporter};

const EXIT_SUCCESS: i32 = 0;
const EXIT_FAILURES: i32 = 1;

fn main() -> Result<()> {
    // Initialize tracing if RESUMABLE_LOG or RUST_LOG is set.
    resumable_cli::tracing_config::init_tracing();

    let args = CliArgs::parse();
    let cwd = std::env::current_dir().context("failed to resolve current directory")?;
    let options = config::resolve_options(&args, &cwd)?;

    let job = Job::from_args(&args, options);
    let batch = driver::run_batch(&args.inputs, &job);

    let reporter = Reporter::new(!args.no_color && std::io::stderr().is_terminal());
    let with_headers = batch.files.len() > 1;
    for file in &batch.files {
        match &file.output {
            Ok(output) => {
                if with_headers {
                    println!("{}", reporter.format_header(&file.path));
                }
                print!("{output}");
            }
            Err(error) => eprintln!("{}", reporter.format_failure(&file.path, error)),
        }
    }
    if with_headers || batch.failed() > 0 {
        eprintln!("{}", reporter.format_summary(&batch));
    }

    let code = if batch.failed() == 0 {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURES
    };
    std::process::exit(code);
}
