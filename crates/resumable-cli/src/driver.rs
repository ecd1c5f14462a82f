//! Lowers input files, optionally runs them, and renders the results.

use anyhow::{Context, Result};
use rayon::prelude::*;
use serde_json::json;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use resumable_ast::{Expr, SuspendKind};
use resumable_lowering::{LoweredMachine, LoweringOptions, lower};
use resumable_runtime::{Host, Outcome, StateMachine, collect_yields, run_to_completion};

use crate::args::{CliArgs, OutputFormat};

/// What to do with every input of one invocation.
#[derive(Debug, Clone)]
pub struct Job {
    pub options: LoweringOptions,
    pub format: OutputFormat,
    pub run: bool,
}

impl Job {
    pub fn from_args(args: &CliArgs, options: LoweringOptions) -> Self {
        Self {
            options,
            format: args.format,
            run: args.run,
        }
    }
}

#[derive(Debug)]
pub struct FileResult {
    pub path: PathBuf,
    /// Rendered output, or the reason the file failed.
    pub output: Result<String>,
}

#[derive(Debug, Default)]
pub struct BatchResult {
    /// In input order.
    pub files: Vec<FileResult>,
}

impl BatchResult {
    pub fn failed(&self) -> usize {
        self.files.iter().filter(|file| file.output.is_err()).count()
    }

    pub fn succeeded(&self) -> usize {
        self.files.len() - self.failed()
    }
}

/// Process every input in parallel. One failing file never stops the rest.
pub fn run_batch(inputs: &[PathBuf], job: &Job) -> BatchResult {
    let files: Vec<FileResult> = inputs
        .par_iter()
        .map(|path| FileResult {
            path: path.clone(),
            output: process_file(path, job),
        })
        .collect();
    let batch = BatchResult { files };
    info!(
        files = batch.files.len(),
        failed = batch.failed(),
        "processed inputs"
    );
    batch
}

pub fn read_region(path: &Path) -> Result<Expr> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read input: {}", path.display()))?;
    serde_json::from_str(&source)
        .with_context(|| format!("failed to parse expression JSON: {}", path.display()))
}

pub fn process_file(path: &Path, job: &Job) -> Result<String> {
    debug!(path = %path.display(), "lowering input");
    let region = read_region(path)?;
    let machine = Arc::new(lower(&region, &job.options).context("lowering failed")?);
    let outcome = if job.run {
        Some(execute(Arc::clone(&machine)).context("execution failed")?)
    } else {
        None
    };
    render(&machine, outcome.as_ref(), job.format)
}

/// Run a lowered machine against the default host. Generators are resumed
/// with unit after every yield.
pub fn execute(machine: Arc<LoweredMachine>) -> Result<Outcome> {
    let kind = machine.kind;
    let mut state_machine = StateMachine::new(machine, Arc::new(Host::with_defaults()));
    let outcome = match kind {
        SuspendKind::Await => run_to_completion(&mut state_machine)?,
        SuspendKind::Yield => collect_yields(&mut state_machine, std::iter::empty())?,
    };
    Ok(outcome)
}

pub fn render(
    machine: &LoweredMachine,
    outcome: Option<&Outcome>,
    format: OutputFormat,
) -> Result<String> {
    match format {
        OutputFormat::Text => {
            let mut text = machine.print();
            if let Some(outcome) = outcome {
                text.push_str(&render_outcome_text(outcome));
            }
            Ok(text)
        }
        OutputFormat::Json => {
            let machine =
                serde_json::to_value(machine).context("failed to serialize machine")?;
            let mut value = json!({ "machine": machine });
            if let Some(outcome) = outcome {
                value["run"] = outcome_json(outcome);
            }
            let mut text =
                serde_json::to_string_pretty(&value).context("failed to serialize output")?;
            text.push('\n');
            Ok(text)
        }
    }
}

fn render_outcome_text(outcome: &Outcome) -> String {
    let mut text = String::from("run\n");
    match &outcome.result {
        Ok(value) => {
            let _ = writeln!(text, "  result {value}");
        }
        Err(exception) => {
            let _ = writeln!(text, "  exception {exception}");
        }
    }
    if !outcome.yields.is_empty() {
        let yields: Vec<String> = outcome.yields.iter().map(ToString::to_string).collect();
        let _ = writeln!(text, "  yields {}", yields.join(", "));
    }
    let _ = writeln!(text, "  suspensions {}", outcome.suspensions);
    text
}

fn outcome_json(outcome: &Outcome) -> serde_json::Value {
    let yields: Vec<String> = outcome.yields.iter().map(ToString::to_string).collect();
    match &outcome.result {
        Ok(value) => json!({
            "result": value.to_string(),
            "yields": yields,
            "suspensions": outcome.suspensions,
        }),
        Err(exception) => json!({
            "exception": { "kind": exception.kind, "message": exception.message },
            "yields": yields,
            "suspensions": outcome.suspensions,
        }),
    }
}
