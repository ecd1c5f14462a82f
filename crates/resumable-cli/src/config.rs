use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use resumable_lowering::LoweringOptions;

use crate::args::CliArgs;

/// File picked up from the working directory when `--config` is absent.
pub const CONFIG_FILE_NAME: &str = "resumable.json";

/// Contents of a `resumable.json` file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigFile {
    #[serde(default)]
    pub lowering_options: Option<LoweringOptions>,
}

pub fn parse_config(source: &str) -> Result<ConfigFile> {
    let config = serde_json::from_str(source).context("failed to parse config JSON")?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<ConfigFile> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    parse_config(&source).with_context(|| format!("failed to parse config: {}", path.display()))
}

/// The config file in effect: `explicit` when given, otherwise
/// `resumable.json` in `cwd` if one exists.
pub fn find_config(explicit: Option<&Path>, cwd: &Path) -> Result<Option<PathBuf>> {
    if let Some(path) = explicit {
        let path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            cwd.join(path)
        };
        if !path.is_file() {
            bail!("config file not found: {}", path.display());
        }
        return Ok(Some(path));
    }
    let candidate = cwd.join(CONFIG_FILE_NAME);
    Ok(candidate.is_file().then_some(candidate))
}

/// Lowering options from the config file, with command-line flags applied
/// on top.
pub fn resolve_options(args: &CliArgs, cwd: &Path) -> Result<LoweringOptions> {
    let mut options = match find_config(args.config.as_deref(), cwd)? {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path)?.lowering_options.unwrap_or_default()
        }
        None => LoweringOptions::default(),
    };
    if args.no_optimize {
        options.optimize = false;
    }
    Ok(options)
}
