//! Lowering options.

use serde::{Deserialize, Serialize};

use resumable_ast::ValueType;
use resumable_ast::limits::MAX_LOWERING_DEPTH;

/// Knobs for a single `lower` call.
///
/// Deserializes from camelCase JSON with every field optional, so a config
/// file only needs to name what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoweringOptions {
    /// Run the graph optimizer (merging, threading, fallthrough ordering).
    pub optimize: bool,
    /// Reject regions without a suspension point of their flavor.
    pub require_suspend_point: bool,
    /// Maximum expression nesting depth.
    pub max_depth: u32,
    /// Type of the await region's final result. `Unit` allocates no final
    /// result slot.
    pub result_type: ValueType,
}

impl Default for LoweringOptions {
    fn default() -> Self {
        Self {
            optimize: true,
            require_suspend_point: true,
            max_depth: MAX_LOWERING_DEPTH,
            result_type: ValueType::Any,
        }
    }
}

impl LoweringOptions {
    pub fn unoptimized() -> Self {
        Self {
            optimize: false,
            ..Self::default()
        }
    }
}
