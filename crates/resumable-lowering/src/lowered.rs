//! The lowering pipeline and its product.

use serde::{Deserialize, Serialize};
use tracing::info;

use resumable_ast::{Expr, SuspendKind, Variable};

use crate::error::{LoweringError, Result};
use crate::graph::StateGraph;
use crate::jump_table::DispatchTable;
use crate::optimizer::{self, OptimizeStats};
use crate::options::LoweringOptions;
use crate::printer::GraphPrinter;
use crate::visitor;

/// A region lowered to a resumable state machine description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoweredMachine {
    pub kind: SuspendKind,
    pub graph: StateGraph,
    pub dispatch: DispatchTable,
    /// Every hoisted and synthesized slot, in creation order.
    pub variables: Vec<Variable>,
    /// Slot holding the region's result on completion.
    pub final_result: Option<Variable>,
    pub suspend_points: usize,
}

impl LoweredMachine {
    pub fn print(&self) -> String {
        GraphPrinter::new().print(self)
    }
}

/// Lower a `Resumable` expression.
pub fn lower(region: &Expr, options: &LoweringOptions) -> Result<LoweredMachine> {
    match region {
        Expr::Resumable { kind, body } => lower_body(*kind, body, options),
        _ => Err(LoweringError::NotARegion),
    }
}

/// Lower the body of a `kind` region.
///
/// Pure: the input is only read, and equal inputs produce equal machines.
#[tracing::instrument(level = "debug", skip_all, fields(kind = kind.as_str(), optimize = options.optimize))]
pub fn lower_body(kind: SuspendKind, body: &Expr, options: &LoweringOptions) -> Result<LoweredMachine> {
    let region = visitor::lower_region(kind, body, options)?;
    let mut graph = region.graph;
    let stats = if options.optimize {
        optimizer::optimize(&mut graph)
    } else {
        optimizer::assign_creation_order(&mut graph);
        OptimizeStats::default()
    };
    let dispatch = DispatchTable::build(&graph);

    info!(
        kind = kind.as_str(),
        states = graph.len(),
        jump_cases = dispatch.len(),
        merged = stats.merged,
        "lowered {} region",
        kind.as_str()
    );

    Ok(LoweredMachine {
        kind,
        graph,
        dispatch,
        variables: region.variables,
        final_result: region.final_result,
        suspend_points: region.suspend_points,
    })
}

#[cfg(test)]
#[path = "../tests/lowering.rs"]
mod tests;
