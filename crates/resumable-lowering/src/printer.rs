//! Human-readable rendering of a lowered machine.
//!
//! ```text
//! machine await: 1 suspend point, 3 slots
//! scope root
//!   S0:
//!     __try<0_2> = 0
//!     -> await fetch() resume S2 [result __result<0_1>, handle __awaiter<0_0>]
//!   S2: (resume)
//!     __final = __result<0_1>
//!     -> final __final
//! dispatch
//!   root: 2 => S2
//! ```

use std::fmt::Write as _;

use crate::graph::{Scope, StateGraph, StateNode, Transition};
use crate::jump_table::DispatchTarget;
use crate::lowered::LoweredMachine;

pub struct GraphPrinter {
    output: String,
    indent: usize,
}

impl Default for GraphPrinter {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphPrinter {
    pub const fn new() -> Self {
        Self {
            output: String::new(),
            indent: 0,
        }
    }

    pub fn print(mut self, machine: &LoweredMachine) -> String {
        let points = machine.suspend_points;
        let _ = writeln!(
            self.output,
            "machine {}: {points} suspend point{}, {} slot{}",
            machine.kind.as_str(),
            if points == 1 { "" } else { "s" },
            machine.variables.len(),
            if machine.variables.len() == 1 { "" } else { "s" },
        );
        self.print_scope(&machine.graph, machine.graph.root_scope());
        self.print_dispatch(machine);
        self.output
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.output.push_str("  ");
        }
        self.output.push_str(text);
        self.output.push('\n');
    }

    fn print_scope(&mut self, graph: &StateGraph, scope: &Scope) {
        let header = match scope.owner {
            Some(owner) => format!("scope {} (owner S{})", scope.name, owner.0),
            None => format!("scope {}", scope.name),
        };
        self.line(&header);
        self.indent += 1;
        for id in &scope.nodes {
            if let Some(node) = graph.get(*id) {
                self.print_node(graph, node);
            }
        }
        for child in &scope.children {
            self.print_scope(graph, graph.scope(*child));
        }
        self.indent -= 1;
    }

    fn print_node(&mut self, graph: &StateGraph, node: &StateNode) {
        let scope = graph.scope(node.scope);
        let mut header = format!("{}:", node.label);
        if scope.entry == Some(node.id) && !scope.is_root() {
            header.push_str(" (entry)");
        }
        if scope.jump_cases.iter().any(|case| case.state_id == node.id) {
            header.push_str(" (resume)");
        }
        self.line(&header);

        self.indent += 1;
        for expr in &node.expressions {
            self.line(&expr.to_string());
        }
        let transition = match &node.transition {
            Some(transition) => Self::transition_text(graph, node, transition),
            None => "-> ?".to_string(),
        };
        self.line(&transition);
        self.indent -= 1;
    }

    fn transition_text(graph: &StateGraph, node: &StateNode, transition: &Transition) -> String {
        let label = |id| {
            graph
                .get(id)
                .map_or_else(|| format!("<{id}>"), |node| node.label.to_string())
        };
        match transition {
            Transition::Goto { target } => format!("-> goto {}", label(*target)),
            Transition::Conditional {
                test,
                if_true,
                if_false,
            } => format!("-> if {test} then {} else {}", label(*if_true), label(*if_false)),
            Transition::Switch {
                value,
                cases,
                default,
            } => {
                let mut text = format!("-> switch {value}");
                for case in cases {
                    let tests: Vec<String> =
                        case.test_values.iter().map(ToString::to_string).collect();
                    let _ = write!(text, " [{} => {}]", tests.join(", "), label(case.target));
                }
                let _ = write!(text, " [default => {}]", label(*default));
                text
            }
            Transition::TryCatchFinally(region) => {
                let mut text = format!(
                    "-> try {} [{}, {}]",
                    label(region.try_node),
                    region.discriminator_var,
                    region.exception_var
                );
                for catch in &region.catches {
                    let kind = catch.exception_type.as_deref().unwrap_or("*");
                    let _ = write!(
                        text,
                        " catch {kind} #{} => {}",
                        catch.discriminator,
                        label(catch.target)
                    );
                }
                if let Some(finally) = region.finally_node {
                    let _ = write!(text, " finally => {}", label(finally));
                }
                text
            }
            Transition::Loop {
                body, break_target, ..
            } => format!("-> loop {} break {}", label(*body), label(*break_target)),
            Transition::Suspend(suspend) => {
                let mut text = format!(
                    "-> {} {} resume {} [",
                    suspend.kind.as_str(),
                    suspend.operand,
                    suspend.resume_label
                );
                if let Some(result) = &suspend.result_var {
                    let _ = write!(text, "result {result}, ");
                }
                let _ = write!(text, "handle {}]", suspend.handle_var);
                text
            }
            Transition::Final => match node.result.as_ref().and_then(|r| r.variable.as_ref()) {
                Some(result) => format!("-> final {result}"),
                None => "-> final".to_string(),
            },
        }
    }

    fn print_dispatch(&mut self, machine: &LoweredMachine) {
        self.line("dispatch");
        self.indent += 1;
        for table in &machine.dispatch.tables {
            if table.entries.is_empty() {
                continue;
            }
            let name = machine.graph.scope(table.scope).name.clone();
            let entries: Vec<String> = table
                .entries
                .iter()
                .map(|entry| match &entry.target {
                    DispatchTarget::Resume { label, .. } => {
                        format!("{} => {label}", entry.state_id.0)
                    }
                    DispatchTarget::EnterScope { scope, label, .. } => format!(
                        "{} => enter {} at {label}",
                        entry.state_id.0,
                        machine.graph.scope(*scope).name
                    ),
                })
                .collect();
            self.line(&format!("{name}: {}", entries.join("; ")));
        }
        self.indent -= 1;
    }
}
