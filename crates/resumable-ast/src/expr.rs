//! Expression Tree
//!
//! The tree-shaped input of the lowering engine. Every construct is an
//! expression with a value; statement-like constructs (`Loop`, `Goto`,
//! `Throw`) produce unit or never complete normally.
//!
//! # Node kinds
//!
//! The set is closed. Structural kinds (`Block`, `Conditional`, `Switch`,
//! `Try`, `Loop`, `Goto`, `Label`, `Suspend`, `Resumable`) are lowered into
//! states when they contain a suspension point. `Op` is the opaque leaf: its
//! operands are ordinary child positions the lowering visitor descends into,
//! but the operator itself is never interpreted by lowering.
//!
//! # Example
//!
//! ```
//! use resumable_ast::{Expr, SuspendKind};
//!
//! // await { 1; await 2; 3 }
//! let ast = Expr::resumable(
//!     SuspendKind::Await,
//!     Expr::seq(vec![Expr::int(1), Expr::awaiting(Expr::int(2)), Expr::int(3)]),
//! );
//! assert!(ast.contains_suspend(SuspendKind::Await));
//! ```

use serde::{Deserialize, Serialize};

use crate::ids::{LabelTarget, Variable};

/// Static value type of a variable or suspend result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Unit,
    Bool,
    Int,
    Str,
    #[default]
    Any,
}

/// Literal constant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Constant {
    Unit,
    Bool(bool),
    Int(i64),
    Str(String),
}

/// Flavor of a suspension point.
///
/// `Await` resumes once, driven by completion of the awaited operand.
/// `Yield` resumes any number of times, driven by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SuspendKind {
    Await,
    Yield,
}

impl SuspendKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Await => "await",
            Self::Yield => "yield",
        }
    }

    pub const fn other(self) -> Self {
        match self {
            Self::Await => Self::Yield,
            Self::Yield => Self::Await,
        }
    }
}

/// How a `Goto` was written in the source.
///
/// Only `Return` changes lowering: it exits the whole region through the
/// final-result slot regardless of its target label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GotoKind {
    #[default]
    Goto,
    Break,
    Continue,
    Return,
}

/// Operator of the opaque `Op` leaf.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Neg,
    Not,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Eager boolean and (both operands are evaluated).
    And,
    /// Eager boolean or (both operands are evaluated).
    Or,
    /// Invoke a named host function with the operands as arguments.
    Call(String),
}

impl Operator {
    pub fn symbol(&self) -> &str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::Div => "/",
            Self::Rem => "%",
            Self::Neg => "-",
            Self::Not => "!",
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::And => "&",
            Self::Or => "|",
            Self::Call(name) => name,
        }
    }
}

/// One arm of a `Switch`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub test_values: Vec<Expr>,
    pub body: Expr,
}

/// One `catch` clause of a `Try`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatchHandler {
    /// Exception kind matched by this handler; `None` catches everything.
    #[serde(default)]
    pub exception_type: Option<String>,
    /// Variable bound to the caught exception.
    #[serde(default)]
    pub variable: Option<Variable>,
    pub body: Expr,
}

/// Expression node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    // =========================================================================
    // Leaves
    // =========================================================================
    /// Constant value.
    Literal(Constant),

    /// Read of a variable.
    Variable(Variable),

    /// `target = value`; evaluates to the assigned value.
    Assign { target: Variable, value: Box<Self> },

    /// Opaque operation; operands are evaluated left to right.
    Op {
        operator: Operator,
        operands: Vec<Self>,
    },

    // =========================================================================
    // Structure
    // =========================================================================
    /// Sequence with block-scoped locals; evaluates to its last expression.
    Block { vars: Vec<Variable>, body: Vec<Self> },

    /// `test ? if_true : if_false`; a missing `if_false` evaluates to unit.
    Conditional {
        test: Box<Self>,
        if_true: Box<Self>,
        if_false: Option<Box<Self>>,
    },

    /// Multi-way branch on `value`.
    Switch {
        value: Box<Self>,
        cases: Vec<SwitchCase>,
        default: Option<Box<Self>>,
    },

    /// Exception region with handlers and an optional finally block.
    Try {
        body: Box<Self>,
        handlers: Vec<CatchHandler>,
        finally: Option<Box<Self>>,
    },

    /// Infinite loop left through its break label.
    Loop {
        body: Box<Self>,
        break_label: Option<LabelTarget>,
        continue_label: Option<LabelTarget>,
    },

    /// Unconditional jump, optionally carrying a value to the target.
    Goto {
        target: LabelTarget,
        #[serde(default)]
        kind: GotoKind,
        value: Option<Box<Self>>,
    },

    /// Jump target; evaluates to `default` when reached by fallthrough.
    Label {
        target: LabelTarget,
        default: Option<Box<Self>>,
    },

    /// Raise an exception; `None` rethrows the exception being handled.
    Throw(Option<Box<Self>>),

    // =========================================================================
    // Suspension
    // =========================================================================
    /// Suspension point. For `Await` the operand is the awaitable; for
    /// `Yield` it is the produced value. `result_type` is the type of the
    /// value observed on resumption (`Unit` when nothing is consumed).
    Suspend {
        operand: Box<Self>,
        result_type: ValueType,
        kind: SuspendKind,
    },

    /// Await block or yield block: the unit of lowering.
    Resumable { kind: SuspendKind, body: Box<Self> },
}

// =========================================================================
// Builder helpers
// =========================================================================

impl Expr {
    pub const fn constant(value: Constant) -> Self {
        Self::Literal(value)
    }

    pub const fn unit() -> Self {
        Self::Literal(Constant::Unit)
    }

    pub const fn int(value: i64) -> Self {
        Self::Literal(Constant::Int(value))
    }

    pub const fn bool(value: bool) -> Self {
        Self::Literal(Constant::Bool(value))
    }

    pub fn str(value: impl Into<String>) -> Self {
        Self::Literal(Constant::Str(value.into()))
    }

    pub fn var(variable: &Variable) -> Self {
        Self::Variable(variable.clone())
    }

    pub fn assign(target: &Variable, value: Self) -> Self {
        Self::Assign {
            target: target.clone(),
            value: Box::new(value),
        }
    }

    pub fn op(operator: Operator, operands: Vec<Self>) -> Self {
        Self::Op { operator, operands }
    }

    pub fn binary(operator: Operator, left: Self, right: Self) -> Self {
        Self::op(operator, vec![left, right])
    }

    pub fn add(left: Self, right: Self) -> Self {
        Self::binary(Operator::Add, left, right)
    }

    pub fn sub(left: Self, right: Self) -> Self {
        Self::binary(Operator::Sub, left, right)
    }

    pub fn eq(left: Self, right: Self) -> Self {
        Self::binary(Operator::Eq, left, right)
    }

    pub fn lt(left: Self, right: Self) -> Self {
        Self::binary(Operator::Lt, left, right)
    }

    pub fn ge(left: Self, right: Self) -> Self {
        Self::binary(Operator::Ge, left, right)
    }

    pub fn not(operand: Self) -> Self {
        Self::op(Operator::Not, vec![operand])
    }

    pub fn call(name: impl Into<String>, args: Vec<Self>) -> Self {
        Self::op(Operator::Call(name.into()), args)
    }

    pub const fn block(vars: Vec<Variable>, body: Vec<Self>) -> Self {
        Self::Block { vars, body }
    }

    /// Block without locals.
    pub const fn seq(body: Vec<Self>) -> Self {
        Self::Block {
            vars: Vec::new(),
            body,
        }
    }

    pub fn cond(test: Self, if_true: Self, if_false: Self) -> Self {
        Self::Conditional {
            test: Box::new(test),
            if_true: Box::new(if_true),
            if_false: Some(Box::new(if_false)),
        }
    }

    pub fn if_then(test: Self, if_true: Self) -> Self {
        Self::Conditional {
            test: Box::new(test),
            if_true: Box::new(if_true),
            if_false: None,
        }
    }

    pub fn switch(value: Self, cases: Vec<SwitchCase>, default: Option<Self>) -> Self {
        Self::Switch {
            value: Box::new(value),
            cases,
            default: default.map(Box::new),
        }
    }

    pub fn try_catch(body: Self, handlers: Vec<CatchHandler>) -> Self {
        Self::Try {
            body: Box::new(body),
            handlers,
            finally: None,
        }
    }

    pub fn try_finally(body: Self, finally: Self) -> Self {
        Self::Try {
            body: Box::new(body),
            handlers: Vec::new(),
            finally: Some(Box::new(finally)),
        }
    }

    pub fn try_catch_finally(body: Self, handlers: Vec<CatchHandler>, finally: Self) -> Self {
        Self::Try {
            body: Box::new(body),
            handlers,
            finally: Some(Box::new(finally)),
        }
    }

    pub fn looping(
        body: Self,
        break_label: Option<LabelTarget>,
        continue_label: Option<LabelTarget>,
    ) -> Self {
        Self::Loop {
            body: Box::new(body),
            break_label,
            continue_label,
        }
    }

    pub fn goto(target: &LabelTarget) -> Self {
        Self::Goto {
            target: target.clone(),
            kind: GotoKind::Goto,
            value: None,
        }
    }

    pub fn break_to(target: &LabelTarget, value: Option<Self>) -> Self {
        Self::Goto {
            target: target.clone(),
            kind: GotoKind::Break,
            value: value.map(Box::new),
        }
    }

    pub fn continue_to(target: &LabelTarget) -> Self {
        Self::Goto {
            target: target.clone(),
            kind: GotoKind::Continue,
            value: None,
        }
    }

    /// Return from the enclosing region.
    pub fn ret(target: &LabelTarget, value: Option<Self>) -> Self {
        Self::Goto {
            target: target.clone(),
            kind: GotoKind::Return,
            value: value.map(Box::new),
        }
    }

    pub fn label(target: &LabelTarget) -> Self {
        Self::Label {
            target: target.clone(),
            default: None,
        }
    }

    pub fn suspend(operand: Self, result_type: ValueType, kind: SuspendKind) -> Self {
        Self::Suspend {
            operand: Box::new(operand),
            result_type,
            kind,
        }
    }

    /// `await operand`, observing an untyped result.
    pub fn awaiting(operand: Self) -> Self {
        Self::suspend(operand, ValueType::Any, SuspendKind::Await)
    }

    /// `yield value`, consuming nothing on resumption.
    pub fn yielding(value: Self) -> Self {
        Self::suspend(value, ValueType::Unit, SuspendKind::Yield)
    }

    pub fn throw(operand: Self) -> Self {
        Self::Throw(Some(Box::new(operand)))
    }

    pub const fn rethrow() -> Self {
        Self::Throw(None)
    }

    pub fn resumable(kind: SuspendKind, body: Self) -> Self {
        Self::Resumable {
            kind,
            body: Box::new(body),
        }
    }

    /// Constants and variable reads have no side effects and a stable value
    /// within a single state body.
    pub const fn is_trivial(&self) -> bool {
        matches!(self, Self::Literal(_) | Self::Variable(_))
    }

    pub const fn is_unit(&self) -> bool {
        matches!(self, Self::Literal(Constant::Unit))
    }
}

impl SwitchCase {
    pub const fn new(test_values: Vec<Expr>, body: Expr) -> Self {
        Self { test_values, body }
    }
}

impl CatchHandler {
    /// Handler that catches every exception without binding it.
    pub const fn catch_all(body: Expr) -> Self {
        Self {
            exception_type: None,
            variable: None,
            body,
        }
    }

    /// Handler for one exception kind.
    pub fn of(exception_type: impl Into<String>, variable: Option<Variable>, body: Expr) -> Self {
        Self {
            exception_type: Some(exception_type.into()),
            variable,
            body,
        }
    }

    pub fn binding(mut self, variable: &Variable) -> Self {
        self.variable = Some(variable.clone());
        self
    }
}
