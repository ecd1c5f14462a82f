//! Compact single-line rendering of expressions.

use std::fmt::{self, Display, Formatter};

use crate::expr::{Constant, Expr, GotoKind, Operator, SuspendKind};
use crate::ids::{LabelTarget, Variable};

impl Display for Constant {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unit => f.write_str("()"),
            Self::Bool(value) => write!(f, "{value}"),
            Self::Int(value) => write!(f, "{value}"),
            Self::Str(value) => write!(f, "{value:?}"),
        }
    }
}

impl Display for Variable {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl Display for LabelTarget {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => f.write_str(name),
            None => write!(f, "{}", self.id),
        }
    }
}

fn write_list(f: &mut Formatter<'_>, items: &[Expr], separator: &str) -> fmt::Result {
    for (index, item) in items.iter().enumerate() {
        if index > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(value) => write!(f, "{value}"),
            Self::Variable(variable) => write!(f, "{variable}"),
            Self::Assign { target, value } => write!(f, "{target} = {value}"),
            Self::Op { operator, operands } => match (operator, operands.as_slice()) {
                (Operator::Call(name), args) => {
                    write!(f, "{name}(")?;
                    write_list(f, args, ", ")?;
                    f.write_str(")")
                }
                (_, [operand]) => write!(f, "{}{operand}", operator.symbol()),
                (_, [left, right]) => write!(f, "({left} {} {right})", operator.symbol()),
                (_, operands) => {
                    write!(f, "{}(", operator.symbol())?;
                    write_list(f, operands, ", ")?;
                    f.write_str(")")
                }
            },
            Self::Block { vars, body } => {
                f.write_str("{ ")?;
                if !vars.is_empty() {
                    f.write_str("var ")?;
                    for (index, var) in vars.iter().enumerate() {
                        if index > 0 {
                            f.write_str(", ")?;
                        }
                        write!(f, "{var}")?;
                    }
                    f.write_str("; ")?;
                }
                write_list(f, body, "; ")?;
                f.write_str(" }")
            }
            Self::Conditional {
                test,
                if_true,
                if_false,
            } => {
                write!(f, "if {test} {{ {if_true} }}")?;
                if let Some(if_false) = if_false {
                    write!(f, " else {{ {if_false} }}")?;
                }
                Ok(())
            }
            Self::Switch {
                value,
                cases,
                default,
            } => {
                write!(f, "switch {value} {{ ")?;
                for case in cases {
                    f.write_str("case ")?;
                    write_list(f, &case.test_values, ", ")?;
                    write!(f, ": {}; ", case.body)?;
                }
                if let Some(default) = default {
                    write!(f, "default: {default}; ")?;
                }
                f.write_str("}")
            }
            Self::Try {
                body,
                handlers,
                finally,
            } => {
                write!(f, "try {{ {body} }}")?;
                for handler in handlers {
                    f.write_str(" catch")?;
                    match (&handler.exception_type, &handler.variable) {
                        (Some(kind), Some(var)) => write!(f, " {kind}({var})")?,
                        (Some(kind), None) => write!(f, " {kind}")?,
                        (None, Some(var)) => write!(f, " ({var})")?,
                        (None, None) => {}
                    }
                    write!(f, " {{ {} }}", handler.body)?;
                }
                if let Some(finally) = finally {
                    write!(f, " finally {{ {finally} }}")?;
                }
                Ok(())
            }
            Self::Loop { body, .. } => write!(f, "loop {{ {body} }}"),
            Self::Goto {
                target,
                kind,
                value,
            } => {
                match kind {
                    GotoKind::Goto => write!(f, "goto {target}")?,
                    GotoKind::Break => write!(f, "break {target}")?,
                    GotoKind::Continue => write!(f, "continue {target}")?,
                    GotoKind::Return => f.write_str("return")?,
                }
                if let Some(value) = value {
                    write!(f, " {value}")?;
                }
                Ok(())
            }
            Self::Label { target, default } => {
                write!(f, "{target}:")?;
                if let Some(default) = default {
                    write!(f, " {default}")?;
                }
                Ok(())
            }
            Self::Throw(Some(operand)) => write!(f, "throw {operand}"),
            Self::Throw(None) => f.write_str("rethrow"),
            Self::Suspend { operand, kind, .. } => write!(f, "{} {operand}", kind.as_str()),
            Self::Resumable { kind, body } => match kind {
                SuspendKind::Await => write!(f, "async {body}"),
                SuspendKind::Yield => write!(f, "gen {body}"),
            },
        }
    }
}
