//! Lowering failures.
//!
//! Malformed input is reported through a single error type whose variants
//! distinguish the cause; lowering never produces a partial graph.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoweringError {
    #[error("empty input: the region body has nothing to lower")]
    EmptyInput,

    #[error("expected an await or yield region, found a plain expression")]
    NotARegion,

    #[error("a nested {kind} region must be lowered on its own")]
    NestedRegion { kind: &'static str },

    #[error("`{found}` is not allowed inside a {region} region")]
    MismatchedSuspend {
        found: &'static str,
        region: &'static str,
    },

    #[error("the entry scope has no states")]
    EmptyEntryScope,

    #[error("{kind} regions must contain at least one suspend point")]
    NoSuspendPoints { kind: &'static str },

    #[error("expression nesting exceeds the maximum lowering depth of {limit}")]
    DepthExceeded { limit: u32 },

    #[error("jump to label `{label}` cannot be resolved: {reason}")]
    UnsupportedJump { label: String, reason: &'static str },
}

/// Fieldless discriminant of a `LoweringError`, for matching and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoweringErrorKind {
    EmptyInput,
    NotARegion,
    NestedRegion,
    MismatchedSuspend,
    EmptyEntryScope,
    NoSuspendPoints,
    DepthExceeded,
    UnsupportedJump,
}

impl LoweringError {
    pub const fn kind(&self) -> LoweringErrorKind {
        match self {
            Self::EmptyInput => LoweringErrorKind::EmptyInput,
            Self::NotARegion => LoweringErrorKind::NotARegion,
            Self::NestedRegion { .. } => LoweringErrorKind::NestedRegion,
            Self::MismatchedSuspend { .. } => LoweringErrorKind::MismatchedSuspend,
            Self::EmptyEntryScope => LoweringErrorKind::EmptyEntryScope,
            Self::NoSuspendPoints { .. } => LoweringErrorKind::NoSuspendPoints,
            Self::DepthExceeded { .. } => LoweringErrorKind::DepthExceeded,
            Self::UnsupportedJump { .. } => LoweringErrorKind::UnsupportedJump,
        }
    }
}

pub type Result<T> = std::result::Result<T, LoweringError>;
