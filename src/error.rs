//! Error taxonomy.
//!
//! Two families, mirroring the split the rest of the crate leans on
//! throughout: [`AnalyzerError`] is fatal — configuration, parsing and
//! analysis-construction failures that unwind the whole run — while
//! [`StepFault`] is a value produced by the concrete VM on every step and is
//! never allowed to propagate as a panic.

use std::io;

use crate::vm::outcome::RuntimeOutcome;

/// Fatal setup/analyzer failures. These unwind the run: report to stderr,
/// exit non-zero.
#[derive(Debug, thiserror::Error)]
pub enum AnalyzerError {
    #[error("configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed decompiled JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed decompiled JSON: {0}")]
    JsonShape(String),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("malformed method identifier: {0}")]
    MethodId(String),

    #[error("failed to build control-flow graph: {0}")]
    CfgBuild(String),

    #[error("failed to build weak partial order: {0}")]
    WpoBuild(String),

    #[error("invalid command-line usage: {0}")]
    Usage(String),
}

/// VM step-level faults. These are data, classified by the dispatch loop and
/// mapped to a [`RuntimeOutcome`] by the caller; they are never raised as
/// panics or unwound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepFault {
    /// No active call frame.
    EmptyStack,
    /// Program counter pointed outside the function's instruction range.
    NullInstruction,
    /// An array index, or array size, fell outside its valid range.
    OutOfBounds,
    /// A heap reference was null where a non-null reference was required.
    NullPointer,
    /// Integer division or remainder by zero.
    DivideByZero,
    /// A `THROW` instruction executed (this analyzer treats `throw` solely
    /// as the assertion-failure signal described in the opcode contracts).
    AssertionError,
    /// An operand's runtime type didn't match the opcode's declared type.
    InvalidType,
    /// The dispatch table has no handler registered for this opcode.
    UnknownOpcode,
}

impl StepFault {
    /// Maps a step fault to the outcome category it is externally reported
    /// as. `EmptyStack`, `NullInstruction`, `InvalidType` and `UnknownOpcode`
    /// all collapse to the generic "unknown error" bucket — spec.md's
    /// outcome vocabulary has no separate slot for them.
    pub const fn outcome(self) -> RuntimeOutcome {
        match self {
            StepFault::DivideByZero => RuntimeOutcome::DivideByZero,
            StepFault::AssertionError => RuntimeOutcome::AssertionError,
            StepFault::OutOfBounds => RuntimeOutcome::OutOfBounds,
            StepFault::NullPointer => RuntimeOutcome::NullPointer,
            StepFault::EmptyStack
            | StepFault::NullInstruction
            | StepFault::InvalidType
            | StepFault::UnknownOpcode => RuntimeOutcome::UnknownError,
        }
    }
}

impl std::fmt::Display for StepFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            StepFault::EmptyStack => "empty operand stack",
            StepFault::NullInstruction => "program counter out of range",
            StepFault::OutOfBounds => "array index out of bounds",
            StepFault::NullPointer => "null pointer dereference",
            StepFault::DivideByZero => "division by zero",
            StepFault::AssertionError => "assertion error",
            StepFault::InvalidType => "invalid operand type",
            StepFault::UnknownOpcode => "unknown opcode",
        };
        f.write_str(s)
    }
}

impl std::error::Error for StepFault {}
