//! The two-tier failure taxonomy.
//!
//! [`BindError`] covers argument-binding failures. Each carries one of six
//! stable [`BindErrorKind`]s that calling code and tests branch on; the
//! kinds are the only recoverable error conditions in the interpreter.
//!
//! [`Fault`] covers everything else: unresolvable names, stack underflow,
//! merge key collisions, type misuse, resource-limit hits, and internal
//! contract violations. A fault aborts the whole run and records where it
//! happened (instruction index, frame depth, and a frame trace).

use std::fmt::{self, Display, Write};

use smallvec::SmallVec;
use strum::IntoStaticStr;

/// Result type alias for operations that can abort a run.
pub type RunResult<T> = Result<T, Fault>;

/// Stable identifiers for argument-binding failures.
///
/// The string form (via `Display` / `Into<&'static str>`) is part of the
/// public contract and never changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, IntoStaticStr)]
pub enum BindErrorKind {
    TooManyPositionalArguments,
    TooManyKeywordArguments,
    MultipleValuesForArgument,
    MissingPositionalArguments,
    MissingKeywordOnlyArguments,
    PositionalOnlyPassedAsKeyword,
}

/// An argument-binding failure: a stable kind plus a rendered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindError {
    kind: BindErrorKind,
    message: String,
}

impl BindError {
    pub(crate) fn new(kind: BindErrorKind, message: String) -> Self {
        Self { kind, message }
    }

    pub(crate) fn too_many_positional(func: &str, max: usize, given: usize) -> Self {
        let msg = format!(
            "{func}() takes {max} positional argument{} but {given} {} given",
            plural(max),
            if given == 1 { "was" } else { "were" },
        );
        Self::new(BindErrorKind::TooManyPositionalArguments, msg)
    }

    pub(crate) fn unexpected_keyword(func: &str, name: &str) -> Self {
        let msg = format!("{func}() got an unexpected keyword argument '{name}'");
        Self::new(BindErrorKind::TooManyKeywordArguments, msg)
    }

    pub(crate) fn multiple_values(func: &str, name: &str) -> Self {
        let msg = format!("{func}() got multiple values for argument '{name}'");
        Self::new(BindErrorKind::MultipleValuesForArgument, msg)
    }

    pub(crate) fn missing_positional(func: &str, names: &[&str]) -> Self {
        let msg = format!(
            "{func}() missing {} required positional argument{}: {}",
            names.len(),
            plural(names.len()),
            join_quoted(names),
        );
        Self::new(BindErrorKind::MissingPositionalArguments, msg)
    }

    pub(crate) fn missing_kwonly(func: &str, names: &[&str]) -> Self {
        let msg = format!(
            "{func}() missing {} required keyword-only argument{}: {}",
            names.len(),
            plural(names.len()),
            join_quoted(names),
        );
        Self::new(BindErrorKind::MissingKeywordOnlyArguments, msg)
    }

    pub(crate) fn positional_only_as_keyword(func: &str, name: &str) -> Self {
        let msg =
            format!("{func}() got some positional-only arguments passed as keyword arguments: '{name}'");
        Self::new(BindErrorKind::PositionalOnlyPassedAsKeyword, msg)
    }

    /// The stable kind of this binding failure.
    #[must_use]
    pub fn kind(&self) -> BindErrorKind {
        self.kind
    }

    /// The rendered, CPython-style message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for BindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

fn plural(n: usize) -> &'static str {
    if n == 1 { "" } else { "s" }
}

/// Joins names as `'a', 'b', and 'c'` for error messages.
fn join_quoted(names: &[&str]) -> String {
    let mut out = String::new();
    for (i, name) in names.iter().enumerate() {
        if i > 0 {
            if i + 1 == names.len() {
                out.push_str(if names.len() == 2 { " and " } else { ", and " });
            } else {
                out.push_str(", ");
            }
        }
        let _ = write!(out, "'{name}'");
    }
    out
}

/// Kinds of fatal execution faults.
///
/// Apart from `Bind`, which wraps a binder failure raised by a call
/// instruction, these have no recovery taxonomy: they abort the run.
#[derive(Debug, Clone, PartialEq, IntoStaticStr)]
pub enum FaultKind {
    /// A name was not found in locals, globals, or builtins.
    NameNotFound(String),
    /// A disjoint dict merge hit a key already present in the target.
    KeyCollision(String),
    /// An instruction popped more values than the frame's stack held.
    StackUnderflow,
    /// Operator or operand misuse (unsupported operand types, unhashable
    /// key, calling a non-callable, bad unpack arity, ...).
    Type(String),
    /// A mapping subscript missed.
    Key(String),
    /// A sequence subscript was out of range.
    Index(String),
    /// Integer or float division/modulo by zero.
    ZeroDivision,
    /// Integer arithmetic overflowed the 64-bit value range.
    Overflow(String),
    /// The call stack exceeded the configured recursion depth.
    Recursion(usize),
    /// The configured instruction budget was exhausted.
    InstructionLimit(u64),
    /// A call instruction failed to bind its arguments.
    Bind(BindError),
    /// A host-supplied builtins value could not be converted.
    InvalidInput(String),
    /// A malformed code unit: bad jump target, missing code constant,
    /// running off the end without a return, and similar contract
    /// violations by the code-unit producer.
    Internal(String),
}

impl FaultKind {
    /// Stable identifier for the fault kind.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.into()
    }
}

impl Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NameNotFound(name) => write!(f, "name '{name}' is not defined"),
            Self::KeyCollision(key) => write!(f, "duplicate key in merge: {key}"),
            Self::StackUnderflow => f.write_str("operand stack underflow"),
            Self::Type(msg) | Self::Internal(msg) | Self::InvalidInput(msg) | Self::Overflow(msg) => {
                f.write_str(msg)
            }
            Self::Key(key) => f.write_str(key),
            Self::Index(msg) => f.write_str(msg),
            Self::ZeroDivision => f.write_str("division by zero"),
            Self::Recursion(depth) => {
                write!(f, "maximum recursion depth exceeded ({depth} frames)")
            }
            Self::InstructionLimit(budget) => {
                write!(f, "instruction budget exhausted ({budget} instructions)")
            }
            Self::Bind(err) => err.fmt(f),
        }
    }
}

/// One entry of a fault's frame trace, innermost last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    /// Function name, or `None` for the module frame.
    pub function: Option<String>,
    /// Instruction index the frame was at.
    pub instr: usize,
}

/// A fatal execution fault, with the point of failure.
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    kind: FaultKind,
    instr: usize,
    frame_depth: usize,
    trace: SmallVec<[TraceFrame; 4]>,
}

impl Fault {
    pub(crate) fn new(kind: FaultKind, instr: usize, frame_depth: usize) -> Self {
        Self {
            kind,
            instr,
            frame_depth,
            trace: SmallVec::new(),
        }
    }

    /// A fault raised outside any frame (e.g. while installing builtins).
    pub(crate) fn outside(kind: FaultKind) -> Self {
        Self::new(kind, 0, 0)
    }

    pub(crate) fn with_trace(mut self, trace: SmallVec<[TraceFrame; 4]>) -> Self {
        self.trace = trace;
        self
    }

    /// The fault kind.
    #[must_use]
    pub fn kind(&self) -> &FaultKind {
        &self.kind
    }

    /// Index of the instruction that faulted, within its code unit.
    #[must_use]
    pub fn instr_index(&self) -> usize {
        self.instr
    }

    /// Call-stack depth at the point of failure (1 = module frame).
    #[must_use]
    pub fn frame_depth(&self) -> usize {
        self.frame_depth
    }

    /// Frame trace at the point of failure, outermost first.
    #[must_use]
    pub fn trace(&self) -> &[TraceFrame] {
        &self.trace
    }
}

impl Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} (instruction {}, frame depth {})",
            self.kind.name(),
            self.kind,
            self.instr,
            self.frame_depth
        )?;
        for frame in &self.trace {
            let name = frame.function.as_deref().unwrap_or("<module>");
            write!(f, "\n  in {name} at instruction {}", frame.instr)?;
        }
        Ok(())
    }
}

impl std::error::Error for Fault {}

impl std::error::Error for BindError {}
