//! Function templates and closure values.

use serde::{Deserialize, Serialize};

use crate::{
    bytecode::{Code, FunctionId},
    intern::StringId,
    scope::NameMap,
    signature::Signature,
    value::Value,
};

/// A compiled function template: everything static about a callable.
///
/// Templates live in the program's function table and are referenced from
/// `Const::Code`. The dynamic half (captured locals, default values) is
/// added when a `MakeFunction` instruction turns a template into a
/// [`Closure`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDef {
    pub(crate) name: StringId,
    pub(crate) signature: Signature,
    pub(crate) code: Code,
}

impl FunctionDef {
    pub fn new(name: StringId, signature: Signature, code: Code) -> Self {
        Self { name, signature, code }
    }

    /// The declared function name.
    #[must_use]
    pub fn name(&self) -> StringId {
        self.name
    }

    #[must_use]
    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    #[must_use]
    pub fn code(&self) -> &Code {
        &self.code
    }
}

/// A first-class function value.
///
/// Owns the defining frame's locals snapshot (copied at creation time, so
/// later rebinding in the defining frame is invisible to the closure) and
/// the default values evaluated when the `MakeFunction` instruction ran.
/// Each invocation binds arguments afresh and runs in a new frame.
#[derive(Debug, Clone)]
pub(crate) struct Closure {
    /// The template in the program's function table.
    pub function: FunctionId,
    /// Qualified name popped by `MakeFunction`, for repr and traces.
    pub qualname: String,
    /// Locals of the defining frame at creation time.
    pub captured: NameMap,
    /// Positional defaults, aligned to the trailing positional-or-keyword
    /// parameters.
    pub defaults: Vec<Value>,
    /// Keyword-only defaults.
    pub kw_defaults: Vec<(StringId, Value)>,
}
