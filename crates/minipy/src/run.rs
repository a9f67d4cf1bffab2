//! The top-level entry point for running programs.

use serde::{Deserialize, Serialize};

use crate::{
    bytecode::{Program, Vm},
    fault::Fault,
    heap::Heap,
    object::{self, Object},
    resource::ResourceLimits,
    scope::{NameMap, Scopes},
    tracer::{NoopTracer, VmTracer},
};

/// Primary interface for running a compiled program.
///
/// A `Runner` wraps an immutable [`Program`] and can execute it any
/// number of times; every run gets a fresh heap and fresh scopes. The
/// runner serializes with the program, so compiled programs can be
/// cached and shipped (`dump`/`load`).
///
/// # Example
/// ```
/// use minipy::{BinaryOp, CodeBuilder, Const, Object, ProgramBuilder, Runner};
///
/// let program = ProgramBuilder::new();
/// let mut code = CodeBuilder::new();
/// code.emit_load_const(Const::Int(2));
/// code.emit_load_const(Const::Int(3));
/// code.emit_binary_op(BinaryOp::Add);
/// code.emit_return_value();
/// let runner = Runner::new(program.finish(code.build()));
/// assert_eq!(runner.run(vec![]).unwrap(), Object::Int(5));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Runner {
    program: Program,
}

impl Runner {
    #[must_use]
    pub fn new(program: Program) -> Self {
        Self { program }
    }

    /// The wrapped program.
    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Runs the program with default limits and no tracing.
    ///
    /// `builtins` seeds the builtins scope: a fixed mapping of globally
    /// available identifiers to values, consulted last during name
    /// resolution.
    pub fn run(&self, builtins: Vec<(String, Object)>) -> Result<Object, Fault> {
        self.run_with(builtins, ResourceLimits::default(), &mut NoopTracer)
    }

    /// Runs the program with explicit limits and a tracer.
    ///
    /// Returns the module code unit's produced value, or the fault that
    /// aborted the run (with its kind, instruction index, and frame
    /// depth). Faults are never swallowed.
    pub fn run_with(
        &self,
        builtins: Vec<(String, Object)>,
        limits: ResourceLimits,
        tracer: &mut impl VmTracer,
    ) -> Result<Object, Fault> {
        // Builtins names may not occur in the program's interner, so the
        // run works on its own extension of it.
        let mut interns = self.program.interns.clone();
        let mut heap = Heap::new();

        let mut builtin_map = NameMap::default();
        for (name, object) in &builtins {
            let value = object::import_object(object, &mut heap, &interns)?;
            let id = interns.intern(name);
            builtin_map.insert(id, value);
        }

        let mut scopes = Scopes::new(builtin_map);
        let mut vm = Vm::new(&self.program, &interns, &mut heap, &mut scopes, limits, tracer);
        let value = vm.run_module()?;

        object::export_value(&value, &heap, &interns, 0)
    }

    /// Serializes the runner (program included) to a compact binary
    /// format.
    pub fn dump(&self) -> Result<Vec<u8>, postcard::Error> {
        postcard::to_allocvec(self)
    }

    /// Restores a runner from [`Runner::dump`] output.
    pub fn load(bytes: &[u8]) -> Result<Self, postcard::Error> {
        postcard::from_bytes(bytes)
    }
}
