//! Builders for programs and code units.
//!
//! `CodeBuilder` emits instructions and handles forward jumps with
//! patching; `ProgramBuilder` owns the interner and the function table.
//!
//! ```
//! use minipy::{CodeBuilder, Const};
//!
//! let mut code = CodeBuilder::new();
//! code.emit_load_const(Const::Int(1));
//! let jump = code.emit_pop_jump_if_false();
//! code.emit_load_const(Const::Int(2));
//! code.patch_jump(jump);
//! code.emit_return_value();
//! let code = code.build();
//! assert_eq!(code.len(), 4);
//! ```

use super::code::{BinaryOp, Code, CompareOp, Const, Conversion, FunctionId, Instr, Program, UnaryOp};
use crate::{
    function::FunctionDef,
    intern::{Interns, StringId},
};

/// Placeholder target emitted for forward jumps until they are patched.
const UNPATCHED: usize = usize::MAX;

/// Builder for a whole program.
#[derive(Debug, Default)]
pub struct ProgramBuilder {
    interns: Interns,
    functions: Vec<FunctionDef>,
}

impl ProgramBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns an identifier for use in instructions and signatures.
    pub fn intern(&mut self, name: &str) -> StringId {
        self.interns.intern(name)
    }

    /// Registers a function template, returning the id `Const::Code`
    /// instructions reference.
    pub fn add_function(&mut self, def: FunctionDef) -> FunctionId {
        let id = FunctionId::new(self.functions.len());
        self.functions.push(def);
        id
    }

    /// Finishes the program with the given module code unit.
    #[must_use]
    pub fn finish(self, module: Code) -> Program {
        Program {
            interns: self.interns,
            functions: self.functions,
            module,
        }
    }
}

/// Handle for a forward jump awaiting its target.
#[derive(Debug)]
#[must_use = "forward jumps must be patched"]
pub struct JumpPatch(usize);

/// Builder for one code unit.
#[derive(Debug, Default)]
pub struct CodeBuilder {
    instrs: Vec<Instr>,
}

impl CodeBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the next emitted instruction; use as a backward jump
    /// target.
    #[must_use]
    pub fn next_target(&self) -> usize {
        self.instrs.len()
    }

    /// Emits an arbitrary instruction.
    pub fn emit(&mut self, instr: Instr) {
        self.instrs.push(instr);
    }

    pub fn emit_load_const(&mut self, c: Const) {
        self.emit(Instr::LoadConst(c));
    }

    pub fn emit_load_name(&mut self, name: StringId) {
        self.emit(Instr::LoadName(name));
    }

    pub fn emit_load_global(&mut self, name: StringId) {
        self.emit(Instr::LoadGlobal(name));
    }

    pub fn emit_store_name(&mut self, name: StringId) {
        self.emit(Instr::StoreName(name));
    }

    pub fn emit_store_global(&mut self, name: StringId) {
        self.emit(Instr::StoreGlobal(name));
    }

    pub fn emit_unary_op(&mut self, op: UnaryOp) {
        self.emit(Instr::UnaryOp(op));
    }

    pub fn emit_binary_op(&mut self, op: BinaryOp) {
        self.emit(Instr::BinaryOp(op));
    }

    pub fn emit_compare_op(&mut self, op: CompareOp) {
        self.emit(Instr::CompareOp(op));
    }

    pub fn emit_format_value(&mut self, conversion: Option<Conversion>, has_spec: bool) {
        self.emit(Instr::FormatValue { conversion, has_spec });
    }

    /// Emits `MakeFunction`. The stack must hold, from bottom to top:
    /// positional defaults tuple (when `has_defaults`), keyword defaults
    /// dict (when `has_kw_defaults`), the code constant, the qualified
    /// name.
    pub fn emit_make_function(&mut self, has_defaults: bool, has_kw_defaults: bool) {
        self.emit(Instr::MakeFunction {
            has_defaults,
            has_kw_defaults,
        });
    }

    pub fn emit_call_function(&mut self, positional: usize) {
        self.emit(Instr::CallFunction(positional));
    }

    /// Emits `CallFunctionKw`. Keyword values are pushed after the
    /// positional arguments, in `kw_names` order.
    pub fn emit_call_function_kw(&mut self, positional: usize, kw_names: Vec<StringId>) {
        self.emit(Instr::CallFunctionKw {
            pos: positional,
            kw_names,
        });
    }

    pub fn emit_return_value(&mut self) {
        self.emit(Instr::ReturnValue);
    }

    /// Emits an unconditional forward jump to be patched later.
    pub fn emit_jump(&mut self) -> JumpPatch {
        self.emit(Instr::Jump(UNPATCHED));
        JumpPatch(self.instrs.len() - 1)
    }

    /// Emits a backward (or otherwise known-target) jump.
    pub fn emit_jump_to(&mut self, target: usize) {
        self.emit(Instr::Jump(target));
    }

    pub fn emit_pop_jump_if_true(&mut self) -> JumpPatch {
        self.emit(Instr::PopJumpIfTrue(UNPATCHED));
        JumpPatch(self.instrs.len() - 1)
    }

    pub fn emit_pop_jump_if_false(&mut self) -> JumpPatch {
        self.emit(Instr::PopJumpIfFalse(UNPATCHED));
        JumpPatch(self.instrs.len() - 1)
    }

    pub fn emit_jump_if_true_or_pop(&mut self) -> JumpPatch {
        self.emit(Instr::JumpIfTrueOrPop(UNPATCHED));
        JumpPatch(self.instrs.len() - 1)
    }

    pub fn emit_jump_if_false_or_pop(&mut self) -> JumpPatch {
        self.emit(Instr::JumpIfFalseOrPop(UNPATCHED));
        JumpPatch(self.instrs.len() - 1)
    }

    /// Emits `ForIter`; its exhausted-target is patched later.
    pub fn emit_for_iter(&mut self) -> JumpPatch {
        self.emit(Instr::ForIter(UNPATCHED));
        JumpPatch(self.instrs.len() - 1)
    }

    /// Points a forward jump at the next emitted instruction.
    ///
    /// # Panics
    /// Panics if the patch handle does not refer to a jump instruction;
    /// handles are only produced by the `emit_*jump*` methods, so this
    /// indicates builder misuse.
    pub fn patch_jump(&mut self, patch: JumpPatch) {
        let target = self.instrs.len();
        match &mut self.instrs[patch.0] {
            Instr::Jump(t)
            | Instr::PopJumpIfTrue(t)
            | Instr::PopJumpIfFalse(t)
            | Instr::JumpIfTrueOrPop(t)
            | Instr::JumpIfFalseOrPop(t)
            | Instr::ForIter(t) => *t = target,
            other => panic!("patch target is not a jump: {other:?}"),
        }
    }

    /// Finishes the code unit.
    #[must_use]
    pub fn build(self) -> Code {
        debug_assert!(
            !self
                .instrs
                .iter()
                .any(|i| matches!(i, Instr::Jump(UNPATCHED) | Instr::PopJumpIfTrue(UNPATCHED)
                    | Instr::PopJumpIfFalse(UNPATCHED) | Instr::JumpIfTrueOrPop(UNPATCHED)
                    | Instr::JumpIfFalseOrPop(UNPATCHED) | Instr::ForIter(UNPATCHED))),
            "unpatched forward jump in code unit"
        );
        Code::new(self.instrs)
    }
}
