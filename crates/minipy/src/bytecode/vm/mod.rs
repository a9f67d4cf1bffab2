//! The stack-based virtual machine.
//!
//! The VM keeps one operand stack shared by all frames (each frame owns
//! the region above its `stack_base`) and an explicit frame stack: a call
//! pushes a frame, a return pops it and leaves the callee's value on the
//! caller's stack region. Each frame owns its instruction pointer.
//!
//! Dispatch is a single exhaustive match over [`Instr`]; an opcode
//! without a handler is a compile error, not a runtime lookup miss.

mod binary;
mod call;
mod collections;
mod compare;
mod format;

use smallvec::SmallVec;

use crate::{
    bytecode::code::{Code, Const, FunctionId, Instr, Program},
    fault::{Fault, FaultKind, RunResult, TraceFrame},
    heap::{Heap, HeapData},
    intern::Interns,
    resource::ResourceLimits,
    scope::{LocalsId, Scopes},
    tracer::VmTracer,
    value::{Value, py_truthy},
};

/// A single activation record.
#[derive(Debug)]
struct Frame<'p> {
    /// Bytecode being executed.
    code: &'p Code,
    /// Instruction pointer within this frame's code unit.
    ip: usize,
    /// Index into the operand stack where this frame's region begins.
    stack_base: usize,
    /// This frame's locals scope.
    locals: LocalsId,
    /// Function template, `None` for the module frame.
    function: Option<FunctionId>,
}

/// The virtual machine for one run.
pub(crate) struct Vm<'p, Tr: VmTracer> {
    program: &'p Program,
    interns: &'p Interns,
    heap: &'p mut Heap,
    scopes: &'p mut Scopes,
    limits: ResourceLimits,
    tracer: &'p mut Tr,
    stack: Vec<Value>,
    frames: Vec<Frame<'p>>,
    /// Index of the instruction currently executing, for fault reports.
    cur_ip: usize,
    /// Instructions dispatched so far, for the budget check.
    executed: u64,
}

impl<'p, Tr: VmTracer> Vm<'p, Tr> {
    pub fn new(
        program: &'p Program,
        interns: &'p Interns,
        heap: &'p mut Heap,
        scopes: &'p mut Scopes,
        limits: ResourceLimits,
        tracer: &'p mut Tr,
    ) -> Self {
        Self {
            program,
            interns,
            heap,
            scopes,
            limits,
            tracer,
            stack: Vec::new(),
            frames: Vec::new(),
            cur_ip: 0,
            executed: 0,
        }
    }

    /// Runs the module code unit to completion.
    ///
    /// The module frame's locals are the globals scope, so module-level
    /// stores are visible as globals to every nested frame.
    pub fn run_module(&mut self) -> RunResult<Value> {
        self.frames.push(Frame {
            code: &self.program.module,
            ip: 0,
            stack_base: 0,
            locals: LocalsId::GLOBALS,
            function: None,
        });
        self.dispatch()
    }

    /// The dispatch loop. Returns when the outermost frame executes
    /// `ReturnValue`, or faults.
    fn dispatch(&mut self) -> RunResult<Value> {
        loop {
            let (code, ip, stack_base) = {
                let frame = self.frames.last().expect("dispatch with empty frame stack");
                (frame.code, frame.ip, frame.stack_base)
            };
            self.cur_ip = ip;

            let Some(instr) = code.instr(ip) else {
                return Err(self.fault(FaultKind::Internal(
                    "code unit ended without executing a return instruction".to_owned(),
                )));
            };

            self.executed += 1;
            if let Some(max) = self.limits.max_instructions
                && self.executed > max
            {
                return Err(self.fault(FaultKind::InstructionLimit(max)));
            }

            self.tracer
                .on_instruction(ip, instr.name(), self.stack.len() - stack_base, self.frames.len());

            // Advance past the instruction; jump handlers overwrite this.
            self.frame_mut().ip = ip + 1;

            match instr {
                Instr::LoadConst(c) => {
                    let value = self.const_value(c);
                    self.push(value);
                }
                Instr::LoadName(name) => {
                    let locals = self.frame().locals;
                    match self.scopes.lookup(locals, *name) {
                        Some(value) => self.push(value),
                        None => {
                            return Err(self.name_fault(*name));
                        }
                    }
                }
                Instr::LoadGlobal(name) => match self.scopes.lookup_global(*name) {
                    Some(value) => self.push(value),
                    None => {
                        return Err(self.name_fault(*name));
                    }
                },
                Instr::StoreName(name) => {
                    let value = self.pop()?;
                    let locals = self.frame().locals;
                    self.scopes.store(locals, *name, value);
                }
                Instr::StoreGlobal(name) => {
                    let value = self.pop()?;
                    self.scopes.store_global(*name, value);
                }

                Instr::PopTop => {
                    self.pop()?;
                }
                Instr::DupTop => {
                    let value = self.peek()?.clone();
                    self.push(value);
                }
                Instr::RotTwo => {
                    let top = self.pop()?;
                    let second = self.pop()?;
                    self.push(top);
                    self.push(second);
                }
                Instr::RotThree => {
                    let top = self.pop()?;
                    let second = self.pop()?;
                    let third = self.pop()?;
                    self.push(top);
                    self.push(third);
                    self.push(second);
                }

                Instr::UnaryOp(op) => self.unary_op(*op)?,
                Instr::BinaryOp(op) | Instr::InplaceOp(op) => self.binary_op(*op)?,
                Instr::CompareOp(op) => self.compare_op(*op)?,

                Instr::BuildTuple(n) => self.build_tuple(*n)?,
                Instr::BuildList(n) => self.build_list(*n)?,
                Instr::BuildSet(n) => self.build_set(*n)?,
                Instr::BuildMap(n) => self.build_map(*n)?,
                Instr::BuildConstKeyMap(n) => self.build_const_key_map(*n)?,
                Instr::BuildString(n) => self.build_string(*n)?,
                Instr::ListToTuple => self.list_to_tuple()?,
                Instr::BuildSlice(n) => self.build_slice(*n)?,

                Instr::SetUpdate(i) => self.set_update(*i)?,
                Instr::SetAdd(i) => self.set_add(*i)?,
                Instr::DictUpdate(i) => self.dict_update(*i, false)?,
                Instr::DictMerge(i) => self.dict_update(*i, true)?,
                Instr::MapAdd(i) => self.map_add(*i)?,

                Instr::BinarySubscr => self.binary_subscr()?,
                Instr::StoreSubscr => self.store_subscr()?,
                Instr::DeleteSubscr => self.delete_subscr()?,

                Instr::UnpackSequence(n) => self.unpack_sequence(*n)?,

                Instr::FormatValue { conversion, has_spec } => self.format_value(*conversion, *has_spec)?,

                Instr::Jump(target) => self.jump_to(*target)?,
                Instr::JumpForward(delta) => self.jump_to(ip.saturating_add(1).saturating_add(*delta))?,
                Instr::PopJumpIfTrue(target) => {
                    let value = self.pop()?;
                    if self.truthy(&value) {
                        self.jump_to(*target)?;
                    }
                }
                Instr::PopJumpIfFalse(target) => {
                    let value = self.pop()?;
                    if !self.truthy(&value) {
                        self.jump_to(*target)?;
                    }
                }
                Instr::JumpIfTrueOrPop(target) => {
                    let keep = self.truthy(&self.peek()?.clone());
                    if keep {
                        self.jump_to(*target)?;
                    } else {
                        self.pop()?;
                    }
                }
                Instr::JumpIfFalseOrPop(target) => {
                    let keep = !self.truthy(&self.peek()?.clone());
                    if keep {
                        self.jump_to(*target)?;
                    } else {
                        self.pop()?;
                    }
                }

                Instr::GetIter => self.get_iter()?,
                Instr::ForIter(end) => self.for_iter(*end)?,

                Instr::MakeFunction {
                    has_defaults,
                    has_kw_defaults,
                } => self.make_function(*has_defaults, *has_kw_defaults)?,
                Instr::CallFunction(n) => self.call_function(*n)?,
                Instr::CallFunctionKw { pos, kw_names } => self.call_function_kw(*pos, kw_names)?,

                Instr::ReturnValue => {
                    let value = self.pop()?;
                    let frame = self.frames.pop().expect("return with empty frame stack");
                    if frame.locals != LocalsId::GLOBALS {
                        self.scopes.release(frame.locals);
                    }
                    self.tracer.on_return(self.frames.len());
                    if self.frames.is_empty() {
                        return Ok(value);
                    }
                    // Discard anything the callee left behind and hand
                    // the result to the caller.
                    self.stack.truncate(frame.stack_base);
                    self.push(value);
                }
            }
        }
    }

    // === frame and stack access ===

    fn frame(&self) -> &Frame<'p> {
        self.frames.last().expect("frame stack empty")
    }

    fn frame_mut(&mut self) -> &mut Frame<'p> {
        self.frames.last_mut().expect("frame stack empty")
    }

    pub(super) fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    /// Pops one value, guarding against underflow past the current
    /// frame's region.
    pub(super) fn pop(&mut self) -> RunResult<Value> {
        if self.stack.len() <= self.frame().stack_base {
            return Err(self.fault(FaultKind::StackUnderflow));
        }
        Ok(self.stack.pop().expect("stack checked non-empty"))
    }

    /// Pops `n` values, returned deepest-first.
    pub(super) fn popn(&mut self, n: usize) -> RunResult<Vec<Value>> {
        if self.stack.len() < self.frame().stack_base + n {
            return Err(self.fault(FaultKind::StackUnderflow));
        }
        Ok(self.stack.split_off(self.stack.len() - n))
    }

    pub(super) fn peek(&self) -> RunResult<&Value> {
        if self.stack.len() <= self.frame().stack_base {
            return Err(self.fault(FaultKind::StackUnderflow));
        }
        Ok(self.stack.last().expect("stack checked non-empty"))
    }

    /// A mutable reference to the value `depth` slots below the top,
    /// where `depth` 1 is the top itself.
    pub(super) fn peek_at_mut(&mut self, depth: usize) -> RunResult<&mut Value> {
        let base = self.frame().stack_base;
        let len = self.stack.len();
        if depth == 0 || len < base + depth {
            return Err(self.fault(FaultKind::StackUnderflow));
        }
        Ok(&mut self.stack[len - depth])
    }

    // === shared helpers ===

    /// Materializes a constant as a value. Tuple constants allocate.
    fn const_value(&mut self, c: &Const) -> Value {
        match c {
            Const::None => Value::None,
            Const::Bool(b) => Value::Bool(*b),
            Const::Int(i) => Value::Int(*i),
            Const::Float(x) => Value::Float(*x),
            Const::Str(id) => Value::InternString(*id),
            Const::Code(id) => Value::Code(*id),
            Const::Tuple(items) => {
                let values = items.iter().map(|item| self.const_value(item)).collect();
                Value::Ref(self.heap.allocate(HeapData::Tuple(values)))
            }
        }
    }

    pub(super) fn truthy(&self, value: &Value) -> bool {
        py_truthy(value, self.heap, self.interns)
    }

    /// Sets the current frame's instruction pointer, validating the
    /// target.
    pub(super) fn jump_to(&mut self, target: usize) -> RunResult<()> {
        if target >= self.frame().code.len() {
            return Err(self.fault(FaultKind::Internal(format!("jump target {target} out of range"))));
        }
        self.frame_mut().ip = target;
        Ok(())
    }

    // === fault construction ===

    /// Builds a fault at the current execution point, with a frame trace.
    pub(super) fn fault(&self, kind: FaultKind) -> Fault {
        let last = self.frames.len().saturating_sub(1);
        let trace: SmallVec<[TraceFrame; 4]> = self
            .frames
            .iter()
            .enumerate()
            .map(|(i, frame)| TraceFrame {
                function: frame.function.map(|id| self.function_name(id).to_owned()),
                instr: if i == last { self.cur_ip } else { frame.ip.saturating_sub(1) },
            })
            .collect();
        Fault::new(kind, self.cur_ip, self.frames.len()).with_trace(trace)
    }

    pub(super) fn type_fault(&self, message: impl Into<String>) -> Fault {
        self.fault(FaultKind::Type(message.into()))
    }

    fn name_fault(&self, name: crate::intern::StringId) -> Fault {
        self.fault(FaultKind::NameNotFound(self.interns.get_str(name).to_owned()))
    }

    pub(super) fn function_name(&self, id: FunctionId) -> &str {
        self.program
            .function(id)
            .map_or("<unknown>", |def| self.interns.get_str(def.name))
    }
}
