//! Closure creation and invocation.
//!
//! `MakeFunction` turns a code constant into a closure that captures the
//! current frame's locals by copy. Invoking a closure binds the call's
//! arguments against the template's signature and the closure's defaults,
//! overlays the bound arguments on the captured snapshot, and pushes a
//! fresh frame; the dispatch loop then executes the callee until its
//! `ReturnValue` hands control back.

use super::{Frame, Vm};
use crate::{
    args::ArgValues,
    fault::{FaultKind, RunResult},
    function::Closure,
    heap::HeapData,
    intern::StringId,
    tracer::VmTracer,
    value::Value,
};

impl<Tr: VmTracer> Vm<'_, Tr> {
    pub(super) fn make_function(&mut self, has_defaults: bool, has_kw_defaults: bool) -> RunResult<()> {
        let name_value = self.pop()?;
        let code_value = self.pop()?;
        let kw_defaults_value = if has_kw_defaults { Some(self.pop()?) } else { None };
        let defaults_value = if has_defaults { Some(self.pop()?) } else { None };

        let Value::Code(function) = code_value else {
            return Err(self.fault(FaultKind::Internal(
                "MakeFunction expects a code constant below the name".to_owned(),
            )));
        };
        if self.program.function(function).is_none() {
            return Err(self.fault(FaultKind::Internal(format!(
                "MakeFunction references unknown function {}",
                function.index()
            ))));
        }
        let Some(qualname) = name_value.as_str(self.heap, self.interns).map(str::to_owned) else {
            return Err(self.fault(FaultKind::Internal(
                "MakeFunction expects a string function name on top of stack".to_owned(),
            )));
        };

        let defaults = match &defaults_value {
            Some(value) => self.clone_sequence_items(value).ok_or_else(|| {
                self.fault(FaultKind::Internal(
                    "MakeFunction positional defaults must be a tuple".to_owned(),
                ))
            })?,
            None => Vec::new(),
        };
        let kw_defaults = match &kw_defaults_value {
            Some(value) => self.kw_defaults_entries(value)?,
            None => Vec::new(),
        };

        let captured = self.scopes.locals(self.frame().locals).clone();
        self.tracer.on_make_function(defaults.len(), kw_defaults.len());

        let closure = Closure {
            function,
            qualname,
            captured,
            defaults,
            kw_defaults,
        };
        let value = Value::Ref(self.heap.allocate(HeapData::Closure(closure)));
        self.push(value);
        Ok(())
    }

    /// Reads a keyword-defaults dict into `(name, value)` pairs.
    fn kw_defaults_entries(&self, value: &Value) -> RunResult<Vec<(StringId, Value)>> {
        let dict = match value.ref_id().map(|id| self.heap.get(id)) {
            Some(HeapData::Dict(dict)) => dict,
            _ => {
                return Err(self.fault(FaultKind::Internal(
                    "MakeFunction keyword defaults must be a dict".to_owned(),
                )));
            }
        };
        let mut out = Vec::with_capacity(dict.len());
        for (key, default) in dict.iter() {
            let Some(name) = key.as_str(self.heap, self.interns) else {
                return Err(self.fault(FaultKind::Internal(
                    "keyword default names must be strings".to_owned(),
                )));
            };
            let Some(name_id) = self.interns.lookup(name) else {
                return Err(self.fault(FaultKind::Internal(format!(
                    "keyword default '{name}' does not name a parameter"
                ))));
            };
            out.push((name_id, default.clone()));
        }
        Ok(out)
    }

    pub(super) fn call_function(&mut self, positional: usize) -> RunResult<()> {
        let args = self.popn(positional)?;
        let callable = self.pop()?;
        self.call_value(callable, ArgValues::new(args, Vec::new()))
    }

    pub(super) fn call_function_kw(&mut self, positional: usize, kw_names: &[StringId]) -> RunResult<()> {
        let kw_values = self.popn(kw_names.len())?;
        let args = self.popn(positional)?;
        let callable = self.pop()?;
        let kwargs = kw_names.iter().copied().zip(kw_values).collect();
        self.call_value(callable, ArgValues::new(args, kwargs))
    }

    /// Invokes a closure: bind, overlay on the captured snapshot, push a
    /// frame.
    fn call_value(&mut self, callable: Value, args: ArgValues) -> RunResult<()> {
        let closure = match callable.ref_id().map(|id| self.heap.get(id)) {
            Some(HeapData::Closure(closure)) => closure,
            _ => {
                return Err(self.type_fault(format!(
                    "'{}' object is not callable",
                    callable.type_name(self.heap)
                )));
            }
        };
        let function = closure.function;
        let captured = closure.captured.clone();
        let defaults = closure.defaults.clone();
        let kw_defaults = closure.kw_defaults.clone();

        let program = self.program;
        let interns = self.interns;
        let Some(def) = program.function(function) else {
            return Err(self.fault(FaultKind::Internal(format!(
                "call references unknown function {}",
                function.index()
            ))));
        };

        if self.frames.len() >= self.limits.max_recursion_depth {
            return Err(self.fault(FaultKind::Recursion(self.limits.max_recursion_depth)));
        }

        let func_name = interns.get_str(def.name);
        let bound = def
            .signature
            .bind(args, &defaults, &kw_defaults, self.heap, interns, func_name)
            .map_err(|err| self.fault(FaultKind::Bind(err)))?;

        // Callee locals: the captured snapshot overlaid with the bound
        // arguments.
        let mut locals = captured;
        for (name, value) in bound {
            locals.insert(name, value);
        }
        let locals_id = self.scopes.push_locals(locals);

        self.tracer.on_call(func_name, self.frames.len() + 1);
        self.frames.push(Frame {
            code: &def.code,
            ip: 0,
            stack_base: self.stack.len(),
            locals: locals_id,
            function: Some(function),
        });
        Ok(())
    }
}
