//! Comparison instruction handling.

use std::cmp::Ordering;

use super::Vm;
use crate::{
    bytecode::code::CompareOp,
    fault::RunResult,
    tracer::VmTracer,
    value::{Value, py_cmp, py_eq},
};

impl<Tr: VmTracer> Vm<'_, Tr> {
    /// Pops two operands (right on top) and pushes the comparison result.
    ///
    /// Equality is universal; the four ordering comparisons are defined
    /// for numbers, strings, and same-shaped sequences, and fault
    /// otherwise.
    pub(super) fn compare_op(&mut self, op: CompareOp) -> RunResult<()> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;

        let result = match op {
            CompareOp::Eq => py_eq(&lhs, &rhs, self.heap, self.interns),
            CompareOp::Ne => !py_eq(&lhs, &rhs, self.heap, self.interns),
            CompareOp::Lt | CompareOp::Le | CompareOp::Gt | CompareOp::Ge => {
                let Some(ordering) = py_cmp(&lhs, &rhs, self.heap, self.interns) else {
                    return Err(self.type_fault(format!(
                        "'{}' not supported between instances of '{}' and '{}'",
                        op.symbol(),
                        lhs.type_name(self.heap),
                        rhs.type_name(self.heap)
                    )));
                };
                match op {
                    CompareOp::Lt => ordering == Ordering::Less,
                    CompareOp::Le => ordering != Ordering::Greater,
                    CompareOp::Gt => ordering == Ordering::Greater,
                    CompareOp::Ge => ordering != Ordering::Less,
                    CompareOp::Eq | CompareOp::Ne => unreachable!("handled above"),
                }
            }
        };

        self.push(Value::Bool(result));
        Ok(())
    }
}
