//! Binary, in-place, and unary operator evaluation.
//!
//! Operand-type compatibility is decided here by the value semantics:
//! `+` concatenates sequences, `*` repeats them, `-` subtracts sets, `|`
//! unions sets and merges dicts. The dispatch loop itself only selects
//! the operator. In-place instructions share these handlers; there is no
//! separate mutate-in-place path.

use super::Vm;
use crate::{
    bytecode::code::{BinaryOp, UnaryOp},
    fault::{Fault, FaultKind, RunResult},
    heap::HeapData,
    tracer::VmTracer,
    types::Set,
    value::{Num, Value, as_number},
};

impl<Tr: VmTracer> Vm<'_, Tr> {
    pub(super) fn binary_op(&mut self, op: BinaryOp) -> RunResult<()> {
        let rhs = self.pop()?;
        let lhs = self.pop()?;
        let result = self.apply_binary(op, &lhs, &rhs)?;
        self.push(result);
        Ok(())
    }

    pub(super) fn unary_op(&mut self, op: UnaryOp) -> RunResult<()> {
        let value = self.pop()?;
        let result = match op {
            UnaryOp::Pos => match as_number(&value) {
                Some(Num::Int(i)) => Value::Int(i),
                Some(Num::Float(x)) => Value::Float(x),
                None => {
                    return Err(self.type_fault(format!(
                        "bad operand type for unary +: '{}'",
                        value.type_name(self.heap)
                    )));
                }
            },
            UnaryOp::Neg => match as_number(&value) {
                Some(Num::Int(i)) => match i.checked_neg() {
                    Some(n) => Value::Int(n),
                    None => return Err(self.overflow_fault("-")),
                },
                Some(Num::Float(x)) => Value::Float(-x),
                None => {
                    return Err(self.type_fault(format!(
                        "bad operand type for unary -: '{}'",
                        value.type_name(self.heap)
                    )));
                }
            },
            UnaryOp::Not => Value::Bool(!self.truthy(&value)),
            UnaryOp::Invert => match value.as_int() {
                Some(i) => Value::Int(!i),
                None => {
                    return Err(self.type_fault(format!(
                        "bad operand type for unary ~: '{}'",
                        value.type_name(self.heap)
                    )));
                }
            },
        };
        self.push(result);
        Ok(())
    }

    fn apply_binary(&mut self, op: BinaryOp, lhs: &Value, rhs: &Value) -> RunResult<Value> {
        match op {
            BinaryOp::Add => self.op_add(lhs, rhs),
            BinaryOp::Sub => self.op_sub(lhs, rhs),
            BinaryOp::Mul => self.op_mul(lhs, rhs),
            BinaryOp::Div | BinaryOp::FloorDiv | BinaryOp::Mod | BinaryOp::Pow => {
                match (as_number(lhs), as_number(rhs)) {
                    (Some(a), Some(b)) => self.numeric_binop(op, a, b),
                    _ => Err(self.binary_fault(op, lhs, rhs)),
                }
            }
            BinaryOp::LShift | BinaryOp::RShift | BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => {
                self.op_bitwise(op, lhs, rhs)
            }
        }
    }

    fn op_add(&mut self, lhs: &Value, rhs: &Value) -> RunResult<Value> {
        if let (Some(a), Some(b)) = (as_number(lhs), as_number(rhs)) {
            return self.numeric_binop(BinaryOp::Add, a, b);
        }
        if let (Some(s1), Some(s2)) = (lhs.as_str(self.heap, self.interns), rhs.as_str(self.heap, self.interns)) {
            let joined = format!("{s1}{s2}");
            return Ok(self.heap.allocate_str(joined));
        }
        if let (Value::Ref(id1), Value::Ref(id2)) = (lhs, rhs) {
            match (self.heap.get(*id1), self.heap.get(*id2)) {
                (HeapData::List(v1), HeapData::List(v2)) => {
                    let mut out = v1.clone();
                    out.extend(v2.iter().cloned());
                    return Ok(Value::Ref(self.heap.allocate(HeapData::List(out))));
                }
                (HeapData::Tuple(v1), HeapData::Tuple(v2)) => {
                    let mut out = v1.clone();
                    out.extend(v2.iter().cloned());
                    return Ok(Value::Ref(self.heap.allocate(HeapData::Tuple(out))));
                }
                _ => {}
            }
        }
        Err(self.binary_fault(BinaryOp::Add, lhs, rhs))
    }

    /// Subtraction; also implements set difference, which shares the `-`
    /// operator.
    fn op_sub(&mut self, lhs: &Value, rhs: &Value) -> RunResult<Value> {
        if let (Some(a), Some(b)) = (as_number(lhs), as_number(rhs)) {
            return self.numeric_binop(BinaryOp::Sub, a, b);
        }
        if let (Some(s1), Some(s2)) = (self.as_set(lhs), self.as_set(rhs)) {
            let diff = s1.difference(s2);
            return Ok(Value::Ref(self.heap.allocate(HeapData::Set(diff))));
        }
        Err(self.binary_fault(BinaryOp::Sub, lhs, rhs))
    }

    fn op_mul(&mut self, lhs: &Value, rhs: &Value) -> RunResult<Value> {
        if let (Some(a), Some(b)) = (as_number(lhs), as_number(rhs)) {
            return self.numeric_binop(BinaryOp::Mul, a, b);
        }
        // Sequence repetition: one side a sequence, the other an int.
        let (seq, count) = if lhs.as_int().is_some() { (rhs, lhs) } else { (lhs, rhs) };
        if let Some(n) = count.as_int() {
            let times = usize::try_from(n).unwrap_or(0);
            if let Some(s) = seq.as_str(self.heap, self.interns) {
                let repeated = s.repeat(times);
                return Ok(self.heap.allocate_str(repeated));
            }
            if let Value::Ref(id) = seq {
                match self.heap.get(*id) {
                    HeapData::List(items) => {
                        let out = repeat_items(items, times);
                        return Ok(Value::Ref(self.heap.allocate(HeapData::List(out))));
                    }
                    HeapData::Tuple(items) => {
                        let out = repeat_items(items, times);
                        return Ok(Value::Ref(self.heap.allocate(HeapData::Tuple(out))));
                    }
                    _ => {}
                }
            }
        }
        Err(self.binary_fault(BinaryOp::Mul, lhs, rhs))
    }

    /// Bitwise and shift operators, plus set algebra and dict union.
    fn op_bitwise(&mut self, op: BinaryOp, lhs: &Value, rhs: &Value) -> RunResult<Value> {
        // bool & bool stays bool, as in Python.
        if let (Value::Bool(a), Value::Bool(b)) = (lhs, rhs) {
            match op {
                BinaryOp::And => return Ok(Value::Bool(a & b)),
                BinaryOp::Or => return Ok(Value::Bool(a | b)),
                BinaryOp::Xor => return Ok(Value::Bool(a ^ b)),
                _ => {}
            }
        }

        if let (Some(i), Some(j)) = (lhs.as_int(), rhs.as_int()) {
            return self.int_binop(op, i, j);
        }

        if let (Some(s1), Some(s2)) = (self.as_set(lhs), self.as_set(rhs)) {
            let result = match op {
                BinaryOp::And => s1.intersection(s2),
                BinaryOp::Or => s1.union(s2),
                BinaryOp::Xor => s1.symmetric_difference(s2),
                _ => return Err(self.binary_fault(op, lhs, rhs)),
            };
            return Ok(Value::Ref(self.heap.allocate(HeapData::Set(result))));
        }

        // dict | dict merges, right side winning on shared keys.
        if op == BinaryOp::Or
            && let (Value::Ref(id1), Value::Ref(id2)) = (lhs, rhs)
            && let (HeapData::Dict(d1), HeapData::Dict(d2)) = (self.heap.get(*id1), self.heap.get(*id2))
        {
            let mut merged = d1.clone();
            for (key, key_value, value) in d2.iter_projected() {
                merged.set(key.clone(), key_value.clone(), value.clone());
            }
            return Ok(Value::Ref(self.heap.allocate(HeapData::Dict(merged))));
        }

        Err(self.binary_fault(op, lhs, rhs))
    }

    fn numeric_binop(&self, op: BinaryOp, a: Num, b: Num) -> RunResult<Value> {
        match (a, b) {
            (Num::Int(i), Num::Int(j)) => self.int_binop(op, i, j),
            (Num::Int(i), Num::Float(g)) => self.float_binop(op, i as f64, g),
            (Num::Float(f), Num::Int(j)) => self.float_binop(op, f, j as f64),
            (Num::Float(f), Num::Float(g)) => self.float_binop(op, f, g),
        }
    }

    fn int_binop(&self, op: BinaryOp, i: i64, j: i64) -> RunResult<Value> {
        let overflow = || self.overflow_fault(op.symbol());
        match op {
            BinaryOp::Add => i.checked_add(j).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Sub => i.checked_sub(j).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Mul => i.checked_mul(j).map(Value::Int).ok_or_else(overflow),
            BinaryOp::Div => {
                if j == 0 {
                    Err(self.fault(FaultKind::ZeroDivision))
                } else {
                    Ok(Value::Float(i as f64 / j as f64))
                }
            }
            BinaryOp::FloorDiv => {
                if j == 0 {
                    Err(self.fault(FaultKind::ZeroDivision))
                } else if i == i64::MIN && j == -1 {
                    Err(overflow())
                } else {
                    Ok(Value::Int(floor_div(i, j)))
                }
            }
            BinaryOp::Mod => {
                if j == 0 {
                    Err(self.fault(FaultKind::ZeroDivision))
                } else {
                    Ok(Value::Int(floor_mod(i, j)))
                }
            }
            BinaryOp::Pow => {
                if j < 0 {
                    // Negative exponents produce floats.
                    Ok(Value::Float((i as f64).powf(j as f64)))
                } else {
                    let exp = u32::try_from(j).map_err(|_| overflow())?;
                    i.checked_pow(exp).map(Value::Int).ok_or_else(overflow)
                }
            }
            BinaryOp::LShift => {
                if j < 0 {
                    return Err(self.type_fault("negative shift count"));
                }
                let shift = u32::try_from(j).ok().filter(|&s| s < 64).ok_or_else(overflow)?;
                let shifted = i << shift;
                // The shift must round-trip or bits were lost.
                if shifted >> shift == i {
                    Ok(Value::Int(shifted))
                } else {
                    Err(overflow())
                }
            }
            BinaryOp::RShift => {
                if j < 0 {
                    return Err(self.type_fault("negative shift count"));
                }
                if j >= 64 {
                    Ok(Value::Int(if i < 0 { -1 } else { 0 }))
                } else {
                    Ok(Value::Int(i >> j))
                }
            }
            BinaryOp::And => Ok(Value::Int(i & j)),
            BinaryOp::Or => Ok(Value::Int(i | j)),
            BinaryOp::Xor => Ok(Value::Int(i ^ j)),
        }
    }

    fn float_binop(&self, op: BinaryOp, f: f64, g: f64) -> RunResult<Value> {
        match op {
            BinaryOp::Add => Ok(Value::Float(f + g)),
            BinaryOp::Sub => Ok(Value::Float(f - g)),
            BinaryOp::Mul => Ok(Value::Float(f * g)),
            BinaryOp::Div => {
                if g == 0.0 {
                    Err(self.fault(FaultKind::ZeroDivision))
                } else {
                    Ok(Value::Float(f / g))
                }
            }
            BinaryOp::FloorDiv => {
                if g == 0.0 {
                    Err(self.fault(FaultKind::ZeroDivision))
                } else {
                    Ok(Value::Float((f / g).floor()))
                }
            }
            BinaryOp::Mod => {
                if g == 0.0 {
                    Err(self.fault(FaultKind::ZeroDivision))
                } else {
                    // Sign follows the divisor, as in Python.
                    Ok(Value::Float(f - g * (f / g).floor()))
                }
            }
            BinaryOp::Pow => Ok(Value::Float(f.powf(g))),
            _ => Err(self.type_fault(format!("unsupported float operand for {}", op.symbol()))),
        }
    }

    fn as_set(&self, value: &Value) -> Option<&Set> {
        match value {
            Value::Ref(id) => match self.heap.get(*id) {
                HeapData::Set(set) => Some(set),
                _ => None,
            },
            _ => None,
        }
    }

    fn binary_fault(&self, op: BinaryOp, lhs: &Value, rhs: &Value) -> Fault {
        self.type_fault(format!(
            "unsupported operand type(s) for {}: '{}' and '{}'",
            op.symbol(),
            lhs.type_name(self.heap),
            rhs.type_name(self.heap)
        ))
    }

    fn overflow_fault(&self, symbol: &str) -> Fault {
        self.fault(FaultKind::Overflow(format!("integer overflow in {symbol}")))
    }
}

/// Repeat a sequence `times` times, as in Python's `list * n` / `tuple * n`.
fn repeat_items(items: &[Value], times: usize) -> Vec<Value> {
    let mut out = Vec::with_capacity(items.len() * times);
    for _ in 0..times {
        out.extend(items.iter().cloned());
    }
    out
}

/// Floor division matching Python: rounds toward negative infinity.
fn floor_div(a: i64, b: i64) -> i64 {
    let q = a / b;
    if a % b != 0 && (a < 0) != (b < 0) { q - 1 } else { q }
}

/// Modulo matching Python: the result has the divisor's sign.
fn floor_mod(a: i64, b: i64) -> i64 {
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) { r + b } else { r }
}
