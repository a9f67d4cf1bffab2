//! Container construction, merging, subscripts, unpacking, and
//! iteration.
//!
//! Merge instructions address their target container below the top of
//! stack (operand `i` = slots below the new top after popping the
//! source), leaving intermediate values untouched.

use super::Vm;
use crate::{
    fault::{Fault, FaultKind, RunResult},
    heap::{HeapData, HeapId},
    tracer::VmTracer,
    types::{Dict, DictKey, IterState, Set, Slice},
    value::{Value, py_repr},
};

impl<Tr: VmTracer> Vm<'_, Tr> {
    // === construction ===

    pub(super) fn build_tuple(&mut self, n: usize) -> RunResult<()> {
        let items = self.popn(n)?;
        let value = Value::Ref(self.heap.allocate(HeapData::Tuple(items)));
        self.push(value);
        Ok(())
    }

    pub(super) fn build_list(&mut self, n: usize) -> RunResult<()> {
        let items = self.popn(n)?;
        let value = Value::Ref(self.heap.allocate(HeapData::List(items)));
        self.push(value);
        Ok(())
    }

    pub(super) fn build_set(&mut self, n: usize) -> RunResult<()> {
        let items = self.popn(n)?;
        let mut set = Set::new();
        for item in items {
            let key = self.project_key(&item)?;
            // First occurrence wins, as in Python.
            if !set.contains(&key) {
                set.add(key, item);
            }
        }
        let value = Value::Ref(self.heap.allocate(HeapData::Set(set)));
        self.push(value);
        Ok(())
    }

    /// Pops `n` key/value pairs; each key was pushed before its value.
    pub(super) fn build_map(&mut self, n: usize) -> RunResult<()> {
        let mut items = self.popn(2 * n)?.into_iter();
        let mut dict = Dict::new();
        while let (Some(key_value), Some(value)) = (items.next(), items.next()) {
            let key = self.project_key(&key_value)?;
            dict.set(key, key_value, value);
        }
        let value = Value::Ref(self.heap.allocate(HeapData::Dict(dict)));
        self.push(value);
        Ok(())
    }

    /// Pops a keys tuple, then `n` values pushed in key order.
    pub(super) fn build_const_key_map(&mut self, n: usize) -> RunResult<()> {
        let keys_value = self.pop()?;
        let keys = match &keys_value {
            Value::Ref(id) => match self.heap.get(*id) {
                HeapData::Tuple(items) => items.clone(),
                _ => {
                    return Err(self.const_key_fault(n));
                }
            },
            _ => return Err(self.const_key_fault(n)),
        };
        if keys.len() != n {
            return Err(self.const_key_fault(n));
        }
        let values = self.popn(n)?;
        let mut dict = Dict::new();
        for (key_value, value) in keys.into_iter().zip(values) {
            let key = self.project_key(&key_value)?;
            dict.set(key, key_value, value);
        }
        let value = Value::Ref(self.heap.allocate(HeapData::Dict(dict)));
        self.push(value);
        Ok(())
    }

    fn const_key_fault(&self, n: usize) -> Fault {
        self.fault(FaultKind::Internal(format!(
            "BuildConstKeyMap expects a tuple of {n} keys on top of the values"
        )))
    }

    pub(super) fn build_string(&mut self, n: usize) -> RunResult<()> {
        let parts = self.popn(n)?;
        let mut out = String::new();
        for part in &parts {
            match part.as_str(self.heap, self.interns) {
                Some(s) => out.push_str(s),
                None => {
                    return Err(self.type_fault(format!(
                        "can only concatenate str segments, not '{}'",
                        part.type_name(self.heap)
                    )));
                }
            }
        }
        let value = self.heap.allocate_str(out);
        self.push(value);
        Ok(())
    }

    pub(super) fn list_to_tuple(&mut self) -> RunResult<()> {
        let value = self.pop()?;
        let items = match &value {
            Value::Ref(id) => match self.heap.get(*id) {
                HeapData::List(items) => items.clone(),
                _ => return Err(self.type_fault("ListToTuple expects a list")),
            },
            _ => return Err(self.type_fault("ListToTuple expects a list")),
        };
        let tuple = Value::Ref(self.heap.allocate(HeapData::Tuple(items)));
        self.push(tuple);
        Ok(())
    }

    pub(super) fn build_slice(&mut self, n: usize) -> RunResult<()> {
        let (start, stop, step) = match n {
            2 => {
                let stop = self.pop()?;
                let start = self.pop()?;
                (start, stop, Value::None)
            }
            3 => {
                let step = self.pop()?;
                let stop = self.pop()?;
                let start = self.pop()?;
                (start, stop, step)
            }
            _ => {
                return Err(self.fault(FaultKind::Internal(format!(
                    "BuildSlice takes 2 or 3 operands, not {n}"
                ))));
            }
        };
        let slice = Slice::new(
            self.slice_bound(&start)?,
            self.slice_bound(&stop)?,
            self.slice_bound(&step)?,
        );
        let value = Value::Ref(self.heap.allocate(HeapData::Slice(slice)));
        self.push(value);
        Ok(())
    }

    fn slice_bound(&self, value: &Value) -> RunResult<Option<i64>> {
        match value {
            Value::None => Ok(None),
            _ => match value.as_int() {
                Some(i) => Ok(Some(i)),
                None => Err(self.type_fault("slice indices must be integers or None")),
            },
        }
    }

    // === merges ===

    /// Resolves the target of a merge instruction: the value `i` slots
    /// below the new top of stack.
    fn merge_target(&mut self, i: usize) -> RunResult<HeapId> {
        let value = self.peek_at_mut(i)?.clone();
        match value.ref_id() {
            Some(id) => Ok(id),
            None => Err(self.type_fault("merge target must be a container")),
        }
    }

    pub(super) fn set_update(&mut self, i: usize) -> RunResult<()> {
        let source = self.pop()?;
        let items = self.iterate(&source)?;
        let mut projected = Vec::with_capacity(items.len());
        for item in items {
            let key = self.project_key(&item)?;
            projected.push((key, item));
        }
        let target = self.merge_target(i)?;
        let HeapData::Set(set) = self.heap.get_mut(target) else {
            return Err(self.type_fault("SetUpdate target must be a set"));
        };
        for (key, item) in projected {
            if !set.contains(&key) {
                set.add(key, item);
            }
        }
        Ok(())
    }

    pub(super) fn set_add(&mut self, i: usize) -> RunResult<()> {
        let item = self.pop()?;
        let key = self.project_key(&item)?;
        let target = self.merge_target(i)?;
        let HeapData::Set(set) = self.heap.get_mut(target) else {
            return Err(self.type_fault("SetAdd target must be a set"));
        };
        if !set.contains(&key) {
            set.add(key, item);
        }
        Ok(())
    }

    /// `DictUpdate` replaces on collision; `DictMerge` (`disjoint`)
    /// faults instead, modeling `**`-unpacking of overlapping dicts.
    pub(super) fn dict_update(&mut self, i: usize, disjoint: bool) -> RunResult<()> {
        let source = self.pop()?;
        let entries = match &source {
            Value::Ref(id) => match self.heap.get(*id) {
                HeapData::Dict(dict) => dict
                    .iter_projected()
                    .map(|(key, key_value, value)| (key.clone(), key_value.clone(), value.clone()))
                    .collect::<Vec<_>>(),
                other => {
                    return Err(self.type_fault(format!("cannot merge '{}' into dict", other.type_name())));
                }
            },
            _ => {
                return Err(self.type_fault(format!(
                    "cannot merge '{}' into dict",
                    source.type_name(self.heap)
                )));
            }
        };
        let target = self.merge_target(i)?;

        if disjoint {
            let HeapData::Dict(existing) = self.heap.get(target) else {
                return Err(self.type_fault("DictMerge target must be a dict"));
            };
            for (key, key_value, _) in &entries {
                if existing.contains(key) {
                    let repr = py_repr(key_value, self.heap, self.interns);
                    return Err(self.fault(FaultKind::KeyCollision(repr)));
                }
            }
        }

        let HeapData::Dict(dict) = self.heap.get_mut(target) else {
            return Err(self.type_fault("DictUpdate target must be a dict"));
        };
        for (key, key_value, value) in entries {
            dict.set(key, key_value, value);
        }
        Ok(())
    }

    pub(super) fn map_add(&mut self, i: usize) -> RunResult<()> {
        let value = self.pop()?;
        let key_value = self.pop()?;
        let key = self.project_key(&key_value)?;
        let target = self.merge_target(i)?;
        let HeapData::Dict(dict) = self.heap.get_mut(target) else {
            return Err(self.type_fault("MapAdd target must be a dict"));
        };
        dict.set(key, key_value, value);
        Ok(())
    }

    // === subscripts ===

    pub(super) fn binary_subscr(&mut self) -> RunResult<()> {
        let key = self.pop()?;
        let container = self.pop()?;
        let result = self.subscr_get(&container, &key)?;
        self.push(result);
        Ok(())
    }

    fn subscr_get(&mut self, container: &Value, key: &Value) -> RunResult<Value> {
        let slice = self.as_slice(key);

        if let Some(s) = container.as_str(self.heap, self.interns) {
            let chars: Vec<char> = s.chars().collect();
            if let Some(slice) = slice {
                let indices = self.resolve_slice(&slice, chars.len())?;
                let out: String = indices.into_iter().map(|i| chars[i]).collect();
                return Ok(self.heap.allocate_str(out));
            }
            let idx = self.sequence_index(key, chars.len(), "string")?;
            return Ok(self.heap.allocate_str(chars[idx].to_string()));
        }

        if let Value::Ref(id) = container {
            match self.heap.get(*id) {
                HeapData::List(items) => {
                    let items = items.clone();
                    if let Some(slice) = slice {
                        let indices = self.resolve_slice(&slice, items.len())?;
                        let out: Vec<Value> = indices.into_iter().map(|i| items[i].clone()).collect();
                        return Ok(Value::Ref(self.heap.allocate(HeapData::List(out))));
                    }
                    let idx = self.sequence_index(key, items.len(), "list")?;
                    return Ok(items[idx].clone());
                }
                HeapData::Tuple(items) => {
                    let items = items.clone();
                    if let Some(slice) = slice {
                        let indices = self.resolve_slice(&slice, items.len())?;
                        let out: Vec<Value> = indices.into_iter().map(|i| items[i].clone()).collect();
                        return Ok(Value::Ref(self.heap.allocate(HeapData::Tuple(out))));
                    }
                    let idx = self.sequence_index(key, items.len(), "tuple")?;
                    return Ok(items[idx].clone());
                }
                HeapData::Dict(dict) => {
                    let projected = self.project_key(key)?;
                    return match dict.get(&projected) {
                        Some(value) => Ok(value.clone()),
                        None => {
                            let repr = py_repr(key, self.heap, self.interns);
                            Err(self.fault(FaultKind::Key(repr)))
                        }
                    };
                }
                _ => {}
            }
        }

        Err(self.type_fault(format!(
            "'{}' object is not subscriptable",
            container.type_name(self.heap)
        )))
    }

    /// `container[key] = value`, with the container pushed first.
    pub(super) fn store_subscr(&mut self) -> RunResult<()> {
        let value = self.pop()?;
        let key = self.pop()?;
        let container = self.pop()?;

        if let Some(id) = container.ref_id() {
            match self.heap.get(id) {
                HeapData::List(items) => {
                    let idx = self.sequence_index(&key, items.len(), "list")?;
                    let HeapData::List(items) = self.heap.get_mut(id) else {
                        unreachable!("heap entry changed type");
                    };
                    items[idx] = value;
                    return Ok(());
                }
                HeapData::Dict(_) => {
                    let projected = self.project_key(&key)?;
                    let HeapData::Dict(dict) = self.heap.get_mut(id) else {
                        unreachable!("heap entry changed type");
                    };
                    dict.set(projected, key, value);
                    return Ok(());
                }
                _ => {}
            }
        }

        Err(self.type_fault(format!(
            "'{}' object does not support item assignment",
            container.type_name(self.heap)
        )))
    }

    pub(super) fn delete_subscr(&mut self) -> RunResult<()> {
        let key = self.pop()?;
        let container = self.pop()?;

        if let Some(id) = container.ref_id() {
            match self.heap.get(id) {
                HeapData::List(items) => {
                    let idx = self.sequence_index(&key, items.len(), "list")?;
                    let HeapData::List(items) = self.heap.get_mut(id) else {
                        unreachable!("heap entry changed type");
                    };
                    items.remove(idx);
                    return Ok(());
                }
                HeapData::Dict(_) => {
                    let projected = self.project_key(&key)?;
                    let HeapData::Dict(dict) = self.heap.get_mut(id) else {
                        unreachable!("heap entry changed type");
                    };
                    if dict.remove(&projected).is_some() {
                        return Ok(());
                    }
                    let repr = py_repr(&key, self.heap, self.interns);
                    return Err(self.fault(FaultKind::Key(repr)));
                }
                _ => {}
            }
        }

        Err(self.type_fault(format!(
            "'{}' object does not support item deletion",
            container.type_name(self.heap)
        )))
    }

    // === unpacking and iteration ===

    pub(super) fn unpack_sequence(&mut self, n: usize) -> RunResult<()> {
        let value = self.pop()?;
        let items = self.iterate(&value)?;
        if items.len() < n {
            return Err(self.type_fault(format!(
                "not enough values to unpack (expected {n}, got {})",
                items.len()
            )));
        }
        if items.len() > n {
            return Err(self.type_fault(format!("too many values to unpack (expected {n})")));
        }
        // Reversed, so the first element ends up on top.
        for item in items.into_iter().rev() {
            self.push(item);
        }
        Ok(())
    }

    pub(super) fn get_iter(&mut self) -> RunResult<()> {
        let value = self.pop()?;
        // Iterators pass through unchanged.
        if let Value::Ref(id) = &value
            && matches!(self.heap.get(*id), HeapData::Iter(_))
        {
            self.push(value);
            return Ok(());
        }
        let items = self.iterate(&value)?;
        let iter = Value::Ref(self.heap.allocate(HeapData::Iter(IterState::new(items))));
        self.push(iter);
        Ok(())
    }

    /// Advances the iterator on top of stack, or pops it and jumps to
    /// `end` when it is exhausted.
    pub(super) fn for_iter(&mut self, end: usize) -> RunResult<()> {
        let id = match self.peek()? {
            Value::Ref(id) => *id,
            other => {
                return Err(self.type_fault(format!(
                    "'{}' object is not an iterator",
                    other.type_name(self.heap)
                )));
            }
        };
        let next = match self.heap.get_mut(id) {
            HeapData::Iter(iter) => iter.next(),
            other => {
                let name = other.type_name();
                return Err(self.type_fault(format!("'{name}' object is not an iterator")));
            }
        };
        match next {
            Some(item) => {
                self.push(item);
                Ok(())
            }
            None => {
                self.pop()?;
                self.jump_to(end)
            }
        }
    }

    /// Materializes a container's elements in iteration order: sequence
    /// elements, string characters, dict keys, set elements. Draining an
    /// iterator consumes it.
    pub(super) fn iterate(&mut self, value: &Value) -> RunResult<Vec<Value>> {
        if let Some(s) = value.as_str(self.heap, self.interns) {
            let chars: Vec<String> = s.chars().map(|c| c.to_string()).collect();
            return Ok(chars.into_iter().map(|c| self.heap.allocate_str(c)).collect());
        }
        if let Value::Ref(id) = value {
            // One-shot: draining an iterator consumes its remaining items.
            if matches!(self.heap.get(*id), HeapData::Iter(_)) {
                let HeapData::Iter(iter) = self.heap.get_mut(*id) else {
                    unreachable!("heap entry changed type");
                };
                let mut items = Vec::new();
                while let Some(item) = iter.next() {
                    items.push(item);
                }
                return Ok(items);
            }
            match self.heap.get(*id) {
                HeapData::List(items) | HeapData::Tuple(items) => return Ok(items.clone()),
                HeapData::Set(set) => return Ok(set.iter().cloned().collect()),
                HeapData::Dict(dict) => return Ok(dict.iter().map(|(key, _)| key.clone()).collect()),
                _ => {}
            }
        }
        Err(self.type_fault(format!(
            "'{}' object is not iterable",
            value.type_name(self.heap)
        )))
    }

    // === key and index helpers ===

    /// Projects a value into a dict/set key, faulting on unhashable
    /// values.
    pub(super) fn project_key(&self, value: &Value) -> RunResult<DictKey> {
        DictKey::from_value(value, self.heap, self.interns).ok_or_else(|| {
            self.type_fault(format!("unhashable type: '{}'", value.type_name(self.heap)))
        })
    }

    /// Resolves a (possibly negative) index against a sequence length.
    fn sequence_index(&self, key: &Value, len: usize, what: &str) -> RunResult<usize> {
        let Some(raw) = key.as_int() else {
            return Err(self.type_fault(format!(
                "{what} indices must be integers, not '{}'",
                key.type_name(self.heap)
            )));
        };
        let adjusted = if raw < 0 { raw + len as i64 } else { raw };
        usize::try_from(adjusted)
            .ok()
            .filter(|&idx| idx < len)
            .ok_or_else(|| self.fault(FaultKind::Index(format!("{what} index out of range"))))
    }

    fn as_slice(&self, value: &Value) -> Option<Slice> {
        match value {
            Value::Ref(id) => match self.heap.get(*id) {
                HeapData::Slice(slice) => Some(*slice),
                _ => None,
            },
            _ => None,
        }
    }

    fn resolve_slice(&self, slice: &Slice, len: usize) -> RunResult<Vec<usize>> {
        slice
            .indices(len)
            .map_err(|_| self.type_fault("slice step cannot be zero"))
    }

    /// Used by `make_function` to read the defaults containers.
    pub(super) fn clone_sequence_items(&self, value: &Value) -> Option<Vec<Value>> {
        match value {
            Value::Ref(id) => match self.heap.get(*id) {
                HeapData::Tuple(items) | HeapData::List(items) => Some(items.clone()),
                _ => None,
            },
            _ => None,
        }
    }

}
