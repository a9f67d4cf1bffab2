//! The public value interface.
//!
//! [`Object`] is the freely-clonable, heap-independent mirror of runtime
//! values: builtins-scope inputs are `Object`s, and the value produced by
//! a run is exported back to an `Object`. The internal representation
//! (arena ids, interned strings) never crosses the API boundary.

use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

use crate::{
    fault::{Fault, FaultKind},
    heap::{Heap, HeapData},
    intern::Interns,
    types::{Dict, DictKey, Set},
    value::{Value, float_repr, py_repr},
};

/// Depth guard for exporting values; aliased containers can form cycles.
const MAX_EXPORT_DEPTH: usize = 200;

/// A value crossing the interpreter boundary.
///
/// Most variants work both as inputs (builtins scope) and outputs
/// (produced return value). `Repr` is output-only: it stands in for
/// values with no owned mapping, such as closures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Object {
    #[serde(alias = "none", alias = "NoneType")]
    None,
    #[serde(alias = "bool")]
    Bool(bool),
    #[serde(alias = "int")]
    Int(i64),
    #[serde(alias = "float")]
    Float(f64),
    #[serde(alias = "str", alias = "string")]
    String(String),
    #[serde(alias = "list")]
    List(Vec<Object>),
    #[serde(alias = "tuple")]
    Tuple(Vec<Object>),
    #[serde(alias = "set")]
    Set(Vec<Object>),
    /// Insertion-ordered key/value pairs.
    #[serde(alias = "dict")]
    Dict(Vec<(Object, Object)>),
    /// Output-only: the repr of a value that has no owned mapping.
    Repr(String),
}

impl Display for Object {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => f.write_str(&float_repr(*x)),
            Self::String(s) => write!(f, "{s:?}"),
            Self::List(items) => {
                f.write_str("[")?;
                write_joined(f, items)?;
                f.write_str("]")
            }
            Self::Tuple(items) => {
                f.write_str("(")?;
                write_joined(f, items)?;
                if items.len() == 1 {
                    f.write_str(",")?;
                }
                f.write_str(")")
            }
            Self::Set(items) => {
                if items.is_empty() {
                    f.write_str("set()")
                } else {
                    f.write_str("{")?;
                    write_joined(f, items)?;
                    f.write_str("}")
                }
            }
            Self::Dict(pairs) => {
                f.write_str("{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{key}: {value}")?;
                }
                f.write_str("}")
            }
            Self::Repr(s) => f.write_str(s),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Object]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

/// Converts a host-supplied object into a runtime value, allocating
/// containers in the heap.
pub(crate) fn import_object(object: &Object, heap: &mut Heap, interns: &Interns) -> Result<Value, Fault> {
    match object {
        Object::None => Ok(Value::None),
        Object::Bool(b) => Ok(Value::Bool(*b)),
        Object::Int(i) => Ok(Value::Int(*i)),
        Object::Float(x) => Ok(Value::Float(*x)),
        Object::String(s) => Ok(heap.allocate_str(s.clone())),
        Object::List(items) => {
            let values = import_all(items, heap, interns)?;
            Ok(Value::Ref(heap.allocate(HeapData::List(values))))
        }
        Object::Tuple(items) => {
            let values = import_all(items, heap, interns)?;
            Ok(Value::Ref(heap.allocate(HeapData::Tuple(values))))
        }
        Object::Set(items) => {
            let mut set = Set::new();
            for item in items {
                let value = import_object(item, heap, interns)?;
                let key = project_input_key(&value, heap, interns)?;
                if !set.contains(&key) {
                    set.add(key, value);
                }
            }
            Ok(Value::Ref(heap.allocate(HeapData::Set(set))))
        }
        Object::Dict(pairs) => {
            let mut dict = Dict::new();
            for (key_obj, value_obj) in pairs {
                let key_value = import_object(key_obj, heap, interns)?;
                let value = import_object(value_obj, heap, interns)?;
                let key = project_input_key(&key_value, heap, interns)?;
                dict.set(key, key_value, value);
            }
            Ok(Value::Ref(heap.allocate(HeapData::Dict(dict))))
        }
        Object::Repr(_) => Err(Fault::outside(FaultKind::InvalidInput(
            "Object::Repr is output-only and cannot be used as an input".to_owned(),
        ))),
    }
}

fn import_all(items: &[Object], heap: &mut Heap, interns: &Interns) -> Result<Vec<Value>, Fault> {
    items.iter().map(|item| import_object(item, heap, interns)).collect()
}

fn project_input_key(value: &Value, heap: &Heap, interns: &Interns) -> Result<DictKey, Fault> {
    DictKey::from_value(value, heap, interns).ok_or_else(|| {
        Fault::outside(FaultKind::InvalidInput(format!(
            "unhashable key of type '{}' in input container",
            value.type_name(heap)
        )))
    })
}

/// Exports a runtime value as an owned object tree.
pub(crate) fn export_value(
    value: &Value,
    heap: &Heap,
    interns: &Interns,
    depth: usize,
) -> Result<Object, Fault> {
    if depth > MAX_EXPORT_DEPTH {
        return Err(Fault::outside(FaultKind::Internal(
            "value nesting too deep to export (cyclic container?)".to_owned(),
        )));
    }
    match value {
        Value::None => Ok(Object::None),
        Value::Bool(b) => Ok(Object::Bool(*b)),
        Value::Int(i) => Ok(Object::Int(*i)),
        Value::Float(x) => Ok(Object::Float(*x)),
        Value::InternString(id) => Ok(Object::String(interns.get_str(*id).to_owned())),
        Value::Code(_) => Ok(Object::Repr("<code>".to_owned())),
        Value::Ref(id) => match heap.get(*id) {
            HeapData::Str(s) => Ok(Object::String(s.clone())),
            HeapData::List(items) => Ok(Object::List(export_all(items, heap, interns, depth)?)),
            HeapData::Tuple(items) => Ok(Object::Tuple(export_all(items, heap, interns, depth)?)),
            HeapData::Set(set) => {
                let items: Vec<Value> = set.iter().cloned().collect();
                Ok(Object::Set(export_all(&items, heap, interns, depth)?))
            }
            HeapData::Dict(dict) => {
                let mut pairs = Vec::with_capacity(dict.len());
                for (key, val) in dict.iter() {
                    pairs.push((
                        export_value(key, heap, interns, depth + 1)?,
                        export_value(val, heap, interns, depth + 1)?,
                    ));
                }
                Ok(Object::Dict(pairs))
            }
            HeapData::Slice(_) | HeapData::Closure(_) | HeapData::Iter(_) => {
                Ok(Object::Repr(py_repr(value, heap, interns)))
            }
        },
    }
}

fn export_all(items: &[Value], heap: &Heap, interns: &Interns, depth: usize) -> Result<Vec<Object>, Fault> {
    items
        .iter()
        .map(|item| export_value(item, heap, interns, depth + 1))
        .collect()
}
