//! Function signature representation and argument binding.
//!
//! A signature covers every parameter kind of the Python calling
//! convention: positional-only (before `/`), positional-or-keyword,
//! variadic positional (`*args`), keyword-only (after `*`), and variadic
//! keyword (`**kwargs`). Default values are evaluated at function
//! definition time and stored on the closure; [`Signature::bind`] takes
//! them alongside the call's arguments.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{
    args::ArgValues,
    fault::BindError,
    heap::{Heap, HeapData},
    intern::{Interns, StringId},
    types::{Dict, DictKey},
    value::Value,
};

/// The declared parameter shape of a callable.
///
/// The name groups are pairwise disjoint; the variadic names (when
/// present) are disjoint from all others. Constructed once per function
/// template and immutable afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Signature {
    /// Parameters before `/`; can only be passed by position.
    pos_only: Vec<StringId>,
    /// Regular parameters; passed by position or by keyword.
    pos_or_kw: Vec<StringId>,
    /// `*args` name, collecting excess positional arguments.
    var_args: Option<StringId>,
    /// Parameters after `*`; can only be passed by keyword.
    kw_only: Vec<StringId>,
    /// `**kwargs` name, collecting excess keyword arguments.
    var_kwargs: Option<StringId>,
}

/// The completed name → value mapping for one call, in declaration order:
/// positional-only, positional-or-keyword, `*args`, keyword-only,
/// `**kwargs`.
#[derive(Debug, Default)]
pub(crate) struct BoundArgs(IndexMap<StringId, Value>);

impl BoundArgs {
    pub fn get(&self, name: StringId) -> Option<&Value> {
        self.0.get(&name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl IntoIterator for BoundArgs {
    type Item = (StringId, Value);
    type IntoIter = indexmap::map::IntoIter<StringId, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl Signature {
    /// Creates a signature with all parameter groups.
    ///
    /// # Panics
    /// Debug builds panic when the name groups are not pairwise disjoint.
    pub fn new(
        pos_only: Vec<StringId>,
        pos_or_kw: Vec<StringId>,
        var_args: Option<StringId>,
        kw_only: Vec<StringId>,
        var_kwargs: Option<StringId>,
    ) -> Self {
        let sig = Self {
            pos_only,
            pos_or_kw,
            var_args,
            kw_only,
            var_kwargs,
        };
        debug_assert!(sig.names_disjoint(), "signature parameter names must be disjoint");
        sig
    }

    /// A signature of plain positional-or-keyword parameters.
    pub fn positional(names: Vec<StringId>) -> Self {
        Self::new(Vec::new(), names, None, Vec::new(), None)
    }

    /// Number of parameters fillable by position.
    fn positional_slot_count(&self) -> usize {
        self.pos_only.len() + self.pos_or_kw.len()
    }

    /// Number of named parameters (excluding the variadic slots).
    fn named_count(&self) -> usize {
        self.positional_slot_count() + self.kw_only.len()
    }

    fn names_disjoint(&self) -> bool {
        let mut seen: Vec<StringId> = Vec::new();
        let all = self
            .pos_only
            .iter()
            .chain(&self.pos_or_kw)
            .chain(self.var_args.iter())
            .chain(&self.kw_only)
            .chain(self.var_kwargs.iter());
        for &name in all {
            if seen.contains(&name) {
                return false;
            }
            seen.push(name);
        }
        true
    }

    /// Binds a call's arguments to this shape.
    ///
    /// The algorithm:
    /// 1. assign positional arguments to positional-only then
    ///    positional-or-keyword parameters, left to right; the remainder
    ///    goes to `*args` or fails with `TooManyPositionalArguments`;
    /// 2. resolve each keyword argument against positional-or-keyword and
    ///    keyword-only names, failing with `MultipleValuesForArgument` on
    ///    a slot that is already filled; unknown names go to `**kwargs`
    ///    or fail with `TooManyKeywordArguments`; a positional-only name
    ///    goes to `**kwargs` when declared, and fails with
    ///    `PositionalOnlyPassedAsKeyword` otherwise;
    /// 3. fill positional defaults right-aligned on the trailing
    ///    positional-or-keyword parameters;
    /// 4. fill keyword-only defaults by name;
    /// 5. verify completeness (`MissingPositionalArguments` /
    ///    `MissingKeywordOnlyArguments`).
    ///
    /// When declared, the `*args` entry is always present as a (possibly
    /// empty) tuple and the `**kwargs` entry as a (possibly empty) dict.
    ///
    /// `defaults` aligns to the trailing positional-or-keyword
    /// parameters; `kw_defaults` maps keyword-only names to defaults.
    pub(crate) fn bind(
        &self,
        mut args: ArgValues,
        defaults: &[Value],
        kw_defaults: &[(StringId, Value)],
        heap: &mut Heap,
        interns: &Interns,
        func_name: &str,
    ) -> Result<BoundArgs, BindError> {
        debug_assert!(defaults.len() <= self.pos_or_kw.len());

        let positional_slots = self.positional_slot_count();

        // Fast path for plain `def f(a, b)` shapes called with exactly
        // matching positional arguments.
        if self.is_simple() && defaults.is_empty() {
            match args {
                ArgValues::One(v) if positional_slots == 1 => {
                    let mut bound = IndexMap::with_capacity(1);
                    bound.insert(self.pos_or_kw[0], v);
                    return Ok(BoundArgs(bound));
                }
                ArgValues::Two(v1, v2) if positional_slots == 2 => {
                    let mut bound = IndexMap::with_capacity(2);
                    bound.insert(self.pos_or_kw[0], v1);
                    bound.insert(self.pos_or_kw[1], v2);
                    return Ok(BoundArgs(bound));
                }
                other => args = other,
            }
        }

        let (mut pos_iter, keyword_args) = args.into_parts();

        // 1. Positional assignment, with the excess check up front.
        if self.var_args.is_none() && pos_iter.len() > positional_slots {
            return Err(BindError::too_many_positional(func_name, positional_slots, pos_iter.len()));
        }

        let mut slots: Vec<Option<Value>> = vec![None; self.named_count()];
        for slot in slots.iter_mut().take(positional_slots) {
            match pos_iter.next() {
                Some(value) => *slot = Some(value),
                None => break,
            }
        }
        let extra_positional: Vec<Value> = pos_iter.collect();

        // 2. Keyword resolution.
        let mut excess_kwargs = self.var_kwargs.map(|_| Dict::new());
        for (name, value) in keyword_args {
            if self.pos_only.contains(&name) {
                match &mut excess_kwargs {
                    Some(dict) => {
                        collect_keyword(dict, name, value, interns);
                    }
                    None => {
                        return Err(BindError::positional_only_as_keyword(
                            func_name,
                            interns.get_str(name),
                        ));
                    }
                }
            } else if let Some(i) = self.pos_or_kw.iter().position(|&p| p == name) {
                let slot = &mut slots[self.pos_only.len() + i];
                if slot.is_some() {
                    return Err(BindError::multiple_values(func_name, interns.get_str(name)));
                }
                *slot = Some(value);
            } else if let Some(i) = self.kw_only.iter().position(|&p| p == name) {
                let slot = &mut slots[positional_slots + i];
                if slot.is_some() {
                    return Err(BindError::multiple_values(func_name, interns.get_str(name)));
                }
                *slot = Some(value);
            } else {
                match &mut excess_kwargs {
                    Some(dict) => {
                        collect_keyword(dict, name, value, interns);
                    }
                    None => {
                        return Err(BindError::unexpected_keyword(func_name, interns.get_str(name)));
                    }
                }
            }
        }

        // 3. Positional defaults, right-aligned on pos_or_kw. Extra
        // leading defaults (malformed code units) are ignored rather
        // than panicking.
        let skip = defaults.len().saturating_sub(self.pos_or_kw.len());
        let first_default = self.pos_or_kw.len() - (defaults.len() - skip);
        for (offset, default) in defaults[skip..].iter().enumerate() {
            let slot = &mut slots[self.pos_only.len() + first_default + offset];
            if slot.is_none() {
                *slot = Some(default.clone());
            }
        }

        // 4. Keyword-only defaults, by name.
        for (name, default) in kw_defaults {
            if let Some(i) = self.kw_only.iter().position(|p| p == name) {
                let slot = &mut slots[positional_slots + i];
                if slot.is_none() {
                    *slot = Some(default.clone());
                }
            }
        }

        // 5. Completeness.
        let missing_positional: SmallVec<[&str; 4]> = self
            .pos_only
            .iter()
            .chain(&self.pos_or_kw)
            .zip(&slots)
            .filter(|(_, slot)| slot.is_none())
            .map(|(&name, _)| interns.get_str(name))
            .collect();
        if !missing_positional.is_empty() {
            return Err(BindError::missing_positional(func_name, &missing_positional));
        }

        let missing_kwonly: SmallVec<[&str; 4]> = self
            .kw_only
            .iter()
            .zip(&slots[positional_slots..])
            .filter(|(_, slot)| slot.is_none())
            .map(|(&name, _)| interns.get_str(name))
            .collect();
        if !missing_kwonly.is_empty() {
            return Err(BindError::missing_kwonly(func_name, &missing_kwonly));
        }

        // Assemble in declaration order.
        let mut bound = IndexMap::with_capacity(self.named_count() + 2);
        let mut slot_iter = slots.into_iter();
        for &name in self.pos_only.iter().chain(&self.pos_or_kw) {
            bound.insert(name, slot_iter.next().flatten().expect("positional slot checked"));
        }
        if let Some(var_args) = self.var_args {
            let tuple = heap.allocate(HeapData::Tuple(extra_positional));
            bound.insert(var_args, Value::Ref(tuple));
        }
        for &name in &self.kw_only {
            bound.insert(name, slot_iter.next().flatten().expect("keyword-only slot checked"));
        }
        if let Some(var_kwargs) = self.var_kwargs {
            let dict = heap.allocate(HeapData::Dict(excess_kwargs.unwrap_or_default()));
            bound.insert(var_kwargs, Value::Ref(dict));
        }

        Ok(BoundArgs(bound))
    }

    /// Whether this is a plain positional-or-keyword shape with no
    /// variadic slots, eligible for the fast path.
    fn is_simple(&self) -> bool {
        self.pos_only.is_empty() && self.var_args.is_none() && self.kw_only.is_empty() && self.var_kwargs.is_none()
    }
}

/// Stores a keyword argument into the excess-kwargs dict.
fn collect_keyword(dict: &mut Dict, name: StringId, value: Value, interns: &Interns) {
    let key = DictKey::from_name(interns.get_str(name));
    dict.set(key, Value::InternString(name), value);
}
