//! Name scopes for execution.
//!
//! All scope maps are owned centrally by [`Scopes`] and addressed through
//! [`LocalsId`] indices, so sharing builtins/globals across nested frames
//! needs no interior mutability: scope kind is known per instruction, and
//! only one map is touched at a time.
//!
//! Slot 0 of the locals stack is the globals map — the module frame's
//! locals *are* the globals, so module-level stores and global stores
//! land in the same map. Function frames get their own slot; slots are
//! recycled after their frame returns.

use ahash::AHashMap;

use crate::{intern::StringId, value::Value};

/// A single name → value map.
pub(crate) type NameMap = AHashMap<StringId, Value>;

/// Index of a locals map in [`Scopes`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct LocalsId(u32);

impl LocalsId {
    /// The globals map, which doubles as the module frame's locals.
    pub const GLOBALS: Self = Self(0);

    fn index(self) -> usize {
        self.0 as usize
    }
}

/// Central storage for all name scopes of one run.
#[derive(Debug)]
pub(crate) struct Scopes {
    /// Read-only shared scope consulted last during name resolution.
    builtins: NameMap,
    /// Locals maps; index 0 is the globals map.
    stack: Vec<NameMap>,
    /// Freed slots available for reuse by future frames.
    reuse_ids: Vec<LocalsId>,
}

impl Scopes {
    pub fn new(builtins: NameMap) -> Self {
        Self {
            builtins,
            stack: vec![NameMap::new()],
            reuse_ids: Vec::new(),
        }
    }

    /// Resolves a name in locals → globals → builtins order.
    pub fn lookup(&self, locals: LocalsId, name: StringId) -> Option<Value> {
        self.stack[locals.index()]
            .get(&name)
            .or_else(|| self.stack[LocalsId::GLOBALS.index()].get(&name))
            .or_else(|| self.builtins.get(&name))
            .cloned()
    }

    /// Resolves a name in globals → builtins order, skipping locals.
    pub fn lookup_global(&self, name: StringId) -> Option<Value> {
        self.stack[LocalsId::GLOBALS.index()]
            .get(&name)
            .or_else(|| self.builtins.get(&name))
            .cloned()
    }

    /// Binds a name in the given locals scope.
    pub fn store(&mut self, locals: LocalsId, name: StringId, value: Value) {
        self.stack[locals.index()].insert(name, value);
    }

    /// Binds a name in the globals scope.
    pub fn store_global(&mut self, name: StringId, value: Value) {
        self.stack[LocalsId::GLOBALS.index()].insert(name, value);
    }

    /// The locals map itself, used for closure snapshots.
    pub fn locals(&self, locals: LocalsId) -> &NameMap {
        &self.stack[locals.index()]
    }

    /// Registers a pre-bound locals map for a new frame, reusing a freed
    /// slot when one is available.
    pub fn push_locals(&mut self, locals: NameMap) -> LocalsId {
        if let Some(id) = self.reuse_ids.pop() {
            self.stack[id.index()] = locals;
            id
        } else {
            let id = LocalsId(u32::try_from(self.stack.len()).expect("locals stack overflow"));
            self.stack.push(locals);
            id
        }
    }

    /// Releases a frame's locals after it returns.
    ///
    /// # Panics
    /// Panics when asked to release the globals slot; the module frame's
    /// locals live for the whole run.
    pub fn release(&mut self, locals: LocalsId) {
        assert_ne!(locals, LocalsId::GLOBALS, "cannot release the globals scope");
        self.stack[locals.index()] = NameMap::new();
        self.reuse_ids.push(locals);
    }
}
