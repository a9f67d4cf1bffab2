//! Container and auxiliary runtime types stored on the heap.

pub(crate) mod dict;
pub(crate) mod iter;
pub(crate) mod set;
pub(crate) mod slice;

pub(crate) use dict::{Dict, DictKey};
pub(crate) use iter::IterState;
pub(crate) use set::Set;
pub(crate) use slice::Slice;
