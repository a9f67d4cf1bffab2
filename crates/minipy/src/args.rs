//! Call-argument carriers.
//!
//! Most calls pass zero, one, or two positional arguments; the dedicated
//! variants avoid a `Vec` allocation for those shapes. Keyword arguments
//! carry their names as interned ids, matching how call instructions
//! encode them.

use std::vec::IntoIter;

use crate::{intern::StringId, value::Value};

/// Arguments for one call.
#[derive(Debug)]
pub(crate) enum ArgValues {
    Empty,
    One(Value),
    Two(Value, Value),
    ArgsKwargs {
        args: Vec<Value>,
        kwargs: Vec<(StringId, Value)>,
    },
}

impl ArgValues {
    /// Builds the most compact variant for the given arguments.
    pub fn new(mut args: Vec<Value>, kwargs: Vec<(StringId, Value)>) -> Self {
        if !kwargs.is_empty() {
            return Self::ArgsKwargs { args, kwargs };
        }
        match args.len() {
            0 => Self::Empty,
            1 => Self::One(args.pop().expect("length checked")),
            2 => {
                let second = args.pop().expect("length checked");
                let first = args.pop().expect("length checked");
                Self::Two(first, second)
            }
            _ => Self::ArgsKwargs { args, kwargs },
        }
    }

    /// Splits into a positional iterator and the keyword pairs without
    /// allocating for the common small shapes.
    pub fn into_parts(self) -> (ArgPosIter, Vec<(StringId, Value)>) {
        match self {
            Self::Empty => (ArgPosIter::Empty, Vec::new()),
            Self::One(v) => (ArgPosIter::One(Some(v)), Vec::new()),
            Self::Two(v1, v2) => (ArgPosIter::Two(Some(v1), Some(v2)), Vec::new()),
            Self::ArgsKwargs { args, kwargs } => (ArgPosIter::Vec(args.into_iter()), kwargs),
        }
    }
}

/// Iterator over positional arguments by ownership transfer.
pub(crate) enum ArgPosIter {
    Empty,
    One(Option<Value>),
    Two(Option<Value>, Option<Value>),
    Vec(IntoIter<Value>),
}

impl Iterator for ArgPosIter {
    type Item = Value;

    #[inline]
    fn next(&mut self) -> Option<Value> {
        match self {
            Self::Empty => None,
            Self::One(v) => v.take(),
            Self::Two(v1, v2) => v1.take().or_else(|| v2.take()),
            Self::Vec(iter) => iter.next(),
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = match self {
            Self::Empty => 0,
            Self::One(v) => usize::from(v.is_some()),
            Self::Two(v1, v2) => usize::from(v1.is_some()) + usize::from(v2.is_some()),
            Self::Vec(iter) => iter.len(),
        };
        (n, Some(n))
    }
}

impl ExactSizeIterator for ArgPosIter {}
