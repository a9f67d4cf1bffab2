//! String interning for identifiers.
//!
//! Instruction operands, parameter names, and keyword-argument names are
//! stored as `StringId` indices into an [`Interns`] table owned by the
//! program. During execution only comparisons are needed; the actual text
//! is looked up for error messages and repr output.

use ahash::AHashMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Index into the string interner's storage.
///
/// Uses `u32` to save space; instructions and signatures store these by
/// value and compare them cheaply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StringId(u32);

impl StringId {
    /// Returns the raw index value.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Interned identifier storage.
///
/// Populated while a program is built, then immutable for the lifetime of
/// the program. Interning the same string twice returns the same id.
#[derive(Debug, Clone, Default)]
pub struct Interns {
    strings: Vec<String>,
    index: AHashMap<String, StringId>,
}

impl Interns {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns a string, returning its id. Idempotent per string.
    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(&id) = self.index.get(s) {
            return id;
        }
        let id = StringId(u32::try_from(self.strings.len()).expect("interner overflow"));
        self.strings.push(s.to_owned());
        self.index.insert(s.to_owned(), id);
        id
    }

    /// Returns the id of an already-interned string, if any.
    #[must_use]
    pub fn lookup(&self, s: &str) -> Option<StringId> {
        self.index.get(s).copied()
    }

    /// Returns the string for an id.
    ///
    /// # Panics
    /// Panics if the id does not belong to this interner. Ids are only
    /// produced by `intern`, so this indicates a mixed-up program.
    #[must_use]
    pub fn get_str(&self, id: StringId) -> &str {
        &self.strings[id.index()]
    }

    /// Number of interned strings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    fn from_strings(strings: Vec<String>) -> Self {
        let index = strings
            .iter()
            .enumerate()
            .map(|(i, s)| (s.clone(), StringId(u32::try_from(i).expect("interner overflow"))))
            .collect();
        Self { strings, index }
    }
}

// The reverse index is rebuilt on deserialization rather than stored, so
// the wire format is just the string table.
impl Serialize for Interns {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.strings.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Interns {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_strings(Vec::<String>::deserialize(deserializer)?))
    }
}
