//! String interning.
//!
//! Names and string literals are interned once by the front end; everything
//! downstream compares [`Name`] handles, never text.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::fast_map::{FastHashMap, fast_hash_map_with_capacity};

/// Interned string handle. Equality is handle equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Name(u32);

impl Name {
    #[inline]
    pub const fn index(self) -> u32 {
        self.0
    }

    pub(crate) const fn from_index(index: u32) -> Self {
        Self(index)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Default)]
pub struct Interner {
    ids: FastHashMap<Box<str>, Name>,
    strings: Vec<Box<str>>,
}

impl Interner {
    pub fn new() -> Self {
        Self {
            ids: fast_hash_map_with_capacity(64),
            strings: Vec::with_capacity(64),
        }
    }

    pub fn intern(&mut self, text: &str) -> Name {
        if let Some(&name) = self.ids.get(text) {
            return name;
        }
        let name = Name(self.strings.len() as u32);
        let boxed: Box<str> = text.into();
        self.strings.push(boxed.clone());
        self.ids.insert(boxed, name);
        name
    }

    /// Look up without interning.
    pub fn get(&self, text: &str) -> Option<Name> {
        self.ids.get(text).copied()
    }

    pub fn resolve(&self, name: Name) -> &str {
        self.strings.get(name.0 as usize).map_or("<?>", |s| &**s)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}
