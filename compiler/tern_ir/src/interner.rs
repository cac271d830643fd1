//! Single-owner string interner.
//!
//! Each [`Ast`](crate::Ast) owns one interner; compilations never share
//! names, so no locking is involved.

use rustc_hash::FxHashMap;

use crate::Name;

pub struct StringInterner {
    map: FxHashMap<Box<str>, Name>,
    strings: Vec<Box<str>>,
}

impl StringInterner {
    pub fn new() -> Self {
        let mut interner = StringInterner {
            map: FxHashMap::default(),
            strings: Vec::with_capacity(64),
        };
        interner.intern("");
        interner
    }

    /// Intern `s`, returning the existing name if it was seen before.
    ///
    /// # Panics
    /// Panics after `u32::MAX` distinct strings.
    pub fn intern(&mut self, s: &str) -> Name {
        if let Some(&name) = self.map.get(s) {
            return name;
        }
        let index = u32::try_from(self.strings.len())
            .unwrap_or_else(|_| panic!("string interner exceeded u32::MAX entries"));
        let name = Name::from_index(index);
        let owned: Box<str> = s.into();
        self.strings.push(owned.clone());
        self.map.insert(owned, name);
        name
    }

    /// Find a name without interning.
    pub fn get(&self, s: &str) -> Option<Name> {
        self.map.get(s).copied()
    }

    /// Text of an interned name. Names from another interner yield `""`.
    pub fn lookup(&self, name: Name) -> &str {
        self.strings.get(name.index()).map_or("", |s| s)
    }

    pub fn len(&self) -> usize {
        self.strings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

impl Default for StringInterner {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StringInterner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StringInterner")
            .field("len", &self.strings.len())
            .finish_non_exhaustive()
    }
}
