//! String interning for identifiers encountered while lexing and parsing.
//!
//! Interning avoids cloning identifier text into every AST/symbol-table
//! node; instead nodes carry a small [`StringId`] and look the text up in
//! the shared [`Interner`] only when producing diagnostics or output.

use ahash::AHashMap;

/// Index into the string interner's backing storage.
///
/// `u32` keeps this small enough to live inline on AST nodes; WGSL sources
/// are not going to contain four billion distinct identifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StringId(u32);

impl StringId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Owns every distinct identifier string seen during lexing.
///
/// Built incrementally during the lexer/parser pass, then kept immutable for
/// the rest of the compilation (printer, reflection, diagnostics all read it
/// but never insert new strings).
#[derive(Debug, Default)]
pub struct Interner {
    strings: Vec<Box<str>>,
    lookup: AHashMap<Box<str>, StringId>,
}

impl Interner {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Interns `text`, returning the existing id if it was seen before.
    pub fn intern(&mut self, text: &str) -> StringId {
        if let Some(&id) = self.lookup.get(text) {
            return id;
        }
        let id = StringId(self.strings.len() as u32);
        let boxed: Box<str> = Box::from(text);
        self.strings.push(boxed.clone());
        self.lookup.insert(boxed, id);
        id
    }

    /// Resolves an id back to its text.
    ///
    /// # Panics
    /// Panics if `id` was not produced by this interner — an internal
    /// consistency bug, never a user-triggerable condition.
    #[must_use]
    pub fn resolve(&self, id: StringId) -> &str {
        &self.strings[id.index()]
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_idempotent() {
        let mut interner = Interner::new();
        let a = interner.intern("foo");
        let b = interner.intern("bar");
        let c = interner.intern("foo");
        assert_eq!(a, c);
        assert_ne!(a, b);
        assert_eq!(interner.resolve(a), "foo");
        assert_eq!(interner.resolve(b), "bar");
    }
}
