//! Symbol table and scope tree built by the parser and walked again by
//! every later phase.
//!
//! Symbols live in one flat arena (`SymbolTable`) instead of being owned by
//! the scope that declared them, so a [`Ref`] stays valid no matter how
//! scopes are cloned or re-walked — the same arena-of-handles discipline
//! the interner and struct registry use.

use indexmap::IndexMap;

use crate::intern::StringId;
use crate::span::TextSize;

/// Handle into a [`SymbolTable`]. An identifier reference that failed to
/// resolve carries no `Ref` at all (`Option<Ref>` on the AST node) rather
/// than a sentinel value, so "unresolved" can't be mistaken for symbol 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ref(u32);

impl Ref {
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// What kind of declaration a symbol came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Const,
    Override,
    Var,
    Let,
    Function,
    Parameter,
    Struct,
    Alias,
    StructMember,
}

/// Handle into a [`Scope`] tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

impl ScopeId {
    /// The module (root) scope is always allocated first.
    pub const MODULE: Self = Self(0);

    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A single declaration, independent of where in the scope tree it lives.
#[derive(Debug, Clone)]
pub struct Symbol {
    pub original_name: StringId,
    pub kind: SymbolKind,
    pub declared_at: TextSize,
    pub use_count: u32,
    pub is_entry_point: bool,
    pub must_not_be_renamed: bool,
    pub is_external_binding: bool,
    pub is_live: bool,
    /// Filled in by the renamer; `None` until then, and forever `None` for
    /// symbols that keep their `original_name`.
    pub renamed: Option<StringId>,
}

impl Symbol {
    #[must_use]
    pub fn new(original_name: StringId, kind: SymbolKind, declared_at: TextSize) -> Self {
        Self {
            original_name,
            kind,
            declared_at,
            use_count: 0,
            is_entry_point: false,
            must_not_be_renamed: false,
            is_external_binding: false,
            is_live: false,
            renamed: None,
        }
    }

    #[must_use]
    pub fn can_be_renamed(&self) -> bool {
        !self.must_not_be_renamed
    }
}

/// One scope in the tree: module scope, a function body, a compound
/// statement, or a `for` loop's own scope.
///
/// `members` preserves insertion order (an [`IndexMap`]) so pass 2 can
/// re-traverse declarations in exactly the order pass 1 saw them, which
/// the text-order scoping rule depends on for non-module scopes.
#[derive(Debug)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    pub is_module_scope: bool,
    members: IndexMap<StringId, Ref>,
    pub children: Vec<ScopeId>,
}

impl Scope {
    fn new(parent: Option<ScopeId>, is_module_scope: bool) -> Self {
        Self { parent, is_module_scope, members: IndexMap::new(), children: Vec::new() }
    }

    pub fn declare(&mut self, name: StringId, sym: Ref) {
        self.members.insert(name, sym);
    }

    #[must_use]
    pub fn lookup_local(&self, name: StringId) -> Option<Ref> {
        self.members.get(&name).copied()
    }

    /// Iterates members in declaration order, alongside the declaration
    /// offset recorded on their `Symbol` — callers needing text-order
    /// filtering look that up via the symbol table.
    pub fn members(&self) -> impl Iterator<Item = (StringId, Ref)> + '_ {
        self.members.iter().map(|(&name, &r)| (name, r))
    }
}

/// Owns every symbol and every scope for one compilation unit.
#[derive(Debug)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    scopes: Vec<Scope>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        let module_scope = Scope::new(None, true);
        Self { symbols: Vec::new(), scopes: vec![module_scope] }
    }
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc_symbol(&mut self, symbol: Symbol) -> Ref {
        let id = Ref(u32::try_from(self.symbols.len()).expect("fewer than u32::MAX symbols"));
        self.symbols.push(symbol);
        id
    }

    pub fn push_scope(&mut self, parent: ScopeId, is_module_scope: bool) -> ScopeId {
        let id = ScopeId(u32::try_from(self.scopes.len()).expect("fewer than u32::MAX scopes"));
        self.scopes.push(Scope::new(Some(parent), is_module_scope));
        self.scopes[parent.index()].children.push(id);
        id
    }

    #[must_use]
    pub fn symbol(&self, r: Ref) -> &Symbol {
        &self.symbols[r.index()]
    }

    pub fn symbol_mut(&mut self, r: Ref) -> &mut Symbol {
        &mut self.symbols[r.index()]
    }

    #[must_use]
    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    #[must_use]
    pub fn symbols(&self) -> &[Symbol] {
        &self.symbols
    }

    pub fn symbols_mut(&mut self) -> &mut [Symbol] {
        &mut self.symbols
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Looks up `name` from `scope` outward, honoring the text-order rule:
    /// a non-module scope only sees a declaration whose offset precedes
    /// `before_offset`. Module scope has no such restriction, so top-level
    /// declarations may forward-reference each other.
    #[must_use]
    pub fn resolve(&self, scope: ScopeId, name: StringId, before_offset: TextSize) -> Option<Ref> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let s = self.scope(id);
            if let Some(r) = s.lookup_local(name) {
                let visible = s.is_module_scope || self.symbol(r).declared_at < before_offset;
                if visible {
                    return Some(r);
                }
            }
            current = s.parent;
        }
        None
    }

    pub fn record_use(&mut self, r: Ref) {
        self.symbols[r.index()].use_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn module_scope_allows_forward_reference() {
        let mut table = SymbolTable::new();
        let name = StringId::default();
        let sym = table.alloc_symbol(Symbol::new(name, SymbolKind::Function, TextSize::from(100)));
        table.scope_mut(ScopeId::MODULE).declare(name, sym);
        let found = table.resolve(ScopeId::MODULE, name, TextSize::from(0));
        assert_eq!(found, Some(sym));
    }

    #[test]
    fn block_scope_hides_later_declarations() {
        let mut table = SymbolTable::new();
        let block = table.push_scope(ScopeId::MODULE, false);
        let name = StringId::default();
        let sym = table.alloc_symbol(Symbol::new(name, SymbolKind::Let, TextSize::from(50)));
        table.scope_mut(block).declare(name, sym);
        assert_eq!(table.resolve(block, name, TextSize::from(10)), None);
        assert_eq!(table.resolve(block, name, TextSize::from(60)), Some(sym));
    }

    #[test]
    fn lookup_walks_up_to_parent_scope() {
        let mut table = SymbolTable::new();
        let name = StringId::default();
        let sym = table.alloc_symbol(Symbol::new(name, SymbolKind::Let, TextSize::from(0)));
        table.scope_mut(ScopeId::MODULE).declare(name, sym);
        let child = table.push_scope(ScopeId::MODULE, false);
        assert_eq!(table.resolve(child, name, TextSize::from(1000)), Some(sym));
    }
}
