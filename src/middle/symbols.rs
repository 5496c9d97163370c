//! Symbols and lexical scopes.
//!
//! Symbols live in an arena ([`SymbolTable`]) and are referenced everywhere
//! by [`SymbolId`], so a symbol outlives the scope table that bound its name.
//! The [`ScopeStack`] owns only the name → id bindings; popping a scope
//! releases the bindings while the symbols stay reachable through the
//! resolver's side tables.

use hashbrown::HashMap;

use crate::{
    index::{IndexVec, simple_index},
    middle::ty::Type,
};

simple_index! {
    /// Identifies one [`Symbol`] within a [`SymbolTable`]
    pub struct SymbolId;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolKind {
    /// A variable on the current stack frame, addressed as
    /// `frame base - offset`
    Local { offset: usize },
    /// An incoming function argument, addressed by its 0-based position
    Param { index: usize },
    /// A module-level name addressed by its bare label
    Global,
}

#[derive(Debug, Clone)]
pub struct Symbol {
    pub kind: SymbolKind,
    pub name: String,
    pub ty: Type,
    /// Function symbols only: total frame reservation (locals + parameter
    /// words, rounded up to a multiple of 16)
    pub frame_size: Option<usize>,
}

impl Symbol {
    pub fn new(kind: SymbolKind, name: impl Into<String>, ty: Type) -> Self {
        Self {
            kind,
            name: name.into(),
            ty,
            frame_size: None,
        }
    }

    pub fn is_global(&self) -> bool {
        matches!(self.kind, SymbolKind::Global)
    }
}

/// Arena of every symbol created during resolution
#[derive(Debug, Default)]
pub struct SymbolTable {
    symbols: IndexVec<SymbolId, Symbol>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: Symbol) -> SymbolId {
        self.symbols.push(symbol)
    }

    pub fn get(&self, id: SymbolId) -> &Symbol {
        &self.symbols[id]
    }

    pub fn get_mut(&mut self, id: SymbolId) -> &mut Symbol {
        &mut self.symbols[id]
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Symbol> {
        self.symbols.iter()
    }
}

/// One lexical region's name bindings
#[derive(Debug, Default)]
struct ScopeTable {
    bindings: HashMap<String, SymbolId>,
}

/// An ordered list of scope tables; index 0 is the global scope, the back is
/// the innermost. Push and pop must stay balanced on every exit path,
/// including error paths.
#[derive(Debug)]
pub struct ScopeStack {
    scopes: Vec<ScopeTable>,
}

impl ScopeStack {
    /// Creates a stack holding only the global scope
    pub fn new() -> Self {
        Self {
            scopes: vec![ScopeTable::default()],
        }
    }

    /// Number of open scopes; 1 means only the global scope is open
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_global(&self) -> bool {
        self.depth() == 1
    }

    /// Pushes a new empty scope table
    pub fn enter_scope(&mut self) {
        self.scopes.push(ScopeTable::default());
    }

    /// Pops and releases the innermost scope table and its bindings
    pub fn exit_scope(&mut self) {
        assert!(
            self.depth() > 1,
            "attempted to pop the global scope from the stack"
        );

        self.scopes.pop();
    }

    /// Binds a name in the innermost scope
    pub fn bind(&mut self, name: impl Into<String>, symbol: SymbolId) {
        self.scopes
            .last_mut()
            .expect("scope stack always holds the global scope")
            .bindings
            .insert(name.into(), symbol);
    }

    /// Searches innermost to outermost and returns the nearest binding
    pub fn lookup(&self, name: &str) -> Option<SymbolId> {
        for scope in self.scopes.iter().rev() {
            if let Some(&id) = scope.bindings.get(name) {
                return Some(id);
            }
        }

        None
    }

    /// Searches only the innermost scope; used to detect redeclarations
    pub fn lookup_current(&self, name: &str) -> Option<SymbolId> {
        self.scopes
            .last()
            .expect("scope stack always holds the global scope")
            .bindings
            .get(name)
            .copied()
    }
}

impl Default for ScopeStack {
    fn default() -> Self {
        Self::new()
    }
}
