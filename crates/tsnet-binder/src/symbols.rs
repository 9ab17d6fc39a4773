//! Symbols and the arena that owns them.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tsnet_parser::NodeRef;

/// Symbol flags, combined with bitwise OR.
pub mod symbol_flags {
    pub const NONE: u32 = 0;
    pub const FUNCTION_SCOPED_VARIABLE: u32 = 1 << 0;
    pub const BLOCK_SCOPED_VARIABLE: u32 = 1 << 1;
    pub const PARAMETER: u32 = 1 << 2;
    pub const FUNCTION: u32 = 1 << 3;
    pub const CLASS: u32 = 1 << 4;
    pub const INTERFACE: u32 = 1 << 5;
    pub const TYPE_ALIAS: u32 = 1 << 6;
    pub const ENUM: u32 = 1 << 7;
    pub const ENUM_MEMBER: u32 = 1 << 8;
    pub const TYPE_PARAMETER: u32 = 1 << 9;

    pub const VARIABLE: u32 = FUNCTION_SCOPED_VARIABLE | BLOCK_SCOPED_VARIABLE;
    pub const VALUE: u32 = VARIABLE | PARAMETER | FUNCTION | CLASS | ENUM | ENUM_MEMBER;
    pub const TYPE: u32 = CLASS | INTERFACE | TYPE_ALIAS | ENUM | TYPE_PARAMETER;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymbolId(pub u32);

#[derive(Clone, Debug)]
pub struct Symbol {
    pub flags: u32,
    pub escaped_name: String,
    /// Every declaration merged into this symbol, in binding order.
    pub declarations: SmallVec<[NodeRef; 1]>,
    /// First declaration with a value meaning (class, function, variable, ...).
    pub value_declaration: Option<NodeRef>,
}

impl Symbol {
    #[inline]
    #[must_use]
    pub const fn has_any_flags(&self, flags: u32) -> bool {
        self.flags & flags != 0
    }
}

#[derive(Debug, Default)]
pub struct SymbolArena {
    symbols: Vec<Symbol>,
}

impl SymbolArena {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, flags: u32, escaped_name: String) -> SymbolId {
        let id = SymbolId(self.symbols.len() as u32);
        self.symbols.push(Symbol {
            flags,
            escaped_name,
            declarations: SmallVec::new(),
            value_declaration: None,
        });
        id
    }

    #[inline]
    #[must_use]
    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(id.0 as usize)
    }

    #[inline]
    pub fn get_mut(&mut self, id: SymbolId) -> Option<&mut Symbol> {
        self.symbols.get_mut(id.0 as usize)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Name → symbol map for one scope.
pub type SymbolTable = FxHashMap<String, SymbolId>;
