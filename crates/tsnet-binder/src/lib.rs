//! Name binder for tsnet.
//!
//! Builds the symbol table of a parsed `Program` and maps every identifier
//! expression to the symbol it refers to.

pub mod state;
pub mod symbols;

pub use state::{BinderState, BoundProgram};
pub use symbols::{Symbol, SymbolArena, SymbolId, SymbolTable, symbol_flags};
