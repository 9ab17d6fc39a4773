//! Parser and AST for the TypeScript declaration subset consumed by tsnet.
//!
//! - `scanner`: eager tokenizer
//! - `node` / `arena`: closed `NodeKind` sum type stored in a per-file `NodeArena`
//! - `parser`: recursive-descent `ParserState`
//! - `program`: `Program` of `SourceFile`s addressed by `FileId`

pub mod arena;
pub mod node;
pub mod parser;
pub mod program;
pub mod scanner;

pub use arena::NodeArena;
pub use node::{KeywordType, Literal, ModifierFlags, Node, NodeIndex, NodeKind};
pub use parser::ParserState;
pub use program::{FileId, NodeRef, Program, SourceFile};
pub use scanner::{ScannerState, SyntaxKind, Token};
