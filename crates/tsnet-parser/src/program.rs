//! Program - the ordered set of parsed source files of one compilation.

use crate::arena::NodeArena;
use crate::node::{Node, NodeIndex};
use crate::parser::ParserState;
use serde::Serialize;
use tracing::debug;
use tsnet_common::Diagnostic;

/// Index of a source file inside its `Program`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct FileId(pub u32);

/// A node anywhere in the program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeRef {
    pub file: FileId,
    pub node: NodeIndex,
}

impl NodeRef {
    #[inline]
    #[must_use]
    pub const fn new(file: FileId, node: NodeIndex) -> Self {
        Self { file, node }
    }
}

#[derive(Debug)]
pub struct SourceFile {
    pub file_name: String,
    pub arena: NodeArena,
    pub statements: Vec<NodeIndex>,
    /// `.d.ts` files declare ambient (global) types.
    pub is_declaration_file: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl SourceFile {
    /// Parse one file.
    #[must_use]
    pub fn parse(file_name: impl Into<String>, source_text: &str) -> Self {
        let file_name = file_name.into();
        let mut parser = ParserState::new(file_name.clone(), source_text);
        let statements = parser.parse_source_file();
        let (arena, diagnostics) = parser.into_parts();
        let is_declaration_file = file_name.ends_with(".d.ts");
        Self {
            file_name,
            arena,
            statements,
            is_declaration_file,
            diagnostics,
        }
    }

    #[inline]
    #[must_use]
    pub fn node(&self, index: NodeIndex) -> Option<&Node> {
        self.arena.get(index)
    }
}

#[derive(Debug, Default)]
pub struct Program {
    files: Vec<SourceFile>,
}

impl Program {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse all `(file_name, text)` pairs in order.
    #[must_use]
    pub fn from_sources<N, T>(sources: impl IntoIterator<Item = (N, T)>) -> Self
    where
        N: Into<String>,
        T: AsRef<str>,
    {
        let mut program = Self::new();
        for (name, text) in sources {
            program.add_source(name, text.as_ref());
        }
        program
    }

    pub fn add_source(&mut self, file_name: impl Into<String>, source_text: &str) -> FileId {
        let id = FileId(self.files.len() as u32);
        let file = SourceFile::parse(file_name, source_text);
        debug!(
            file = %file.file_name,
            nodes = file.arena.len(),
            diagnostics = file.diagnostics.len(),
            "added source file"
        );
        self.files.push(file);
        id
    }

    #[inline]
    #[must_use]
    pub fn file(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(id.0 as usize)
    }

    /// Files with their ids, in insertion order.
    pub fn files(&self) -> impl Iterator<Item = (FileId, &SourceFile)> {
        self.files
            .iter()
            .enumerate()
            .map(|(i, file)| (FileId(i as u32), file))
    }

    #[inline]
    #[must_use]
    pub fn node(&self, node_ref: NodeRef) -> Option<&Node> {
        self.file(node_ref.file)?.arena.get(node_ref.node)
    }

    #[must_use]
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Parse diagnostics of every file.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.files.iter().flat_map(|file| file.diagnostics.iter())
    }
}
