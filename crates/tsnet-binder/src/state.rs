//! Binder state: declares symbols and resolves identifier expressions.
//!
//! Binding runs in two passes. The first declares every file's top-level
//! declarations into that file's locals and into the program-wide globals
//! (first declaration of a name wins there). The second walks statement
//! bodies with a scope stack and records, for every identifier expression,
//! the symbol it binds to. Lookup order is innermost block/function scope,
//! then the file's locals, then globals.

use crate::symbols::{SymbolArena, SymbolId, SymbolTable, symbol_flags};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::{debug, trace};
use tsnet_parser::node::VariableKind;
use tsnet_parser::{FileId, NodeArena, NodeIndex, NodeKind, NodeRef, Program};

/// Result of binding a whole program.
#[derive(Debug, Default)]
pub struct BoundProgram {
    symbols: SymbolArena,
    globals: SymbolTable,
    file_locals: FxHashMap<FileId, SymbolTable>,
    node_symbols: FxHashMap<NodeRef, SymbolId>,
    identifier_symbols: FxHashMap<NodeRef, SymbolId>,
}

impl BoundProgram {
    #[must_use]
    pub fn bind(program: &Program) -> Self {
        BinderState::new(program).bind_program()
    }

    #[must_use]
    pub fn symbols(&self) -> &SymbolArena {
        &self.symbols
    }

    #[must_use]
    pub fn symbol(&self, id: SymbolId) -> Option<&crate::Symbol> {
        self.symbols.get(id)
    }

    /// Symbol declared by a declaration node.
    #[must_use]
    pub fn get_node_symbol(&self, declaration: NodeRef) -> Option<SymbolId> {
        self.node_symbols.get(&declaration).copied()
    }

    /// Symbol an identifier expression binds to.
    #[must_use]
    pub fn resolve_identifier(&self, identifier: NodeRef) -> Option<SymbolId> {
        self.identifier_symbols.get(&identifier).copied()
    }

    /// Value declaration (or first declaration) an identifier expression binds to.
    #[must_use]
    pub fn declaration_of(&self, identifier: NodeRef) -> Option<NodeRef> {
        let symbol = self.symbols.get(self.resolve_identifier(identifier)?)?;
        symbol
            .value_declaration
            .or_else(|| symbol.declarations.first().copied())
    }

    #[must_use]
    pub fn lookup_global(&self, name: &str) -> Option<SymbolId> {
        self.globals.get(name).copied()
    }

    /// Top-level lookup from inside `file`: file locals shadow globals.
    #[must_use]
    pub fn lookup_in_file(&self, file: FileId, name: &str) -> Option<SymbolId> {
        self.file_locals
            .get(&file)
            .and_then(|locals| locals.get(name))
            .or_else(|| self.globals.get(name))
            .copied()
    }
}

pub struct BinderState<'p> {
    program: &'p Program,
    bound: BoundProgram,
    current_file: FileId,
    /// Block and function scopes of the current walk, innermost last.
    scopes: Vec<SymbolTable>,
    unresolved: usize,
}

impl<'p> BinderState<'p> {
    #[must_use]
    pub fn new(program: &'p Program) -> Self {
        Self {
            program,
            bound: BoundProgram::default(),
            current_file: FileId(0),
            scopes: Vec::new(),
            unresolved: 0,
        }
    }

    #[must_use]
    pub fn bind_program(mut self) -> BoundProgram {
        let program = self.program;
        for (file_id, file) in program.files() {
            self.current_file = file_id;
            for &statement in &file.statements {
                for (name, flags, node) in collect_declarations(&file.arena, statement) {
                    let node_ref = NodeRef::new(file_id, node);
                    let symbol = self.declare_in_file(&name, flags, node_ref);
                    self.bound.globals.entry(name).or_insert(symbol);
                }
            }
        }

        for (file_id, file) in program.files() {
            self.current_file = file_id;
            self.scopes.clear();
            for &statement in &file.statements {
                self.bind_node(&file.arena, statement);
            }
        }

        debug!(
            symbols = self.bound.symbols.len(),
            identifiers = self.bound.identifier_symbols.len(),
            unresolved = self.unresolved,
            "bound program"
        );
        self.bound
    }

    fn declare_in_file(&mut self, name: &str, flags: u32, declaration: NodeRef) -> SymbolId {
        let existing = self
            .bound
            .file_locals
            .get(&self.current_file)
            .and_then(|locals| locals.get(name))
            .copied();
        let symbol = self.declare_symbol(existing, name, flags, declaration);
        self.bound
            .file_locals
            .entry(self.current_file)
            .or_default()
            .insert(name.to_string(), symbol);
        symbol
    }

    fn declare_in_scope(&mut self, name: &str, flags: u32, declaration: NodeRef) {
        if name.is_empty() {
            return;
        }
        let existing = self.scopes.last().and_then(|scope| scope.get(name)).copied();
        let symbol = self.declare_symbol(existing, name, flags, declaration);
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string(), symbol);
        }
    }

    /// Merge into `existing` or allocate a fresh symbol.
    fn declare_symbol(
        &mut self,
        existing: Option<SymbolId>,
        name: &str,
        flags: u32,
        declaration: NodeRef,
    ) -> SymbolId {
        let symbol_id = existing.unwrap_or_else(|| self.bound.symbols.alloc(flags, name.to_string()));
        if let Some(symbol) = self.bound.symbols.get_mut(symbol_id) {
            symbol.flags |= flags;
            symbol.declarations.push(declaration);
            if symbol.value_declaration.is_none() && flags & symbol_flags::VALUE != 0 {
                symbol.value_declaration = Some(declaration);
            }
        }
        self.bound.node_symbols.insert(declaration, symbol_id);
        symbol_id
    }

    fn resolve_name(&self, name: &str) -> Option<SymbolId> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
            .or_else(|| self.bound.lookup_in_file(self.current_file, name))
    }

    fn node_ref(&self, node: NodeIndex) -> NodeRef {
        NodeRef::new(self.current_file, node)
    }

    fn with_scope(&mut self, f: impl FnOnce(&mut Self)) {
        self.scopes.push(SymbolTable::default());
        f(self);
        self.scopes.pop();
    }

    fn bind_nodes(&mut self, arena: &NodeArena, nodes: &[NodeIndex]) {
        for &node in nodes {
            self.bind_node(arena, node);
        }
    }

    fn bind_node(&mut self, arena: &NodeArena, index: NodeIndex) {
        let Some(node) = arena.get(index) else {
            return;
        };
        match &node.kind {
            NodeKind::Identifier(name) => {
                match self.resolve_name(name) {
                    Some(symbol) => {
                        let node_ref = self.node_ref(index);
                        self.bound.identifier_symbols.insert(node_ref, symbol);
                    }
                    None => {
                        self.unresolved += 1;
                        trace!(name = %name, "identifier does not bind to a declaration");
                    }
                }
            }
            NodeKind::FunctionDeclaration(data) | NodeKind::FunctionExpression(data) => {
                self.bind_function_like(arena, &data.type_parameters, &data.parameters, data.body);
            }
            NodeKind::MethodDeclaration(data) => {
                self.bind_function_like(arena, &data.type_parameters, &data.parameters, data.body);
            }
            NodeKind::Constructor(data) => {
                self.bind_function_like(arena, &[], &data.parameters, data.body);
            }
            NodeKind::GetAccessor(data) | NodeKind::SetAccessor(data) => {
                self.bind_function_like(arena, &[], &data.parameters, data.body);
            }
            NodeKind::ClassDeclaration(data) => {
                self.with_scope(|this| {
                    this.declare_type_parameters(arena, &data.type_parameters);
                    this.bind_nodes(arena, &data.members);
                });
            }
            NodeKind::Block(statements) => {
                self.with_scope(|this| {
                    for &statement in statements {
                        for (name, flags, node) in collect_declarations(arena, statement) {
                            let node_ref = this.node_ref(node);
                            this.declare_in_scope(&name, flags, node_ref);
                        }
                    }
                    this.bind_nodes(arena, statements);
                });
            }
            NodeKind::VariableStatement(data) => self.bind_nodes(arena, &data.declarations),
            NodeKind::VariableDeclaration(data) => self.bind_node(arena, data.initializer),
            NodeKind::PropertyDeclaration(data) => self.bind_node(arena, data.initializer),
            NodeKind::Parameter(data) => self.bind_node(arena, data.initializer),
            NodeKind::EnumDeclaration(data) => self.bind_nodes(arena, &data.members),
            NodeKind::EnumMember(data) => self.bind_node(arena, data.initializer),
            NodeKind::ReturnStatement(expr)
            | NodeKind::ExpressionStatement(expr)
            | NodeKind::SpreadElement(expr)
            | NodeKind::ParenthesizedExpression(expr) => self.bind_node(arena, *expr),
            NodeKind::PropertyAccess(data) => self.bind_node(arena, data.expression),
            NodeKind::CallExpression(data) | NodeKind::NewExpression(data) => {
                self.bind_node(arena, data.callee);
                self.bind_nodes(arena, &data.arguments);
            }
            NodeKind::BinaryExpression(data) => {
                self.bind_node(arena, data.left);
                self.bind_node(arena, data.right);
            }
            NodeKind::ArrayLiteral(elements) | NodeKind::ObjectLiteral(elements) => {
                self.bind_nodes(arena, elements);
            }
            // Type positions are resolved by the type registry, not by lexical scope.
            NodeKind::InterfaceDeclaration(_)
            | NodeKind::TypeAliasDeclaration(_)
            | NodeKind::IndexSignature(_)
            | NodeKind::TypeParameter(_)
            | NodeKind::ThisExpression
            | NodeKind::LiteralExpression(_)
            | NodeKind::KeywordType(_)
            | NodeKind::LiteralType(_)
            | NodeKind::TypeReference(_)
            | NodeKind::ArrayType(_)
            | NodeKind::TupleType(_)
            | NodeKind::TupleMember(_)
            | NodeKind::UnionType(_)
            | NodeKind::IntersectionType(_)
            | NodeKind::FunctionType(_)
            | NodeKind::TypeLiteral(_)
            | NodeKind::ParenthesizedType(_)
            | NodeKind::TypeOperator(_)
            | NodeKind::Missing => {}
        }
    }

    fn bind_function_like(
        &mut self,
        arena: &NodeArena,
        type_parameters: &[NodeIndex],
        parameters: &[NodeIndex],
        body: NodeIndex,
    ) {
        self.with_scope(|this| {
            this.declare_type_parameters(arena, type_parameters);
            for &parameter in parameters {
                if let Some(NodeKind::Parameter(data)) = arena.kind(parameter) {
                    let node_ref = this.node_ref(parameter);
                    this.declare_in_scope(&data.name, symbol_flags::PARAMETER, node_ref);
                }
            }
            this.bind_nodes(arena, parameters);
            this.bind_node(arena, body);
        });
    }

    fn declare_type_parameters(&mut self, arena: &NodeArena, type_parameters: &[NodeIndex]) {
        for &type_parameter in type_parameters {
            if let Some(NodeKind::TypeParameter(data)) = arena.kind(type_parameter) {
                let node_ref = self.node_ref(type_parameter);
                self.declare_in_scope(&data.name, symbol_flags::TYPE_PARAMETER, node_ref);
            }
        }
    }
}

/// `(name, flags, declaration node)` for every name a statement declares.
fn collect_declarations(arena: &NodeArena, statement: NodeIndex) -> SmallVec<[(String, u32, NodeIndex); 2]> {
    let mut out = SmallVec::new();
    let Some(kind) = arena.kind(statement) else {
        return out;
    };
    let flags = match kind {
        NodeKind::ClassDeclaration(_) => symbol_flags::CLASS,
        NodeKind::InterfaceDeclaration(_) => symbol_flags::INTERFACE,
        NodeKind::TypeAliasDeclaration(_) => symbol_flags::TYPE_ALIAS,
        NodeKind::EnumDeclaration(_) => symbol_flags::ENUM,
        NodeKind::FunctionDeclaration(_) => symbol_flags::FUNCTION,
        NodeKind::VariableStatement(data) => {
            let flags = match data.kind {
                VariableKind::Var => symbol_flags::FUNCTION_SCOPED_VARIABLE,
                VariableKind::Let | VariableKind::Const => symbol_flags::BLOCK_SCOPED_VARIABLE,
            };
            for &declaration in &data.declarations {
                if let Some(NodeKind::VariableDeclaration(var)) = arena.kind(declaration)
                    && !var.name.is_empty()
                {
                    out.push((var.name.clone(), flags, declaration));
                }
            }
            return out;
        }
        _ => return out,
    };
    if let Some(name) = kind.declaration_name()
        && !name.is_empty()
    {
        out.push((name.to_string(), flags, statement));
    }
    out
}

#[cfg(test)]
#[path = "../tests/binder_tests.rs"]
mod tests;
