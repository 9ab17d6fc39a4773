//! Recursive-descent parser for the declaration subset of TypeScript.
//!
//! Semicolons are optional everywhere. Ambiguous constructs (function types vs
//! parenthesized types, call type arguments vs `<`) are decided by bounded
//! lookahead or by a speculative parse that is rolled back on failure.
//! Every list loop consumes at least one token per iteration, so malformed
//! input always terminates with diagnostics instead of hanging.

use crate::arena::NodeArena;
use crate::node::{
    AccessorData, BinaryData, CallData, ClassData, ConstructorData, EnumData, EnumMemberData,
    FunctionData, FunctionTypeData, IndexSignatureData, InterfaceData, KeywordType, Literal,
    MethodData, ModifierFlags, NodeIndex, NodeKind, ParameterData, PropertyAccessData,
    PropertyData, TupleMemberData, TypeAliasData, TypeOperatorData, TypeOperatorKind,
    TypeParameterData, TypeReferenceData, VariableData, VariableKind, VariableStatementData,
};
use crate::scanner::{ScannerState, SyntaxKind, Token};
use tracing::trace;
use tsnet_common::limits::MAX_TYPE_NESTING_DEPTH;
use tsnet_common::{Diagnostic, diagnostic_codes};

/// Saved parser position for speculative parsing.
#[derive(Clone, Copy)]
struct Snapshot {
    pos: usize,
    nodes: usize,
    diagnostics: usize,
}

pub struct ParserState {
    file_name: String,
    tokens: Vec<Token>,
    pos: usize,
    arena: NodeArena,
    diagnostics: Vec<Diagnostic>,
    /// Nesting of `parse_type` calls, bounded by `MAX_TYPE_NESTING_DEPTH`.
    type_depth: u32,
}

impl ParserState {
    #[must_use]
    pub fn new(file_name: String, source_text: &str) -> Self {
        let (tokens, diagnostics) = ScannerState::new(&file_name, source_text).scan_all();
        let arena = NodeArena::with_capacity(tokens.len());
        Self {
            file_name,
            tokens,
            pos: 0,
            arena,
            diagnostics,
            type_depth: 0,
        }
    }

    /// Parse the whole file and return its top-level statements.
    pub fn parse_source_file(&mut self) -> Vec<NodeIndex> {
        let mut statements = Vec::new();
        while !self.is_token(SyntaxKind::EndOfFile) {
            let start = self.pos;
            self.parse_statement_into(&mut statements);
            if self.pos == start {
                self.error_unexpected_and_skip();
            }
        }
        trace!(
            file = %self.file_name,
            statements = statements.len(),
            nodes = self.arena.len(),
            "parsed source file"
        );
        statements
    }

    #[must_use]
    pub fn get_diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    #[must_use]
    pub fn arena(&self) -> &NodeArena {
        &self.arena
    }

    #[must_use]
    pub fn into_parts(self) -> (NodeArena, Vec<Diagnostic>) {
        (self.arena, self.diagnostics)
    }

    // =========================================================================
    // Token helpers
    // =========================================================================

    fn current(&self) -> &Token {
        self.peek(0)
    }

    fn peek(&self, offset: usize) -> &Token {
        let last = self.tokens.len() - 1;
        &self.tokens[(self.pos + offset).min(last)]
    }

    fn is_token(&self, kind: SyntaxKind) -> bool {
        self.current().kind == kind
    }

    fn is_identifier(&self, text: &str) -> bool {
        self.current().is_identifier(text)
    }

    fn next_token(&mut self) {
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn parse_optional(&mut self, kind: SyntaxKind) -> bool {
        if self.is_token(kind) {
            self.next_token();
            true
        } else {
            false
        }
    }

    fn parse_expected(&mut self, kind: SyntaxKind) -> bool {
        if self.parse_optional(kind) {
            return true;
        }
        let found = self.current().display().to_string();
        self.error_at_current(diagnostic_codes::UNEXPECTED_TOKEN, &[kind.punctuation_text(), &found]);
        false
    }

    /// Optional statement terminator.
    fn parse_semicolon(&mut self) {
        self.parse_optional(SyntaxKind::Semicolon);
    }

    fn token_pos(&self) -> u32 {
        self.current().span.start
    }

    /// End offset of the last consumed token.
    fn prev_end(&self) -> u32 {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].span.end
        }
    }

    fn finish(&mut self, kind: NodeKind, start: u32) -> NodeIndex {
        let end = self.prev_end().max(start);
        self.arena.add(kind, start, end)
    }

    fn missing(&mut self) -> NodeIndex {
        let pos = self.token_pos();
        self.arena.add(NodeKind::Missing, pos, pos)
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            pos: self.pos,
            nodes: self.arena.len(),
            diagnostics: self.diagnostics.len(),
        }
    }

    fn rollback(&mut self, snapshot: Snapshot) {
        self.pos = snapshot.pos;
        self.arena.truncate(snapshot.nodes);
        self.diagnostics.truncate(snapshot.diagnostics);
    }

    fn error_at_current(&mut self, code: u32, args: &[&str]) {
        let token = self.current();
        let start = token.span.start;
        let length = token.span.len().max(1);
        // Only one diagnostic per position keeps cascades readable.
        if self
            .diagnostics
            .last()
            .is_some_and(|last| last.start == start && last.file == self.file_name)
        {
            return;
        }
        self.diagnostics
            .push(Diagnostic::from_code(code, args).at(self.file_name.clone(), start, length));
    }

    fn error_unexpected_and_skip(&mut self) {
        let found = self.current().display().to_string();
        self.error_at_current(diagnostic_codes::UNEXPECTED_TOKEN, &["declaration or statement", &found]);
        self.next_token();
    }

    /// Consume an identifier (keywords included) and return its text.
    fn parse_identifier_name(&mut self) -> Option<String> {
        if self.is_token(SyntaxKind::Identifier) {
            let text = self.current().text.clone();
            self.next_token();
            Some(text)
        } else {
            let found = self.current().display().to_string();
            self.error_at_current(diagnostic_codes::IDENTIFIER_EXPECTED, &[&found]);
            None
        }
    }

    /// Property names may also be string or numeric literals.
    fn parse_property_name(&mut self) -> Option<String> {
        match self.current().kind {
            SyntaxKind::Identifier | SyntaxKind::StringLiteral | SyntaxKind::NumericLiteral => {
                let text = self.current().text.clone();
                self.next_token();
                Some(text)
            }
            _ => {
                let found = self.current().display().to_string();
                self.error_at_current(diagnostic_codes::IDENTIFIER_EXPECTED, &[&found]);
                None
            }
        }
    }

    /// Index of the `)`/`]`/`}`/`>` that closes the bracket at token offset `offset`.
    fn matching_close(&self, offset: usize) -> Option<usize> {
        let mut depth = 0usize;
        let mut index = self.pos + offset;
        while let Some(token) = self.tokens.get(index) {
            match token.kind {
                SyntaxKind::OpenParen | SyntaxKind::OpenBracket | SyntaxKind::OpenBrace => depth += 1,
                SyntaxKind::CloseParen | SyntaxKind::CloseBracket | SyntaxKind::CloseBrace => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return Some(index);
                    }
                }
                SyntaxKind::EndOfFile => return None,
                _ => {}
            }
            index += 1;
        }
        None
    }

    fn skip_balanced(&mut self) {
        match self.matching_close(0) {
            Some(close) => self.pos = close,
            None => self.pos = self.tokens.len() - 1,
        }
        self.next_token();
    }

    // =========================================================================
    // Statements
    // =========================================================================

    fn parse_statement_into(&mut self, out: &mut Vec<NodeIndex>) {
        if self.is_identifier("import") && !matches!(self.peek(1).kind, SyntaxKind::OpenParen | SyntaxKind::Dot) {
            self.skip_module_clause();
            return;
        }
        if self.is_identifier("export")
            && matches!(self.peek(1).kind, SyntaxKind::OpenBrace | SyntaxKind::Asterisk)
        {
            self.skip_module_clause();
            return;
        }
        if self.is_identifier("export") && self.peek(1).kind == SyntaxKind::Equals {
            self.next_token();
            self.next_token();
            self.parse_expression();
            self.parse_semicolon();
            return;
        }

        let start = self.token_pos();
        let modifiers = self.parse_statement_modifiers();

        if self.is_identifier("namespace") || self.is_identifier("module") || self.is_identifier("global") {
            if self.is_namespace_start() {
                self.parse_namespace_body_into(out);
                return;
            }
        }

        let statement = match self.current().kind {
            SyntaxKind::Identifier => match self.current().text.as_str() {
                "class" => self.parse_class_declaration(start, modifiers),
                "interface" if self.peek(1).kind == SyntaxKind::Identifier => {
                    self.parse_interface_declaration(start, modifiers)
                }
                "type" if self.peek(1).kind == SyntaxKind::Identifier => {
                    self.parse_type_alias_declaration(start, modifiers)
                }
                "enum" => self.parse_enum_declaration(start, modifiers),
                "const" if self.peek(1).is_identifier("enum") => {
                    self.next_token();
                    self.parse_enum_declaration(start, modifiers)
                }
                "function" => self.parse_function_declaration(start, modifiers),
                "let" | "const" | "var" => self.parse_variable_statement(start, modifiers),
                "return" => self.parse_return_statement(),
                _ => self.parse_expression_statement(),
            },
            SyntaxKind::OpenBrace => self.parse_block(),
            SyntaxKind::Semicolon => {
                self.next_token();
                return;
            }
            SyntaxKind::At => {
                self.skip_decorator();
                return;
            }
            _ => self.parse_expression_statement(),
        };
        out.push(statement);
    }

    /// Leading declaration modifiers (`export`, `declare`, `abstract`, ...).
    fn parse_statement_modifiers(&mut self) -> ModifierFlags {
        let mut flags = ModifierFlags::empty();
        while self.is_token(SyntaxKind::Identifier) && self.peek(1).kind == SyntaxKind::Identifier {
            let Some(flag) = ModifierFlags::from_keyword(&self.current().text) else {
                break;
            };
            flags |= flag;
            self.next_token();
        }
        flags
    }

    fn is_namespace_start(&self) -> bool {
        if self.is_identifier("global") {
            return self.peek(1).kind == SyntaxKind::OpenBrace;
        }
        matches!(self.peek(1).kind, SyntaxKind::Identifier | SyntaxKind::StringLiteral)
    }

    /// Namespace and `declare global` bodies are flattened into the enclosing list.
    fn parse_namespace_body_into(&mut self, out: &mut Vec<NodeIndex>) {
        self.next_token();
        while matches!(self.current().kind, SyntaxKind::Identifier | SyntaxKind::StringLiteral | SyntaxKind::Dot) {
            self.next_token();
        }
        if !self.parse_expected(SyntaxKind::OpenBrace) {
            return;
        }
        while !self.is_token(SyntaxKind::CloseBrace) && !self.is_token(SyntaxKind::EndOfFile) {
            let start = self.pos;
            self.parse_statement_into(out);
            if self.pos == start {
                self.error_unexpected_and_skip();
            }
        }
        self.parse_expected(SyntaxKind::CloseBrace);
    }

    /// Skip an import/export clause; module resolution is not modelled.
    fn skip_module_clause(&mut self) {
        self.next_token();
        loop {
            match self.current().kind {
                SyntaxKind::OpenBrace => {
                    self.skip_balanced();
                    if !self.is_identifier("from") {
                        break;
                    }
                }
                SyntaxKind::StringLiteral => {
                    self.next_token();
                    break;
                }
                SyntaxKind::Asterisk | SyntaxKind::Comma => self.next_token(),
                SyntaxKind::Identifier
                    if matches!(self.current().text.as_str(), "from" | "as" | "type") =>
                {
                    self.next_token();
                }
                SyntaxKind::Identifier => {
                    self.next_token();
                    let continues = self.is_token(SyntaxKind::Comma)
                        || self.is_identifier("from")
                        || self.is_identifier("as");
                    if !continues {
                        break;
                    }
                }
                _ => break,
            }
        }
        self.parse_semicolon();
    }

    fn skip_decorator(&mut self) {
        self.next_token();
        self.parse_left_hand_side_expression();
    }

    fn parse_block(&mut self) -> NodeIndex {
        let start = self.token_pos();
        self.parse_expected(SyntaxKind::OpenBrace);
        let mut statements = Vec::new();
        while !self.is_token(SyntaxKind::CloseBrace) && !self.is_token(SyntaxKind::EndOfFile) {
            let before = self.pos;
            self.parse_statement_into(&mut statements);
            if self.pos == before {
                self.error_unexpected_and_skip();
            }
        }
        self.parse_expected(SyntaxKind::CloseBrace);
        self.finish(NodeKind::Block(statements), start)
    }

    fn parse_return_statement(&mut self) -> NodeIndex {
        let start = self.token_pos();
        self.next_token();
        let expression = if matches!(
            self.current().kind,
            SyntaxKind::Semicolon | SyntaxKind::CloseBrace | SyntaxKind::EndOfFile
        ) {
            NodeIndex::NONE
        } else {
            self.parse_expression()
        };
        self.parse_semicolon();
        self.finish(NodeKind::ReturnStatement(expression), start)
    }

    fn parse_expression_statement(&mut self) -> NodeIndex {
        let start = self.token_pos();
        let expression = self.parse_expression();
        self.parse_semicolon();
        self.finish(NodeKind::ExpressionStatement(expression), start)
    }

    fn parse_variable_statement(&mut self, start: u32, modifiers: ModifierFlags) -> NodeIndex {
        let kind = match self.current().text.as_str() {
            "let" => VariableKind::Let,
            "var" => VariableKind::Var,
            _ => VariableKind::Const,
        };
        self.next_token();
        let mut declarations = Vec::new();
        loop {
            let decl_start = self.token_pos();
            let Some(name) = self.parse_binding_name() else {
                break;
            };
            self.parse_optional(SyntaxKind::Exclamation);
            let type_annotation = self.parse_type_annotation();
            let initializer = self.parse_initializer();
            declarations.push(self.finish(
                NodeKind::VariableDeclaration(VariableData {
                    name,
                    type_annotation,
                    initializer,
                }),
                decl_start,
            ));
            if !self.parse_optional(SyntaxKind::Comma) {
                break;
            }
        }
        self.parse_semicolon();
        self.finish(
            NodeKind::VariableStatement(VariableStatementData {
                modifiers,
                kind,
                declarations,
            }),
            start,
        )
    }

    /// Identifier, or a destructuring pattern which binds no single name.
    fn parse_binding_name(&mut self) -> Option<String> {
        if matches!(self.current().kind, SyntaxKind::OpenBrace | SyntaxKind::OpenBracket) {
            self.skip_balanced();
            return Some(String::new());
        }
        self.parse_identifier_name()
    }

    fn parse_type_annotation(&mut self) -> NodeIndex {
        if self.parse_optional(SyntaxKind::Colon) {
            self.parse_type()
        } else {
            NodeIndex::NONE
        }
    }

    fn parse_initializer(&mut self) -> NodeIndex {
        if self.parse_optional(SyntaxKind::Equals) {
            self.parse_expression()
        } else {
            NodeIndex::NONE
        }
    }

    // =========================================================================
    // Declarations
    // =========================================================================

    fn parse_class_declaration(&mut self, start: u32, modifiers: ModifierFlags) -> NodeIndex {
        self.next_token(); // class
        let name = if self.is_token(SyntaxKind::Identifier)
            && !self.is_identifier("extends")
            && !self.is_identifier("implements")
        {
            self.parse_identifier_name().unwrap_or_default()
        } else {
            String::new()
        };
        let type_parameters = self.parse_type_parameters();

        let mut extends = NodeIndex::NONE;
        let mut implements = Vec::new();
        loop {
            if self.is_identifier("extends") {
                self.next_token();
                extends = self.parse_heritage_reference();
            } else if self.is_identifier("implements") {
                self.next_token();
                implements.push(self.parse_heritage_reference());
                while self.parse_optional(SyntaxKind::Comma) {
                    implements.push(self.parse_heritage_reference());
                }
            } else {
                break;
            }
        }

        let members = self.parse_members(true);
        self.finish(
            NodeKind::ClassDeclaration(ClassData {
                name,
                modifiers,
                type_parameters,
                extends,
                implements,
                members,
            }),
            start,
        )
    }

    fn parse_interface_declaration(&mut self, start: u32, modifiers: ModifierFlags) -> NodeIndex {
        self.next_token(); // interface
        let name = self.parse_identifier_name().unwrap_or_default();
        let type_parameters = self.parse_type_parameters();
        let mut extends = Vec::new();
        if self.is_identifier("extends") {
            self.next_token();
            extends.push(self.parse_heritage_reference());
            while self.parse_optional(SyntaxKind::Comma) {
                extends.push(self.parse_heritage_reference());
            }
        }
        let members = self.parse_members(false);
        self.finish(
            NodeKind::InterfaceDeclaration(InterfaceData {
                name,
                modifiers,
                type_parameters,
                extends,
                members,
            }),
            start,
        )
    }

    fn parse_heritage_reference(&mut self) -> NodeIndex {
        if self.is_token(SyntaxKind::Identifier) {
            self.parse_type_reference()
        } else {
            let found = self.current().display().to_string();
            self.error_at_current(diagnostic_codes::TYPE_EXPECTED, &[&found]);
            self.missing()
        }
    }

    fn parse_type_alias_declaration(&mut self, start: u32, modifiers: ModifierFlags) -> NodeIndex {
        self.next_token(); // type
        let name = self.parse_identifier_name().unwrap_or_default();
        let type_parameters = self.parse_type_parameters();
        self.parse_expected(SyntaxKind::Equals);
        let type_node = self.parse_type();
        self.parse_semicolon();
        self.finish(
            NodeKind::TypeAliasDeclaration(TypeAliasData {
                name,
                modifiers,
                type_parameters,
                type_node,
            }),
            start,
        )
    }

    fn parse_enum_declaration(&mut self, start: u32, modifiers: ModifierFlags) -> NodeIndex {
        self.next_token(); // enum
        let name = self.parse_identifier_name().unwrap_or_default();
        let mut members = Vec::new();
        if self.parse_expected(SyntaxKind::OpenBrace) {
            while !self.is_token(SyntaxKind::CloseBrace) && !self.is_token(SyntaxKind::EndOfFile) {
                let member_start = self.token_pos();
                let Some(member_name) = self.parse_property_name() else {
                    self.next_token();
                    continue;
                };
                let initializer = self.parse_initializer();
                members.push(self.finish(
                    NodeKind::EnumMember(EnumMemberData {
                        name: member_name,
                        initializer,
                    }),
                    member_start,
                ));
                if !self.parse_optional(SyntaxKind::Comma) {
                    break;
                }
            }
            self.parse_expected(SyntaxKind::CloseBrace);
        }
        self.finish(
            NodeKind::EnumDeclaration(EnumData {
                name,
                modifiers,
                members,
            }),
            start,
        )
    }

    fn parse_function_declaration(&mut self, start: u32, modifiers: ModifierFlags) -> NodeIndex {
        self.next_token(); // function
        self.parse_optional(SyntaxKind::Asterisk);
        let name = if self.is_token(SyntaxKind::Identifier) {
            self.parse_identifier_name().unwrap_or_default()
        } else {
            String::new()
        };
        let data = self.parse_function_rest(name, modifiers);
        self.finish(NodeKind::FunctionDeclaration(data), start)
    }

    /// Type parameters, parameters, return type, and optional body.
    fn parse_function_rest(&mut self, name: String, modifiers: ModifierFlags) -> FunctionData {
        let type_parameters = self.parse_type_parameters();
        let parameters = self.parse_parameter_list();
        let return_type = self.parse_type_annotation();
        let body = if self.is_token(SyntaxKind::OpenBrace) {
            self.parse_block()
        } else {
            self.parse_semicolon();
            NodeIndex::NONE
        };
        FunctionData {
            name,
            modifiers,
            type_parameters,
            parameters,
            return_type,
            body,
        }
    }

    fn parse_type_parameters(&mut self) -> Vec<NodeIndex> {
        let mut params = Vec::new();
        if !self.parse_optional(SyntaxKind::LessThan) {
            return params;
        }
        while !self.is_token(SyntaxKind::GreaterThan) && !self.is_token(SyntaxKind::EndOfFile) {
            let start = self.token_pos();
            // Variance annotations.
            if (self.is_identifier("in") || self.is_identifier("out") || self.is_identifier("const"))
                && self.peek(1).kind == SyntaxKind::Identifier
            {
                self.next_token();
            }
            let Some(name) = self.parse_identifier_name() else {
                self.next_token();
                continue;
            };
            let constraint = if self.is_identifier("extends") {
                self.next_token();
                self.parse_type()
            } else {
                NodeIndex::NONE
            };
            let default = if self.parse_optional(SyntaxKind::Equals) {
                self.parse_type()
            } else {
                NodeIndex::NONE
            };
            params.push(self.finish(
                NodeKind::TypeParameter(TypeParameterData {
                    name,
                    constraint,
                    default,
                }),
                start,
            ));
            if !self.parse_optional(SyntaxKind::Comma) {
                break;
            }
        }
        self.parse_expected(SyntaxKind::GreaterThan);
        params
    }

    fn parse_parameter_list(&mut self) -> Vec<NodeIndex> {
        let mut params = Vec::new();
        if !self.parse_expected(SyntaxKind::OpenParen) {
            return params;
        }
        while !self.is_token(SyntaxKind::CloseParen) && !self.is_token(SyntaxKind::EndOfFile) {
            let before = self.pos;
            params.push(self.parse_parameter());
            if !self.parse_optional(SyntaxKind::Comma) {
                if self.pos == before {
                    self.next_token();
                    continue;
                }
                break;
            }
        }
        self.parse_expected(SyntaxKind::CloseParen);
        params
    }

    fn parse_parameter(&mut self) -> NodeIndex {
        let start = self.token_pos();
        let mut modifiers = ModifierFlags::empty();
        while self.is_token(SyntaxKind::Identifier) && self.peek(1).kind == SyntaxKind::Identifier {
            match ModifierFlags::from_keyword(&self.current().text) {
                Some(flag) => {
                    modifiers |= flag;
                    self.next_token();
                }
                None => break,
            }
        }
        let rest = self.parse_optional(SyntaxKind::DotDotDot);
        let name = self.parse_binding_name().unwrap_or_default();
        let optional = self.parse_optional(SyntaxKind::Question);
        let type_annotation = self.parse_type_annotation();
        let initializer = self.parse_initializer();
        self.finish(
            NodeKind::Parameter(ParameterData {
                name,
                modifiers,
                type_annotation,
                initializer,
                optional,
                rest,
            }),
            start,
        )
    }

    // =========================================================================
    // Class / interface / type-literal members
    // =========================================================================

    fn parse_members(&mut self, is_class: bool) -> Vec<NodeIndex> {
        let mut members = Vec::new();
        if !self.parse_expected(SyntaxKind::OpenBrace) {
            return members;
        }
        while !self.is_token(SyntaxKind::CloseBrace) && !self.is_token(SyntaxKind::EndOfFile) {
            let before = self.pos;
            if self.parse_optional(SyntaxKind::Semicolon) || self.parse_optional(SyntaxKind::Comma) {
                continue;
            }
            if let Some(member) = self.parse_member(is_class) {
                members.push(member);
            }
            if self.pos == before {
                self.error_unexpected_and_skip();
            }
        }
        self.parse_expected(SyntaxKind::CloseBrace);
        members
    }

    fn parse_member_modifiers(&mut self) -> ModifierFlags {
        let mut flags = ModifierFlags::empty();
        loop {
            if !self.is_token(SyntaxKind::Identifier) {
                break;
            }
            let next = self.peek(1).kind;
            let followed_by_name = matches!(
                next,
                SyntaxKind::Identifier
                    | SyntaxKind::StringLiteral
                    | SyntaxKind::NumericLiteral
                    | SyntaxKind::OpenBracket
            );
            if !followed_by_name {
                break;
            }
            let Some(flag) = ModifierFlags::from_keyword(&self.current().text) else {
                break;
            };
            flags |= flag;
            self.next_token();
        }
        flags
    }

    fn parse_member(&mut self, is_class: bool) -> Option<NodeIndex> {
        if self.is_token(SyntaxKind::At) {
            self.skip_decorator();
            return None;
        }
        let start = self.token_pos();
        let modifiers = self.parse_member_modifiers();

        if self.is_token(SyntaxKind::OpenBracket) {
            return self.parse_index_signature(start, modifiers);
        }
        if is_class && self.is_identifier("constructor") && self.peek(1).kind == SyntaxKind::OpenParen {
            self.next_token();
            let parameters = self.parse_parameter_list();
            let body = if self.is_token(SyntaxKind::OpenBrace) {
                self.parse_block()
            } else {
                NodeIndex::NONE
            };
            return Some(self.finish(
                NodeKind::Constructor(ConstructorData {
                    modifiers,
                    parameters,
                    body,
                }),
                start,
            ));
        }
        if (self.is_identifier("get") || self.is_identifier("set"))
            && matches!(
                self.peek(1).kind,
                SyntaxKind::Identifier | SyntaxKind::StringLiteral | SyntaxKind::NumericLiteral
            )
        {
            let is_getter = self.is_identifier("get");
            self.next_token();
            let name = self.parse_property_name()?;
            let parameters = self.parse_parameter_list();
            let type_annotation = self.parse_type_annotation();
            let body = if self.is_token(SyntaxKind::OpenBrace) {
                self.parse_block()
            } else {
                NodeIndex::NONE
            };
            let data = AccessorData {
                name,
                modifiers,
                parameters,
                type_annotation,
                body,
            };
            let kind = if is_getter {
                NodeKind::GetAccessor(data)
            } else {
                NodeKind::SetAccessor(data)
            };
            return Some(self.finish(kind, start));
        }

        let name = self.parse_property_name()?;
        let optional = self.parse_optional(SyntaxKind::Question);
        self.parse_optional(SyntaxKind::Exclamation);

        if matches!(self.current().kind, SyntaxKind::OpenParen | SyntaxKind::LessThan) {
            let type_parameters = self.parse_type_parameters();
            let parameters = self.parse_parameter_list();
            let return_type = self.parse_type_annotation();
            let body = if self.is_token(SyntaxKind::OpenBrace) {
                self.parse_block()
            } else {
                NodeIndex::NONE
            };
            return Some(self.finish(
                NodeKind::MethodDeclaration(MethodData {
                    name,
                    modifiers,
                    type_parameters,
                    parameters,
                    return_type,
                    body,
                    optional,
                }),
                start,
            ));
        }

        let type_annotation = self.parse_type_annotation();
        let initializer = self.parse_initializer();
        Some(self.finish(
            NodeKind::PropertyDeclaration(PropertyData {
                name,
                modifiers,
                type_annotation,
                initializer,
                optional,
            }),
            start,
        ))
    }

    fn parse_index_signature(&mut self, start: u32, modifiers: ModifierFlags) -> Option<NodeIndex> {
        let is_signature =
            self.peek(1).kind == SyntaxKind::Identifier && self.peek(2).kind == SyntaxKind::Colon;
        if !is_signature {
            // Computed property names are not part of the supported subset.
            self.error_at_current(diagnostic_codes::UNSUPPORTED_TYPE_SYNTAX, &["computed property name"]);
            self.skip_balanced();
            self.parse_optional(SyntaxKind::Question);
            if matches!(self.current().kind, SyntaxKind::OpenParen | SyntaxKind::LessThan) {
                self.parse_type_parameters();
                self.parse_parameter_list();
                self.parse_type_annotation();
                if self.is_token(SyntaxKind::OpenBrace) {
                    self.parse_block();
                }
            } else {
                self.parse_type_annotation();
                self.parse_initializer();
            }
            return None;
        }
        self.next_token(); // [
        let parameter_name = self.parse_identifier_name().unwrap_or_default();
        let key_type = self.parse_type_annotation();
        self.parse_expected(SyntaxKind::CloseBracket);
        let value_type = self.parse_type_annotation();
        Some(self.finish(
            NodeKind::IndexSignature(IndexSignatureData {
                modifiers,
                parameter_name,
                key_type,
                value_type,
            }),
            start,
        ))
    }

    // =========================================================================
    // Types
    // =========================================================================

    pub(crate) fn parse_type(&mut self) -> NodeIndex {
        if self.type_depth >= MAX_TYPE_NESTING_DEPTH {
            self.error_at_current(diagnostic_codes::UNSUPPORTED_TYPE_SYNTAX, &["deeply nested type"]);
            return self.missing();
        }
        self.type_depth += 1;
        let node = if self.is_start_of_function_type() {
            self.parse_function_type()
        } else {
            self.parse_union_type()
        };
        self.type_depth -= 1;
        node
    }

    fn is_start_of_function_type(&self) -> bool {
        match self.current().kind {
            SyntaxKind::LessThan => true,
            SyntaxKind::OpenParen => self
                .matching_close(0)
                .and_then(|close| self.tokens.get(close + 1))
                .is_some_and(|token| token.kind == SyntaxKind::EqualsGreaterThan),
            _ => false,
        }
    }

    fn parse_function_type(&mut self) -> NodeIndex {
        let start = self.token_pos();
        let type_parameters = self.parse_type_parameters();
        let parameters = self.parse_parameter_list();
        self.parse_expected(SyntaxKind::EqualsGreaterThan);
        let return_type = self.parse_type();
        self.finish(
            NodeKind::FunctionType(FunctionTypeData {
                type_parameters,
                parameters,
                return_type,
            }),
            start,
        )
    }

    fn parse_union_type(&mut self) -> NodeIndex {
        let start = self.token_pos();
        let leading = self.parse_optional(SyntaxKind::Bar);
        let first = self.parse_intersection_type();
        if !self.is_token(SyntaxKind::Bar) {
            if leading {
                return self.finish(NodeKind::UnionType(vec![first]), start);
            }
            return first;
        }
        let mut types = vec![first];
        while self.parse_optional(SyntaxKind::Bar) {
            types.push(self.parse_intersection_type());
        }
        self.finish(NodeKind::UnionType(types), start)
    }

    fn parse_intersection_type(&mut self) -> NodeIndex {
        let start = self.token_pos();
        self.parse_optional(SyntaxKind::Ampersand);
        let first = self.parse_type_operator();
        if !self.is_token(SyntaxKind::Ampersand) {
            return first;
        }
        let mut types = vec![first];
        while self.parse_optional(SyntaxKind::Ampersand) {
            types.push(self.parse_type_operator());
        }
        self.finish(NodeKind::IntersectionType(types), start)
    }

    fn parse_type_operator(&mut self) -> NodeIndex {
        let operator = match self.current().text.as_str() {
            "readonly" => Some(TypeOperatorKind::Readonly),
            "keyof" => Some(TypeOperatorKind::Keyof),
            "unique" => Some(TypeOperatorKind::Unique),
            _ => None,
        };
        if let Some(operator) = operator
            && self.is_token(SyntaxKind::Identifier)
            && self.can_start_type_at(1)
        {
            let start = self.token_pos();
            self.next_token();
            let type_node = self.parse_type_operator();
            return self.finish(
                NodeKind::TypeOperator(TypeOperatorData {
                    operator,
                    type_node,
                }),
                start,
            );
        }
        self.parse_postfix_type()
    }

    fn can_start_type_at(&self, offset: usize) -> bool {
        matches!(
            self.peek(offset).kind,
            SyntaxKind::Identifier
                | SyntaxKind::StringLiteral
                | SyntaxKind::NumericLiteral
                | SyntaxKind::OpenParen
                | SyntaxKind::OpenBracket
                | SyntaxKind::OpenBrace
                | SyntaxKind::LessThan
                | SyntaxKind::Minus
        )
    }

    fn parse_postfix_type(&mut self) -> NodeIndex {
        let start = self.token_pos();
        let mut node = self.parse_primary_type();
        while self.is_token(SyntaxKind::OpenBracket) {
            if self.peek(1).kind == SyntaxKind::CloseBracket {
                self.next_token();
                self.next_token();
                node = self.finish(NodeKind::ArrayType(node), start);
            } else {
                self.error_at_current(diagnostic_codes::UNSUPPORTED_TYPE_SYNTAX, &["indexed access type"]);
                self.skip_balanced();
                node = self.finish(NodeKind::Missing, start);
            }
        }
        node
    }

    fn parse_primary_type(&mut self) -> NodeIndex {
        let start = self.token_pos();
        match self.current().kind {
            SyntaxKind::Identifier => {
                let text = self.current().text.clone();
                if let Some(keyword) = KeywordType::from_text(&text)
                    && self.peek(1).kind != SyntaxKind::Dot
                {
                    self.next_token();
                    return self.finish(NodeKind::KeywordType(keyword), start);
                }
                match text.as_str() {
                    "true" | "false" => {
                        self.next_token();
                        self.finish(NodeKind::LiteralType(Literal::Boolean(text == "true")), start)
                    }
                    "typeof" | "infer" => {
                        self.error_at_current(diagnostic_codes::UNSUPPORTED_TYPE_SYNTAX, &[&text]);
                        self.next_token();
                        self.parse_postfix_type();
                        self.finish(NodeKind::Missing, start)
                    }
                    _ => self.parse_type_reference(),
                }
            }
            SyntaxKind::StringLiteral => {
                let value = self.current().text.clone();
                self.next_token();
                self.finish(NodeKind::LiteralType(Literal::String(value)), start)
            }
            SyntaxKind::NumericLiteral => {
                let value = parse_number(&self.current().text);
                self.next_token();
                self.finish(NodeKind::LiteralType(Literal::Number(value)), start)
            }
            SyntaxKind::Minus if self.peek(1).kind == SyntaxKind::NumericLiteral => {
                self.next_token();
                let value = -parse_number(&self.current().text);
                self.next_token();
                self.finish(NodeKind::LiteralType(Literal::Number(value)), start)
            }
            SyntaxKind::OpenBracket => self.parse_tuple_type(),
            SyntaxKind::OpenBrace => {
                let members = self.parse_members(false);
                self.finish(NodeKind::TypeLiteral(members), start)
            }
            SyntaxKind::OpenParen => {
                self.next_token();
                let inner = self.parse_type();
                self.parse_expected(SyntaxKind::CloseParen);
                self.finish(NodeKind::ParenthesizedType(inner), start)
            }
            _ => {
                let found = self.current().display().to_string();
                self.error_at_current(diagnostic_codes::TYPE_EXPECTED, &[&found]);
                self.missing()
            }
        }
    }

    fn parse_type_reference(&mut self) -> NodeIndex {
        let start = self.token_pos();
        let mut name = self.parse_identifier_name().unwrap_or_default();
        while self.is_token(SyntaxKind::Dot) && self.peek(1).kind == SyntaxKind::Identifier {
            self.next_token();
            name.push('.');
            name.push_str(&self.current().text);
            self.next_token();
        }
        let type_arguments = if self.is_token(SyntaxKind::LessThan) {
            self.parse_type_argument_list()
        } else {
            Vec::new()
        };
        self.finish(
            NodeKind::TypeReference(TypeReferenceData {
                name,
                type_arguments,
            }),
            start,
        )
    }

    fn parse_type_argument_list(&mut self) -> Vec<NodeIndex> {
        let mut args = Vec::new();
        self.parse_expected(SyntaxKind::LessThan);
        while !self.is_token(SyntaxKind::GreaterThan) && !self.is_token(SyntaxKind::EndOfFile) {
            let before = self.pos;
            args.push(self.parse_type());
            if !self.parse_optional(SyntaxKind::Comma) {
                if self.pos == before {
                    self.next_token();
                    continue;
                }
                break;
            }
        }
        self.parse_expected(SyntaxKind::GreaterThan);
        args
    }

    fn parse_tuple_type(&mut self) -> NodeIndex {
        let start = self.token_pos();
        self.next_token(); // [
        let mut elements = Vec::new();
        while !self.is_token(SyntaxKind::CloseBracket) && !self.is_token(SyntaxKind::EndOfFile) {
            let before = self.pos;
            let member_start = self.token_pos();
            let rest = self.parse_optional(SyntaxKind::DotDotDot);
            let mut optional = false;
            let named = self.is_token(SyntaxKind::Identifier)
                && (self.peek(1).kind == SyntaxKind::Colon
                    || (self.peek(1).kind == SyntaxKind::Question && self.peek(2).kind == SyntaxKind::Colon));
            let name = if named {
                let name = self.current().text.clone();
                self.next_token();
                optional = self.parse_optional(SyntaxKind::Question);
                self.next_token(); // :
                Some(name)
            } else {
                None
            };
            let element_type = self.parse_type();
            if self.parse_optional(SyntaxKind::Question) {
                optional = true;
            }
            elements.push(self.finish(
                NodeKind::TupleMember(TupleMemberData {
                    name,
                    element_type,
                    optional,
                    rest,
                }),
                member_start,
            ));
            if !self.parse_optional(SyntaxKind::Comma) {
                if self.pos == before {
                    self.next_token();
                    continue;
                }
                break;
            }
        }
        self.parse_expected(SyntaxKind::CloseBracket);
        self.finish(NodeKind::TupleType(elements), start)
    }

    // =========================================================================
    // Expressions
    // =========================================================================

    /// Binary expressions are parsed left-associatively without precedence;
    /// only their operand structure matters to declaration resolution.
    pub(crate) fn parse_expression(&mut self) -> NodeIndex {
        let start = self.token_pos();
        let mut left = self.parse_unary_expression();
        loop {
            let kind = self.current().kind;
            if !(kind.is_binary_operator() || kind == SyntaxKind::Equals) {
                break;
            }
            let operator = kind.punctuation_text().to_string();
            self.next_token();
            let right = self.parse_unary_expression();
            left = self.finish(
                NodeKind::BinaryExpression(BinaryData {
                    left,
                    operator,
                    right,
                }),
                start,
            );
        }
        left
    }

    fn parse_unary_expression(&mut self) -> NodeIndex {
        let start = self.token_pos();
        match self.current().kind {
            SyntaxKind::Minus if self.peek(1).kind == SyntaxKind::NumericLiteral => {
                self.next_token();
                let value = -parse_number(&self.current().text);
                self.next_token();
                self.finish(NodeKind::LiteralExpression(Literal::Number(value)), start)
            }
            SyntaxKind::Minus | SyntaxKind::Plus | SyntaxKind::Exclamation => {
                self.next_token();
                self.parse_unary_expression()
            }
            SyntaxKind::Identifier
                if matches!(self.current().text.as_str(), "typeof" | "void" | "await" | "delete")
                    && self.can_start_type_at(1) =>
            {
                self.next_token();
                self.parse_unary_expression()
            }
            _ => self.parse_left_hand_side_expression(),
        }
    }

    fn parse_left_hand_side_expression(&mut self) -> NodeIndex {
        let start = self.token_pos();
        let mut expression = if self.is_identifier("new") {
            self.parse_new_expression()
        } else {
            self.parse_primary_expression()
        };
        loop {
            match self.current().kind {
                SyntaxKind::Dot | SyntaxKind::QuestionDot => {
                    self.next_token();
                    let name = self.parse_identifier_name().unwrap_or_default();
                    expression = self.finish(
                        NodeKind::PropertyAccess(PropertyAccessData { expression, name }),
                        start,
                    );
                }
                SyntaxKind::OpenParen => {
                    let arguments = self.parse_argument_list();
                    expression = self.finish(
                        NodeKind::CallExpression(CallData {
                            callee: expression,
                            type_arguments: Vec::new(),
                            arguments,
                        }),
                        start,
                    );
                }
                SyntaxKind::LessThan => match self.try_parse_call_type_arguments() {
                    Some(type_arguments) => {
                        let arguments = self.parse_argument_list();
                        expression = self.finish(
                            NodeKind::CallExpression(CallData {
                                callee: expression,
                                type_arguments,
                                arguments,
                            }),
                            start,
                        );
                    }
                    None => break,
                },
                SyntaxKind::Exclamation => self.next_token(),
                _ => break,
            }
        }
        if self.is_identifier("as") || self.is_identifier("satisfies") {
            self.next_token();
            self.parse_type();
        }
        expression
    }

    /// `<T, U>(` after a callee: type arguments of a call. Rolls back when the
    /// tokens turn out to be a comparison.
    fn try_parse_call_type_arguments(&mut self) -> Option<Vec<NodeIndex>> {
        let snapshot = self.snapshot();
        let args = self.parse_type_argument_list();
        let ok = self.diagnostics.len() == snapshot.diagnostics && self.is_token(SyntaxKind::OpenParen);
        if ok {
            Some(args)
        } else {
            self.rollback(snapshot);
            None
        }
    }

    fn parse_new_expression(&mut self) -> NodeIndex {
        let start = self.token_pos();
        self.next_token(); // new
        let mut callee = self.parse_primary_expression();
        while self.is_token(SyntaxKind::Dot) {
            self.next_token();
            let name = self.parse_identifier_name().unwrap_or_default();
            callee = self.finish(
                NodeKind::PropertyAccess(PropertyAccessData {
                    expression: callee,
                    name,
                }),
                start,
            );
        }
        let type_arguments = if self.is_token(SyntaxKind::LessThan) {
            self.parse_type_argument_list()
        } else {
            Vec::new()
        };
        let arguments = if self.is_token(SyntaxKind::OpenParen) {
            self.parse_argument_list()
        } else {
            Vec::new()
        };
        self.finish(
            NodeKind::NewExpression(CallData {
                callee,
                type_arguments,
                arguments,
            }),
            start,
        )
    }

    fn parse_argument_list(&mut self) -> Vec<NodeIndex> {
        let mut args = Vec::new();
        self.parse_expected(SyntaxKind::OpenParen);
        while !self.is_token(SyntaxKind::CloseParen) && !self.is_token(SyntaxKind::EndOfFile) {
            let before = self.pos;
            args.push(self.parse_spread_or_expression());
            if !self.parse_optional(SyntaxKind::Comma) {
                if self.pos == before {
                    self.next_token();
                    continue;
                }
                break;
            }
        }
        self.parse_expected(SyntaxKind::CloseParen);
        args
    }

    fn parse_spread_or_expression(&mut self) -> NodeIndex {
        let start = self.token_pos();
        if self.parse_optional(SyntaxKind::DotDotDot) {
            let expression = self.parse_expression();
            return self.finish(NodeKind::SpreadElement(expression), start);
        }
        self.parse_expression()
    }

    fn is_start_of_arrow_function(&self) -> bool {
        match self.current().kind {
            SyntaxKind::Identifier => self.peek(1).kind == SyntaxKind::EqualsGreaterThan,
            SyntaxKind::OpenParen => self
                .matching_close(0)
                .and_then(|close| self.tokens.get(close + 1))
                .is_some_and(|token| {
                    matches!(token.kind, SyntaxKind::EqualsGreaterThan | SyntaxKind::Colon)
                }),
            _ => false,
        }
    }

    fn parse_arrow_function(&mut self) -> NodeIndex {
        let start = self.token_pos();
        let parameters = if self.is_token(SyntaxKind::Identifier) {
            let name = self.current().text.clone();
            self.next_token();
            vec![self.finish(
                NodeKind::Parameter(ParameterData {
                    name,
                    modifiers: ModifierFlags::empty(),
                    type_annotation: NodeIndex::NONE,
                    initializer: NodeIndex::NONE,
                    optional: false,
                    rest: false,
                }),
                start,
            )]
        } else {
            self.parse_parameter_list()
        };
        let return_type = self.parse_type_annotation();
        self.parse_expected(SyntaxKind::EqualsGreaterThan);
        let body = if self.is_token(SyntaxKind::OpenBrace) {
            self.parse_block()
        } else {
            self.parse_expression()
        };
        self.finish(
            NodeKind::FunctionExpression(FunctionData {
                name: String::new(),
                modifiers: ModifierFlags::empty(),
                type_parameters: Vec::new(),
                parameters,
                return_type,
                body,
            }),
            start,
        )
    }

    fn parse_primary_expression(&mut self) -> NodeIndex {
        let start = self.token_pos();
        if self.is_identifier("async") && self.peek(1).kind != SyntaxKind::Dot {
            self.next_token();
        }
        if self.is_start_of_arrow_function() {
            return self.parse_arrow_function();
        }
        match self.current().kind {
            SyntaxKind::Identifier => {
                let text = self.current().text.clone();
                match text.as_str() {
                    "this" => {
                        self.next_token();
                        self.finish(NodeKind::ThisExpression, start)
                    }
                    "true" | "false" => {
                        self.next_token();
                        self.finish(NodeKind::LiteralExpression(Literal::Boolean(text == "true")), start)
                    }
                    "null" => {
                        self.next_token();
                        self.finish(NodeKind::LiteralExpression(Literal::Null), start)
                    }
                    "function" => {
                        self.next_token();
                        let name = if self.is_token(SyntaxKind::Identifier) {
                            self.parse_identifier_name().unwrap_or_default()
                        } else {
                            String::new()
                        };
                        let data = self.parse_function_rest(name, ModifierFlags::empty());
                        self.finish(NodeKind::FunctionExpression(data), start)
                    }
                    _ => {
                        self.next_token();
                        self.finish(NodeKind::Identifier(text), start)
                    }
                }
            }
            SyntaxKind::StringLiteral => {
                let value = self.current().text.clone();
                self.next_token();
                self.finish(NodeKind::LiteralExpression(Literal::String(value)), start)
            }
            SyntaxKind::NumericLiteral => {
                let value = parse_number(&self.current().text);
                self.next_token();
                self.finish(NodeKind::LiteralExpression(Literal::Number(value)), start)
            }
            SyntaxKind::OpenBracket => {
                self.next_token();
                let mut elements = Vec::new();
                while !self.is_token(SyntaxKind::CloseBracket) && !self.is_token(SyntaxKind::EndOfFile) {
                    let before = self.pos;
                    elements.push(self.parse_spread_or_expression());
                    if !self.parse_optional(SyntaxKind::Comma) {
                        if self.pos == before {
                            self.next_token();
                            continue;
                        }
                        break;
                    }
                }
                self.parse_expected(SyntaxKind::CloseBracket);
                self.finish(NodeKind::ArrayLiteral(elements), start)
            }
            SyntaxKind::OpenBrace => self.parse_object_literal(),
            SyntaxKind::OpenParen => {
                self.next_token();
                let inner = self.parse_expression();
                self.parse_expected(SyntaxKind::CloseParen);
                self.finish(NodeKind::ParenthesizedExpression(inner), start)
            }
            _ => {
                let found = self.current().display().to_string();
                self.error_at_current(diagnostic_codes::EXPRESSION_EXPECTED, &[&found]);
                self.missing()
            }
        }
    }

    fn parse_object_literal(&mut self) -> NodeIndex {
        let start = self.token_pos();
        self.next_token(); // {
        let mut properties = Vec::new();
        while !self.is_token(SyntaxKind::CloseBrace) && !self.is_token(SyntaxKind::EndOfFile) {
            let before = self.pos;
            let property_start = self.token_pos();
            if self.is_token(SyntaxKind::DotDotDot) {
                properties.push(self.parse_spread_or_expression());
            } else if let Some(name) = self.parse_property_name() {
                let initializer = if self.parse_optional(SyntaxKind::Colon) {
                    self.parse_expression()
                } else {
                    NodeIndex::NONE
                };
                properties.push(self.finish(
                    NodeKind::PropertyDeclaration(PropertyData {
                        name,
                        modifiers: ModifierFlags::empty(),
                        type_annotation: NodeIndex::NONE,
                        initializer,
                        optional: false,
                    }),
                    property_start,
                ));
            }
            if !self.parse_optional(SyntaxKind::Comma) {
                if self.pos == before {
                    self.next_token();
                    continue;
                }
                break;
            }
        }
        self.parse_expected(SyntaxKind::CloseBrace);
        self.finish(NodeKind::ObjectLiteral(properties), start)
    }
}

/// Numeric literal text to its value; separators and hex prefixes are accepted.
fn parse_number(text: &str) -> f64 {
    let cleaned: String = text.chars().filter(|&c| c != '_').collect();
    if let Some(hex) = cleaned
        .strip_prefix("0x")
        .or_else(|| cleaned.strip_prefix("0X"))
    {
        return u64::from_str_radix(hex, 16).map_or(f64::NAN, |value| value as f64);
    }
    cleaned.parse::<f64>().unwrap_or(f64::NAN)
}

#[cfg(test)]
#[path = "../tests/parser_tests.rs"]
mod tests;
