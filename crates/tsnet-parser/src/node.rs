//! AST node representation.
//!
//! Nodes live in a `NodeArena` and reference each other by `NodeIndex`.
//! `NodeKind` is a closed sum type: every consumer matches it exhaustively
//! instead of probing for fields.

use bitflags::bitflags;
use serde::Serialize;

/// Index of a node inside its file's `NodeArena`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeIndex(pub u32);

impl NodeIndex {
    /// Sentinel for an absent optional child.
    pub const NONE: NodeIndex = NodeIndex(u32::MAX);

    #[inline]
    #[must_use]
    pub const fn is_none(self) -> bool {
        self.0 == u32::MAX
    }

    #[inline]
    #[must_use]
    pub const fn is_some(self) -> bool {
        self.0 != u32::MAX
    }

    /// `Some(self)` unless this is the `NONE` sentinel.
    #[inline]
    #[must_use]
    pub const fn get(self) -> Option<NodeIndex> {
        if self.is_some() { Some(self) } else { None }
    }
}

bitflags! {
    /// Declaration modifiers.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
    pub struct ModifierFlags: u16 {
        const EXPORT = 1 << 0;
        const DECLARE = 1 << 1;
        const ABSTRACT = 1 << 2;
        const STATIC = 1 << 3;
        const READONLY = 1 << 4;
        const PUBLIC = 1 << 5;
        const PRIVATE = 1 << 6;
        const PROTECTED = 1 << 7;
        const OVERRIDE = 1 << 8;
        const DEFAULT = 1 << 9;
        const ASYNC = 1 << 10;
        const VIRTUAL = 1 << 11;
    }
}

impl ModifierFlags {
    /// Map a modifier keyword to its flag.
    #[must_use]
    pub fn from_keyword(text: &str) -> Option<Self> {
        Some(match text {
            "export" => Self::EXPORT,
            "declare" => Self::DECLARE,
            "abstract" => Self::ABSTRACT,
            "static" => Self::STATIC,
            "readonly" => Self::READONLY,
            "public" => Self::PUBLIC,
            "private" => Self::PRIVATE,
            "protected" => Self::PROTECTED,
            "override" => Self::OVERRIDE,
            "default" => Self::DEFAULT,
            "async" => Self::ASYNC,
            "virtual" => Self::VIRTUAL,
            _ => return None,
        })
    }
}

/// Keyword types (`string`, `number`, `any`, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum KeywordType {
    Any,
    Unknown,
    Never,
    Void,
    Null,
    Undefined,
    String,
    Number,
    Boolean,
    BigInt,
    Symbol,
    Object,
    This,
}

impl KeywordType {
    #[must_use]
    pub fn from_text(text: &str) -> Option<Self> {
        Some(match text {
            "any" => Self::Any,
            "unknown" => Self::Unknown,
            "never" => Self::Never,
            "void" => Self::Void,
            "null" => Self::Null,
            "undefined" => Self::Undefined,
            "string" => Self::String,
            "number" => Self::Number,
            "boolean" => Self::Boolean,
            "bigint" => Self::BigInt,
            "symbol" => Self::Symbol,
            "object" => Self::Object,
            "this" => Self::This,
            _ => return None,
        })
    }

    #[must_use]
    pub const fn text(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Unknown => "unknown",
            Self::Never => "never",
            Self::Void => "void",
            Self::Null => "null",
            Self::Undefined => "undefined",
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::BigInt => "bigint",
            Self::Symbol => "symbol",
            Self::Object => "object",
            Self::This => "this",
        }
    }
}

/// Literal values shared by literal expressions and literal types.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub enum Literal {
    String(String),
    Number(f64),
    Boolean(bool),
    Null,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VariableKind {
    Var,
    Let,
    Const,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum TypeOperatorKind {
    Readonly,
    Keyof,
    Unique,
}

// =============================================================================
// Node data
// =============================================================================

#[derive(Clone, Debug, Serialize)]
pub struct ClassData {
    pub name: String,
    pub modifiers: ModifierFlags,
    pub type_parameters: Vec<NodeIndex>,
    /// `TypeReference` node of the `extends` clause, or `NONE`.
    pub extends: NodeIndex,
    /// `TypeReference` nodes of the `implements` clause.
    pub implements: Vec<NodeIndex>,
    pub members: Vec<NodeIndex>,
}

#[derive(Clone, Debug, Serialize)]
pub struct InterfaceData {
    pub name: String,
    pub modifiers: ModifierFlags,
    pub type_parameters: Vec<NodeIndex>,
    pub extends: Vec<NodeIndex>,
    pub members: Vec<NodeIndex>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TypeAliasData {
    pub name: String,
    pub modifiers: ModifierFlags,
    pub type_parameters: Vec<NodeIndex>,
    pub type_node: NodeIndex,
}

#[derive(Clone, Debug, Serialize)]
pub struct EnumData {
    pub name: String,
    pub modifiers: ModifierFlags,
    pub members: Vec<NodeIndex>,
}

#[derive(Clone, Debug, Serialize)]
pub struct EnumMemberData {
    pub name: String,
    pub initializer: NodeIndex,
}

#[derive(Clone, Debug, Serialize)]
pub struct FunctionData {
    pub name: String,
    pub modifiers: ModifierFlags,
    pub type_parameters: Vec<NodeIndex>,
    pub parameters: Vec<NodeIndex>,
    pub return_type: NodeIndex,
    pub body: NodeIndex,
}

#[derive(Clone, Debug, Serialize)]
pub struct VariableStatementData {
    pub modifiers: ModifierFlags,
    pub kind: VariableKind,
    pub declarations: Vec<NodeIndex>,
}

#[derive(Clone, Debug, Serialize)]
pub struct VariableData {
    pub name: String,
    pub type_annotation: NodeIndex,
    pub initializer: NodeIndex,
}

#[derive(Clone, Debug, Serialize)]
pub struct TypeParameterData {
    pub name: String,
    pub constraint: NodeIndex,
    pub default: NodeIndex,
}

#[derive(Clone, Debug, Serialize)]
pub struct ParameterData {
    pub name: String,
    /// Accessibility / readonly modifiers of constructor parameter properties.
    pub modifiers: ModifierFlags,
    pub type_annotation: NodeIndex,
    pub initializer: NodeIndex,
    pub optional: bool,
    pub rest: bool,
}

/// A class property declaration or an interface / type-literal property signature.
#[derive(Clone, Debug, Serialize)]
pub struct PropertyData {
    pub name: String,
    pub modifiers: ModifierFlags,
    pub type_annotation: NodeIndex,
    pub initializer: NodeIndex,
    pub optional: bool,
}

/// A class method or an interface / type-literal method signature.
#[derive(Clone, Debug, Serialize)]
pub struct MethodData {
    pub name: String,
    pub modifiers: ModifierFlags,
    pub type_parameters: Vec<NodeIndex>,
    pub parameters: Vec<NodeIndex>,
    pub return_type: NodeIndex,
    pub body: NodeIndex,
    pub optional: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct ConstructorData {
    pub modifiers: ModifierFlags,
    pub parameters: Vec<NodeIndex>,
    pub body: NodeIndex,
}

#[derive(Clone, Debug, Serialize)]
pub struct AccessorData {
    pub name: String,
    pub modifiers: ModifierFlags,
    pub parameters: Vec<NodeIndex>,
    /// Return annotation of a getter; setters carry their type on the parameter.
    pub type_annotation: NodeIndex,
    pub body: NodeIndex,
}

#[derive(Clone, Debug, Serialize)]
pub struct IndexSignatureData {
    pub modifiers: ModifierFlags,
    pub parameter_name: String,
    pub key_type: NodeIndex,
    pub value_type: NodeIndex,
}

#[derive(Clone, Debug, Serialize)]
pub struct PropertyAccessData {
    pub expression: NodeIndex,
    pub name: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct CallData {
    pub callee: NodeIndex,
    pub type_arguments: Vec<NodeIndex>,
    pub arguments: Vec<NodeIndex>,
}

#[derive(Clone, Debug, Serialize)]
pub struct BinaryData {
    pub left: NodeIndex,
    pub operator: String,
    pub right: NodeIndex,
}

#[derive(Clone, Debug, Serialize)]
pub struct TypeReferenceData {
    /// Possibly dotted name, e.g. `System.Collections.Generic.List`.
    pub name: String,
    pub type_arguments: Vec<NodeIndex>,
}

#[derive(Clone, Debug, Serialize)]
pub struct TupleMemberData {
    pub name: Option<String>,
    pub element_type: NodeIndex,
    pub optional: bool,
    pub rest: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct FunctionTypeData {
    pub type_parameters: Vec<NodeIndex>,
    pub parameters: Vec<NodeIndex>,
    pub return_type: NodeIndex,
}

#[derive(Clone, Debug, Serialize)]
pub struct TypeOperatorData {
    pub operator: TypeOperatorKind,
    pub type_node: NodeIndex,
}

/// Every node shape the parser produces.
#[derive(Clone, Debug, Serialize)]
pub enum NodeKind {
    // Declarations
    ClassDeclaration(ClassData),
    InterfaceDeclaration(InterfaceData),
    TypeAliasDeclaration(TypeAliasData),
    EnumDeclaration(EnumData),
    EnumMember(EnumMemberData),
    FunctionDeclaration(FunctionData),
    VariableStatement(VariableStatementData),
    VariableDeclaration(VariableData),
    TypeParameter(TypeParameterData),
    Parameter(ParameterData),
    PropertyDeclaration(PropertyData),
    MethodDeclaration(MethodData),
    Constructor(ConstructorData),
    GetAccessor(AccessorData),
    SetAccessor(AccessorData),
    IndexSignature(IndexSignatureData),

    // Statements
    Block(Vec<NodeIndex>),
    ReturnStatement(NodeIndex),
    ExpressionStatement(NodeIndex),

    // Expressions
    Identifier(String),
    ThisExpression,
    LiteralExpression(Literal),
    PropertyAccess(PropertyAccessData),
    CallExpression(CallData),
    NewExpression(CallData),
    BinaryExpression(BinaryData),
    ArrayLiteral(Vec<NodeIndex>),
    /// Properties are `PropertyDeclaration` nodes carrying only a name and initializer.
    ObjectLiteral(Vec<NodeIndex>),
    /// Arrow functions and anonymous function expressions.
    FunctionExpression(FunctionData),
    SpreadElement(NodeIndex),
    ParenthesizedExpression(NodeIndex),

    // Types
    KeywordType(KeywordType),
    LiteralType(Literal),
    TypeReference(TypeReferenceData),
    ArrayType(NodeIndex),
    TupleType(Vec<NodeIndex>),
    TupleMember(TupleMemberData),
    UnionType(Vec<NodeIndex>),
    IntersectionType(Vec<NodeIndex>),
    FunctionType(FunctionTypeData),
    TypeLiteral(Vec<NodeIndex>),
    ParenthesizedType(NodeIndex),
    TypeOperator(TypeOperatorData),

    /// Placeholder produced during error recovery.
    Missing,
}

impl NodeKind {
    /// Short name used in diagnostics and traces.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::ClassDeclaration(_) => "ClassDeclaration",
            Self::InterfaceDeclaration(_) => "InterfaceDeclaration",
            Self::TypeAliasDeclaration(_) => "TypeAliasDeclaration",
            Self::EnumDeclaration(_) => "EnumDeclaration",
            Self::EnumMember(_) => "EnumMember",
            Self::FunctionDeclaration(_) => "FunctionDeclaration",
            Self::VariableStatement(_) => "VariableStatement",
            Self::VariableDeclaration(_) => "VariableDeclaration",
            Self::TypeParameter(_) => "TypeParameter",
            Self::Parameter(_) => "Parameter",
            Self::PropertyDeclaration(_) => "PropertyDeclaration",
            Self::MethodDeclaration(_) => "MethodDeclaration",
            Self::Constructor(_) => "Constructor",
            Self::GetAccessor(_) => "GetAccessor",
            Self::SetAccessor(_) => "SetAccessor",
            Self::IndexSignature(_) => "IndexSignature",
            Self::Block(_) => "Block",
            Self::ReturnStatement(_) => "ReturnStatement",
            Self::ExpressionStatement(_) => "ExpressionStatement",
            Self::Identifier(_) => "Identifier",
            Self::ThisExpression => "ThisExpression",
            Self::LiteralExpression(_) => "LiteralExpression",
            Self::PropertyAccess(_) => "PropertyAccess",
            Self::CallExpression(_) => "CallExpression",
            Self::NewExpression(_) => "NewExpression",
            Self::BinaryExpression(_) => "BinaryExpression",
            Self::ArrayLiteral(_) => "ArrayLiteral",
            Self::ObjectLiteral(_) => "ObjectLiteral",
            Self::FunctionExpression(_) => "FunctionExpression",
            Self::SpreadElement(_) => "SpreadElement",
            Self::ParenthesizedExpression(_) => "ParenthesizedExpression",
            Self::KeywordType(_) => "KeywordType",
            Self::LiteralType(_) => "LiteralType",
            Self::TypeReference(_) => "TypeReference",
            Self::ArrayType(_) => "ArrayType",
            Self::TupleType(_) => "TupleType",
            Self::TupleMember(_) => "TupleMember",
            Self::UnionType(_) => "UnionType",
            Self::IntersectionType(_) => "IntersectionType",
            Self::FunctionType(_) => "FunctionType",
            Self::TypeLiteral(_) => "TypeLiteral",
            Self::ParenthesizedType(_) => "ParenthesizedType",
            Self::TypeOperator(_) => "TypeOperator",
            Self::Missing => "Missing",
        }
    }

    /// Declared name of named declarations.
    #[must_use]
    pub fn declaration_name(&self) -> Option<&str> {
        match self {
            Self::ClassDeclaration(data) => Some(&data.name),
            Self::InterfaceDeclaration(data) => Some(&data.name),
            Self::TypeAliasDeclaration(data) => Some(&data.name),
            Self::EnumDeclaration(data) => Some(&data.name),
            Self::EnumMember(data) => Some(&data.name),
            Self::FunctionDeclaration(data) => Some(&data.name),
            Self::VariableDeclaration(data) => Some(&data.name),
            Self::TypeParameter(data) => Some(&data.name),
            Self::Parameter(data) => Some(&data.name),
            Self::PropertyDeclaration(data) => Some(&data.name),
            Self::MethodDeclaration(data) => Some(&data.name),
            Self::Constructor(_) => Some("constructor"),
            Self::GetAccessor(data) | Self::SetAccessor(data) => Some(&data.name),
            _ => None,
        }
    }
}

/// A node: its shape, source range, and parent link.
#[derive(Clone, Debug, Serialize)]
pub struct Node {
    pub kind: NodeKind,
    pub pos: u32,
    pub end: u32,
    pub parent: NodeIndex,
}

impl Node {
    #[inline]
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.end.saturating_sub(self.pos)
    }

    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.end <= self.pos
    }
}
