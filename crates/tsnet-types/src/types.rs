//! Type identity, nominal entries, and the structural `TypeExpr` language.
//!
//! - `TypeId`: canonical nominal identity; compared, ordered and hashed by `stable_id` only
//! - `NominalEntry`: frozen description of one nominal type, shared as `Arc`
//! - `TypeExpr`: closed sum type every query speaks

use indexmap::IndexMap;
use smallvec::SmallVec;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use tsnet_metadata::{Accessibility, ParameterMode};
use tsnet_parser::NodeRef;

// =============================================================================
// TypeId
// =============================================================================

/// Canonical identity of one nominal type.
///
/// `stable_id` is `origin_scope:target_name`. Two `TypeId`s are the same type
/// exactly when their stable ids are equal; display names never take part.
#[derive(Clone)]
pub struct TypeId {
    stable_id: Arc<str>,
    target_name: Arc<str>,
    origin_scope: Arc<str>,
    surface_name: Arc<str>,
}

impl TypeId {
    #[must_use]
    pub fn new(origin_scope: &str, target_name: &str, surface_name: &str) -> Self {
        Self {
            stable_id: Arc::from(format!("{origin_scope}:{target_name}")),
            target_name: Arc::from(target_name),
            origin_scope: Arc::from(origin_scope),
            surface_name: Arc::from(surface_name),
        }
    }

    #[inline]
    #[must_use]
    pub fn stable_id(&self) -> &str {
        &self.stable_id
    }

    /// Emitted-language full name, e.g. ``System.Collections.Generic.List`1``.
    #[inline]
    #[must_use]
    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Declaring assembly (or the compilation's own assembly for source types).
    #[inline]
    #[must_use]
    pub fn origin_scope(&self) -> &str {
        &self.origin_scope
    }

    /// Input-language name, e.g. `List`.
    #[inline]
    #[must_use]
    pub fn surface_name(&self) -> &str {
        &self.surface_name
    }
}

impl PartialEq for TypeId {
    fn eq(&self, other: &Self) -> bool {
        self.stable_id == other.stable_id
    }
}

impl Eq for TypeId {}

impl Hash for TypeId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.stable_id.hash(state);
    }
}

impl PartialOrd for TypeId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TypeId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.stable_id.cmp(&other.stable_id)
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.stable_id)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.surface_name)
    }
}

// =============================================================================
// Nominal entries
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NominalKind {
    Class,
    Interface,
    Struct,
    Enum,
    Delegate,
}

impl From<tsnet_metadata::TypeKind> for NominalKind {
    fn from(kind: tsnet_metadata::TypeKind) -> Self {
        match kind {
            tsnet_metadata::TypeKind::Class => Self::Class,
            tsnet_metadata::TypeKind::Interface => Self::Interface,
            tsnet_metadata::TypeKind::Struct => Self::Struct,
            tsnet_metadata::TypeKind::Enum => Self::Enum,
            tsnet_metadata::TypeKind::Delegate => Self::Delegate,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Origin {
    Source,
    Assembly,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HeritageKind {
    Extends,
    Implements,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct HeritageEdge {
    pub kind: HeritageKind,
    pub target: TypeId,
    /// Arguments as written on the clause, in terms of the child's own type parameters.
    pub type_arguments: Vec<TypeExpr>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Property,
    Method,
    Field,
    Event,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MemberEntry {
    pub surface_name: String,
    pub target_name: String,
    pub kind: MemberKind,
    /// Resolved type for catalog members; source members resolve `annotation` on demand.
    pub ty: Option<TypeExpr>,
    /// Overloads of a catalog method.
    pub signatures: Vec<FunctionShape>,
    /// Verbatim type annotation of a source property or accessor.
    pub annotation: Option<NodeRef>,
    /// Source declaration nodes (every overload of a method).
    pub declarations: SmallVec<[NodeRef; 1]>,
    pub is_static: bool,
    pub is_readonly: bool,
    pub is_optional: bool,
    pub is_abstract: bool,
    pub is_virtual: bool,
    pub is_override: bool,
    pub is_indexer: bool,
    pub has_getter: bool,
    pub has_setter: bool,
}

impl MemberEntry {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: MemberKind) -> Self {
        let surface_name = name.into();
        Self {
            target_name: surface_name.clone(),
            surface_name,
            kind,
            ty: None,
            signatures: Vec::new(),
            annotation: None,
            declarations: SmallVec::new(),
            is_static: false,
            is_readonly: false,
            is_optional: false,
            is_abstract: false,
            is_virtual: false,
            is_override: false,
            is_indexer: false,
            has_getter: kind == MemberKind::Property,
            has_setter: kind == MemberKind::Property,
        }
    }
}

/// One nominal type. Built once during catalog construction and frozen.
#[derive(Debug)]
pub struct NominalEntry {
    pub type_id: TypeId,
    pub kind: NominalKind,
    pub type_parameters: Vec<String>,
    pub heritage: Vec<HeritageEdge>,
    /// Members keyed by surface name, in declaration order.
    pub members: IndexMap<String, MemberEntry>,
    /// Catalog constructors; source constructors are resolved from `declarations`.
    pub constructors: Vec<FunctionShape>,
    pub origin: Origin,
    pub accessibility: Accessibility,
    pub is_abstract: bool,
    pub is_sealed: bool,
    pub is_static: bool,
    /// Source declaration nodes merged into this entry.
    pub declarations: Vec<NodeRef>,
}

impl NominalEntry {
    #[must_use]
    pub fn member(&self, name: &str) -> Option<&MemberEntry> {
        self.members.get(name)
    }

    pub fn extends(&self) -> impl Iterator<Item = &HeritageEdge> {
        self.heritage
            .iter()
            .filter(|edge| edge.kind == HeritageKind::Extends)
    }

    /// Reference to this type applied to its own type parameters.
    #[must_use]
    pub fn self_reference(&self) -> TypeExpr {
        TypeExpr::Reference {
            id: self.type_id.clone(),
            args: self
                .type_parameters
                .iter()
                .map(|name| TypeExpr::TypeParameter(name.clone()))
                .collect(),
        }
    }
}

// =============================================================================
// TypeExpr
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
    String,
    Number,
    Boolean,
    BigInt,
    Symbol,
}

impl PrimitiveKind {
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::BigInt => "bigint",
            Self::Symbol => "symbol",
        }
    }
}

#[derive(Clone, Debug)]
pub enum LiteralValue {
    String(String),
    Number(f64),
    Boolean(bool),
}

impl LiteralValue {
    #[must_use]
    pub const fn primitive(&self) -> PrimitiveKind {
        match self {
            Self::String(_) => PrimitiveKind::String,
            Self::Number(_) => PrimitiveKind::Number,
            Self::Boolean(_) => PrimitiveKind::Boolean,
        }
    }
}

// Numbers compare by bit pattern so literal types can key caches.
impl PartialEq for LiteralValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::String(a), Self::String(b)) => a == b,
            (Self::Number(a), Self::Number(b)) => a.to_bits() == b.to_bits(),
            (Self::Boolean(a), Self::Boolean(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for LiteralValue {}

impl Hash for LiteralValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::String(value) => value.hash(state),
            Self::Number(value) => value.to_bits().hash(state),
            Self::Boolean(value) => value.hash(state),
        }
    }
}

/// Why a type could not be resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnresolvedReason {
    UnknownName,
    MissingAnnotation,
    UnsupportedUtility,
    CyclicAlias,
    UnsupportedSyntax,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TypeParamInfo {
    pub name: String,
    pub constraint: Option<Box<TypeExpr>>,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ParamInfo {
    pub name: Option<String>,
    pub ty: TypeExpr,
    pub optional: bool,
    pub rest: bool,
    pub mode: ParameterMode,
}

impl ParamInfo {
    #[must_use]
    pub fn required(name: impl Into<String>, ty: TypeExpr) -> Self {
        Self {
            name: Some(name.into()),
            ty,
            optional: false,
            rest: false,
            mode: ParameterMode::Value,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionShape {
    pub type_params: Vec<TypeParamInfo>,
    pub params: Vec<ParamInfo>,
    pub return_type: TypeExpr,
}

impl FunctionShape {
    /// `[required, total]` argument range; `None` upper bound means variadic.
    #[must_use]
    pub fn arity(&self) -> (usize, Option<usize>) {
        let required = self
            .params
            .iter()
            .filter(|p| !p.optional && !p.rest)
            .count();
        let total = if self.params.iter().any(|p| p.rest) {
            None
        } else {
            Some(self.params.len())
        };
        (required, total)
    }

    #[must_use]
    pub fn accepts(&self, arg_count: usize) -> bool {
        let (required, total) = self.arity();
        arg_count >= required && total.is_none_or(|total| arg_count <= total)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TupleElement {
    pub name: Option<String>,
    pub ty: TypeExpr,
    pub optional: bool,
    pub rest: bool,
}

/// A named member of a structural shape.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PropertyInfo {
    pub name: String,
    pub ty: TypeExpr,
    pub optional: bool,
    pub readonly: bool,
}

/// The structural type language.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeExpr {
    Primitive(PrimitiveKind),
    Any,
    Unknown,
    Never,
    Void,
    Null,
    Undefined,
    Literal(LiteralValue),
    TypeParameter(String),
    Reference { id: TypeId, args: Vec<TypeExpr> },
    Array(Box<TypeExpr>),
    Tuple(Vec<TupleElement>),
    Union(Vec<TypeExpr>),
    Intersection(Vec<TypeExpr>),
    Function(Box<FunctionShape>),
    Object(Vec<PropertyInfo>),
    Dictionary { key: Box<TypeExpr>, value: Box<TypeExpr> },
    /// A utility type whose argument still mentions a type parameter.
    /// Expanded once substitution closes the argument.
    Utility { name: String, argument: Box<TypeExpr> },
    /// Explicit marker for a type that could not be resolved.
    Unresolved { name: String, reason: UnresolvedReason },
}

impl TypeExpr {
    pub const STRING: TypeExpr = TypeExpr::Primitive(PrimitiveKind::String);
    pub const NUMBER: TypeExpr = TypeExpr::Primitive(PrimitiveKind::Number);
    pub const BOOLEAN: TypeExpr = TypeExpr::Primitive(PrimitiveKind::Boolean);

    #[must_use]
    pub fn reference(id: TypeId) -> Self {
        TypeExpr::Reference {
            id,
            args: Vec::new(),
        }
    }

    #[must_use]
    pub fn array(element: TypeExpr) -> Self {
        TypeExpr::Array(Box::new(element))
    }

    #[must_use]
    pub fn unresolved(name: impl Into<String>, reason: UnresolvedReason) -> Self {
        TypeExpr::Unresolved {
            name: name.into(),
            reason,
        }
    }

    /// Build a union, flattening nested unions and dropping duplicates.
    /// A single constituent is returned as-is.
    #[must_use]
    pub fn union(members: impl IntoIterator<Item = TypeExpr>) -> Self {
        let mut flat: Vec<TypeExpr> = Vec::new();
        for member in members {
            match member {
                TypeExpr::Union(inner) => {
                    for ty in inner {
                        if !flat.contains(&ty) {
                            flat.push(ty);
                        }
                    }
                }
                other => {
                    if !flat.contains(&other) {
                        flat.push(other);
                    }
                }
            }
        }
        match flat.len() {
            0 => TypeExpr::Never,
            1 => flat.pop().unwrap_or(TypeExpr::Never),
            _ => TypeExpr::Union(flat),
        }
    }

    #[must_use]
    pub const fn is_nullish(&self) -> bool {
        matches!(self, TypeExpr::Null | TypeExpr::Undefined)
    }

    /// Depth-first search for the first unresolved marker.
    #[must_use]
    pub fn first_unresolved(&self) -> Option<(&str, UnresolvedReason)> {
        match self {
            TypeExpr::Unresolved { name, reason } => Some((name, *reason)),
            TypeExpr::Reference { args, .. } => args.iter().find_map(TypeExpr::first_unresolved),
            TypeExpr::Array(element) => element.first_unresolved(),
            TypeExpr::Tuple(elements) => elements.iter().find_map(|e| e.ty.first_unresolved()),
            TypeExpr::Union(members) | TypeExpr::Intersection(members) => {
                members.iter().find_map(TypeExpr::first_unresolved)
            }
            TypeExpr::Function(shape) => shape
                .params
                .iter()
                .find_map(|p| p.ty.first_unresolved())
                .or_else(|| shape.return_type.first_unresolved()),
            TypeExpr::Object(members) => members.iter().find_map(|m| m.ty.first_unresolved()),
            TypeExpr::Dictionary { key, value } => {
                key.first_unresolved().or_else(|| value.first_unresolved())
            }
            TypeExpr::Utility { argument, .. } => argument.first_unresolved(),
            TypeExpr::Primitive(_)
            | TypeExpr::Any
            | TypeExpr::Unknown
            | TypeExpr::Never
            | TypeExpr::Void
            | TypeExpr::Null
            | TypeExpr::Undefined
            | TypeExpr::Literal(_)
            | TypeExpr::TypeParameter(_) => None,
        }
    }

    /// Whether any type parameter occurs in `self`.
    #[must_use]
    pub fn contains_type_parameter(&self) -> bool {
        match self {
            TypeExpr::TypeParameter(_) => true,
            TypeExpr::Reference { args: members, .. }
            | TypeExpr::Union(members)
            | TypeExpr::Intersection(members) => members.iter().any(TypeExpr::contains_type_parameter),
            TypeExpr::Array(inner) | TypeExpr::Utility { argument: inner, .. } => inner.contains_type_parameter(),
            TypeExpr::Tuple(elements) => elements.iter().any(|e| e.ty.contains_type_parameter()),
            TypeExpr::Function(shape) => {
                !shape.type_params.is_empty()
                    || shape.params.iter().any(|p| p.ty.contains_type_parameter())
                    || shape.return_type.contains_type_parameter()
            }
            TypeExpr::Object(members) => members.iter().any(|m| m.ty.contains_type_parameter()),
            TypeExpr::Dictionary { key, value } => key.contains_type_parameter() || value.contains_type_parameter(),
            TypeExpr::Primitive(_)
            | TypeExpr::Any
            | TypeExpr::Unknown
            | TypeExpr::Never
            | TypeExpr::Void
            | TypeExpr::Null
            | TypeExpr::Undefined
            | TypeExpr::Literal(_)
            | TypeExpr::Unresolved { .. } => false,
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T], separator: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for ParamInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.rest {
            f.write_str("...")?;
        }
        f.write_str(self.name.as_deref().unwrap_or("arg"))?;
        if self.optional {
            f.write_str("?")?;
        }
        write!(f, ": {}", self.ty)
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Primitive(kind) => f.write_str(kind.name()),
            TypeExpr::Any => f.write_str("any"),
            TypeExpr::Unknown => f.write_str("unknown"),
            TypeExpr::Never => f.write_str("never"),
            TypeExpr::Void => f.write_str("void"),
            TypeExpr::Null => f.write_str("null"),
            TypeExpr::Undefined => f.write_str("undefined"),
            TypeExpr::Literal(LiteralValue::String(value)) => write!(f, "{value:?}"),
            TypeExpr::Literal(LiteralValue::Number(value)) => write!(f, "{value}"),
            TypeExpr::Literal(LiteralValue::Boolean(value)) => write!(f, "{value}"),
            TypeExpr::TypeParameter(name) => f.write_str(name),
            TypeExpr::Reference { id, args } => {
                write!(f, "{id}")?;
                if !args.is_empty() {
                    f.write_str("<")?;
                    write_list(f, args, ", ")?;
                    f.write_str(">")?;
                }
                Ok(())
            }
            TypeExpr::Array(element) => match element.as_ref() {
                TypeExpr::Union(_) | TypeExpr::Intersection(_) | TypeExpr::Function(_) => {
                    write!(f, "({element})[]")
                }
                _ => write!(f, "{element}[]"),
            },
            TypeExpr::Tuple(elements) => {
                f.write_str("[")?;
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    if element.rest {
                        f.write_str("...")?;
                    }
                    write!(f, "{}", element.ty)?;
                    if element.optional {
                        f.write_str("?")?;
                    }
                }
                f.write_str("]")
            }
            TypeExpr::Union(members) => write_list(f, members, " | "),
            TypeExpr::Intersection(members) => write_list(f, members, " & "),
            TypeExpr::Function(shape) => {
                if !shape.type_params.is_empty() {
                    f.write_str("<")?;
                    let names: Vec<&str> = shape.type_params.iter().map(|p| p.name.as_str()).collect();
                    write_list(f, &names, ", ")?;
                    f.write_str(">")?;
                }
                f.write_str("(")?;
                write_list(f, &shape.params, ", ")?;
                write!(f, ") => {}", shape.return_type)
            }
            TypeExpr::Object(members) => {
                f.write_str("{ ")?;
                for member in members {
                    if member.readonly {
                        f.write_str("readonly ")?;
                    }
                    f.write_str(&member.name)?;
                    if member.optional {
                        f.write_str("?")?;
                    }
                    write!(f, ": {}; ", member.ty)?;
                }
                f.write_str("}")
            }
            TypeExpr::Dictionary { key, value } => write!(f, "Record<{key}, {value}>"),
            TypeExpr::Utility { name, argument } => write!(f, "{name}<{argument}>"),
            TypeExpr::Unresolved { name, .. } => write!(f, "<unresolved {name}>"),
        }
    }
}
