//! Lowering of type syntax into `TypeExpr`.
//!
//! Annotation nodes resolve names in this order: enclosing type parameters,
//! parameter-mode wrappers, `Array`/`ReadonlyArray`, `Record`, the supported
//! utility types, registry aliases, then the unified catalog. Catalog type
//! strings (`TypeRef`) resolve through the catalog's target index, with the
//! runtime's primitive types mapped onto surface primitives.
//!
//! Lowering never fails: anything it cannot resolve becomes an explicit
//! `TypeExpr::Unresolved` marker that queries turn into diagnostics.

use crate::catalog::CatalogIndex;
use crate::registry::{SourceAlias, TypeRegistry, type_parameter_names};
use crate::subst::{InstantiationEnv, substitute};
use crate::types::{
    FunctionShape, LiteralValue, ParamInfo, PrimitiveKind, PropertyInfo, TupleElement, TypeExpr,
    TypeParamInfo, UnresolvedReason,
};
use crate::utility::{self, StructuralExpander};
use tracing::trace;
use tsnet_common::limits::MAX_ALIAS_EXPANSION_DEPTH;
use tsnet_metadata::{ParameterMode, TypeRef};
use tsnet_parser::node::{KeywordType, Literal, TypeOperatorKind};
use tsnet_parser::{FileId, NodeIndex, NodeKind, NodeRef, Program};

/// `(file name, start, length)` of a node, for diagnostics.
pub(crate) fn node_location(program: &Program, node: NodeRef) -> (String, u32, u32) {
    match program.file(node.file) {
        Some(file) => {
            let (start, length) = file
                .node(node.node)
                .map_or((0, 0), |n| (n.pos, n.len()));
            (file.file_name.clone(), start, length)
        }
        None => (String::new(), 0, 0),
    }
}

/// Parameter-mode wrapper names recognized in annotations.
pub(crate) fn wrapper_mode(name: &str) -> Option<Option<ParameterMode>> {
    match name {
        "ref" => Some(Some(ParameterMode::Ref)),
        "out" => Some(Some(ParameterMode::Out)),
        "inref" => Some(Some(ParameterMode::In)),
        "thisarg" => Some(None),
        _ => None,
    }
}

/// Surface primitive for a runtime primitive type name.
fn primitive_for_target(name: &str) -> Option<TypeExpr> {
    Some(match name {
        "System.String" | "System.Char" => TypeExpr::STRING,
        "System.Boolean" => TypeExpr::BOOLEAN,
        "System.Byte" | "System.SByte" | "System.Int16" | "System.UInt16" | "System.Int32"
        | "System.UInt32" | "System.Int64" | "System.UInt64" | "System.Single" | "System.Double"
        | "System.Decimal" | "System.IntPtr" | "System.UIntPtr" => TypeExpr::NUMBER,
        "System.Numerics.BigInteger" => TypeExpr::Primitive(PrimitiveKind::BigInt),
        "System.Void" => TypeExpr::Void,
        "System.Object" => TypeExpr::Unknown,
        _ => return None,
    })
}

pub(crate) struct Lowerer<'a> {
    program: &'a Program,
    registry: &'a TypeRegistry,
    index: &'a CatalogIndex,
    expander: Option<&'a dyn StructuralExpander>,
    /// Type-parameter names in scope, innermost last.
    scopes: Vec<Vec<String>>,
    /// Type of `this` inside a class or interface body.
    this_type: Option<TypeExpr>,
    /// Qualified names of aliases being expanded.
    alias_stack: Vec<String>,
}

impl<'a> Lowerer<'a> {
    pub(crate) fn new(program: &'a Program, registry: &'a TypeRegistry, index: &'a CatalogIndex) -> Self {
        Self {
            program,
            registry,
            index,
            expander: None,
            scopes: Vec::new(),
            this_type: None,
            alias_stack: Vec::new(),
        }
    }

    /// Allow utility types over nominal references to expand through `expander`.
    pub(crate) fn with_expander(mut self, expander: &'a dyn StructuralExpander) -> Self {
        self.expander = Some(expander);
        self
    }

    fn kind(&self, node: NodeRef) -> Option<&'a NodeKind> {
        self.program.node(node).map(|n| &n.kind)
    }

    // -------------------------------------------------------------------------
    // Entry points
    // -------------------------------------------------------------------------

    /// Lower an annotation node in the scope of its enclosing declarations.
    pub(crate) fn lower_annotation(&mut self, node: NodeRef) -> TypeExpr {
        let saved_scopes = std::mem::take(&mut self.scopes);
        let saved_this = self.this_type.take();
        self.enter_enclosing_scopes(node);
        let lowered = self.lower(node);
        self.scopes = saved_scopes;
        self.this_type = saved_this;
        lowered
    }

    /// Shape of a function-like declaration node (function, method, constructor,
    /// function type or function expression). Missing annotations become
    /// unresolved markers; constructors return `constructed`.
    pub(crate) fn signature_of(&mut self, node: NodeRef, constructed: Option<TypeExpr>) -> Option<FunctionShape> {
        let saved_scopes = std::mem::take(&mut self.scopes);
        let saved_this = self.this_type.take();
        self.enter_enclosing_scopes(node);
        let shape = match self.kind(node)? {
            NodeKind::FunctionDeclaration(data) | NodeKind::FunctionExpression(data) => {
                Some(self.function_shape(node.file, &data.name, &data.type_parameters, &data.parameters, data.return_type))
            }
            NodeKind::MethodDeclaration(data) => {
                Some(self.function_shape(node.file, &data.name, &data.type_parameters, &data.parameters, data.return_type))
            }
            NodeKind::FunctionType(data) => {
                Some(self.function_shape(node.file, "", &data.type_parameters, &data.parameters, data.return_type))
            }
            NodeKind::Constructor(data) => {
                let mut shape = self.function_shape(node.file, "constructor", &[], &data.parameters, NodeIndex::NONE);
                shape.return_type = constructed.unwrap_or(TypeExpr::Void);
                Some(shape)
            }
            _ => None,
        };
        self.scopes = saved_scopes;
        self.this_type = saved_this;
        shape
    }

    /// Lower one `Parameter` node in the current scope.
    pub(crate) fn parameter(&mut self, node: NodeRef) -> Option<ParamInfo> {
        let NodeKind::Parameter(data) = self.kind(node)? else {
            return None;
        };
        let (ty, mode) = match data.type_annotation.get() {
            Some(annotation) => self.lower_parameter_type(NodeRef::new(node.file, annotation)),
            None => (
                TypeExpr::unresolved(data.name.clone(), UnresolvedReason::MissingAnnotation),
                ParameterMode::Value,
            ),
        };
        Some(ParamInfo {
            name: Some(data.name.clone()),
            ty,
            optional: data.optional || data.initializer.is_some(),
            rest: data.rest,
            mode,
        })
    }

    /// Collect type parameters of every enclosing declaration and the `this` type.
    fn enter_enclosing_scopes(&mut self, node: NodeRef) {
        let Some(file) = self.program.file(node.file) else {
            return;
        };
        let arena = &file.arena;
        let mut scopes = Vec::new();
        let mut current = node.node;
        while current.is_some() {
            let type_parameters = match arena.kind(current) {
                Some(NodeKind::ClassDeclaration(data)) => {
                    self.set_this_type(NodeRef::new(node.file, current));
                    Some(&data.type_parameters)
                }
                Some(NodeKind::InterfaceDeclaration(data)) => {
                    self.set_this_type(NodeRef::new(node.file, current));
                    Some(&data.type_parameters)
                }
                Some(NodeKind::TypeAliasDeclaration(data)) => Some(&data.type_parameters),
                Some(NodeKind::FunctionDeclaration(data) | NodeKind::FunctionExpression(data)) => {
                    Some(&data.type_parameters)
                }
                Some(NodeKind::MethodDeclaration(data)) => Some(&data.type_parameters),
                Some(NodeKind::FunctionType(data)) => Some(&data.type_parameters),
                _ => None,
            };
            if let Some(type_parameters) = type_parameters {
                scopes.push(type_parameter_names(arena, type_parameters));
            }
            current = arena.parent(current);
        }
        scopes.reverse();
        self.scopes = scopes;
    }

    fn set_this_type(&mut self, declaration: NodeRef) {
        if self.this_type.is_some() {
            return;
        }
        let Some(qualified) = self.registry.qualified_name_of(declaration) else {
            return;
        };
        let Some(id) = self.index.resolve_target(qualified, 0) else {
            return;
        };
        let args = self
            .registry
            .resolve_by_qualified_name(qualified)
            .map(|d| {
                d.type_parameters
                    .iter()
                    .map(|name| TypeExpr::TypeParameter(name.clone()))
                    .collect()
            })
            .unwrap_or_default();
        self.this_type = Some(TypeExpr::Reference { id, args });
    }

    fn in_scope(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|scope| scope.iter().any(|n| n == name))
    }

    // -------------------------------------------------------------------------
    // Type nodes
    // -------------------------------------------------------------------------

    fn lower_index(&mut self, file: FileId, index: NodeIndex) -> TypeExpr {
        match index.get() {
            Some(index) => self.lower(NodeRef::new(file, index)),
            None => TypeExpr::unresolved("<missing>", UnresolvedReason::MissingAnnotation),
        }
    }

    pub(crate) fn lower(&mut self, node: NodeRef) -> TypeExpr {
        let Some(kind) = self.kind(node) else {
            return TypeExpr::unresolved("<missing>", UnresolvedReason::UnsupportedSyntax);
        };
        let file = node.file;
        match kind {
            NodeKind::KeywordType(keyword) => self.lower_keyword(*keyword),
            NodeKind::LiteralType(literal) => match literal {
                Literal::String(value) => TypeExpr::Literal(LiteralValue::String(value.clone())),
                Literal::Number(value) => TypeExpr::Literal(LiteralValue::Number(*value)),
                Literal::Boolean(value) => TypeExpr::Literal(LiteralValue::Boolean(*value)),
                Literal::Null => TypeExpr::Null,
            },
            NodeKind::TypeReference(data) => {
                let args: Vec<TypeExpr> = data
                    .type_arguments
                    .iter()
                    .map(|&arg| self.lower(NodeRef::new(file, arg)))
                    .collect();
                self.resolve_reference(&data.name, args)
            }
            NodeKind::ArrayType(element) => TypeExpr::array(self.lower_index(file, *element)),
            NodeKind::TupleType(elements) => TypeExpr::Tuple(
                elements
                    .iter()
                    .map(|&element| self.tuple_element(NodeRef::new(file, element)))
                    .collect(),
            ),
            NodeKind::UnionType(members) => TypeExpr::union(
                members
                    .iter()
                    .map(|&member| self.lower(NodeRef::new(file, member)))
                    .collect::<Vec<_>>(),
            ),
            NodeKind::IntersectionType(members) => TypeExpr::Intersection(
                members
                    .iter()
                    .map(|&member| self.lower(NodeRef::new(file, member)))
                    .collect(),
            ),
            NodeKind::FunctionType(data) => {
                let shape = self.function_shape(file, "", &data.type_parameters, &data.parameters, data.return_type);
                TypeExpr::Function(Box::new(shape))
            }
            NodeKind::TypeLiteral(members) => self.type_literal(file, members),
            NodeKind::ParenthesizedType(inner) => self.lower_index(file, *inner),
            NodeKind::TypeOperator(data) => match data.operator {
                TypeOperatorKind::Readonly => self.lower_index(file, data.type_node),
                TypeOperatorKind::Keyof => TypeExpr::unresolved("keyof", UnresolvedReason::UnsupportedSyntax),
                TypeOperatorKind::Unique => TypeExpr::unresolved("unique", UnresolvedReason::UnsupportedSyntax),
            },
            other => TypeExpr::unresolved(other.name(), UnresolvedReason::UnsupportedSyntax),
        }
    }

    fn lower_keyword(&self, keyword: KeywordType) -> TypeExpr {
        match keyword {
            KeywordType::Any => TypeExpr::Any,
            KeywordType::Unknown => TypeExpr::Unknown,
            KeywordType::Never => TypeExpr::Never,
            KeywordType::Void => TypeExpr::Void,
            KeywordType::Null => TypeExpr::Null,
            KeywordType::Undefined => TypeExpr::Undefined,
            KeywordType::String => TypeExpr::STRING,
            KeywordType::Number => TypeExpr::NUMBER,
            KeywordType::Boolean => TypeExpr::BOOLEAN,
            KeywordType::BigInt => TypeExpr::Primitive(PrimitiveKind::BigInt),
            KeywordType::Symbol => TypeExpr::Primitive(PrimitiveKind::Symbol),
            KeywordType::Object => TypeExpr::Object(Vec::new()),
            KeywordType::This => self
                .this_type
                .clone()
                .unwrap_or_else(|| TypeExpr::unresolved("this", UnresolvedReason::UnsupportedSyntax)),
        }
    }

    fn tuple_element(&mut self, node: NodeRef) -> TupleElement {
        match self.kind(node) {
            Some(NodeKind::TupleMember(data)) => TupleElement {
                name: data.name.clone(),
                ty: self.lower_index(node.file, data.element_type),
                optional: data.optional,
                rest: data.rest,
            },
            _ => TupleElement {
                name: None,
                ty: self.lower(node),
                optional: false,
                rest: false,
            },
        }
    }

    fn type_literal(&mut self, file: FileId, members: &[NodeIndex]) -> TypeExpr {
        let mut properties = Vec::new();
        let mut index_signature = None;
        for &member in members {
            let node = NodeRef::new(file, member);
            match self.kind(node) {
                Some(NodeKind::PropertyDeclaration(data)) => properties.push(PropertyInfo {
                    name: data.name.clone(),
                    ty: self.lower_index(file, data.type_annotation),
                    optional: data.optional,
                    readonly: data.modifiers.contains(tsnet_parser::ModifierFlags::READONLY),
                }),
                Some(NodeKind::MethodDeclaration(data)) => {
                    let shape =
                        self.function_shape(file, &data.name, &data.type_parameters, &data.parameters, data.return_type);
                    properties.push(PropertyInfo {
                        name: data.name.clone(),
                        ty: TypeExpr::Function(Box::new(shape)),
                        optional: data.optional,
                        readonly: false,
                    });
                }
                Some(NodeKind::IndexSignature(data)) if index_signature.is_none() => {
                    let key = self.lower_index(file, data.key_type);
                    let value = self.lower_index(file, data.value_type);
                    index_signature = Some((key, value));
                }
                _ => {}
            }
        }
        match index_signature {
            Some((key, value)) if properties.is_empty() => TypeExpr::Dictionary {
                key: Box::new(key),
                value: Box::new(value),
            },
            _ => TypeExpr::Object(properties),
        }
    }

    fn function_shape(
        &mut self,
        file: FileId,
        name: &str,
        type_parameters: &[NodeIndex],
        parameters: &[NodeIndex],
        return_type: NodeIndex,
    ) -> FunctionShape {
        let names = self
            .program
            .file(file)
            .map(|f| type_parameter_names(&f.arena, type_parameters))
            .unwrap_or_default();
        self.scopes.push(names);

        let type_params = type_parameters
            .iter()
            .filter_map(|&index| match self.kind(NodeRef::new(file, index)) {
                Some(NodeKind::TypeParameter(data)) => Some((data.name.clone(), data.constraint)),
                _ => None,
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|(name, constraint)| TypeParamInfo {
                name,
                constraint: constraint
                    .get()
                    .map(|c| Box::new(self.lower(NodeRef::new(file, c)))),
            })
            .collect();
        let params = parameters
            .iter()
            .filter_map(|&index| self.parameter(NodeRef::new(file, index)))
            .collect();
        let return_type = match return_type.get() {
            Some(index) => self.lower(NodeRef::new(file, index)),
            None => TypeExpr::unresolved(
                if name.is_empty() { "<return type>" } else { name },
                UnresolvedReason::MissingAnnotation,
            ),
        };

        self.scopes.pop();
        FunctionShape {
            type_params,
            params,
            return_type,
        }
    }

    /// Lower a parameter annotation, peeling mode wrappers into a passing mode.
    fn lower_parameter_type(&mut self, node: NodeRef) -> (TypeExpr, ParameterMode) {
        let peeled = crate::binding::peel_wrappers(self.program, node);
        (self.lower(peeled.node), peeled.mode.unwrap_or(ParameterMode::Value))
    }

    // -------------------------------------------------------------------------
    // Name resolution
    // -------------------------------------------------------------------------

    fn resolve_reference(&mut self, name: &str, mut args: Vec<TypeExpr>) -> TypeExpr {
        if !name.contains('.') && self.in_scope(name) {
            return TypeExpr::TypeParameter(name.to_string());
        }
        if wrapper_mode(name).is_some() && args.len() == 1 {
            return args.pop().unwrap_or(TypeExpr::Unknown);
        }
        match (name, args.len()) {
            ("Array" | "ReadonlyArray", 1) => {
                return TypeExpr::array(args.pop().unwrap_or(TypeExpr::Unknown));
            }
            ("Array" | "ReadonlyArray", 0) => return TypeExpr::array(TypeExpr::Unknown),
            ("Record", 2) => {
                let value = args.pop().unwrap_or(TypeExpr::Unknown);
                let key = args.pop().unwrap_or(TypeExpr::Unknown);
                return TypeExpr::Dictionary {
                    key: Box::new(key),
                    value: Box::new(value),
                };
            }
            _ => {}
        }
        if utility::is_supported(name) {
            return match utility::expand(name, &args, self.expander) {
                Ok(expanded) => expanded,
                Err(_) => {
                    trace!(name, "utility type could not be expanded");
                    TypeExpr::unresolved(name, UnresolvedReason::UnsupportedUtility)
                }
            };
        }
        if !name.contains('.')
            && let Some(alias) = self.registry.alias_by_surface_name(name)
        {
            return self.expand_alias(alias, args);
        }
        if let Some(alias) = self.registry.alias_by_qualified_name(name) {
            return self.expand_alias(alias, args);
        }

        let id = if name.contains('.') {
            self.index
                .resolve_target(name, args.len())
                .or_else(|| self.index.resolve_surface(name, args.len()))
        } else {
            self.index.resolve_surface(name, args.len())
        };
        match id {
            Some(id) => TypeExpr::Reference { id, args },
            None if utility::is_known_unsupported(name) => {
                TypeExpr::unresolved(name, UnresolvedReason::UnsupportedUtility)
            }
            None => TypeExpr::unresolved(name, UnresolvedReason::UnknownName),
        }
    }

    fn expand_alias(&mut self, alias: &'a SourceAlias, args: Vec<TypeExpr>) -> TypeExpr {
        let cyclic = self.alias_stack.iter().any(|name| *name == alias.qualified_name)
            || self.alias_stack.len() >= MAX_ALIAS_EXPANSION_DEPTH as usize;
        if cyclic {
            trace!(alias = %alias.qualified_name, "cyclic alias");
            return TypeExpr::unresolved(alias.qualified_name.clone(), UnresolvedReason::CyclicAlias);
        }

        self.alias_stack.push(alias.qualified_name.clone());
        let saved_scopes = std::mem::replace(&mut self.scopes, vec![alias.type_parameters.clone()]);
        let saved_this = self.this_type.take();
        let body = self.lower(alias.type_node);
        self.scopes = saved_scopes;
        self.this_type = saved_this;
        self.alias_stack.pop();

        let env = InstantiationEnv::from_zip(&alias.type_parameters, &args);
        let expanded = substitute(&body, &env);
        utility::settle(&expanded, self.expander).unwrap_or_else(|_| {
            trace!(alias = %alias.qualified_name, "utility in alias body could not be expanded");
            TypeExpr::unresolved(alias.qualified_name.clone(), UnresolvedReason::UnsupportedUtility)
        })
    }

    // -------------------------------------------------------------------------
    // Catalog type strings
    // -------------------------------------------------------------------------

    /// Lower a catalog type reference with `scope` naming the generic parameters in scope.
    pub(crate) fn lower_type_ref(&self, type_ref: &TypeRef, scope: &[String]) -> TypeExpr {
        match type_ref {
            TypeRef::Named { name, args } => {
                if args.is_empty() && scope.iter().any(|p| p == name) {
                    return TypeExpr::TypeParameter(name.clone());
                }
                if args.is_empty()
                    && let Some(primitive) = primitive_for_target(name)
                {
                    return primitive;
                }
                let mut lowered: Vec<TypeExpr> = args.iter().map(|arg| self.lower_type_ref(arg, scope)).collect();
                if name == "System.Nullable`1" && lowered.len() == 1 {
                    let inner = lowered.pop().unwrap_or(TypeExpr::Unknown);
                    return TypeExpr::union([inner, TypeExpr::Null]);
                }
                match self.index.resolve_target(name, lowered.len()) {
                    Some(id) => TypeExpr::Reference { id, args: lowered },
                    None => TypeExpr::unresolved(name.clone(), UnresolvedReason::UnknownName),
                }
            }
            TypeRef::Array { element, .. } => TypeExpr::array(self.lower_type_ref(element, scope)),
            TypeRef::ByRef(inner) => self.lower_type_ref(inner, scope),
        }
    }
}

#[cfg(test)]
#[path = "../tests/lower_tests.rs"]
mod tests;
