//! Binding layer: syntax nodes to handles.
//!
//! Resolution uses the symbol table, the catalogs and argument counts only.
//! It never asks whether argument types fit a signature. Anything that does
//! not bind yields `None`; the `TypeSystem` turns that into a diagnostic.

use crate::catalog::UnifiedCatalog;
use crate::handles::{DeclId, HandleRegistry, MemberId, SignatureId, SignatureKey};
use crate::lower::{Lowerer, wrapper_mode};
use crate::nominal::NominalEnvironment;
use crate::registry::TypeRegistry;
use crate::types::{MemberEntry, NominalEntry, Origin, TypeExpr, TypeId};
use tracing::trace;
use tsnet_binder::{BoundProgram, symbol_flags};
use tsnet_common::limits::MAX_WRAPPER_PEEL_DEPTH;
use tsnet_metadata::ParameterMode;
use tsnet_parser::{NodeIndex, NodeKind, NodeRef, Program};

/// Result of peeling wrappers off a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Peeled {
    pub node: NodeRef,
    /// Outermost passing-mode wrapper, if any.
    pub mode: Option<ParameterMode>,
    pub is_this_arg: bool,
}

/// Strip parentheses and `thisarg`/`ref`/`out`/`inref` wrappers.
pub(crate) fn peel_wrappers(program: &Program, node: NodeRef) -> Peeled {
    let mut peeled = Peeled {
        node,
        mode: None,
        is_this_arg: false,
    };
    for _ in 0..MAX_WRAPPER_PEEL_DEPTH {
        let inner = match program.node(peeled.node).map(|n| &n.kind) {
            Some(NodeKind::ParenthesizedType(inner) | NodeKind::ParenthesizedExpression(inner)) => *inner,
            Some(NodeKind::TypeReference(data)) if data.type_arguments.len() == 1 => {
                match wrapper_mode(&data.name) {
                    Some(Some(mode)) => {
                        if peeled.mode.is_none() {
                            peeled.mode = Some(mode);
                        }
                    }
                    Some(None) => peeled.is_this_arg = true,
                    None => return peeled,
                }
                data.type_arguments[0]
            }
            _ => return peeled,
        };
        if inner.is_none() {
            return peeled;
        }
        peeled.node = NodeRef::new(node.file, inner);
    }
    trace!(?node, "wrapper peeling stopped at depth limit");
    peeled
}

/// Parameter list of a function-like node.
pub(crate) fn parameters_of(kind: &NodeKind) -> Option<&[NodeIndex]> {
    match kind {
        NodeKind::FunctionDeclaration(data) | NodeKind::FunctionExpression(data) => Some(&data.parameters),
        NodeKind::MethodDeclaration(data) => Some(&data.parameters),
        NodeKind::Constructor(data) => Some(&data.parameters),
        NodeKind::FunctionType(data) => Some(&data.parameters),
        _ => None,
    }
}

fn has_body(kind: &NodeKind) -> bool {
    match kind {
        NodeKind::FunctionDeclaration(data) | NodeKind::FunctionExpression(data) => data.body.is_some(),
        NodeKind::MethodDeclaration(data) => data.body.is_some(),
        NodeKind::Constructor(data) => data.body.is_some(),
        _ => false,
    }
}

pub(crate) struct BindingLayer<'a> {
    pub program: &'a Program,
    pub bound: &'a BoundProgram,
    pub registry: &'a TypeRegistry,
    pub catalog: &'a UnifiedCatalog,
    pub nominal: &'a NominalEnvironment,
    pub handles: &'a HandleRegistry,
}

impl<'a> BindingLayer<'a> {
    fn kind(&self, node: NodeRef) -> Option<&'a NodeKind> {
        self.program.node(node).map(|n| &n.kind)
    }

    fn child(&self, node: NodeRef, index: NodeIndex) -> Option<NodeRef> {
        index.get().map(|index| NodeRef::new(node.file, index))
    }

    // -------------------------------------------------------------------------
    // Declarations
    // -------------------------------------------------------------------------

    /// Handle of the declaration an identifier expression refers to.
    pub(crate) fn resolve_identifier(&self, identifier: NodeRef) -> Option<DeclId> {
        let peeled = peel_wrappers(self.program, identifier).node;
        let Some(NodeKind::Identifier(name)) = self.kind(peeled) else {
            return None;
        };
        let declaration = self.bound.declaration_of(peeled)?;
        Some(self.handles.mint_decl(declaration, name))
    }

    /// Handle of a declaration node itself.
    pub(crate) fn declaration(&self, node: NodeRef) -> Option<DeclId> {
        let name = self.kind(node)?.declaration_name()?;
        Some(self.handles.mint_decl(node, name))
    }

    pub(crate) fn resolve_member(&self, owner: &TypeId, name: &str) -> Option<MemberId> {
        let entry = self.catalog.entry(owner)?;
        entry.member(name)?;
        Some(self.handles.mint_member(owner, name))
    }

    // -------------------------------------------------------------------------
    // Calls
    // -------------------------------------------------------------------------

    pub(crate) fn resolve_call_signature(&self, call: NodeRef) -> Option<SignatureId> {
        let Some(NodeKind::CallExpression(data)) = self.kind(call) else {
            return None;
        };
        let arg_count = data.arguments.len();
        let callee = peel_wrappers(self.program, self.child(call, data.callee)?).node;
        match self.kind(callee)? {
            NodeKind::Identifier(name) => self.resolve_function_callee(callee, name, arg_count),
            NodeKind::PropertyAccess(access) => {
                let receiver = peel_wrappers(self.program, self.child(callee, access.expression)?).node;
                self.resolve_method_callee(receiver, &access.name, arg_count)
            }
            _ => None,
        }
    }

    fn resolve_function_callee(&self, callee: NodeRef, name: &str, arg_count: usize) -> Option<SignatureId> {
        let symbol = self.bound.symbol(self.bound.resolve_identifier(callee)?)?;
        if symbol.has_any_flags(symbol_flags::FUNCTION) {
            let overloads: Vec<NodeRef> = symbol
                .declarations
                .iter()
                .copied()
                .filter(|d| matches!(self.kind(*d), Some(NodeKind::FunctionDeclaration(_))))
                .collect();
            let chosen = self.select_overload(&overloads, arg_count)?;
            return Some(self.handles.mint_signature(SignatureKey::Node(chosen), None));
        }
        if symbol.has_any_flags(symbol_flags::VARIABLE | symbol_flags::PARAMETER) {
            let declaration = symbol.value_declaration.or_else(|| symbol.declarations.first().copied())?;
            let annotation = match self.kind(declaration)? {
                NodeKind::VariableDeclaration(data) => data.type_annotation,
                NodeKind::Parameter(data) => data.type_annotation,
                _ => return None,
            };
            let function_type = self.function_type_node(self.child(declaration, annotation)?)?;
            if !self.accepts(function_type, arg_count) {
                trace!(name, arg_count, "function-typed value does not accept argument count");
                return None;
            }
            return Some(self.handles.mint_signature(SignatureKey::Node(function_type), None));
        }
        None
    }

    /// Function-type node behind an annotation, following one alias.
    fn function_type_node(&self, annotation: NodeRef) -> Option<NodeRef> {
        let annotation = peel_wrappers(self.program, annotation).node;
        match self.kind(annotation)? {
            NodeKind::FunctionType(_) => Some(annotation),
            NodeKind::TypeReference(data) if data.type_arguments.is_empty() => {
                let alias = self.registry.alias_by_surface_name(&data.name)?;
                let body = peel_wrappers(self.program, alias.type_node).node;
                matches!(self.kind(body)?, NodeKind::FunctionType(_)).then_some(body)
            }
            _ => None,
        }
    }

    fn resolve_method_callee(&self, receiver: NodeRef, name: &str, arg_count: usize) -> Option<SignatureId> {
        let (owner, args, want_static) = self.receiver_type(receiver)?;
        let (declaring, member) = self.lookup_member(&owner, &args, name)?;
        if member.is_static != want_static {
            trace!(member = name, owner = %owner.stable_id(), "static-ness of member does not match receiver");
            return None;
        }
        self.member_signature(declaring, member, arg_count)
            .map(|key| self.handles.mint_signature(key, Some(declaring.type_id.clone())))
    }

    /// Nominal type of a call receiver, and whether it names the type itself.
    fn receiver_type(&self, receiver: NodeRef) -> Option<(TypeId, Vec<TypeExpr>, bool)> {
        match self.kind(receiver)? {
            NodeKind::ThisExpression => {
                let (owner, args) = self.enclosing_type(receiver)?;
                Some((owner, args, false))
            }
            NodeKind::Identifier(name) => match self.bound.resolve_identifier(receiver) {
                Some(symbol_id) => {
                    let symbol = self.bound.symbol(symbol_id)?;
                    let declaration = symbol.value_declaration.or_else(|| symbol.declarations.first().copied())?;
                    if symbol.has_any_flags(symbol_flags::CLASS | symbol_flags::ENUM) {
                        let owner = self.type_of_declaration(declaration)?;
                        return Some((owner, Vec::new(), true));
                    }
                    let annotation = match self.kind(declaration)? {
                        NodeKind::VariableDeclaration(data) => data.type_annotation,
                        NodeKind::Parameter(data) => data.type_annotation,
                        _ => return None,
                    };
                    let mut lowerer = Lowerer::new(self.program, self.registry, self.catalog.index());
                    let ty = lowerer.lower_annotation(self.child(declaration, annotation)?);
                    let (owner, args) = self.catalog.apparent_nominal(&ty)?;
                    Some((owner, args, false))
                }
                None => {
                    let owner = self.catalog.index().resolve_surface(name, 0)?;
                    Some((owner, Vec::new(), true))
                }
            },
            NodeKind::PropertyAccess(_) => {
                let dotted = self.dotted_name(receiver)?;
                let owner = self.catalog.index().resolve_target(&dotted, 0)?;
                Some((owner, Vec::new(), true))
            }
            _ => None,
        }
    }

    /// `System.Text.StringBuilder` for a chain of property accesses on an
    /// unbound identifier.
    fn dotted_name(&self, node: NodeRef) -> Option<String> {
        match self.kind(node)? {
            NodeKind::Identifier(name) if self.bound.resolve_identifier(node).is_none() => Some(name.clone()),
            NodeKind::PropertyAccess(access) => {
                let prefix = self.dotted_name(self.child(node, access.expression)?)?;
                Some(format!("{prefix}.{}", access.name))
            }
            _ => None,
        }
    }

    /// Class or interface enclosing `node`, with its own type parameters as arguments.
    pub(crate) fn enclosing_type(&self, node: NodeRef) -> Option<(TypeId, Vec<TypeExpr>)> {
        let arena = &self.program.file(node.file)?.arena;
        let mut current = node.node;
        while current.is_some() {
            if matches!(
                arena.kind(current),
                Some(NodeKind::ClassDeclaration(_) | NodeKind::InterfaceDeclaration(_))
            ) {
                let owner = self.type_of_declaration(NodeRef::new(node.file, current))?;
                let entry = self.catalog.entry(&owner)?;
                let args = entry
                    .type_parameters
                    .iter()
                    .map(|name| TypeExpr::TypeParameter(name.clone()))
                    .collect();
                return Some((owner, args));
            }
            current = arena.parent(current);
        }
        None
    }

    pub(crate) fn type_of_declaration(&self, declaration: NodeRef) -> Option<TypeId> {
        let qualified = self.registry.qualified_name_of(declaration)?;
        self.catalog.index().resolve_target(qualified, 0)
    }

    fn lookup_member(
        &self,
        owner: &TypeId,
        args: &[TypeExpr],
        name: &str,
    ) -> Option<(&'a NominalEntry, &'a MemberEntry)> {
        let (declaring, _) = self
            .nominal
            .find_member_declaring_type(self.catalog, owner, args, name)
            .ok()
            .flatten()?;
        let entry = self.catalog.entry(&declaring.type_id)?;
        Some((entry, entry.member(name)?))
    }

    fn member_signature(&self, owner: &NominalEntry, member: &MemberEntry, arg_count: usize) -> Option<SignatureKey> {
        if !member.signatures.is_empty() {
            let index = member.signatures.iter().position(|s| s.accepts(arg_count))?;
            return Some(SignatureKey::Method {
                owner: owner.type_id.stable_id().to_string(),
                member: member.surface_name.clone(),
                index,
            });
        }
        let methods: Vec<NodeRef> = member
            .declarations
            .iter()
            .copied()
            .filter(|d| matches!(self.kind(*d), Some(NodeKind::MethodDeclaration(_))))
            .collect();
        if !methods.is_empty() {
            return self.select_overload(&methods, arg_count).map(SignatureKey::Node);
        }
        // A property whose annotation is a function type.
        let function_type = self.function_type_node(member.annotation?)?;
        self.accepts(function_type, arg_count)
            .then_some(SignatureKey::Node(function_type))
    }

    // -------------------------------------------------------------------------
    // Constructors
    // -------------------------------------------------------------------------

    pub(crate) fn resolve_constructor_signature(&self, new_expression: NodeRef) -> Option<SignatureId> {
        let Some(NodeKind::NewExpression(data)) = self.kind(new_expression) else {
            return None;
        };
        let arg_count = data.arguments.len();
        let type_arg_count = data.type_arguments.len();
        let callee = peel_wrappers(self.program, self.child(new_expression, data.callee)?).node;
        let constructed = match self.kind(callee)? {
            NodeKind::Identifier(name) => match self.bound.resolve_identifier(callee) {
                Some(symbol_id) => {
                    let symbol = self.bound.symbol(symbol_id)?;
                    if !symbol.has_any_flags(symbol_flags::CLASS) {
                        return None;
                    }
                    let declaration = symbol.value_declaration.or_else(|| symbol.declarations.first().copied())?;
                    self.type_of_declaration(declaration)?
                }
                None => self.catalog.index().resolve_surface(name, type_arg_count)?,
            },
            NodeKind::PropertyAccess(_) => {
                let dotted = self.dotted_name(callee)?;
                self.catalog.index().resolve_target(&dotted, type_arg_count)?
            }
            _ => return None,
        };

        let key = self.constructor_key(&constructed, arg_count)?;
        Some(self.handles.mint_signature(key, Some(constructed)))
    }

    /// Constructor of `constructed` or, when it declares none, of the nearest
    /// base that does. With none anywhere, the implicit parameterless one.
    fn constructor_key(&self, constructed: &TypeId, arg_count: usize) -> Option<SignatureKey> {
        let chain = self.nominal.get_inheritance_chain(self.catalog, constructed).ok()?;
        for id in chain.iter() {
            let entry = self.catalog.entry(id)?;
            match entry.origin {
                Origin::Source => {
                    let declaration = self.registry.resolve_by_qualified_name(entry.type_id.target_name())?;
                    if declaration.constructors.is_empty() {
                        continue;
                    }
                    return self
                        .select_overload(&declaration.constructors, arg_count)
                        .map(|node| SignatureKey::SourceConstructor {
                            node,
                            constructed: constructed.stable_id().to_string(),
                        });
                }
                Origin::Assembly => {
                    if entry.constructors.is_empty() {
                        continue;
                    }
                    let index = entry.constructors.iter().position(|c| c.accepts(arg_count))?;
                    return Some(SignatureKey::Constructor {
                        owner: entry.type_id.stable_id().to_string(),
                        index,
                        constructed: constructed.stable_id().to_string(),
                    });
                }
            }
        }
        (arg_count == 0).then(|| SignatureKey::ImplicitConstructor(constructed.stable_id().to_string()))
    }

    // -------------------------------------------------------------------------
    // Arity
    // -------------------------------------------------------------------------

    /// `(required, maximum)` parameter counts of a function-like node.
    fn arity(&self, node: NodeRef) -> Option<(usize, Option<usize>)> {
        let parameters = parameters_of(self.kind(node)?)?;
        let mut required = 0;
        let mut total = Some(0usize);
        for &parameter in parameters {
            let Some(NodeKind::Parameter(data)) = self.kind(NodeRef::new(node.file, parameter)) else {
                continue;
            };
            if data.rest {
                total = None;
            } else {
                total = total.map(|t| t + 1);
                if !data.optional && data.initializer.is_none() {
                    required += 1;
                }
            }
        }
        Some((required, total))
    }

    fn accepts(&self, node: NodeRef, arg_count: usize) -> bool {
        self.arity(node)
            .is_some_and(|(required, total)| arg_count >= required && total.is_none_or(|t| arg_count <= t))
    }

    /// Overload signatures among `candidates`. When signatures exist
    /// alongside an implementation, the implementation is not one of them.
    pub(crate) fn signature_declarations(&self, candidates: &[NodeRef]) -> Vec<NodeRef> {
        if candidates.len() > 1 {
            let signatures: Vec<NodeRef> = candidates
                .iter()
                .copied()
                .filter(|c| self.kind(*c).is_some_and(|k| !has_body(k)))
                .collect();
            if !signatures.is_empty() {
                return signatures;
            }
        }
        candidates.to_vec()
    }

    fn select_overload(&self, candidates: &[NodeRef], arg_count: usize) -> Option<NodeRef> {
        self.signature_declarations(candidates)
            .into_iter()
            .find(|c| self.accepts(*c, arg_count))
    }
}

#[cfg(test)]
#[path = "../tests/binding_tests.rs"]
mod tests;
