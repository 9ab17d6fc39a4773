//! The `TypeSystem`: the single query authority over one compilation.
//!
//! Construction runs every stage once, in dependency order:
//!
//! 1. bind the parsed `Program`
//! 2. build the source `TypeRegistry`
//! 3. build the `UnifiedCatalog` over the registry and the metadata catalog
//!
//! After that the substrate is read-only apart from the write-once caches in
//! the nominal environment and the handle registry, so queries may run on
//! many threads at once.
//!
//! Every query answers `Ok(type)` or `Err(QueryError)`. A type that cannot be
//! resolved is an error carrying a diagnostic, never a default.

use crate::binding::BindingLayer;
use crate::catalog::UnifiedCatalog;
use crate::config::TypeSystemConfig;
use crate::error::{QueryError, QueryResult};
use crate::handles::{DeclId, HandleRegistry, MemberId, SignatureId, SignatureInfo, SignatureKey};
use crate::lower::{Lowerer, node_location};
use crate::nominal::NominalEnvironment;
use crate::registry::TypeRegistry;
use crate::subst::{InstantiationEnv, substitute, substitute_shape};
use crate::types::{
    FunctionShape, MemberEntry, MemberKind, NominalEntry, PropertyInfo, TypeExpr, TypeId, UnresolvedReason,
};
use crate::utility::{self, StructuralExpander};
use rustc_hash::FxHashSet;
use std::cell::RefCell;
use std::sync::Arc;
use tracing::{debug, trace};
use tsnet_binder::BoundProgram;
use tsnet_common::{Diagnostic, diagnostic_codes};
use tsnet_metadata::{MetadataCatalog, ParameterMode};
use tsnet_parser::{NodeIndex, NodeKind, NodeRef, Program};

/// Input of `TypeSystem::resolve_call`.
#[derive(Clone, Debug, PartialEq)]
pub struct CallQuery {
    pub signature: SignatureId,
    pub arg_count: usize,
    /// Explicit call-site type arguments.
    pub type_args: Vec<TypeExpr>,
    /// Type of the receiver of a method call, used to instantiate the
    /// declaring type's parameters.
    pub receiver: Option<TypeExpr>,
}

impl CallQuery {
    #[must_use]
    pub fn new(signature: SignatureId, arg_count: usize) -> Self {
        Self {
            signature,
            arg_count,
            type_args: Vec::new(),
            receiver: None,
        }
    }

    #[must_use]
    pub fn with_type_args(mut self, type_args: Vec<TypeExpr>) -> Self {
        self.type_args = type_args;
        self
    }

    #[must_use]
    pub fn with_receiver(mut self, receiver: TypeExpr) -> Self {
        self.receiver = Some(receiver);
        self
    }
}

/// Parameter types for each argument of a call, and its result type.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolvedCall {
    pub parameter_types: Vec<TypeExpr>,
    pub parameter_modes: Vec<ParameterMode>,
    pub return_type: TypeExpr,
}

/// Structural expansion for utility types, guarded against a type whose
/// members mention a utility over itself.
struct Expansion<'s> {
    system: &'s TypeSystem,
    active: RefCell<Vec<TypeId>>,
}

impl StructuralExpander for Expansion<'_> {
    fn structural_members(&self, ty: &TypeExpr) -> QueryResult<Vec<PropertyInfo>> {
        let nominal = self.system.catalog.apparent_nominal(ty).map(|(id, _)| id);
        if let Some(id) = &nominal {
            if self.active.borrow().contains(id) {
                trace!(ty = %id.stable_id(), "utility expansion re-entered its own type");
                return Err(QueryError::from_code(
                    diagnostic_codes::CYCLIC_TYPE_ALIAS,
                    &[id.surface_name()],
                ));
            }
            self.active.borrow_mut().push(id.clone());
        }
        let members = self.system.structural_members_in(ty, self);
        if nominal.is_some() {
            self.active.borrow_mut().pop();
        }
        members
    }
}

fn unresolved_error(name: &str, reason: UnresolvedReason) -> QueryError {
    let code = match reason {
        UnresolvedReason::UnknownName => diagnostic_codes::UNRESOLVED_TYPE_NAME,
        UnresolvedReason::MissingAnnotation => diagnostic_codes::MISSING_TYPE_ANNOTATION,
        UnresolvedReason::UnsupportedUtility => diagnostic_codes::UNSUPPORTED_UTILITY_TYPE,
        UnresolvedReason::CyclicAlias => diagnostic_codes::CYCLIC_TYPE_ALIAS,
        UnresolvedReason::UnsupportedSyntax => diagnostic_codes::UNSUPPORTED_TYPE_SYNTAX,
    };
    QueryError::from_code(code, &[name])
}

fn member_not_found(ty: &TypeExpr, name: &str) -> QueryError {
    QueryError::from_code(
        diagnostic_codes::MEMBER_NOT_FOUND,
        &[ty.to_string().as_str(), name],
    )
}

fn count_mismatch(name: &str, expected: usize, received: usize) -> QueryError {
    QueryError::from_code(
        diagnostic_codes::TYPE_ARGUMENT_COUNT_MISMATCH,
        &[name, expected.to_string().as_str(), received.to_string().as_str()],
    )
}

fn length_property() -> PropertyInfo {
    PropertyInfo {
        name: "length".to_string(),
        ty: TypeExpr::NUMBER,
        optional: false,
        readonly: true,
    }
}

/// Element type of a rest parameter or rest tuple element.
fn element_type(ty: &TypeExpr) -> TypeExpr {
    match ty {
        TypeExpr::Array(element) => element.as_ref().clone(),
        other => other.clone(),
    }
}

fn overloaded(shapes: Vec<FunctionShape>) -> TypeExpr {
    let mut functions: Vec<TypeExpr> = shapes.into_iter().map(|s| TypeExpr::Function(Box::new(s))).collect();
    if functions.len() == 1 {
        functions.pop().unwrap_or(TypeExpr::Never)
    } else {
        TypeExpr::Intersection(functions)
    }
}

fn with_undefined(ty: TypeExpr, optional: bool) -> TypeExpr {
    if optional {
        TypeExpr::union([ty, TypeExpr::Undefined])
    } else {
        ty
    }
}

pub struct TypeSystem {
    program: Program,
    bound: BoundProgram,
    registry: TypeRegistry,
    catalog: UnifiedCatalog,
    nominal: NominalEnvironment,
    handles: HandleRegistry,
    config: TypeSystemConfig,
    diagnostics: Vec<Diagnostic>,
}

impl TypeSystem {
    // =========================================================================
    // Construction
    // =========================================================================

    /// Build the type system over `program` and an already loaded catalog.
    #[must_use]
    pub fn new(program: Program, metadata: &MetadataCatalog, config: TypeSystemConfig) -> Self {
        let bound = BoundProgram::bind(&program);
        let registry = TypeRegistry::build(&program, &config);
        let catalog = UnifiedCatalog::build(&program, &registry, metadata, &config);

        let mut diagnostics: Vec<Diagnostic> = program.diagnostics().cloned().collect();
        diagnostics.extend(metadata.diagnostics().iter().cloned());
        diagnostics.extend(catalog.diagnostics().iter().cloned());
        debug!(
            files = program.file_count(),
            library_types = metadata.len(),
            nominal_types = catalog.len(),
            diagnostics = diagnostics.len(),
            "type system constructed"
        );

        Self {
            program,
            bound,
            registry,
            catalog,
            nominal: NominalEnvironment::new(),
            handles: HandleRegistry::new(),
            config,
            diagnostics,
        }
    }

    /// Load the catalog roots named in `config`, then build.
    #[must_use]
    pub fn build(program: Program, config: TypeSystemConfig) -> Self {
        let metadata = MetadataCatalog::load(config.catalog_roots.as_slice());
        Self::new(program, &metadata, config)
    }

    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }

    #[must_use]
    pub fn config(&self) -> &TypeSystemConfig {
        &self.config
    }

    /// Parse, catalog-load and catalog-build diagnostics.
    #[must_use]
    pub fn construction_diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Every nominal type: source declarations first, then library types.
    pub fn nominal_types(&self) -> impl Iterator<Item = &Arc<NominalEntry>> {
        self.catalog.entries()
    }

    fn binding(&self) -> BindingLayer<'_> {
        BindingLayer {
            program: &self.program,
            bound: &self.bound,
            registry: &self.registry,
            catalog: &self.catalog,
            nominal: &self.nominal,
            handles: &self.handles,
        }
    }

    fn expansion(&self) -> Expansion<'_> {
        Expansion {
            system: self,
            active: RefCell::new(Vec::new()),
        }
    }

    fn lowerer<'s>(&'s self, cx: &'s Expansion<'s>) -> Lowerer<'s> {
        Lowerer::new(&self.program, &self.registry, self.catalog.index()).with_expander(cx)
    }

    fn kind(&self, node: NodeRef) -> Option<&NodeKind> {
        self.program.node(node).map(|n| &n.kind)
    }

    fn locate(&self, error: QueryError, at: Option<NodeRef>) -> QueryError {
        match at {
            Some(node) => {
                let (file, start, length) = node_location(&self.program, node);
                error.at(&file, start, length)
            }
            None => error,
        }
    }

    fn checked(&self, ty: TypeExpr, at: Option<NodeRef>) -> QueryResult<TypeExpr> {
        match ty.first_unresolved() {
            None => Ok(ty),
            Some((name, reason)) => Err(self.locate(unresolved_error(name, reason), at)),
        }
    }

    /// Expand utilities whose arguments were closed by substitution.
    fn settled(&self, ty: &TypeExpr, cx: &Expansion<'_>) -> QueryResult<TypeExpr> {
        utility::settle(ty, Some(cx))
    }

    fn checked_shape(&self, shape: FunctionShape, at: Option<NodeRef>) -> QueryResult<FunctionShape> {
        let unresolved = shape
            .params
            .iter()
            .map(|p| &p.ty)
            .chain(std::iter::once(&shape.return_type))
            .find_map(TypeExpr::first_unresolved);
        match unresolved {
            Some((name, reason)) => Err(self.locate(unresolved_error(name, reason), at)),
            None => Ok(shape),
        }
    }

    /// Source text of a callee-like expression, for diagnostics.
    fn expression_text(&self, node: NodeRef) -> String {
        match self.kind(node) {
            Some(NodeKind::Identifier(name)) => name.clone(),
            Some(NodeKind::ThisExpression) => "this".to_string(),
            Some(NodeKind::PropertyAccess(access)) => match access.expression.get() {
                Some(expression) => format!(
                    "{}.{}",
                    self.expression_text(NodeRef::new(node.file, expression)),
                    access.name
                ),
                None => access.name.clone(),
            },
            Some(NodeKind::ParenthesizedExpression(inner)) if inner.is_some() => {
                self.expression_text(NodeRef::new(node.file, *inner))
            }
            Some(other) => other.name().to_string(),
            None => "<missing>".to_string(),
        }
    }

    // =========================================================================
    // Names and handles
    // =========================================================================

    /// Nominal type by surface name, dotted target name, or stable id.
    pub fn lookup_type(&self, name: &str) -> QueryResult<TypeId> {
        let index = self.catalog.index();
        let found = if name.contains(':') {
            index.by_stable_id(name).cloned()
        } else if name.contains('.') || name.contains('`') {
            index
                .resolve_target(name, 0)
                .or_else(|| index.resolve_surface(name, 0))
        } else {
            match self.registry.resolve_by_surface_name(name) {
                Some(declaration) => index.resolve_target(&declaration.qualified_name, 0),
                None => index.resolve_surface(name, 0),
            }
        };
        found.ok_or_else(|| QueryError::from_code(diagnostic_codes::UNRESOLVED_TYPE_NAME, &[name]))
    }

    pub fn nominal_entry(&self, id: &TypeId) -> QueryResult<Arc<NominalEntry>> {
        self.catalog
            .entry(id)
            .cloned()
            .ok_or_else(|| QueryError::from_code(diagnostic_codes::UNKNOWN_STABLE_ID, &[id.stable_id()]))
    }

    /// Declaration an identifier expression refers to.
    pub fn resolve_identifier(&self, identifier: NodeRef) -> QueryResult<DeclId> {
        self.binding().resolve_identifier(identifier).ok_or_else(|| {
            let name = self.expression_text(identifier);
            self.locate(
                QueryError::from_code(diagnostic_codes::UNRESOLVED_IDENTIFIER, &[name.as_str()]),
                Some(identifier),
            )
        })
    }

    /// Handle of a declaration node.
    pub fn declaration(&self, node: NodeRef) -> QueryResult<DeclId> {
        self.binding().declaration(node).ok_or_else(|| {
            let name = self.expression_text(node);
            self.locate(
                QueryError::from_code(diagnostic_codes::UNRESOLVED_IDENTIFIER, &[name.as_str()]),
                Some(node),
            )
        })
    }

    /// Signature a call expression binds to, chosen by argument count.
    pub fn resolve_call_signature(&self, call: NodeRef) -> QueryResult<SignatureId> {
        if let Some(id) = self.binding().resolve_call_signature(call) {
            return Ok(id);
        }
        let (callee, arg_count) = match self.kind(call) {
            Some(NodeKind::CallExpression(data)) => (data.callee, data.arguments.len()),
            _ => (NodeIndex::NONE, 0),
        };
        let name = callee
            .get()
            .map_or_else(|| "<call>".to_string(), |c| self.expression_text(NodeRef::new(call.file, c)));
        Err(self.locate(
            QueryError::from_code(
                diagnostic_codes::UNRESOLVED_CALL_SIGNATURE,
                &[name.as_str(), arg_count.to_string().as_str()],
            ),
            Some(call),
        ))
    }

    /// Constructor a `new` expression binds to, chosen by argument count.
    pub fn resolve_constructor_signature(&self, new_expression: NodeRef) -> QueryResult<SignatureId> {
        if let Some(id) = self.binding().resolve_constructor_signature(new_expression) {
            return Ok(id);
        }
        let (callee, arg_count) = match self.kind(new_expression) {
            Some(NodeKind::NewExpression(data)) => (data.callee, data.arguments.len()),
            _ => (NodeIndex::NONE, 0),
        };
        let name = callee.get().map_or_else(
            || "<new>".to_string(),
            |c| self.expression_text(NodeRef::new(new_expression.file, c)),
        );
        Err(self.locate(
            QueryError::from_code(
                diagnostic_codes::UNRESOLVED_CONSTRUCTOR,
                &[name.as_str(), arg_count.to_string().as_str()],
            ),
            Some(new_expression),
        ))
    }

    /// Handle of member `name` as seen from `owner`, minted on its declaring type.
    pub fn resolve_member(&self, owner: &TypeId, name: &str) -> QueryResult<MemberId> {
        let declaring = self
            .nominal
            .find_member_declaring_type(&self.catalog, owner, &[], name)?
            .map(|(entry, _)| entry.type_id.clone());
        declaring
            .and_then(|declaring| self.binding().resolve_member(&declaring, name))
            .ok_or_else(|| member_not_found(&TypeExpr::reference(owner.clone()), name))
    }

    /// Declared type of a member handle, in terms of its owner's type parameters.
    pub fn member_type(&self, id: MemberId) -> QueryResult<TypeExpr> {
        let info = self.handles.member(id)?;
        let owner = self.nominal_entry(&info.owner)?;
        let member = owner
            .member(&info.name)
            .ok_or_else(|| QueryError::handle_not_minted(id))?;
        let cx = self.expansion();
        self.member_declared_type(&owner, member, &cx)
    }

    // =========================================================================
    // Declarations and annotations
    // =========================================================================

    /// Type of a declaration, read from its explicit annotation only.
    pub fn type_of_decl(&self, id: DeclId) -> QueryResult<TypeExpr> {
        let info = self.handles.decl(id)?;
        let node = info.node;
        let kind = self.kind(node).ok_or_else(|| QueryError::handle_not_minted(id))?;
        let child = |index: NodeIndex| index.get().map(|index| NodeRef::new(node.file, index));
        let cx = self.expansion();

        let ty = match kind {
            NodeKind::VariableDeclaration(data) => self.annotated(child(data.type_annotation), &info.name, node, &cx)?,
            NodeKind::Parameter(data) => self.annotated(child(data.type_annotation), &info.name, node, &cx)?,
            NodeKind::PropertyDeclaration(data) => self.annotated(child(data.type_annotation), &info.name, node, &cx)?,
            NodeKind::GetAccessor(data) => self.annotated(child(data.type_annotation), &info.name, node, &cx)?,
            NodeKind::SetAccessor(data) => {
                let annotation = data.parameters.first().and_then(|&p| match self.kind(NodeRef::new(node.file, p)) {
                    Some(NodeKind::Parameter(parameter)) => child(parameter.type_annotation),
                    _ => None,
                });
                self.annotated(annotation, &info.name, node, &cx)?
            }
            NodeKind::FunctionDeclaration(_) | NodeKind::FunctionExpression(_) | NodeKind::MethodDeclaration(_) => {
                let shape = self
                    .lowerer(&cx)
                    .signature_of(node, None)
                    .ok_or_else(|| QueryError::handle_not_minted(id))?;
                TypeExpr::Function(Box::new(shape))
            }
            NodeKind::ClassDeclaration(_) | NodeKind::InterfaceDeclaration(_) | NodeKind::EnumDeclaration(_) => {
                let type_id = self.nominal_of_declaration(node, &info.name)?;
                TypeExpr::reference(type_id)
            }
            NodeKind::EnumMember(_) => {
                let parent = self
                    .program
                    .file(node.file)
                    .map(|file| NodeRef::new(node.file, file.arena.parent(node.node)))
                    .ok_or_else(|| QueryError::handle_not_minted(id))?;
                TypeExpr::reference(self.nominal_of_declaration(parent, &info.name)?)
            }
            other => {
                return Err(self.locate(
                    QueryError::from_code(diagnostic_codes::UNSUPPORTED_TYPE_SYNTAX, &[other.name()]),
                    Some(node),
                ));
            }
        };
        self.checked(ty, Some(node))
    }

    fn annotated(
        &self,
        annotation: Option<NodeRef>,
        name: &str,
        declaration: NodeRef,
        cx: &Expansion<'_>,
    ) -> QueryResult<TypeExpr> {
        match annotation {
            Some(annotation) => Ok(self.lowerer(cx).lower_annotation(annotation)),
            None => Err(self.locate(
                QueryError::from_code(diagnostic_codes::MISSING_TYPE_ANNOTATION, &[name]),
                Some(declaration),
            )),
        }
    }

    fn nominal_of_declaration(&self, declaration: NodeRef, name: &str) -> QueryResult<TypeId> {
        self.binding().type_of_declaration(declaration).ok_or_else(|| {
            self.locate(
                QueryError::from_code(diagnostic_codes::UNRESOLVED_TYPE_NAME, &[name]),
                Some(declaration),
            )
        })
    }

    /// Lower a type-annotation node.
    pub fn type_from_annotation(&self, annotation: NodeRef) -> QueryResult<TypeExpr> {
        let cx = self.expansion();
        let ty = self.lowerer(&cx).lower_annotation(annotation);
        self.checked(ty, Some(annotation))
    }

    // =========================================================================
    // Signatures and calls
    // =========================================================================

    /// Shape of a signature handle, before any call-site instantiation.
    pub fn signature(&self, id: SignatureId) -> QueryResult<FunctionShape> {
        let info = self.handles.signature(id)?;
        let cx = self.expansion();
        self.signature_in(id, &info, &cx)
    }

    fn signature_in(&self, id: SignatureId, info: &SignatureInfo, cx: &Expansion<'_>) -> QueryResult<FunctionShape> {
        let constructed = match &info.owner {
            Some(owner) => Some(self.nominal_entry(owner)?),
            None => None,
        };
        match &info.key {
            SignatureKey::Node(node) => {
                let shape = self
                    .lowerer(cx)
                    .signature_of(*node, None)
                    .ok_or_else(|| QueryError::handle_not_minted(id))?;
                self.checked_shape(shape, Some(*node))
            }
            SignatureKey::SourceConstructor { node, .. } => {
                let shape = self
                    .lowerer(cx)
                    .signature_of(*node, constructed.as_ref().map(|c| c.self_reference()))
                    .ok_or_else(|| QueryError::handle_not_minted(id))?;
                let shape = self.checked_shape(shape, Some(*node))?;
                match (constructed, self.binding().enclosing_type(*node)) {
                    (Some(constructed), Some((declaring, _))) if constructed.type_id != declaring => {
                        self.inherited_constructor(&constructed, &declaring, shape, cx)
                    }
                    _ => Ok(shape),
                }
            }
            SignatureKey::ImplicitConstructor(_) => Ok(FunctionShape {
                type_params: Vec::new(),
                params: Vec::new(),
                return_type: constructed.map_or(TypeExpr::Void, |c| c.self_reference()),
            }),
            SignatureKey::Method { owner, member, index } => {
                let shape = self
                    .catalog
                    .get(owner)
                    .and_then(|entry| entry.member(member))
                    .and_then(|member| member.signatures.get(*index))
                    .cloned()
                    .ok_or_else(|| QueryError::handle_not_minted(id))?;
                self.checked_shape(shape, None)
            }
            SignatureKey::Constructor { owner, index, .. } => {
                let declaring = self.catalog.get(owner).ok_or_else(|| QueryError::handle_not_minted(id))?;
                let shape = declaring
                    .constructors
                    .get(*index)
                    .cloned()
                    .ok_or_else(|| QueryError::handle_not_minted(id))?;
                let shape = self.checked_shape(shape, None)?;
                match constructed {
                    Some(constructed) if constructed.type_id != declaring.type_id => {
                        self.inherited_constructor(&constructed, &declaring.type_id, shape, cx)
                    }
                    _ => Ok(shape),
                }
            }
        }
    }

    /// A base-class constructor used to build `constructed`: parameters seen
    /// through the derived type, result is the derived type.
    fn inherited_constructor(
        &self,
        constructed: &NominalEntry,
        declaring: &TypeId,
        shape: FunctionShape,
        cx: &Expansion<'_>,
    ) -> QueryResult<FunctionShape> {
        let TypeExpr::Reference { args, .. } = constructed.self_reference() else {
            return Ok(shape);
        };
        let env = self
            .nominal
            .get_instantiation(&self.catalog, &constructed.type_id, &args, declaring)?
            .unwrap_or_default();
        let params = shape
            .params
            .into_iter()
            .map(|mut param| {
                param.ty = self.settled(&substitute(&param.ty, &env), cx)?;
                Ok(param)
            })
            .collect::<QueryResult<Vec<_>>>()?;
        Ok(FunctionShape {
            type_params: shape.type_params,
            params,
            return_type: constructed.self_reference(),
        })
    }

    /// Parameter type per argument and the return type of one call.
    pub fn resolve_call(&self, query: &CallQuery) -> QueryResult<ResolvedCall> {
        let info = self.handles.signature(query.signature)?;
        let cx = self.expansion();
        let mut shape = self.signature_in(query.signature, &info, &cx)?;

        if let (Some(receiver), Some(owner)) = (&query.receiver, &info.owner)
            && let Some((id, args)) = self.catalog.apparent_nominal(receiver)
            && let Some(env) = self.nominal.get_instantiation(&self.catalog, &id, &args, owner)?
        {
            shape = utility::settle_shape(&substitute_shape(&shape, &env), Some(&cx))?;
        }

        if !query.type_args.is_empty() {
            if query.type_args.len() != shape.type_params.len() {
                let display = TypeExpr::Function(Box::new(shape.clone())).to_string();
                return Err(count_mismatch(&display, shape.type_params.len(), query.type_args.len()));
            }
            let names: Vec<String> = shape.type_params.iter().map(|p| p.name.clone()).collect();
            let env = InstantiationEnv::from_zip(&names, &query.type_args);
            let substituted = FunctionShape {
                type_params: Vec::new(),
                params: shape
                    .params
                    .into_iter()
                    .map(|mut param| {
                        param.ty = substitute(&param.ty, &env);
                        param
                    })
                    .collect(),
                return_type: substitute(&shape.return_type, &env),
            };
            shape = utility::settle_shape(&substituted, Some(&cx))?;
        }

        if !shape.accepts(query.arg_count) {
            let display = TypeExpr::Function(Box::new(shape.clone())).to_string();
            return Err(QueryError::from_code(
                diagnostic_codes::UNRESOLVED_CALL_SIGNATURE,
                &[display.as_str(), query.arg_count.to_string().as_str()],
            ));
        }

        let (rest, positional) = match shape.params.split_last() {
            Some((last, init)) if last.rest => (Some(last), init),
            _ => (None, shape.params.as_slice()),
        };
        let mut parameter_types = Vec::with_capacity(query.arg_count);
        let mut parameter_modes = Vec::with_capacity(query.arg_count);
        for index in 0..query.arg_count {
            if let Some(param) = positional.get(index) {
                parameter_types.push(param.ty.clone());
                parameter_modes.push(param.mode);
            } else if let Some(rest) = rest {
                parameter_types.push(element_type(&rest.ty));
                parameter_modes.push(rest.mode);
            }
        }
        Ok(ResolvedCall {
            parameter_types,
            parameter_modes,
            return_type: shape.return_type.clone(),
        })
    }

    // =========================================================================
    // Members
    // =========================================================================

    /// Declared type of `member`, in terms of `owner`'s own type parameters.
    fn member_declared_type(
        &self,
        owner: &NominalEntry,
        member: &MemberEntry,
        cx: &Expansion<'_>,
    ) -> QueryResult<TypeExpr> {
        let at = member.declarations.first().copied();
        if let Some(ty) = &member.ty {
            return self.checked(ty.clone(), at);
        }
        if !member.signatures.is_empty() {
            let shapes = member
                .signatures
                .iter()
                .map(|shape| self.checked_shape(shape.clone(), None))
                .collect::<QueryResult<Vec<_>>>()?;
            return Ok(overloaded(shapes));
        }
        if member.kind == MemberKind::Method {
            let methods: Vec<NodeRef> = member
                .declarations
                .iter()
                .copied()
                .filter(|d| matches!(self.kind(*d), Some(NodeKind::MethodDeclaration(_))))
                .collect();
            let mut shapes = Vec::new();
            for method in self.binding().signature_declarations(&methods) {
                if let Some(shape) = self.lowerer(cx).signature_of(method, None) {
                    shapes.push(self.checked_shape(shape, Some(method))?);
                }
            }
            if !shapes.is_empty() {
                return Ok(overloaded(shapes));
            }
        }
        match member.annotation {
            Some(annotation) => {
                let ty = self.lowerer(cx).lower_annotation(annotation);
                self.checked(ty, Some(annotation))
            }
            None => {
                let name = format!("{}.{}", owner.type_id.surface_name(), member.surface_name);
                Err(self.locate(
                    QueryError::from_code(diagnostic_codes::MISSING_TYPE_ANNOTATION, &[name.as_str()]),
                    at,
                ))
            }
        }
    }

    /// Member `name` of `ty`, instantiated for `ty`'s arguments.
    fn lookup_member_in(&self, ty: &TypeExpr, name: &str, cx: &Expansion<'_>) -> QueryResult<PropertyInfo> {
        if let Some((id, args)) = self.catalog.apparent_nominal(ty) {
            let Some((owner, env)) = self.nominal.find_member_declaring_type(&self.catalog, &id, &args, name)? else {
                return Err(member_not_found(ty, name));
            };
            let member = owner.member(name).ok_or_else(|| member_not_found(ty, name))?;
            let declared = self.member_declared_type(&owner, member, cx)?;
            return Ok(PropertyInfo {
                name: member.surface_name.clone(),
                ty: self.settled(&substitute(&declared, &env), cx)?,
                optional: member.is_optional,
                readonly: member.is_readonly,
            });
        }
        self.structural_members_in(ty, cx)?
            .into_iter()
            .find(|member| member.name == name)
            .ok_or_else(|| member_not_found(ty, name))
    }

    /// Type of member `name` on `ty`. Primitives are looked up on their
    /// carrier type.
    pub fn get_member_type(&self, ty: &TypeExpr, name: &str) -> QueryResult<TypeExpr> {
        let cx = self.expansion();
        self.lookup_member_in(ty, name, &cx).map(|member| member.ty)
    }

    /// Property access `ty.name`: array `length` and tuple indices first,
    /// then member lookup. Optional members include `undefined`.
    pub fn resolve_property_access(&self, ty: &TypeExpr, name: &str) -> QueryResult<TypeExpr> {
        match ty {
            TypeExpr::Array(_) if name == "length" => return Ok(TypeExpr::NUMBER),
            TypeExpr::Tuple(elements) => {
                if name == "length" {
                    return Ok(TypeExpr::NUMBER);
                }
                if let Ok(index) = name.parse::<usize>() {
                    if let Some(element) = elements.get(index).filter(|e| !e.rest) {
                        return Ok(with_undefined(element.ty.clone(), element.optional));
                    }
                    if let Some(rest) = elements.iter().find(|e| e.rest) {
                        return Ok(with_undefined(element_type(&rest.ty), true));
                    }
                    return Err(member_not_found(ty, name));
                }
            }
            TypeExpr::Dictionary { value, .. } => return Ok(value.as_ref().clone()),
            _ => {}
        }
        let cx = self.expansion();
        let member = self.lookup_member_in(ty, name, &cx)?;
        Ok(with_undefined(member.ty, member.optional))
    }

    /// Instance members of `ty`. For nominal types this includes inherited
    /// members; a member declared on a type hides the same name on its bases.
    pub fn get_structural_members(&self, ty: &TypeExpr) -> QueryResult<Vec<PropertyInfo>> {
        let cx = self.expansion();
        self.structural_members_in(ty, &cx)
    }

    fn structural_members_in(&self, ty: &TypeExpr, cx: &Expansion<'_>) -> QueryResult<Vec<PropertyInfo>> {
        match ty {
            TypeExpr::Object(members) => Ok(members.clone()),
            TypeExpr::Array(_) => Ok(vec![length_property()]),
            TypeExpr::Tuple(elements) => {
                let mut members: Vec<PropertyInfo> = elements
                    .iter()
                    .enumerate()
                    .filter(|(_, element)| !element.rest)
                    .map(|(index, element)| PropertyInfo {
                        name: index.to_string(),
                        ty: element.ty.clone(),
                        optional: element.optional,
                        readonly: false,
                    })
                    .collect();
                members.push(length_property());
                Ok(members)
            }
            TypeExpr::Union(constituents) => {
                let lists = constituents
                    .iter()
                    .map(|constituent| self.structural_members_in(constituent, cx))
                    .collect::<QueryResult<Vec<_>>>()?;
                let Some((first, others)) = lists.split_first() else {
                    return Ok(Vec::new());
                };
                Ok(first
                    .iter()
                    .filter_map(|member| {
                        let mut matching = vec![member];
                        for list in others {
                            matching.push(list.iter().find(|m| m.name == member.name)?);
                        }
                        Some(PropertyInfo {
                            name: member.name.clone(),
                            ty: TypeExpr::union(matching.iter().map(|m| m.ty.clone())),
                            optional: matching.iter().any(|m| m.optional),
                            readonly: matching.iter().any(|m| m.readonly),
                        })
                    })
                    .collect())
            }
            TypeExpr::Intersection(constituents) => {
                let mut seen = FxHashSet::default();
                let mut members = Vec::new();
                for constituent in constituents {
                    for member in self.structural_members_in(constituent, cx)? {
                        if seen.insert(member.name.clone()) {
                            members.push(member);
                        }
                    }
                }
                Ok(members)
            }
            TypeExpr::Utility { name, argument } => {
                match utility::expand(name, std::slice::from_ref(argument), Some(cx))? {
                    TypeExpr::Utility { .. } => Err(QueryError::from_code(
                        diagnostic_codes::UNSUPPORTED_UTILITY_TYPE,
                        &[ty.to_string().as_str()],
                    )),
                    expanded => self.structural_members_in(&expanded, cx),
                }
            }
            TypeExpr::TypeParameter(name) => Err(QueryError::from_code(
                diagnostic_codes::NOT_A_NOMINAL_TYPE,
                &[name.as_str()],
            )),
            TypeExpr::Unresolved { name, reason } => Err(unresolved_error(name, *reason)),
            _ => match self.catalog.apparent_nominal(ty) {
                Some((id, args)) => self.nominal_members(&id, &args, cx),
                None => Ok(Vec::new()),
            },
        }
    }

    fn nominal_members(&self, id: &TypeId, args: &[TypeExpr], cx: &Expansion<'_>) -> QueryResult<Vec<PropertyInfo>> {
        let chain = self.nominal.get_inheritance_chain(&self.catalog, id)?;
        let mut seen = FxHashSet::default();
        let mut members = Vec::new();
        for ancestor in chain.iter() {
            let entry = self.nominal_entry(ancestor)?;
            let env = self
                .nominal
                .get_instantiation(&self.catalog, id, args, ancestor)?
                .unwrap_or_default();
            for member in entry.members.values() {
                if member.is_static || member.is_indexer || !seen.insert(member.surface_name.clone()) {
                    continue;
                }
                let declared = self.member_declared_type(&entry, member, cx)?;
                members.push(PropertyInfo {
                    name: member.surface_name.clone(),
                    ty: self.settled(&substitute(&declared, &env), cx)?,
                    optional: member.is_optional,
                    readonly: member.is_readonly,
                });
            }
        }
        Ok(members)
    }

    // =========================================================================
    // Type operations
    // =========================================================================

    /// Apply `args` to a generic reference or generic function type.
    pub fn instantiate(&self, ty: &TypeExpr, args: &[TypeExpr]) -> QueryResult<TypeExpr> {
        if let Some(unresolved) = args.iter().find(|arg| arg.first_unresolved().is_some()) {
            return self.checked(unresolved.clone(), None);
        }
        let cx = self.expansion();
        let instantiated = match ty {
            TypeExpr::Reference { id, args: current } => {
                let entry = self.nominal_entry(id)?;
                let params = &entry.type_parameters;
                if params.is_empty() {
                    return Err(QueryError::from_code(diagnostic_codes::NOT_GENERIC, &[id.surface_name()]));
                }
                if params.len() != args.len() {
                    return Err(count_mismatch(id.surface_name(), params.len(), args.len()));
                }
                let is_open = current.is_empty()
                    || (current.len() == params.len()
                        && current
                            .iter()
                            .zip(params)
                            .all(|(arg, param)| matches!(arg, TypeExpr::TypeParameter(name) if name == param)));
                let args = if is_open {
                    args.to_vec()
                } else {
                    let env = InstantiationEnv::from_zip(params, args);
                    current.iter().map(|arg| substitute(arg, &env)).collect()
                };
                TypeExpr::Reference { id: id.clone(), args }
            }
            TypeExpr::Function(shape) if !shape.type_params.is_empty() => {
                if shape.type_params.len() != args.len() {
                    return Err(count_mismatch(&ty.to_string(), shape.type_params.len(), args.len()));
                }
                let names: Vec<String> = shape.type_params.iter().map(|p| p.name.clone()).collect();
                let env = InstantiationEnv::from_zip(&names, args);
                let substituted = FunctionShape {
                    type_params: Vec::new(),
                    params: shape
                        .params
                        .iter()
                        .map(|param| {
                            let mut param = param.clone();
                            param.ty = substitute(&param.ty, &env);
                            param
                        })
                        .collect(),
                    return_type: substitute(&shape.return_type, &env),
                };
                TypeExpr::Function(Box::new(utility::settle_shape(&substituted, Some(&cx))?))
            }
            other => {
                return Err(QueryError::from_code(
                    diagnostic_codes::NOT_GENERIC,
                    &[other.to_string().as_str()],
                ));
            }
        };
        self.checked(instantiated, None)
    }

    /// `Partial`, `Required`, `Readonly` or `NonNullable` of `args`.
    pub fn expand_utility_type(&self, name: &str, args: &[TypeExpr]) -> QueryResult<TypeExpr> {
        let cx = self.expansion();
        let expanded = utility::expand(name, args, Some(&cx))?;
        self.checked(expanded, None)
    }

    /// Conservative assignability: `false` whenever the answer is not certain.
    #[must_use]
    pub fn is_assignable_to(&self, source: &TypeExpr, target: &TypeExpr) -> bool {
        if source.first_unresolved().is_some() || target.first_unresolved().is_some() {
            return false;
        }
        if source == target {
            return true;
        }
        match (source, target) {
            (_, TypeExpr::Any | TypeExpr::Unknown) | (TypeExpr::Any | TypeExpr::Never, _) => true,
            (TypeExpr::Union(members), _) => members.iter().all(|m| self.is_assignable_to(m, target)),
            (_, TypeExpr::Union(members)) => members.iter().any(|m| self.is_assignable_to(source, m)),
            (_, TypeExpr::Intersection(members)) => members.iter().all(|m| self.is_assignable_to(source, m)),
            (TypeExpr::Intersection(members), _) => members.iter().any(|m| self.is_assignable_to(m, target)),
            (TypeExpr::Undefined, TypeExpr::Void) => true,
            (TypeExpr::Literal(literal), TypeExpr::Primitive(kind)) => literal.primitive() == *kind,
            (TypeExpr::Array(source), TypeExpr::Array(target)) => self.is_assignable_to(source, target),
            (TypeExpr::Tuple(elements), TypeExpr::Array(target)) => {
                elements.iter().all(|e| self.is_assignable_to(&element_type(&e.ty), target))
            }
            (_, TypeExpr::Reference { id: target_id, args: target_args }) => {
                self.is_nominally_assignable(source, target_id, target_args)
            }
            (_, TypeExpr::Object(target_members)) if self.has_members(source) => {
                self.is_structurally_assignable(source, target_members)
            }
            _ => false,
        }
    }

    /// Whether `source` carries members a structural target can be checked against.
    fn has_members(&self, source: &TypeExpr) -> bool {
        match source {
            TypeExpr::Object(_) | TypeExpr::Reference { .. } | TypeExpr::Array(_) | TypeExpr::Tuple(_) => true,
            TypeExpr::Primitive(_) | TypeExpr::Literal(_) => self.catalog.apparent_nominal(source).is_some(),
            _ => false,
        }
    }

    fn is_nominally_assignable(&self, source: &TypeExpr, target: &TypeId, target_args: &[TypeExpr]) -> bool {
        let Some((source_id, source_args)) = self.catalog.apparent_nominal(source) else {
            return false;
        };
        if source_id == *target {
            return source_args == *target_args;
        }
        let Ok(Some(env)) = self
            .nominal
            .heritage_instantiation(&self.catalog, &source_id, &source_args, target)
        else {
            return false;
        };
        let Ok(entry) = self.nominal_entry(target) else {
            return false;
        };
        entry.type_parameters.len() == target_args.len()
            && entry
                .type_parameters
                .iter()
                .zip(target_args)
                .all(|(param, arg)| env.get(param).is_some_and(|bound| bound == arg))
    }

    fn is_structurally_assignable(&self, source: &TypeExpr, target_members: &[PropertyInfo]) -> bool {
        let Ok(source_members) = self.get_structural_members(source) else {
            return false;
        };
        target_members.iter().all(|target| {
            match source_members.iter().find(|m| m.name == target.name) {
                Some(member) => self.is_assignable_to(&member.ty, &target.ty),
                None => target.optional,
            }
        })
    }

    // =========================================================================
    // Nominal queries
    // =========================================================================

    /// `id` and its `extends` ancestors, most derived first.
    pub fn get_inheritance_chain(&self, id: &TypeId) -> QueryResult<Arc<[TypeId]>> {
        self.nominal.get_inheritance_chain(&self.catalog, id)
    }

    /// Bindings of `target`'s type parameters seen from `receiver<args>`.
    /// `None` when `target` is not an ancestor of `receiver`.
    pub fn get_instantiation(
        &self,
        receiver: &TypeId,
        args: &[TypeExpr],
        target: &TypeId,
    ) -> QueryResult<Option<Arc<InstantiationEnv>>> {
        self.nominal.get_instantiation(&self.catalog, receiver, args, target)
    }

    /// Nominal entry behind `ty`, through the primitive carriers.
    pub fn resolve_nominal(&self, ty: &TypeExpr) -> QueryResult<Arc<NominalEntry>> {
        match self.catalog.apparent_nominal(ty) {
            Some((id, _)) => self.nominal_entry(&id),
            None => Err(QueryError::from_code(
                diagnostic_codes::NOT_A_NOMINAL_TYPE,
                &[ty.to_string().as_str()],
            )),
        }
    }
}

#[cfg(test)]
#[path = "../tests/type_system_tests.rs"]
mod tests;
