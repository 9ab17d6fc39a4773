//! Unified type catalog: one `stable_id → NominalEntry` map over source and
//! metadata types.
//!
//! This is the only place nominal identity is established. Construction runs
//! in two steps: a skeleton index of every `TypeId` (source first, then
//! metadata in load order), then entry construction, which lowers heritage
//! clauses and catalog member types against that index.
//!
//! Surface-name collisions: source entries are inserted into the surface and
//! target indices first and metadata never replaces them, so user code
//! shadows library code. Both stay addressable by stable id.

use crate::config::TypeSystemConfig;
use crate::lower::{Lowerer, node_location};
use crate::registry::{SourceDeclaration, SourceMemberKind, TypeRegistry};
use crate::types::{
    FunctionShape, HeritageEdge, HeritageKind, MemberEntry, MemberKind, NominalEntry, NominalKind,
    Origin, ParamInfo, PrimitiveKind, TypeExpr, TypeId, TypeParamInfo,
};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, trace};
use tsnet_common::{Diagnostic, diagnostic_codes};
use tsnet_metadata::{
    Accessibility, MetadataCatalog, MetadataMethod, MetadataParameter, MetadataType, TypeKind, simple_name,
};
use tsnet_parser::{ModifierFlags, NodeRef, Program};

#[derive(Clone, Debug)]
struct SkeletonInfo {
    type_id: TypeId,
    arity: usize,
    origin: Origin,
}

/// Name → identity lookups, available before any entry is built.
#[derive(Debug, Default)]
pub(crate) struct CatalogIndex {
    by_stable_id: FxHashMap<String, SkeletonInfo>,
    /// Surface name → candidates in insertion order (source first).
    surface: FxHashMap<String, SmallVec<[TypeId; 2]>>,
    target: FxHashMap<String, TypeId>,
}

impl CatalogIndex {
    fn insert(&mut self, type_id: TypeId, arity: usize, origin: Origin) -> bool {
        if self.by_stable_id.contains_key(type_id.stable_id()) {
            return false;
        }
        self.surface
            .entry(type_id.surface_name().to_string())
            .or_default()
            .push(type_id.clone());
        self.target
            .entry(type_id.target_name().to_string())
            .or_insert_with(|| type_id.clone());
        self.by_stable_id.insert(
            type_id.stable_id().to_string(),
            SkeletonInfo {
                type_id,
                arity,
                origin,
            },
        );
        true
    }

    /// Resolve a surface name. Source declarations always win; among library
    /// types the one whose arity matches `arg_count` is preferred.
    pub(crate) fn resolve_surface(&self, name: &str, arg_count: usize) -> Option<TypeId> {
        let candidates = self.surface.get(name)?;
        let info = |id: &TypeId| self.by_stable_id.get(id.stable_id());
        if let Some(source) = candidates
            .iter()
            .find(|id| info(id).is_some_and(|i| i.origin == Origin::Source))
        {
            return Some(source.clone());
        }
        candidates
            .iter()
            .find(|id| info(id).is_some_and(|i| i.arity == arg_count))
            .or_else(|| candidates.first())
            .cloned()
    }

    /// Resolve a full target name, with or without the arity suffix.
    pub(crate) fn resolve_target(&self, name: &str, arg_count: usize) -> Option<TypeId> {
        if let Some(id) = self.target.get(name) {
            return Some(id.clone());
        }
        if arg_count > 0 && !name.contains('`') {
            return self.target.get(&format!("{name}`{arg_count}")).cloned();
        }
        None
    }

    pub(crate) fn by_stable_id(&self, stable_id: &str) -> Option<&TypeId> {
        self.by_stable_id.get(stable_id).map(|info| &info.type_id)
    }
}

/// Target names of the apparent types of `string`, `number`, `boolean`.
pub(crate) const fn carrier_target_name(kind: PrimitiveKind) -> Option<&'static str> {
    match kind {
        PrimitiveKind::String => Some("System.String"),
        PrimitiveKind::Number => Some("System.Double"),
        PrimitiveKind::Boolean => Some("System.Boolean"),
        PrimitiveKind::BigInt | PrimitiveKind::Symbol => None,
    }
}

#[derive(Debug, Default)]
pub(crate) struct UnifiedCatalog {
    index: CatalogIndex,
    entries: IndexMap<String, Arc<NominalEntry>>,
    diagnostics: Vec<Diagnostic>,
}

impl UnifiedCatalog {
    pub(crate) fn build(
        program: &Program,
        registry: &TypeRegistry,
        metadata: &MetadataCatalog,
        config: &TypeSystemConfig,
    ) -> Self {
        let mut catalog = UnifiedCatalog::default();
        let assembly = config.assembly_name();

        let mut source_ids = Vec::new();
        for declaration in registry.declarations() {
            let type_id = TypeId::new(assembly, &declaration.qualified_name, &declaration.surface_name);
            catalog
                .index
                .insert(type_id.clone(), declaration.type_parameters.len(), Origin::Source);
            source_ids.push(type_id);
        }
        for record in metadata.types() {
            let surface_name = record
                .ts_emit_name
                .as_deref()
                .unwrap_or_else(|| simple_name(&record.clr_name));
            let type_id = TypeId::new(&record.assembly_name, &record.clr_name, surface_name);
            catalog
                .index
                .insert(type_id, record.generic_parameters.len(), Origin::Assembly);
        }

        let mut built = Vec::new();
        {
            let mut lowerer = Lowerer::new(program, registry, &catalog.index);
            for (declaration, type_id) in registry.declarations().zip(source_ids) {
                let entry = source_entry(
                    &mut lowerer,
                    program,
                    registry,
                    declaration,
                    type_id,
                    &mut catalog.diagnostics,
                );
                built.push(entry);
            }
            for record in metadata.types() {
                if let Some(type_id) = catalog.index.by_stable_id(&record.stable_id()).cloned() {
                    built.push(metadata_entry(&lowerer, record, type_id));
                }
            }
        }
        for entry in built {
            catalog
                .entries
                .entry(entry.type_id.stable_id().to_string())
                .or_insert_with(|| Arc::new(entry));
        }

        debug!(
            entries = catalog.entries.len(),
            diagnostics = catalog.diagnostics.len(),
            "unified catalog built"
        );
        catalog
    }

    pub(crate) fn index(&self) -> &CatalogIndex {
        &self.index
    }

    pub(crate) fn get(&self, stable_id: &str) -> Option<&Arc<NominalEntry>> {
        self.entries.get(stable_id)
    }

    pub(crate) fn entry(&self, id: &TypeId) -> Option<&Arc<NominalEntry>> {
        self.entries.get(id.stable_id())
    }

    /// Apparent nominal type of a primitive.
    pub(crate) fn carrier(&self, kind: PrimitiveKind) -> Option<TypeId> {
        self.index.resolve_target(carrier_target_name(kind)?, 0)
    }

    /// Nominal type and arguments behind `ty`: references as-is, primitives
    /// through their carrier.
    pub(crate) fn apparent_nominal(&self, ty: &TypeExpr) -> Option<(TypeId, Vec<TypeExpr>)> {
        match ty {
            TypeExpr::Reference { id, args } => Some((id.clone(), args.clone())),
            TypeExpr::Primitive(kind) => Some((self.carrier(*kind)?, Vec::new())),
            TypeExpr::Literal(literal) => Some((self.carrier(literal.primitive())?, Vec::new())),
            _ => None,
        }
    }

    pub(crate) fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries in build order: source declarations, then library types.
    pub(crate) fn entries(&self) -> impl Iterator<Item = &Arc<NominalEntry>> {
        self.entries.values()
    }
}

// =============================================================================
// Source entries
// =============================================================================

fn accessibility_of(modifiers: ModifierFlags) -> Accessibility {
    if modifiers.contains(ModifierFlags::PRIVATE) {
        Accessibility::Private
    } else if modifiers.contains(ModifierFlags::PROTECTED) {
        Accessibility::Protected
    } else {
        Accessibility::Public
    }
}

fn source_entry(
    lowerer: &mut Lowerer<'_>,
    program: &Program,
    registry: &TypeRegistry,
    declaration: &SourceDeclaration,
    type_id: TypeId,
    diagnostics: &mut Vec<Diagnostic>,
) -> NominalEntry {
    let qualified = declaration.qualified_name.as_str();
    let mut heritage = Vec::new();
    for clause in registry.get_heritage_type_nodes(qualified) {
        match lowerer.lower_annotation(clause.node) {
            TypeExpr::Reference { id, args } => heritage.push(HeritageEdge {
                kind: clause.kind,
                target: id,
                type_arguments: args,
            }),
            other => {
                let (file, start, length) = node_location(program, clause.node);
                let diagnostic = match other.first_unresolved() {
                    Some((name, _)) => {
                        Diagnostic::from_code(diagnostic_codes::UNRESOLVED_TYPE_NAME, &[name])
                    }
                    None => Diagnostic::from_code(
                        diagnostic_codes::NOT_A_NOMINAL_TYPE,
                        &[other.to_string().as_str()],
                    ),
                };
                trace!(owner = %type_id.stable_id(), "dropping unresolved heritage clause");
                diagnostics.push(diagnostic.at(file, start, length));
            }
        }
    }

    let mut members = IndexMap::new();
    for member in declaration.members.values() {
        let kind = match member.kind {
            SourceMemberKind::Method => MemberKind::Method,
            SourceMemberKind::EnumMember => MemberKind::Field,
            SourceMemberKind::Property
            | SourceMemberKind::Accessor
            | SourceMemberKind::IndexSignature
            | SourceMemberKind::ParameterProperty => MemberKind::Property,
        };
        let mut entry = MemberEntry::new(member.name.clone(), kind);
        entry.annotation = registry.get_member_type_node(qualified, &member.name);
        entry.declarations = member.declarations.clone();
        entry.is_static = member.modifiers.contains(ModifierFlags::STATIC);
        entry.is_readonly = member.modifiers.contains(ModifierFlags::READONLY)
            || (member.kind == SourceMemberKind::Accessor && !member.has_setter);
        entry.is_optional = member.optional;
        entry.is_abstract = member.modifiers.contains(ModifierFlags::ABSTRACT);
        entry.is_virtual = member.modifiers.contains(ModifierFlags::VIRTUAL);
        entry.is_override = member.modifiers.contains(ModifierFlags::OVERRIDE);
        entry.is_indexer = member.kind == SourceMemberKind::IndexSignature;
        entry.has_getter = kind == MemberKind::Property && member.has_getter;
        entry.has_setter = kind == MemberKind::Property && member.has_setter;
        if member.kind == SourceMemberKind::EnumMember {
            entry.ty = Some(TypeExpr::reference(type_id.clone()));
        }
        members.insert(member.name.clone(), entry);
    }

    NominalEntry {
        kind: declaration.kind,
        type_parameters: declaration.type_parameters.clone(),
        heritage,
        members,
        constructors: Vec::new(),
        origin: Origin::Source,
        accessibility: accessibility_of(declaration.modifiers),
        is_abstract: declaration.modifiers.contains(ModifierFlags::ABSTRACT),
        is_sealed: false,
        is_static: false,
        declarations: declaration.declarations.clone(),
        type_id,
    }
}

// =============================================================================
// Metadata entries
// =============================================================================

fn metadata_parameter(lowerer: &Lowerer<'_>, parameter: &MetadataParameter, scope: &[String]) -> ParamInfo {
    ParamInfo {
        name: Some(parameter.name.clone()),
        ty: lowerer.lower_type_ref(&parameter.type_ref, scope),
        optional: parameter.is_optional,
        rest: parameter.is_params,
        mode: parameter.mode,
    }
}

fn metadata_signature(lowerer: &Lowerer<'_>, method: &MetadataMethod, type_scope: &[String]) -> FunctionShape {
    let mut scope = type_scope.to_vec();
    scope.extend(method.generic_parameters.iter().cloned());
    FunctionShape {
        type_params: method
            .generic_parameters
            .iter()
            .map(|name| TypeParamInfo {
                name: name.clone(),
                constraint: None,
            })
            .collect(),
        params: method
            .parameters
            .iter()
            .map(|p| metadata_parameter(lowerer, p, &scope))
            .collect(),
        return_type: lowerer.lower_type_ref(&method.return_type, &scope),
    }
}

fn metadata_entry(lowerer: &Lowerer<'_>, record: &MetadataType, type_id: TypeId) -> NominalEntry {
    let scope = record.generic_parameters.as_slice();
    let kind = NominalKind::from(record.kind);

    let mut heritage = Vec::new();
    let mut push_edge = |kind: HeritageKind, reference: &tsnet_metadata::TypeRef| {
        match lowerer.lower_type_ref(reference, scope) {
            TypeExpr::Reference { id, args } => heritage.push(HeritageEdge {
                kind,
                target: id,
                type_arguments: args,
            }),
            _ => trace!(owner = %type_id.stable_id(), base = %reference, "base type not in catalog"),
        }
    };
    if let Some(base) = &record.base_type {
        push_edge(HeritageKind::Extends, base);
    }
    // Interfaces inherit the members of the interfaces they list.
    let interface_kind = if record.kind == TypeKind::Interface {
        HeritageKind::Extends
    } else {
        HeritageKind::Implements
    };
    for interface in &record.interfaces {
        push_edge(interface_kind, interface);
    }

    let mut members: IndexMap<String, MemberEntry> = IndexMap::new();
    for property in &record.properties {
        let name = property.ts_emit_name.clone().unwrap_or_else(|| property.name.clone());
        let mut entry = MemberEntry::new(name.clone(), MemberKind::Property);
        entry.target_name = property.name.clone();
        entry.ty = Some(lowerer.lower_type_ref(&property.type_ref, scope));
        entry.is_static = property.is_static;
        entry.is_readonly = property.is_readonly();
        entry.is_abstract = property.is_abstract;
        entry.is_virtual = property.is_virtual;
        entry.is_override = property.is_override;
        entry.is_indexer = property.is_indexer;
        entry.has_getter = property.has_getter;
        entry.has_setter = property.has_setter;
        members.insert(name, entry);
    }
    for field in &record.fields {
        let name = field.ts_emit_name.clone().unwrap_or_else(|| field.name.clone());
        let mut entry = MemberEntry::new(name.clone(), MemberKind::Field);
        entry.target_name = field.name.clone();
        entry.ty = Some(lowerer.lower_type_ref(&field.type_ref, scope));
        entry.is_static = field.is_static || field.is_literal;
        entry.is_readonly = field.is_readonly;
        members.insert(name, entry);
    }
    for event in &record.events {
        let name = event.ts_emit_name.clone().unwrap_or_else(|| event.name.clone());
        let mut entry = MemberEntry::new(name.clone(), MemberKind::Event);
        entry.target_name = event.name.clone();
        entry.ty = Some(lowerer.lower_type_ref(&event.type_ref, scope));
        entry.is_static = event.is_static;
        members.insert(name, entry);
    }
    for method in &record.methods {
        let name = method.ts_emit_name.clone().unwrap_or_else(|| method.name.clone());
        let signature = metadata_signature(lowerer, method, scope);
        match members.get_mut(&name) {
            Some(existing) if existing.kind == MemberKind::Method => existing.signatures.push(signature),
            _ => {
                let mut entry = MemberEntry::new(name.clone(), MemberKind::Method);
                entry.target_name = method.name.clone();
                entry.signatures.push(signature);
                entry.is_static = method.is_static;
                entry.is_abstract = method.is_abstract;
                entry.is_virtual = method.is_virtual;
                entry.is_override = method.is_override;
                members.insert(name, entry);
            }
        }
    }

    let self_reference = TypeExpr::Reference {
        id: type_id.clone(),
        args: record
            .generic_parameters
            .iter()
            .map(|name| TypeExpr::TypeParameter(name.clone()))
            .collect(),
    };
    let constructors = record
        .constructors
        .iter()
        .map(|constructor| FunctionShape {
            type_params: Vec::new(),
            params: constructor
                .parameters
                .iter()
                .map(|p| metadata_parameter(lowerer, p, scope))
                .collect(),
            return_type: self_reference.clone(),
        })
        .collect();

    NominalEntry {
        kind,
        type_parameters: record.generic_parameters.clone(),
        heritage,
        members,
        constructors,
        origin: Origin::Assembly,
        accessibility: record.accessibility,
        is_abstract: record.is_abstract,
        is_sealed: record.is_sealed,
        is_static: record.is_static,
        declarations: Vec::<NodeRef>::new(),
        type_id,
    }
}

#[cfg(test)]
#[path = "../tests/catalog_tests.rs"]
mod tests;
