//! Type registry: nominal declarations extracted from source syntax.
//!
//! Built in two passes over every file:
//!
//! - Pass A registers each class, interface, enum and type alias under its
//!   qualified name together with its type-parameter names. Nothing else is
//!   read, so later lookups never depend on declaration order.
//! - Pass B records members and heritage clauses. Each member keeps the
//!   verbatim annotation node and each heritage clause keeps its type
//!   reference node; nothing is resolved here.
//!
//! Repeated declarations of one qualified name merge: members union (a later
//! member of the same name replaces the earlier one) and heritage lists
//! concatenate.

use crate::config::TypeSystemConfig;
use crate::types::{HeritageKind, NominalKind};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;
use tracing::{debug, trace};
use tsnet_parser::node::{AccessorData, MethodData, PropertyData};
use tsnet_parser::{FileId, ModifierFlags, NodeArena, NodeIndex, NodeKind, NodeRef, Program};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SourceMemberKind {
    Property,
    Method,
    Accessor,
    IndexSignature,
    EnumMember,
    /// Constructor parameter declared with an accessibility or `readonly` modifier.
    ParameterProperty,
}

#[derive(Clone, Debug)]
pub(crate) struct SourceMember {
    pub name: String,
    pub kind: SourceMemberKind,
    /// Declaration nodes; methods keep every overload, accessors both halves.
    pub declarations: SmallVec<[NodeRef; 1]>,
    /// Verbatim type annotation (getter return or setter parameter for accessors).
    pub type_node: Option<NodeRef>,
    pub modifiers: ModifierFlags,
    pub optional: bool,
    pub has_getter: bool,
    pub has_setter: bool,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct SourceHeritage {
    pub kind: HeritageKind,
    /// `TypeReference` node as written.
    pub node: NodeRef,
}

#[derive(Clone, Debug)]
pub(crate) struct SourceDeclaration {
    pub qualified_name: String,
    pub surface_name: String,
    pub kind: NominalKind,
    pub type_parameters: Vec<String>,
    pub members: IndexMap<String, SourceMember>,
    pub constructors: Vec<NodeRef>,
    pub heritage: Vec<SourceHeritage>,
    pub declarations: Vec<NodeRef>,
    pub modifiers: ModifierFlags,
    /// Declared in a `.d.ts` file.
    pub is_ambient: bool,
}

#[derive(Clone, Debug)]
pub(crate) struct SourceAlias {
    pub qualified_name: String,
    pub type_parameters: Vec<String>,
    pub type_node: NodeRef,
}

#[derive(Debug, Default)]
pub(crate) struct TypeRegistry {
    declarations: IndexMap<String, SourceDeclaration>,
    aliases: IndexMap<String, SourceAlias>,
    /// Surface name → qualified name of the first declaration with that name.
    by_surface: FxHashMap<String, String>,
    alias_by_surface: FxHashMap<String, String>,
    /// Declaration node → qualified name, for declarations and aliases.
    by_node: FxHashMap<NodeRef, String>,
}

impl TypeRegistry {
    pub(crate) fn build(program: &Program, config: &TypeSystemConfig) -> Self {
        let mut registry = TypeRegistry::default();
        for (file_id, file) in program.files() {
            let namespace = if file.is_declaration_file {
                String::new()
            } else {
                config.namespace_for_file(&file.file_name)
            };
            for &statement in &file.statements {
                registry.register_skeleton(&file.arena, file_id, statement, &namespace, file.is_declaration_file);
            }
        }
        for (file_id, file) in program.files() {
            for &statement in &file.statements {
                registry.collect_members(&file.arena, file_id, statement);
            }
        }
        debug!(
            declarations = registry.declarations.len(),
            aliases = registry.aliases.len(),
            "type registry built"
        );
        registry
    }

    // -------------------------------------------------------------------------
    // Pass A
    // -------------------------------------------------------------------------

    fn register_skeleton(
        &mut self,
        arena: &NodeArena,
        file: FileId,
        statement: NodeIndex,
        namespace: &str,
        is_ambient: bool,
    ) {
        let Some(kind) = arena.kind(statement) else {
            return;
        };
        let (name, nominal_kind, type_parameters, modifiers) = match kind {
            NodeKind::ClassDeclaration(data) => (
                &data.name,
                NominalKind::Class,
                data.type_parameters.as_slice(),
                data.modifiers,
            ),
            NodeKind::InterfaceDeclaration(data) => (
                &data.name,
                NominalKind::Interface,
                data.type_parameters.as_slice(),
                data.modifiers,
            ),
            NodeKind::EnumDeclaration(data) => (&data.name, NominalKind::Enum, &[][..], data.modifiers),
            NodeKind::TypeAliasDeclaration(data) => {
                if data.name.is_empty() {
                    return;
                }
                let qualified_name = qualify(namespace, &data.name);
                let node = NodeRef::new(file, statement);
                self.by_node.insert(node, qualified_name.clone());
                self.alias_by_surface
                    .entry(data.name.clone())
                    .or_insert_with(|| qualified_name.clone());
                self.aliases
                    .entry(qualified_name.clone())
                    .or_insert_with(|| SourceAlias {
                        qualified_name,
                        type_parameters: type_parameter_names(arena, &data.type_parameters),
                        type_node: NodeRef::new(file, data.type_node),
                    });
                return;
            }
            _ => return,
        };
        if name.is_empty() {
            return;
        }

        let qualified_name = qualify(namespace, name);
        let node = NodeRef::new(file, statement);
        self.by_node.insert(node, qualified_name.clone());
        self.by_surface
            .entry(name.clone())
            .or_insert_with(|| qualified_name.clone());

        let type_parameters = type_parameter_names(arena, type_parameters);
        match self.declarations.get_mut(&qualified_name) {
            Some(existing) => {
                trace!(name = %qualified_name, "merging declaration");
                existing.declarations.push(node);
                existing.modifiers |= modifiers;
                // A class merged with an interface stays a class.
                if nominal_kind == NominalKind::Class {
                    existing.kind = NominalKind::Class;
                }
                if existing.type_parameters.is_empty() {
                    existing.type_parameters = type_parameters;
                }
            }
            None => {
                self.declarations.insert(
                    qualified_name.clone(),
                    SourceDeclaration {
                        qualified_name,
                        surface_name: name.clone(),
                        kind: nominal_kind,
                        type_parameters,
                        members: IndexMap::new(),
                        constructors: Vec::new(),
                        heritage: Vec::new(),
                        declarations: vec![node],
                        modifiers,
                        is_ambient,
                    },
                );
            }
        }
    }

    // -------------------------------------------------------------------------
    // Pass B
    // -------------------------------------------------------------------------

    fn collect_members(&mut self, arena: &NodeArena, file: FileId, statement: NodeIndex) {
        let node = NodeRef::new(file, statement);
        let Some(qualified_name) = self.by_node.get(&node).cloned() else {
            return;
        };
        let Some(declaration) = self.declarations.get_mut(&qualified_name) else {
            // Type aliases have no members.
            return;
        };
        let at = |index: NodeIndex| NodeRef::new(file, index);

        match arena.kind(statement) {
            Some(NodeKind::ClassDeclaration(data)) => {
                if let Some(extends) = data.extends.get() {
                    declaration.heritage.push(SourceHeritage {
                        kind: HeritageKind::Extends,
                        node: at(extends),
                    });
                }
                for &implements in &data.implements {
                    declaration.heritage.push(SourceHeritage {
                        kind: HeritageKind::Implements,
                        node: at(implements),
                    });
                }
                for &member in &data.members {
                    collect_class_member(arena, file, member, declaration);
                }
            }
            Some(NodeKind::InterfaceDeclaration(data)) => {
                for &extends in &data.extends {
                    declaration.heritage.push(SourceHeritage {
                        kind: HeritageKind::Extends,
                        node: at(extends),
                    });
                }
                for &member in &data.members {
                    collect_class_member(arena, file, member, declaration);
                }
            }
            Some(NodeKind::EnumDeclaration(data)) => {
                for &member in &data.members {
                    if let Some(NodeKind::EnumMember(enum_member)) = arena.kind(member) {
                        declaration.members.insert(
                            enum_member.name.clone(),
                            SourceMember {
                                name: enum_member.name.clone(),
                                kind: SourceMemberKind::EnumMember,
                                declarations: SmallVec::from_elem(at(member), 1),
                                type_node: None,
                                modifiers: ModifierFlags::STATIC | ModifierFlags::READONLY,
                                optional: false,
                                has_getter: true,
                                has_setter: false,
                            },
                        );
                    }
                }
            }
            _ => {}
        }
    }

    // -------------------------------------------------------------------------
    // Lookups
    // -------------------------------------------------------------------------

    pub(crate) fn resolve_by_qualified_name(&self, qualified_name: &str) -> Option<&SourceDeclaration> {
        self.declarations.get(qualified_name)
    }

    /// First declaration registered under `surface_name`.
    pub(crate) fn resolve_by_surface_name(&self, surface_name: &str) -> Option<&SourceDeclaration> {
        self.by_surface
            .get(surface_name)
            .and_then(|qualified| self.declarations.get(qualified))
    }

    pub(crate) fn get_member_type_node(&self, qualified_name: &str, member: &str) -> Option<NodeRef> {
        self.declarations
            .get(qualified_name)?
            .members
            .get(member)?
            .type_node
    }

    pub(crate) fn get_heritage_type_nodes(&self, qualified_name: &str) -> &[SourceHeritage] {
        self.declarations
            .get(qualified_name)
            .map_or(&[], |declaration| declaration.heritage.as_slice())
    }

    pub(crate) fn alias_by_surface_name(&self, surface_name: &str) -> Option<&SourceAlias> {
        self.alias_by_surface
            .get(surface_name)
            .and_then(|qualified| self.aliases.get(qualified))
    }

    pub(crate) fn alias_by_qualified_name(&self, qualified_name: &str) -> Option<&SourceAlias> {
        self.aliases.get(qualified_name)
    }

    /// Qualified name registered for a declaration node.
    pub(crate) fn qualified_name_of(&self, node: NodeRef) -> Option<&str> {
        self.by_node.get(&node).map(String::as_str)
    }

    pub(crate) fn declarations(&self) -> impl Iterator<Item = &SourceDeclaration> {
        self.declarations.values()
    }
}

fn qualify(namespace: &str, name: &str) -> String {
    if namespace.is_empty() {
        name.to_string()
    } else {
        format!("{namespace}.{name}")
    }
}

pub(crate) fn type_parameter_names(arena: &NodeArena, nodes: &[NodeIndex]) -> Vec<String> {
    nodes
        .iter()
        .filter_map(|&node| match arena.kind(node) {
            Some(NodeKind::TypeParameter(data)) => Some(data.name.clone()),
            _ => None,
        })
        .collect()
}

fn node_or_none(file: FileId, index: NodeIndex) -> Option<NodeRef> {
    index.get().map(|index| NodeRef::new(file, index))
}

fn collect_class_member(arena: &NodeArena, file: FileId, member: NodeIndex, declaration: &mut SourceDeclaration) {
    let at = NodeRef::new(file, member);
    match arena.kind(member) {
        Some(NodeKind::PropertyDeclaration(PropertyData {
            name,
            modifiers,
            type_annotation,
            optional,
            ..
        })) => {
            declaration.members.insert(
                name.clone(),
                SourceMember {
                    name: name.clone(),
                    kind: SourceMemberKind::Property,
                    declarations: SmallVec::from_elem(at, 1),
                    type_node: node_or_none(file, *type_annotation),
                    modifiers: *modifiers,
                    optional: *optional,
                    has_getter: true,
                    has_setter: !modifiers.contains(ModifierFlags::READONLY),
                },
            );
        }
        Some(NodeKind::MethodDeclaration(MethodData {
            name,
            modifiers,
            optional,
            ..
        })) => {
            // Overloads accumulate on one member.
            match declaration.members.get_mut(name) {
                Some(existing) if existing.kind == SourceMemberKind::Method => {
                    existing.declarations.push(at);
                }
                _ => {
                    declaration.members.insert(
                        name.clone(),
                        SourceMember {
                            name: name.clone(),
                            kind: SourceMemberKind::Method,
                            declarations: SmallVec::from_elem(at, 1),
                            type_node: None,
                            modifiers: *modifiers,
                            optional: *optional,
                            has_getter: false,
                            has_setter: false,
                        },
                    );
                }
            }
        }
        Some(NodeKind::GetAccessor(data)) => {
            let type_node = node_or_none(file, data.type_annotation);
            merge_accessor(declaration, data, at, type_node, true);
        }
        Some(NodeKind::SetAccessor(data)) => {
            let type_node = data.parameters.first().and_then(|&parameter| match arena.kind(parameter) {
                Some(NodeKind::Parameter(param)) => node_or_none(file, param.type_annotation),
                _ => None,
            });
            merge_accessor(declaration, data, at, type_node, false);
        }
        Some(NodeKind::Constructor(data)) => {
            declaration.constructors.push(at);
            for &parameter in &data.parameters {
                let Some(NodeKind::Parameter(param)) = arena.kind(parameter) else {
                    continue;
                };
                let property_modifiers = ModifierFlags::PUBLIC
                    | ModifierFlags::PRIVATE
                    | ModifierFlags::PROTECTED
                    | ModifierFlags::READONLY;
                if param.modifiers.intersects(property_modifiers) {
                    declaration.members.insert(
                        param.name.clone(),
                        SourceMember {
                            name: param.name.clone(),
                            kind: SourceMemberKind::ParameterProperty,
                            declarations: SmallVec::from_elem(NodeRef::new(file, parameter), 1),
                            type_node: node_or_none(file, param.type_annotation),
                            modifiers: param.modifiers,
                            optional: param.optional,
                            has_getter: true,
                            has_setter: !param.modifiers.contains(ModifierFlags::READONLY),
                        },
                    );
                }
            }
        }
        Some(NodeKind::IndexSignature(data)) => {
            declaration.members.insert(
                "[index]".to_string(),
                SourceMember {
                    name: "[index]".to_string(),
                    kind: SourceMemberKind::IndexSignature,
                    declarations: SmallVec::from_elem(at, 1),
                    type_node: node_or_none(file, data.value_type),
                    modifiers: data.modifiers,
                    optional: false,
                    has_getter: true,
                    has_setter: !data.modifiers.contains(ModifierFlags::READONLY),
                },
            );
        }
        _ => {}
    }
}

fn merge_accessor(
    declaration: &mut SourceDeclaration,
    data: &AccessorData,
    at: NodeRef,
    type_node: Option<NodeRef>,
    is_getter: bool,
) {
    match declaration.members.get_mut(&data.name) {
        Some(existing) if existing.kind == SourceMemberKind::Accessor => {
            existing.declarations.push(at);
            existing.has_getter |= is_getter;
            existing.has_setter |= !is_getter;
            // The getter's annotation wins when both halves carry one.
            if existing.type_node.is_none() || (is_getter && type_node.is_some()) {
                existing.type_node = type_node;
            }
        }
        _ => {
            declaration.members.insert(
                data.name.clone(),
                SourceMember {
                    name: data.name.clone(),
                    kind: SourceMemberKind::Accessor,
                    declarations: SmallVec::from_elem(at, 1),
                    type_node,
                    modifiers: data.modifiers,
                    optional: false,
                    has_getter: is_getter,
                    has_setter: !is_getter,
                },
            );
        }
    }
}

#[cfg(test)]
#[path = "../tests/registry_tests.rs"]
mod tests;
