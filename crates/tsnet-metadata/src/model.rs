//! Normalized metadata records.

use crate::type_ref::TypeRef;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum TypeKind {
    Class,
    Interface,
    Struct,
    Enum,
    Delegate,
}

impl TypeKind {
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        Some(match text.to_ascii_lowercase().as_str() {
            "class" => Self::Class,
            "interface" => Self::Interface,
            "struct" | "valuetype" => Self::Struct,
            "enum" => Self::Enum,
            "delegate" => Self::Delegate,
            _ => return None,
        })
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum Accessibility {
    #[default]
    Public,
    Protected,
    Internal,
    ProtectedInternal,
    Private,
}

impl Accessibility {
    #[must_use]
    pub fn parse(text: &str) -> Self {
        match text.to_ascii_lowercase().replace([' ', '_'], "").as_str() {
            "protected" | "family" => Self::Protected,
            "internal" | "assembly" => Self::Internal,
            "protectedinternal" | "familyorassembly" => Self::ProtectedInternal,
            "private" => Self::Private,
            _ => Self::Public,
        }
    }
}

/// How an argument is passed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize)]
pub enum ParameterMode {
    #[default]
    Value,
    Ref,
    Out,
    In,
}

impl ParameterMode {
    #[must_use]
    pub fn parse(text: &str) -> Option<Self> {
        Some(match text.to_ascii_lowercase().as_str() {
            "value" | "" => Self::Value,
            "ref" => Self::Ref,
            "out" => Self::Out,
            "in" | "inref" => Self::In,
            _ => return None,
        })
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetadataParameter {
    pub name: String,
    /// Declared type with any by-reference marker removed; see `mode`.
    pub type_ref: TypeRef,
    pub mode: ParameterMode,
    pub is_optional: bool,
    /// `params T[]` variadic parameter.
    pub is_params: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetadataMethod {
    pub name: String,
    pub ts_emit_name: Option<String>,
    pub generic_parameters: Vec<String>,
    pub parameters: Vec<MetadataParameter>,
    pub return_type: TypeRef,
    pub is_static: bool,
    pub is_abstract: bool,
    pub is_virtual: bool,
    pub is_override: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetadataProperty {
    pub name: String,
    pub ts_emit_name: Option<String>,
    pub type_ref: TypeRef,
    pub is_static: bool,
    pub has_getter: bool,
    pub has_setter: bool,
    pub is_indexer: bool,
    pub parameters: Vec<MetadataParameter>,
    pub is_abstract: bool,
    pub is_virtual: bool,
    pub is_override: bool,
}

impl MetadataProperty {
    #[must_use]
    pub const fn is_readonly(&self) -> bool {
        self.has_getter && !self.has_setter
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetadataField {
    pub name: String,
    pub ts_emit_name: Option<String>,
    pub type_ref: TypeRef,
    pub is_static: bool,
    pub is_readonly: bool,
    /// Compile-time constant.
    pub is_literal: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetadataEvent {
    pub name: String,
    pub ts_emit_name: Option<String>,
    pub type_ref: TypeRef,
    pub is_static: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetadataConstructor {
    pub parameters: Vec<MetadataParameter>,
    pub accessibility: Accessibility,
}

/// One nominal type record after normalization.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MetadataType {
    /// Target-runtime full name, e.g. ``System.Collections.Generic.List`1``.
    pub clr_name: String,
    /// Surface-language name override.
    pub ts_emit_name: Option<String>,
    pub assembly_name: String,
    pub namespace: String,
    pub kind: TypeKind,
    pub accessibility: Accessibility,
    pub is_abstract: bool,
    pub is_sealed: bool,
    pub is_static: bool,
    pub is_augmentation: bool,
    pub generic_parameters: Vec<String>,
    pub base_type: Option<TypeRef>,
    pub interfaces: Vec<TypeRef>,
    pub methods: Vec<MetadataMethod>,
    pub properties: Vec<MetadataProperty>,
    pub fields: Vec<MetadataField>,
    pub events: Vec<MetadataEvent>,
    pub constructors: Vec<MetadataConstructor>,
    /// Document this record was read from (first document for merged records).
    pub document: PathBuf,
}

impl MetadataType {
    /// `assembly:clrName`
    #[must_use]
    pub fn stable_id(&self) -> String {
        format!("{}:{}", self.assembly_name, self.clr_name)
    }

    /// Merge an augmentation record into this one: members replace same-named
    /// members, new members are appended, interfaces are unioned.
    pub fn merge_augmentation(&mut self, other: MetadataType) {
        for method in other.methods {
            // Overloads are keyed by name and parameter count.
            let position = self.methods.iter().position(|m| {
                m.name == method.name && m.parameters.len() == method.parameters.len()
            });
            match position {
                Some(i) => self.methods[i] = method,
                None => self.methods.push(method),
            }
        }
        replace_or_push(&mut self.properties, other.properties, |a, b| a.name == b.name);
        replace_or_push(&mut self.fields, other.fields, |a, b| a.name == b.name);
        replace_or_push(&mut self.events, other.events, |a, b| a.name == b.name);
        replace_or_push(&mut self.constructors, other.constructors, |a, b| {
            a.parameters.len() == b.parameters.len()
        });
        for interface in other.interfaces {
            if !self.interfaces.contains(&interface) {
                self.interfaces.push(interface);
            }
        }
        if other.base_type.is_some() {
            self.base_type = other.base_type;
        }
    }
}

fn replace_or_push<T>(existing: &mut Vec<T>, incoming: Vec<T>, same: impl Fn(&T, &T) -> bool) {
    for item in incoming {
        match existing.iter().position(|e| same(e, &item)) {
            Some(i) => existing[i] = item,
            None => existing.push(item),
        }
    }
}

/// Namespace document summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct NamespaceInfo {
    pub name: String,
    pub contributing_assemblies: Vec<String>,
    pub document: PathBuf,
}
