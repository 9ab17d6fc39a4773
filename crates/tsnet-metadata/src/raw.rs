//! On-disk document shape and its normalization into `model` records.

use crate::error::LoadError;
use crate::model::{
    Accessibility, MetadataConstructor, MetadataEvent, MetadataField, MetadataMethod,
    MetadataParameter, MetadataProperty, MetadataType, ParameterMode, TypeKind,
};
use crate::type_ref::{TypeRef, parse_type_ref};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RawDocument {
    pub namespace: Option<String>,
    #[serde(default)]
    pub contributing_assemblies: Vec<String>,
    /// Records are decoded one at a time so a bad record only drops itself.
    #[serde(default)]
    pub types: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawGenericParameter {
    Name(String),
    Object { name: String },
}

impl RawGenericParameter {
    fn into_name(self) -> String {
        match self {
            Self::Name(name) | Self::Object { name } => name,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct RawType {
    clr_name: Option<String>,
    ts_emit_name: Option<String>,
    assembly_name: Option<String>,
    kind: Option<String>,
    accessibility: Option<String>,
    is_abstract: bool,
    is_sealed: bool,
    is_static: bool,
    is_augmentation: bool,
    generic_parameters: Vec<RawGenericParameter>,
    base_type: Option<String>,
    interfaces: Vec<String>,
    methods: Vec<RawMethod>,
    properties: Vec<RawProperty>,
    fields: Vec<RawField>,
    events: Vec<RawEvent>,
    constructors: Vec<RawConstructor>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawParameter {
    name: Option<String>,
    #[serde(rename = "type")]
    type_name: Option<String>,
    mode: Option<String>,
    is_ref: bool,
    is_out: bool,
    is_in: bool,
    is_optional: bool,
    is_params: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawMethod {
    name: Option<String>,
    ts_emit_name: Option<String>,
    generic_parameters: Vec<RawGenericParameter>,
    parameters: Vec<RawParameter>,
    return_type: Option<String>,
    is_static: bool,
    is_abstract: bool,
    is_virtual: bool,
    is_override: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawProperty {
    name: Option<String>,
    ts_emit_name: Option<String>,
    #[serde(rename = "type")]
    type_name: Option<String>,
    is_static: bool,
    has_getter: Option<bool>,
    has_setter: Option<bool>,
    is_read_only: Option<bool>,
    is_indexer: bool,
    parameters: Vec<RawParameter>,
    is_abstract: bool,
    is_virtual: bool,
    is_override: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawField {
    name: Option<String>,
    ts_emit_name: Option<String>,
    #[serde(rename = "type")]
    type_name: Option<String>,
    is_static: bool,
    is_read_only: bool,
    is_literal: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawEvent {
    name: Option<String>,
    ts_emit_name: Option<String>,
    #[serde(rename = "type")]
    type_name: Option<String>,
    is_static: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawConstructor {
    parameters: Vec<RawParameter>,
    accessibility: Option<String>,
}

/// Per-document context used while normalizing records.
pub(crate) struct DocumentContext<'a> {
    pub path: &'a Path,
    pub namespace: &'a str,
    /// Assembly used when a record names none.
    pub default_assembly: &'a str,
}

impl DocumentContext<'_> {
    fn required<T>(&self, value: Option<T>, field: &'static str) -> Result<T, LoadError> {
        value.ok_or_else(|| LoadError::MissingField {
            path: self.path.to_path_buf(),
            field,
        })
    }

    fn type_ref(&self, text: &str) -> Result<TypeRef, LoadError> {
        parse_type_ref(text).map_err(|source| LoadError::InvalidTypeReference {
            path: self.path.to_path_buf(),
            reference: text.to_string(),
            source,
        })
    }

    fn parameter(&self, raw: RawParameter) -> Result<MetadataParameter, LoadError> {
        let name = self.required(raw.name, "parameters[].name")?;
        let type_text = self.required(raw.type_name, "parameters[].type")?;
        let declared = self.type_ref(&type_text)?;

        let explicit_mode = match raw.mode.as_deref() {
            Some(text) => Some(ParameterMode::parse(text).ok_or_else(|| LoadError::Malformed {
                path: self.path.to_path_buf(),
                message: format!("unknown parameter mode '{text}'"),
            })?),
            None => None,
        };
        let flag_mode = if raw.is_out {
            Some(ParameterMode::Out)
        } else if raw.is_ref {
            Some(ParameterMode::Ref)
        } else if raw.is_in {
            Some(ParameterMode::In)
        } else {
            None
        };
        // A bare trailing `&` means `ref` unless something more specific was given.
        let by_ref_mode = declared.is_by_ref().then_some(ParameterMode::Ref);
        let mode = explicit_mode
            .or(flag_mode)
            .or(by_ref_mode)
            .unwrap_or(ParameterMode::Value);

        Ok(MetadataParameter {
            name,
            type_ref: declared.without_by_ref().clone(),
            mode,
            is_optional: raw.is_optional,
            is_params: raw.is_params,
        })
    }

    fn parameters(&self, raw: Vec<RawParameter>) -> Result<Vec<MetadataParameter>, LoadError> {
        raw.into_iter().map(|p| self.parameter(p)).collect()
    }

    fn method(&self, raw: RawMethod) -> Result<MetadataMethod, LoadError> {
        let return_type = match raw.return_type.as_deref() {
            Some(text) => self.type_ref(text)?,
            None => TypeRef::named("System.Void"),
        };
        Ok(MetadataMethod {
            name: self.required(raw.name, "methods[].name")?,
            ts_emit_name: raw.ts_emit_name,
            generic_parameters: raw
                .generic_parameters
                .into_iter()
                .map(RawGenericParameter::into_name)
                .collect(),
            parameters: self.parameters(raw.parameters)?,
            return_type,
            is_static: raw.is_static,
            is_abstract: raw.is_abstract,
            is_virtual: raw.is_virtual,
            is_override: raw.is_override,
        })
    }

    fn property(&self, raw: RawProperty) -> Result<MetadataProperty, LoadError> {
        let type_text = self.required(raw.type_name, "properties[].type")?;
        let read_only = raw.is_read_only.unwrap_or(false);
        Ok(MetadataProperty {
            name: self.required(raw.name, "properties[].name")?,
            ts_emit_name: raw.ts_emit_name,
            type_ref: self.type_ref(&type_text)?,
            is_static: raw.is_static,
            has_getter: raw.has_getter.unwrap_or(true),
            has_setter: raw.has_setter.unwrap_or(!read_only),
            is_indexer: raw.is_indexer,
            parameters: self.parameters(raw.parameters)?,
            is_abstract: raw.is_abstract,
            is_virtual: raw.is_virtual,
            is_override: raw.is_override,
        })
    }

    fn field(&self, raw: RawField) -> Result<MetadataField, LoadError> {
        let type_text = self.required(raw.type_name, "fields[].type")?;
        Ok(MetadataField {
            name: self.required(raw.name, "fields[].name")?,
            ts_emit_name: raw.ts_emit_name,
            type_ref: self.type_ref(&type_text)?,
            is_static: raw.is_static,
            is_readonly: raw.is_read_only || raw.is_literal,
            is_literal: raw.is_literal,
        })
    }

    fn event(&self, raw: RawEvent) -> Result<MetadataEvent, LoadError> {
        let type_text = self.required(raw.type_name, "events[].type")?;
        Ok(MetadataEvent {
            name: self.required(raw.name, "events[].name")?,
            ts_emit_name: raw.ts_emit_name,
            type_ref: self.type_ref(&type_text)?,
            is_static: raw.is_static,
        })
    }

    fn constructor(&self, raw: RawConstructor) -> Result<MetadataConstructor, LoadError> {
        Ok(MetadataConstructor {
            parameters: self.parameters(raw.parameters)?,
            accessibility: raw
                .accessibility
                .as_deref()
                .map_or(Accessibility::Public, Accessibility::parse),
        })
    }

    /// Normalize one type record.
    pub(crate) fn normalize(&self, raw: RawType) -> Result<MetadataType, LoadError> {
        let clr_name = self.required(raw.clr_name, "clrName")?;
        let kind_text = self.required(raw.kind, "kind")?;
        let kind = TypeKind::parse(&kind_text).ok_or_else(|| LoadError::Malformed {
            path: self.path.to_path_buf(),
            message: format!("unknown type kind '{kind_text}' for '{clr_name}'"),
        })?;

        let base_type = match raw.base_type.as_deref() {
            Some(text) if !text.is_empty() => Some(self.type_ref(text)?),
            _ => None,
        };
        let interfaces = raw
            .interfaces
            .iter()
            .map(|text| self.type_ref(text))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(MetadataType {
            assembly_name: raw
                .assembly_name
                .unwrap_or_else(|| self.default_assembly.to_string()),
            namespace: self.namespace.to_string(),
            ts_emit_name: raw.ts_emit_name,
            kind,
            accessibility: raw
                .accessibility
                .as_deref()
                .map_or(Accessibility::Public, Accessibility::parse),
            is_abstract: raw.is_abstract,
            is_sealed: raw.is_sealed,
            is_static: raw.is_static,
            is_augmentation: raw.is_augmentation,
            generic_parameters: raw
                .generic_parameters
                .into_iter()
                .map(RawGenericParameter::into_name)
                .collect(),
            base_type,
            interfaces,
            methods: raw
                .methods
                .into_iter()
                .map(|m| self.method(m))
                .collect::<Result<_, _>>()?,
            properties: raw
                .properties
                .into_iter()
                .map(|p| self.property(p))
                .collect::<Result<_, _>>()?,
            fields: raw
                .fields
                .into_iter()
                .map(|f| self.field(f))
                .collect::<Result<_, _>>()?,
            events: raw
                .events
                .into_iter()
                .map(|e| self.event(e))
                .collect::<Result<_, _>>()?,
            constructors: raw
                .constructors
                .into_iter()
                .map(|c| self.constructor(c))
                .collect::<Result<_, _>>()?,
            clr_name,
            document: self.path.to_path_buf(),
        })
    }
}
