//! Runtime-library metadata catalog loader.
//!
//! Catalog roots hold one `metadata.json` document per namespace directory.
//! [`MetadataCatalog::load`] walks every root, normalizes each type record, and
//! merges roots into one map keyed by `assembly:clrName`. Problems become
//! diagnostics and loading carries on with the next record or document.

pub mod catalog;
pub mod error;
pub mod model;
mod raw;
pub mod type_ref;

pub use catalog::{METADATA_FILE_NAME, MetadataCatalog};
pub use error::LoadError;
pub use model::{
    Accessibility, MetadataConstructor, MetadataEvent, MetadataField, MetadataMethod,
    MetadataParameter, MetadataProperty, MetadataType, NamespaceInfo, ParameterMode, TypeKind,
};
pub use type_ref::{TypeRef, TypeRefError, namespace_of, parse_type_ref, simple_name};
