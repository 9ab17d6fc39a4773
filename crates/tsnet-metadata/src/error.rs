use crate::type_ref::TypeRefError;
use std::path::PathBuf;
use thiserror::Error;
use tsnet_common::{Diagnostic, diagnostic_codes};

/// Per-document load failure. Loading continues past every variant.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot walk {}: {source}", path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("malformed document {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("malformed record in {}: {message}", path.display())]
    Malformed { path: PathBuf, message: String },

    #[error("record in {} is missing field `{field}`", path.display())]
    MissingField { path: PathBuf, field: &'static str },

    #[error("invalid type reference `{reference}` in {}: {source}", path.display())]
    InvalidTypeReference {
        path: PathBuf,
        reference: String,
        #[source]
        source: TypeRefError,
    },

    #[error("catalog root {} does not exist", .0.display())]
    RootNotFound(PathBuf),
}

impl LoadError {
    #[must_use]
    pub fn to_diagnostic(&self) -> Diagnostic {
        let (code, path, args): (u32, &PathBuf, Vec<String>) = match self {
            Self::Io { path, source } => (
                diagnostic_codes::METADATA_READ_FAILED,
                path,
                vec![path.display().to_string(), source.to_string()],
            ),
            Self::Walk { path, source } => (
                diagnostic_codes::METADATA_READ_FAILED,
                path,
                vec![path.display().to_string(), source.to_string()],
            ),
            Self::Json { path, source } => (
                diagnostic_codes::METADATA_MALFORMED,
                path,
                vec![path.display().to_string(), source.to_string()],
            ),
            Self::Malformed { path, message } => (
                diagnostic_codes::METADATA_MALFORMED,
                path,
                vec![path.display().to_string(), message.clone()],
            ),
            Self::MissingField { path, field } => (
                diagnostic_codes::METADATA_MISSING_FIELD,
                path,
                vec![path.display().to_string(), (*field).to_string()],
            ),
            Self::InvalidTypeReference {
                path, reference, ..
            } => (
                diagnostic_codes::METADATA_INVALID_TYPE_REFERENCE,
                path,
                vec![reference.clone(), path.display().to_string()],
            ),
            Self::RootNotFound(path) => (
                diagnostic_codes::CATALOG_ROOT_NOT_FOUND,
                path,
                vec![path.display().to_string()],
            ),
        };
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        Diagnostic::from_code(code, &args).at(path.display().to_string(), 0, 0)
    }
}
