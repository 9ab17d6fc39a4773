//! Catalog loading: root walking, per-document parsing, duplicate handling.

use crate::error::LoadError;
use crate::model::{MetadataType, NamespaceInfo};
use crate::raw::{DocumentContext, RawDocument, RawType};
use indexmap::IndexMap;
use indexmap::map::Entry;
use rustc_hash::FxHashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, trace, warn};
use tsnet_common::{Diagnostic, diagnostic_codes};
use walkdir::WalkDir;

/// File name of a per-namespace catalog document.
pub const METADATA_FILE_NAME: &str = "metadata.json";

/// Every type record loaded from one or more catalog roots, keyed by stable id.
///
/// Insertion order is deterministic: roots in the order given, documents in
/// sorted path order within a root, records in document order.
#[derive(Debug, Default)]
pub struct MetadataCatalog {
    types: IndexMap<String, MetadataType>,
    /// Target name → stable ids defining it (one per assembly).
    by_clr_name: FxHashMap<String, Vec<String>>,
    namespaces: IndexMap<String, NamespaceInfo>,
    diagnostics: Vec<Diagnostic>,
}

impl MetadataCatalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load and merge every root. Failures become diagnostics; loading never aborts.
    pub fn load<P: AsRef<Path>>(roots: &[P]) -> Self {
        let mut catalog = Self::new();
        for root in roots {
            catalog.load_root(root.as_ref());
        }
        debug!(
            roots = roots.len(),
            types = catalog.types.len(),
            namespaces = catalog.namespaces.len(),
            diagnostics = catalog.diagnostics.len(),
            "metadata catalog loaded"
        );
        catalog
    }

    /// Walk one root for `metadata.json` documents.
    pub fn load_root(&mut self, root: &Path) {
        if !root.exists() {
            self.report(LoadError::RootNotFound(root.to_path_buf()));
            return;
        }
        debug!(root = %root.display(), "walking metadata root");
        for entry in WalkDir::new(root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) => {
                    let path = source
                        .path()
                        .map_or_else(|| root.to_path_buf(), Path::to_path_buf);
                    self.report(LoadError::Walk { path, source });
                    continue;
                }
            };
            if entry.file_type().is_file() && entry.file_name() == METADATA_FILE_NAME {
                self.load_document(entry.path());
            }
        }
    }

    /// Read and load one document from disk.
    pub fn load_document(&mut self, path: &Path) {
        match fs::read_to_string(path) {
            Ok(text) => self.load_str(path, &text),
            Err(source) => self.report(LoadError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Load one document's text. `path` is used for diagnostics and provenance.
    pub fn load_str(&mut self, path: &Path, text: &str) {
        let document: RawDocument = match serde_json::from_str(text) {
            Ok(document) => document,
            Err(source) => {
                self.report(LoadError::Json {
                    path: path.to_path_buf(),
                    source,
                });
                return;
            }
        };

        let namespace = document.namespace.clone().unwrap_or_default();
        let default_assembly = document
            .contributing_assemblies
            .first()
            .cloned()
            .unwrap_or_else(|| namespace.clone());
        trace!(path = %path.display(), namespace = %namespace, records = document.types.len(), "loading document");

        let info = self
            .namespaces
            .entry(namespace.clone())
            .or_insert_with(|| NamespaceInfo {
                name: namespace.clone(),
                contributing_assemblies: Vec::new(),
                document: path.to_path_buf(),
            });
        for assembly in &document.contributing_assemblies {
            if !info.contributing_assemblies.contains(assembly) {
                info.contributing_assemblies.push(assembly.clone());
            }
        }

        let context = DocumentContext {
            path,
            namespace: &namespace,
            default_assembly: &default_assembly,
        };
        for value in document.types {
            let record = serde_json::from_value::<RawType>(value)
                .map_err(|source| LoadError::Json {
                    path: path.to_path_buf(),
                    source,
                })
                .and_then(|raw| context.normalize(raw));
            match record {
                Ok(record) => self.insert(record),
                Err(error) => self.report(error),
            }
        }
    }

    /// Insert one normalized record, applying the duplicate policy.
    fn insert(&mut self, record: MetadataType) {
        let stable_id = record.stable_id();
        match self.types.entry(stable_id) {
            Entry::Vacant(slot) => {
                self.by_clr_name
                    .entry(record.clr_name.clone())
                    .or_default()
                    .push(slot.key().clone());
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => {
                let stable_id = slot.key().clone();
                let existing = slot.get_mut();
                if record.is_augmentation {
                    trace!(stable_id = %stable_id, "merging augmentation");
                    existing.merge_augmentation(record);
                } else if existing.is_augmentation {
                    // A full definition arriving after an augmentation becomes the base.
                    let augmentation = std::mem::replace(existing, record);
                    existing.merge_augmentation(augmentation);
                } else {
                    let first = existing.document.display().to_string();
                    let second = record.document.display().to_string();
                    warn!(stable_id = %stable_id, %first, %second, "duplicate type definition ignored");
                    let diagnostic = Diagnostic::from_code(
                        diagnostic_codes::DUPLICATE_TYPE_DEFINITION,
                        &[stable_id.as_str(), first.as_str(), second.as_str()],
                    )
                    .at(second.clone(), 0, 0)
                    .with_related(first, 0, 0, format!("'{stable_id}' was first defined here."));
                    self.diagnostics.push(diagnostic);
                }
            }
        }
    }

    fn report(&mut self, error: LoadError) {
        warn!(%error, "metadata load problem");
        self.diagnostics.push(error.to_diagnostic());
    }

    #[must_use]
    pub fn get(&self, stable_id: &str) -> Option<&MetadataType> {
        self.types.get(stable_id)
    }

    /// First-loaded record for a target name.
    #[must_use]
    pub fn get_by_clr_name(&self, clr_name: &str) -> Option<&MetadataType> {
        self.by_clr_name
            .get(clr_name)
            .and_then(|ids| ids.first())
            .and_then(|id| self.types.get(id))
    }

    pub fn types(&self) -> impl Iterator<Item = &MetadataType> {
        self.types.values()
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &NamespaceInfo> {
        self.namespaces.values()
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
#[path = "../tests/loader_tests.rs"]
mod tests;
