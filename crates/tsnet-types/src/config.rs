//! Compilation configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Settings that shape type identity for one compilation.
///
/// Deserialized from camelCase JSON:
///
/// ```json
/// { "rootNamespace": "Acme", "sourceRoot": "src", "catalogRoots": ["libs/dotnet"] }
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TypeSystemConfig {
    /// Namespace prefix of every source declaration.
    pub root_namespace: String,
    /// Directory (relative to the program's file names) that maps to `root_namespace`.
    pub source_root: String,
    /// Origin scope of source types. Defaults to `root_namespace`.
    pub assembly_name: Option<String>,
    /// Metadata catalog roots, merged in order.
    pub catalog_roots: Vec<PathBuf>,
}

impl Default for TypeSystemConfig {
    fn default() -> Self {
        Self {
            root_namespace: "App".to_string(),
            source_root: "src".to_string(),
            assembly_name: None,
            catalog_roots: Vec::new(),
        }
    }
}

impl TypeSystemConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    #[must_use]
    pub fn assembly_name(&self) -> &str {
        self.assembly_name.as_deref().unwrap_or(&self.root_namespace)
    }

    /// Namespace for declarations in `file_name`: the root namespace followed by
    /// the file's directories below the source root.
    ///
    /// `src/models/user.ts` with root `App` gives `App.models`.
    #[must_use]
    pub fn namespace_for_file(&self, file_name: &str) -> String {
        let normalized = file_name.replace('\\', "/");
        let mut path = normalized.trim_start_matches("./");
        let source_root = self.source_root.trim_matches('/');
        if !source_root.is_empty()
            && let Some(rest) = path.strip_prefix(source_root)
            && (rest.is_empty() || rest.starts_with('/'))
        {
            path = rest.trim_start_matches('/');
        }

        let mut namespace = self.root_namespace.clone();
        let directories = match path.rfind('/') {
            Some(slash) => &path[..slash],
            None => "",
        };
        for segment in directories.split('/').filter(|s| !s.is_empty() && *s != ".") {
            if !namespace.is_empty() {
                namespace.push('.');
            }
            namespace.push_str(segment);
        }
        namespace
    }
}

#[cfg(test)]
#[path = "../tests/config_tests.rs"]
mod tests;
