use super::*;
use crate::model::{ParameterMode, TypeKind};
use crate::type_ref::TypeRef;
use serde_json::{Value, json};
use std::fs;
use tempfile::TempDir;

fn write_document(root: &Path, relative_dir: &str, document: &Value) {
    let dir = root.join(relative_dir);
    fs::create_dir_all(&dir).expect("create namespace dir");
    fs::write(
        dir.join(METADATA_FILE_NAME),
        serde_json::to_string_pretty(document).expect("serialize fixture"),
    )
    .expect("write fixture");
}

fn system_document() -> Value {
    json!({
        "namespace": "System",
        "contributingAssemblies": ["System.Runtime"],
        "types": [
            {
                "clrName": "System.String",
                "kind": "Class",
                "isSealed": true,
                "properties": [
                    { "name": "Length", "type": "System.Int32", "hasGetter": true, "hasSetter": false }
                ],
                "methods": [
                    {
                        "name": "Substring",
                        "parameters": [{ "name": "startIndex", "type": "System.Int32" }],
                        "returnType": "System.String"
                    },
                    {
                        "name": "Substring",
                        "parameters": [
                            { "name": "startIndex", "type": "System.Int32" },
                            { "name": "length", "type": "System.Int32" }
                        ],
                        "returnType": "System.String"
                    }
                ]
            },
            {
                "clrName": "System.Int32",
                "kind": "Struct",
                "isSealed": true
            }
        ]
    })
}

#[test]
fn test_load_single_root() {
    let root = TempDir::new().expect("tempdir");
    write_document(root.path(), "System", &system_document());

    let catalog = MetadataCatalog::load(&[root.path()]);
    assert!(catalog.diagnostics().is_empty(), "{:?}", catalog.diagnostics());
    assert_eq!(catalog.len(), 2);

    let string = catalog
        .get("System.Runtime:System.String")
        .expect("String is keyed by assembly and target name");
    assert_eq!(string.kind, TypeKind::Class);
    assert!(string.is_sealed);
    assert_eq!(string.namespace, "System");
    assert_eq!(string.methods.len(), 2);
    assert!(string.properties[0].is_readonly());
    assert_eq!(string.properties[0].type_ref, TypeRef::named("System.Int32"));

    let by_name = catalog.get_by_clr_name("System.Int32").expect("by target name");
    assert_eq!(by_name.kind, TypeKind::Struct);

    let namespaces: Vec<_> = catalog.namespaces().map(|ns| ns.name.as_str()).collect();
    assert_eq!(namespaces, vec!["System"]);
}

#[test]
fn test_only_metadata_documents_are_loaded() {
    let root = TempDir::new().expect("tempdir");
    write_document(root.path(), "System", &system_document());
    fs::write(root.path().join("System").join("notes.json"), "not json").expect("write");

    let catalog = MetadataCatalog::load(&[root.path()]);
    assert!(catalog.diagnostics().is_empty());
    assert_eq!(catalog.len(), 2);
}

#[test]
fn test_parameter_modes_are_normalized() {
    let mut catalog = MetadataCatalog::new();
    let document = json!({
        "namespace": "System",
        "contributingAssemblies": ["System.Runtime"],
        "types": [{
            "clrName": "System.Int32",
            "kind": "struct",
            "methods": [{
                "name": "TryParse",
                "isStatic": true,
                "parameters": [
                    { "name": "s", "type": "System.String" },
                    { "name": "result", "type": "System.Int32&", "isOut": true },
                    { "name": "style", "type": "System.Int32&" },
                    { "name": "provider", "type": "System.Object", "mode": "in" }
                ],
                "returnType": "System.Boolean"
            }]
        }]
    });
    catalog.load_str(Path::new("System/metadata.json"), &document.to_string());
    assert!(catalog.diagnostics().is_empty(), "{:?}", catalog.diagnostics());

    let int32 = catalog.get("System.Runtime:System.Int32").expect("loaded");
    let params = &int32.methods[0].parameters;
    let modes: Vec<_> = params.iter().map(|p| p.mode).collect();
    assert_eq!(
        modes,
        vec![
            ParameterMode::Value,
            ParameterMode::Out,
            ParameterMode::Ref,
            ParameterMode::In
        ]
    );
    // The by-reference marker moves into the mode.
    assert_eq!(params[1].type_ref, TypeRef::named("System.Int32"));
    assert!(int32.methods[0].is_static);
}

#[test]
fn test_missing_return_type_defaults_to_void() {
    let mut catalog = MetadataCatalog::new();
    let document = json!({
        "namespace": "App",
        "types": [{
            "clrName": "App.Logger",
            "kind": "Class",
            "methods": [{ "name": "Flush" }]
        }]
    });
    catalog.load_str(Path::new("App/metadata.json"), &document.to_string());
    // Without contributing assemblies the namespace names the assembly.
    let logger = catalog.get("App:App.Logger").expect("loaded");
    assert_eq!(logger.methods[0].return_type, TypeRef::named("System.Void"));
}

#[test]
fn test_missing_field_drops_only_that_record() {
    let mut catalog = MetadataCatalog::new();
    let document = json!({
        "namespace": "System",
        "contributingAssemblies": ["System.Runtime"],
        "types": [
            { "kind": "Class" },
            { "clrName": "System.Boolean", "kind": "Struct" }
        ]
    });
    catalog.load_str(Path::new("System/metadata.json"), &document.to_string());

    assert_eq!(catalog.len(), 1);
    assert!(catalog.get("System.Runtime:System.Boolean").is_some());
    assert_eq!(catalog.diagnostics().len(), 1);
    let diagnostic = &catalog.diagnostics()[0];
    assert_eq!(diagnostic.code, diagnostic_codes::METADATA_MISSING_FIELD);
    assert!(diagnostic.message_text.contains("clrName"));
    assert_eq!(diagnostic.file, "System/metadata.json");
}

#[test]
fn test_invalid_type_reference_is_reported() {
    let mut catalog = MetadataCatalog::new();
    let document = json!({
        "namespace": "System",
        "contributingAssemblies": ["System.Runtime"],
        "types": [{
            "clrName": "System.Broken",
            "kind": "Class",
            "baseType": "System.Object<"
        }]
    });
    catalog.load_str(Path::new("System/metadata.json"), &document.to_string());
    assert!(catalog.is_empty());
    assert_eq!(
        catalog.diagnostics()[0].code,
        diagnostic_codes::METADATA_INVALID_TYPE_REFERENCE
    );
}

#[test]
fn test_malformed_document_does_not_abort_catalog() {
    let root = TempDir::new().expect("tempdir");
    write_document(root.path(), "System", &system_document());
    let broken = root.path().join("Broken");
    fs::create_dir_all(&broken).expect("mkdir");
    fs::write(broken.join(METADATA_FILE_NAME), "{ \"namespace\": ").expect("write");

    let catalog = MetadataCatalog::load(&[root.path()]);
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.diagnostics().len(), 1);
    assert_eq!(
        catalog.diagnostics()[0].code,
        diagnostic_codes::METADATA_MALFORMED
    );
    assert!(catalog.diagnostics()[0].is_error());
}

#[test]
fn test_missing_root_is_reported() {
    let root = TempDir::new().expect("tempdir");
    let missing = root.path().join("does-not-exist");
    let catalog = MetadataCatalog::load(&[missing.as_path()]);
    assert!(catalog.is_empty());
    assert_eq!(
        catalog.diagnostics()[0].code,
        diagnostic_codes::CATALOG_ROOT_NOT_FOUND
    );
}

#[test]
fn test_duplicate_full_definition_keeps_first() {
    let first = TempDir::new().expect("tempdir");
    let second = TempDir::new().expect("tempdir");
    write_document(first.path(), "System", &system_document());
    write_document(
        second.path(),
        "System",
        &json!({
            "namespace": "System",
            "contributingAssemblies": ["System.Runtime"],
            "types": [{ "clrName": "System.String", "kind": "Interface" }]
        }),
    );

    let catalog = MetadataCatalog::load(&[first.path(), second.path()]);
    let string = catalog.get("System.Runtime:System.String").expect("kept");
    assert_eq!(string.kind, TypeKind::Class);
    assert!(string.document.starts_with(first.path()));

    assert_eq!(catalog.diagnostics().len(), 1);
    let warning = &catalog.diagnostics()[0];
    assert_eq!(warning.code, diagnostic_codes::DUPLICATE_TYPE_DEFINITION);
    assert!(!warning.is_error());
    assert!(warning.message_text.contains("System.Runtime:System.String"));
    assert!(warning.file.starts_with(&second.path().display().to_string()));
    assert_eq!(warning.related_information.len(), 1);
    assert!(
        warning.related_information[0]
            .file
            .starts_with(&first.path().display().to_string())
    );
}

#[test]
fn test_augmentation_merges_members() {
    let base = TempDir::new().expect("tempdir");
    let extra = TempDir::new().expect("tempdir");
    write_document(base.path(), "System", &system_document());
    write_document(
        extra.path(),
        "System",
        &json!({
            "namespace": "System",
            "contributingAssemblies": ["System.Runtime"],
            "types": [{
                "clrName": "System.String",
                "kind": "Class",
                "isAugmentation": true,
                "interfaces": ["System.IComparable"],
                "properties": [
                    { "name": "Length", "type": "System.Int64", "isReadOnly": true }
                ],
                "methods": [{
                    "name": "Trim",
                    "returnType": "System.String"
                }]
            }]
        }),
    );

    let catalog = MetadataCatalog::load(&[base.path(), extra.path()]);
    assert!(catalog.diagnostics().is_empty(), "{:?}", catalog.diagnostics());
    let string = catalog.get("System.Runtime:System.String").expect("merged");

    // Later wins for the same member; new members append.
    assert_eq!(string.properties.len(), 1);
    assert_eq!(string.properties[0].type_ref, TypeRef::named("System.Int64"));
    assert!(string.properties[0].is_readonly());
    let names: Vec<_> = string.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Substring", "Substring", "Trim"]);
    assert_eq!(string.interfaces, vec![TypeRef::named("System.IComparable")]);
    // Provenance stays with the full definition.
    assert!(string.document.starts_with(base.path()));
}

#[test]
fn test_full_definition_after_augmentation_becomes_base() {
    let mut catalog = MetadataCatalog::new();
    let augmentation = json!({
        "namespace": "App",
        "contributingAssemblies": ["App.Core"],
        "types": [{
            "clrName": "App.Widget",
            "kind": "Class",
            "isAugmentation": true,
            "methods": [{ "name": "Extra" }]
        }]
    });
    let full = json!({
        "namespace": "App",
        "contributingAssemblies": ["App.Core"],
        "types": [{
            "clrName": "App.Widget",
            "kind": "Class",
            "isAbstract": true,
            "methods": [{ "name": "Render" }]
        }]
    });
    catalog.load_str(Path::new("a/metadata.json"), &augmentation.to_string());
    catalog.load_str(Path::new("b/metadata.json"), &full.to_string());

    let widget = catalog.get("App.Core:App.Widget").expect("loaded");
    assert!(widget.is_abstract);
    assert!(!widget.is_augmentation);
    let names: Vec<_> = widget.methods.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["Render", "Extra"]);
    assert!(catalog.diagnostics().is_empty());
}

#[test]
fn test_generic_parameters_accept_strings_and_objects() {
    let mut catalog = MetadataCatalog::new();
    let document = json!({
        "namespace": "System.Collections.Generic",
        "contributingAssemblies": ["System.Collections"],
        "types": [{
            "clrName": "System.Collections.Generic.Dictionary`2",
            "kind": "Class",
            "genericParameters": ["TKey", { "name": "TValue" }],
            "interfaces": ["System.Collections.Generic.IEnumerable`1<System.Collections.Generic.KeyValuePair`2<TKey, TValue>>"]
        }]
    });
    catalog.load_str(Path::new("metadata.json"), &document.to_string());
    let dictionary = catalog
        .get_by_clr_name("System.Collections.Generic.Dictionary`2")
        .expect("loaded");
    assert_eq!(dictionary.generic_parameters, vec!["TKey", "TValue"]);
    assert_eq!(dictionary.interfaces.len(), 1);
}
