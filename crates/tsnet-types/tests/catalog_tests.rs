use super::*;
use serde_json::json;
use std::path::Path;

fn metadata() -> MetadataCatalog {
    let mut catalog = MetadataCatalog::new();
    let system = json!({
        "namespace": "System",
        "contributingAssemblies": ["System.Runtime"],
        "types": [
            {
                "clrName": "System.String",
                "kind": "Class",
                "isSealed": true,
                "properties": [{ "name": "Length", "type": "System.Int32", "hasGetter": true, "hasSetter": false }]
            },
            { "clrName": "System.Double", "kind": "Struct" },
            { "clrName": "System.Boolean", "kind": "Struct" }
        ]
    });
    let collections = json!({
        "namespace": "System.Collections.Generic",
        "contributingAssemblies": ["System.Collections"],
        "types": [
            {
                "clrName": "System.Collections.Generic.IEnumerable`1",
                "kind": "Interface",
                "genericParameters": ["T"]
            },
            {
                "clrName": "System.Collections.Generic.List`1",
                "kind": "Class",
                "genericParameters": ["T"],
                "interfaces": ["System.Collections.Generic.IEnumerable`1<T>"],
                "properties": [{ "name": "Count", "type": "System.Int32", "hasGetter": true }],
                "methods": [
                    {
                        "name": "Add",
                        "parameters": [{ "name": "item", "type": "T" }],
                        "returnType": "System.Void"
                    },
                    {
                        "name": "ConvertAll",
                        "genericParameters": ["TOutput"],
                        "parameters": [{ "name": "converter", "type": "System.Object" }],
                        "returnType": "System.Collections.Generic.List`1<TOutput>"
                    }
                ],
                "constructors": [
                    { "parameters": [] },
                    { "parameters": [{ "name": "capacity", "type": "System.Int32" }] }
                ]
            }
        ]
    });
    catalog.load_str(Path::new("System/metadata.json"), &system.to_string());
    catalog.load_str(Path::new("System.Collections.Generic/metadata.json"), &collections.to_string());
    assert!(catalog.diagnostics().is_empty(), "{:?}", catalog.diagnostics());
    catalog
}

fn build(source: &str) -> UnifiedCatalog {
    let program = Program::from_sources([("src/app.ts", source)]);
    let config = TypeSystemConfig::default();
    let registry = TypeRegistry::build(&program, &config);
    UnifiedCatalog::build(&program, &registry, &metadata(), &config)
}

#[test]
fn test_source_and_metadata_share_one_catalog() {
    let catalog = build("class Greeter { name: string }");
    let greeter = catalog.index().resolve_surface("Greeter", 0).expect("source type");
    assert_eq!(greeter.stable_id(), "App:App.Greeter");
    assert_eq!(catalog.entry(&greeter).map(|e| e.origin), Some(Origin::Source));

    let list = catalog.get("System.Collections:System.Collections.Generic.List`1").expect("library type");
    assert_eq!(list.origin, Origin::Assembly);
    assert_eq!(list.type_id.surface_name(), "List");
    assert_eq!(catalog.len(), 6);
    assert!(catalog.diagnostics().is_empty());
}

#[test]
fn test_source_shadows_library_surface_name() {
    let catalog = build("class List { size: number }");
    let list = catalog.index().resolve_surface("List", 1).expect("resolves");
    assert_eq!(list.stable_id(), "App:App.List", "user code wins regardless of arity");

    let library = catalog
        .index()
        .resolve_target("System.Collections.Generic.List", 1)
        .expect("library type still reachable by target name");
    assert_eq!(library.stable_id(), "System.Collections:System.Collections.Generic.List`1");
    assert!(catalog.index().by_stable_id(library.stable_id()).is_some());
}

#[test]
fn test_library_members_are_lowered() {
    let catalog = build("");
    let list = catalog.get("System.Collections:System.Collections.Generic.List`1").expect("library type");

    assert_eq!(list.member("Count").and_then(|m| m.ty.clone()), Some(TypeExpr::NUMBER));
    let add = list.member("Add").expect("method");
    assert_eq!(add.kind, MemberKind::Method);
    assert_eq!(add.signatures[0].params[0].ty, TypeExpr::TypeParameter("T".to_string()));
    assert_eq!(add.signatures[0].return_type, TypeExpr::Void);

    let convert = &list.member("ConvertAll").expect("method").signatures[0];
    assert_eq!(convert.type_params[0].name, "TOutput");
    assert_eq!(convert.params[0].ty, TypeExpr::Unknown);
    assert_eq!(
        convert.return_type,
        TypeExpr::Reference {
            id: list.type_id.clone(),
            args: vec![TypeExpr::TypeParameter("TOutput".to_string())],
        }
    );

    assert_eq!(list.constructors.len(), 2);
    assert_eq!(list.constructors[1].return_type, list.self_reference());

    assert_eq!(list.heritage.len(), 1);
    assert_eq!(list.heritage[0].kind, HeritageKind::Implements);
    assert_eq!(list.heritage[0].target.surface_name(), "IEnumerable");
}

#[test]
fn test_source_heritage_is_lowered_against_the_index() {
    let catalog = build("class Derived extends Base<string> implements Named {}\nclass Base<T> { value: T }\ninterface Named { name: string }");
    let derived = catalog.index().resolve_surface("Derived", 0).expect("source type");
    let entry = catalog.entry(&derived).expect("built");

    let edges: Vec<_> = entry.heritage.iter().map(|e| (e.kind, e.target.surface_name())).collect();
    assert_eq!(edges, vec![(HeritageKind::Extends, "Base"), (HeritageKind::Implements, "Named")]);
    assert_eq!(entry.heritage[0].type_arguments, vec![TypeExpr::STRING]);
    assert_eq!(entry.extends().count(), 1);
}

#[test]
fn test_unresolved_heritage_is_reported_and_dropped() {
    let catalog = build("class Widget extends Missing {}");
    let widget = catalog.index().resolve_surface("Widget", 0).expect("source type");
    assert!(catalog.entry(&widget).expect("built").heritage.is_empty());

    let diagnostic = &catalog.diagnostics()[0];
    assert_eq!(diagnostic.code, diagnostic_codes::UNRESOLVED_TYPE_NAME);
    assert_eq!(diagnostic.file, "src/app.ts");
}

#[test]
fn test_primitives_have_carriers() {
    let catalog = build("");
    let (string, args) = catalog.apparent_nominal(&TypeExpr::STRING).expect("carrier");
    assert_eq!(string.stable_id(), "System.Runtime:System.String");
    assert!(args.is_empty());
    assert!(catalog.carrier(PrimitiveKind::Number).is_some());
    assert!(catalog.carrier(PrimitiveKind::BigInt).is_none());
    assert!(catalog.apparent_nominal(&TypeExpr::Null).is_none());
}

#[test]
fn test_enum_members_are_typed_as_the_enum() {
    let catalog = build("enum Color { Red, Green }");
    let color = catalog.index().resolve_surface("Color", 0).expect("enum");
    let entry = catalog.entry(&color).expect("built");
    let red = entry.member("Red").expect("member");
    assert_eq!(red.ty, Some(TypeExpr::reference(color.clone())));
    assert!(red.is_static);
    assert_eq!(red.kind, MemberKind::Field);
}
