use super::*;
use crate::gate::CompilationGate;
use crate::types::LiteralValue;
use serde_json::{Value, json};
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tsnet_metadata::METADATA_FILE_NAME;
use tsnet_parser::FileId;

// =============================================================================
// Fixtures
// =============================================================================

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
                    },
                    {
                        "name": "Join",
                        "isStatic": true,
                        "parameters": [
                            { "name": "separator", "type": "System.String" },
                            { "name": "values", "type": "System.String[]", "isParams": true }
                        ],
                        "returnType": "System.String"
                    }
                ]
            },
            { "clrName": "System.Double", "kind": "Struct", "isSealed": true },
            { "clrName": "System.Boolean", "kind": "Struct", "isSealed": true }
        ]
    })
}

fn collections_document() -> Value {
    json!({
        "namespace": "System.Collections.Generic",
        "contributingAssemblies": ["System.Collections"],
        "types": [
            {
                "clrName": "System.Collections.Generic.List`1",
                "kind": "Class",
                "genericParameters": ["T"],
                "properties": [{ "name": "Count", "type": "System.Int32", "hasGetter": true }],
                "methods": [
                    {
                        "name": "Add",
                        "parameters": [{ "name": "item", "type": "T" }],
                        "returnType": "System.Void"
                    },
                    {
                        "name": "TryGet",
                        "parameters": [
                            { "name": "index", "type": "System.Int32" },
                            { "name": "value", "type": "T&", "isOut": true }
                        ],
                        "returnType": "System.Boolean"
                    }
                ],
                "constructors": [
                    { "parameters": [] },
                    { "parameters": [{ "name": "capacity", "type": "System.Int32" }] }
                ]
            }
        ]
    })
}

fn library_root() -> TempDir {
    let root = TempDir::new().expect("tempdir");
    write_document(root.path(), "System", &system_document());
    write_document(root.path(), "System.Collections.Generic", &collections_document());
    root
}

/// Type system over one source file and the library fixture.
fn with_library(source: &str) -> (TempDir, TypeSystem) {
    let root = library_root();
    let config = TypeSystemConfig {
        catalog_roots: vec![root.path().to_path_buf()],
        ..TypeSystemConfig::default()
    };
    let program = Program::from_sources([("src/app.ts", source)]);
    let system = TypeSystem::build(program, config);
    (root, system)
}

/// Type system over one source file and no library types.
fn source_only(source: &str) -> TypeSystem {
    let program = Program::from_sources([("src/app.ts", source)]);
    TypeSystem::new(program, &MetadataCatalog::new(), TypeSystemConfig::default())
}

fn nodes(system: &TypeSystem, predicate: impl Fn(&NodeKind) -> bool) -> Vec<NodeRef> {
    let file = system.program().file(FileId(0)).expect("file");
    file.arena
        .iter()
        .filter(|(_, node)| predicate(&node.kind))
        .map(|(index, _)| NodeRef::new(FileId(0), index))
        .collect()
}

fn node(system: &TypeSystem, predicate: impl Fn(&NodeKind) -> bool) -> NodeRef {
    nodes(system, predicate).into_iter().next().expect("node present")
}

fn variable(system: &TypeSystem, name: &str) -> NodeRef {
    node(system, |kind| matches!(kind, NodeKind::VariableDeclaration(data) if data.name == name))
}

fn type_of_variable(system: &TypeSystem, name: &str) -> QueryResult<TypeExpr> {
    let id = system.declaration(variable(system, name))?;
    system.type_of_decl(id)
}

fn call(system: &TypeSystem, member: &str) -> NodeRef {
    node(system, |kind| match kind {
        NodeKind::CallExpression(data) => match system.program().node(NodeRef::new(FileId(0), data.callee)) {
            Some(callee) => match &callee.kind {
                NodeKind::Identifier(name) => name == member,
                NodeKind::PropertyAccess(access) => access.name == member,
                _ => false,
            },
            None => false,
        },
        _ => false,
    })
}

fn reference(system: &TypeSystem, name: &str) -> TypeExpr {
    TypeExpr::reference(system.lookup_type(name).expect("declared"))
}

fn generic(system: &TypeSystem, name: &str, args: Vec<TypeExpr>) -> TypeExpr {
    TypeExpr::Reference {
        id: system.lookup_type(name).expect("declared"),
        args,
    }
}

fn assert_send_sync<T: Send + Sync>() {}

// =============================================================================
// Construction and identity
// =============================================================================

#[test]
fn test_type_system_is_shareable_across_threads() {
    assert_send_sync::<TypeSystem>();
}

#[test]
fn test_lookup_by_surface_target_and_stable_id() {
    let (_root, system) = with_library("class Greeter {}");
    let greeter = system.lookup_type("Greeter").expect("surface name");
    assert_eq!(greeter.stable_id(), "App:App.Greeter");
    assert_eq!(system.lookup_type("App.Greeter").expect("target name"), greeter);
    assert_eq!(system.lookup_type("App:App.Greeter").expect("stable id"), greeter);

    let list = system
        .lookup_type("System.Collections.Generic.List`1")
        .expect("library target name");
    assert_eq!(list.surface_name(), "List");

    let err = system.lookup_type("Nope").expect_err("undeclared");
    assert_eq!(err.code(), Some(diagnostic_codes::UNRESOLVED_TYPE_NAME));
    assert!(system.construction_diagnostics().is_empty(), "{:?}", system.construction_diagnostics());
}

#[test]
fn test_source_declaration_wins_surface_collision() {
    let (_root, system) = with_library("class List { size: number }\nlet mine: List;");
    let list = system.lookup_type("List").expect("resolves");
    assert_eq!(list.stable_id(), "App:App.List");
    assert_eq!(
        type_of_variable(&system, "mine").expect("annotated"),
        TypeExpr::reference(list)
    );
    let library = system
        .lookup_type("System.Collections:System.Collections.Generic.List`1")
        .expect("library type stays addressable");
    assert_eq!(library.origin_scope(), "System.Collections");
}

#[test]
fn test_duplicate_library_definitions_warn_and_keep_the_first() {
    let first = library_root();
    let second = TempDir::new().expect("tempdir");
    let mut duplicate = system_document();
    duplicate["types"][0]["properties"] = json!([]);
    write_document(second.path(), "System", &duplicate);

    let config = TypeSystemConfig {
        catalog_roots: vec![first.path().to_path_buf(), second.path().to_path_buf()],
        ..TypeSystemConfig::default()
    };
    let system = TypeSystem::build(Program::from_sources([("src/app.ts", "")]), config);

    let duplicates: Vec<_> = system
        .construction_diagnostics()
        .iter()
        .filter(|d| d.code == diagnostic_codes::DUPLICATE_TYPE_DEFINITION)
        .collect();
    assert_eq!(duplicates.len(), 3);
    assert!(duplicates.iter().all(|d| !d.is_error()));
    assert_eq!(
        system.get_member_type(&TypeExpr::STRING, "Length").expect("first definition kept"),
        TypeExpr::NUMBER
    );
}

#[test]
fn test_nominal_queries_are_memoized() {
    let system = source_only("class A<T> { value: T }\nclass B extends A<string> {}");
    let a = system.lookup_type("A").expect("declared");
    let b = system.lookup_type("B").expect("declared");

    let chain = system.get_inheritance_chain(&b).expect("chain");
    assert!(Arc::ptr_eq(&chain, &system.get_inheritance_chain(&b).expect("chain")));

    let env = system.get_instantiation(&b, &[], &a).expect("query").expect("ancestor");
    let again = system.get_instantiation(&b, &[], &a).expect("query").expect("ancestor");
    assert!(Arc::ptr_eq(&env, &again));
}

#[test]
fn test_handles_are_stable_across_queries() {
    let system = source_only("function greet(name: string): string {}\ngreet('a');\ngreet('b');");
    let calls = nodes(&system, |kind| matches!(kind, NodeKind::CallExpression(_)));
    let first = system.resolve_call_signature(calls[0]).expect("binds");
    let second = system.resolve_call_signature(calls[1]).expect("binds");
    assert_eq!(first, second);

    let greeter = node(&system, |kind| matches!(kind, NodeKind::FunctionDeclaration(_)));
    assert_eq!(
        system.declaration(greeter).expect("declared"),
        system.declaration(greeter).expect("declared")
    );
}

// =============================================================================
// Cross-catalog resolution
// =============================================================================

#[test]
fn test_primitive_members_come_from_the_library() {
    let (_root, system) = with_library("let s: string;\ns.Substring(1);\nString.Join(',', 'a', 'b');");

    assert_eq!(system.get_member_type(&TypeExpr::STRING, "Length").expect("Length"), TypeExpr::NUMBER);
    assert_eq!(
        system.resolve_property_access(&TypeExpr::STRING, "Length").expect("Length"),
        TypeExpr::NUMBER
    );
    let literal = TypeExpr::Literal(LiteralValue::String("hi".to_string()));
    assert_eq!(system.get_member_type(&literal, "Length").expect("literal"), TypeExpr::NUMBER);

    let substring = system.resolve_call_signature(call(&system, "Substring")).expect("binds");
    let resolved = system
        .resolve_call(&CallQuery::new(substring, 1).with_receiver(TypeExpr::STRING))
        .expect("resolves");
    assert_eq!(resolved.parameter_types, vec![TypeExpr::NUMBER]);
    assert_eq!(resolved.return_type, TypeExpr::STRING);

    let join = system.resolve_call_signature(call(&system, "Join")).expect("static call binds");
    let resolved = system.resolve_call(&CallQuery::new(join, 3)).expect("resolves");
    assert_eq!(
        resolved.parameter_types,
        vec![TypeExpr::STRING, TypeExpr::STRING, TypeExpr::STRING],
        "params arrays expand per argument"
    );

    let err = system.get_member_type(&TypeExpr::STRING, "Trim").expect_err("not declared");
    assert_eq!(err.code(), Some(diagnostic_codes::MEMBER_NOT_FOUND));
}

#[test]
fn test_source_member_reaches_the_string_carrier() {
    let (_root, system) = with_library("class Greeter { value: string }");
    let value = system
        .get_member_type(&reference(&system, "Greeter"), "value")
        .expect("annotated");
    assert_eq!(value, TypeExpr::STRING);

    let carrier = system.resolve_nominal(&value).expect("carrier");
    assert_eq!(carrier.type_id.target_name(), "System.String");
    let members = system.get_structural_members(&value).expect("members");
    let length = members.iter().find(|m| m.name == "Length").expect("Length");
    assert_eq!(length.ty, TypeExpr::NUMBER);
    assert!(length.readonly);
}

#[test]
fn test_same_stable_id_same_entry() {
    let (_root, system) = with_library("");
    let by_surface = system.lookup_type("String").expect("surface");
    let by_target = system.lookup_type("System.String").expect("target");
    let first = system.nominal_entry(&by_surface).expect("entry");
    let second = system.nominal_entry(&by_target).expect("entry");
    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(&first, &system.resolve_nominal(&TypeExpr::STRING).expect("carrier")));
}

#[test]
fn test_source_class_and_library_types_together() {
    let (_root, system) = with_library(
        "class Greeter {\n  names: List<string>;\n  greet(name: string): string {}\n}\nlet g: Greeter;\ng.greet('x');\nlet items: List<string>;\nitems.Add('y');",
    );
    let greeter = reference(&system, "Greeter");

    let names = system.get_member_type(&greeter, "names").expect("annotated");
    let list = system.lookup_type("List").expect("library type");
    assert_eq!(
        names,
        TypeExpr::Reference {
            id: list.clone(),
            args: vec![TypeExpr::STRING],
        }
    );
    assert_eq!(system.get_member_type(&names, "Count").expect("library member"), TypeExpr::NUMBER);

    let greet = system.resolve_call_signature(call(&system, "greet")).expect("binds");
    let resolved = system
        .resolve_call(&CallQuery::new(greet, 1).with_receiver(greeter))
        .expect("resolves");
    assert_eq!(resolved.parameter_types, vec![TypeExpr::STRING]);
    assert_eq!(resolved.return_type, TypeExpr::STRING);

    let items = type_of_variable(&system, "items").expect("annotated");
    let add = system.resolve_call_signature(call(&system, "Add")).expect("binds");
    let resolved = system
        .resolve_call(&CallQuery::new(add, 1).with_receiver(items))
        .expect("resolves");
    assert_eq!(resolved.parameter_types, vec![TypeExpr::STRING]);
    assert_eq!(resolved.return_type, TypeExpr::Void);
}

#[test]
fn test_library_constructor_and_passing_modes() {
    let (_root, system) = with_library("let items: List<number>;\nnew List<number>(4);\nlet found: number;\nitems.TryGet(0, found);");

    let constructor = nodes(&system, |kind| matches!(kind, NodeKind::NewExpression(_)))[0];
    let id = system.resolve_constructor_signature(constructor).expect("binds");
    let shape = system.signature(id).expect("shape");
    assert_eq!(shape.params[0].ty, TypeExpr::NUMBER);

    let items = type_of_variable(&system, "items").expect("annotated");
    let try_get = system.resolve_call_signature(call(&system, "TryGet")).expect("binds");
    let resolved = system
        .resolve_call(&CallQuery::new(try_get, 2).with_receiver(items))
        .expect("resolves");
    assert_eq!(resolved.parameter_types, vec![TypeExpr::NUMBER, TypeExpr::NUMBER]);
    assert_eq!(resolved.parameter_modes, vec![ParameterMode::Value, ParameterMode::Out]);
    assert_eq!(resolved.return_type, TypeExpr::BOOLEAN);
}

// =============================================================================
// Explicit annotations only
// =============================================================================

#[test]
fn test_missing_annotation_is_an_error_not_any() {
    let system = source_only("let count = 5;\nfunction build(size: number) {}\nbuild(1);");

    let err = type_of_variable(&system, "count").expect_err("no annotation");
    assert_eq!(err.code(), Some(diagnostic_codes::MISSING_TYPE_ANNOTATION));
    assert_eq!(err.diagnostics()[0].file, "src/app.ts");

    let build = system.resolve_call_signature(call(&system, "build")).expect("binds by arity");
    let err = system.signature(build).expect_err("no return annotation");
    assert_eq!(err.code(), Some(diagnostic_codes::MISSING_TYPE_ANNOTATION));
}

#[test]
fn test_declaration_types() {
    let system = source_only(
        "enum Color { Red }\nclass Shape {\n  get area(): number { return 0 }\n  set label(value: string) {}\n}\nfunction make(): Shape {}\nlet c: Color;",
    );
    let color = system.lookup_type("Color").expect("enum");
    let red = node(&system, |kind| matches!(kind, NodeKind::EnumMember(_)));
    assert_eq!(
        system.type_of_decl(system.declaration(red).expect("member")).expect("enum member"),
        TypeExpr::reference(color.clone())
    );
    assert_eq!(type_of_variable(&system, "c").expect("annotated"), TypeExpr::reference(color));

    let getter = node(&system, |kind| matches!(kind, NodeKind::GetAccessor(_)));
    assert_eq!(system.type_of_decl(system.declaration(getter).expect("accessor")).expect("typed"), TypeExpr::NUMBER);
    let setter = node(&system, |kind| matches!(kind, NodeKind::SetAccessor(_)));
    assert_eq!(system.type_of_decl(system.declaration(setter).expect("accessor")).expect("typed"), TypeExpr::STRING);

    let make = node(&system, |kind| matches!(kind, NodeKind::FunctionDeclaration(_)));
    let TypeExpr::Function(shape) = system.type_of_decl(system.declaration(make).expect("function")).expect("typed")
    else {
        panic!("functions have function types");
    };
    assert_eq!(shape.return_type, reference(&system, "Shape"));
}

#[test]
fn test_unresolved_names_report_their_codes() {
    let system = source_only("let a: Missing;\nlet b: Omit<{ x: number }, 'x'>;\ntype Loop = Loop[];\nlet c: Loop;\nunknownName;\nnowhere(1, 2);\nnew Nothing();");
    assert_eq!(
        type_of_variable(&system, "a").expect_err("unknown").code(),
        Some(diagnostic_codes::UNRESOLVED_TYPE_NAME)
    );
    assert_eq!(
        type_of_variable(&system, "b").expect_err("unsupported").code(),
        Some(diagnostic_codes::UNSUPPORTED_UTILITY_TYPE)
    );
    assert_eq!(
        type_of_variable(&system, "c").expect_err("cyclic").code(),
        Some(diagnostic_codes::CYCLIC_TYPE_ALIAS)
    );

    let unknown = node(&system, |kind| matches!(kind, NodeKind::Identifier(name) if name == "unknownName"));
    assert_eq!(
        system.resolve_identifier(unknown).expect_err("unbound").code(),
        Some(diagnostic_codes::UNRESOLVED_IDENTIFIER)
    );
    let err = system.resolve_call_signature(call(&system, "nowhere")).expect_err("unbound");
    assert_eq!(err.code(), Some(diagnostic_codes::UNRESOLVED_CALL_SIGNATURE));
    assert!(err.to_string().contains("nowhere"));

    let new_expression = node(&system, |kind| matches!(kind, NodeKind::NewExpression(_)));
    assert_eq!(
        system.resolve_constructor_signature(new_expression).expect_err("unbound").code(),
        Some(diagnostic_codes::UNRESOLVED_CONSTRUCTOR)
    );
}

// =============================================================================
// Generics
// =============================================================================

const CHAIN: &str = "class A<T> { value: T }\nclass B<U> extends A<U[]> { other: U }\nclass C extends B<number> {}";

#[test]
fn test_instantiation_composes_through_the_chain() {
    let system = source_only(CHAIN);
    let a = system.lookup_type("A").expect("declared");
    let c = system.lookup_type("C").expect("declared");

    let env = system.get_instantiation(&c, &[], &a).expect("query").expect("ancestor");
    assert_eq!(env.get("T"), Some(&TypeExpr::array(TypeExpr::NUMBER)));

    let c_ref = reference(&system, "C");
    assert_eq!(
        system.get_member_type(&c_ref, "value").expect("inherited"),
        TypeExpr::array(TypeExpr::NUMBER)
    );
    assert_eq!(system.get_member_type(&c_ref, "other").expect("inherited"), TypeExpr::NUMBER);

    let members = system.get_structural_members(&c_ref).expect("members");
    let names: Vec<_> = members.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["other", "value"]);
}

#[test]
fn test_own_members_shadow_inherited_ones() {
    let system = source_only("class Animal { name: string; legs: number }\nclass Bird extends Animal { legs: 2 }");
    let members = system
        .get_structural_members(&reference(&system, "Bird"))
        .expect("members");
    let legs: Vec<_> = members.iter().filter(|m| m.name == "legs").collect();
    assert_eq!(legs.len(), 1);
    assert_eq!(legs[0].ty, TypeExpr::Literal(LiteralValue::Number(2.0)));
    assert_eq!(members.len(), 2);
}

#[test]
fn test_identity_instantiation_is_identity() {
    let system = source_only(CHAIN);
    let b = system.lookup_type("B").expect("declared");
    let open = vec![TypeExpr::TypeParameter("U".to_string())];
    let env = system.get_instantiation(&b, &open, &b).expect("query").expect("self");
    assert_eq!(env.get("U"), Some(&open[0]));

    let b_open = generic(&system, "B", open);
    assert_eq!(
        system.get_member_type(&b_open, "other").expect("member"),
        TypeExpr::TypeParameter("U".to_string())
    );
}

#[test]
fn test_method_type_parameters_shadow_the_receiver() {
    let system = source_only(
        "class Box<T> {\n  put(value: T): void {}\n  map<T>(value: T): T {}\n}\nlet b: Box<string>;\nb.put('x');\nb.map(1);",
    );
    let receiver = type_of_variable(&system, "b").expect("annotated");

    let put = system.resolve_call_signature(call(&system, "put")).expect("binds");
    let resolved = system
        .resolve_call(&CallQuery::new(put, 1).with_receiver(receiver.clone()))
        .expect("resolves");
    assert_eq!(resolved.parameter_types, vec![TypeExpr::STRING]);

    let map = system.resolve_call_signature(call(&system, "map")).expect("binds");
    let resolved = system
        .resolve_call(&CallQuery::new(map, 1).with_receiver(receiver.clone()))
        .expect("resolves");
    assert_eq!(
        resolved.parameter_types,
        vec![TypeExpr::TypeParameter("T".to_string())],
        "the method's own T is not the receiver's"
    );

    let resolved = system
        .resolve_call(
            &CallQuery::new(map, 1)
                .with_receiver(receiver)
                .with_type_args(vec![TypeExpr::NUMBER]),
        )
        .expect("resolves");
    assert_eq!(resolved.parameter_types, vec![TypeExpr::NUMBER]);
    assert_eq!(resolved.return_type, TypeExpr::NUMBER);

    let err = system
        .resolve_call(&CallQuery::new(map, 1).with_type_args(vec![TypeExpr::NUMBER, TypeExpr::STRING]))
        .expect_err("one type parameter");
    assert_eq!(err.code(), Some(diagnostic_codes::TYPE_ARGUMENT_COUNT_MISMATCH));
    let err = system.resolve_call(&CallQuery::new(put, 3)).expect_err("one parameter");
    assert_eq!(err.code(), Some(diagnostic_codes::UNRESOLVED_CALL_SIGNATURE));
}

#[test]
fn test_inherited_constructor_builds_the_derived_type() {
    let system = source_only(
        "class Base<T> { constructor(seed: T) {} }\nclass Derived extends Base<number> {}\nnew Derived(1);",
    );
    let id = system
        .resolve_constructor_signature(node(&system, |kind| matches!(kind, NodeKind::NewExpression(_))))
        .expect("binds");
    let resolved = system.resolve_call(&CallQuery::new(id, 1)).expect("resolves");
    assert_eq!(resolved.parameter_types, vec![TypeExpr::NUMBER]);
    assert_eq!(resolved.return_type, reference(&system, "Derived"));
}

#[test]
fn test_base_constructor_resolved_first_does_not_capture_the_derived_one() {
    let system = source_only(
        "class Base<T> { constructor(seed: T) {} }\nclass Derived extends Base<number> {}\nnew Base<string>(\"s\");\nnew Derived(1);",
    );
    let news = nodes(&system, |kind| matches!(kind, NodeKind::NewExpression(_)));
    let base = system.resolve_constructor_signature(news[0]).expect("base binds");
    let derived = system.resolve_constructor_signature(news[1]).expect("derived binds");
    assert_ne!(base, derived, "one handle per constructed type");

    let base_shape = system.signature(base).expect("shape");
    assert_eq!(base_shape.params[0].ty, TypeExpr::TypeParameter("T".to_string()));
    assert_eq!(
        base_shape.return_type,
        generic(&system, "Base", vec![TypeExpr::TypeParameter("T".to_string())])
    );

    let resolved = system.resolve_call(&CallQuery::new(derived, 1)).expect("resolves");
    assert_eq!(resolved.parameter_types, vec![TypeExpr::NUMBER]);
    assert_eq!(resolved.return_type, reference(&system, "Derived"));
    assert_eq!(
        system.resolve_constructor_signature(news[0]).expect("stable"),
        base,
        "re-resolving the base keeps its handle"
    );
}

#[test]
fn test_implicit_constructor() {
    let system = source_only("class Point { x: number }\nnew Point();");
    let id = system
        .resolve_constructor_signature(node(&system, |kind| matches!(kind, NodeKind::NewExpression(_))))
        .expect("binds");
    let shape = system.signature(id).expect("shape");
    assert!(shape.params.is_empty());
    assert_eq!(shape.return_type, reference(&system, "Point"));
}

#[test]
fn test_instantiate() {
    let system = source_only("class Box<T> { value: T }\nclass Plain {}\nfunction id<T>(value: T): T {}");
    let boxed = system
        .instantiate(&reference(&system, "Box"), &[TypeExpr::STRING])
        .expect("generic");
    assert_eq!(boxed, generic(&system, "Box", vec![TypeExpr::STRING]));
    assert_eq!(system.get_member_type(&boxed, "value").expect("member"), TypeExpr::STRING);

    let err = system
        .instantiate(&reference(&system, "Plain"), &[TypeExpr::STRING])
        .expect_err("not generic");
    assert_eq!(err.code(), Some(diagnostic_codes::NOT_GENERIC));
    let err = system
        .instantiate(&reference(&system, "Box"), &[TypeExpr::STRING, TypeExpr::NUMBER])
        .expect_err("arity");
    assert_eq!(err.code(), Some(diagnostic_codes::TYPE_ARGUMENT_COUNT_MISMATCH));

    let function = node(&system, |kind| matches!(kind, NodeKind::FunctionDeclaration(_)));
    let ty = system.type_of_decl(system.declaration(function).expect("declared")).expect("typed");
    let TypeExpr::Function(shape) = system.instantiate(&ty, &[TypeExpr::BOOLEAN]).expect("generic function") else {
        panic!("still a function");
    };
    assert!(shape.type_params.is_empty());
    assert_eq!(shape.params[0].ty, TypeExpr::BOOLEAN);
    assert_eq!(shape.return_type, TypeExpr::BOOLEAN);
}

// =============================================================================
// Members and utility types
// =============================================================================

#[test]
fn test_member_handles() {
    let system = source_only("class Base { id: string }\nclass Derived extends Base {}");
    let derived = system.lookup_type("Derived").expect("declared");
    let id = system.resolve_member(&derived, "id").expect("inherited");
    assert_eq!(
        id,
        system.resolve_member(&system.lookup_type("Base").expect("declared"), "id").expect("own"),
        "minted on the declaring type"
    );
    assert_eq!(system.member_type(id).expect("typed"), TypeExpr::STRING);
    assert_eq!(
        system.resolve_member(&derived, "nope").expect_err("missing").code(),
        Some(diagnostic_codes::MEMBER_NOT_FOUND)
    );
}

#[test]
fn test_optional_members_and_tuples() {
    let system = source_only("interface Options { verbose?: boolean; name: string }\nlet pair: [string, number?];");
    let options = reference(&system, "Options");
    assert_eq!(
        system.resolve_property_access(&options, "verbose").expect("optional"),
        TypeExpr::union([TypeExpr::BOOLEAN, TypeExpr::Undefined])
    );
    assert_eq!(system.resolve_property_access(&options, "name").expect("required"), TypeExpr::STRING);

    let pair = type_of_variable(&system, "pair").expect("annotated");
    assert_eq!(system.resolve_property_access(&pair, "0").expect("first"), TypeExpr::STRING);
    assert_eq!(
        system.resolve_property_access(&pair, "1").expect("second"),
        TypeExpr::union([TypeExpr::NUMBER, TypeExpr::Undefined])
    );
    assert_eq!(system.resolve_property_access(&pair, "length").expect("length"), TypeExpr::NUMBER);
    assert_eq!(
        system.resolve_property_access(&pair, "2").expect_err("out of range").code(),
        Some(diagnostic_codes::MEMBER_NOT_FOUND)
    );
    assert_eq!(
        system
            .resolve_property_access(&TypeExpr::array(TypeExpr::STRING), "length")
            .expect("array length"),
        TypeExpr::NUMBER
    );
}

#[test]
fn test_union_members_are_the_common_members() {
    let system = source_only("interface Cat { id: string; meow: string }\ninterface Dog { id: number; bark: string }");
    let union = TypeExpr::union([reference(&system, "Cat"), reference(&system, "Dog")]);
    let members = system.get_structural_members(&union).expect("members");
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].name, "id");
    assert_eq!(members[0].ty, TypeExpr::union([TypeExpr::STRING, TypeExpr::NUMBER]));
}

#[test]
fn test_partial_then_required_round_trips() {
    let system = source_only("interface User { name: string; age?: number }");
    let user = reference(&system, "User");
    let original = system.get_structural_members(&user).expect("members");

    let partial = system.expand_utility_type("Partial", &[user]).expect("expands");
    let TypeExpr::Object(partial_members) = &partial else {
        panic!("expanded to an object");
    };
    assert!(partial_members.iter().all(|m| m.optional));

    let required = system.expand_utility_type("Required", &[partial]).expect("expands");
    let TypeExpr::Object(required_members) = required else {
        panic!("expanded to an object");
    };
    assert!(required_members.iter().all(|m| !m.optional));
    let types = |members: &[PropertyInfo]| members.iter().map(|m| (m.name.clone(), m.ty.clone())).collect::<Vec<_>>();
    assert_eq!(types(&required_members), types(&original));
}

#[test]
fn test_utility_annotations_over_nominal_types() {
    let system = source_only("interface User { name: string }\nlet draft: Partial<User>;\nlet fixed: Readonly<User>;");
    let TypeExpr::Object(draft) = type_of_variable(&system, "draft").expect("expands") else {
        panic!("expanded to an object");
    };
    assert!(draft[0].optional);
    let TypeExpr::Object(fixed) = type_of_variable(&system, "fixed").expect("expands") else {
        panic!("expanded to an object");
    };
    assert!(fixed[0].readonly);
}

#[test]
fn test_utility_over_a_type_parameter_expands_once_bound() {
    let system = source_only(
        "interface User { name: string }\ninterface Box<T> { p: Partial<T> }\ntype P<T> = Partial<T>;\nlet x: P<{ a: number }>;\nlet y: P<User>;",
    );
    let property = |name: &str, ty: TypeExpr, optional: bool| PropertyInfo {
        name: name.to_string(),
        ty,
        optional,
        readonly: false,
    };
    let shape = TypeExpr::Object(vec![property("a", TypeExpr::NUMBER, false)]);
    let expected = TypeExpr::Object(vec![property("a", TypeExpr::NUMBER, true)]);

    let boxed = generic(&system, "Box", vec![shape]);
    assert_eq!(system.get_member_type(&boxed, "p").expect("member"), expected);
    assert_eq!(type_of_variable(&system, "x").expect("alias"), expected);
    assert_eq!(
        type_of_variable(&system, "y").expect("alias over a nominal type"),
        TypeExpr::Object(vec![property("name", TypeExpr::STRING, true)])
    );
    assert_eq!(
        system
            .get_member_type(&generic(&system, "Box", vec![reference(&system, "User")]), "p")
            .expect("member over a nominal type"),
        TypeExpr::Object(vec![property("name", TypeExpr::STRING, true)])
    );

    let member = system.resolve_member(&system.lookup_type("Box").expect("declared"), "p").expect("own");
    assert_eq!(system.member_type(member).expect("declared").to_string(), "Partial<T>");
    assert_eq!(
        system
            .get_structural_members(&TypeExpr::TypeParameter("T".to_string()))
            .expect_err("no members")
            .code(),
        Some(diagnostic_codes::NOT_A_NOMINAL_TYPE)
    );
}

#[test]
fn test_utility_results_are_checked() {
    let system = source_only("class Box<T> { value: T }");
    let missing = TypeExpr::unresolved("Missing", UnresolvedReason::UnknownName);
    assert_eq!(
        system
            .expand_utility_type("Partial", std::slice::from_ref(&missing))
            .expect_err("unresolved argument")
            .code(),
        Some(diagnostic_codes::UNRESOLVED_TYPE_NAME)
    );
    assert_eq!(
        system
            .instantiate(&reference(&system, "Box"), &[missing])
            .expect_err("unresolved argument")
            .code(),
        Some(diagnostic_codes::UNRESOLVED_TYPE_NAME)
    );
}

#[test]
fn test_utility_over_non_object_arguments() {
    let system = source_only("let callback: () => void;");
    let numbers = TypeExpr::array(TypeExpr::NUMBER);
    assert_eq!(
        system.expand_utility_type("Readonly", std::slice::from_ref(&numbers)).expect("array"),
        numbers
    );
    assert_eq!(
        system.expand_utility_type("Partial", &[TypeExpr::STRING]).expect("primitive"),
        TypeExpr::STRING
    );
    let callback = type_of_variable(&system, "callback").expect("annotated");
    assert_eq!(
        system.expand_utility_type("Partial", &[callback]).expect_err("function").code(),
        Some(diagnostic_codes::UNSUPPORTED_UTILITY_TYPE)
    );
}

#[test]
fn test_self_referential_utility_terminates() {
    let system = source_only("interface Link { next: Partial<Link>; label: string }");
    let link = reference(&system, "Link");
    assert!(system.get_member_type(&link, "next").is_err());
    assert_eq!(system.get_member_type(&link, "label").expect("plain member"), TypeExpr::STRING);
}

// =============================================================================
// Assignability and nominal views
// =============================================================================

#[test]
fn test_assignability_is_conservative() {
    let (_root, system) = with_library(
        "class Base<T> { value: T }\nclass Derived extends Base<number> {}\ninterface Named { name: string }\nclass Person implements Named { name: string }",
    );
    let string_literal = TypeExpr::Literal(LiteralValue::String("x".to_string()));
    assert!(system.is_assignable_to(&string_literal, &TypeExpr::STRING));
    assert!(!system.is_assignable_to(&TypeExpr::NUMBER, &TypeExpr::STRING));
    assert!(system.is_assignable_to(&TypeExpr::STRING, &reference(&system, "String")));

    let derived = reference(&system, "Derived");
    assert!(system.is_assignable_to(&derived, &generic(&system, "Base", vec![TypeExpr::NUMBER])));
    assert!(!system.is_assignable_to(&derived, &generic(&system, "Base", vec![TypeExpr::STRING])));
    assert!(system.is_assignable_to(&reference(&system, "Person"), &reference(&system, "Named")));
    assert!(!system.is_assignable_to(&reference(&system, "Named"), &reference(&system, "Person")));

    let shape = TypeExpr::Object(vec![PropertyInfo {
        name: "name".to_string(),
        ty: TypeExpr::STRING,
        optional: false,
        readonly: false,
    }]);
    assert!(system.is_assignable_to(&reference(&system, "Person"), &shape));

    let either = TypeExpr::union([TypeExpr::STRING, TypeExpr::NUMBER]);
    assert!(system.is_assignable_to(&TypeExpr::NUMBER, &either));
    assert!(!system.is_assignable_to(&either, &TypeExpr::NUMBER));
    assert!(system.is_assignable_to(&TypeExpr::array(string_literal), &TypeExpr::array(TypeExpr::STRING)));

    let missing = TypeExpr::unresolved("Missing", UnresolvedReason::UnknownName);
    assert!(!system.is_assignable_to(&missing, &TypeExpr::Any));
    assert!(!system.is_assignable_to(&missing, &missing));

    let empty = TypeExpr::Object(Vec::new());
    let optional_only = TypeExpr::Object(vec![PropertyInfo {
        name: "a".to_string(),
        ty: TypeExpr::NUMBER,
        optional: true,
        readonly: false,
    }]);
    assert!(!system.is_assignable_to(&TypeExpr::Null, &empty));
    assert!(!system.is_assignable_to(&TypeExpr::Undefined, &optional_only));
    assert!(!system.is_assignable_to(&TypeExpr::TypeParameter("T".to_string()), &empty));
    assert!(!system.is_assignable_to(&TypeExpr::union([TypeExpr::STRING, TypeExpr::Null]), &empty));
    assert!(system.is_assignable_to(&TypeExpr::STRING, &empty), "the carrier has members");
    assert!(system.is_assignable_to(&reference(&system, "Person"), &optional_only));

    let raw = reference(&system, "Base");
    let applied = generic(&system, "Base", vec![TypeExpr::NUMBER]);
    assert!(!system.is_assignable_to(&raw, &applied), "raw reference is not an instantiation");
    assert!(!system.is_assignable_to(&applied, &raw));
    assert!(!system.is_assignable_to(&derived, &raw));
}

#[test]
fn test_resolve_nominal() {
    let (_root, system) = with_library("");
    let string = system.resolve_nominal(&TypeExpr::STRING).expect("carrier");
    assert_eq!(string.type_id.stable_id(), "System.Runtime:System.String");
    assert!(string.is_sealed);
    assert_eq!(
        system
            .resolve_nominal(&TypeExpr::array(TypeExpr::NUMBER))
            .expect_err("structural")
            .code(),
        Some(diagnostic_codes::NOT_A_NOMINAL_TYPE)
    );
    assert_eq!(system.nominal_types().count(), 4);
}

// =============================================================================
// Concurrency and the compilation gate
// =============================================================================

#[test]
fn test_concurrent_queries_agree() {
    use rayon::prelude::*;

    let system = source_only(CHAIN);
    let c = reference(&system, "C");
    let a = system.lookup_type("A").expect("declared");
    let c_id = system.lookup_type("C").expect("declared");

    let results: Vec<(TypeExpr, Option<Arc<InstantiationEnv>>)> = (0..64)
        .into_par_iter()
        .map(|_| {
            (
                system.get_member_type(&c, "value").expect("member"),
                system.get_instantiation(&c_id, &[], &a).expect("query"),
            )
        })
        .collect();
    let (first_type, first_env) = &results[0];
    for (ty, env) in &results {
        assert_eq!(ty, first_type);
        assert_eq!(env, first_env);
    }
}

#[test]
fn test_gate_blocks_units_with_query_errors() {
    let system = source_only("let ok: string;\nlet bad = 1;");
    let mut gate = CompilationGate::new("src/app.ts");
    gate.record_all(system.construction_diagnostics().iter().cloned());
    assert!(gate.check(type_of_variable(&system, "ok")).is_some());
    assert!(gate.check(type_of_variable(&system, "bad")).is_none());
    let diagnostics = gate.finish().expect_err("blocked");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].code, diagnostic_codes::MISSING_TYPE_ANNOTATION);
}
