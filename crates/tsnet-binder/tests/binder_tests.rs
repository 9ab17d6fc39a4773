use super::*;
use tsnet_parser::{NodeKind, Program};

/// Find the first identifier expression named `name` in `file`.
fn find_identifier(program: &Program, file: FileId, name: &str) -> NodeRef {
    let source = program.file(file).expect("file exists");
    let (index, _) = source
        .arena
        .iter()
        .find(|(_, node)| matches!(&node.kind, NodeKind::Identifier(text) if text == name))
        .expect("identifier present");
    NodeRef::new(file, index)
}

fn find_identifiers(program: &Program, file: FileId, name: &str) -> Vec<NodeRef> {
    let source = program.file(file).expect("file exists");
    source
        .arena
        .iter()
        .filter(|(_, node)| matches!(&node.kind, NodeKind::Identifier(text) if text == name))
        .map(|(index, _)| NodeRef::new(file, index))
        .collect()
}

#[test]
fn test_top_level_declarations_bind() {
    let program = Program::from_sources([(
        "src/app.ts",
        "function greet(name: string): string { return name }\nclass Greeter {}\nconst g = greet(\"x\")",
    )]);
    let bound = BoundProgram::bind(&program);

    let call_target = find_identifier(&program, FileId(0), "greet");
    let symbol = bound.resolve_identifier(call_target).expect("greet binds");
    let symbol = bound.symbol(symbol).expect("symbol exists");
    assert!(symbol.has_any_flags(symbol_flags::FUNCTION));
    assert_eq!(symbol.escaped_name, "greet");

    let declaration = bound.declaration_of(call_target).expect("declaration");
    assert!(matches!(
        program.node(declaration).map(|n| &n.kind),
        Some(NodeKind::FunctionDeclaration(_))
    ));
    assert!(bound.lookup_global("Greeter").is_some());
}

#[test]
fn test_parameter_shadows_global() {
    let program = Program::from_sources([(
        "src/app.ts",
        "const value = 1\nfunction f(value: number) { return value }",
    )]);
    let bound = BoundProgram::bind(&program);

    let uses = find_identifiers(&program, FileId(0), "value");
    assert_eq!(uses.len(), 1);
    let declaration = bound.declaration_of(uses[0]).expect("binds");
    assert!(matches!(
        program.node(declaration).map(|n| &n.kind),
        Some(NodeKind::Parameter(_))
    ));
}

#[test]
fn test_block_scoped_declarations_are_hoisted_within_block() {
    let program = Program::from_sources([(
        "src/app.ts",
        "function outer() { inner(); function inner() {} }",
    )]);
    let bound = BoundProgram::bind(&program);
    let call = find_identifier(&program, FileId(0), "inner");
    let declaration = bound.declaration_of(call).expect("hoisted");
    assert!(matches!(
        program.node(declaration).map(|n| &n.kind),
        Some(NodeKind::FunctionDeclaration(f)) if f.name == "inner"
    ));
    // Nested declarations are not visible at file scope.
    assert!(bound.lookup_global("inner").is_none());
}

#[test]
fn test_file_locals_shadow_globals() {
    let program = Program::from_sources([
        ("src/a.ts", "function helper() {}"),
        ("src/b.ts", "function helper() {}\nhelper()"),
        ("src/c.ts", "helper()"),
    ]);
    let bound = BoundProgram::bind(&program);

    let in_b = bound.declaration_of(find_identifier(&program, FileId(1), "helper")).expect("b binds");
    assert_eq!(in_b.file, FileId(1));

    let in_c = bound.declaration_of(find_identifier(&program, FileId(2), "helper")).expect("c binds");
    assert_eq!(in_c.file, FileId(0), "globals keep the first declaration");
}

#[test]
fn test_interface_declarations_merge_into_one_symbol() {
    let program = Program::from_sources([(
        "src/app.ts",
        "interface Box { a: string }\ninterface Box { b: number }",
    )]);
    let bound = BoundProgram::bind(&program);
    let symbol = bound.lookup_in_file(FileId(0), "Box").expect("declared");
    let symbol = bound.symbol(symbol).expect("symbol exists");
    assert_eq!(symbol.declarations.len(), 2);
    assert!(symbol.value_declaration.is_none());
}

#[test]
fn test_unknown_identifier_has_no_symbol() {
    let program = Program::from_sources([("src/app.ts", "missing()")]);
    let bound = BoundProgram::bind(&program);
    let use_site = find_identifier(&program, FileId(0), "missing");
    assert!(bound.resolve_identifier(use_site).is_none());
}
