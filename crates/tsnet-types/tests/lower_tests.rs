use super::*;
use crate::catalog::UnifiedCatalog;
use crate::config::TypeSystemConfig;
use tsnet_metadata::{MetadataCatalog, parse_type_ref};

struct Fixture {
    program: Program,
    registry: TypeRegistry,
    catalog: UnifiedCatalog,
}

impl Fixture {
    fn new(source: &str) -> Self {
        let program = Program::from_sources([("src/app.ts", source)]);
        let config = TypeSystemConfig::default();
        let registry = TypeRegistry::build(&program, &config);
        let catalog = UnifiedCatalog::build(&program, &registry, &MetadataCatalog::new(), &config);
        Self {
            program,
            registry,
            catalog,
        }
    }

    fn lowerer(&self) -> Lowerer<'_> {
        Lowerer::new(&self.program, &self.registry, self.catalog.index())
    }

    fn find(&self, predicate: impl Fn(&NodeKind) -> bool) -> NodeRef {
        let file = self.program.file(FileId(0)).expect("file");
        let (index, _) = file
            .arena
            .iter()
            .find(|(_, node)| predicate(&node.kind))
            .expect("node present");
        NodeRef::new(FileId(0), index)
    }

    /// Annotation of `let name: ...`.
    fn annotation(&self, name: &str) -> NodeRef {
        let declaration = self.find(|kind| matches!(kind, NodeKind::VariableDeclaration(data) if data.name == name));
        match self.program.node(declaration).map(|n| &n.kind) {
            Some(NodeKind::VariableDeclaration(data)) => NodeRef::new(FileId(0), data.type_annotation),
            _ => unreachable!(),
        }
    }

    fn lower_variable(&self, name: &str) -> TypeExpr {
        self.lowerer().lower_annotation(self.annotation(name))
    }
}

#[test]
fn test_keywords_unions_and_arrays() {
    let fixture = Fixture::new(
        "let a: string | null;\nlet b: number[];\nlet c: Array<boolean>;\nlet d: 'on' | 'off';\nlet e: readonly string[];",
    );
    assert_eq!(
        fixture.lower_variable("a"),
        TypeExpr::Union(vec![TypeExpr::STRING, TypeExpr::Null])
    );
    assert_eq!(fixture.lower_variable("b"), TypeExpr::array(TypeExpr::NUMBER));
    assert_eq!(fixture.lower_variable("c"), TypeExpr::array(TypeExpr::BOOLEAN));
    assert_eq!(
        fixture.lower_variable("d"),
        TypeExpr::Union(vec![
            TypeExpr::Literal(LiteralValue::String("on".to_string())),
            TypeExpr::Literal(LiteralValue::String("off".to_string())),
        ])
    );
    assert_eq!(fixture.lower_variable("e"), TypeExpr::array(TypeExpr::STRING));
}

#[test]
fn test_records_and_index_signatures_become_dictionaries() {
    let fixture = Fixture::new("let a: Record<string, number>;\nlet b: { [key: string]: boolean };");
    let expected = |value: TypeExpr| TypeExpr::Dictionary {
        key: Box::new(TypeExpr::STRING),
        value: Box::new(value),
    };
    assert_eq!(fixture.lower_variable("a"), expected(TypeExpr::NUMBER));
    assert_eq!(fixture.lower_variable("b"), expected(TypeExpr::BOOLEAN));
}

#[test]
fn test_generic_alias_is_expanded_and_substituted() {
    let fixture = Fixture::new("type Pair<A> = [A, A];\nlet p: Pair<string>;");
    let TypeExpr::Tuple(elements) = fixture.lower_variable("p") else {
        panic!("alias body is a tuple");
    };
    assert_eq!(elements.len(), 2);
    assert!(elements.iter().all(|e| e.ty == TypeExpr::STRING));
}

#[test]
fn test_cyclic_alias_is_marked() {
    let fixture = Fixture::new("type Loop = Loop[];\nlet l: Loop;");
    let lowered = fixture.lower_variable("l");
    assert_eq!(
        lowered.first_unresolved().map(|(_, reason)| reason),
        Some(UnresolvedReason::CyclicAlias)
    );
}

#[test]
fn test_unknown_and_unsupported_names_are_marked() {
    let fixture = Fixture::new("let a: Missing;\nlet b: Pick<{ x: number }, 'x'>;\nlet c: keyof { x: number };");
    assert_eq!(
        fixture.lower_variable("a"),
        TypeExpr::unresolved("Missing", UnresolvedReason::UnknownName)
    );
    assert_eq!(
        fixture.lower_variable("b"),
        TypeExpr::unresolved("Pick", UnresolvedReason::UnsupportedUtility)
    );
    assert_eq!(
        fixture.lower_variable("c").first_unresolved().map(|(_, reason)| reason),
        Some(UnresolvedReason::UnsupportedSyntax)
    );
}

#[test]
fn test_enclosing_type_parameters_and_this() {
    let fixture = Fixture::new("class Box<T> {\n  value: T;\n  self: this;\n}");
    let value = fixture
        .registry
        .get_member_type_node("App.Box", "value")
        .expect("annotated");
    assert_eq!(
        fixture.lowerer().lower_annotation(value),
        TypeExpr::TypeParameter("T".to_string())
    );

    let this = fixture
        .registry
        .get_member_type_node("App.Box", "self")
        .expect("annotated");
    let TypeExpr::Reference { id, args } = fixture.lowerer().lower_annotation(this) else {
        panic!("this is the enclosing class");
    };
    assert_eq!(id.stable_id(), "App:App.Box");
    assert_eq!(args, vec![TypeExpr::TypeParameter("T".to_string())]);
}

#[test]
fn test_parameter_modes_and_optionality() {
    let fixture = Fixture::new(
        "function parse(text: string, result: out<number>, total: ref<number>, radix = 10, ...rest: string[]): boolean { return true }",
    );
    let function = fixture.find(|kind| matches!(kind, NodeKind::FunctionDeclaration(_)));
    let shape = fixture.lowerer().signature_of(function, None).expect("function shape");

    let modes: Vec<_> = shape.params.iter().map(|p| p.mode).collect();
    assert_eq!(
        modes,
        vec![
            ParameterMode::Value,
            ParameterMode::Out,
            ParameterMode::Ref,
            ParameterMode::Value,
            ParameterMode::Value
        ]
    );
    assert_eq!(shape.params[1].ty, TypeExpr::NUMBER);
    assert!(shape.params[3].optional, "an initializer makes a parameter optional");
    assert_eq!(
        shape.params[3].ty,
        TypeExpr::unresolved("radix", UnresolvedReason::MissingAnnotation),
        "initializers are never used to infer a type"
    );
    assert!(shape.params[4].rest);
    assert_eq!(shape.return_type, TypeExpr::BOOLEAN);
    assert_eq!(shape.arity(), (3, None));
}

#[test]
fn test_missing_return_annotation_is_marked() {
    let fixture = Fixture::new("function noop() {}");
    let function = fixture.find(|kind| matches!(kind, NodeKind::FunctionDeclaration(_)));
    let shape = fixture.lowerer().signature_of(function, None).expect("function shape");
    assert_eq!(
        shape.return_type,
        TypeExpr::unresolved("noop", UnresolvedReason::MissingAnnotation)
    );
}

#[test]
fn test_generic_function_scopes_its_parameters() {
    let fixture = Fixture::new("function first<T>(items: T[]): T {}");
    let function = fixture.find(|kind| matches!(kind, NodeKind::FunctionDeclaration(_)));
    let shape = fixture.lowerer().signature_of(function, None).expect("function shape");
    let t = TypeExpr::TypeParameter("T".to_string());
    assert_eq!(shape.type_params[0].name, "T");
    assert_eq!(shape.params[0].ty, TypeExpr::array(t.clone()));
    assert_eq!(shape.return_type, t);
}

#[test]
fn test_utility_over_literal_expands_without_expander() {
    let fixture = Fixture::new("class User { name: string }\nlet a: Partial<{ x: number }>;\nlet b: Partial<User>;");
    let TypeExpr::Object(members) = fixture.lower_variable("a") else {
        panic!("expanded to an object");
    };
    assert!(members[0].optional);
    assert_eq!(
        fixture.lower_variable("b"),
        TypeExpr::unresolved("Partial", UnresolvedReason::UnsupportedUtility)
    );
}

#[test]
fn test_catalog_type_strings() {
    let fixture = Fixture::new("");
    let lowerer = fixture.lowerer();
    let nullable = parse_type_ref("System.Nullable`1<System.Int32>").expect("parses");
    assert_eq!(
        lowerer.lower_type_ref(&nullable, &[]),
        TypeExpr::Union(vec![TypeExpr::NUMBER, TypeExpr::Null])
    );

    let array = parse_type_ref("T[]").expect("parses");
    assert_eq!(
        lowerer.lower_type_ref(&array, &["T".to_string()]),
        TypeExpr::array(TypeExpr::TypeParameter("T".to_string()))
    );

    let unknown = parse_type_ref("Contoso.Widget").expect("parses");
    assert_eq!(
        lowerer.lower_type_ref(&unknown, &[]),
        TypeExpr::unresolved("Contoso.Widget", UnresolvedReason::UnknownName)
    );
}

#[test]
fn test_wrapper_names() {
    assert_eq!(wrapper_mode("out"), Some(Some(ParameterMode::Out)));
    assert_eq!(wrapper_mode("inref"), Some(Some(ParameterMode::In)));
    assert_eq!(wrapper_mode("thisarg"), Some(None));
    assert_eq!(wrapper_mode("Promise"), None);
}
