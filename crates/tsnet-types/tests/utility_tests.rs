use super::*;
use crate::types::{TypeId, UnresolvedReason};

fn property(name: &str, ty: TypeExpr, optional: bool) -> PropertyInfo {
    PropertyInfo {
        name: name.to_string(),
        ty,
        optional,
        readonly: false,
    }
}

fn point() -> TypeExpr {
    TypeExpr::Object(vec![
        property("x", TypeExpr::NUMBER, false),
        property("label", TypeExpr::STRING, true),
    ])
}

/// Expands every reference into one fixed member list.
struct FixedMembers(Vec<PropertyInfo>);

impl StructuralExpander for FixedMembers {
    fn structural_members(&self, _ty: &TypeExpr) -> QueryResult<Vec<PropertyInfo>> {
        Ok(self.0.clone())
    }
}

fn members(ty: &TypeExpr) -> &[PropertyInfo] {
    match ty {
        TypeExpr::Object(members) => members,
        other => panic!("expected an object type, got {other}"),
    }
}

#[test]
fn test_partial_marks_every_member_optional() {
    let expanded = expand("Partial", &[point()], None).expect("expands");
    assert!(members(&expanded).iter().all(|m| m.optional));
}

#[test]
fn test_required_after_partial_restores_flags() {
    let partial = expand("Partial", &[point()], None).expect("expands");
    let required = expand("Required", &[partial], None).expect("expands");
    assert!(members(&required).iter().all(|m| !m.optional));
    let types: Vec<_> = members(&required).iter().map(|m| m.ty.clone()).collect();
    assert_eq!(types, vec![TypeExpr::NUMBER, TypeExpr::STRING]);
}

#[test]
fn test_readonly_keeps_optionality() {
    let expanded = expand("Readonly", &[point()], None).expect("expands");
    let expanded = members(&expanded);
    assert!(expanded.iter().all(|m| m.readonly));
    assert!(!expanded[0].optional);
    assert!(expanded[1].optional);
}

#[test]
fn test_non_nullable_strips_null_and_undefined() {
    let ty = TypeExpr::union([TypeExpr::STRING, TypeExpr::Null, TypeExpr::Undefined]);
    assert_eq!(expand("NonNullable", &[ty], None).expect("expands"), TypeExpr::STRING);
    assert_eq!(
        expand("NonNullable", &[TypeExpr::Null], None).expect("expands"),
        TypeExpr::Never
    );
    assert_eq!(
        expand("NonNullable", &[TypeExpr::NUMBER], None).expect("expands"),
        TypeExpr::NUMBER
    );
}

#[test]
fn test_references_need_an_expander() {
    let reference = TypeExpr::reference(TypeId::new("App", "App.User", "User"));
    let err = expand("Partial", std::slice::from_ref(&reference), None).expect_err("no expander");
    assert_eq!(err.code(), Some(diagnostic_codes::UNSUPPORTED_UTILITY_TYPE));

    let expander = FixedMembers(vec![property("name", TypeExpr::STRING, false)]);
    let expanded = expand("Partial", &[reference], Some(&expander)).expect("expands");
    assert_eq!(members(&expanded).len(), 1);
    assert!(members(&expanded)[0].optional);
}

#[test]
fn test_wrong_argument_count() {
    let err = expand("Partial", &[point(), point()], None).expect_err("two arguments");
    assert_eq!(err.code(), Some(diagnostic_codes::TYPE_ARGUMENT_COUNT_MISMATCH));
    let err = expand("Required", &[], None).expect_err("no arguments");
    assert_eq!(err.code(), Some(diagnostic_codes::TYPE_ARGUMENT_COUNT_MISMATCH));
}

#[test]
fn test_unsupported_names() {
    assert!(is_known_unsupported("Pick"));
    assert!(!is_supported("Pick"));
    assert!(is_supported("NonNullable"));
    let err = expand("Omit", &[point()], None).expect_err("not expanded");
    assert_eq!(err.code(), Some(diagnostic_codes::UNSUPPORTED_UTILITY_TYPE));
}

#[test]
fn test_unresolved_argument_keeps_its_own_reason() {
    let missing = TypeExpr::unresolved("Missing", UnresolvedReason::UnknownName);
    let expanded = expand("Partial", std::slice::from_ref(&missing), None).expect("marker kept");
    assert_eq!(
        expanded.first_unresolved(),
        Some(("Missing", UnresolvedReason::UnknownName)),
        "the name that failed is reported, not the utility"
    );
}

#[test]
fn test_type_parameter_argument_is_deferred() {
    let open = TypeExpr::TypeParameter("T".to_string());
    let expander = FixedMembers(Vec::new());
    let deferred = expand("Partial", std::slice::from_ref(&open), Some(&expander)).expect("deferred");
    assert_eq!(
        deferred,
        TypeExpr::Utility {
            name: "Partial".to_string(),
            argument: Box::new(open),
        }
    );
    assert_eq!(deferred.to_string(), "Partial<T>");

    let nested = TypeExpr::array(TypeExpr::TypeParameter("T".to_string()));
    assert!(matches!(
        expand("Readonly", &[nested], None).expect("deferred"),
        TypeExpr::Utility { .. }
    ));
}

#[test]
fn test_settle_expands_closed_arguments_only() {
    let ty = TypeExpr::Object(vec![
        property(
            "closed",
            TypeExpr::Utility {
                name: "Partial".to_string(),
                argument: Box::new(point()),
            },
            false,
        ),
        property(
            "open",
            TypeExpr::Utility {
                name: "Partial".to_string(),
                argument: Box::new(TypeExpr::TypeParameter("T".to_string())),
            },
            false,
        ),
    ]);
    let settled = settle(&ty, None).expect("settles");
    let settled = members(&settled);
    assert!(members(&settled[0].ty).iter().all(|m| m.optional));
    assert!(matches!(settled[1].ty, TypeExpr::Utility { .. }));
}

#[test]
fn test_primitives_pass_through() {
    for name in ["Partial", "Required", "Readonly"] {
        assert_eq!(expand(name, &[TypeExpr::NUMBER], None).expect("expands"), TypeExpr::NUMBER);
    }
    let literal = TypeExpr::Literal(crate::types::LiteralValue::String("on".to_string()));
    let expander = FixedMembers(vec![property("Length", TypeExpr::NUMBER, false)]);
    assert_eq!(
        expand("Partial", std::slice::from_ref(&literal), Some(&expander)).expect("expands"),
        literal,
        "the carrier's members are not used"
    );
}

#[test]
fn test_arrays_and_tuples_map_their_elements() {
    let numbers = TypeExpr::array(TypeExpr::NUMBER);
    assert_eq!(expand("Readonly", std::slice::from_ref(&numbers), None).expect("expands"), numbers);
    assert_eq!(
        expand("Partial", std::slice::from_ref(&numbers), None).expect("expands"),
        TypeExpr::array(TypeExpr::union([TypeExpr::NUMBER, TypeExpr::Undefined]))
    );

    let element = |ty: TypeExpr, optional: bool| TupleElement {
        name: None,
        ty,
        optional,
        rest: false,
    };
    let pair = TypeExpr::Tuple(vec![element(TypeExpr::STRING, false), element(TypeExpr::NUMBER, true)]);
    let TypeExpr::Tuple(partial) = expand("Partial", std::slice::from_ref(&pair), None).expect("expands") else {
        panic!("still a tuple");
    };
    assert!(partial.iter().all(|e| e.optional));
    assert_eq!(partial[0].ty, TypeExpr::STRING);
    let TypeExpr::Tuple(required) = expand("Required", &[pair], None).expect("expands") else {
        panic!("still a tuple");
    };
    assert!(required.iter().all(|e| !e.optional));
}

#[test]
fn test_unions_distribute() {
    let either = TypeExpr::union([point(), TypeExpr::Null]);
    let TypeExpr::Union(members_of) = expand("Partial", &[either], None).expect("expands") else {
        panic!("still a union");
    };
    assert_eq!(members_of.len(), 2);
    assert!(members(&members_of[0]).iter().all(|m| m.optional));
    assert_eq!(members_of[1], TypeExpr::Null);
}

#[test]
fn test_function_arguments_are_unsupported() {
    let callback = TypeExpr::Function(Box::new(FunctionShape {
        type_params: Vec::new(),
        params: Vec::new(),
        return_type: TypeExpr::Void,
    }));
    let expander = FixedMembers(Vec::new());
    let err = expand("Partial", &[callback], Some(&expander)).expect_err("function");
    assert_eq!(err.code(), Some(diagnostic_codes::UNSUPPORTED_UTILITY_TYPE));
}
