//! Expansion of the supported utility types.
//!
//! `Partial`, `Required`, `Readonly` and `NonNullable` are the only utility
//! types the engine expands. Utility types over nominal references need a
//! `StructuralExpander` to turn the reference into a member list first.
//! Arrays and tuples map their elements, unions distribute, and primitives
//! pass through unchanged.

use crate::error::{QueryError, QueryResult};
use crate::types::{FunctionShape, PropertyInfo, TupleElement, TypeExpr};
use tracing::trace;
use tsnet_common::diagnostic_codes;

const SUPPORTED: &[&str] = &["Partial", "Required", "Readonly", "NonNullable"];

/// TypeScript utility types that are recognized but never expanded.
const KNOWN_UNSUPPORTED: &[&str] = &[
    "Pick",
    "Omit",
    "Exclude",
    "Extract",
    "ReturnType",
    "Parameters",
    "InstanceType",
    "Awaited",
    "ConstructorParameters",
    "ThisParameterType",
    "Uppercase",
    "Lowercase",
];

pub(crate) fn is_supported(name: &str) -> bool {
    SUPPORTED.contains(&name)
}

pub(crate) fn is_known_unsupported(name: &str) -> bool {
    KNOWN_UNSUPPORTED.contains(&name)
}

/// Member lists of types that are not already structural.
pub(crate) trait StructuralExpander {
    fn structural_members(&self, ty: &TypeExpr) -> QueryResult<Vec<PropertyInfo>>;
}

/// Expand `name<args>`.
///
/// An unresolved argument is returned as-is so its marker keeps the original
/// reason. An argument that mentions a type parameter yields a deferred
/// `TypeExpr::Utility`.
pub(crate) fn expand(
    name: &str,
    args: &[TypeExpr],
    expander: Option<&dyn StructuralExpander>,
) -> QueryResult<TypeExpr> {
    if !is_supported(name) {
        return Err(unsupported(name));
    }
    let [argument] = args else {
        return Err(QueryError::from_code(
            diagnostic_codes::TYPE_ARGUMENT_COUNT_MISMATCH,
            &[name, "1", args.len().to_string().as_str()],
        ));
    };
    if let Some((unresolved, _)) = argument.first_unresolved() {
        trace!(name, unresolved, "utility argument is unresolved");
        return Ok(argument.clone());
    }
    if argument.contains_type_parameter() {
        trace!(name, %argument, "utility deferred until its argument is closed");
        return Ok(TypeExpr::Utility {
            name: name.to_string(),
            argument: Box::new(argument.clone()),
        });
    }
    if name == "NonNullable" {
        return Ok(non_nullable(argument));
    }
    expand_closed(name, argument, expander)
}

/// `Partial`, `Required` or `Readonly` of an argument free of type parameters.
fn expand_closed(name: &str, argument: &TypeExpr, expander: Option<&dyn StructuralExpander>) -> QueryResult<TypeExpr> {
    let partial = name == "Partial";
    match argument {
        TypeExpr::Primitive(_)
        | TypeExpr::Literal(_)
        | TypeExpr::Any
        | TypeExpr::Unknown
        | TypeExpr::Never
        | TypeExpr::Void
        | TypeExpr::Null
        | TypeExpr::Undefined => Ok(argument.clone()),
        TypeExpr::Union(members) => {
            let expanded = members
                .iter()
                .map(|member| expand_closed(name, member, expander))
                .collect::<QueryResult<Vec<_>>>()?;
            Ok(TypeExpr::union(expanded))
        }
        TypeExpr::Array(element) if partial => Ok(TypeExpr::array(TypeExpr::union([
            element.as_ref().clone(),
            TypeExpr::Undefined,
        ]))),
        TypeExpr::Array(_) => Ok(argument.clone()),
        TypeExpr::Tuple(elements) => Ok(TypeExpr::Tuple(
            elements
                .iter()
                .map(|element| {
                    let mut element = element.clone();
                    match name {
                        "Partial" if element.rest => {
                            if let TypeExpr::Array(inner) = &element.ty {
                                element.ty = TypeExpr::array(TypeExpr::union([
                                    inner.as_ref().clone(),
                                    TypeExpr::Undefined,
                                ]));
                            }
                        }
                        "Partial" => element.optional = true,
                        "Required" => element.optional = false,
                        _ => {}
                    }
                    element
                })
                .collect(),
        )),
        TypeExpr::Dictionary { key, value } if partial => Ok(TypeExpr::Dictionary {
            key: key.clone(),
            value: Box::new(TypeExpr::union([value.as_ref().clone(), TypeExpr::Undefined])),
        }),
        TypeExpr::Dictionary { .. } => Ok(argument.clone()),
        TypeExpr::Function(_) => Err(unsupported(&format!("{name}<{argument}>"))),
        TypeExpr::Object(members) => Ok(TypeExpr::Object(flip(name, members.clone()))),
        other => match expander {
            Some(expander) => Ok(TypeExpr::Object(flip(name, expander.structural_members(other)?))),
            None => Err(unsupported(name)),
        },
    }
}

fn flip(name: &str, mut members: Vec<PropertyInfo>) -> Vec<PropertyInfo> {
    for member in &mut members {
        match name {
            "Partial" => member.optional = true,
            "Required" => member.optional = false,
            _ => member.readonly = true,
        }
    }
    members
}

fn unsupported(name: &str) -> QueryError {
    QueryError::from_code(diagnostic_codes::UNSUPPORTED_UTILITY_TYPE, &[name])
}

/// Expand every deferred utility in `ty` whose argument no longer mentions
/// a type parameter.
pub(crate) fn settle(ty: &TypeExpr, expander: Option<&dyn StructuralExpander>) -> QueryResult<TypeExpr> {
    let all = |types: &[TypeExpr]| types.iter().map(|ty| settle(ty, expander)).collect::<QueryResult<Vec<_>>>();
    Ok(match ty {
        TypeExpr::Utility { name, argument } => {
            let argument = settle(argument, expander)?;
            if argument.contains_type_parameter() {
                TypeExpr::Utility {
                    name: name.clone(),
                    argument: Box::new(argument),
                }
            } else {
                expand(name, std::slice::from_ref(&argument), expander)?
            }
        }
        TypeExpr::Reference { id, args } => TypeExpr::Reference {
            id: id.clone(),
            args: all(args.as_slice())?,
        },
        TypeExpr::Array(element) => TypeExpr::array(settle(element, expander)?),
        TypeExpr::Tuple(elements) => TypeExpr::Tuple(
            elements
                .iter()
                .map(|element| {
                    Ok(TupleElement {
                        ty: settle(&element.ty, expander)?,
                        ..element.clone()
                    })
                })
                .collect::<QueryResult<Vec<_>>>()?,
        ),
        TypeExpr::Union(members) => TypeExpr::union(all(members.as_slice())?),
        TypeExpr::Intersection(members) => TypeExpr::Intersection(all(members.as_slice())?),
        TypeExpr::Function(shape) => TypeExpr::Function(Box::new(settle_shape(shape, expander)?)),
        TypeExpr::Object(members) => TypeExpr::Object(
            members
                .iter()
                .map(|member| {
                    Ok(PropertyInfo {
                        ty: settle(&member.ty, expander)?,
                        ..member.clone()
                    })
                })
                .collect::<QueryResult<Vec<_>>>()?,
        ),
        TypeExpr::Dictionary { key, value } => TypeExpr::Dictionary {
            key: Box::new(settle(key, expander)?),
            value: Box::new(settle(value, expander)?),
        },
        other => other.clone(),
    })
}

pub(crate) fn settle_shape(
    shape: &FunctionShape,
    expander: Option<&dyn StructuralExpander>,
) -> QueryResult<FunctionShape> {
    let mut settled = shape.clone();
    for param in &mut settled.params {
        param.ty = settle(&param.ty, expander)?;
    }
    settled.return_type = settle(&shape.return_type, expander)?;
    Ok(settled)
}

fn non_nullable(ty: &TypeExpr) -> TypeExpr {
    match ty {
        TypeExpr::Union(members) => {
            TypeExpr::union(members.iter().filter(|m| !m.is_nullish()).cloned())
        }
        nullish if nullish.is_nullish() => TypeExpr::Never,
        other => other.clone(),
    }
}

#[cfg(test)]
#[path = "../tests/utility_tests.rs"]
mod tests;
