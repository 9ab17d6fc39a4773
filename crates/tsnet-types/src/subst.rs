//! Type-parameter substitution.

use crate::types::{FunctionShape, ParamInfo, PropertyInfo, TupleElement, TypeExpr, TypeParamInfo};
use crate::utility;
use rustc_hash::FxHashMap;

/// Bindings of type-parameter names to types.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InstantiationEnv {
    bindings: FxHashMap<String, TypeExpr>,
}

impl InstantiationEnv {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pair `names` with `args` positionally. Extra names or args are ignored.
    #[must_use]
    pub fn from_zip(names: &[String], args: &[TypeExpr]) -> Self {
        Self {
            bindings: names.iter().cloned().zip(args.iter().cloned()).collect(),
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&TypeExpr> {
        self.bindings.get(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, ty: TypeExpr) {
        self.bindings.insert(name.into(), ty);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TypeExpr)> {
        self.bindings.iter().map(|(name, ty)| (name.as_str(), ty))
    }

    /// A copy without bindings for `names`, which are shadowed by an inner scope.
    fn without<'n>(&self, names: impl IntoIterator<Item = &'n str>) -> Self {
        let mut env = self.clone();
        for name in names {
            env.bindings.remove(name);
        }
        env
    }
}

/// Replace every bound type parameter in `ty`.
pub(crate) fn substitute(ty: &TypeExpr, env: &InstantiationEnv) -> TypeExpr {
    if env.is_empty() {
        return ty.clone();
    }
    match ty {
        TypeExpr::TypeParameter(name) => env.get(name).cloned().unwrap_or_else(|| ty.clone()),
        TypeExpr::Reference { id, args } => TypeExpr::Reference {
            id: id.clone(),
            args: args.iter().map(|arg| substitute(arg, env)).collect(),
        },
        TypeExpr::Array(element) => TypeExpr::array(substitute(element, env)),
        TypeExpr::Tuple(elements) => TypeExpr::Tuple(
            elements
                .iter()
                .map(|element| TupleElement {
                    ty: substitute(&element.ty, env),
                    ..element.clone()
                })
                .collect(),
        ),
        TypeExpr::Union(members) => TypeExpr::union(members.iter().map(|m| substitute(m, env))),
        TypeExpr::Intersection(members) => {
            TypeExpr::Intersection(members.iter().map(|m| substitute(m, env)).collect())
        }
        TypeExpr::Function(shape) => TypeExpr::Function(Box::new(substitute_shape(shape, env))),
        TypeExpr::Object(members) => TypeExpr::Object(
            members
                .iter()
                .map(|member| PropertyInfo {
                    ty: substitute(&member.ty, env),
                    ..member.clone()
                })
                .collect(),
        ),
        TypeExpr::Dictionary { key, value } => TypeExpr::Dictionary {
            key: Box::new(substitute(key, env)),
            value: Box::new(substitute(value, env)),
        },
        TypeExpr::Utility { name, argument } => {
            let argument = substitute(argument, env);
            // Closed arguments that need a nominal expander stay deferred.
            utility::expand(name, std::slice::from_ref(&argument), None).unwrap_or_else(|_| TypeExpr::Utility {
                name: name.clone(),
                argument: Box::new(argument),
            })
        }
        TypeExpr::Primitive(_)
        | TypeExpr::Any
        | TypeExpr::Unknown
        | TypeExpr::Never
        | TypeExpr::Void
        | TypeExpr::Null
        | TypeExpr::Undefined
        | TypeExpr::Literal(_)
        | TypeExpr::Unresolved { .. } => ty.clone(),
    }
}

/// Substitute into a signature. Its own type parameters shadow `env`.
pub(crate) fn substitute_shape(shape: &FunctionShape, env: &InstantiationEnv) -> FunctionShape {
    let inner;
    let env = if shape.type_params.is_empty() {
        env
    } else {
        inner = env.without(shape.type_params.iter().map(|p| p.name.as_str()));
        &inner
    };
    FunctionShape {
        type_params: shape
            .type_params
            .iter()
            .map(|param| TypeParamInfo {
                name: param.name.clone(),
                constraint: param.constraint.as_ref().map(|c| Box::new(substitute(c, env))),
            })
            .collect(),
        params: shape
            .params
            .iter()
            .map(|param| ParamInfo {
                ty: substitute(&param.ty, env),
                ..param.clone()
            })
            .collect(),
        return_type: substitute(&shape.return_type, env),
    }
}

#[cfg(test)]
#[path = "../tests/subst_tests.rs"]
mod tests;
