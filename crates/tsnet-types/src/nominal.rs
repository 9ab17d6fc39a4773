//! Nominal environment: inheritance chains and instantiation composition.
//!
//! Both queries are pure functions of the unified catalog, so results are
//! memoized in `DashMap`s and shared across threads. A cache slot is written
//! once with `entry().or_insert`; concurrent writers compute the same value.

use crate::catalog::UnifiedCatalog;
use crate::error::{QueryError, QueryResult};
use crate::subst::{InstantiationEnv, substitute};
use crate::types::{HeritageEdge, HeritageKind, NominalEntry, TypeExpr, TypeId};
use dashmap::DashMap;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::trace;
use tsnet_common::diagnostic_codes;
use tsnet_common::limits::MAX_INHERITANCE_DEPTH;

/// `(receiver, receiver args, target, follow implements edges)`.
type InstantiationKey = (TypeId, Vec<TypeExpr>, TypeId, bool);

#[derive(Debug, Default)]
pub(crate) struct NominalEnvironment {
    chains: DashMap<TypeId, Arc<[TypeId]>>,
    instantiations: DashMap<InstantiationKey, Option<Arc<InstantiationEnv>>>,
}

impl NominalEnvironment {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn entry<'c>(catalog: &'c UnifiedCatalog, id: &TypeId) -> QueryResult<&'c Arc<NominalEntry>> {
        catalog
            .entry(id)
            .ok_or_else(|| QueryError::from_code(diagnostic_codes::UNKNOWN_STABLE_ID, &[id.stable_id()]))
    }

    /// `id` followed by every type it reaches through `extends` edges, in
    /// depth-first order with duplicates removed.
    pub(crate) fn get_inheritance_chain(
        &self,
        catalog: &UnifiedCatalog,
        id: &TypeId,
    ) -> QueryResult<Arc<[TypeId]>> {
        if let Some(cached) = self.chains.get(id) {
            return Ok(Arc::clone(cached.value()));
        }
        Self::entry(catalog, id)?;

        let mut chain = Vec::new();
        let mut visited = FxHashSet::default();
        let mut stack = vec![id.clone()];
        while let Some(current) = stack.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            if chain.len() >= MAX_INHERITANCE_DEPTH {
                return Err(QueryError::internal(
                    diagnostic_codes::INTERNAL_CHAIN_TOO_DEEP,
                    &[id.stable_id(), MAX_INHERITANCE_DEPTH.to_string().as_str()],
                ));
            }
            let Some(entry) = catalog.entry(&current) else {
                trace!(base = %current.stable_id(), "base type missing from catalog");
                continue;
            };
            chain.push(current);
            // Reverse so the first listed base is visited first.
            for edge in entry.extends().collect::<Vec<_>>().into_iter().rev() {
                if !visited.contains(&edge.target) {
                    stack.push(edge.target.clone());
                }
            }
        }

        let chain: Arc<[TypeId]> = chain.into();
        Ok(Arc::clone(self.chains.entry(id.clone()).or_insert(chain).value()))
    }

    /// Bindings of `target`'s type parameters when viewed from
    /// `receiver<args>` through `extends` edges. `None` when `target` is not
    /// an ancestor.
    pub(crate) fn get_instantiation(
        &self,
        catalog: &UnifiedCatalog,
        receiver: &TypeId,
        args: &[TypeExpr],
        target: &TypeId,
    ) -> QueryResult<Option<Arc<InstantiationEnv>>> {
        self.instantiation(catalog, receiver, args, target, false)
    }

    /// Like `get_instantiation`, also following `implements` edges.
    pub(crate) fn heritage_instantiation(
        &self,
        catalog: &UnifiedCatalog,
        receiver: &TypeId,
        args: &[TypeExpr],
        target: &TypeId,
    ) -> QueryResult<Option<Arc<InstantiationEnv>>> {
        self.instantiation(catalog, receiver, args, target, true)
    }

    fn instantiation(
        &self,
        catalog: &UnifiedCatalog,
        receiver: &TypeId,
        args: &[TypeExpr],
        target: &TypeId,
        implements: bool,
    ) -> QueryResult<Option<Arc<InstantiationEnv>>> {
        let key = (receiver.clone(), args.to_vec(), target.clone(), implements);
        if let Some(cached) = self.instantiations.get(&key) {
            return Ok(cached.value().clone());
        }

        let receiver_entry = Self::entry(catalog, receiver)?;
        let mut env = InstantiationEnv::from_zip(&receiver_entry.type_parameters, args);
        let result = match Self::heritage_path(catalog, receiver, target, implements) {
            Some(path) => {
                for edge in &path {
                    let parent_args: Vec<TypeExpr> = edge
                        .type_arguments
                        .iter()
                        .map(|arg| substitute(arg, &env))
                        .collect();
                    let parent = Self::entry(catalog, &edge.target)?;
                    env = InstantiationEnv::from_zip(&parent.type_parameters, &parent_args);
                }
                Some(Arc::new(env))
            }
            None => None,
        };

        Ok(self.instantiations.entry(key).or_insert(result).value().clone())
    }

    /// Shortest edge path from `from` to `to`, breadth first.
    fn heritage_path(
        catalog: &UnifiedCatalog,
        from: &TypeId,
        to: &TypeId,
        implements: bool,
    ) -> Option<Vec<HeritageEdge>> {
        if from == to {
            return Some(Vec::new());
        }
        let mut came_from: FxHashMap<TypeId, (TypeId, &HeritageEdge)> = FxHashMap::default();
        let mut queue = VecDeque::from([from.clone()]);
        let mut visited = FxHashSet::from_iter([from.clone()]);
        while let Some(current) = queue.pop_front() {
            let Some(entry) = catalog.entry(&current) else {
                continue;
            };
            for edge in &entry.heritage {
                if edge.kind == HeritageKind::Implements && !implements {
                    continue;
                }
                if !visited.insert(edge.target.clone()) {
                    continue;
                }
                came_from.insert(edge.target.clone(), (current.clone(), edge));
                if edge.target == *to {
                    let mut path = Vec::new();
                    let mut cursor = to.clone();
                    while let Some((previous, edge)) = came_from.get(&cursor) {
                        path.push((*edge).clone());
                        cursor = previous.clone();
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(edge.target.clone());
            }
        }
        None
    }

    /// First type on `receiver`'s chain that declares `member`, with the
    /// bindings of that type's parameters.
    pub(crate) fn find_member_declaring_type(
        &self,
        catalog: &UnifiedCatalog,
        receiver: &TypeId,
        args: &[TypeExpr],
        member: &str,
    ) -> QueryResult<Option<(Arc<NominalEntry>, Arc<InstantiationEnv>)>> {
        let chain = self.get_inheritance_chain(catalog, receiver)?;
        for id in chain.iter() {
            let owner = Self::entry(catalog, id)?;
            if owner.member(member).is_none() {
                continue;
            }
            let env = self
                .get_instantiation(catalog, receiver, args, id)?
                .unwrap_or_default();
            return Ok(Some((Arc::clone(owner), env)));
        }
        Ok(None)
    }
}

#[cfg(test)]
#[path = "../tests/nominal_tests.rs"]
mod tests;
