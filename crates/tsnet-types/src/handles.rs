//! Opaque handles for declarations, signatures and members.
//!
//! Handles are minted on first request and are stable for the lifetime of the
//! `TypeSystem`: asking for the same declaration twice returns the same id.
//! Each handle's info record is written inside the minting closure, so a
//! handle is never observable before its info exists.

use crate::error::{QueryError, QueryResult};
use crate::types::TypeId;
use dashmap::DashMap;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::trace;
use tsnet_parser::NodeRef;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub struct $name(u32);

        impl $name {
            #[must_use]
            pub const fn index(self) -> u32 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

handle!(
    /// A value declaration: variable, parameter, function, class, enum member.
    DeclId,
    "decl"
);
handle!(
    /// One call or construct signature.
    SignatureId,
    "sig"
);
handle!(
    /// A member of a nominal type.
    MemberId,
    "member"
);

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct DeclInfo {
    pub node: NodeRef,
    pub name: String,
}

/// What a signature handle stands for.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub(crate) enum SignatureKey {
    /// A function, method or function-type node in source.
    Node(NodeRef),
    /// A source constructor used to build the type with stable id `constructed`,
    /// which is the declaring class or one that inherits the constructor.
    SourceConstructor { node: NodeRef, constructed: String },
    /// The parameterless constructor of a source class that declares none.
    ImplicitConstructor(String),
    /// Overload `index` of a library method.
    Method { owner: String, member: String, index: usize },
    /// Overload `index` of a library constructor, used to build `constructed`.
    Constructor {
        owner: String,
        index: usize,
        constructed: String,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SignatureInfo {
    pub key: SignatureKey,
    /// Declaring nominal type, for members and constructors.
    pub owner: Option<TypeId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct MemberInfo {
    pub owner: TypeId,
    pub name: String,
}

#[derive(Debug, Default)]
pub(crate) struct HandleRegistry {
    next_decl: AtomicU32,
    next_signature: AtomicU32,
    next_member: AtomicU32,
    decl_ids: DashMap<NodeRef, DeclId>,
    decls: DashMap<DeclId, DeclInfo>,
    signature_ids: DashMap<SignatureKey, SignatureId>,
    signatures: DashMap<SignatureId, SignatureInfo>,
    member_ids: DashMap<(String, String), MemberId>,
    members: DashMap<MemberId, MemberInfo>,
}

impl HandleRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn mint_decl(&self, node: NodeRef, name: &str) -> DeclId {
        *self.decl_ids.entry(node).or_insert_with(|| {
            let id = DeclId(self.next_decl.fetch_add(1, Ordering::SeqCst));
            trace!(%id, name, "minted declaration handle");
            self.decls.insert(
                id,
                DeclInfo {
                    node,
                    name: name.to_string(),
                },
            );
            id
        })
    }

    pub(crate) fn mint_signature(&self, key: SignatureKey, owner: Option<TypeId>) -> SignatureId {
        *self.signature_ids.entry(key.clone()).or_insert_with(|| {
            let id = SignatureId(self.next_signature.fetch_add(1, Ordering::SeqCst));
            trace!(%id, ?key, "minted signature handle");
            self.signatures.insert(id, SignatureInfo { key, owner });
            id
        })
    }

    pub(crate) fn mint_member(&self, owner: &TypeId, name: &str) -> MemberId {
        let key = (owner.stable_id().to_string(), name.to_string());
        *self.member_ids.entry(key).or_insert_with(|| {
            let id = MemberId(self.next_member.fetch_add(1, Ordering::SeqCst));
            trace!(%id, owner = %owner.stable_id(), name, "minted member handle");
            self.members.insert(
                id,
                MemberInfo {
                    owner: owner.clone(),
                    name: name.to_string(),
                },
            );
            id
        })
    }

    pub(crate) fn decl(&self, id: DeclId) -> QueryResult<DeclInfo> {
        self.decls
            .get(&id)
            .map(|info| info.value().clone())
            .ok_or_else(|| QueryError::handle_not_minted(id))
    }

    pub(crate) fn signature(&self, id: SignatureId) -> QueryResult<SignatureInfo> {
        self.signatures
            .get(&id)
            .map(|info| info.value().clone())
            .ok_or_else(|| QueryError::handle_not_minted(id))
    }

    pub(crate) fn member(&self, id: MemberId) -> QueryResult<MemberInfo> {
        self.members
            .get(&id)
            .map(|info| info.value().clone())
            .ok_or_else(|| QueryError::handle_not_minted(id))
    }
}

#[cfg(test)]
#[path = "../tests/handles_tests.rs"]
mod tests;
