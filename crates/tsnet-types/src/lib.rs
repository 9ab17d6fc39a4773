//! Deterministic type resolution for the tsnet compiler.
//!
//! A [`TypeSystem`] is built once per compilation from a parsed [`Program`],
//! a [`MetadataCatalog`] of runtime-library types and a [`TypeSystemConfig`].
//! Source declarations and library types share one nominal catalog keyed by
//! stable ids, so inheritance and member lookup work across the boundary.
//!
//! Every query returns `Ok(type)` or `Err(QueryError)`. Nothing is inferred
//! from initializers or bodies: a missing annotation is an error, never `any`.
//!
//! [`Program`]: tsnet_parser::Program
//! [`MetadataCatalog`]: tsnet_metadata::MetadataCatalog

mod binding;
mod catalog;
pub mod config;
pub mod error;
pub mod gate;
pub mod handles;
mod lower;
mod nominal;
mod registry;
mod subst;
pub mod tracing_config;
pub mod type_system;
pub mod types;
mod utility;

pub use config::TypeSystemConfig;
pub use error::{QueryError, QueryResult};
pub use gate::CompilationGate;
pub use handles::{DeclId, MemberId, SignatureId};
pub use subst::InstantiationEnv;
pub use type_system::{CallQuery, ResolvedCall, TypeSystem};
pub use types::{
    FunctionShape, HeritageEdge, HeritageKind, LiteralValue, MemberEntry, MemberKind, NominalEntry, NominalKind,
    Origin, ParamInfo, PrimitiveKind, PropertyInfo, TupleElement, TypeExpr, TypeId, TypeParamInfo, UnresolvedReason,
};
