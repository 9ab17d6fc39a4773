//! Centralized limits and thresholds.
//!
//! Every recursive or chain-walking algorithm in the workspace bounds itself with
//! one of these constants instead of a local magic number.

/// Maximum length of an `extends` chain.
///
/// Chains are already cycle-guarded; exceeding this depth means the catalog
/// itself is corrupt and is reported as an internal error.
pub const MAX_INHERITANCE_DEPTH: usize = 256;

/// Maximum nesting of type-alias expansion during lowering.
///
/// ```typescript
/// type A = B;
/// type B = A; // cyclic: lowering stops and yields an unresolved marker
/// ```
pub const MAX_ALIAS_EXPANSION_DEPTH: u32 = 50;

/// Maximum number of parameter-mode wrappers peeled from one annotation.
///
/// `ref<out<thisarg<T>>>` peels three wrappers; anything deeper is malformed.
pub const MAX_WRAPPER_PEEL_DEPTH: u32 = 32;

/// Maximum nesting of type syntax the parser accepts before bailing out.
pub const MAX_TYPE_NESTING_DEPTH: u32 = 200;
