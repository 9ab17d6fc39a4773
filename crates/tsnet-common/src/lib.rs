//! Common types and utilities for the tsnet compiler.
//!
//! This crate provides foundational types used across all tsnet crates:
//! - Diagnostics (`Diagnostic`, `DiagnosticCategory`, stable codes and message templates)
//! - Centralized limits for cycle and depth guards
//! - Source spans (`Span`)

pub mod diagnostics;
pub use diagnostics::{
    Diagnostic, DiagnosticCategory, DiagnosticRelatedInformation, diagnostic_codes, format_message,
    get_message_template,
};

// Centralized limits and thresholds
pub mod limits;

pub mod span;
pub use span::Span;
