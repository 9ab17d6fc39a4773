//! Diagnostic types and message lookup.
//!
//! Message templates live in `data.rs`, keyed by stable numeric codes.
//! Codes are rendered as `TSN<code>` so they never collide with host-checker codes.

use serde::Serialize;
use std::fmt;

mod data;
pub use data::{DIAGNOSTIC_MESSAGES, diagnostic_codes};

// =============================================================================
// Diagnostic Types
// =============================================================================

/// Diagnostic category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum DiagnosticCategory {
    Warning = 0,
    Error = 1,
    Suggestion = 2,
    Message = 3,
}

impl fmt::Display for DiagnosticCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Suggestion => "suggestion",
            Self::Message => "message",
        };
        f.write_str(text)
    }
}

/// Related information for a diagnostic (e.g., the other document of a duplicate).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DiagnosticRelatedInformation {
    pub file: String,
    pub start: u32,
    pub length: u32,
    pub message_text: String,
    pub category: DiagnosticCategory,
    pub code: u32,
}

/// A diagnostic with a stable code, location, and optional remediation hint.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub file: String,
    pub start: u32,
    pub length: u32,
    pub message_text: String,
    pub category: DiagnosticCategory,
    pub code: u32,
    /// Suggested fix, e.g. "Add an explicit type annotation."
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Related information spans (e.g., where a conflicting type was declared)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub related_information: Vec<DiagnosticRelatedInformation>,
}

impl Diagnostic {
    /// Create a new error diagnostic.
    #[must_use]
    pub const fn error(file: String, start: u32, length: u32, message: String, code: u32) -> Self {
        Self {
            file,
            start,
            length,
            message_text: message,
            category: DiagnosticCategory::Error,
            code,
            hint: None,
            related_information: Vec::new(),
        }
    }

    /// Create a new warning diagnostic.
    #[must_use]
    pub const fn warning(file: String, start: u32, length: u32, message: String, code: u32) -> Self {
        Self {
            file,
            start,
            length,
            message_text: message,
            category: DiagnosticCategory::Warning,
            code,
            hint: None,
            related_information: Vec::new(),
        }
    }

    /// Build a diagnostic from the message table, filling `{0}`, `{1}`, ... with `args`.
    ///
    /// The category comes from the table; unknown codes produce an error with the
    /// arguments joined as the message.
    #[must_use]
    pub fn from_code(code: u32, args: &[&str]) -> Self {
        let def = get_diagnostic_message(code);
        let (category, message) = match def {
            Some(def) => (def.category, format_message(def.message, args)),
            None => (DiagnosticCategory::Error, args.join(" ")),
        };
        Self {
            file: String::new(),
            start: 0,
            length: 0,
            message_text: message,
            category,
            code,
            hint: def.and_then(|def| def.hint).map(str::to_string),
            related_information: Vec::new(),
        }
    }

    /// Attach a source location.
    #[must_use]
    pub fn at(mut self, file: impl Into<String>, start: u32, length: u32) -> Self {
        self.file = file.into();
        self.start = start;
        self.length = length;
        self
    }

    /// Replace the remediation hint.
    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    /// Add related information to this diagnostic.
    #[must_use]
    pub fn with_related(mut self, file: String, start: u32, length: u32, message: String) -> Self {
        self.related_information.push(DiagnosticRelatedInformation {
            file,
            start,
            length,
            message_text: message,
            category: DiagnosticCategory::Message,
            code: 0,
        });
        self
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        self.category == DiagnosticCategory::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.file.is_empty() {
            write!(f, "{}({}): ", self.file, self.start)?;
        }
        write!(f, "{} TSN{}: {}", self.category, self.code, self.message_text)?;
        if let Some(hint) = &self.hint {
            write!(f, " ({hint})")?;
        }
        Ok(())
    }
}

/// Format a diagnostic message by replacing {0}, {1}, etc. with arguments.
#[must_use]
pub fn format_message(template: &str, args: &[&str]) -> String {
    let mut result = template.to_string();
    for (i, arg) in args.iter().enumerate() {
        result = result.replace(&format!("{{{i}}}"), arg);
    }
    result
}

/// A diagnostic message definition with code, category, and message template.
#[derive(Clone, Copy, Debug)]
pub struct DiagnosticMessage {
    pub code: u32,
    pub category: DiagnosticCategory,
    pub message: &'static str,
    pub hint: Option<&'static str>,
}

/// Look up a diagnostic message definition by code.
#[must_use]
pub fn get_diagnostic_message(code: u32) -> Option<&'static DiagnosticMessage> {
    DIAGNOSTIC_MESSAGES.iter().find(|m| m.code == code)
}

/// Get the message template for a diagnostic code.
///
/// Returns the template string with `{0}`, `{1}`, etc. placeholders.
/// Use `format_message()` to fill in the placeholders.
#[must_use]
pub fn get_message_template(code: u32) -> Option<&'static str> {
    get_diagnostic_message(code).map(|m| m.message)
}

#[cfg(test)]
#[path = "../../tests/diagnostics_tests.rs"]
mod tests;
