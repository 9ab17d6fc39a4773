//! Per-unit diagnostic gate in front of code generation.

use crate::error::QueryError;
use tracing::debug;
use tsnet_common::Diagnostic;

/// Collects the diagnostics of one compilation unit.
///
/// Any error-category diagnostic blocks the unit: `finish` then returns every
/// diagnostic as `Err` so no partial output is produced.
#[derive(Debug)]
pub struct CompilationGate {
    unit: String,
    diagnostics: Vec<Diagnostic>,
}

impl CompilationGate {
    #[must_use]
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            diagnostics: Vec::new(),
        }
    }

    pub fn record(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn record_all(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    /// Pass a query result through the gate, recording its failure.
    pub fn check<T>(&mut self, result: Result<T, QueryError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(error) => {
                self.record_all(error.diagnostics().iter().cloned());
                None
            }
        }
    }

    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(Diagnostic::is_error)
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// `Ok(warnings)` when the unit may be emitted, `Err(all diagnostics)` otherwise.
    pub fn finish(self) -> Result<Vec<Diagnostic>, Vec<Diagnostic>> {
        let blocked = self.has_errors();
        debug!(unit = %self.unit, diagnostics = self.diagnostics.len(), blocked, "compilation gate");
        if blocked {
            Err(self.diagnostics)
        } else {
            Ok(self.diagnostics)
        }
    }
}

#[cfg(test)]
#[path = "../tests/gate_tests.rs"]
mod tests;
