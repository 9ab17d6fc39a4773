use thiserror::Error;
use tsnet_common::{Diagnostic, diagnostic_codes};

/// Failure of a type query.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum QueryError {
    /// Resolution failed; the diagnostics name the offending construct.
    #[error("{}", render(.0))]
    Diagnostics(Vec<Diagnostic>),

    /// An internal invariant was violated.
    #[error("{0}")]
    Internal(Diagnostic),
}

fn render(diagnostics: &[Diagnostic]) -> String {
    diagnostics
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl QueryError {
    /// Single diagnostic from the message table.
    #[must_use]
    pub fn from_code(code: u32, args: &[&str]) -> Self {
        QueryError::Diagnostics(vec![Diagnostic::from_code(code, args)])
    }

    #[must_use]
    pub fn internal(code: u32, args: &[&str]) -> Self {
        QueryError::Internal(Diagnostic::from_code(code, args))
    }

    #[must_use]
    pub fn handle_not_minted(handle: impl std::fmt::Debug) -> Self {
        Self::internal(
            diagnostic_codes::INTERNAL_HANDLE_NOT_MINTED,
            &[&format!("{handle:?}")],
        )
    }

    /// Attach a location to every diagnostic that has none.
    #[must_use]
    pub fn at(self, file: &str, start: u32, length: u32) -> Self {
        let locate = |diagnostic: Diagnostic| {
            if diagnostic.file.is_empty() {
                diagnostic.at(file, start, length)
            } else {
                diagnostic
            }
        };
        match self {
            QueryError::Diagnostics(diagnostics) => {
                QueryError::Diagnostics(diagnostics.into_iter().map(locate).collect())
            }
            QueryError::Internal(diagnostic) => QueryError::Internal(locate(diagnostic)),
        }
    }

    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            QueryError::Diagnostics(diagnostics) => diagnostics,
            QueryError::Internal(diagnostic) => std::slice::from_ref(diagnostic),
        }
    }

    /// Primary diagnostic code.
    #[must_use]
    pub fn code(&self) -> Option<u32> {
        self.diagnostics().first().map(|d| d.code)
    }

    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, QueryError::Internal(_))
    }
}

pub type QueryResult<T> = Result<T, QueryError>;
