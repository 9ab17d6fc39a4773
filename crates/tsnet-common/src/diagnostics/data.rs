use super::{DiagnosticCategory, DiagnosticMessage};

pub mod diagnostic_codes {
    // Parser
    pub const UNEXPECTED_TOKEN: u32 = 1001;
    pub const UNTERMINATED_STRING_LITERAL: u32 = 1002;
    pub const UNTERMINATED_COMMENT: u32 = 1003;
    pub const INVALID_CHARACTER: u32 = 1004;
    pub const TYPE_EXPECTED: u32 = 1005;
    pub const EXPRESSION_EXPECTED: u32 = 1006;
    pub const IDENTIFIER_EXPECTED: u32 = 1007;

    // Metadata catalog loading
    pub const METADATA_READ_FAILED: u32 = 3001;
    pub const METADATA_MALFORMED: u32 = 3002;
    pub const METADATA_MISSING_FIELD: u32 = 3003;
    pub const DUPLICATE_TYPE_DEFINITION: u32 = 3004;
    pub const METADATA_INVALID_TYPE_REFERENCE: u32 = 3005;
    pub const CATALOG_ROOT_NOT_FOUND: u32 = 3006;

    // Resolution
    pub const UNRESOLVED_IDENTIFIER: u32 = 5001;
    pub const UNRESOLVED_CALL_SIGNATURE: u32 = 5002;
    pub const UNRESOLVED_CONSTRUCTOR: u32 = 5003;
    pub const MISSING_TYPE_ANNOTATION: u32 = 5004;
    pub const UNRESOLVED_TYPE_NAME: u32 = 5005;
    pub const UNSUPPORTED_UTILITY_TYPE: u32 = 5006;
    pub const MEMBER_NOT_FOUND: u32 = 5007;
    pub const TYPE_ARGUMENT_COUNT_MISMATCH: u32 = 5008;
    pub const CYCLIC_TYPE_ALIAS: u32 = 5009;
    pub const NOT_A_NOMINAL_TYPE: u32 = 5010;
    pub const UNSUPPORTED_TYPE_SYNTAX: u32 = 5011;
    pub const UNKNOWN_STABLE_ID: u32 = 5012;
    pub const NOT_GENERIC: u32 = 5013;

    // Internal invariants
    pub const INTERNAL_HANDLE_NOT_MINTED: u32 = 9001;
    pub const INTERNAL_CHAIN_TOO_DEEP: u32 = 9002;
}

use diagnostic_codes::*;

const fn error(code: u32, message: &'static str) -> DiagnosticMessage {
    DiagnosticMessage {
        code,
        category: DiagnosticCategory::Error,
        message,
        hint: None,
    }
}

const fn error_with_hint(code: u32, message: &'static str, hint: &'static str) -> DiagnosticMessage {
    DiagnosticMessage {
        code,
        category: DiagnosticCategory::Error,
        message,
        hint: Some(hint),
    }
}

const fn warning(code: u32, message: &'static str) -> DiagnosticMessage {
    DiagnosticMessage {
        code,
        category: DiagnosticCategory::Warning,
        message,
        hint: None,
    }
}

pub static DIAGNOSTIC_MESSAGES: &[DiagnosticMessage] = &[
    error(UNEXPECTED_TOKEN, "'{0}' expected but found '{1}'."),
    error(UNTERMINATED_STRING_LITERAL, "Unterminated string literal."),
    error(UNTERMINATED_COMMENT, "'*/' expected."),
    error(INVALID_CHARACTER, "Invalid character '{0}'."),
    error(TYPE_EXPECTED, "Type expected but found '{0}'."),
    error(EXPRESSION_EXPECTED, "Expression expected but found '{0}'."),
    error(IDENTIFIER_EXPECTED, "Identifier expected but found '{0}'."),
    error(METADATA_READ_FAILED, "Cannot read metadata document '{0}': {1}."),
    error(METADATA_MALFORMED, "Malformed metadata document '{0}': {1}."),
    error(
        METADATA_MISSING_FIELD,
        "Metadata record in '{0}' is missing required field '{1}'.",
    ),
    warning(
        DUPLICATE_TYPE_DEFINITION,
        "Type '{0}' is fully defined in both '{1}' and '{2}'; the first definition is kept.",
    ),
    error(
        METADATA_INVALID_TYPE_REFERENCE,
        "Invalid type reference '{0}' in metadata document '{1}'.",
    ),
    error(CATALOG_ROOT_NOT_FOUND, "Metadata catalog root '{0}' does not exist."),
    error(UNRESOLVED_IDENTIFIER, "Cannot resolve identifier '{0}' to a declaration."),
    error(
        UNRESOLVED_CALL_SIGNATURE,
        "No signature of '{0}' accepts {1} argument(s).",
    ),
    error(
        UNRESOLVED_CONSTRUCTOR,
        "No constructor of '{0}' accepts {1} argument(s).",
    ),
    error_with_hint(
        MISSING_TYPE_ANNOTATION,
        "Declaration '{0}' has no explicit type annotation.",
        "Add an explicit type annotation.",
    ),
    error_with_hint(
        UNRESOLVED_TYPE_NAME,
        "Cannot resolve type name '{0}'.",
        "Declare the type or add the metadata catalog that defines it.",
    ),
    error(UNSUPPORTED_UTILITY_TYPE, "Utility type '{0}' is not implemented."),
    error(MEMBER_NOT_FOUND, "Type '{0}' has no member '{1}'."),
    error(
        TYPE_ARGUMENT_COUNT_MISMATCH,
        "Type '{0}' expects {1} type argument(s) but received {2}.",
    ),
    error(CYCLIC_TYPE_ALIAS, "Type alias '{0}' circularly references itself."),
    error(NOT_A_NOMINAL_TYPE, "Type '{0}' is not a nominal type."),
    error(UNSUPPORTED_TYPE_SYNTAX, "Type syntax '{0}' is not supported."),
    error(UNKNOWN_STABLE_ID, "No nominal type has stable identifier '{0}'."),
    error(NOT_GENERIC, "Type '{0}' does not accept type arguments."),
    error(
        INTERNAL_HANDLE_NOT_MINTED,
        "Internal error: handle {0} was never minted in this compilation.",
    ),
    error(
        INTERNAL_CHAIN_TOO_DEEP,
        "Internal error: inheritance chain of '{0}' exceeds {1} levels.",
    ),
];
