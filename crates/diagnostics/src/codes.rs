//! Diagnostic code constants.
//!
//! The code set is closed: every code the pipeline can emit is listed here
//! with a fixed severity and an `explain()` entry. Use these constants
//! instead of string literals to get compile-time typo detection.

/// Export annotation text does not match the key/value grammar.
pub const ANNOTATION_SYNTAX: &str = "ANNOTATION_SYNTAX";
/// Export annotation not followed by a parseable C declaration.
pub const DANGLING_ANNOTATION: &str = "DANGLING_ANNOTATION";
/// Two export annotations attached to the same declaration.
pub const DOUBLE_ANNOTATION: &str = "DOUBLE_ANNOTATION";
/// Annotation carries a key the grammar does not define.
pub const UNKNOWN_KEY: &str = "UNKNOWN_KEY";
/// Annotation is missing one of the required keys.
pub const MISSING_KEY: &str = "MISSING_KEY";
/// C declaration uses a type outside the supported subset.
pub const UNSUPPORTED_C_TYPE: &str = "UNSUPPORTED_C_TYPE";
/// Annotation argument count differs from the C parameter count.
pub const ARITY_MISMATCH: &str = "ARITY_MISMATCH";
/// Annotation argument kind is incompatible with the C parameter type.
pub const TYPE_MISMATCH: &str = "TYPE_MISMATCH";
/// `function=` does not name the attached C function.
pub const FUNCTION_NAME_MISMATCH: &str = "FUNCTION_NAME_MISMATCH";
/// Command token already declared elsewhere in the profile.
pub const DUPLICATE_TOKEN: &str = "DUPLICATE_TOKEN";
/// Safety policy is malformed or out of range.
pub const INVALID_SAFETY: &str = "INVALID_SAFETY";
/// Numeric range has `lo > hi` or a non-finite bound.
pub const RANGE_INVERTED: &str = "RANGE_INVERTED";
/// User-declared STOP command is shadowed by the built-in STOP branch.
pub const SHADOWED_STOP: &str = "SHADOWED_STOP";
/// Annotation argument name differs from the C parameter name.
pub const ARG_NAME_MISMATCH: &str = "ARG_NAME_MISMATCH";

/// All error-severity codes, in the order they are documented.
pub const ERRORS: &[&str] = &[
    ANNOTATION_SYNTAX,
    DANGLING_ANNOTATION,
    DOUBLE_ANNOTATION,
    UNKNOWN_KEY,
    MISSING_KEY,
    UNSUPPORTED_C_TYPE,
    ARITY_MISMATCH,
    TYPE_MISMATCH,
    FUNCTION_NAME_MISMATCH,
    DUPLICATE_TOKEN,
    INVALID_SAFETY,
    RANGE_INVERTED,
];

/// All warning-severity codes.
pub const WARNINGS: &[&str] = &[SHADOWED_STOP, ARG_NAME_MISMATCH];
