//! Diagnostics for the daemon toolchain.
//!
//! Provides [`Diagnostic`], [`Severity`], [`Span`], and [`LineIndex`] types
//! used to report errors and warnings from the scanner, annotation parser,
//! signature resolver, and catalog builder. Diagnostic codes are defined in
//! the [`codes`] module.

#![warn(missing_docs)]

/// Diagnostic code constants and their fixed severities.
pub mod codes;

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeMap;

// ── LineIndex ────────────────────────────────────────────────────────────

/// Maps byte offsets in a source string to line and column positions.
///
/// Lines and columns are **0-indexed** internally. Use [`LineIndex::line_col`]
/// to get a `(line, col)` pair and add 1 when displaying to users.
///
/// The index is built in O(n) time and each lookup is O(log n) via binary
/// search. This struct is intentionally dependency-free so it can be reused
/// by any consumer that needs human-facing positions.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offset of the start of each line.
    /// `line_starts[0]` is always 0.
    line_starts: Vec<usize>,
}

impl LineIndex {
    /// Build a `LineIndex` from source text.
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![0usize];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        Self { line_starts }
    }

    /// Convert a byte offset to a 0-indexed `(line, column)` pair.
    ///
    /// If `offset` is past the end of the source, the last line is returned
    /// with the column clamped to the line length.
    pub fn line_col(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next.saturating_sub(1),
        };
        let col = offset.saturating_sub(self.line_starts[line]);
        (line, col)
    }

    /// Byte offset of the start of the given 0-indexed line.
    ///
    /// Returns `None` if `line` is out of bounds.
    pub fn line_start(&self, line: usize) -> Option<usize> {
        self.line_starts.get(line).copied()
    }

    /// Total number of lines (at least 1, even for empty input).
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

/// Severity level for a diagnostic message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum Severity {
    /// Hard error — the input is invalid and no files will be emitted.
    Error,
    /// Warning — emission proceeds but the input may not mean what it says.
    Warn,
}

/// Byte span in a source input.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Span {
    /// Byte offset of the first character (0-based).
    pub start: usize,
    /// Byte offset one past the last character.
    pub end: usize,
}

impl Span {
    /// Create a span covering `[start, end)`.
    ///
    /// Panics if `end < start`.
    pub fn new(start: usize, end: usize) -> Self {
        assert!(end >= start, "Span end ({end}) < start ({start})");
        Self { start, end }
    }

    /// Create a zero-width span at the given position.
    pub fn empty(pos: usize) -> Self {
        Self {
            start: pos,
            end: pos,
        }
    }
}

/// A diagnostic message produced by the pipeline.
///
/// Unlike a single-input linter, the pipeline processes several translation
/// units per profile, so each diagnostic carries the path of the unit it
/// refers to alongside the byte span within that unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Stable diagnostic code (e.g. `"DUPLICATE_TOKEN"`).
    pub id: Cow<'static, str>,
    /// Severity level.
    pub severity: Severity,
    /// Human-readable diagnostic message.
    pub message: String,
    /// Path of the source unit this diagnostic refers to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Byte span within the source unit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    /// Machine-readable context for tooling. Keys and values are free-form
    /// strings.
    ///
    /// Uses `BTreeMap` for deterministic key ordering in serialized output.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<BTreeMap<String, String>>,
}

impl Diagnostic {
    /// Create a diagnostic with the given fields.
    pub fn new(
        id: impl Into<Cow<'static, str>>,
        severity: Severity,
        message: impl Into<String>,
        span: Option<Span>,
    ) -> Self {
        Self {
            id: id.into(),
            severity,
            message: message.into(),
            path: None,
            span,
            context: None,
        }
    }

    /// Shorthand for an `Error` diagnostic.
    pub fn error(
        id: impl Into<Cow<'static, str>>,
        message: impl Into<String>,
        span: Option<Span>,
    ) -> Self {
        Self::new(id, Severity::Error, message, span)
    }

    /// Shorthand for a `Warn` diagnostic.
    pub fn warn(
        id: impl Into<Cow<'static, str>>,
        message: impl Into<String>,
        span: Option<Span>,
    ) -> Self {
        Self::new(id, Severity::Warn, message, span)
    }

    /// Attach the source unit path (builder pattern).
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Attach machine-readable context metadata (builder pattern).
    ///
    /// Context is a set of key-value string pairs providing structured details
    /// about the diagnostic for tooling, filtering, and programmatic
    /// consumption. Keys are short descriptors like `"token"`, `"key"`,
    /// `"expected"`, `"actual"`.
    pub fn with_context(mut self, ctx: BTreeMap<String, String>) -> Self {
        self.context = Some(ctx);
        self
    }

    /// Returns the human-readable explanation for this diagnostic's code,
    /// if available.
    pub fn explain(&self) -> Option<&'static str> {
        explain(&self.id)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Error => write!(f, "error"),
            Severity::Warn => write!(f, "warn"),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}[{}]: {}", self.severity, self.id, self.message)
    }
}

/// Returns the fixed severity for a diagnostic code, if the code is known.
pub fn severity_of(id: &str) -> Option<Severity> {
    if codes::ERRORS.contains(&id) {
        Some(Severity::Error)
    } else if codes::WARNINGS.contains(&id) {
        Some(Severity::Warn)
    } else {
        None
    }
}

/// Returns the human-readable explanation for a diagnostic code, if known.
pub fn explain(id: &str) -> Option<&'static str> {
    match id {
        codes::ANNOTATION_SYNTAX => Some(
            "the @daemon:export annotation does not match the key=value grammar; \
             quote values containing spaces or commas",
        ),
        codes::DANGLING_ANNOTATION => Some(
            "an export annotation must be immediately followed by a C function \
             declaration (whitespace, comments, and preprocessor lines are skipped)",
        ),
        codes::DOUBLE_ANNOTATION => {
            Some("a declaration can carry at most one @daemon:export annotation")
        }
        codes::UNKNOWN_KEY => Some(
            "recognized annotation keys are token, desc, args, safety, and function; \
             new keys must be introduced in the toolchain before use",
        ),
        codes::MISSING_KEY => {
            Some("token, desc, args, and safety are required on every export annotation")
        }
        codes::UNSUPPORTED_C_TYPE => Some(
            "exported functions are limited to int/void returns and parameters of \
             type int, int16_t, float, or const char * (at most 8)",
        ),
        codes::ARITY_MISMATCH => {
            Some("the args= schema must declare exactly one entry per C parameter")
        }
        codes::TYPE_MISMATCH => Some(
            "argument kinds map to C types as int -> int/int16_t, float -> float, \
             string -> const char *",
        ),
        codes::FUNCTION_NAME_MISMATCH => {
            Some("when present, function= must equal the name of the attached declaration")
        }
        codes::DUPLICATE_TOKEN => Some("command tokens must be unique within a profile"),
        codes::INVALID_SAFETY => Some(
            "safety= must supply rate_hz (positive integer), watchdog_ms (positive \
             integer), and clamp (true or false)",
        ),
        codes::RANGE_INVERTED => {
            Some("numeric ranges require finite bounds with lo <= hi")
        }
        codes::SHADOWED_STOP => Some(
            "the generated dispatcher routes STOP to the runtime before the command \
             cascade, so a user-declared STOP handler is never called",
        ),
        codes::ARG_NAME_MISMATCH => Some(
            "annotation argument names are informational; the C parameter name is \
             authoritative",
        ),
        _ => None,
    }
}
