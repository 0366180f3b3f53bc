//! Daemon toolchain core library.
//!
//! Transforms annotated embedded C firmware into a self-contained
//! on-device command daemon. The main entry point is [`compile`], which
//! runs the full pipeline: source scanning, annotation parsing, signature
//! resolution, catalog building, manifest synthesis, and deterministic
//! emission of the dispatch and runtime translation units.
//!
//! The core is pure data-in/data-out: it never touches the filesystem.
//! The CLI crate reads source files and writes the emitted artifacts.

#![warn(missing_docs)]

/// Export annotation grammar: key/value pairs, argument schema, safety
/// policy.
pub mod annotation;
/// Commands, catalogs, and the per-profile runtime parameter derivation.
pub mod catalog;
/// Emitters for the generated C translation units.
pub mod emit;
/// Manifest synthesis and serialization.
pub mod manifest;
/// The batch pipeline driver.
pub mod pipeline;
/// C declaration parsing and annotation reconciliation.
pub mod resolve;
/// Source scanning: annotation/declaration pairing.
pub mod scan;

/// Shorthand for building a `BTreeMap<String, String>` context from
/// key-value pairs.
///
/// ```ignore
/// ctx!("token" => token, "expected" => "2", "actual" => "3")
/// ```
macro_rules! ctx {
    ($($k:expr => $v:expr),+ $(,)?) => {
        std::collections::BTreeMap::from([$(($k.into(), $v.into())),+])
    };
}
pub(crate) use ctx;

// ── Convenience re-exports ──────────────────────────────────────────────
// Flat imports for the most common entry points. The full module paths
// remain available for less common types.

// Pipeline
pub use pipeline::{CompileResult, compile};

// Scanner
pub use scan::{AnnotationBlock, SourceUnit, scan};

// Annotation parser
pub use annotation::{ExportAnnotation, parse_annotation};

// Signature resolver
pub use resolve::{parse_signature, reconcile};

// Catalog
pub use catalog::{
    ArgKind, ArgSpec, CParam, CParamType, CReturn, CSignature, Catalog, CatalogBuilder, Command,
    SafetyPolicy,
};

// Manifest
pub use manifest::{DAEMON_VERSION, Manifest, synthesize};

// Emitters
pub use emit::{EmittedFile, emit_dispatch, emit_runtime_header, emit_runtime_source};

// Diagnostics (re-exported from the diagnostics crate)
pub use daemon_toolchain_diagnostics::{Diagnostic, Severity, Span, codes};
