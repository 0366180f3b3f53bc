//! Code generation: the dispatch entry and runtime translation units.
//!
//! Both emitters are pure string builders over the catalog. Output is
//! byte-identical for identical catalogs: two-space indent, LF endings,
//! no timestamps, no absolute paths.

pub mod dispatch;
pub mod runtime;

pub use dispatch::emit_dispatch;
pub use runtime::{emit_runtime_header, emit_runtime_source};

/// A generated translation unit, ready to be written by the CLI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedFile {
    /// Logical file name (e.g. `daemon_entry.c`).
    pub name: String,
    /// UTF-8 file contents.
    pub contents: String,
    /// Logical names of emitted files this unit `#include`s.
    pub deps: Vec<String>,
}

/// Format a bound as a C floating literal: shortest round-trip decimal,
/// always carrying a fractional part (`-100.0`, not `-100`).
pub(crate) fn c_decimal(value: f64) -> String {
    // `{:?}` is ryu shortest round-trip and keeps the trailing `.0` that
    // `{}` drops for whole numbers.
    format!("{value:?}")
}

/// Escape text for inclusion in a C string literal.
pub(crate) fn c_string_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for ch in text.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out
}
