//! The straight-line batch pipeline: scan → parse → resolve → catalog →
//! manifest → emit.
//!
//! Each function is pure (input → output). Scanning, annotation parsing,
//! and signature resolution are best-effort per annotation; manifest
//! synthesis and emission run only when zero errors accumulated.

use crate::annotation::parse_annotation;
use crate::catalog::{Catalog, CatalogBuilder};
use crate::emit::{EmittedFile, emit_dispatch, emit_runtime_header, emit_runtime_source};
use crate::manifest::{Manifest, synthesize};
use crate::resolve::{parse_signature, reconcile};
use crate::scan::{SourceUnit, scan};
use daemon_toolchain_diagnostics::{Diagnostic, Severity};
use daemon_toolchain_profile::Device;

/// Everything one pipeline run produces.
#[derive(Debug)]
pub struct CompileResult {
    /// Generated translation units. Empty when any error was diagnosed.
    pub files: Vec<EmittedFile>,
    /// All diagnostics, in pipeline order.
    pub diagnostics: Vec<Diagnostic>,
    /// The synthesized manifest, when the run was clean.
    pub manifest: Option<Manifest>,
    /// The finalized catalog, when the run was clean.
    pub catalog: Option<Catalog>,
}

impl CompileResult {
    /// `true` when no error-severity diagnostics were produced
    /// (warnings are allowed).
    pub fn ok(&self) -> bool {
        !self
            .diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }
}

/// Run the full pipeline over a set of source units.
///
/// Units are processed in the given order; annotations within a unit in
/// source order. That combined order is the catalog order observable in
/// the dispatch cascade and the manifest `commands[]`.
pub fn compile(units: &[SourceUnit], device: &Device) -> CompileResult {
    let mut diagnostics = Vec::new();
    let mut builder = CatalogBuilder::new(device.clone());

    for unit in units {
        for block in scan(unit, &mut diagnostics) {
            let Some(annotation) = parse_annotation(&block, &unit.path, &mut diagnostics) else {
                continue;
            };
            let Some(signature) =
                parse_signature(&block.decl, block.decl_span, &unit.path, &mut diagnostics)
            else {
                continue;
            };
            let Some(command) =
                reconcile(annotation, signature, &block, &unit.path, &mut diagnostics)
            else {
                continue;
            };
            builder.insert(command, &mut diagnostics);
        }
    }

    let catalog = builder.finalize(&mut diagnostics);

    if diagnostics.iter().any(|d| d.severity == Severity::Error) {
        return CompileResult {
            files: Vec::new(),
            diagnostics,
            manifest: None,
            catalog: None,
        };
    }

    let manifest = synthesize(&catalog);
    let manifest_json = manifest.to_json();
    let files = vec![
        emit_dispatch(&catalog),
        emit_runtime_header(),
        emit_runtime_source(&catalog, &manifest_json),
    ];

    CompileResult {
        files,
        diagnostics,
        manifest: Some(manifest),
        catalog: Some(catalog),
    }
}
