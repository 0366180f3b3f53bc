//! daemonc — build, check, and inspect on-device command daemons
//! generated from annotated embedded C firmware.

mod render;

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use daemon_toolchain_core::{CompileResult, SourceUnit, compile};
use daemon_toolchain_profile::{Profile, load_profile_from_str};

use crate::render::{Format, print_summary, render_diagnostics_pretty};

// ── CLI definition ──────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "daemonc",
    version,
    about = "Daemon toolchain — turn annotated firmware into a self-contained command daemon"
)]
struct Cli {
    /// Output mode: "pretty" for coloured terminal output, "json" for
    /// machine-readable JSON. Defaults to "pretty" when stdout is a TTY,
    /// "json" otherwise.
    #[arg(long, global = true, value_parser = ["pretty", "json"])]
    output: Option<String>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    // ── Progressive commands: check → manifest → build ──────────────
    /// Scan and validate the profile's sources without writing files.
    Check {
        /// Profile JSON describing the device and its source files.
        #[arg(long, value_name = "PATH")]
        profile: String,
    },

    /// Print the synthesized manifest JSON to stdout.
    Manifest {
        /// Profile JSON describing the device and its source files.
        #[arg(long, value_name = "PATH")]
        profile: String,
    },

    /// Generate daemon_entry.c, daemon_runtime.h, and daemon_runtime.c.
    Build {
        /// Profile JSON describing the device and its source files.
        #[arg(long, value_name = "PATH")]
        profile: String,
        /// Output directory (overrides the profile's out_dir).
        #[arg(long, value_name = "DIR")]
        out: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();
    let format = Format::resolve_or_detect(cli.output.as_deref());
    let code = match run(cli.cmd, format) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            1
        }
    };
    process::exit(code);
}

// ── Command dispatch ────────────────────────────────────────────────────

fn run(cmd: Cmd, format: Format) -> Result<i32> {
    match cmd {
        Cmd::Check { profile } => {
            let loaded = load_and_compile(&profile)?;
            report(&loaded, format);
            if format == Format::Json {
                print_envelope(&loaded, serde_json::json!({ "mode": "check" }));
            }
            Ok(exit_code(&loaded.result))
        }

        Cmd::Manifest { profile } => {
            let loaded = load_and_compile(&profile)?;
            report(&loaded, format);
            match (&loaded.result.manifest, format) {
                (Some(manifest), Format::Pretty) => {
                    println!("{}", manifest.to_json());
                }
                (_, Format::Json) => {
                    let manifest_json = loaded
                        .result
                        .manifest
                        .as_ref()
                        .map(|m| serde_json::from_str::<serde_json::Value>(&m.to_json()))
                        .transpose()?;
                    print_envelope(
                        &loaded,
                        serde_json::json!({ "mode": "manifest", "manifest": manifest_json }),
                    );
                }
                (None, Format::Pretty) => {}
            }
            Ok(exit_code(&loaded.result))
        }

        Cmd::Build { profile, out } => {
            let loaded = load_and_compile(&profile)?;
            report(&loaded, format);
            if !loaded.result.ok() {
                if format == Format::Json {
                    print_envelope(&loaded, serde_json::json!({ "mode": "build" }));
                }
                return Ok(1);
            }

            let out_dir = out.as_deref().unwrap_or_else(|| loaded.profile.out_dir());
            let out_dir = resolve_path(&loaded.profile_dir, out_dir);
            fs::create_dir_all(&out_dir)
                .with_context(|| format!("creating output directory {}", out_dir.display()))?;

            let mut written = Vec::new();
            for file in &loaded.result.files {
                let path = out_dir.join(&file.name);
                fs::write(&path, &file.contents)
                    .with_context(|| format!("writing {}", path.display()))?;
                written.push(path);
            }

            match format {
                Format::Pretty => {
                    for path in &written {
                        eprintln!("wrote {}", path.display());
                    }
                }
                Format::Json => {
                    let files: Vec<String> = loaded
                        .result
                        .files
                        .iter()
                        .map(|f| f.name.clone())
                        .collect();
                    print_envelope(
                        &loaded,
                        serde_json::json!({
                            "mode": "build",
                            "out_dir": out_dir.to_string_lossy(),
                            "files": files,
                        }),
                    );
                }
            }
            Ok(0)
        }
    }
}

// ── Profile loading & compilation ───────────────────────────────────────

struct Loaded {
    profile: Profile,
    profile_dir: PathBuf,
    sources: Vec<SourceUnit>,
    result: CompileResult,
}

fn load_and_compile(profile_path: &str) -> Result<Loaded> {
    let profile_text = fs::read_to_string(profile_path)
        .with_context(|| format!("reading profile {profile_path}"))?;
    let profile = load_profile_from_str(&profile_text)
        .with_context(|| format!("loading profile {profile_path}"))?;
    let profile_dir = Path::new(profile_path)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();

    let mut sources = Vec::new();
    for src in &profile.sources {
        let path = resolve_path(&profile_dir, src);
        let text = fs::read_to_string(&path)
            .with_context(|| format!("reading source {}", path.display()))?;
        sources.push(SourceUnit {
            path: src.clone(),
            text,
        });
    }

    let result = compile(&sources, &profile.device);
    Ok(Loaded {
        profile,
        profile_dir,
        sources,
        result,
    })
}

/// Resolve a profile-relative path; absolute paths pass through.
fn resolve_path(profile_dir: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        profile_dir.join(p)
    }
}

// ── Reporting ───────────────────────────────────────────────────────────

fn report(loaded: &Loaded, format: Format) {
    if format == Format::Pretty {
        render_diagnostics_pretty(&loaded.sources, &loaded.result.diagnostics);
        print_summary(&loaded.result.diagnostics);
    }
}

/// Print the JSON envelope: shared `ok`/`diagnostics` fields plus the
/// command-specific `extra` fields, as one object on stdout.
fn print_envelope(loaded: &Loaded, extra: serde_json::Value) {
    let mut envelope = serde_json::json!({
        "ok": loaded.result.ok(),
        "diagnostics": &loaded.result.diagnostics,
    });
    if let (Some(obj), Some(extra_obj)) = (envelope.as_object_mut(), extra.as_object()) {
        for (k, v) in extra_obj {
            obj.insert(k.clone(), v.clone());
        }
    }
    println!(
        "{}",
        serde_json::to_string_pretty(&envelope).expect("envelope serialization cannot fail")
    );
}

fn exit_code(result: &CompileResult) -> i32 {
    if result.ok() { 0 } else { 1 }
}
