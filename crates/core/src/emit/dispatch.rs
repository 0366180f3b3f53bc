//! Dispatch entry emitter: `daemon_entry.c`.
//!
//! The file layout is fixed: runtime header include, standard headers,
//! forward declarations of every referenced user function, then a single
//! `daemon_entry_dispatch` whose body is one `strcmp` branch per command
//! in catalog order. The built-in `STOP` branch always precedes the
//! cascade; a user-declared `STOP` branch is still emitted (unreachably)
//! to keep the cascade bit-compatible with catalog order.

use super::{EmittedFile, c_decimal};
use crate::catalog::{ArgKind, CSignature, Catalog, Command};

/// Emit `daemon_entry.c` for a catalog.
pub fn emit_dispatch(catalog: &Catalog) -> EmittedFile {
    let mut out = String::new();

    out.push_str("#include \"daemon_runtime.h\"\n\n");
    out.push_str("#include <stdbool.h>\n");
    out.push_str("#include <stdio.h>\n");
    out.push_str("#include <stdlib.h>\n");
    out.push_str("#include <string.h>\n\n");

    let mut declared: Vec<&CSignature> = Vec::new();
    for cmd in &catalog.commands {
        if !declared.iter().any(|sig| sig.name == cmd.signature.name) {
            declared.push(&cmd.signature);
        }
    }
    if !declared.is_empty() {
        for sig in &declared {
            out.push_str(&forward_declaration(sig));
            out.push('\n');
        }
        out.push('\n');
    }

    out.push_str("int daemon_entry_dispatch(const char *token, int argc, const char **argv) {\n");
    out.push_str("  if (token == NULL) return DAEMON_ERR_BAD_TOKEN;\n");
    out.push_str("  if (strcmp(token, \"STOP\") == 0) {\n");
    out.push_str("    daemon_runtime_stop();\n");
    out.push_str("    return DAEMON_OK;\n");
    out.push_str("  }\n");

    for cmd in &catalog.commands {
        out.push('\n');
        push_command_branch(&mut out, cmd);
    }

    out.push('\n');
    out.push_str("  return DAEMON_ERR_BAD_TOKEN;\n");
    out.push_str("}\n");

    EmittedFile {
        name: "daemon_entry.c".into(),
        contents: out,
        deps: vec!["daemon_runtime.h".into()],
    }
}

/// Forward-declare a user function with the exact resolved parameter types.
fn forward_declaration(sig: &CSignature) -> String {
    let params = if sig.params.is_empty() {
        "void".to_string()
    } else {
        sig.params
            .iter()
            .map(|p| format!("{} {}", p.ty.c_type(), p.name))
            .collect::<Vec<_>>()
            .join(", ")
    };
    format!("{} {}({});", sig.ret.c_type(), sig.name, params)
}

fn push_command_branch(out: &mut String, cmd: &Command) {
    out.push_str(&format!("  if (strcmp(token, \"{}\") == 0) {{\n", cmd.token));
    out.push_str(&format!(
        "    if (argc != {}) return DAEMON_ERR_BAD_ARGS;\n",
        cmd.args.len()
    ));

    for (i, arg) in cmd.args.iter().enumerate() {
        match &arg.kind {
            ArgKind::Str { .. } => {
                out.push_str(&format!("    const char *arg_{i} = argv[{i}];\n"));
            }
            ArgKind::Int { range } => {
                out.push_str(&format!("    int arg_{i} = 0;\n"));
                out.push_str(&format!(
                    "    if (!daemon_parse_int(argv[{i}], &arg_{i})) return DAEMON_ERR_BAD_ARGS;\n"
                ));
                if let Some((lo, hi)) = range {
                    push_range_checks(out, i, *lo as f64, *hi as f64);
                }
            }
            ArgKind::Float { range } => {
                out.push_str(&format!("    float arg_{i} = 0.0f;\n"));
                out.push_str(&format!(
                    "    if (!daemon_parse_float(argv[{i}], &arg_{i})) return DAEMON_ERR_BAD_ARGS;\n"
                ));
                if let Some((lo, hi)) = range {
                    push_range_checks(out, i, *lo, *hi);
                }
            }
        }
    }

    let call_args = (0..cmd.args.len())
        .map(|i| format!("arg_{i}"))
        .collect::<Vec<_>>()
        .join(", ");
    out.push_str(&format!("    {}({call_args});\n", cmd.signature.name));
    out.push_str("    return DAEMON_OK;\n");
    out.push_str("  }\n");
}

fn push_range_checks(out: &mut String, i: usize, lo: f64, hi: f64) {
    out.push_str(&format!(
        "    if (arg_{i} < {}) return DAEMON_ERR_RANGE;\n",
        c_decimal(lo)
    ));
    out.push_str(&format!(
        "    if (arg_{i} > {}) return DAEMON_ERR_RANGE;\n",
        c_decimal(hi)
    ));
}
