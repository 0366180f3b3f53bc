//! Signature resolver: parses the restricted C declaration subset and
//! reconciles it with the annotation's argument schema.
//!
//! This is deliberately not a C parser. The accepted surface is exactly
//! what exported device-control functions look like: an optional storage
//! qualifier, a `void`/`int` return, an identifier, and up to 8 parameters
//! drawn from `int`, `int16_t`, `float`, and `const char *`.

use crate::annotation::ExportAnnotation;
use crate::catalog::{CParam, CParamType, CReturn, CSignature, Command};
use crate::ctx;
use crate::scan::AnnotationBlock;
use daemon_toolchain_diagnostics::{Diagnostic, Span, codes};

/// Storage qualifiers skipped ahead of the return type.
const QUALIFIERS: &[&str] = &["static", "extern", "inline"];

/// Maximum number of parameters an exported function may take.
const MAX_PARAMS: usize = 8;

/// Parse the captured declaration text into a [`CSignature`].
///
/// Appends `UNSUPPORTED_C_TYPE` diagnostics and returns `None` on any
/// shape the subset does not admit.
pub fn parse_signature(
    decl: &str,
    decl_span: Span,
    path: &str,
    diags: &mut Vec<Diagnostic>,
) -> Option<CSignature> {
    let unsupported = |diags: &mut Vec<Diagnostic>, message: String, detail: &str| {
        diags.push(
            Diagnostic::error(codes::UNSUPPORTED_C_TYPE, message, Some(decl_span))
                .with_path(path)
                .with_context(ctx!("declaration" => detail)),
        );
        None::<CSignature>
    };

    let decl = decl.trim().trim_end_matches(';').trim();
    let Some(open) = decl.find('(') else {
        return unsupported(
            diags,
            "expected a function declaration with a parameter list".into(),
            decl,
        );
    };
    let Some(close) = decl.rfind(')') else {
        return unsupported(diags, "unterminated parameter list".into(), decl);
    };
    if close < open {
        return unsupported(diags, "malformed parameter list".into(), decl);
    }

    // Head: qualifiers, return type, function name.
    let head: Vec<&str> = decl[..open].split_whitespace().collect();
    let head: Vec<&str> = head
        .iter()
        .copied()
        .skip_while(|tok| QUALIFIERS.contains(tok))
        .collect();
    let (ret_tok, name) = match head[..] {
        [ret_tok, name] => (ret_tok, name),
        _ => {
            return unsupported(
                diags,
                format!("cannot read return type and name from '{}'", decl[..open].trim()),
                decl,
            );
        }
    };
    let ret = match ret_tok {
        "void" => CReturn::Void,
        "int" => CReturn::Int,
        other => {
            return unsupported(
                diags,
                format!("return type '{other}' is not supported (use void or int)"),
                decl,
            );
        }
    };
    if !is_identifier(name) {
        return unsupported(diags, format!("'{name}' is not a valid function name"), decl);
    }

    // Parameters.
    let inner = decl[open + 1..close].trim();
    let mut params = Vec::new();
    if !(inner.is_empty() || inner == "void") {
        for raw in inner.split(',') {
            let Some(param) = parse_param(raw.trim()) else {
                return unsupported(
                    diags,
                    format!("parameter '{}' is not in the supported C subset", raw.trim()),
                    decl,
                );
            };
            params.push(param);
        }
    }
    if params.len() > MAX_PARAMS {
        return unsupported(
            diags,
            format!(
                "{} parameters exceed the supported maximum of {MAX_PARAMS}",
                params.len()
            ),
            decl,
        );
    }

    Some(CSignature {
        name: name.to_string(),
        ret,
        params,
    })
}

/// Parse one parameter: `int x`, `int16_t x`, `float x`, `const char *x`
/// (with any `*` spacing).
fn parse_param(raw: &str) -> Option<CParam> {
    let toks = tokenize_param(raw);
    let toks: Vec<&str> = toks.iter().map(String::as_str).collect();
    let (ty, name) = match toks[..] {
        ["int", name] => (CParamType::Int, name),
        ["int16_t", name] => (CParamType::Int16, name),
        ["float", name] => (CParamType::Float, name),
        ["const", "char", "*", name] => (CParamType::ConstCharPtr, name),
        _ => return None,
    };
    if !is_identifier(name) {
        return None;
    }
    Some(CParam {
        ty,
        name: name.to_string(),
    })
}

/// Split a parameter into identifier tokens, with `*` always standing
/// alone regardless of the spacing style (`char *x`, `char* x`, `char * x`).
fn tokenize_param(raw: &str) -> Vec<String> {
    let mut toks = Vec::new();
    let mut current = String::new();
    for ch in raw.chars() {
        if ch == '*' {
            if !current.is_empty() {
                toks.push(std::mem::take(&mut current));
            }
            toks.push("*".to_string());
        } else if ch.is_whitespace() {
            if !current.is_empty() {
                toks.push(std::mem::take(&mut current));
            }
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        toks.push(current);
    }
    toks
}

fn is_identifier(s: &str) -> bool {
    let mut bytes = s.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

/// Reconcile an annotation with its resolved C signature into a [`Command`].
///
/// Positional rules: counts must match (`ARITY_MISMATCH`), each annotation
/// kind must be compatible with the C type (`TYPE_MISMATCH`), and
/// `function=` must equal the declared name (`FUNCTION_NAME_MISMATCH`).
/// A differing parameter name is only the warning `ARG_NAME_MISMATCH`.
pub fn reconcile(
    annotation: ExportAnnotation,
    signature: CSignature,
    block: &AnnotationBlock,
    path: &str,
    diags: &mut Vec<Diagnostic>,
) -> Option<Command> {
    let mut failed = false;

    if let Some(function) = &annotation.function
        && function != &signature.name
    {
        diags.push(
            Diagnostic::error(
                codes::FUNCTION_NAME_MISMATCH,
                format!(
                    "annotation names function '{function}' but the declaration is '{}'",
                    signature.name
                ),
                Some(block.annotation_span),
            )
            .with_path(path)
            .with_context(ctx!(
                "annotation" => function.clone(),
                "declaration" => signature.name.clone(),
            )),
        );
        failed = true;
    }

    if annotation.args.len() != signature.params.len() {
        diags.push(
            Diagnostic::error(
                codes::ARITY_MISMATCH,
                format!(
                    "annotation declares {} argument(s) but {} takes {}",
                    annotation.args.len(),
                    signature.name,
                    signature.params.len()
                ),
                Some(block.annotation_span),
            )
            .with_path(path)
            .with_context(ctx!(
                "annotation_args" => annotation.args.len().to_string(),
                "c_params" => signature.params.len().to_string(),
            )),
        );
        failed = true;
    } else {
        for (i, (spec, param)) in annotation.args.iter().zip(&signature.params).enumerate() {
            if !param.ty.accepts(&spec.kind) {
                diags.push(
                    Diagnostic::error(
                        codes::TYPE_MISMATCH,
                        format!(
                            "argument '{}' is {} but parameter {} of {} is {}",
                            spec.name,
                            spec.kind.type_name(),
                            i,
                            signature.name,
                            param.ty.c_type()
                        ),
                        Some(block.annotation_span),
                    )
                    .with_path(path)
                    .with_context(ctx!(
                        "index" => i.to_string(),
                        "kind" => spec.kind.type_name(),
                        "c_type" => param.ty.c_type(),
                    )),
                );
                failed = true;
            } else if spec.name != param.name {
                diags.push(
                    Diagnostic::warn(
                        codes::ARG_NAME_MISMATCH,
                        format!(
                            "argument '{}' is named '{}' in the declaration of {}",
                            spec.name, param.name, signature.name
                        ),
                        Some(block.annotation_span),
                    )
                    .with_path(path)
                    .with_context(ctx!(
                        "index" => i.to_string(),
                        "annotation" => spec.name.clone(),
                        "declaration" => param.name.clone(),
                    )),
                );
            }
        }
    }

    if failed {
        return None;
    }
    Some(Command {
        token: annotation.token,
        description: annotation.desc,
        args: annotation.args,
        safety: annotation.safety,
        signature,
        path: path.to_string(),
        span: block.annotation_span,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ArgKind, ArgSpec, SafetyPolicy};
    use daemon_toolchain_diagnostics::Severity;

    fn sig_ok(decl: &str) -> CSignature {
        let mut diags = Vec::new();
        let sig = parse_signature(decl, Span::new(0, decl.len()), "main.c", &mut diags);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        sig.expect("signature should parse")
    }

    fn sig_err(decl: &str) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        let sig = parse_signature(decl, Span::new(0, decl.len()), "main.c", &mut diags);
        assert!(sig.is_none(), "expected failure, got {sig:?}");
        assert!(diags.iter().all(|d| d.id == codes::UNSUPPORTED_C_TYPE));
        diags
    }

    #[test]
    fn plain_void_function() {
        let sig = sig_ok("void move_forward(int speed)");
        assert_eq!(sig.name, "move_forward");
        assert_eq!(sig.ret, CReturn::Void);
        assert_eq!(sig.params.len(), 1);
        assert_eq!(sig.params[0].ty, CParamType::Int);
        assert_eq!(sig.params[0].name, "speed");
    }

    #[test]
    fn zero_parameter_forms() {
        assert!(sig_ok("void mc_init(void)").params.is_empty());
        assert!(sig_ok("void mc_init()").params.is_empty());
    }

    #[test]
    fn const_char_pointer_spacings() {
        for decl in [
            "void set_grip(const char *state)",
            "void set_grip(const char* state)",
            "void set_grip(const char * state)",
        ] {
            let sig = sig_ok(decl);
            assert_eq!(sig.params[0].ty, CParamType::ConstCharPtr, "{decl}");
            assert_eq!(sig.params[0].name, "state", "{decl}");
        }
    }

    #[test]
    fn int16_and_float_params() {
        let sig = sig_ok("void mc_set_drive(int16_t throttle_percent, int16_t steering_percent)");
        assert_eq!(sig.params[0].ty, CParamType::Int16);
        assert_eq!(sig.params[1].ty, CParamType::Int16);
        let sig = sig_ok("void set_throttle(float p)");
        assert_eq!(sig.params[0].ty, CParamType::Float);
    }

    #[test]
    fn int_return_and_qualifiers() {
        let sig = sig_ok("static int read_state(void)");
        assert_eq!(sig.ret, CReturn::Int);
        let sig = sig_ok("extern void halt(void)");
        assert_eq!(sig.name, "halt");
    }

    #[test]
    fn trailing_semicolon_tolerated() {
        let sig = sig_ok("void calibrate(int level);");
        assert_eq!(sig.name, "calibrate");
    }

    #[test]
    fn unsupported_return_type() {
        sig_err("float get_speed(void)");
        sig_err("uint32_t get_ticks(void)");
    }

    #[test]
    fn unsupported_parameter_types() {
        sig_err("void f(double x)");
        sig_err("void f(char *x)");
        sig_err("void f(unsigned int x)");
        sig_err("void f(int)"); // unnamed parameter
    }

    #[test]
    fn not_a_function() {
        sig_err("int g_state;");
        sig_err("struct limits { float lo");
    }

    #[test]
    fn too_many_parameters() {
        let params = (0..9).map(|i| format!("int a{i}")).collect::<Vec<_>>();
        let decl = format!("void f({})", params.join(", "));
        let diags = sig_err(&decl);
        assert!(diags[0].message.contains("maximum of 8"));
    }

    #[test]
    fn eight_parameters_accepted() {
        let params = (0..8).map(|i| format!("int a{i}")).collect::<Vec<_>>();
        let sig = sig_ok(&format!("void f({})", params.join(", ")));
        assert_eq!(sig.params.len(), 8);
    }

    // ── Reconciliation ──────────────────────────────────────────────────

    fn annotation(args: Vec<ArgSpec>, function: Option<&str>) -> ExportAnnotation {
        ExportAnnotation {
            pairs: Vec::new(),
            token: "FWD".into(),
            desc: "Move forward".into(),
            args,
            safety: SafetyPolicy {
                rate_hz: 20,
                watchdog_ms: 1200,
                clamp: true,
            },
            function: function.map(String::from),
        }
    }

    fn block() -> AnnotationBlock {
        AnnotationBlock {
            annotation: String::new(),
            annotation_span: Span::new(0, 10),
            decl: String::new(),
            decl_span: Span::new(11, 20),
        }
    }

    fn float_arg(name: &str) -> ArgSpec {
        ArgSpec {
            name: name.into(),
            kind: ArgKind::Float {
                range: Some((0.0, 1.0)),
            },
        }
    }

    #[test]
    fn reconcile_builds_command() {
        let mut diags = Vec::new();
        let cmd = reconcile(
            annotation(vec![float_arg("speed")], None),
            sig_ok("void daemon_cmd_fwd(float speed)"),
            &block(),
            "main.c",
            &mut diags,
        )
        .expect("command");
        assert!(diags.is_empty());
        assert_eq!(cmd.token, "FWD");
        assert_eq!(cmd.signature.name, "daemon_cmd_fwd");
        assert_eq!(cmd.path, "main.c");
    }

    #[test]
    fn arity_mismatch_rejected() {
        let mut diags = Vec::new();
        let cmd = reconcile(
            annotation(vec![float_arg("speed")], None),
            sig_ok("void daemon_cmd_fwd(float speed, float trim)"),
            &block(),
            "main.c",
            &mut diags,
        );
        assert!(cmd.is_none());
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].id, codes::ARITY_MISMATCH);
    }

    #[test]
    fn type_mismatch_rejected() {
        let mut diags = Vec::new();
        let cmd = reconcile(
            annotation(vec![float_arg("speed")], None),
            sig_ok("void daemon_cmd_fwd(int speed)"),
            &block(),
            "main.c",
            &mut diags,
        );
        assert!(cmd.is_none());
        assert_eq!(diags[0].id, codes::TYPE_MISMATCH);
    }

    #[test]
    fn int_kind_accepts_int16_param() {
        let mut diags = Vec::new();
        let cmd = reconcile(
            annotation(
                vec![ArgSpec {
                    name: "throttle_percent".into(),
                    kind: ArgKind::Int {
                        range: Some((-100, 100)),
                    },
                }],
                None,
            ),
            sig_ok("void mc_set_throttle(int16_t throttle_percent)"),
            &block(),
            "main.c",
            &mut diags,
        );
        assert!(cmd.is_some());
        assert!(diags.is_empty());
    }

    #[test]
    fn function_name_mismatch_rejected() {
        let mut diags = Vec::new();
        let cmd = reconcile(
            annotation(vec![float_arg("speed")], Some("set_speed")),
            sig_ok("void daemon_cmd_fwd(float speed)"),
            &block(),
            "main.c",
            &mut diags,
        );
        assert!(cmd.is_none());
        assert_eq!(diags[0].id, codes::FUNCTION_NAME_MISMATCH);
    }

    #[test]
    fn matching_function_key_accepted() {
        let mut diags = Vec::new();
        let cmd = reconcile(
            annotation(vec![float_arg("speed")], Some("daemon_cmd_fwd")),
            sig_ok("void daemon_cmd_fwd(float speed)"),
            &block(),
            "main.c",
            &mut diags,
        );
        assert!(cmd.is_some());
        assert!(diags.is_empty());
    }

    #[test]
    fn name_mismatch_is_only_a_warning() {
        let mut diags = Vec::new();
        let cmd = reconcile(
            annotation(vec![float_arg("speed")], None),
            sig_ok("void daemon_cmd_fwd(float velocity)"),
            &block(),
            "main.c",
            &mut diags,
        );
        assert!(cmd.is_some(), "warning must not reject the command");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].id, codes::ARG_NAME_MISMATCH);
        assert_eq!(diags[0].severity, Severity::Warn);
    }
}
