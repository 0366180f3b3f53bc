//! Export annotation parser: the `@daemon:export` key/value grammar, the
//! `args=` schema mini-grammar, and the `safety=` policy list.
//!
//! All failures are diagnostics; a `None` return means at least one error
//! was appended. Offsets in `ANNOTATION_SYNTAX` context refer to byte
//! positions within the logical annotation string (the scanner's joined
//! form), since the raw source bytes of a joined multi-line annotation are
//! not contiguous.

use crate::catalog::{ArgKind, ArgSpec, SafetyPolicy};
use crate::ctx;
use crate::scan::AnnotationBlock;
use daemon_toolchain_diagnostics::{Diagnostic, Span, codes};

/// Recognized annotation keys, in documentation order.
const KNOWN_KEYS: &[&str] = &["token", "desc", "args", "safety", "function"];
/// Keys that must be present on every annotation.
const REQUIRED_KEYS: &[&str] = &["token", "desc", "args", "safety"];

/// A parsed and validated export annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportAnnotation {
    /// Ordered raw `(key, value)` pairs as written.
    pub pairs: Vec<(String, String)>,
    /// Wire token (uppercase, at most 32 chars).
    pub token: String,
    /// Human description.
    pub desc: String,
    /// Parsed argument schema (possibly empty).
    pub args: Vec<ArgSpec>,
    /// Parsed safety policy.
    pub safety: SafetyPolicy,
    /// Explicit call target, when `function=` was supplied.
    pub function: Option<String>,
}

/// Parse the annotation of one block.
///
/// Appends diagnostics to `diags` and returns `None` if any error was
/// produced for this annotation.
pub fn parse_annotation(
    block: &AnnotationBlock,
    path: &str,
    diags: &mut Vec<Diagnostic>,
) -> Option<ExportAnnotation> {
    let before = diags.len();
    let mut p = Parser {
        text: &block.annotation,
        span: block.annotation_span,
        path,
        diags: &mut *diags,
    };
    let annotation = p.parse();
    if diags.len() > before { None } else { annotation }
}

// ── Parser ──────────────────────────────────────────────────────────────

struct Parser<'a> {
    text: &'a str,
    span: Span,
    path: &'a str,
    diags: &'a mut Vec<Diagnostic>,
}

impl Parser<'_> {
    fn syntax(&mut self, offset: usize, message: impl Into<String>) {
        self.diags.push(
            Diagnostic::error(codes::ANNOTATION_SYNTAX, message, Some(self.span))
                .with_path(self.path)
                .with_context(ctx!("offset" => offset.to_string())),
        );
    }

    fn parse(&mut self) -> Option<ExportAnnotation> {
        let pairs = self.parse_pairs()?;

        for (key, _, off) in &pairs {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                self.diags.push(
                    Diagnostic::error(
                        codes::UNKNOWN_KEY,
                        format!("unknown annotation key '{key}'"),
                        Some(self.span),
                    )
                    .with_path(self.path)
                    .with_context(ctx!("key" => key.clone(), "offset" => off.to_string())),
                );
            }
        }
        for required in REQUIRED_KEYS {
            if !pairs.iter().any(|(k, _, _)| k == required) {
                self.diags.push(
                    Diagnostic::error(
                        codes::MISSING_KEY,
                        format!("required annotation key '{required}' is missing"),
                        Some(self.span),
                    )
                    .with_path(self.path)
                    .with_context(ctx!("key" => *required)),
                );
            }
        }

        let lookup = |key: &str| -> Option<(&str, usize)> {
            pairs
                .iter()
                .find(|(k, _, _)| k == key)
                .map(|(_, v, off)| (v.as_str(), *off))
        };

        let token = lookup("token").map(|(v, off)| {
            self.validate_token(v, off);
            v.to_string()
        });
        let desc = lookup("desc").map(|(v, _)| v.to_string());
        let args = lookup("args").and_then(|(v, off)| self.parse_args(v, off));
        let safety = lookup("safety").and_then(|(v, off)| self.parse_safety(v, off));
        let function = match lookup("function") {
            Some((v, off)) => {
                if !is_c_identifier(v) {
                    self.syntax(off, format!("function= value '{v}' is not a C identifier"));
                }
                Some(v.to_string())
            }
            None => None,
        };

        Some(ExportAnnotation {
            pairs: pairs.into_iter().map(|(k, v, _)| (k, v)).collect(),
            token: token?,
            desc: desc?,
            args: args?,
            safety: safety?,
            function,
        })
    }

    /// Top-level `key=value` pair list. Values are quoted or barewords; a
    /// bareword runs to the next whitespace.
    fn parse_pairs(&mut self) -> Option<Vec<(String, String, usize)>> {
        let b = self.text.as_bytes();
        // The scanner only hands over strings that begin with the marker.
        let mut i = if self.text.starts_with("@daemon:export") {
            "@daemon:export".len()
        } else {
            0
        };
        let mut pairs: Vec<(String, String, usize)> = Vec::new();

        loop {
            while i < b.len() && b[i].is_ascii_whitespace() {
                i += 1;
            }
            if i >= b.len() {
                break;
            }

            let key_start = i;
            while i < b.len() && (b[i].is_ascii_alphanumeric() || b[i] == b'_') {
                i += 1;
            }
            if i == key_start {
                self.syntax(i, "expected key=value pair");
                return None;
            }
            let key = &self.text[key_start..i];

            if b.get(i) != Some(&b'=') {
                self.syntax(i, format!("expected '=' after key '{key}'"));
                return None;
            }
            i += 1;

            let (value, value_off) = if b.get(i) == Some(&b'"') {
                i += 1;
                let vstart = i;
                while i < b.len() && b[i] != b'"' {
                    i += 1;
                }
                if i >= b.len() {
                    self.syntax(vstart, format!("unterminated quoted value for '{key}'"));
                    return None;
                }
                let v = &self.text[vstart..i];
                i += 1;
                (v, vstart)
            } else {
                let vstart = i;
                while i < b.len() && !b[i].is_ascii_whitespace() {
                    i += 1;
                }
                (&self.text[vstart..i], vstart)
            };

            if pairs.iter().any(|(k, _, _)| k == key) {
                self.syntax(key_start, format!("duplicate annotation key '{key}'"));
                return None;
            }
            pairs.push((key.to_string(), value.to_string(), value_off));
        }

        if pairs.is_empty() {
            self.syntax(self.text.len(), "annotation carries no key=value pairs");
            return None;
        }
        Some(pairs)
    }

    fn validate_token(&mut self, token: &str, off: usize) {
        let well_formed = !token.is_empty()
            && token.len() <= 32
            && token
                .bytes()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_');
        if !well_formed {
            self.syntax(
                off,
                format!(
                    "token '{token}' must be a non-empty uppercase [A-Z0-9_] identifier of at most 32 chars"
                ),
            );
        }
    }

    // ── args mini-grammar ───────────────────────────────────────────────

    /// `args := empty | spec ("," spec)*` with
    /// `spec := name ":" type range?`.
    fn parse_args(&mut self, value: &str, base_off: usize) -> Option<Vec<ArgSpec>> {
        if value.trim().is_empty() {
            return Some(Vec::new());
        }
        let before = self.diags.len();
        let mut specs = Vec::new();
        let mut piece_off = 0usize;
        for piece in value.split(',') {
            let off = base_off + piece_off;
            piece_off += piece.len() + 1;
            if let Some(spec) = self.parse_arg_spec(piece.trim(), off) {
                specs.push(spec);
            }
        }
        if self.diags.len() > before {
            None
        } else {
            Some(specs)
        }
    }

    fn parse_arg_spec(&mut self, spec: &str, off: usize) -> Option<ArgSpec> {
        let Some((name, rest)) = spec.split_once(':') else {
            self.syntax(off, format!("argument spec '{spec}' is missing ':'"));
            return None;
        };
        if !is_lower_identifier(name) {
            self.syntax(
                off,
                format!("argument name '{name}' must be a lowercase identifier"),
            );
            return None;
        }

        let (type_name, range_src) = match rest.split_once('[') {
            Some((ty, tail)) => {
                let Some(range) = tail.strip_suffix(']') else {
                    self.syntax(off, format!("unterminated range in argument '{name}'"));
                    return None;
                };
                (ty, Some(range))
            }
            None => (rest, None),
        };

        let kind = match type_name {
            "int" => ArgKind::Int {
                range: match range_src {
                    Some(r) => Some(self.parse_int_range(name, r, off)?),
                    None => None,
                },
            },
            "float" => ArgKind::Float {
                range: match range_src {
                    Some(r) => Some(self.parse_float_range(name, r, off)?),
                    None => None,
                },
            },
            "string" => ArgKind::Str {
                tag: match range_src {
                    Some(r) => Some(self.parse_string_tag(name, r, off)?),
                    None => None,
                },
            },
            other => {
                self.syntax(
                    off,
                    format!("argument '{name}' has unknown type '{other}' (expected int, float, or string)"),
                );
                return None;
            }
        };

        Some(ArgSpec {
            name: name.to_string(),
            kind,
        })
    }

    fn split_range<'v>(&mut self, name: &str, src: &'v str, off: usize) -> Option<(&'v str, &'v str)> {
        let Some((lo, hi)) = src.split_once("..") else {
            self.syntax(off, format!("range of argument '{name}' is missing '..'"));
            return None;
        };
        Some((lo, hi))
    }

    fn parse_int_range(&mut self, name: &str, src: &str, off: usize) -> Option<(i64, i64)> {
        let (lo_src, hi_src) = self.split_range(name, src, off)?;
        let (Ok(lo), Ok(hi)) = (lo_src.parse::<i64>(), hi_src.parse::<i64>()) else {
            self.syntax(
                off,
                format!("int argument '{name}' requires integer bounds, got [{src}]"),
            );
            return None;
        };
        if lo > hi {
            self.range_inverted(name, lo_src, hi_src);
            return None;
        }
        Some((lo, hi))
    }

    fn parse_float_range(&mut self, name: &str, src: &str, off: usize) -> Option<(f64, f64)> {
        let (lo_src, hi_src) = self.split_range(name, src, off)?;
        let (Ok(lo), Ok(hi)) = (lo_src.parse::<f64>(), hi_src.parse::<f64>()) else {
            self.syntax(
                off,
                format!("float argument '{name}' requires numeric bounds, got [{src}]"),
            );
            return None;
        };
        if !lo.is_finite() || !hi.is_finite() || lo > hi {
            self.range_inverted(name, lo_src, hi_src);
            return None;
        }
        Some((lo, hi))
    }

    fn parse_string_tag(
        &mut self,
        name: &str,
        src: &str,
        off: usize,
    ) -> Option<(String, String)> {
        let (lo, hi) = self.split_range(name, src, off)?;
        if !is_word(lo) || !is_word(hi) {
            self.syntax(
                off,
                format!("string argument '{name}' tag must be two words, got [{src}]"),
            );
            return None;
        }
        Some((lo.to_string(), hi.to_string()))
    }

    fn range_inverted(&mut self, name: &str, lo: &str, hi: &str) {
        self.diags.push(
            Diagnostic::error(
                codes::RANGE_INVERTED,
                format!("argument '{name}' range [{lo}..{hi}] has lo > hi or non-finite bounds"),
                Some(self.span),
            )
            .with_path(self.path)
            .with_context(ctx!("arg" => name, "lo" => lo, "hi" => hi)),
        );
    }

    // ── safety policy ───────────────────────────────────────────────────

    /// `safety := k=v ("," k=v)*` requiring exactly `rate_hz`,
    /// `watchdog_ms`, and `clamp`.
    fn parse_safety(&mut self, value: &str, _base_off: usize) -> Option<SafetyPolicy> {
        let invalid = |p: &mut Self, message: String, ctx_key: &str, ctx_val: &str| {
            p.diags.push(
                Diagnostic::error(codes::INVALID_SAFETY, message, Some(p.span))
                    .with_path(p.path)
                    .with_context(ctx!("key" => ctx_key, "value" => ctx_val)),
            );
        };

        let mut rate_hz: Option<u32> = None;
        let mut watchdog_ms: Option<u32> = None;
        let mut clamp: Option<bool> = None;
        let before = self.diags.len();

        for entry in value.split(',') {
            let entry = entry.trim();
            let Some((k, v)) = entry.split_once('=') else {
                invalid(
                    self,
                    format!("safety entry '{entry}' is not of the form key=value"),
                    "entry",
                    entry,
                );
                continue;
            };
            match k {
                "rate_hz" | "watchdog_ms" => {
                    let slot = if k == "rate_hz" {
                        &mut rate_hz
                    } else {
                        &mut watchdog_ms
                    };
                    if slot.is_some() {
                        invalid(self, format!("duplicate safety key '{k}'"), k, v);
                        continue;
                    }
                    match v.parse::<u32>() {
                        Ok(n) if n >= 1 => *slot = Some(n),
                        _ => invalid(
                            self,
                            format!("safety {k}={v} must be a positive integer"),
                            k,
                            v,
                        ),
                    }
                }
                "clamp" => {
                    if clamp.is_some() {
                        invalid(self, "duplicate safety key 'clamp'".into(), k, v);
                        continue;
                    }
                    match v {
                        "true" => clamp = Some(true),
                        "false" => clamp = Some(false),
                        _ => invalid(
                            self,
                            format!("safety clamp={v} must be exactly true or false"),
                            k,
                            v,
                        ),
                    }
                }
                other => invalid(self, format!("unknown safety key '{other}'"), other, v),
            }
        }

        // Report missing keys only when the entries themselves were clean;
        // a malformed entry already explains why its slot is empty.
        if self.diags.len() == before {
            for (key, present) in [
                ("rate_hz", rate_hz.is_some()),
                ("watchdog_ms", watchdog_ms.is_some()),
                ("clamp", clamp.is_some()),
            ] {
                if !present {
                    invalid(self, format!("safety key '{key}' is missing"), key, "");
                }
            }
        }

        if self.diags.len() > before {
            return None;
        }
        Some(SafetyPolicy {
            rate_hz: rate_hz?,
            watchdog_ms: watchdog_ms?,
            clamp: clamp?,
        })
    }
}

// ── Small char-class helpers ────────────────────────────────────────────

fn is_c_identifier(s: &str) -> bool {
    let mut bytes = s.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() || b == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn is_lower_identifier(s: &str) -> bool {
    let mut bytes = s.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_lowercase() || b == b'_' => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

fn is_word(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use daemon_toolchain_diagnostics::Severity;

    fn block(annotation: &str) -> AnnotationBlock {
        AnnotationBlock {
            annotation: annotation.to_string(),
            annotation_span: Span::new(0, annotation.len()),
            decl: String::new(),
            decl_span: Span::empty(0),
        }
    }

    fn parse_ok(annotation: &str) -> ExportAnnotation {
        let mut diags = Vec::new();
        let parsed = parse_annotation(&block(annotation), "main.c", &mut diags);
        assert!(diags.is_empty(), "unexpected diagnostics: {diags:?}");
        parsed.expect("annotation should parse")
    }

    fn parse_err(annotation: &str) -> Vec<Diagnostic> {
        let mut diags = Vec::new();
        let parsed = parse_annotation(&block(annotation), "main.c", &mut diags);
        assert!(parsed.is_none(), "expected failure, got {parsed:?}");
        assert!(!diags.is_empty());
        assert!(diags.iter().all(|d| d.severity == Severity::Error));
        diags
    }

    const FWD: &str = "@daemon:export token=FWD desc=\"Move forward\" args=\"speed:float[0..1]\" safety=\"rate_hz=20,watchdog_ms=1200,clamp=true\"";

    #[test]
    fn full_annotation_parses() {
        let a = parse_ok(FWD);
        assert_eq!(a.token, "FWD");
        assert_eq!(a.desc, "Move forward");
        assert_eq!(a.args.len(), 1);
        assert_eq!(a.args[0].name, "speed");
        assert_eq!(
            a.args[0].kind,
            ArgKind::Float {
                range: Some((0.0, 1.0))
            }
        );
        assert_eq!(a.safety.rate_hz, 20);
        assert_eq!(a.safety.watchdog_ms, 1200);
        assert!(a.safety.clamp);
        assert!(a.function.is_none());
    }

    #[test]
    fn pairs_preserve_order() {
        let a = parse_ok(FWD);
        let keys: Vec<&str> = a.pairs.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["token", "desc", "args", "safety"]);
    }

    #[test]
    fn function_key_accepted() {
        let a = parse_ok(
            "@daemon:export token=GRIP desc=\"Set gripper state\" args=\"state:string[open..close]\" safety=\"rate_hz=15,watchdog_ms=400,clamp=true\" function=set_grip",
        );
        assert_eq!(a.function.as_deref(), Some("set_grip"));
        assert_eq!(
            a.args[0].kind,
            ArgKind::Str {
                tag: Some(("open".into(), "close".into()))
            }
        );
    }

    #[test]
    fn empty_args_allowed() {
        let a = parse_ok(
            "@daemon:export token=INIT desc=\"Init\" args=\"\" safety=\"rate_hz=2,watchdog_ms=2000,clamp=true\"",
        );
        assert!(a.args.is_empty());
    }

    #[test]
    fn multi_arg_schema() {
        let a = parse_ok(
            "@daemon:export token=DRIVE desc=\"Drive\" args=\"throttle_percent:int[-100..100],steering_percent:int[-100..100]\" safety=\"rate_hz=20,watchdog_ms=600,clamp=true\"",
        );
        assert_eq!(a.args.len(), 2);
        assert_eq!(
            a.args[0].kind,
            ArgKind::Int {
                range: Some((-100, 100))
            }
        );
        assert_eq!(a.args[1].name, "steering_percent");
    }

    #[test]
    fn unquoted_bareword_values() {
        let a = parse_ok(
            "@daemon:export token=L desc=Left args=intensity:int safety=\"rate_hz=20,watchdog_ms=300,clamp=true\"",
        );
        assert_eq!(a.desc, "Left");
        assert_eq!(a.args[0].kind, ArgKind::Int { range: None });
    }

    #[test]
    fn unknown_key_rejected() {
        let diags = parse_err(&format!("{FWD} priority=high"));
        assert!(diags.iter().any(|d| d.id == codes::UNKNOWN_KEY));
        let ctx = diags
            .iter()
            .find(|d| d.id == codes::UNKNOWN_KEY)
            .and_then(|d| d.context.as_ref())
            .unwrap();
        assert_eq!(ctx.get("key").unwrap(), "priority");
    }

    #[test]
    fn missing_keys_each_reported() {
        let diags = parse_err("@daemon:export token=FWD");
        let missing: Vec<&str> = diags
            .iter()
            .filter(|d| d.id == codes::MISSING_KEY)
            .map(|d| d.context.as_ref().unwrap().get("key").unwrap().as_str())
            .collect();
        assert_eq!(missing, ["desc", "args", "safety"]);
    }

    #[test]
    fn duplicate_key_is_syntax_error() {
        let diags = parse_err(&format!("{FWD} token=AGAIN"));
        assert!(diags.iter().any(|d| d.id == codes::ANNOTATION_SYNTAX));
    }

    #[test]
    fn syntax_error_carries_offset() {
        let diags = parse_err("@daemon:export token");
        let d = diags
            .iter()
            .find(|d| d.id == codes::ANNOTATION_SYNTAX)
            .unwrap();
        let offset: usize = d
            .context
            .as_ref()
            .unwrap()
            .get("offset")
            .unwrap()
            .parse()
            .unwrap();
        assert_eq!(offset, "@daemon:export token".len());
    }

    #[test]
    fn unterminated_quote_rejected() {
        let diags = parse_err("@daemon:export token=FWD desc=\"half open");
        assert!(diags.iter().any(|d| d.id == codes::ANNOTATION_SYNTAX));
    }

    #[test]
    fn lowercase_token_rejected() {
        let diags = parse_err(
            "@daemon:export token=fwd desc=\"d\" args=\"\" safety=\"rate_hz=1,watchdog_ms=1,clamp=true\"",
        );
        assert!(diags.iter().any(|d| d.id == codes::ANNOTATION_SYNTAX));
    }

    #[test]
    fn overlong_token_rejected() {
        let long = "A".repeat(33);
        let diags = parse_err(&format!(
            "@daemon:export token={long} desc=\"d\" args=\"\" safety=\"rate_hz=1,watchdog_ms=1,clamp=true\""
        ));
        assert!(diags.iter().any(|d| d.id == codes::ANNOTATION_SYNTAX));
    }

    #[test]
    fn int_range_with_float_bounds_rejected() {
        let diags = parse_err(
            "@daemon:export token=A desc=\"d\" args=\"x:int[0.5..2]\" safety=\"rate_hz=1,watchdog_ms=1,clamp=true\"",
        );
        assert!(diags.iter().any(|d| d.id == codes::ANNOTATION_SYNTAX));
    }

    #[test]
    fn inverted_int_range_rejected() {
        let diags = parse_err(
            "@daemon:export token=A desc=\"d\" args=\"x:int[100..-100]\" safety=\"rate_hz=1,watchdog_ms=1,clamp=true\"",
        );
        assert!(diags.iter().any(|d| d.id == codes::RANGE_INVERTED));
    }

    #[test]
    fn inverted_float_range_rejected() {
        let diags = parse_err(
            "@daemon:export token=A desc=\"d\" args=\"x:float[1.5..0.5]\" safety=\"rate_hz=1,watchdog_ms=1,clamp=true\"",
        );
        assert!(diags.iter().any(|d| d.id == codes::RANGE_INVERTED));
    }

    #[test]
    fn non_finite_float_bound_rejected() {
        let diags = parse_err(
            "@daemon:export token=A desc=\"d\" args=\"x:float[0..1e400]\" safety=\"rate_hz=1,watchdog_ms=1,clamp=true\"",
        );
        assert!(diags.iter().any(|d| d.id == codes::RANGE_INVERTED));
    }

    #[test]
    fn unknown_arg_type_rejected() {
        let diags = parse_err(
            "@daemon:export token=A desc=\"d\" args=\"x:double[0..1]\" safety=\"rate_hz=1,watchdog_ms=1,clamp=true\"",
        );
        assert!(diags.iter().any(|d| d.id == codes::ANNOTATION_SYNTAX));
    }

    #[test]
    fn uppercase_arg_name_rejected() {
        let diags = parse_err(
            "@daemon:export token=A desc=\"d\" args=\"Speed:int\" safety=\"rate_hz=1,watchdog_ms=1,clamp=true\"",
        );
        assert!(diags.iter().any(|d| d.id == codes::ANNOTATION_SYNTAX));
    }

    #[test]
    fn safety_missing_key_rejected() {
        let diags = parse_err(
            "@daemon:export token=A desc=\"d\" args=\"\" safety=\"rate_hz=10,clamp=true\"",
        );
        let d = diags.iter().find(|d| d.id == codes::INVALID_SAFETY).unwrap();
        assert_eq!(
            d.context.as_ref().unwrap().get("key").unwrap(),
            "watchdog_ms"
        );
    }

    #[test]
    fn safety_zero_rate_rejected() {
        let diags = parse_err(
            "@daemon:export token=A desc=\"d\" args=\"\" safety=\"rate_hz=0,watchdog_ms=1,clamp=true\"",
        );
        assert!(diags.iter().any(|d| d.id == codes::INVALID_SAFETY));
    }

    #[test]
    fn safety_loose_boolean_rejected() {
        for bad in ["yes", "True", "1"] {
            let diags = parse_err(&format!(
                "@daemon:export token=A desc=\"d\" args=\"\" safety=\"rate_hz=1,watchdog_ms=1,clamp={bad}\""
            ));
            assert!(
                diags.iter().any(|d| d.id == codes::INVALID_SAFETY),
                "clamp={bad} should be rejected"
            );
        }
    }

    #[test]
    fn safety_unknown_key_rejected() {
        let diags = parse_err(
            "@daemon:export token=A desc=\"d\" args=\"\" safety=\"rate_hz=1,watchdog_ms=1,clamp=true,fuse_ms=9\"",
        );
        assert!(diags.iter().any(|d| d.id == codes::INVALID_SAFETY));
    }
}
