//! Command catalog: the validated, ordered collection of commands for one
//! profile, plus the per-profile runtime parameters derived from it.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ctx;
use daemon_toolchain_diagnostics::{Diagnostic, Span, codes};
use daemon_toolchain_profile::Device;

// ── Argument specs ──────────────────────────────────────────────────────

/// The kind of a command argument, with its optional range.
///
/// Numeric ranges are closed intervals enforced by the generated dispatcher.
/// String "ranges" are advisory enumeration tags: preserved for tooling,
/// never enforced, and serialized as `null` bounds in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ArgKind {
    /// Integer argument, decoded with `daemon_parse_int`.
    Int {
        /// Inclusive `[lo, hi]` bounds, when the annotation supplies them.
        range: Option<(i64, i64)>,
    },
    /// Floating-point argument, decoded with `daemon_parse_float`.
    Float {
        /// Inclusive `[lo, hi]` bounds, when the annotation supplies them.
        range: Option<(f64, f64)>,
    },
    /// String argument, passed through as `const char *`.
    Str {
        /// Advisory tag pair (e.g. `open..close`), not enforced.
        tag: Option<(String, String)>,
    },
}

impl ArgKind {
    /// The manifest type name for this kind.
    pub fn type_name(&self) -> &'static str {
        match self {
            ArgKind::Int { .. } => "int",
            ArgKind::Float { .. } => "float",
            ArgKind::Str { .. } => "string",
        }
    }

    /// Numeric bounds as `f64`, `None` for strings or unbounded numerics.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        match self {
            ArgKind::Int { range } => range.map(|(lo, hi)| (lo as f64, hi as f64)),
            ArgKind::Float { range } => *range,
            ArgKind::Str { .. } => None,
        }
    }
}

/// One entry of an annotation's `args=` schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArgSpec {
    /// Lowercase argument name (informational; the C parameter name wins).
    pub name: String,
    /// Kind and range of the argument.
    pub kind: ArgKind,
}

// ── Safety policy ───────────────────────────────────────────────────────

/// The safety envelope attached to every exported command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyPolicy {
    /// Maximum accepted `RUN` rate in Hz.
    pub rate_hz: u32,
    /// Watchdog window in milliseconds.
    pub watchdog_ms: u32,
    /// Whether the device should clamp out-of-range actuation internally.
    pub clamp: bool,
}

/// Safety envelope of the implicit built-in `STOP` command.
///
/// The built-in STOP lives in the generated dispatcher only: it is absent
/// from the manifest `commands[]` and does not participate in the runtime
/// parameter derivation. Its envelope is used as the derivation fallback
/// for a catalog with no user commands.
pub const BUILTIN_STOP_SAFETY: SafetyPolicy = SafetyPolicy {
    rate_hz: 10,
    watchdog_ms: 300,
    clamp: true,
};

// ── C signatures ────────────────────────────────────────────────────────

/// Accepted C parameter types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CParamType {
    /// `int`
    Int,
    /// `int16_t` — decoded as `int` and narrowed implicitly at the call site.
    Int16,
    /// `float`
    Float,
    /// `const char *`
    ConstCharPtr,
}

impl CParamType {
    /// The C spelling of this type, as reproduced in forward declarations.
    pub fn c_type(&self) -> &'static str {
        match self {
            CParamType::Int => "int",
            CParamType::Int16 => "int16_t",
            CParamType::Float => "float",
            CParamType::ConstCharPtr => "const char *",
        }
    }

    /// Whether an annotation argument kind is compatible with this C type.
    pub fn accepts(&self, kind: &ArgKind) -> bool {
        matches!(
            (self, kind),
            (CParamType::Int | CParamType::Int16, ArgKind::Int { .. })
                | (CParamType::Float, ArgKind::Float { .. })
                | (CParamType::ConstCharPtr, ArgKind::Str { .. })
        )
    }
}

/// Accepted C return types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CReturn {
    /// `void`
    Void,
    /// `int` — the status is discarded by the generated dispatcher.
    Int,
}

impl CReturn {
    /// The C spelling of this return type.
    pub fn c_type(&self) -> &'static str {
        match self {
            CReturn::Void => "void",
            CReturn::Int => "int",
        }
    }
}

/// One C parameter: type and name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CParam {
    /// The parameter's C type.
    pub ty: CParamType,
    /// The parameter's name as written in the declaration.
    pub name: String,
}

/// A parsed C function declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CSignature {
    /// Function name (the dispatch call target).
    pub name: String,
    /// Return type.
    pub ret: CReturn,
    /// Ordered parameter list.
    pub params: Vec<CParam>,
}

// ── Commands ────────────────────────────────────────────────────────────

/// The validated join of an export annotation, its argument schema, and the
/// resolved C signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    /// Uppercase wire token.
    pub token: String,
    /// Human description from `desc=`.
    pub description: String,
    /// Ordered argument schema, positionally matched to `signature.params`.
    pub args: Vec<ArgSpec>,
    /// Safety envelope from `safety=`.
    pub safety: SafetyPolicy,
    /// The resolved C signature of the call target.
    pub signature: CSignature,
    /// Path of the source unit the annotation came from.
    pub path: String,
    /// Byte span of the annotation within the source unit.
    pub span: Span,
}

// ── Telemetry ───────────────────────────────────────────────────────────

/// One telemetry key published by the generated runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TelemetryKey {
    /// Key name on the wire.
    pub name: String,
    /// Value type (`int` or `string`).
    pub kind: String,
    /// Unit suffix, when the value carries one.
    pub unit: Option<String>,
}

/// The fixed telemetry key set every profile currently publishes.
pub fn default_telemetry_keys() -> Vec<TelemetryKey> {
    vec![
        TelemetryKey {
            name: "uptime_ms".into(),
            kind: "int".into(),
            unit: Some("ms".into()),
        },
        TelemetryKey {
            name: "last_token".into(),
            kind: "string".into(),
            unit: None,
        },
    ]
}

/// Transport descriptor for the emitted runtime.
pub const TRANSPORT: &str = "serial-line-v1";

// ── Catalog ─────────────────────────────────────────────────────────────

/// The validated, ordered command collection for one profile.
///
/// Insertion order equals source order and is the sole ordering observable
/// in the emitted dispatch branches and the manifest `commands[]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Device identity from the profile.
    pub device: Device,
    /// Commands in source order.
    pub commands: Vec<Command>,
    /// Telemetry keys published by the runtime.
    pub telemetry: Vec<TelemetryKey>,
    /// Transport descriptor (currently always `serial-line-v1`).
    pub transport: String,
}

impl Catalog {
    /// Whether the user declared a `STOP` command of their own.
    pub fn has_user_stop(&self) -> bool {
        self.commands.iter().any(|c| c.token == "STOP")
    }

    /// Runtime watchdog window: the minimum `watchdog_ms` across commands,
    /// floored at 100 ms. An empty catalog falls back to the built-in STOP
    /// envelope.
    pub fn watchdog_ms(&self) -> u32 {
        self.commands
            .iter()
            .map(|c| c.safety.watchdog_ms)
            .min()
            .unwrap_or(BUILTIN_STOP_SAFETY.watchdog_ms)
            .max(100)
    }

    /// Minimum spacing between accepted `RUN` commands: ⌈1000 / max
    /// `rate_hz`⌉, floored at 10 ms. An empty catalog falls back to the
    /// built-in STOP envelope.
    pub fn min_cmd_interval_ms(&self) -> u32 {
        let max_rate = self
            .commands
            .iter()
            .map(|c| c.safety.rate_hz)
            .max()
            .unwrap_or(BUILTIN_STOP_SAFETY.rate_hz);
        1000u32.div_ceil(max_rate).max(10)
    }
}

// ── Builder ─────────────────────────────────────────────────────────────

/// Aggregates validated commands into a [`Catalog`], rejecting duplicate
/// tokens as they arrive.
#[derive(Debug)]
pub struct CatalogBuilder {
    device: Device,
    commands: Vec<Command>,
    seen: HashMap<String, usize>,
}

impl CatalogBuilder {
    /// Start a builder for the given device.
    pub fn new(device: Device) -> Self {
        Self {
            device,
            commands: Vec::new(),
            seen: HashMap::new(),
        }
    }

    /// Append a command, preserving insertion order.
    ///
    /// A token that is already present produces `DUPLICATE_TOKEN` at the
    /// second site and leaves the catalog unchanged. Returns whether the
    /// command was accepted.
    pub fn insert(&mut self, cmd: Command, diags: &mut Vec<Diagnostic>) -> bool {
        if let Some(&first_idx) = self.seen.get(&cmd.token) {
            let first = &self.commands[first_idx];
            diags.push(
                Diagnostic::error(
                    codes::DUPLICATE_TOKEN,
                    format!(
                        "token {} already declared by {} in {}",
                        cmd.token, first.signature.name, first.path
                    ),
                    Some(cmd.span),
                )
                .with_path(cmd.path.clone())
                .with_context(ctx!(
                    "token" => cmd.token.clone(),
                    "first_function" => first.signature.name.clone(),
                    "first_path" => first.path.clone(),
                )),
            );
            return false;
        }
        self.seen.insert(cmd.token.clone(), self.commands.len());
        self.commands.push(cmd);
        true
    }

    /// Finish the catalog.
    ///
    /// A user-declared `STOP` stays in the catalog (manifest, derivation,
    /// dispatch cascade) but is shadowed by the built-in STOP branch the
    /// dispatcher emits first, so it is flagged with `SHADOWED_STOP`.
    pub fn finalize(self, diags: &mut Vec<Diagnostic>) -> Catalog {
        if let Some(user_stop) = self.commands.iter().find(|c| c.token == "STOP") {
            diags.push(
                Diagnostic::warn(
                    codes::SHADOWED_STOP,
                    format!(
                        "user-declared STOP ({}) is shadowed by the built-in STOP branch",
                        user_stop.signature.name
                    ),
                    Some(user_stop.span),
                )
                .with_path(user_stop.path.clone())
                .with_context(ctx!("function" => user_stop.signature.name.clone())),
            );
        }
        Catalog {
            device: self.device,
            commands: self.commands,
            telemetry: default_telemetry_keys(),
            transport: TRANSPORT.into(),
        }
    }
}
