//! Manifest synthesis: the canonical, serializable projection of a catalog.
//!
//! Field declaration order fixes the JSON key order, so the structs below
//! are the single source of truth for the on-wire manifest shape. The
//! compact `serde_json` form is embedded verbatim in the generated runtime
//! and returned by the device after the `MANIFEST ` prefix.

use serde::{Deserialize, Serialize};

use crate::catalog::Catalog;
use daemon_toolchain_profile::Device;

/// Manifest schema version emitted by this toolchain.
pub const DAEMON_VERSION: &str = "0.1";

/// The device manifest, serialized in the fixed key order
/// `daemon_version, device, commands, telemetry, transport`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Manifest schema version (always [`DAEMON_VERSION`]).
    pub daemon_version: String,
    /// Device identity from the profile.
    pub device: Device,
    /// Commands in catalog order.
    pub commands: Vec<ManifestCommand>,
    /// Telemetry key descriptors.
    pub telemetry: ManifestTelemetry,
    /// Transport descriptor.
    pub transport: ManifestTransport,
}

/// One command entry in the manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestCommand {
    /// Wire token.
    pub token: String,
    /// Human description.
    pub description: String,
    /// Argument descriptors in positional order.
    pub args: Vec<ManifestArg>,
    /// Safety envelope.
    pub safety: ManifestSafety,
    /// Deterministic NLP hints derived from the description.
    pub nlp: ManifestNlp,
}

/// One argument descriptor.
///
/// `min`/`max` are always present: numeric bounds for ranged numeric
/// arguments, `null` otherwise (including all string arguments — their
/// advisory tags are not transmitted).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestArg {
    /// Argument name from the annotation.
    pub name: String,
    /// Type name: `int`, `float`, or `string`.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Lower bound, when enforced.
    pub min: Option<f64>,
    /// Upper bound, when enforced.
    pub max: Option<f64>,
    /// Always `true`: optional arguments are not part of the schema.
    pub required: bool,
}

/// Safety envelope as transmitted to hosts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestSafety {
    /// Maximum accepted `RUN` rate in Hz.
    pub rate_limit_hz: u32,
    /// Watchdog window in milliseconds.
    pub watchdog_ms: u32,
    /// Whether the device clamps internally.
    pub clamp: bool,
}

/// Deterministic NLP hints: lowercased token and description as synonyms,
/// the description verbatim as the single example.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestNlp {
    /// Synonym list.
    pub synonyms: Vec<String>,
    /// Example phrasings.
    pub examples: Vec<String>,
}

/// Telemetry section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestTelemetry {
    /// Telemetry key descriptors.
    pub keys: Vec<ManifestTelemetryKey>,
}

/// One telemetry key descriptor. `unit` is omitted (not `null`) when the
/// key carries none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestTelemetryKey {
    /// Key name.
    pub name: String,
    /// Value type.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Unit suffix, when present.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// Transport section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestTransport {
    /// Transport type (currently always `serial-line-v1`).
    #[serde(rename = "type")]
    pub type_name: String,
}

/// Synthesize the canonical manifest for a catalog.
pub fn synthesize(catalog: &Catalog) -> Manifest {
    Manifest {
        daemon_version: DAEMON_VERSION.into(),
        device: catalog.device.clone(),
        commands: catalog
            .commands
            .iter()
            .map(|cmd| {
                ManifestCommand {
                    token: cmd.token.clone(),
                    description: cmd.description.clone(),
                    args: cmd
                        .args
                        .iter()
                        .map(|arg| {
                            let (min, max) = match arg.kind.bounds() {
                                Some((lo, hi)) => (Some(lo), Some(hi)),
                                None => (None, None),
                            };
                            ManifestArg {
                                name: arg.name.clone(),
                                type_name: arg.kind.type_name().into(),
                                min,
                                max,
                                required: true,
                            }
                        })
                        .collect(),
                    safety: ManifestSafety {
                        rate_limit_hz: cmd.safety.rate_hz,
                        watchdog_ms: cmd.safety.watchdog_ms,
                        clamp: cmd.safety.clamp,
                    },
                    nlp: ManifestNlp {
                        synonyms: vec![
                            cmd.token.to_lowercase(),
                            cmd.description.to_lowercase(),
                        ],
                        examples: vec![cmd.description.clone()],
                    },
                }
            })
            .collect(),
        telemetry: ManifestTelemetry {
            keys: catalog
                .telemetry
                .iter()
                .map(|key| ManifestTelemetryKey {
                    name: key.name.clone(),
                    type_name: key.kind.clone(),
                    unit: key.unit.clone(),
                })
                .collect(),
        },
        transport: ManifestTransport {
            type_name: catalog.transport.clone(),
        },
    }
}

impl Manifest {
    /// Serialize to the compact, canonical JSON form: UTF-8, fixed key
    /// order, shortest round-trip decimals, no trailing newline.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("manifest serialization cannot fail")
    }

    /// Parse a manifest back from its JSON form (round-trip support).
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
