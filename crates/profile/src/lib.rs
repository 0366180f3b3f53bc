//! Device profile definitions and validation for the daemon toolchain.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading or validating a device profile.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// JSON deserialization failed.
    #[error("invalid profile JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// A required field value is missing or malformed.
    #[error("invalid {field}: {reason}")]
    InvalidField {
        /// The name of the field that failed validation.
        field: String,
        /// A human-readable explanation of why the field value is invalid.
        reason: String,
    },
}

/// Identity of the device image being built.
///
/// These fields are copied verbatim into the `device` object of the
/// synthesized manifest and are returned by the device in response to
/// `READ_MANIFEST`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Device {
    /// Human-readable device name (e.g. `"gripworks_gripper"`).
    pub name: String,
    /// Firmware image version string (e.g. `"0.1.0"`).
    pub version: String,
    /// Stable node identifier used to address the device.
    pub node_id: String,
}

/// A device profile: the set of annotated source files plus the device
/// identity that together form one buildable image.
///
/// # Example
/// ```
/// let profile = daemon_toolchain_profile::load_profile_from_str(
///     r#"{
///         "device": { "name": "rc_car", "version": "0.1.0", "node_id": "rc-car-1" },
///         "sources": ["motor_controller.c"],
///         "out_dir": "generated"
///     }"#,
/// )
/// .unwrap();
/// assert_eq!(profile.device.name, "rc_car");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    /// Device identity embedded in the manifest.
    pub device: Device,
    /// Source files to scan for export annotations, in build order.
    /// Paths are resolved relative to the profile file by the CLI.
    pub sources: Vec<String>,
    /// Directory the generated files are written to. Defaults to
    /// `"generated"` when absent.
    #[serde(default)]
    pub out_dir: Option<String>,
}

impl Profile {
    /// The output directory, applying the `"generated"` default.
    pub fn out_dir(&self) -> &str {
        self.out_dir.as_deref().unwrap_or("generated")
    }
}

/// Load and validate a [`Profile`] from a JSON string.
///
/// Performs structural validation after deserialization:
/// - `device.name`, `device.version`, and `device.node_id` must be non-empty
/// - `sources` must contain at least one entry, none of them empty
/// - `out_dir` must be non-empty when present
pub fn load_profile_from_str(s: &str) -> Result<Profile, ProfileError> {
    let profile: Profile = serde_json::from_str(s)?;

    if profile.device.name.trim().is_empty() {
        return Err(ProfileError::InvalidField {
            field: "device.name".into(),
            reason: "must not be empty".into(),
        });
    }
    if profile.device.version.trim().is_empty() {
        return Err(ProfileError::InvalidField {
            field: "device.version".into(),
            reason: "must not be empty".into(),
        });
    }
    if profile.device.node_id.trim().is_empty() {
        return Err(ProfileError::InvalidField {
            field: "device.node_id".into(),
            reason: "must not be empty".into(),
        });
    }

    if profile.sources.is_empty() {
        return Err(ProfileError::InvalidField {
            field: "sources".into(),
            reason: "at least one source file is required".into(),
        });
    }
    for (i, src) in profile.sources.iter().enumerate() {
        if src.trim().is_empty() {
            return Err(ProfileError::InvalidField {
                field: format!("sources[{i}]"),
                reason: "must not be empty".into(),
            });
        }
    }

    if let Some(out_dir) = &profile.out_dir
        && out_dir.trim().is_empty()
    {
        return Err(ProfileError::InvalidField {
            field: "out_dir".into(),
            reason: "must not be empty".into(),
        });
    }

    Ok(profile)
}
