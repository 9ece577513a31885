// src/config/mod.rs
pub mod settings;

pub use settings::{DirectorySettings, SettingsConfig};

use crate::error::{Result, RippleError};
use crate::processing::detectors::{
    RippleDetectionAlgorithm, RippleDetectionParams, KAY_RIPPLE_DETECTOR,
};
use crate::processing::interpolate::InterpolationConfig;
use crate::visualization::MovieConfig;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_PARAM_NAME: &str = "default";
pub const DEFAULT_SPEED_NAME: &str = "head_speed";

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    pub settings: SettingsConfig,
    pub electrode_mask_policy: ElectrodeMaskPolicy,
    pub interpolation: InterpolationConfig,
    pub movie: MovieConfig,
}

/// What the assembler does with requested electrodes missing from the LFP band.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ElectrodeMaskPolicy {
    /// Drop them with a warning.
    #[default]
    Tolerant,
    /// Fail with the offending ids.
    Strict,
}

/// A named, immutable detection configuration.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct RippleParameters {
    pub speed_name: String,
    pub ripple_detection_algorithm: String,
    #[serde(default)]
    pub ripple_detection_params: RippleDetectionParams,
}

impl Default for RippleParameters {
    fn default() -> Self {
        Self {
            speed_name: DEFAULT_SPEED_NAME.to_string(),
            ripple_detection_algorithm: KAY_RIPPLE_DETECTOR.to_string(),
            ripple_detection_params: RippleDetectionParams::default(),
        }
    }
}

impl RippleParameters {
    /// Resolves the configured algorithm. Unknown names fail here, at call time.
    pub fn detector(&self) -> Result<RippleDetectionAlgorithm> {
        RippleDetectionAlgorithm::from_name(
            &self.ripple_detection_algorithm,
            self.ripple_detection_params,
        )
    }
}

/// Outcome of inserting a named parameter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inserted {
    New,
    /// An identical set already existed under the name.
    Skipped,
}

/// Insert rule for named parameter sets: identical re-inserts are skipped and
/// a different set under a taken name is rejected.
pub fn check_parameter_insert(
    name: &str,
    existing: Option<&RippleParameters>,
    params: &RippleParameters,
) -> Result<Inserted> {
    match existing {
        None => Ok(Inserted::New),
        Some(current) if current == params => Ok(Inserted::Skipped),
        Some(_) => Err(RippleError::ParameterSetConflict(name.to_string())),
    }
}

pub fn load_config<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let config_str = fs::read_to_string(path).map_err(|e| RippleError::io(path, e))?;

    Ok(serde_yaml::from_str(&config_str)?)
}

pub fn save_config<T: Serialize, P: AsRef<Path>>(config: &T, path: P) -> Result<()> {
    let path = path.as_ref();
    let yaml = serde_yaml::to_string(config)?;

    fs::write(path, yaml).map_err(|e| RippleError::io(path, e))
}
