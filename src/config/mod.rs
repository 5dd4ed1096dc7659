//! Configuration types for the bathymetry pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::types::VerticalDatumSet;

/// Layout of the tide gauge file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TideFormat {
    /// Header row with `Timestamp` and `Depth` columns
    Headered,
    /// No header; columns are date, time, height
    Columns,
}

/// What to do with soundings outside the IQR fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutlierPolicy {
    /// Drop outliers before tide correction
    Remove,
    /// Keep every sounding
    Keep,
}

/// Configuration for reading input files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    /// chrono pattern for the joined sounding date and time columns
    #[serde(default = "default_sounding_datetime_format")]
    pub sounding_datetime_format: String,

    /// Tide file layout
    #[serde(default = "default_tide_format")]
    pub tide_format: TideFormat,

    /// chrono pattern for tide timestamps
    #[serde(default = "default_tide_datetime_format")]
    pub tide_datetime_format: String,
}

fn default_sounding_datetime_format() -> String {
    "%d-%b-%y %H:%M:%S".to_string()
}

fn default_tide_format() -> TideFormat {
    TideFormat::Headered
}

fn default_tide_datetime_format() -> String {
    "%Y-%m-%d %H:%M:%S".to_string()
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            sounding_datetime_format: default_sounding_datetime_format(),
            tide_format: default_tide_format(),
            tide_datetime_format: default_tide_datetime_format(),
        }
    }
}

/// Manually supplied tidal datum levels.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatumConfig {
    #[serde(default)]
    pub hws: Option<f64>,
    #[serde(default)]
    pub msl: Option<f64>,
    #[serde(default)]
    pub lws: Option<f64>,
}

impl DatumConfig {
    /// Returns the datum set when all three levels are present and finite.
    pub fn to_datum_set(&self) -> Option<VerticalDatumSet> {
        VerticalDatumSet::new(self.hws?, self.msl?, self.lws?)
    }
}

/// Configuration for outlier handling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlierConfig {
    #[serde(default = "default_outlier_policy")]
    pub policy: OutlierPolicy,

    /// IQR multiplier for the fence
    #[serde(default = "default_fence_multiplier")]
    pub fence_multiplier: f64,
}

fn default_outlier_policy() -> OutlierPolicy {
    OutlierPolicy::Remove
}

fn default_fence_multiplier() -> f64 {
    1.5
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            policy: default_outlier_policy(),
            fence_multiplier: default_fence_multiplier(),
        }
    }
}

/// Configuration for the UTM projection stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectionConfig {
    /// Drop failing zones instead of aborting the run
    #[serde(default)]
    pub isolate_zone_failures: bool,

    /// Transform zones in parallel
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_parallel() -> bool {
    true
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        Self {
            isolate_zone_failures: false,
            parallel: default_parallel(),
        }
    }
}

/// Configuration for written files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Prefix of every XYZ file name
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    /// Fixed decimals for X, Y and Z
    #[serde(default = "default_decimals")]
    pub decimals: usize,
}

fn default_file_prefix() -> String {
    "Batimetri".to_string()
}

fn default_decimals() -> usize {
    3
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            file_prefix: default_file_prefix(),
            decimals: default_decimals(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub input: InputConfig,

    #[serde(default)]
    pub datum: DatumConfig,

    #[serde(default)]
    pub outliers: OutlierConfig,

    #[serde(default)]
    pub projection: ProjectionConfig,

    #[serde(default)]
    pub output: OutputConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
