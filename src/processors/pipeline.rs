//! End-to-end processing run.
//!
//! Stages run in a fixed order and each one returns a new collection:
//! cleaning → outlier handling → tide interpolation → datum reduction →
//! UTM projection → partitioning. Any fatal error discards the whole run.

use log::info;
use thiserror::Error;

use crate::config::{OutlierPolicy, PipelineConfig};
use crate::core::loaders::{LoaderError, RawSoundingRow, RawTideRow};
use crate::core::types::{OutputPartition, ProjectedPoint, VerticalDatumSet};
use crate::core::writers::WriteError;
use crate::processors::cleaning::{self, CleaningError, DropCounts};
use crate::processors::datum;
use crate::processors::filtering::{self, FilterError, IqrFence, OutlierAction};
use crate::processors::partition;
use crate::processors::projection::{
    self, ProjectionError, ProjectionOptions, TransformerCache, ZoneFailure,
};
use crate::processors::tide::{TideError, TideInterpolator};

/// Errors that abort a processing run.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("no soundings left to process: {0}")]
    EmptySoundings(String),

    #[error("no tide data left to process: {0}")]
    EmptyTide(String),

    #[error("{count} soundings have non-finite reduced depths")]
    InvalidCorrection { count: usize },

    #[error("failed to load input: {0}")]
    Load(#[from] LoaderError),

    #[error("outlier detection failed: {0}")]
    Filter(#[from] FilterError),

    #[error("tide interpolation failed: {0}")]
    Tide(#[from] TideError),

    #[error("UTM projection failed: {0}")]
    Projection(#[from] ProjectionError),

    #[error("failed to write output: {0}")]
    Write(#[from] WriteError),
}

impl From<CleaningError> for PipelineError {
    fn from(e: CleaningError) -> Self {
        match e {
            CleaningError::EmptyFormat => PipelineError::Configuration(e.to_string()),
            CleaningError::NoSoundings { .. } => PipelineError::EmptySoundings(e.to_string()),
            CleaningError::NoTide { .. } => PipelineError::EmptyTide(e.to_string()),
        }
    }
}

/// Parsed inputs of one run.
#[derive(Debug, Clone)]
pub struct PipelineInputs {
    pub soundings: Vec<RawSoundingRow>,
    pub tide: Vec<RawTideRow>,
    pub datum: VerticalDatumSet,
}

/// Parameters of one run.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub sounding_datetime_format: String,
    pub tide_datetime_format: String,
    pub outlier_policy: OutlierPolicy,
    pub fence_multiplier: f64,
    pub projection: ProjectionOptions,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for PipelineOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            sounding_datetime_format: config.input.sounding_datetime_format.clone(),
            tide_datetime_format: config.input.tide_datetime_format.clone(),
            outlier_policy: config.outliers.policy,
            fence_multiplier: config.outliers.fence_multiplier,
            projection: ProjectionOptions {
                isolate_zone_failures: config.projection.isolate_zone_failures,
                parallel: config.projection.parallel,
            },
        }
    }
}

/// Everything a run produces, including counts for reporting.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub sounding_rows: usize,
    pub soundings_dropped: DropCounts,
    pub tide_samples: usize,
    pub tide_rows_dropped: usize,
    pub fence: IqrFence,
    pub outliers: usize,
    pub outlier_action: OutlierAction,
    /// Soundings answered by flat tide extrapolation.
    pub tide_out_of_range: usize,
    pub zone_labels: Vec<String>,
    pub zone_failures: Vec<ZoneFailure>,
    pub points: Vec<ProjectedPoint>,
    pub partitions: Vec<OutputPartition>,
}

/// Run the full processing chain on parsed inputs.
///
/// # Errors
///
/// Returns a single `PipelineError` for the first fatal problem: empty
/// format patterns, no surviving soundings or tide samples, invalid tide
/// records, non-finite reductions, or (unless isolated) projection failures.
pub fn run_pipeline(
    inputs: &PipelineInputs,
    options: &PipelineOptions,
) -> Result<PipelineOutput, PipelineError> {
    let cleaned = cleaning::clean_soundings(&inputs.soundings, &options.sounding_datetime_format)?;
    let tide = cleaning::clean_tide(&inputs.tide, &options.tide_datetime_format)?;

    let (filtered, report, action) = filtering::filter_outliers(
        &cleaned.points,
        options.outlier_policy,
        options.fence_multiplier,
    )?;

    let interpolator = TideInterpolator::new(&tide.samples)?;
    let instants: Vec<_> = filtered.iter().map(|p| p.timestamp).collect();
    let interpolation = interpolator.interpolate(&instants)?;

    let corrected = datum::correct_soundings(&filtered, &interpolation.heights, &inputs.datum);
    let invalid = datum::count_invalid(&corrected);
    if invalid > 0 {
        return Err(PipelineError::InvalidCorrection { count: invalid });
    }
    info!("Tide correction applied to {} soundings", corrected.len());

    let mut cache = TransformerCache::new();
    let projected = projection::project_points(&corrected, &options.projection, &mut cache)?;
    if projected.points.is_empty() {
        return Err(PipelineError::EmptySoundings(
            "every zone failed to project".to_string(),
        ));
    }

    let partitions = partition::partition_by_zone(&projected.points);
    info!("Prepared {} output partitions", partitions.len());

    Ok(PipelineOutput {
        sounding_rows: cleaned.points.len(),
        soundings_dropped: cleaned.dropped,
        tide_samples: tide.samples.len(),
        tide_rows_dropped: tide.invalid + tide.duplicates,
        fence: report.fence,
        outliers: report.outlier_count(),
        outlier_action: action,
        tide_out_of_range: interpolation.out_of_range(),
        zone_labels: projected.zone_labels,
        zone_failures: projected.failures,
        points: projected.points,
        partitions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Datum;

    fn sounding(time: &str, depth: &str) -> RawSoundingRow {
        RawSoundingRow {
            date: "01-Mar-23".to_string(),
            time: time.to_string(),
            longitude: "110.4200°E".to_string(),
            latitude: "6.9000°S".to_string(),
            depth: depth.to_string(),
        }
    }

    fn tide(ts: &str, height: &str) -> RawTideRow {
        RawTideRow {
            timestamp: ts.to_string(),
            height: height.to_string(),
        }
    }

    fn inputs() -> PipelineInputs {
        PipelineInputs {
            soundings: vec![
                sounding("08:20:00", "6"),
                sounding("08:10:00", "5"),
                sounding("08:30:00", "50"),
            ],
            tide: vec![
                tide("2023-03-01 08:00:00", "1.0"),
                tide("2023-03-01 09:00:00", "1.6"),
            ],
            datum: VerticalDatumSet::new(2.9, 1.59, 0.27).unwrap(),
        }
    }

    // With only three depths the Tukey fence (k = 1.5) is [-28.25, 61.75] and
    // still contains 50, so these runs use a tighter multiplier to flag it.
    fn options(policy: OutlierPolicy) -> PipelineOptions {
        PipelineOptions {
            outlier_policy: policy,
            fence_multiplier: 0.5,
            ..PipelineOptions::default()
        }
    }

    #[test]
    fn test_three_point_scenario_remove() {
        let output = run_pipeline(&inputs(), &options(OutlierPolicy::Remove)).unwrap();

        assert_eq!(output.sounding_rows, 3);
        assert_eq!(output.outliers, 1);
        assert_eq!(output.outlier_action, OutlierAction::Remove);
        assert_eq!(output.points.len(), 2);
        assert_eq!(output.zone_labels, vec!["49S"]);
        assert_eq!(output.partitions.len(), 3);
        assert_eq!(output.tide_out_of_range, 0);

        let suffixes: Vec<&str> = output.partitions.iter().map(|p| p.datum.suffix()).collect();
        assert_eq!(suffixes, vec!["LWS", "MSL", "HWS"]);
        assert!(output.partitions.iter().all(|p| p.points.len() == 2));

        // 08:10 lies a sixth of the way through the tide bracket: 1.0 + 0.6 / 6 = 1.1
        let first = &output.points[0].corrected;
        assert_eq!(first.sounding.depth, 5.0);
        assert!((first.tide_interp - 1.1).abs() < 1e-9);
        assert!((first.reduced_depth.hws - -(5.0 + (2.9 - 1.1))).abs() < 1e-9);

        let hws = output
            .partitions
            .iter()
            .find(|p| p.datum == Datum::Hws)
            .unwrap();
        assert!((hws.points[0][2] - first.reduced_depth.hws).abs() < 1e-12);
    }

    #[test]
    fn test_three_point_scenario_keep() {
        let output = run_pipeline(&inputs(), &options(OutlierPolicy::Keep)).unwrap();
        assert_eq!(output.outlier_action, OutlierAction::Keep);
        assert_eq!(output.outliers, 1);
        assert_eq!(output.points.len(), 3);
    }

    #[test]
    fn test_three_points_within_default_fence() {
        let output = run_pipeline(&inputs(), &PipelineOptions::default()).unwrap();
        assert_eq!(output.outliers, 0);
        assert_eq!(output.outlier_action, OutlierAction::None);
        assert_eq!(output.points.len(), 3);
    }

    #[test]
    fn test_empty_soundings_abort() {
        let mut bad = inputs();
        for row in &mut bad.soundings {
            row.depth = "n/a".to_string();
        }
        let err = run_pipeline(&bad, &PipelineOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::EmptySoundings(_)));
    }

    #[test]
    fn test_single_tide_sample_aborts() {
        let mut bad = inputs();
        bad.tide.truncate(1);
        let err = run_pipeline(&bad, &PipelineOptions::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Tide(TideError::TooFewSamples(1))));
    }

    #[test]
    fn test_missing_format_is_configuration_error() {
        let options = PipelineOptions {
            tide_datetime_format: String::new(),
            ..PipelineOptions::default()
        };
        let err = run_pipeline(&inputs(), &options).unwrap_err();
        assert!(matches!(err, PipelineError::Configuration(_)));
    }
}
