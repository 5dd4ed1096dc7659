//! Processing stages of the bathymetry pipeline.

pub mod cleaning;
pub mod datum;
pub mod filtering;
pub mod partition;
pub mod pipeline;
pub mod projection;
pub mod tide;

// Re-export key types for convenience
pub use cleaning::{clean_soundings, clean_tide, CleanedSoundings, CleanedTide, CleaningError, DropCounts};
pub use datum::{correct_soundings, reduce_depth};
pub use filtering::{
    apply_outlier_action, detect_outliers, filter_outliers, FilterError, IqrFence, OutlierAction,
    OutlierReport,
};
pub use partition::partition_by_zone;
pub use pipeline::{run_pipeline, PipelineError, PipelineInputs, PipelineOptions, PipelineOutput};
pub use projection::{project_points, zone_for, ProjectionError, ProjectionOptions, TransformerCache};
pub use tide::{TideError, TideInterpolator};
