//! Core data types and I/O operations.

pub mod loaders;
pub mod transforms;
pub mod types;
pub mod writers;

pub use loaders::{LoaderError, RawSoundingRow, RawTideRow};
pub use types::{
    CorrectedPoint, Datum, Hemisphere, OutputPartition, ProjectedPoint, ReducedDepths,
    SoundingPoint, TideSample, UtmZone, VerticalDatumSet,
};
pub use writers::{write_corrected_table, write_partitions, write_xyz, WriteError};
