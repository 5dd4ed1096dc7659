//! Single-beam echosounder bathymetry processing pipeline.
//!
//! This crate provides tools for:
//! - Cleaning raw SBES soundings and tide gauge records
//! - IQR-based depth outlier detection with remove/keep policies
//! - Tide correction against HWS, MSL and LWS datums
//! - Per-point UTM zone detection and WGS84 → UTM reprojection
//! - Writing one XYZ file per zone and datum
//!
//! # Example
//!
//! ```no_run
//! use sbes_pipeline::core::loaders::{load_datum_file, load_sounding_files, load_tide_file};
//! use sbes_pipeline::config::TideFormat;
//! use sbes_pipeline::processors::pipeline::{run_pipeline, PipelineInputs, PipelineOptions};
//!
//! let inputs = PipelineInputs {
//!     soundings: load_sounding_files(&["line_01.txt", "line_02.txt"]).unwrap(),
//!     tide: load_tide_file("pasut.txt", TideFormat::Headered).unwrap(),
//!     datum: load_datum_file("datum_pasut.txt").unwrap(),
//! };
//! let output = run_pipeline(&inputs, &PipelineOptions::default()).unwrap();
//! println!("zones: {:?}", output.zone_labels);
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod processors;

pub use config::{OutlierPolicy, PipelineConfig, TideFormat};
pub use crate::core::types::{CorrectedPoint, OutputPartition, ProjectedPoint, SoundingPoint, TideSample};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
