//! Data writers for XYZ and tabular outputs.
//!
//! This module provides functions for writing pipeline results:
//! - Space-delimited XYZ files, one per zone and datum, without header
//! - A CSV table with every intermediate column of the corrected soundings

use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use log::info;
use thiserror::Error;

use super::types::{OutputPartition, ProjectedPoint};

/// Timestamp layout used in the corrected table.
const TABLE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Errors that can occur during write operations.
#[derive(Error, Debug)]
pub enum WriteError {
    /// Failed to create parent directories.
    #[error("failed to create parent directories for '{path}': {source}")]
    CreateDirectory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to create or open file for writing.
    #[error("failed to create file '{path}': {source}")]
    CreateFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write data to file.
    #[error("failed to write to file '{path}': {source}")]
    WriteFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// CSV writing error.
    #[error("CSV write error for '{path}': {source}")]
    CsvError {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Result type for write operations.
pub type Result<T> = std::result::Result<T, WriteError>;

/// Creates parent directories for a file path if they don't exist.
fn ensure_parent_dirs(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|e| WriteError::CreateDirectory {
                path: parent.display().to_string(),
                source: e,
            })?;
        }
    }
    Ok(())
}

fn create_csv_writer(path: &Path, delimiter: u8, has_headers: bool) -> Result<csv::Writer<BufWriter<File>>> {
    ensure_parent_dirs(path)?;
    let file = File::create(path).map_err(|e| WriteError::CreateFile {
        path: path.display().to_string(),
        source: e,
    })?;
    Ok(csv::WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(has_headers)
        .from_writer(BufWriter::new(file)))
}

/// Write XYZ triples as space-separated fixed-point text with no header.
///
/// # Arguments
///
/// * `path` - Output file path (parent directories will be created if needed)
/// * `points` - `[x, y, z]` rows
/// * `decimals` - Digits after the decimal point for every column
///
/// # Example
///
/// ```no_run
/// use sbes_pipeline::core::writers::write_xyz;
/// use std::path::Path;
///
/// write_xyz(Path::new("Batimetri_49S_LWS.txt"), &[[426_512.3, 9_237_801.9, -7.25]], 3).unwrap();
/// ```
pub fn write_xyz(path: &Path, points: &[[f64; 3]], decimals: usize) -> Result<()> {
    let mut writer = create_csv_writer(path, b' ', false)?;
    let path_str = path.display().to_string();

    for [x, y, z] in points {
        writer
            .write_record(&[
                format!("{:.*}", decimals, x),
                format!("{:.*}", decimals, y),
                format!("{:.*}", decimals, z),
            ])
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}

/// Write every partition to `<dir>/<prefix>_<zone>_<datum>.txt`.
///
/// Returns the written paths in partition order.
pub fn write_partitions(
    dir: &Path,
    partitions: &[OutputPartition],
    prefix: &str,
    decimals: usize,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(partitions.len());

    for partition in partitions {
        let path = dir.join(partition.file_name(prefix));
        write_xyz(&path, &partition.points, decimals)?;
        info!("Wrote {} points to {}", partition.len(), path.display());
        written.push(path);
    }

    Ok(written)
}

/// Write the full corrected and projected table as CSV with a header.
///
/// Columns: timestamp, longitude, latitude, depth, tide_interp, D_LWS, D_MSL,
/// D_HWS, utm_zone, x_utm, y_utm.
pub fn write_corrected_table(path: &Path, points: &[ProjectedPoint]) -> Result<()> {
    let mut writer = create_csv_writer(path, b',', true)?;
    let path_str = path.display().to_string();

    writer
        .write_record([
            "timestamp",
            "longitude",
            "latitude",
            "depth",
            "tide_interp",
            "D_LWS",
            "D_MSL",
            "D_HWS",
            "utm_zone",
            "x_utm",
            "y_utm",
        ])
        .map_err(|e| WriteError::CsvError {
            path: path_str.clone(),
            source: e,
        })?;

    for p in points {
        let s = &p.corrected.sounding;
        let d = &p.corrected.reduced_depth;
        writer
            .write_record(&[
                s.timestamp.format(TABLE_TIMESTAMP_FORMAT).to_string(),
                format!("{:.8}", s.longitude),
                format!("{:.8}", s.latitude),
                format!("{:.3}", s.depth),
                format!("{:.4}", p.corrected.tide_interp),
                format!("{:.3}", d.lws),
                format!("{:.3}", d.msl),
                format!("{:.3}", d.hws),
                p.zone.label(),
                format!("{:.3}", p.x),
                format!("{:.3}", p.y),
            ])
            .map_err(|e| WriteError::CsvError {
                path: path_str.clone(),
                source: e,
            })?;
    }

    writer.flush().map_err(|e| WriteError::WriteFile {
        path: path_str,
        source: e,
    })?;

    Ok(())
}
