//! Data loaders for echosounder, tide gauge and tidal datum files.
//!
//! All inputs are tab-delimited text. Loaders only split fields; turning the
//! text into numbers and timestamps is the job of the cleaning stage, which
//! counts and drops rows it cannot parse.
//!
//! Files exported by field software are often Latin-1 encoded (degree signs in
//! coordinate tokens), so fields that are not valid UTF-8 are decoded as Latin-1.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};

use csv::{ByteRecord, ReaderBuilder};
use log::{debug, info};
use thiserror::Error;

use crate::config::TideFormat;
use crate::core::types::VerticalDatumSet;

/// Errors that can occur during file loading.
#[derive(Error, Debug)]
pub enum LoaderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Empty file: {0}")]
    EmptyFile(PathBuf),

    #[error("Missing required columns: {0}")]
    MissingColumns(String),

    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;

/// One unparsed sounding line: `date, time, longitude, latitude, depth`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSoundingRow {
    pub date: String,
    pub time: String,
    pub longitude: String,
    pub latitude: String,
    pub depth: String,
}

/// One unparsed tide line with its timestamp text already joined.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawTideRow {
    pub timestamp: String,
    pub height: String,
}

/// Decode a field as UTF-8, falling back to Latin-1.
fn decode_field(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(s) => s.trim().to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect::<String>().trim().to_string(),
    }
}

#[inline]
fn field(record: &ByteRecord, idx: usize) -> String {
    record.get(idx).map(decode_field).unwrap_or_default()
}

fn tab_reader<R: Read>(reader: R, has_headers: bool) -> csv::Reader<R> {
    ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(has_headers)
        .flexible(true)
        .quoting(false)
        .from_reader(reader)
}

/// Read sounding rows from any tab-delimited source without a header.
///
/// Only the first five columns are used. Short rows are kept with empty
/// fields so that the cleaner can count them as dropped.
pub fn read_sounding_rows<R: Read>(reader: R) -> Result<Vec<RawSoundingRow>> {
    let mut reader = tab_reader(reader, false);
    let mut rows = Vec::new();
    let mut record = ByteRecord::new();

    while reader.read_byte_record(&mut record)? {
        rows.push(RawSoundingRow {
            date: field(&record, 0),
            time: field(&record, 1),
            longitude: field(&record, 2),
            latitude: field(&record, 3),
            depth: field(&record, 4),
        });
    }

    Ok(rows)
}

/// Load and concatenate sounding files in the order given.
///
/// # Errors
///
/// Returns an error if a file cannot be read, or `EmptyFile` if all files
/// together contain no rows.
pub fn load_sounding_files<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<RawSoundingRow>> {
    let mut rows = Vec::new();

    for path in paths {
        let path = path.as_ref();
        let file = File::open(path)?;
        let file_rows = read_sounding_rows(BufReader::new(file))?;
        debug!("Read {} sounding rows from {}", file_rows.len(), path.display());
        rows.extend(file_rows);
    }

    if rows.is_empty() {
        let first = paths
            .first()
            .map(|p| p.as_ref().to_path_buf())
            .unwrap_or_default();
        return Err(LoaderError::EmptyFile(first));
    }

    info!("Loaded {} sounding rows from {} file(s)", rows.len(), paths.len());
    Ok(rows)
}

/// Read tide rows in either supported layout.
///
/// - `Headered`: a header row with `Timestamp` and `Depth` columns (any case).
/// - `Columns`: no header; date, time and height in the first three columns.
pub fn read_tide_rows<R: Read>(reader: R, format: TideFormat) -> Result<Vec<RawTideRow>> {
    match format {
        TideFormat::Headered => {
            let mut reader = tab_reader(reader, true);
            let headers = reader.byte_headers()?.clone();
            let col_map: HashMap<String, usize> = headers
                .iter()
                .enumerate()
                .map(|(i, name)| (decode_field(name).to_lowercase(), i))
                .collect();

            let ts_idx = col_map
                .get("timestamp")
                .copied()
                .ok_or_else(|| LoaderError::MissingColumns("Timestamp".to_string()))?;
            let height_idx = col_map
                .get("depth")
                .copied()
                .ok_or_else(|| LoaderError::MissingColumns("Depth".to_string()))?;

            let mut rows = Vec::new();
            let mut record = ByteRecord::new();
            while reader.read_byte_record(&mut record)? {
                rows.push(RawTideRow {
                    timestamp: field(&record, ts_idx),
                    height: field(&record, height_idx),
                });
            }
            Ok(rows)
        }
        TideFormat::Columns => {
            let mut reader = tab_reader(reader, false);
            let mut rows = Vec::new();
            let mut record = ByteRecord::new();
            while reader.read_byte_record(&mut record)? {
                rows.push(RawTideRow {
                    timestamp: format!("{} {}", field(&record, 0), field(&record, 1)),
                    height: field(&record, 2),
                });
            }
            Ok(rows)
        }
    }
}

/// Load a tide gauge file.
pub fn load_tide_file<P: AsRef<Path>>(path: P, format: TideFormat) -> Result<Vec<RawTideRow>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let rows = read_tide_rows(BufReader::new(file), format)?;

    if rows.is_empty() {
        return Err(LoaderError::EmptyFile(path.to_path_buf()));
    }

    info!("Loaded {} tide rows from {}", rows.len(), path.display());
    Ok(rows)
}

/// Read a one-row datum table with `HWS`, `MSL` and `LWS` columns.
pub fn read_datum<R: Read>(reader: R) -> Result<Option<VerticalDatumSet>> {
    let mut reader = tab_reader(reader, true);
    let headers = reader.byte_headers()?.clone();
    let col_map: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, name)| (decode_field(name).to_uppercase(), i))
        .collect();

    let mut indices = [0usize; 3];
    for (slot, name) in indices.iter_mut().zip(["HWS", "MSL", "LWS"]) {
        *slot = col_map
            .get(name)
            .copied()
            .ok_or_else(|| LoaderError::MissingColumns(name.to_string()))?;
    }

    let mut record = ByteRecord::new();
    if !reader.read_byte_record(&mut record)? {
        return Ok(None);
    }

    let mut values = [0.0f64; 3];
    for ((value, &idx), name) in values.iter_mut().zip(indices.iter()).zip(["HWS", "MSL", "LWS"]) {
        let text = field(&record, idx);
        *value = text
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .ok_or_else(|| LoaderError::ParseError(format!("Invalid {} value: '{}'", name, text)))?;
    }

    Ok(VerticalDatumSet::new(values[0], values[1], values[2]))
}

/// Load the tidal datum file.
///
/// # Errors
///
/// Returns `MissingColumns` if a datum column is absent, `ParseError` if a
/// value is not a finite number, and `EmptyFile` if there is no data row.
pub fn load_datum_file<P: AsRef<Path>>(path: P) -> Result<VerticalDatumSet> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let datum = read_datum(BufReader::new(file))?
        .ok_or_else(|| LoaderError::EmptyFile(path.to_path_buf()))?;

    info!(
        "Loaded datum from {}: HWS {:.3}, MSL {:.3}, LWS {:.3}",
        path.display(),
        datum.hws,
        datum.msl,
        datum.lws
    );
    Ok(datum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_read_sounding_rows() -> Result<()> {
        let data = "01-Mar-23\t08:00:01\t110.50°E\t6.90°S\t12.3\textra\n\
                    01-Mar-23\t08:00:02\t110.51°E\n";
        let rows = read_sounding_rows(data.as_bytes())?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, "01-Mar-23");
        assert_eq!(rows[0].longitude, "110.50°E");
        assert_eq!(rows[0].depth, "12.3");
        assert_eq!(rows[1].latitude, "");
        assert_eq!(rows[1].depth, "");
        Ok(())
    }

    #[test]
    fn test_latin1_fields_are_decoded() -> Result<()> {
        let mut data = b"01-Mar-23\t08:00:01\t110.5".to_vec();
        data.extend_from_slice(&[0xB0, b'E']);
        data.extend_from_slice(b"\t6.9\t5.0\n");
        let rows = read_sounding_rows(data.as_slice())?;
        assert_eq!(rows[0].longitude, "110.5°E");
        Ok(())
    }

    #[test]
    fn test_load_sounding_files_concatenates() -> Result<()> {
        let mut a = NamedTempFile::new().unwrap();
        writeln!(a, "01-Mar-23\t08:00:01\t110.50\t6.90S\t12.3").unwrap();
        let mut b = NamedTempFile::new().unwrap();
        writeln!(b, "01-Mar-23\t08:00:00\t110.49\t6.90S\t12.1").unwrap();
        writeln!(b, "01-Mar-23\t08:00:02\t110.51\t6.90S\t12.4").unwrap();
        a.flush().unwrap();
        b.flush().unwrap();

        let rows = load_sounding_files(&[a.path(), b.path()])?;
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].time, "08:00:01");
        assert_eq!(rows[1].time, "08:00:00");
        Ok(())
    }

    #[test]
    fn test_load_sounding_files_empty() {
        let file = NamedTempFile::new().unwrap();
        let result = load_sounding_files(&[file.path()]);
        assert!(matches!(result, Err(LoaderError::EmptyFile(_))));
    }

    #[test]
    fn test_read_tide_headered() -> Result<()> {
        let data = "Timestamp\tDepth\n2023-03-01 08:00:00\t1.25\n2023-03-01 09:00:00\t1.40\n";
        let rows = read_tide_rows(data.as_bytes(), TideFormat::Headered)?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].timestamp, "2023-03-01 08:00:00");
        assert_eq!(rows[1].height, "1.40");
        Ok(())
    }

    #[test]
    fn test_read_tide_headered_missing_column() {
        let data = "Time\tLevel\n2023-03-01 08:00:00\t1.25\n";
        let result = read_tide_rows(data.as_bytes(), TideFormat::Headered);
        assert!(matches!(result, Err(LoaderError::MissingColumns(_))));
    }

    #[test]
    fn test_read_tide_columns() -> Result<()> {
        let data = "01/03/2023\t08:00\t1.25\n01/03/2023\t09:00\t1.40\n";
        let rows = read_tide_rows(data.as_bytes(), TideFormat::Columns)?;
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].timestamp, "01/03/2023 08:00");
        assert_eq!(rows[0].height, "1.25");
        Ok(())
    }

    #[test]
    fn test_load_datum_file() -> Result<()> {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "HWS\tMSL\tLWS").unwrap();
        writeln!(file, "2.9\t1.59\t0.27").unwrap();
        file.flush().unwrap();

        let datum = load_datum_file(file.path())?;
        assert_eq!(datum.hws, 2.9);
        assert_eq!(datum.msl, 1.59);
        assert_eq!(datum.lws, 0.27);
        Ok(())
    }

    #[test]
    fn test_load_datum_file_errors() {
        let mut missing = NamedTempFile::new().unwrap();
        writeln!(missing, "HWS\tMSL").unwrap();
        writeln!(missing, "2.9\t1.59").unwrap();
        missing.flush().unwrap();
        assert!(matches!(
            load_datum_file(missing.path()),
            Err(LoaderError::MissingColumns(col)) if col == "LWS"
        ));

        let mut bad = NamedTempFile::new().unwrap();
        writeln!(bad, "HWS\tMSL\tLWS").unwrap();
        writeln!(bad, "2.9\tabc\t0.27").unwrap();
        bad.flush().unwrap();
        assert!(matches!(load_datum_file(bad.path()), Err(LoaderError::ParseError(_))));

        let mut header_only = NamedTempFile::new().unwrap();
        writeln!(header_only, "HWS\tMSL\tLWS").unwrap();
        header_only.flush().unwrap();
        assert!(matches!(
            load_datum_file(header_only.path()),
            Err(LoaderError::EmptyFile(_))
        ));
    }
}
