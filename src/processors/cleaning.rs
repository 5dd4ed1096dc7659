//! Cleaning of raw sounding and tide rows.
//!
//! Every token is parsed independently; a row survives only if all of its
//! fields parse to finite values. Rejected rows are counted per failing field
//! and never reach later stages.

use chrono::NaiveDateTime;
use log::{info, warn};
use thiserror::Error;

use crate::core::loaders::{RawSoundingRow, RawTideRow};
use crate::core::types::{SoundingPoint, TideSample};

/// Degree markers seen in exported coordinate tokens, including the mojibake
/// produced when UTF-8 degree signs are read through other code pages.
const DEGREE_MARKERS: [&str; 4] = ["¬∞", "Â°", "°", "\u{FFFD}"];

/// Errors raised when cleaning cannot produce a usable series.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CleaningError {
    #[error("datetime format must not be empty")]
    EmptyFormat,

    #[error("no valid sounding rows remain after cleaning ({dropped} dropped)")]
    NoSoundings { dropped: usize },

    #[error("no valid tide rows remain after cleaning ({dropped} dropped)")]
    NoTide { dropped: usize },
}

/// Per-field counts of rejected rows.
///
/// A row with several bad fields is counted once per field, so the field
/// counts may sum to more than `rows`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DropCounts {
    pub rows: usize,
    pub timestamp: usize,
    pub longitude: usize,
    pub latitude: usize,
    pub depth: usize,
}

/// Cleaned soundings plus what was dropped on the way.
#[derive(Debug, Clone)]
pub struct CleanedSoundings {
    pub points: Vec<SoundingPoint>,
    pub dropped: DropCounts,
}

/// Cleaned tide samples plus what was dropped on the way.
#[derive(Debug, Clone)]
pub struct CleanedTide {
    pub samples: Vec<TideSample>,
    /// Rows with an unparseable timestamp or height.
    pub invalid: usize,
    /// Rows sharing a timestamp with an earlier row.
    pub duplicates: usize,
}

fn strip_degree_markers(token: &str) -> String {
    let mut s = token.to_string();
    for marker in DEGREE_MARKERS {
        s = s.replace(marker, "");
    }
    s.trim().to_string()
}

#[inline]
fn parse_finite(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse a longitude token such as `110.5234°E`.
///
/// Only east longitudes are accepted: a trailing `E` and any degree marker are
/// stripped, and anything else (for example a `W` suffix) fails to parse.
pub fn parse_longitude(token: &str) -> Option<f64> {
    let s = token.trim();
    let s = s
        .strip_suffix('E')
        .or_else(|| s.strip_suffix('e'))
        .unwrap_or(s);
    parse_finite(&strip_degree_markers(s))
}

/// Parse a latitude token such as `6.9012°S`.
///
/// A trailing `S` makes the value negative, a trailing `N` keeps it positive.
/// Tokens without a hemisphere letter are assumed to be north.
pub fn parse_latitude(token: &str) -> Option<f64> {
    let s = strip_degree_markers(&token.trim().to_uppercase());
    let (body, sign) = if let Some(rest) = s.strip_suffix('S') {
        (rest, -1.0)
    } else if let Some(rest) = s.strip_suffix('N') {
        (rest, 1.0)
    } else {
        (s.as_str(), 1.0)
    };
    parse_finite(&strip_degree_markers(body)).map(|v| v * sign)
}

/// Parse a depth token.
pub fn parse_depth(token: &str) -> Option<f64> {
    parse_finite(token)
}

/// Parse a date and a time token joined by a single space.
pub fn parse_timestamp(date: &str, time: &str, format: &str) -> Option<NaiveDateTime> {
    let joined = format!("{} {}", date.trim(), time.trim());
    NaiveDateTime::parse_from_str(&joined, format).ok()
}

/// Clean raw sounding rows into a time-ordered series.
///
/// Rows with any unparseable field are dropped. The result is stably sorted
/// by timestamp, so rows with equal timestamps keep their input order.
pub fn clean_soundings(
    rows: &[RawSoundingRow],
    format: &str,
) -> Result<CleanedSoundings, CleaningError> {
    if format.trim().is_empty() {
        return Err(CleaningError::EmptyFormat);
    }

    let mut dropped = DropCounts::default();
    let mut points = Vec::with_capacity(rows.len());

    for row in rows {
        let timestamp = parse_timestamp(&row.date, &row.time, format);
        let longitude = parse_longitude(&row.longitude);
        let latitude = parse_latitude(&row.latitude);
        let depth = parse_depth(&row.depth);

        match (timestamp, longitude, latitude, depth) {
            (Some(timestamp), Some(longitude), Some(latitude), Some(depth)) => {
                points.push(SoundingPoint {
                    timestamp,
                    longitude,
                    latitude,
                    depth,
                });
            }
            _ => {
                dropped.rows += 1;
                dropped.timestamp += usize::from(timestamp.is_none());
                dropped.longitude += usize::from(longitude.is_none());
                dropped.latitude += usize::from(latitude.is_none());
                dropped.depth += usize::from(depth.is_none());
            }
        }
    }

    if dropped.rows > 0 {
        warn!(
            "Dropped {} sounding rows (timestamp: {}, longitude: {}, latitude: {}, depth: {})",
            dropped.rows, dropped.timestamp, dropped.longitude, dropped.latitude, dropped.depth
        );
    }

    if points.is_empty() {
        return Err(CleaningError::NoSoundings {
            dropped: dropped.rows,
        });
    }

    points.sort_by_key(|p| p.timestamp);
    info!("Sounding data cleaned: {} rows", points.len());

    Ok(CleanedSoundings { points, dropped })
}

/// Clean raw tide rows into a strictly increasing sample series.
///
/// Unparseable rows are dropped, the remainder is stably sorted, and later
/// rows repeating an earlier timestamp are discarded.
pub fn clean_tide(rows: &[RawTideRow], format: &str) -> Result<CleanedTide, CleaningError> {
    if format.trim().is_empty() {
        return Err(CleaningError::EmptyFormat);
    }

    let mut samples: Vec<TideSample> = rows
        .iter()
        .filter_map(|row| {
            let timestamp = NaiveDateTime::parse_from_str(row.timestamp.trim(), format).ok()?;
            let height = parse_finite(&row.height)?;
            Some(TideSample { timestamp, height })
        })
        .collect();
    let invalid = rows.len() - samples.len();

    samples.sort_by_key(|s| s.timestamp);
    let before = samples.len();
    samples.dedup_by_key(|s| s.timestamp);
    let duplicates = before - samples.len();

    if invalid > 0 {
        warn!("Dropped {} unparseable tide rows", invalid);
    }
    if duplicates > 0 {
        warn!("Dropped {} tide rows with duplicate timestamps", duplicates);
    }

    if samples.is_empty() {
        return Err(CleaningError::NoTide {
            dropped: invalid + duplicates,
        });
    }

    info!("Tide data cleaned: {} rows", samples.len());
    Ok(CleanedTide {
        samples,
        invalid,
        duplicates,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const FORMAT: &str = "%d-%b-%y %H:%M:%S";

    fn row(date: &str, time: &str, lon: &str, lat: &str, depth: &str) -> RawSoundingRow {
        RawSoundingRow {
            date: date.to_string(),
            time: time.to_string(),
            longitude: lon.to_string(),
            latitude: lat.to_string(),
            depth: depth.to_string(),
        }
    }

    #[test]
    fn test_parse_longitude() {
        assert_eq!(parse_longitude("110.5234°E"), Some(110.5234));
        assert_eq!(parse_longitude("110.5234¬∞E"), Some(110.5234));
        assert_eq!(parse_longitude(" 110.5 "), Some(110.5));
        assert_eq!(parse_longitude("110.5°W"), None);
        assert_eq!(parse_longitude("abc"), None);
        assert_eq!(parse_longitude("NaN"), None);
        assert_eq!(parse_longitude(""), None);
    }

    #[test]
    fn test_parse_latitude() {
        assert_eq!(parse_latitude("6.9012°S"), Some(-6.9012));
        assert_eq!(parse_latitude("6.9012 s"), Some(-6.9012));
        assert_eq!(parse_latitude("6.9012°N"), Some(6.9012));
        assert_eq!(parse_latitude("6.9012¬∞S"), Some(-6.9012));
        assert_eq!(parse_latitude("x6.9"), None);
    }

    #[test]
    fn test_unmarked_latitude_assumed_north() {
        // Assumption carried over from field practice: no hemisphere letter means north.
        assert_eq!(parse_latitude("6.9012"), Some(6.9012));
        assert_eq!(parse_latitude("6.9012°"), Some(6.9012));
    }

    #[test]
    fn test_parse_timestamp() {
        let ts = parse_timestamp("01-Mar-23", "08:15:30", FORMAT).unwrap();
        let expected = NaiveDate::from_ymd_opt(2023, 3, 1)
            .unwrap()
            .and_hms_opt(8, 15, 30)
            .unwrap();
        assert_eq!(ts, expected);
        assert!(parse_timestamp("2023-03-01", "08:15:30", FORMAT).is_none());
    }

    #[test]
    fn test_clean_soundings_drops_and_sorts() {
        let rows = vec![
            row("01-Mar-23", "08:00:02", "110.51°E", "6.90°S", "12.4"),
            row("01-Mar-23", "08:00:00", "110.49°E", "6.90°S", "12.1"),
            row("bad-date", "08:00:01", "110.50°E", "6.90°S", "12.3"),
            row("01-Mar-23", "08:00:03", "110.52°W", "6.90°S", "x"),
            row("01-Mar-23", "08:00:01", "110.50°E", "6.90°S", "12.2"),
        ];

        let cleaned = clean_soundings(&rows, FORMAT).unwrap();
        assert_eq!(cleaned.points.len(), 3);
        assert_eq!(cleaned.dropped.rows, 2);
        assert_eq!(cleaned.dropped.timestamp, 1);
        assert_eq!(cleaned.dropped.longitude, 1);
        assert_eq!(cleaned.dropped.depth, 1);
        assert_eq!(cleaned.dropped.latitude, 0);

        assert!(cleaned
            .points
            .windows(2)
            .all(|w| w[0].timestamp <= w[1].timestamp));
        assert_eq!(cleaned.points[0].depth, 12.1);
        assert_eq!(cleaned.points[0].latitude, -6.90);
        assert!(cleaned.points.iter().all(|p| p.longitude.is_finite()
            && p.latitude.is_finite()
            && p.depth.is_finite()));
    }

    #[test]
    fn test_clean_soundings_sort_is_stable() {
        let rows = vec![
            row("01-Mar-23", "08:00:01", "110.0", "6.0S", "3.0"),
            row("01-Mar-23", "08:00:00", "110.0", "6.0S", "1.0"),
            row("01-Mar-23", "08:00:01", "110.0", "6.0S", "2.0"),
        ];
        let cleaned = clean_soundings(&rows, FORMAT).unwrap();
        let depths: Vec<f64> = cleaned.points.iter().map(|p| p.depth).collect();
        assert_eq!(depths, vec![1.0, 3.0, 2.0]);
    }

    #[test]
    fn test_clean_soundings_all_dropped() {
        let rows = vec![row("x", "y", "z", "w", "v")];
        assert_eq!(
            clean_soundings(&rows, FORMAT).unwrap_err(),
            CleaningError::NoSoundings { dropped: 1 }
        );
        assert_eq!(
            clean_soundings(&[], "  ").unwrap_err(),
            CleaningError::EmptyFormat
        );
    }

    #[test]
    fn test_clean_tide_sorts_and_dedups() {
        let rows = vec![
            RawTideRow {
                timestamp: "2023-03-01 09:00:00".to_string(),
                height: "1.4".to_string(),
            },
            RawTideRow {
                timestamp: "2023-03-01 08:00:00".to_string(),
                height: "1.2".to_string(),
            },
            RawTideRow {
                timestamp: "2023-03-01 08:00:00".to_string(),
                height: "9.9".to_string(),
            },
            RawTideRow {
                timestamp: "2023-03-01 10:00:00".to_string(),
                height: "-".to_string(),
            },
        ];

        let cleaned = clean_tide(&rows, "%Y-%m-%d %H:%M:%S").unwrap();
        assert_eq!(cleaned.invalid, 1);
        assert_eq!(cleaned.duplicates, 1);
        let heights: Vec<f64> = cleaned.samples.iter().map(|s| s.height).collect();
        assert_eq!(heights, vec![1.2, 1.4]);
    }

    #[test]
    fn test_clean_tide_all_invalid() {
        let rows = vec![RawTideRow {
            timestamp: "yesterday".to_string(),
            height: "1.0".to_string(),
        }];
        assert_eq!(
            clean_tide(&rows, "%Y-%m-%d %H:%M:%S").unwrap_err(),
            CleaningError::NoTide { dropped: 1 }
        );
    }
}
