//! Piecewise-linear tide interpolation.
//!
//! Sample and query instants are converted to integer nanoseconds since the
//! Unix epoch. The offset of a query inside its bracket is computed in `i64`
//! before conversion to `f64`, so no precision is lost on long records.
//!
//! Queries outside the sampled range take the nearest boundary height.

use chrono::NaiveDateTime;
use log::{debug, warn};
use thiserror::Error;

use crate::core::types::TideSample;

/// Errors that can occur when building an interpolator.
#[derive(Debug, Error, PartialEq)]
pub enum TideError {
    #[error("at least 2 tide samples are required, got {0}")]
    TooFewSamples(usize),

    #[error("tide samples must be strictly increasing in time (index {index})")]
    NotIncreasing { index: usize },

    #[error("timestamp {0} is outside the representable nanosecond range")]
    TimestampOutOfRange(NaiveDateTime),
}

/// Interpolated heights with counts of queries outside the sampled range.
#[derive(Debug, Clone, PartialEq)]
pub struct TideInterpolation {
    pub heights: Vec<f64>,
    /// Queries before the first sample, clamped to its height.
    pub before_range: usize,
    /// Queries after the last sample, clamped to its height.
    pub after_range: usize,
}

impl TideInterpolation {
    /// Number of queries answered by flat extrapolation.
    pub fn out_of_range(&self) -> usize {
        self.before_range + self.after_range
    }
}

/// Converts an instant to nanoseconds since the Unix epoch.
pub fn epoch_nanos(ts: NaiveDateTime) -> Result<i64, TideError> {
    ts.and_utc()
        .timestamp_nanos_opt()
        .ok_or(TideError::TimestampOutOfRange(ts))
}

/// Tide curve built from gauge samples.
#[derive(Debug, Clone)]
pub struct TideInterpolator {
    times: Vec<i64>,
    heights: Vec<f64>,
}

impl TideInterpolator {
    /// Build an interpolator from sorted samples.
    ///
    /// # Errors
    ///
    /// Returns an error for fewer than two samples, non-increasing timestamps,
    /// or timestamps outside the nanosecond epoch range.
    pub fn new(samples: &[TideSample]) -> Result<Self, TideError> {
        if samples.len() < 2 {
            return Err(TideError::TooFewSamples(samples.len()));
        }

        let times = samples
            .iter()
            .map(|s| epoch_nanos(s.timestamp))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(index) = times.windows(2).position(|w| w[1] <= w[0]) {
            return Err(TideError::NotIncreasing { index: index + 1 });
        }

        Ok(Self {
            times,
            heights: samples.iter().map(|s| s.height).collect(),
        })
    }

    /// First and last sample time in epoch nanoseconds.
    pub fn span(&self) -> (i64, i64) {
        (self.times[0], self.times[self.times.len() - 1])
    }

    /// Height at `t` nanoseconds since the epoch.
    pub fn height_at_nanos(&self, t: i64) -> f64 {
        let i = self.times.partition_point(|&s| s <= t);
        if i == 0 {
            return self.heights[0];
        }
        if i == self.times.len() {
            return self.heights[i - 1];
        }

        let (t0, t1) = (self.times[i - 1], self.times[i]);
        let (h0, h1) = (self.heights[i - 1], self.heights[i]);
        let frac = (t - t0) as f64 / (t1 - t0) as f64;
        h0 + frac * (h1 - h0)
    }

    /// Height at an instant.
    pub fn height_at(&self, ts: NaiveDateTime) -> Result<f64, TideError> {
        Ok(self.height_at_nanos(epoch_nanos(ts)?))
    }

    /// Sample the tide curve at every query instant.
    pub fn interpolate(&self, queries: &[NaiveDateTime]) -> Result<TideInterpolation, TideError> {
        let (first, last) = self.span();
        let mut heights = Vec::with_capacity(queries.len());
        let mut before_range = 0;
        let mut after_range = 0;

        for &ts in queries {
            let t = epoch_nanos(ts)?;
            if t < first {
                before_range += 1;
            } else if t > last {
                after_range += 1;
            }
            heights.push(self.height_at_nanos(t));
        }

        if before_range + after_range > 0 {
            warn!(
                "{} soundings lie outside the tide record ({} before, {} after); boundary heights used",
                before_range + after_range,
                before_range,
                after_range
            );
        }
        debug!("Interpolated tide at {} instants", heights.len());

        Ok(TideInterpolation {
            heights,
            before_range,
            after_range,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};

    fn t0() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 3, 1)
            .unwrap()
            .and_hms_opt(8, 0, 0)
            .unwrap()
    }

    fn samples() -> Vec<TideSample> {
        vec![
            TideSample { timestamp: t0(), height: 1.0 },
            TideSample { timestamp: t0() + Duration::hours(1), height: 2.0 },
            TideSample { timestamp: t0() + Duration::hours(3), height: 1.0 },
        ]
    }

    #[test]
    fn test_exact_at_samples() {
        let tide = TideInterpolator::new(&samples()).unwrap();
        for s in samples() {
            assert_eq!(tide.height_at(s.timestamp).unwrap(), s.height);
        }
    }

    #[test]
    fn test_linear_between_samples() {
        let tide = TideInterpolator::new(&samples()).unwrap();
        let mid = tide.height_at(t0() + Duration::minutes(30)).unwrap();
        assert!((mid - 1.5).abs() < 1e-12);
        let later = tide.height_at(t0() + Duration::minutes(90)).unwrap();
        assert!((later - 1.75).abs() < 1e-12);
    }

    #[test]
    fn test_flat_extrapolation() {
        let tide = TideInterpolator::new(&samples()).unwrap();
        let result = tide
            .interpolate(&[
                t0() - Duration::days(1),
                t0() + Duration::minutes(30),
                t0() + Duration::days(1),
            ])
            .unwrap();
        assert_eq!(result.heights[0], 1.0);
        assert_eq!(result.heights[2], 1.0);
        assert_eq!(result.before_range, 1);
        assert_eq!(result.after_range, 1);
        assert_eq!(result.out_of_range(), 2);
    }

    #[test]
    fn test_sub_second_resolution() {
        let start = t0();
        let tide = TideInterpolator::new(&[
            TideSample { timestamp: start, height: 0.0 },
            TideSample { timestamp: start + Duration::seconds(1), height: 1.0 },
        ])
        .unwrap();
        let h = tide.height_at(start + Duration::milliseconds(250)).unwrap();
        assert!((h - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_bad_samples() {
        assert_eq!(
            TideInterpolator::new(&samples()[..1]).unwrap_err(),
            TideError::TooFewSamples(1)
        );

        let mut unsorted = samples();
        unsorted.swap(1, 2);
        assert_eq!(
            TideInterpolator::new(&unsorted).unwrap_err(),
            TideError::NotIncreasing { index: 2 }
        );
    }
}
