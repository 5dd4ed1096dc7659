//! Depth outlier detection with an interquartile-range fence.
//!
//! Quartiles use linear interpolation between order statistics, the same rule
//! for every sample size. Points outside `[Q1 - k·IQR, Q3 + k·IQR]` are
//! outliers; the fence itself is inclusive.

use log::info;
use thiserror::Error;

use crate::config::OutlierPolicy;
use crate::core::types::SoundingPoint;

/// Conventional Tukey fence multiplier.
pub const DEFAULT_FENCE_MULTIPLIER: f64 = 1.5;

/// Errors that can occur during outlier detection.
#[derive(Debug, Error, PartialEq)]
pub enum FilterError {
    #[error("cannot compute quartiles of an empty series")]
    EmptySeries,

    #[error("fence multiplier must be finite and non-negative, got {0}")]
    InvalidMultiplier(f64),
}

/// Outcome of the outlier step, kept for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutlierAction {
    /// Outliers were found and dropped.
    Remove,
    /// Outliers were found and kept.
    Keep,
    /// No outliers were found; data passed through.
    None,
}

impl OutlierAction {
    /// Resolve the user's policy against the number of detected outliers.
    pub fn resolve(policy: OutlierPolicy, outlier_count: usize) -> Self {
        if outlier_count == 0 {
            return OutlierAction::None;
        }
        match policy {
            OutlierPolicy::Remove => OutlierAction::Remove,
            OutlierPolicy::Keep => OutlierAction::Keep,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OutlierAction::Remove => "remove",
            OutlierAction::Keep => "keep",
            OutlierAction::None => "none",
        }
    }
}

/// Interquartile-range fence over depth values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrFence {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrFence {
    /// Compute the fence over a set of values.
    pub fn from_values(values: &[f64], multiplier: f64) -> Result<Self, FilterError> {
        if values.is_empty() {
            return Err(FilterError::EmptySeries);
        }
        if !multiplier.is_finite() || multiplier < 0.0 {
            return Err(FilterError::InvalidMultiplier(multiplier));
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let q1 = quantile_sorted(&sorted, 0.25);
        let q3 = quantile_sorted(&sorted, 0.75);
        let iqr = q3 - q1;

        Ok(Self {
            q1,
            q3,
            iqr,
            lower: q1 - multiplier * iqr,
            upper: q3 + multiplier * iqr,
        })
    }

    /// True if `value` lies inside the fence, bounds included.
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        value >= self.lower && value <= self.upper
    }
}

/// Quantile of sorted data with linear interpolation between order statistics.
///
/// `sorted` must be non-empty and ascending; `q` is in `[0, 1]`.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    debug_assert!(!sorted.is_empty());
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    sorted[lo] + frac * (sorted[hi] - sorted[lo])
}

/// Fence and outlier positions for a sounding series.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlierReport {
    pub fence: IqrFence,
    /// Indices into the analysed series, ascending.
    pub outlier_indices: Vec<usize>,
}

impl OutlierReport {
    pub fn outlier_count(&self) -> usize {
        self.outlier_indices.len()
    }

    /// The first `limit` outliers, for previews.
    pub fn preview<'a>(&self, points: &'a [SoundingPoint], limit: usize) -> Vec<&'a SoundingPoint> {
        self.outlier_indices
            .iter()
            .take(limit)
            .filter_map(|&i| points.get(i))
            .collect()
    }
}

/// Compute the IQR fence over depths and flag points outside it.
pub fn detect_outliers(points: &[SoundingPoint], multiplier: f64) -> Result<OutlierReport, FilterError> {
    let depths: Vec<f64> = points.iter().map(|p| p.depth).collect();
    let fence = IqrFence::from_values(&depths, multiplier)?;

    let outlier_indices: Vec<usize> = depths
        .iter()
        .enumerate()
        .filter(|&(_, &d)| !fence.contains(d))
        .map(|(i, _)| i)
        .collect();

    info!(
        "IQR fence [{:.3}, {:.3}] (Q1 {:.3}, Q3 {:.3}): {} outliers",
        fence.lower,
        fence.upper,
        fence.q1,
        fence.q3,
        outlier_indices.len()
    );

    Ok(OutlierReport {
        fence,
        outlier_indices,
    })
}

/// Apply an outlier action, returning a new series.
///
/// `Remove` keeps only in-fence points; `Keep` and `None` return every point.
/// Surviving points keep their relative order.
pub fn apply_outlier_action(
    points: &[SoundingPoint],
    fence: &IqrFence,
    action: OutlierAction,
) -> Vec<SoundingPoint> {
    match action {
        OutlierAction::Remove => points
            .iter()
            .filter(|p| fence.contains(p.depth))
            .copied()
            .collect(),
        OutlierAction::Keep | OutlierAction::None => points.to_vec(),
    }
}

/// Detect outliers and apply the policy in one step.
pub fn filter_outliers(
    points: &[SoundingPoint],
    policy: OutlierPolicy,
    multiplier: f64,
) -> Result<(Vec<SoundingPoint>, OutlierReport, OutlierAction), FilterError> {
    let report = detect_outliers(points, multiplier)?;
    let action = OutlierAction::resolve(policy, report.outlier_count());
    let filtered = apply_outlier_action(points, &report.fence, action);

    info!(
        "Outlier action '{}': {} of {} soundings retained",
        action.as_str(),
        filtered.len(),
        points.len()
    );

    Ok((filtered, report, action))
}
