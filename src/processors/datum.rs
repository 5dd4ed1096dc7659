//! Reduction of soundings to tidal datums.
//!
//! For each datum level `d` and interpolated tide `t` the reduced depth is
//! `-(depth + (d - t))`. A non-finite tide propagates as NaN into all three
//! reduced depths; it is never replaced by zero.

use crate::core::types::{CorrectedPoint, Datum, ReducedDepths, SoundingPoint, VerticalDatumSet};

/// Reduce one depth reading to a single datum level.
#[inline]
pub fn reduce_depth(depth: f64, datum_level: f64, tide: f64) -> f64 {
    -(depth + (datum_level - tide))
}

/// Reduce one depth reading to all three datums.
pub fn reduce_to_datums(depth: f64, tide: f64, datums: &VerticalDatumSet) -> ReducedDepths {
    ReducedDepths {
        lws: reduce_depth(depth, datums.level(Datum::Lws), tide),
        msl: reduce_depth(depth, datums.level(Datum::Msl), tide),
        hws: reduce_depth(depth, datums.level(Datum::Hws), tide),
    }
}

/// Apply the tide correction to every sounding.
///
/// `tides` must hold one interpolated height per sounding, in the same order.
pub fn correct_soundings(
    points: &[SoundingPoint],
    tides: &[f64],
    datums: &VerticalDatumSet,
) -> Vec<CorrectedPoint> {
    debug_assert_eq!(points.len(), tides.len(), "one tide height per sounding");

    points
        .iter()
        .zip(tides)
        .map(|(p, &tide)| CorrectedPoint {
            sounding: *p,
            tide_interp: tide,
            reduced_depth: reduce_to_datums(p.depth, tide, datums),
        })
        .collect()
}

/// Number of corrected points whose reduced depths are not all finite.
pub fn count_invalid(points: &[CorrectedPoint]) -> usize {
    points
        .iter()
        .filter(|p| !p.reduced_depth.is_finite())
        .count()
}
