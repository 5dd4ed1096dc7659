//! Per-point UTM zone detection and batched reprojection.
//!
//! Every point is assigned the zone its own longitude falls in, so survey lines
//! crossing a zone boundary are projected on the correct central meridian.
//! Points are then grouped by EPSG code and each group goes through a single
//! batched transform. Groups are independent and may run in parallel; point
//! order is preserved in the output.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, info, warn};
use rayon::prelude::*;
use thiserror::Error;

use crate::core::transforms::{TransformError, UtmTransformer};
use crate::core::types::{CorrectedPoint, Hemisphere, ProjectedPoint, UtmZone};

/// Errors that can occur during projection.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProjectionError {
    #[error("longitude {0} is outside [-180, 180)")]
    LongitudeOutOfRange(f64),

    #[error("latitude {0} is outside [-90, 90]")]
    LatitudeOutOfRange(f64),

    #[error(transparent)]
    Transform(#[from] TransformError),
}

/// UTM zone number for a longitude in `[-180, 180)`.
///
/// Longitudes of 180° and beyond are rejected rather than wrapped, since they
/// would otherwise map to a nonexistent zone 61.
pub fn utm_zone_number(longitude: f64) -> Result<u8, ProjectionError> {
    if !(-180.0..180.0).contains(&longitude) {
        return Err(ProjectionError::LongitudeOutOfRange(longitude));
    }
    let zone = ((longitude + 180.0) / 6.0).floor() as u8 + 1;
    Ok(zone.min(60))
}

/// UTM zone and hemisphere for a geographic position.
pub fn zone_for(longitude: f64, latitude: f64) -> Result<UtmZone, ProjectionError> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(ProjectionError::LatitudeOutOfRange(latitude));
    }
    let number = utm_zone_number(longitude)?;
    UtmZone::new(number, Hemisphere::from_latitude(latitude))
        .ok_or(ProjectionError::LongitudeOutOfRange(longitude))
}

/// Transformers built on first use and reused for the rest of a run.
#[derive(Debug, Default)]
pub struct TransformerCache {
    transformers: HashMap<u32, UtmTransformer>,
}

impl TransformerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the transformer for `epsg`, building it if needed.
    pub fn get_or_create(&mut self, epsg: u32) -> Result<&UtmTransformer, TransformError> {
        if !self.transformers.contains_key(&epsg) {
            let transformer = UtmTransformer::from_epsg(epsg)?;
            debug!("Built transformer EPSG:4326 -> EPSG:{}", epsg);
            self.transformers.insert(epsg, transformer);
        }
        Ok(&self.transformers[&epsg])
    }

    /// Number of distinct transformers built so far.
    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }
}

/// Behaviour of the projection stage.
#[derive(Debug, Clone, Copy)]
pub struct ProjectionOptions {
    /// Drop the points of a failing zone instead of aborting.
    pub isolate_zone_failures: bool,
    /// Transform zone groups on the rayon thread pool.
    pub parallel: bool,
}

impl Default for ProjectionOptions {
    fn default() -> Self {
        Self {
            isolate_zone_failures: false,
            parallel: true,
        }
    }
}

/// A group of points that could not be projected.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneFailure {
    /// EPSG code of the group, or `None` when no zone could be assigned.
    pub epsg: Option<u32>,
    pub points: usize,
    pub error: ProjectionError,
}

/// Result of projecting a corrected series.
#[derive(Debug, Clone)]
pub struct Projection {
    pub points: Vec<ProjectedPoint>,
    /// Distinct zone labels, ordered by zone number then hemisphere.
    pub zone_labels: Vec<String>,
    /// Groups dropped when failures are isolated.
    pub failures: Vec<ZoneFailure>,
}

/// Points of one EPSG code awaiting transformation.
struct ZoneBatch {
    transformer: UtmTransformer,
    indices: Vec<usize>,
    lonlat: Vec<(f64, f64)>,
}

/// Project corrected points into their own UTM zones.
///
/// # Errors
///
/// Unless `isolate_zone_failures` is set, the first point without a valid zone
/// or the first failing zone transform aborts the whole projection.
pub fn project_points(
    points: &[CorrectedPoint],
    options: &ProjectionOptions,
    cache: &mut TransformerCache,
) -> Result<Projection, ProjectionError> {
    let mut failures = Vec::new();
    let mut groups: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    let mut unassigned: Option<(usize, ProjectionError)> = None;

    for (i, p) in points.iter().enumerate() {
        match zone_for(p.sounding.longitude, p.sounding.latitude) {
            Ok(zone) => groups.entry(zone.epsg()).or_default().push(i),
            Err(e) if options.isolate_zone_failures => {
                let entry = unassigned.get_or_insert((0, e));
                entry.0 += 1;
            }
            Err(e) => return Err(e),
        }
    }

    if let Some((count, error)) = unassigned {
        warn!("{} points have no valid UTM zone: {}", count, error);
        failures.push(ZoneFailure {
            epsg: None,
            points: count,
            error,
        });
    }

    let mut batches = Vec::with_capacity(groups.len());
    for (epsg, indices) in groups {
        let transformer = match cache.get_or_create(epsg) {
            Ok(t) => *t,
            Err(e) if options.isolate_zone_failures => {
                warn!("Skipping EPSG:{} ({} points): {}", epsg, indices.len(), e);
                failures.push(ZoneFailure {
                    epsg: Some(epsg),
                    points: indices.len(),
                    error: e.into(),
                });
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        let lonlat = indices
            .iter()
            .map(|&i| (points[i].sounding.longitude, points[i].sounding.latitude))
            .collect();
        batches.push(ZoneBatch {
            transformer,
            indices,
            lonlat,
        });
    }

    let transform = |batch: &ZoneBatch| batch.transformer.transform_batch(&batch.lonlat);
    let results: Vec<Result<Vec<(f64, f64)>, TransformError>> = if options.parallel {
        batches.par_iter().map(transform).collect()
    } else {
        batches.iter().map(transform).collect()
    };

    let mut projected: Vec<Option<ProjectedPoint>> = vec![None; points.len()];
    let mut zones = BTreeSet::new();

    for (batch, result) in batches.iter().zip(results) {
        let zone = batch.transformer.zone();
        match result {
            Ok(xy) => {
                debug!("Projected {} points in zone {}", xy.len(), zone);
                zones.insert(zone);
                for (&i, (x, y)) in batch.indices.iter().zip(xy) {
                    projected[i] = Some(ProjectedPoint {
                        corrected: points[i],
                        zone,
                        x,
                        y,
                    });
                }
            }
            Err(e) if options.isolate_zone_failures => {
                warn!("Skipping zone {} ({} points): {}", zone, batch.indices.len(), e);
                failures.push(ZoneFailure {
                    epsg: Some(zone.epsg()),
                    points: batch.indices.len(),
                    error: e.into(),
                });
            }
            Err(e) => return Err(e.into()),
        }
    }

    let zone_labels: Vec<String> = zones.iter().map(UtmZone::label).collect();
    info!("Found {} UTM zone(s): {}", zone_labels.len(), zone_labels.join(", "));

    Ok(Projection {
        points: projected.into_iter().flatten().collect(),
        zone_labels,
        failures,
    })
}
