//! Grouping of projected points into per-zone, per-datum XYZ tables.

use std::collections::HashMap;

use crate::core::types::{Datum, OutputPartition, ProjectedPoint};

/// Split projected points into one partition per (zone, datum).
///
/// Zones appear in order of first occurrence; within a zone the datums are
/// ordered LWS, MSL, HWS. Point order inside each partition follows the input.
/// Only zones with at least one point produce partitions.
pub fn partition_by_zone(points: &[ProjectedPoint]) -> Vec<OutputPartition> {
    let mut order: Vec<String> = Vec::new();
    let mut by_zone: HashMap<String, Vec<&ProjectedPoint>> = HashMap::new();

    for p in points {
        let label = p.zone.label();
        by_zone
            .entry(label.clone())
            .or_insert_with(|| {
                order.push(label);
                Vec::new()
            })
            .push(p);
    }

    let mut partitions = Vec::with_capacity(order.len() * Datum::ALL.len());
    for label in order {
        let zone_points = &by_zone[&label];
        for datum in Datum::ALL {
            partitions.push(OutputPartition {
                zone_label: label.clone(),
                datum,
                points: zone_points
                    .iter()
                    .map(|p| [p.x, p.y, p.corrected.reduced_depth.get(datum)])
                    .collect(),
            });
        }
    }

    partitions
}
