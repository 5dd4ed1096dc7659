//! Data types flowing through the bathymetry pipeline.
//!
//! Each stage consumes one of these collections and produces a new one:
//! `SoundingPoint` → `CorrectedPoint` → `ProjectedPoint` → `OutputPartition`.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A cleaned echosounder sounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundingPoint {
    /// Acquisition time.
    pub timestamp: NaiveDateTime,
    /// Longitude in degrees, east-positive.
    pub longitude: f64,
    /// Latitude in degrees, north-positive.
    pub latitude: f64,
    /// Sensor depth reading in meters, positive down.
    pub depth: f64,
}

/// A tide gauge observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TideSample {
    pub timestamp: NaiveDateTime,
    /// Water level in meters, in the same frame as the datum set.
    pub height: f64,
}

/// The three vertical tidal datums a survey is reduced to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VerticalDatumSet {
    pub hws: f64,
    pub msl: f64,
    pub lws: f64,
}

impl VerticalDatumSet {
    /// Creates a datum set, returning `None` if any level is not finite.
    pub fn new(hws: f64, msl: f64, lws: f64) -> Option<Self> {
        if hws.is_finite() && msl.is_finite() && lws.is_finite() {
            Some(Self { hws, msl, lws })
        } else {
            None
        }
    }

    /// Returns the reference height of a single datum.
    #[inline]
    pub fn level(&self, datum: Datum) -> f64 {
        match datum {
            Datum::Lws => self.lws,
            Datum::Msl => self.msl,
            Datum::Hws => self.hws,
        }
    }
}

/// Vertical datum selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Datum {
    Lws,
    Msl,
    Hws,
}

impl Datum {
    /// All datums in output order.
    pub const ALL: [Datum; 3] = [Datum::Lws, Datum::Msl, Datum::Hws];

    /// Suffix used in output file names.
    pub fn suffix(self) -> &'static str {
        match self {
            Datum::Lws => "LWS",
            Datum::Msl => "MSL",
            Datum::Hws => "HWS",
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Depth reduced to each of the three datums.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReducedDepths {
    pub lws: f64,
    pub msl: f64,
    pub hws: f64,
}

impl ReducedDepths {
    #[inline]
    pub fn get(&self, datum: Datum) -> f64 {
        match datum {
            Datum::Lws => self.lws,
            Datum::Msl => self.msl,
            Datum::Hws => self.hws,
        }
    }

    /// True when all three reduced depths are usable numbers.
    pub fn is_finite(&self) -> bool {
        self.lws.is_finite() && self.msl.is_finite() && self.hws.is_finite()
    }
}

/// A sounding with its interpolated tide and datum-reduced depths.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectedPoint {
    pub sounding: SoundingPoint,
    pub tide_interp: f64,
    pub reduced_depth: ReducedDepths,
}

/// Hemisphere of a UTM zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Hemisphere {
    North,
    South,
}

impl Hemisphere {
    /// Latitude zero belongs to the northern hemisphere.
    #[inline]
    pub fn from_latitude(latitude: f64) -> Self {
        if latitude >= 0.0 {
            Hemisphere::North
        } else {
            Hemisphere::South
        }
    }

    pub fn letter(self) -> char {
        match self {
            Hemisphere::North => 'N',
            Hemisphere::South => 'S',
        }
    }
}

/// A WGS84 UTM zone (1-60) with hemisphere.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct UtmZone {
    number: u8,
    hemisphere: Hemisphere,
}

impl UtmZone {
    /// Creates a zone, returning `None` outside 1..=60.
    pub fn new(number: u8, hemisphere: Hemisphere) -> Option<Self> {
        if (1..=60).contains(&number) {
            Some(Self { number, hemisphere })
        } else {
            None
        }
    }

    /// Recovers the zone from a WGS84 / UTM EPSG code (326xx or 327xx).
    pub fn from_epsg(epsg: u32) -> Option<Self> {
        let (hemisphere, number) = match epsg {
            32601..=32660 => (Hemisphere::North, epsg - 32600),
            32701..=32760 => (Hemisphere::South, epsg - 32700),
            _ => return None,
        };
        Self::new(number as u8, hemisphere)
    }

    #[inline]
    pub fn number(&self) -> u8 {
        self.number
    }

    #[inline]
    pub fn hemisphere(&self) -> Hemisphere {
        self.hemisphere
    }

    /// EPSG code of the WGS84 / UTM CRS for this zone.
    pub fn epsg(&self) -> u32 {
        let base = match self.hemisphere {
            Hemisphere::North => 32600,
            Hemisphere::South => 32700,
        };
        base + u32::from(self.number)
    }

    /// Central meridian in degrees.
    pub fn central_meridian(&self) -> f64 {
        f64::from(self.number) * 6.0 - 183.0
    }

    /// Zone label such as `49S`, with no separator.
    pub fn label(&self) -> String {
        format!("{}{}", self.number, self.hemisphere.letter())
    }
}

impl fmt::Display for UtmZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.number, self.hemisphere.letter())
    }
}

/// A corrected sounding placed in its UTM zone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedPoint {
    pub corrected: CorrectedPoint,
    pub zone: UtmZone,
    /// Easting in meters.
    pub x: f64,
    /// Northing in meters.
    pub y: f64,
}

impl ProjectedPoint {
    #[inline]
    pub fn epsg(&self) -> u32 {
        self.zone.epsg()
    }
}

/// XYZ triples for one (zone, datum) output file.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputPartition {
    pub zone_label: String,
    pub datum: Datum,
    pub points: Vec<[f64; 3]>,
}

impl OutputPartition {
    /// File name following `<prefix>_<zone>_<datum>.txt`.
    pub fn file_name(&self, prefix: &str) -> String {
        format!("{}_{}_{}.txt", prefix, self.zone_label, self.datum.suffix())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_epsg_codes() {
        let north = UtmZone::new(48, Hemisphere::North).unwrap();
        let south = UtmZone::new(48, Hemisphere::South).unwrap();
        assert_eq!(north.epsg(), 32648);
        assert_eq!(south.epsg(), 32748);
        assert_eq!(UtmZone::from_epsg(32748), Some(south));
        assert_eq!(UtmZone::from_epsg(32661), None);
        assert_eq!(UtmZone::from_epsg(4326), None);
    }

    #[test]
    fn test_zone_label_has_no_separator() {
        let zone = UtmZone::new(49, Hemisphere::South).unwrap();
        assert_eq!(zone.label(), "49S");
        assert_eq!(zone.to_string(), "49S");
    }

    #[test]
    fn test_zone_bounds() {
        assert!(UtmZone::new(0, Hemisphere::North).is_none());
        assert!(UtmZone::new(61, Hemisphere::North).is_none());
        assert_eq!(UtmZone::new(1, Hemisphere::North).unwrap().central_meridian(), -177.0);
        assert_eq!(UtmZone::new(60, Hemisphere::North).unwrap().central_meridian(), 177.0);
    }

    #[test]
    fn test_equator_is_north() {
        assert_eq!(Hemisphere::from_latitude(0.0), Hemisphere::North);
        assert_eq!(Hemisphere::from_latitude(-1e-9), Hemisphere::South);
    }

    #[test]
    fn test_datum_set_rejects_nan() {
        assert!(VerticalDatumSet::new(2.9, f64::NAN, 0.27).is_none());
        let set = VerticalDatumSet::new(2.9, 1.59, 0.27).unwrap();
        assert_eq!(set.level(Datum::Hws), 2.9);
        assert_eq!(set.level(Datum::Lws), 0.27);
    }

    #[test]
    fn test_partition_file_name() {
        let partition = OutputPartition {
            zone_label: "49S".to_string(),
            datum: Datum::Msl,
            points: vec![[1.0, 2.0, 3.0]],
        };
        assert_eq!(partition.file_name("Batimetri"), "Batimetri_49S_MSL.txt");
    }
}
