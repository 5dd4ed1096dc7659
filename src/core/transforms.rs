//! Geographic to UTM coordinate transformations.
//!
//! Implements the WGS84 transverse Mercator projection using Krüger's series
//! to sixth order in the third flattening, which keeps forward/inverse
//! round-trips well below a micro-degree across a whole 6° zone.
//!
//! # Example
//!
//! ```
//! use sbes_pipeline::core::transforms::{CoordinateProjection, UtmTransformer};
//!
//! let utm = UtmTransformer::from_epsg(32748).unwrap();
//! let (x, y) = utm.forward(105.0, -1.0);
//! let (lon, lat) = utm.inverse(x, y);
//! assert!((lon - 105.0).abs() < 1e-9 && (lat + 1.0).abs() < 1e-9);
//! ```

use thiserror::Error;

use super::types::{Hemisphere, UtmZone};

/// WGS84 semi-major axis in meters.
pub const WGS84_A: f64 = 6_378_137.0;
/// WGS84 flattening.
pub const WGS84_F: f64 = 1.0 / 298.257_223_563;

/// UTM scale factor on the central meridian.
const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

const MAX_NEWTON_ITERATIONS: usize = 20;

/// Errors that can occur when building or applying a transform.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("unsupported EPSG code {0}: expected a WGS84 / UTM zone (32601-32660, 32701-32760)")]
    UnsupportedEpsg(u32),

    #[error("transform of ({lon}, {lat}) produced a non-finite result in EPSG:{epsg}")]
    NonFinite { epsg: u32, lon: f64, lat: f64 },
}

/// Trait for map projections with longitude/latitude axis order.
pub trait CoordinateProjection {
    /// Convert geographic (lon, lat) in degrees to projected (x, y) in meters.
    fn forward(&self, lon: f64, lat: f64) -> (f64, f64);

    /// Convert projected (x, y) back to geographic (lon, lat).
    fn inverse(&self, x: f64, y: f64) -> (f64, f64);
}

/// Ellipsoidal transverse Mercator projection.
#[derive(Debug, Clone, Copy)]
pub struct TransverseMercator {
    central_meridian: f64,
    scale_factor: f64,
    false_easting: f64,
    false_northing: f64,
    /// First eccentricity.
    e: f64,
    /// Rectifying radius times the scale factor.
    k0_a: f64,
    alpha: [f64; 6],
    beta: [f64; 6],
}

impl TransverseMercator {
    /// Create a WGS84 transverse Mercator projection.
    pub fn wgs84(
        central_meridian: f64,
        scale_factor: f64,
        false_easting: f64,
        false_northing: f64,
    ) -> Self {
        let f = WGS84_F;
        let n = f / (2.0 - f);
        let n2 = n * n;
        let n3 = n2 * n;
        let n4 = n3 * n;
        let n5 = n4 * n;
        let n6 = n5 * n;

        let rectifying_radius =
            WGS84_A / (1.0 + n) * (1.0 + n2 / 4.0 + n4 / 64.0 + n6 / 256.0);

        let alpha = [
            n / 2.0 - 2.0 * n2 / 3.0 + 5.0 * n3 / 16.0 + 41.0 * n4 / 180.0
                - 127.0 * n5 / 288.0
                + 7891.0 * n6 / 37800.0,
            13.0 * n2 / 48.0 - 3.0 * n3 / 5.0 + 557.0 * n4 / 1440.0 + 281.0 * n5 / 630.0
                - 1_983_433.0 * n6 / 1_935_360.0,
            61.0 * n3 / 240.0 - 103.0 * n4 / 140.0
                + 15061.0 * n5 / 26880.0
                + 167_603.0 * n6 / 181_440.0,
            49561.0 * n4 / 161_280.0 - 179.0 * n5 / 168.0 + 6_601_661.0 * n6 / 7_257_600.0,
            34729.0 * n5 / 80640.0 - 3_418_889.0 * n6 / 1_995_840.0,
            212_378_941.0 * n6 / 319_334_400.0,
        ];

        let beta = [
            n / 2.0 - 2.0 * n2 / 3.0 + 37.0 * n3 / 96.0 - n4 / 360.0 - 81.0 * n5 / 512.0
                + 96199.0 * n6 / 604_800.0,
            n2 / 48.0 + n3 / 15.0 - 437.0 * n4 / 1440.0 + 46.0 * n5 / 105.0
                - 1_118_711.0 * n6 / 3_870_720.0,
            17.0 * n3 / 480.0 - 37.0 * n4 / 840.0 - 209.0 * n5 / 4480.0
                + 5569.0 * n6 / 90720.0,
            4397.0 * n4 / 161_280.0 - 11.0 * n5 / 504.0 - 830_251.0 * n6 / 7_257_600.0,
            4583.0 * n5 / 161_280.0 - 108_847.0 * n6 / 3_991_680.0,
            20_648_693.0 * n6 / 638_668_800.0,
        ];

        Self {
            central_meridian,
            scale_factor,
            false_easting,
            false_northing,
            e: (f * (2.0 - f)).sqrt(),
            k0_a: scale_factor * rectifying_radius,
            alpha,
            beta,
        }
    }

    /// Get the central meridian in degrees.
    pub fn central_meridian(&self) -> f64 {
        self.central_meridian
    }

    /// Get the scale factor on the central meridian.
    pub fn scale_factor(&self) -> f64 {
        self.scale_factor
    }

    /// Conformal latitude tangent from geodetic latitude tangent.
    #[inline]
    fn conformal_tan(&self, tau: f64) -> f64 {
        let e = self.e;
        let sigma = (e * (e * tau / (1.0 + tau * tau).sqrt()).atanh()).sinh();
        tau * (1.0 + sigma * sigma).sqrt() - sigma * (1.0 + tau * tau).sqrt()
    }
}

impl CoordinateProjection for TransverseMercator {
    fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        let phi = lat.to_radians();
        let lambda = (lon - self.central_meridian).to_radians();

        let tau_p = self.conformal_tan(phi.tan());
        let cos_l = lambda.cos();
        let xi_p = tau_p.atan2(cos_l);
        let eta_p = (lambda.sin() / (tau_p * tau_p + cos_l * cos_l).sqrt()).asinh();

        let mut xi = xi_p;
        let mut eta = eta_p;
        for (j, a) in self.alpha.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi += a * (k * xi_p).sin() * (k * eta_p).cosh();
            eta += a * (k * xi_p).cos() * (k * eta_p).sinh();
        }

        (
            self.false_easting + self.k0_a * eta,
            self.false_northing + self.k0_a * xi,
        )
    }

    fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        let eta = (x - self.false_easting) / self.k0_a;
        let xi = (y - self.false_northing) / self.k0_a;

        let mut xi_p = xi;
        let mut eta_p = eta;
        for (j, b) in self.beta.iter().enumerate() {
            let k = 2.0 * (j + 1) as f64;
            xi_p -= b * (k * xi).sin() * (k * eta).cosh();
            eta_p -= b * (k * xi).cos() * (k * eta).sinh();
        }

        let sinh_eta = eta_p.sinh();
        let sin_xi = xi_p.sin();
        let cos_xi = xi_p.cos();
        let tau_p = sin_xi / (sinh_eta * sinh_eta + cos_xi * cos_xi).sqrt();

        // Newton iteration for the geodetic latitude tangent
        let one_minus_e2 = 1.0 - self.e * self.e;
        let mut tau = tau_p;
        for _ in 0..MAX_NEWTON_ITERATIONS {
            let tau_i_p = self.conformal_tan(tau);
            let delta = (tau_p - tau_i_p) / (1.0 + tau_i_p * tau_i_p).sqrt()
                * (1.0 + one_minus_e2 * tau * tau)
                / (one_minus_e2 * (1.0 + tau * tau).sqrt());
            tau += delta;
            if delta.abs() < 1e-14 {
                break;
            }
        }

        let lat = tau.atan().to_degrees();
        let lon = self.central_meridian + sinh_eta.atan2(cos_xi).to_degrees();
        (lon, lat)
    }
}

/// WGS84 / UTM transform for one EPSG code.
#[derive(Debug, Clone, Copy)]
pub struct UtmTransformer {
    zone: UtmZone,
    projection: TransverseMercator,
}

impl UtmTransformer {
    /// Build the transform for a WGS84 / UTM zone.
    pub fn for_zone(zone: UtmZone) -> Self {
        let false_northing = match zone.hemisphere() {
            Hemisphere::North => 0.0,
            Hemisphere::South => UTM_FALSE_NORTHING_SOUTH,
        };
        Self {
            zone,
            projection: TransverseMercator::wgs84(
                zone.central_meridian(),
                UTM_K0,
                UTM_FALSE_EASTING,
                false_northing,
            ),
        }
    }

    /// Build the transform from an EPSG code such as 32748.
    pub fn from_epsg(epsg: u32) -> Result<Self, TransformError> {
        UtmZone::from_epsg(epsg)
            .map(Self::for_zone)
            .ok_or(TransformError::UnsupportedEpsg(epsg))
    }

    pub fn zone(&self) -> UtmZone {
        self.zone
    }

    pub fn epsg(&self) -> u32 {
        self.zone.epsg()
    }

    /// Transform a batch of (lon, lat) pairs, failing on the first non-finite result.
    pub fn transform_batch(&self, lonlat: &[(f64, f64)]) -> Result<Vec<(f64, f64)>, TransformError> {
        let mut out = Vec::with_capacity(lonlat.len());
        for &(lon, lat) in lonlat {
            let (x, y) = self.forward(lon, lat);
            if !x.is_finite() || !y.is_finite() {
                return Err(TransformError::NonFinite {
                    epsg: self.epsg(),
                    lon,
                    lat,
                });
            }
            out.push((x, y));
        }
        Ok(out)
    }
}

impl CoordinateProjection for UtmTransformer {
    #[inline]
    fn forward(&self, lon: f64, lat: f64) -> (f64, f64) {
        self.projection.forward(lon, lat)
    }

    #[inline]
    fn inverse(&self, x: f64, y: f64) -> (f64, f64) {
        self.projection.inverse(x, y)
    }
}
