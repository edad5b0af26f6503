//! Geofence math
//!
//! Pure functions over latitude/longitude pairs: great-circle distance,
//! radius tests, geohash encoding, and distance formatting.

use serde::{Deserialize, Serialize};

/// Mean Earth radius used by the Haversine formula, in meters
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Check-in radius applied when a school does not set its own
pub const DEFAULT_CHECK_IN_RADIUS_METERS: u32 = 150;

const GEOHASH_BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Default geohash length (about 4.8m x 4.8m cells)
pub const DEFAULT_GEOHASH_PRECISION: usize = 9;

/// A point on the Earth's surface, in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// True when both coordinates are finite and inside their ranges
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    pub fn distance_to(&self, other: &GeoPoint) -> f64 {
        distance_meters(self, other)
    }

    pub fn geohash(&self, precision: usize) -> String {
        geohash(self.latitude, self.longitude, precision)
    }
}

/// Great-circle distance between two points via the Haversine formula.
///
/// Symmetric, zero for identical points, and takes the short way across the
/// antimeridian.
pub fn distance_meters(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let delta_phi = (b.latitude - a.latitude).to_radians();
    let delta_lambda = (b.longitude - a.longitude).to_radians();

    let h = (delta_phi / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lambda / 2.0).sin().powi(2);
    // Rounding can push h a hair outside [0, 1] for antipodal points
    let h = h.clamp(0.0, 1.0);

    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_METERS * c
}

/// Inclusive radius test: a distance equal to the radius is inside
pub fn is_within_radius(distance: f64, radius: f64) -> bool {
    distance <= radius
}

/// Outcome of testing a user position against a school geofence
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RadiusCheck {
    pub is_within: bool,
    /// Distance rounded to the nearest meter
    pub distance_meters: i64,
}

/// Test a position against a school location and radius.
///
/// Containment is decided on the unrounded distance.
pub fn is_within_school_radius(user: &GeoPoint, school: &GeoPoint, radius_meters: f64) -> RadiusCheck {
    let distance = distance_meters(user, school);
    RadiusCheck {
        is_within: is_within_radius(distance, radius_meters),
        distance_meters: distance.round() as i64,
    }
}

/// Encode a position as a base-32 geohash of `precision` characters.
///
/// Longitude and latitude bits are interleaved starting with longitude.
/// Nearby points share longer prefixes.
pub fn geohash(latitude: f64, longitude: f64, precision: usize) -> String {
    let mut lat_range = (-90.0_f64, 90.0_f64);
    let mut lon_range = (-180.0_f64, 180.0_f64);
    let mut hash = String::with_capacity(precision);
    let mut even_bit = true;
    let mut bit = 0;
    let mut ch = 0usize;

    while hash.len() < precision {
        let (range, value) = if even_bit {
            (&mut lon_range, longitude)
        } else {
            (&mut lat_range, latitude)
        };

        let mid = (range.0 + range.1) / 2.0;
        if value >= mid {
            ch |= 1 << (4 - bit);
            range.0 = mid;
        } else {
            range.1 = mid;
        }

        even_bit = !even_bit;
        if bit < 4 {
            bit += 1;
        } else {
            hash.push(char::from(GEOHASH_BASE32[ch]));
            bit = 0;
            ch = 0;
        }
    }

    hash
}

/// Format a distance for display: `"87m"` below a kilometer, `"1.2km"` above
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{}m", meters.round() as i64)
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NYC: GeoPoint = GeoPoint::new(40.7128, -74.0060);
    const LA: GeoPoint = GeoPoint::new(34.0522, -118.2437);

    #[test]
    fn test_distance_new_york_to_los_angeles() {
        let d = distance_meters(&NYC, &LA);
        // ~3936 km
        assert!((d - 3_935_746.0).abs() < 5_000.0, "got {d}");
    }

    #[test]
    fn test_distance_identity() {
        assert_eq!(distance_meters(&NYC, &NYC), 0.0);
        let pole = GeoPoint::new(90.0, 0.0);
        assert_eq!(distance_meters(&pole, &pole), 0.0);
    }

    #[test]
    fn test_distance_symmetry() {
        let points = [
            NYC,
            LA,
            GeoPoint::new(-33.8688, 151.2093),
            GeoPoint::new(90.0, 0.0),
            GeoPoint::new(-90.0, 45.0),
            GeoPoint::new(0.0, 179.9),
        ];
        for a in &points {
            for b in &points {
                let ab = distance_meters(a, b);
                let ba = distance_meters(b, a);
                assert!((ab - ba).abs() < 1e-6, "{a:?} <-> {b:?}: {ab} vs {ba}");
            }
        }
    }

    #[test]
    fn test_distance_across_antimeridian() {
        let east = GeoPoint::new(0.0, 179.9);
        let west = GeoPoint::new(0.0, -179.9);
        let d = distance_meters(&east, &west);
        assert!(d < 30_000.0, "got {d}");
        assert!(d > 20_000.0, "got {d}");
    }

    #[test]
    fn test_distance_grows_with_separation() {
        let mut last = 0.0;
        for step in 1..=18 {
            let d = distance_meters(&GeoPoint::new(0.0, 0.0), &GeoPoint::new(0.0, step as f64 * 10.0));
            assert!(d > last);
            last = d;
        }
    }

    #[test]
    fn test_small_offset_near_school() {
        let user = GeoPoint::new(40.7129, -74.0060);
        let d = distance_meters(&user, &NYC);
        assert_eq!(d.round() as i64, 11);
    }

    #[test]
    fn test_radius_boundary_is_inclusive() {
        assert!(is_within_radius(150.0, 150.0));
        assert!(is_within_radius(149.9, 150.0));
        assert!(!is_within_radius(150.0001, 150.0));
    }

    #[test]
    fn test_school_radius_check_rounds_distance() {
        let user = GeoPoint::new(40.7150, -74.0060);
        let check = is_within_school_radius(&user, &NYC, 150.0);
        assert!(!check.is_within);
        assert_eq!(check.distance_meters, 245);

        let check = is_within_school_radius(&NYC, &NYC, 150.0);
        assert!(check.is_within);
        assert_eq!(check.distance_meters, 0);
    }

    #[test]
    fn test_geohash_known_value() {
        assert_eq!(geohash(57.64911, 10.40744, 11), "u4pruydqqvj");
        assert_eq!(geohash(40.7128, -74.0060, 5), "dr5re");
    }

    #[test]
    fn test_geohash_precision_and_determinism() {
        for precision in 1..=12 {
            let h = geohash(40.7128, -74.0060, precision);
            assert_eq!(h.len(), precision);
            assert_eq!(h, NYC.geohash(precision));
        }
    }

    #[test]
    fn test_geohash_shared_prefix_for_near_points() {
        let here = geohash(40.7128, -74.0060, DEFAULT_GEOHASH_PRECISION);
        let near = geohash(40.7129, -74.0061, DEFAULT_GEOHASH_PRECISION);
        let far = geohash(34.0522, -118.2437, DEFAULT_GEOHASH_PRECISION);

        let common = |a: &str, b: &str| a.chars().zip(b.chars()).take_while(|(x, y)| x == y).count();
        assert!(common(&here, &near) >= 6);
        assert!(common(&here, &near) > common(&here, &far));
    }

    #[test]
    fn test_format_distance() {
        assert_eq!(format_distance(0.0), "0m");
        assert_eq!(format_distance(87.4), "87m");
        assert_eq!(format_distance(999.4), "999m");
        assert_eq!(format_distance(1000.0), "1.0km");
        assert_eq!(format_distance(1234.0), "1.2km");
        assert_eq!(format_distance(15_678.0), "15.7km");
    }

    #[test]
    fn test_point_validity() {
        assert!(NYC.is_valid());
        assert!(GeoPoint::new(90.0, -180.0).is_valid());
        assert!(!GeoPoint::new(90.5, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, 180.5).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }
}
