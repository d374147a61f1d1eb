//! Geographic coordinates and great-circle distance
//!
//! The proximity monitor needs nothing more than validated lat/lon pairs and
//! the Haversine distance between them.

use serde::{Deserialize, Serialize};

use crate::{MaydayError, Result};

/// Approximate radius of the Earth in meters
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

// ----------------------------------------------------------------------------
// Geographic Location
// ----------------------------------------------------------------------------

/// A geographic location represented by latitude and longitude
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    /// Latitude in degrees (-90 to 90)
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180)
    pub longitude: f64,
}

impl GeoLocation {
    /// Create a new geographic location, validating coordinate ranges
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(MaydayError::malformed(format!(
                "latitude out of range: {latitude}"
            )));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(MaydayError::malformed(format!(
                "longitude out of range: {longitude}"
            )));
        }

        Ok(Self {
            latitude,
            longitude,
        })
    }
}

// ----------------------------------------------------------------------------
// Great-Circle Distance
// ----------------------------------------------------------------------------

/// Haversine distance between two locations, in meters
pub fn distance_meters(a: GeoLocation, b: GeoLocation) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_METERS * c
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_degree_of_longitude_at_equator() {
        let a = GeoLocation::new(0.0, 0.0).unwrap();
        let b = GeoLocation::new(0.0, 1.0).unwrap();
        let d = distance_meters(a, b);
        // One degree of longitude at the equator is ~111,195 m
        assert!((d - 111_195.0).abs() < 111_195.0 * 0.005, "distance {d}");
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = GeoLocation::new(48.8566, 2.3522).unwrap();
        let b = GeoLocation::new(51.5074, -0.1278).unwrap();
        assert_eq!(distance_meters(a, b), distance_meters(b, a));
    }

    #[test]
    fn test_zero_distance() {
        let a = GeoLocation::new(45.0, 7.0).unwrap();
        assert_eq!(distance_meters(a, a), 0.0);
    }

    #[test]
    fn test_coordinate_validation() {
        assert!(GeoLocation::new(90.1, 0.0).is_err());
        assert!(GeoLocation::new(-90.1, 0.0).is_err());
        assert!(GeoLocation::new(0.0, 180.1).is_err());
        assert!(GeoLocation::new(0.0, -180.1).is_err());
        assert!(GeoLocation::new(90.0, -180.0).is_ok());
    }
}
