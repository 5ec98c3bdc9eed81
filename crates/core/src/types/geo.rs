//! Geographic coordinates and great-circle distance.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers (IUGG).
const EARTH_RADIUS_KM: f64 = 6371.0088;

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinates {
    /// Create a new coordinate pair.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Great-circle (haversine) distance to `other` in kilometers.
    ///
    /// Symmetric and non-negative. Accurate to well under the 0.1 km
    /// granularity the delivery policy operates on.
    #[must_use]
    pub fn distance_km(&self, other: &Self) -> f64 {
        let lat_a = self.latitude.to_radians();
        let lat_b = other.latitude.to_radians();
        let d_lat = (other.latitude - self.latitude).to_radians();
        let d_lon = (other.longitude - self.longitude).to_radians();

        let h = (d_lat / 2.0).sin().powi(2)
            + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);

        2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
    }
}

/// Round a distance to one decimal place.
///
/// All delivery-policy comparisons operate on the rounded value so that a
/// raw distance of e.g. 5.04 km and 4.96 km land in the same tier.
#[must_use]
pub fn round_km(km: f64) -> f64 {
    (km * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    // Red Square to Gorky Park entrance, roughly 2.6 km.
    const RED_SQUARE: Coordinates = Coordinates::new(55.7539, 37.6208);
    const GORKY_PARK: Coordinates = Coordinates::new(55.7298, 37.6019);

    #[test]
    fn distance_is_zero_for_identical_points() {
        assert!(RED_SQUARE.distance_km(&RED_SQUARE) < 1e-9);
    }

    #[test]
    fn distance_is_symmetric() {
        let ab = RED_SQUARE.distance_km(&GORKY_PARK);
        let ba = GORKY_PARK.distance_km(&RED_SQUARE);
        assert!((ab - ba).abs() < 1e-9);
    }

    #[test]
    fn distance_matches_known_value() {
        let km = RED_SQUARE.distance_km(&GORKY_PARK);
        assert!((2.0..3.5).contains(&km), "got {km}");
    }

    #[test]
    fn round_km_rounds_to_one_decimal() {
        assert!((round_km(5.04) - 5.0).abs() < 1e-9);
        assert!((round_km(5.05) - 5.1).abs() < 1e-9);
        assert!((round_km(0.0) - 0.0).abs() < 1e-9);
        assert!((round_km(20.04) - 20.0).abs() < 1e-9);
    }
}
