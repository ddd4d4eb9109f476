//! Geographic types and great-circle calculations for drone positioning

use serde::{Deserialize, Serialize};

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Geographic position with latitude, longitude, and altitude
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPosition {
    /// Latitude in degrees (-90 to 90)
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180)
    pub longitude: f64,
    /// Altitude in meters
    #[serde(default)]
    pub altitude: f64,
}

impl GeoPosition {
    /// Create a new geographic position
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }

    /// Create position from degrees at ground level
    pub fn from_degrees(lat_deg: f64, lng_deg: f64) -> Self {
        Self::new(lat_deg, lng_deg, 0.0)
    }

    /// Check if this position is valid
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && self.latitude >= -90.0
            && self.latitude <= 90.0
            && self.longitude >= -180.0
            && self.longitude <= 180.0
    }

    /// Great-circle distance to another position using the Haversine formula.
    /// Returns distance in meters. Altitude is ignored.
    pub fn distance_to(&self, other: &GeoPosition) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let delta_lat = (other.latitude - self.latitude).to_radians();
        let delta_lng = (other.longitude - self.longitude).to_radians();

        let a = (delta_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);
        let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

        EARTH_RADIUS_M * c
    }

    /// Initial bearing (forward azimuth) to another position.
    /// Returns radians in (-PI, PI]; 0 when both points coincide.
    pub fn bearing_to(&self, other: &GeoPosition) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let delta_lng = (other.longitude - self.longitude).to_radians();

        let y = delta_lng.sin() * lat2.cos();
        let x = lat1.cos() * lat2.sin() - lat1.sin() * lat2.cos() * delta_lng.cos();

        y.atan2(x)
    }

    /// Compass heading to another position in degrees (0-360)
    pub fn heading_to(&self, other: &GeoPosition) -> f64 {
        (self.bearing_to(other).to_degrees() + 360.0) % 360.0
    }

    /// Position reached by travelling `distance_m` meters from here along
    /// `bearing_rad`. Altitude is carried over unchanged.
    pub fn destination(&self, bearing_rad: f64, distance_m: f64) -> GeoPosition {
        let lat1 = self.latitude.to_radians();
        let lng1 = self.longitude.to_radians();
        let angular_distance = distance_m / EARTH_RADIUS_M;

        let lat2 = (lat1.sin() * angular_distance.cos()
            + lat1.cos() * angular_distance.sin() * bearing_rad.cos())
        .asin();

        let lng2 = lng1
            + (bearing_rad.sin() * angular_distance.sin() * lat1.cos())
                .atan2(angular_distance.cos() - lat1.sin() * lat2.sin());

        GeoPosition::new(lat2.to_degrees(), normalize_longitude(lng2.to_degrees()), self.altitude)
    }

    /// Same position at a different altitude
    pub fn with_altitude(mut self, altitude: f64) -> Self {
        self.altitude = altitude;
        self
    }

    /// Convert to (latitude, longitude) tuple
    pub fn to_tuple(&self) -> (f64, f64) {
        (self.latitude, self.longitude)
    }
}

/// Wrap a longitude in degrees back into [-180, 180]
fn normalize_longitude(lng: f64) -> f64 {
    if (-180.0..=180.0).contains(&lng) {
        lng
    } else {
        (lng + 540.0).rem_euclid(360.0) - 180.0
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn central_park() -> GeoPosition {
        GeoPosition::from_degrees(40.785091, -73.968285)
    }

    fn times_square() -> GeoPosition {
        GeoPosition::from_degrees(40.758895, -73.985131)
    }

    #[test]
    fn test_distance_calculation() {
        let distance = central_park().distance_to(&times_square());
        assert!(distance > 3_100.0 && distance < 3_400.0, "got {distance}");
    }

    #[test]
    fn test_distance_zero_and_symmetric() {
        let a = central_park();
        let b = GeoPosition::from_degrees(-33.8688, 151.2093);

        assert_eq!(a.distance_to(&a), 0.0);
        assert_eq!(a.distance_to(&b), b.distance_to(&a));
    }

    #[test]
    fn test_bearing_calculation() {
        let origin = GeoPosition::new(0.0, 0.0, 0.0);
        let north = GeoPosition::new(1.0, 0.0, 0.0);
        let east = GeoPosition::new(0.0, 1.0, 0.0);

        assert!(origin.bearing_to(&north).abs() < 1e-9);
        assert!((origin.bearing_to(&east) - std::f64::consts::FRAC_PI_2).abs() < 1e-9);
        assert_eq!(origin.bearing_to(&origin), 0.0);
    }

    #[test]
    fn test_heading_is_normalized() {
        let origin = GeoPosition::new(0.0, 0.0, 0.0);
        let west = GeoPosition::new(0.0, -1.0, 0.0);

        assert!((origin.heading_to(&west) - 270.0).abs() < 1e-6);
    }

    #[test]
    fn test_destination_round_trip() {
        let pairs = [
            (central_park(), times_square()),
            (GeoPosition::from_degrees(34.5553, 69.2075), GeoPosition::from_degrees(35.1, 69.9)),
            (GeoPosition::from_degrees(-45.0, 170.0), GeoPosition::from_degrees(-45.3, 170.4)),
            (GeoPosition::from_degrees(60.0, 0.0), GeoPosition::from_degrees(60.0, 0.0005)),
        ];

        for (a, b) in pairs {
            let d = a.distance_to(&b);
            assert!(d < 100_000.0);
            let reached = a.destination(a.bearing_to(&b), d);
            assert!((a.distance_to(&reached) - d).abs() < 1.0);
            assert!(reached.distance_to(&b) < 1.0);
        }
    }

    #[test]
    fn test_destination_keeps_altitude() {
        let start = central_park().with_altitude(75.0);
        let next = start.destination(1.0, 200.0);

        assert_eq!(next.altitude, 75.0);
        assert!((start.distance_to(&next) - 200.0).abs() < 1e-6);
    }

    #[test]
    fn test_destination_across_antimeridian() {
        let start = GeoPosition::from_degrees(0.0, 179.999);
        let next = start.destination(std::f64::consts::FRAC_PI_2, 1_000.0);

        assert!(next.is_valid());
        assert!(next.longitude < 0.0);
    }

    #[test]
    fn test_position_validity() {
        let valid = GeoPosition::new(45.0, 90.0, 1000.0);
        let invalid_lat = GeoPosition::new(100.0, 0.0, 0.0);
        let invalid_lng = GeoPosition::new(0.0, 200.0, 0.0);

        assert!(valid.is_valid());
        assert!(!invalid_lat.is_valid());
        assert!(!invalid_lng.is_valid());
        assert!(!GeoPosition::new(f64::NAN, 0.0, 0.0).is_valid());
    }
}
