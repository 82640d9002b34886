use geo_types::Point;
use serde::{Deserialize, Serialize};

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// One GPS fix, degrees. Coordinate ranges are not validated here.
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl From<GeoPoint> for Point {
    fn from(point: GeoPoint) -> Self {
        Point::new(point.longitude, point.latitude)
    }
}

impl From<Point> for GeoPoint {
    fn from(point: Point) -> Self {
        Self {
            latitude: point.y(),
            longitude: point.x(),
        }
    }
}

/// Great-circle distance in kilometers over a spherical earth.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat_a.cos() * lat_b.cos() * (delta_lon / 2.0).sin().powi(2);

    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_for_identical_points() {
        let p = GeoPoint::new(47.3769, 8.5417);
        assert_eq!(haversine_km(p, p), 0.0);
    }

    #[test]
    fn symmetric() {
        let a = GeoPoint::new(47.3769, 8.5417);
        let b = GeoPoint::new(48.1351, 11.5820);
        assert_eq!(haversine_km(a, b), haversine_km(b, a));
    }

    #[test]
    fn non_negative_for_antipodal_points() {
        let a = GeoPoint::new(47.3769, 8.5417);
        let b = GeoPoint::new(-47.3769, -171.4583);
        let d = haversine_km(a, b);
        assert!(d > 0.0);
        // Half the earth's circumference is the ceiling.
        assert!(d <= std::f64::consts::PI * EARTH_RADIUS_KM + 1.0);
    }

    #[test]
    fn hundred_meters_north() {
        let a = GeoPoint::new(47.3769, 8.5417);
        let b = GeoPoint::new(47.3769 + 0.1 / 111.195, 8.5417);
        let d = haversine_km(a, b);
        assert!((d - 0.1).abs() < 0.005, "expected ~0.1 km, got {d}");
    }

    #[test]
    fn zurich_to_munich_plausible() {
        let a = GeoPoint::new(47.3769, 8.5417);
        let b = GeoPoint::new(48.1351, 11.5820);
        let d = haversine_km(a, b);
        assert!(d > 230.0 && d < 250.0, "expected ~242 km, got {d}");
    }
}
