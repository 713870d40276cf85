// SPDX-License-Identifier: Apache-2.0

//! Great-circle distance and bounding-box math for radius queries.

use civicwatch_model::GeoPoint;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

const KM_PER_DEG_LAT: f64 = 110.574;
const KM_PER_DEG_LON_EQUATOR: f64 = 111.320;

/// Haversine distance in kilometers.
#[must_use]
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat_a = a.latitude.to_radians();
    let lat_b = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat_a.cos() * lat_b.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}

/// Degree-space bounding box guaranteed to contain the circle of
/// `radius_km` around `center`. Near the poles the longitude span
/// degenerates, so it widens to the full range there; the exact
/// refinement pass discards the extra candidates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

#[must_use]
pub fn bounding_box(center: GeoPoint, radius_km: f64) -> BoundingBox {
    let lat_delta = radius_km / KM_PER_DEG_LAT;
    let min_lat = (center.latitude - lat_delta).max(-90.0);
    let max_lat = (center.latitude + lat_delta).min(90.0);

    let cos_lat = center.latitude.to_radians().cos();
    let lon_delta = if cos_lat > 1e-6 {
        radius_km / (KM_PER_DEG_LON_EQUATOR * cos_lat)
    } else {
        360.0
    };
    let min_lon = (center.longitude - lon_delta).max(-180.0);
    let max_lon = (center.longitude + lon_delta).min(180.0);

    BoundingBox {
        min_lon,
        max_lon,
        min_lat,
        max_lat,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(lon: f64, lat: f64) -> GeoPoint {
        GeoPoint::new(lon, lat).expect("valid point")
    }

    #[test]
    fn zero_distance_for_identical_points() {
        let p = point(77.5946, 12.9716);
        assert!(haversine_km(p, p).abs() < 1e-9);
    }

    #[test]
    fn known_distance_along_a_parallel() {
        // 0.01 deg of longitude at ~12.97N is roughly 1.08 km.
        let a = point(77.5946, 12.9716);
        let b = point(77.6046, 12.9716);
        let d = haversine_km(a, b);
        assert!((d - 1.084).abs() < 0.01, "got {d}");
    }

    #[test]
    fn antipodal_points_are_half_the_circumference() {
        let a = point(0.0, 0.0);
        let b = point(180.0, 0.0);
        let d = haversine_km(a, b);
        let half = std::f64::consts::PI * EARTH_RADIUS_KM;
        assert!((d - half).abs() < 1.0, "got {d}");
    }

    #[test]
    fn bounding_box_contains_circle_edge_points() {
        let center = point(77.5946, 12.9716);
        let radius = 5.0;
        let bb = bounding_box(center, radius);
        // Walk the circle and confirm every edge point falls inside.
        for step in 0..72 {
            let bearing = f64::from(step) * 5.0_f64.to_radians();
            let lat_km = radius * bearing.cos();
            let lon_km = radius * bearing.sin();
            let lat = center.latitude + lat_km / 110.574;
            let lon = center.longitude + lon_km / (111.320 * center.latitude.to_radians().cos());
            assert!(lat >= bb.min_lat && lat <= bb.max_lat, "lat {lat} outside");
            assert!(lon >= bb.min_lon && lon <= bb.max_lon, "lon {lon} outside");
        }
    }

    #[test]
    fn bounding_box_clamps_at_the_poles() {
        let bb = bounding_box(point(10.0, 89.9), 50.0);
        assert_eq!(bb.max_lat, 90.0);
        assert_eq!(bb.min_lon, -180.0);
        assert_eq!(bb.max_lon, 180.0);
    }
}
