//! # Geographic Utilities
//!
//! Core geographic computation for activity routes.
//!
//! ## Overview
//!
//! | Function | Description |
//! |----------|-------------|
//! | [`haversine_km`] | Great-circle distance between two GPS points |
//! | [`route_distance_km`] | Path length of a recorded route |
//! | [`planned_route_km`] | Path length of a list of planned waypoints |
//! | [`compute_bounds`] | Bounding box of a set of points |
//! | [`compute_center`] | Centroid of a set of points |
//! | [`simplify_route`] | Douglas-Peucker simplified route for previews |
//!
//! ## Example
//!
//! ```rust
//! use activity_tracker::{GpsPoint, geo_utils};
//!
//! let waypoints = vec![
//!     GpsPoint::new(51.5074, -0.1278),
//!     GpsPoint::new(51.5080, -0.1290),
//!     GpsPoint::new(51.5090, -0.1300),
//! ];
//!
//! let length = geo_utils::planned_route_km(&waypoints);
//! println!("Planned route: {:.2} km", length);
//! ```
//!
//! ## Algorithm Notes
//!
//! Distances use the haversine formula on a sphere of radius 6371 km. Route
//! length is always the full ordered sum over consecutive pairs; nothing is
//! accumulated incrementally, so the same route always yields bit-identical
//! totals.

use geo::{algorithm::simplify::Simplify, Coord, LineString};

use crate::{Bounds, GpsPoint, Sample};

/// Mean Earth radius used for all distance calculations (km).
pub const EARTH_RADIUS_KM: f64 = 6371.0;

// =============================================================================
// Distance Functions
// =============================================================================

/// Great-circle distance between two GPS points in kilometres.
///
/// ```text
/// a = sin²(Δlat/2) + cos(lat1)·cos(lat2)·sin²(Δlon/2)
/// c = 2·atan2(√a, √(1−a))
/// d = R·c
/// ```
///
/// # Example
///
/// ```rust
/// use activity_tracker::{GpsPoint, geo_utils};
///
/// let london = GpsPoint::new(51.5074, -0.1278);
/// let paris = GpsPoint::new(48.8566, 2.3522);
///
/// let distance = geo_utils::haversine_km(&london, &paris);
/// assert!((distance - 343.5).abs() < 1.0);
/// ```
#[inline]
pub fn haversine_km(p1: &GpsPoint, p2: &GpsPoint) -> f64 {
    let d_lat = (p2.latitude - p1.latitude).to_radians();
    let d_lon = (p2.longitude - p1.longitude).to_radians();
    let lat1 = p1.latitude.to_radians();
    let lat2 = p2.latitude.to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Total path length of a recorded route in kilometres.
///
/// Sums [`haversine_km`] over every consecutive pair, in order. Empty or
/// single-sample routes return 0.0.
pub fn route_distance_km(route: &[Sample]) -> f64 {
    if route.len() < 2 {
        return 0.0;
    }

    route
        .windows(2)
        .map(|w| haversine_km(&w[0].point(), &w[1].point()))
        .sum()
}

/// Total length of a planned route (waypoints in click order) in kilometres.
pub fn planned_route_km(waypoints: &[GpsPoint]) -> f64 {
    if waypoints.len() < 2 {
        return 0.0;
    }

    waypoints
        .windows(2)
        .map(|w| haversine_km(&w[0], &w[1]))
        .sum()
}

// =============================================================================
// Bounding Box / Center
// =============================================================================

/// Compute the bounding box of a set of points.
///
/// For empty input, returns a bounds with MIN/MAX values; use
/// [`Bounds::from_points`] when an `Option` is preferable.
pub fn compute_bounds(points: &[GpsPoint]) -> Bounds {
    let mut min_lat = f64::MAX;
    let mut max_lat = f64::MIN;
    let mut min_lng = f64::MAX;
    let mut max_lng = f64::MIN;

    for p in points {
        min_lat = min_lat.min(p.latitude);
        max_lat = max_lat.max(p.latitude);
        min_lng = min_lng.min(p.longitude);
        max_lng = max_lng.max(p.longitude);
    }

    Bounds {
        min_lat,
        max_lat,
        min_lng,
        max_lng,
    }
}

/// Compute the arithmetic centroid of a set of points. Returns (0, 0) for
/// empty input.
pub fn compute_center(points: &[GpsPoint]) -> GpsPoint {
    if points.is_empty() {
        return GpsPoint::new(0.0, 0.0);
    }

    let sum_lat: f64 = points.iter().map(|p| p.latitude).sum();
    let sum_lng: f64 = points.iter().map(|p| p.longitude).sum();
    let n = points.len() as f64;

    GpsPoint::new(sum_lat / n, sum_lng / n)
}

// =============================================================================
// Simplification
// =============================================================================

/// Simplify a recorded route for map previews and history thumbnails.
///
/// Invalid coordinates are dropped, then Douglas-Peucker is applied with the
/// given tolerance (in degrees; 0.0001 ≈ 11 m). The stored route itself is
/// never simplified, only the preview derived from it.
pub fn simplify_route(route: &[Sample], tolerance_deg: f64) -> Vec<GpsPoint> {
    let coords: Vec<Coord> = route
        .iter()
        .map(Sample::point)
        .filter(GpsPoint::is_valid)
        .map(|p| Coord {
            x: p.longitude,
            y: p.latitude,
        })
        .collect();

    if coords.len() < 3 {
        return coords.iter().map(|c| GpsPoint::new(c.y, c.x)).collect();
    }

    let line = LineString::new(coords);
    line.simplify(&tolerance_deg)
        .0
        .iter()
        .map(|c| GpsPoint::new(c.y, c.x))
        .collect()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, epsilon: f64) -> bool {
        (a - b).abs() < epsilon
    }

    #[test]
    fn test_haversine_same_point_is_zero() {
        let p = GpsPoint::new(51.5074, -0.1278);
        assert_eq!(haversine_km(&p, &p), 0.0);
    }

    #[test]
    fn test_haversine_hundredth_degree_at_equator() {
        let a = GpsPoint::new(0.0, 0.0);
        let b = GpsPoint::new(0.0, 0.01);
        // 6371 * 0.01 * PI / 180
        assert!(approx_eq(haversine_km(&a, &b), 1.111949, 1e-5));
    }

    #[test]
    fn test_route_distance_matches_pairwise_sum() {
        let route: Vec<Sample> = (0..20)
            .map(|i| Sample::new(51.5 + i as f64 * 0.0007, -0.12 + (i % 3) as f64 * 0.0004, i * 1000))
            .collect();

        let mut expected = 0.0;
        for i in 1..route.len() {
            expected += haversine_km(&route[i - 1].point(), &route[i].point());
        }
        assert_eq!(route_distance_km(&route), expected);
    }

    #[test]
    fn test_route_distance_short_routes() {
        assert_eq!(route_distance_km(&[]), 0.0);
        assert_eq!(route_distance_km(&[Sample::new(1.0, 1.0, 0)]), 0.0);
        let still = vec![Sample::new(1.0, 1.0, 0), Sample::new(1.0, 1.0, 1000)];
        assert_eq!(route_distance_km(&still), 0.0);
    }

    #[test]
    fn test_planned_route_km() {
        let waypoints = vec![
            GpsPoint::new(0.0, 0.0),
            GpsPoint::new(0.0, 0.01),
            GpsPoint::new(0.0, 0.02),
        ];
        assert!(approx_eq(planned_route_km(&waypoints), 2.2239, 1e-3));
        assert_eq!(planned_route_km(&waypoints[..1]), 0.0);
    }

    #[test]
    fn test_compute_bounds_and_center() {
        let pts = vec![
            GpsPoint::new(51.50, -0.13),
            GpsPoint::new(51.51, -0.12),
            GpsPoint::new(51.505, -0.125),
        ];
        let bounds = compute_bounds(&pts);
        assert_eq!(bounds.min_lat, 51.50);
        assert_eq!(bounds.max_lat, 51.51);
        assert_eq!(bounds.min_lng, -0.13);
        assert_eq!(bounds.max_lng, -0.12);

        let center = compute_center(&pts[..2]);
        assert!(approx_eq(center.latitude, 51.505, 1e-9));
        assert_eq!(compute_center(&[]), GpsPoint::new(0.0, 0.0));
    }

    #[test]
    fn test_simplify_straight_line() {
        let route: Vec<Sample> = (0..50)
            .map(|i| Sample::new(0.0, i as f64 * 0.0001, i * 1000))
            .collect();
        let simplified = simplify_route(&route, 0.00001);
        assert_eq!(simplified.len(), 2);
        assert_eq!(simplified[0], GpsPoint::new(0.0, 0.0));
    }
}
