//! Geospatial primitives for route relevance checks.
//!
//! Distances are computed on a spherical Earth. The point-to-segment
//! distance uses a local equirectangular projection anchored at the
//! segment's mean latitude, which is accurate to a few meters at city and
//! route scale but is not geodesically exact.
//!
//! All distances are in meters and all coordinates in decimal degrees.

use serde::{Deserialize, Serialize};

/// Earth radius in meters used by every distance in this crate.
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

/// A geographic point on a route polyline.
///
/// Serialized as `{"latitude": .., "longitude": ..}`, the shape used by
/// the routing service for leg shapes and by stored session polylines.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Latitude in decimal degrees.
    #[serde(rename = "latitude")]
    pub lat: f64,
    /// Longitude in decimal degrees.
    #[serde(rename = "longitude")]
    pub lon: f64,
}

impl Point {
    /// Create a point from a latitude and longitude in degrees.
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// Great-circle distance between two points (haversine formula).
pub fn haversine(a: Point, b: Point) -> f64 {
    let d_lat = (b.lat - a.lat) * DEG_TO_RAD;
    let d_lon = (b.lon - a.lon) * DEG_TO_RAD;

    let lat1 = a.lat * DEG_TO_RAD;
    let lat2 = b.lat * DEG_TO_RAD;

    let sin_d_lat = (d_lat / 2.0).sin();
    let sin_d_lon = (d_lon / 2.0).sin();

    let h = sin_d_lat.mul_add(sin_d_lat, sin_d_lon * sin_d_lon * lat1.cos() * lat2.cos());
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Minimum distance from `p` to the segment `[a, b]`.
///
/// The three points are projected onto a flat plane (longitude scaled by
/// the cosine of the segment's mean latitude), `p` is projected
/// orthogonally onto the segment with the parameter clamped to `[0, 1]`,
/// and the Euclidean distance to that projection is returned. A
/// degenerate segment (`a == b`) yields the plain point distance.
pub fn distance_to_segment(p: Point, a: Point, b: Point) -> f64 {
    let lat_ref = (a.lat + b.lat) / 2.0 * DEG_TO_RAD;
    let cos_ref = lat_ref.cos();

    let project = |pt: Point| {
        (
            pt.lon * DEG_TO_RAD * EARTH_RADIUS_M * cos_ref,
            pt.lat * DEG_TO_RAD * EARTH_RADIUS_M,
        )
    };
    let (xa, ya) = project(a);
    let (xb, yb) = project(b);
    let (xp, yp) = project(p);

    let dx = xb - xa;
    let dy = yb - ya;
    let len_sq = dx.mul_add(dx, dy * dy);

    if len_sq <= 0.0 {
        return (xp - xa).hypot(yp - ya);
    }

    let t = ((xp - xa).mul_add(dx, (yp - ya) * dy) / len_sq).clamp(0.0, 1.0);
    let x_proj = t.mul_add(dx, xa);
    let y_proj = t.mul_add(dy, ya);

    (xp - x_proj).hypot(yp - y_proj)
}

/// Whether `point` lies within `tolerance` meters of `polyline`.
///
/// An empty polyline never matches. A single-point polyline matches when
/// the great-circle distance to that point is within tolerance. Otherwise
/// every consecutive segment is tested.
pub fn is_point_near_polyline(point: Point, polyline: &[Point], tolerance: f64) -> bool {
    match polyline {
        [] => false,
        [only] => haversine(point, *only) <= tolerance,
        _ => polyline
            .windows(2)
            .any(|w| matches!(w, [a, b] if distance_to_segment(point, *a, *b) <= tolerance)),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() <= eps
    }

    #[test]
    fn haversine_zero_for_identical_points() {
        let p = Point::new(48.8566, 2.3522);
        assert!(approx(haversine(p, p), 0.0, 1e-9));
    }

    #[test]
    fn haversine_one_degree_of_latitude() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(1.0, 0.0);
        let expected = EARTH_RADIUS_M * DEG_TO_RAD;
        assert!(approx(haversine(a, b), expected, 1e-6));
    }

    #[test]
    fn haversine_is_symmetric() {
        let a = Point::new(48.8566, 2.3522);
        let b = Point::new(45.7640, 4.8357);
        assert!(approx(haversine(a, b), haversine(b, a), 1e-6));
    }

    #[test]
    fn segment_interior_projection_is_perpendicular_distance() {
        // Segment along the equator, point 0.001 deg north of its middle.
        let a = Point::new(0.0, 0.0);
        let b = Point::new(0.0, 0.01);
        let p = Point::new(0.001, 0.005);
        let expected = 0.001 * DEG_TO_RAD * EARTH_RADIUS_M;
        assert!(approx(distance_to_segment(p, a, b), expected, 1e-6));
    }

    #[test]
    fn segment_projection_beyond_end_uses_nearest_endpoint() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(0.0, 0.01);
        let p = Point::new(0.0, 0.02);
        let lat_ref = 0.0_f64;
        let expected = 0.01 * DEG_TO_RAD * EARTH_RADIUS_M * lat_ref.cos();
        assert!(approx(distance_to_segment(p, a, b), expected, 1e-6));

        let before = Point::new(0.0, -0.01);
        assert!(approx(distance_to_segment(before, a, b), expected, 1e-6));
    }

    #[test]
    fn degenerate_segment_falls_back_to_point_distance() {
        let a = Point::new(10.0, 10.0);
        let p = Point::new(10.001, 10.0);
        let expected = 0.001 * DEG_TO_RAD * EARTH_RADIUS_M;
        assert!(approx(distance_to_segment(p, a, a), expected, 1e-6));
    }

    #[test]
    fn empty_polyline_never_matches() {
        let p = Point::new(0.0, 0.0);
        assert!(!is_point_near_polyline(p, &[], 0.0));
        assert!(!is_point_near_polyline(p, &[], 1e9));
    }

    #[test]
    fn single_point_polyline_uses_haversine() {
        let only = Point::new(0.0, 0.0);
        let near = Point::new(0.0001, 0.0);
        let distance = haversine(near, only);

        assert!(is_point_near_polyline(near, &[only], distance));
        assert!(is_point_near_polyline(near, &[only], distance + 1.0));
        assert!(!is_point_near_polyline(near, &[only], distance - 1.0));
    }

    #[test]
    fn point_on_route_matches() {
        let route = [Point::new(0.0, 0.0), Point::new(0.0, 1.0)];
        assert!(is_point_near_polyline(Point::new(0.0, 0.5), &route, 30.0));
    }

    #[test]
    fn point_a_kilometer_away_does_not_match() {
        let route = [
            Point::new(48.85, 2.30),
            Point::new(48.85, 2.31),
            Point::new(48.86, 2.31),
        ];
        // ~1 km south of the first segment.
        let far = Point::new(48.841, 2.305);
        assert!(!is_point_near_polyline(far, &route, 30.0));
    }

    #[test]
    fn later_segment_can_match() {
        let route = [
            Point::new(48.85, 2.30),
            Point::new(48.85, 2.31),
            Point::new(48.86, 2.31),
        ];
        let on_second = Point::new(48.855, 2.3101);
        assert!(is_point_near_polyline(on_second, &route, 30.0));
    }

    #[test]
    fn point_serializes_with_long_field_names() {
        let json = serde_json::to_value(Point::new(1.5, 2.5)).unwrap();
        assert_eq!(json, serde_json::json!({"latitude": 1.5, "longitude": 2.5}));
    }
}
