pub mod angle;

use crate::model::Position;

/// In meters, copied from Google Maps's code (same constant the teacher used).
pub const EARTH_RADIUS: f64 = 6_378_137.;

/// Latitude lines are always spaced evenly apart, so this doesn't need to be an
/// approximation.
pub const LAT_M_PER_DEGREE: f64 = EARTH_RADIUS * (std::f64::consts::PI / 180.);

#[inline]
pub fn calculate_lng_m_per_degree(lat_deg: f64) -> f64 {
    LAT_M_PER_DEGREE * lat_deg.to_radians().cos()
}

/// Haversine great-circle distance between two positions, in meters.
///
/// Kept in full f64 precision (unlike the teacher's f32-truncated variant in
/// `astar.rs`) since route costs are summed over many edges and need to stay
/// within the 1e-2 tolerance required of `totalCost`.
#[inline]
pub fn haversine_distance(a: Position, b: Position) -> f64 {
    let a_lat_rad = a.lat.to_rad();
    let a_lng_rad = a.lng.to_rad();
    let b_lat_rad = b.lat.to_rad();
    let b_lng_rad = b.lng.to_rad();

    let delta_lat = b_lat_rad - a_lat_rad;
    let delta_lng = b_lng_rad - a_lng_rad;

    let h = (delta_lat / 2.).sin().powi(2)
        + a_lat_rad.cos() * b_lat_rad.cos() * (delta_lng / 2.).sin().powi(2);
    let c = 2. * h.sqrt().asin();
    EARTH_RADIUS * c
}

/// Initial compass bearing (degrees, 0-360) from `a` towards `b`, following
/// the great-circle bearing formula (same one `geo::Haversine.bearing` uses).
#[inline]
pub fn bearing(a: Position, b: Position) -> f64 {
    let a_lat_rad = a.lat.to_rad();
    let a_lng_rad = a.lng.to_rad();
    let b_lat_rad = b.lat.to_rad();
    let b_lng_rad = b.lng.to_rad();

    let delta_lng = b_lng_rad - a_lng_rad;
    let y = delta_lng.sin() * b_lat_rad.cos();
    let x = a_lat_rad.cos() * b_lat_rad.sin() - a_lat_rad.sin() * b_lat_rad.cos() * delta_lng.cos();

    (y.atan2(x).to_degrees() + 360.) % 360.
}

/// The point reached by travelling `distance_m` meters from `origin` along
/// compass `bearing_deg`.
pub fn point_at_distance(origin: Position, bearing_deg: f64, distance_m: f64) -> Position {
    let lat_rad = origin.lat.to_rad();
    let lng_rad = origin.lng.to_rad();
    let bearing_rad = bearing_deg.to_radians();

    let d = distance_m / EARTH_RADIUS;
    let (sin_d, cos_d) = d.sin_cos();
    let (sin_lat, cos_lat) = lat_rad.sin_cos();

    let dest_lat_rad = (cos_d * sin_lat + sin_d * cos_lat * bearing_rad.cos()).asin();
    let dest_lng_rad = lng_rad
        + f64::atan2(
            bearing_rad.sin() * sin_d * cos_lat,
            cos_d - sin_lat * dest_lat_rad.sin(),
        );

    Position::new_deg(dest_lat_rad.to_degrees(), dest_lng_rad.to_degrees())
}

/// Returns a padded axis-aligned bounding box (in degrees) around `positions`,
/// expanded by roughly `padding_meters` on every side. Used by the offline
/// router (C12) to decide which cached regions intersect a prospective route.
pub fn padded_bounding_box(
    positions: &[Position],
    padding_meters: f64,
) -> Option<(f64, f64, f64, f64)> {
    let first = positions.first()?;
    let mut north = first.lat.to_deg();
    let mut south = first.lat.to_deg();
    let mut east = first.lng.to_deg();
    let mut west = first.lng.to_deg();

    for pos in &positions[1..] {
        north = north.max(pos.lat.to_deg());
        south = south.min(pos.lat.to_deg());
        east = east.max(pos.lng.to_deg());
        west = west.min(pos.lng.to_deg());
    }

    let lat_pad = padding_meters / LAT_M_PER_DEGREE;
    // use the northernmost latitude for a conservative (slightly larger)
    // longitude padding, since m/degree shrinks towards the poles
    let lng_m_per_degree = calculate_lng_m_per_degree(north.max(south.abs())).max(1.0);
    let lng_pad = padding_meters / lng_m_per_degree;

    Some((
        (north + lat_pad).min(90.),
        (south - lat_pad).max(-90.),
        (east + lng_pad).min(180.),
        (west - lng_pad).max(-180.),
    ))
}

#[cfg(test)]
mod tests {
    use geo::Distance as _;

    use super::*;
    use crate::model::Position;

    #[test]
    fn test_haversine_known_distance() {
        // two points roughly 0.001 degrees of latitude apart, as used in S2 of
        // the spec: expected edge length ~111.195 m.
        let a = Position::new_deg(0., 0.);
        let b = Position::new_deg(0.001, 0.);
        let dist = haversine_distance(a, b);
        assert!((dist - 111.195).abs() < 0.05, "got {dist}");
    }

    #[test]
    fn test_haversine_same_point_is_zero() {
        let a = Position::new_deg(40.7128, -74.006);
        assert!(haversine_distance(a, a) < 1e-6);
    }

    #[test]
    fn test_haversine_matches_geo_crate_within_tolerance() {
        let a = Position::new_deg(47.45647413331853, -69.99669220097549);
        let b = Position::new_deg(47.4600, -70.0010);
        let ours = haversine_distance(a, b);
        let reference = geo::Haversine.distance(
            geo::Point::new(a.lng_deg(), a.lat_deg()),
            geo::Point::new(b.lng_deg(), b.lat_deg()),
        );
        assert!((ours - reference).abs() < 0.5, "ours={ours} reference={reference}");
    }

    #[test]
    fn test_bearing_due_east() {
        let a = Position::new_deg(0., 0.);
        let b = Position::new_deg(0., 1.);
        let heading = bearing(a, b);
        assert!((heading - 90.).abs() < 0.01, "got {heading}");
    }

    #[test]
    fn test_point_at_distance_round_trips_haversine() {
        let origin = Position::new_deg(40.7128, -74.006);
        let dest = point_at_distance(origin, 45., 500.);
        let dist = haversine_distance(origin, dest);
        assert!((dist - 500.).abs() < 1.0, "got {dist}");
    }

    #[test]
    fn test_padded_bounding_box_contains_points() {
        let positions = vec![Position::new_deg(10., 10.), Position::new_deg(10.01, 10.02)];
        let (north, south, east, west) = padded_bounding_box(&positions, 1000.).unwrap();
        assert!(north > 10.01 && south < 10.);
        assert!(east > 10.02 && west < 10.);
    }
}
