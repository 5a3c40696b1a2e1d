//! Great-circle distance helpers

/// Mean Earth radius in statute miles
pub const EARTH_RADIUS_MILES: f64 = 3958.8;

/// Haversine distance in miles between two `(latitude, longitude)` points
pub fn distance_miles(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_MILES * c
}

/// Arithmetic centroid of a set of points; `None` for an empty set
///
/// Adequate for the city-sized clusters it is used on.
pub fn centroid(points: &[(f64, f64)]) -> Option<(f64, f64)> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (lat_sum, lon_sum) = points
        .iter()
        .fold((0.0, 0.0), |(lat, lon), (p_lat, p_lon)| (lat + p_lat, lon + p_lon));
    Some((lat_sum / n, lon_sum / n))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEATTLE: (f64, f64) = (47.6062, -122.3321);
    const PORTLAND: (f64, f64) = (45.5152, -122.6784);

    #[test]
    fn test_distance_identical_points_is_zero() {
        assert_eq!(distance_miles(SEATTLE.0, SEATTLE.1, SEATTLE.0, SEATTLE.1), 0.0);
    }

    #[test]
    fn test_distance_seattle_portland() {
        let d = distance_miles(SEATTLE.0, SEATTLE.1, PORTLAND.0, PORTLAND.1);
        assert!((140.0..=150.0).contains(&d), "got {d}");
    }

    #[test]
    fn test_distance_is_symmetric() {
        let there = distance_miles(SEATTLE.0, SEATTLE.1, PORTLAND.0, PORTLAND.1);
        let back = distance_miles(PORTLAND.0, PORTLAND.1, SEATTLE.0, SEATTLE.1);
        assert!((there - back).abs() < 1e-9);
    }

    #[test]
    fn test_centroid() {
        assert_eq!(centroid(&[]), None);
        assert_eq!(centroid(&[(10.0, 20.0), (20.0, 40.0)]), Some((15.0, 30.0)));
    }
}
