//! Reference haversine great-circle distance

use crate::pairs::Pair;

/// Mean Earth radius used by the reference answers, in kilometres
pub const EARTH_RADIUS: f64 = 6372.8;

/// Degrees to radians
#[inline]
pub fn radians_from_degrees(degrees: f64) -> f64 {
    0.017_453_292_519_943_295 * degrees
}

#[inline]
fn square(a: f64) -> f64 {
    a * a
}

/// Great-circle distance between `(x0, y0)` and `(x1, y1)`, longitude/latitude in degrees.
///
/// # Example
/// ```
/// use haversine::haversine::{reference_haversine, EARTH_RADIUS};
///
/// let d = reference_haversine(0.0, 0.0, 0.0, 0.0, EARTH_RADIUS);
/// assert_eq!(d, 0.0);
/// ```
pub fn reference_haversine(x0: f64, y0: f64, x1: f64, y1: f64, earth_radius: f64) -> f64 {
    let d_lat = radians_from_degrees(y1 - y0);
    let d_lon = radians_from_degrees(x1 - x0);
    let lat1 = radians_from_degrees(y0);
    let lat2 = radians_from_degrees(y1);

    let a = square((d_lat / 2.0).sin()) + lat1.cos() * lat2.cos() * square((d_lon / 2.0).sin());
    let c = 2.0 * a.sqrt().asin();

    earth_radius * c
}

/// Mean distance over `pairs`, accumulated as `sum(d / n)`
pub fn mean_distance(pairs: &[Pair]) -> f64 {
    crate::profile_block!("Haversine Sum");

    let coef = 1.0 / pairs.len() as f64;
    pairs
        .iter()
        .map(|p| coef * reference_haversine(p.x0, p.y0, p.x1, p.y1, EARTH_RADIUS))
        .sum()
}
