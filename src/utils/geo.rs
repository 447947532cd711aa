//! Great-circle distance between latitude/longitude pairs.
//!
//! Inputs are genuine coordinates that can be hundreds of miles apart, so
//! planar distance is never used. Range validation happens when a
//! [`Location`] is constructed, not here.

use crate::models::types::Location;
use crate::utils::constants::EARTH_RADIUS_MILES;

/// Haversine distance in statute miles
pub fn distance_miles(a: &Location, b: &Location) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    // Clamp guards against h drifting past 1.0 for antipodal points
    let c = 2.0 * h.sqrt().min(1.0).asin();

    EARTH_RADIUS_MILES * c
}
