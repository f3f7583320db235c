//! Great-circle distance over WGS84 decimal degrees.
//!
//! Distances are returned in meters, the unit the listing API exposes. The
//! haversine formula on a spherical earth is accurate to well under 0.5% for
//! the city-scale distances food rescue operates at.

use std::f64::consts::PI;

use crate::types::Coordinate;

/// Mean earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

const DEG_TO_RAD: f64 = PI / 180.0;

/// Great-circle distance between two positions, in meters.
pub fn distance_m(from: &Coordinate, to: &Coordinate) -> f64 {
    let lat1_rad = from.lat * DEG_TO_RAD;
    let lat2_rad = to.lat * DEG_TO_RAD;
    let delta_lat = (to.lat - from.lat) * DEG_TO_RAD;
    let delta_lng = (to.lng - from.lng) * DEG_TO_RAD;

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}
