//! # Angular unit and longitude-domain conversions
//!
//! Ground point tables store latitude/longitude in **radians** with
//! longitude in the (-180, 180] domain; `pc_align` consumes and produces
//! **degrees** with longitude in the [0, 360) positive-east domain. The
//! helpers here convert between the two conventions and are exact to well
//! under 1e-9 degrees on a round trip — an off-by-a-domain longitude
//! silently corrupts every downstream geodetic join, so the formulas match
//! the external tool's convention precisely.

use crate::constants::{Degree, Radian};

/// Normalize a longitude in degrees to the [0, 360) positive-east domain.
pub fn lon_to_positive_east(lon: Degree) -> Degree {
    lon.rem_euclid(360.0)
}

/// Normalize a longitude in degrees to the [-180, 180) domain.
pub fn lon_to_signed(lon: Degree) -> Degree {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

/// Latitude/longitude of a stored point, converted for export to
/// `pc_align`: degrees, longitude in [0, 360).
pub fn export_lat_lon(lat: Radian, lon: Radian) -> (Degree, Degree) {
    (lat.to_degrees(), lon_to_positive_east(lon.to_degrees()))
}

/// Latitude/longitude as produced by `pc_align`, converted back to the
/// stored convention: radians, longitude in [-180, 180).
pub fn import_lat_lon(lat: Degree, lon: Degree) -> (Radian, Radian) {
    (lat.to_radians(), lon_to_signed(lon).to_radians())
}
