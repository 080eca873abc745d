//! # Constants and type definitions for groundpoint
//!
//! This module centralizes the **point-flag values**, **reclassification
//! constants**, and **common type definitions** used throughout the crate,
//! along with the fixed set of datums understood by `pc_align`.
//!
//! ## Overview
//!
//! - Ground-point `stat`/`known` flag values and their post-merge targets
//! - Reference datums accepted by the external alignment tool
//! - Core type aliases used across the crate

use std::fmt;
use std::str::FromStr;

// -------------------------------------------------------------------------------------------------
// Ground-point flag values
// -------------------------------------------------------------------------------------------------

/// `stat` value of a point excluded from processing
pub const STAT_INACTIVE: u8 = 0;

/// `stat` value of an active point
pub const STAT_ACTIVE: u8 = 1;

/// `known` value of a tie point (coordinates solved during adjustment)
pub const KNOWN_TIE: u8 = 0;

/// `known` value of an XYZ Control point (coordinates held fixed)
pub const KNOWN_XYZ_CONTROL: u8 = 3;

/// Per-axis sigma assigned to points promoted to XYZ Control, in meters
pub const CONTROL_SIGMA: f64 = 1.0;

/// Per-axis residual assigned to points promoted to XYZ Control
pub const CONTROL_RESIDUAL: f64 = 0.0;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Angle in degrees
pub type Degree = f64;
/// Angle in radians
pub type Radian = f64;
/// Distance in meters
pub type Meter = f64;
/// Ground/image point identifier (first column of GPF and IPF tables)
pub type PointId = String;

// -------------------------------------------------------------------------------------------------
// Reference datums
// -------------------------------------------------------------------------------------------------

/// A named reference datum from the fixed set understood by `pc_align`.
///
/// The `Display` form is the exact string the tool expects after `--datum`;
/// parsing accepts the same strings, case-sensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Datum {
    /// IAU Mars sphere
    DMars,
    /// IAU Moon sphere
    DMoon,
    /// MOLA areoid
    Mola,
    Nad27,
    Nad83,
    Wgs72,
    Wgs1984,
}

impl Datum {
    /// Every datum accepted on the command line, in declaration order.
    pub const ALL: [Datum; 7] = [
        Datum::DMars,
        Datum::DMoon,
        Datum::Mola,
        Datum::Nad27,
        Datum::Nad83,
        Datum::Wgs72,
        Datum::Wgs1984,
    ];

    /// The spelling `pc_align` expects after `--datum`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Datum::DMars => "D_MARS",
            Datum::DMoon => "D_MOON",
            Datum::Mola => "MOLA",
            Datum::Nad27 => "NAD27",
            Datum::Nad83 => "NAD83",
            Datum::Wgs72 => "WGS72",
            Datum::Wgs1984 => "WGS_1984",
        }
    }
}

impl fmt::Display for Datum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Datum {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Datum::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| {
                format!(
                    "unknown datum '{s}' (expected one of: {})",
                    Datum::ALL.map(|d| d.as_str()).join(", ")
                )
            })
    }
}

#[cfg(test)]
mod datum_tests {
    use super::*;

    #[test]
    fn test_datum_round_trip() {
        for datum in Datum::ALL {
            assert_eq!(datum.as_str().parse::<Datum>(), Ok(datum));
        }
    }

    #[test]
    fn test_datum_rejects_unknown() {
        assert!("MARS".parse::<Datum>().is_err());
        assert!("d_mars".parse::<Datum>().is_err());
    }
}
