//! # Socet Ground Point File (GPF) reader and writer
//!
//! Utilities to parse a Socet Set/GXP **Ground Point File** into
//! [`GroundPoint`] records and to serialize a record set back to disk.
//!
//! ## Overview
//! -----------------
//! A GPF is a whitespace-delimited text table with a three-line preamble:
//! the magic line `GROUND POINT FILE`, the point count, and the column
//! header. Each point then occupies twelve values, conventionally laid out
//! as four data lines followed by a blank separator line:
//!
//! ```text
//! GROUND POINT FILE
//! 2
//! point_id,stat,known,lat_Y_North,long_X_East,ht,sig(3),res(3)
//! ORB_0001 1 0
//! 0.29714059913  2.14911218180         -2517.40
//! 1.0 1.0 1.0
//! 0.0 0.0 0.0
//! ...
//! ```
//!
//! ## Units & Conventions
//! -----------------
//! - `lat_Y_North` / `long_X_East` are stored in **radians**, positive
//!   north/east; `ht` and the sigma values are in meters.
//! - `stat` and `known` are small unsigned integers (see
//!   [`crate::constants`]).
//! - Row order is significant and preserved verbatim by [`save_gpf`].
//! - Output files use CRLF line endings; Socet expects them.
//!
//! ## Error Handling
//! -----------------
//! Structural problems (missing magic line, point count mismatch, a token
//! stream that is not a whole number of 12-column rows, non-numeric
//! fields) surface as [`GroundPointError::Format`] naming the offending
//! file or point.

use std::fmt::Write as _;
use std::str::FromStr;

use camino::Utf8Path;

use crate::constants::{Meter, PointId, Radian, KNOWN_TIE, STAT_ACTIVE};
use crate::groundpoint_errors::GroundPointError;

/// Magic first line of a GPF.
pub const GPF_MAGIC: &str = "GROUND POINT FILE";

/// Canonical GPF column header.
pub const GPF_HEADER: &str = "point_id,stat,known,lat_Y_North,long_X_East,ht,sig(3),res(3)";

/// Number of columns per ground point.
const GPF_COLUMNS: usize = 12;

/// One row of a Ground Point File.
#[derive(Debug, Clone, PartialEq)]
pub struct GroundPoint {
    /// Unique point identifier, the key for every join.
    pub point_id: PointId,
    /// 0 = inactive, 1 = active.
    pub stat: u8,
    /// Point type: 0 = tie, 3 = XYZ Control (1/2 = partial control).
    pub known: u8,
    /// Geodetic latitude, radians, positive north.
    pub lat: Radian,
    /// Geodetic longitude, radians, positive east, (-180, 180] domain.
    pub lon: Radian,
    /// Height above the reference shape, meters.
    pub height: Meter,
    /// Per-axis uncertainties, meters.
    pub sigmas: [f64; 3],
    /// Per-axis adjustment residuals.
    pub residuals: [f64; 3],
}

impl GroundPoint {
    pub fn is_active(&self) -> bool {
        self.stat == STAT_ACTIVE
    }

    pub fn is_tie(&self) -> bool {
        self.known == KNOWN_TIE
    }
}

fn parse_field<T: FromStr>(token: &str, field: &str, point: &str) -> Result<T, GroundPointError> {
    token.parse().map_err(|_| {
        GroundPointError::Format(format!("point '{point}': invalid {field} value '{token}'"))
    })
}

/// Parse the content of a GPF into records (order preserved).
///
/// Arguments
/// -----------------
/// * `content` – Full text of a GPF.
/// * `origin` – Name used in error messages, typically the file path.
///
/// Return
/// ----------
/// * The parsed points, or a [`GroundPointError::Format`] describing the
///   first structural problem found.
pub fn parse_gpf(content: &str, origin: &str) -> Result<Vec<GroundPoint>, GroundPointError> {
    let mut lines = content.lines();

    let magic = lines.next().unwrap_or("").trim();
    if magic != GPF_MAGIC {
        return Err(GroundPointError::Format(format!(
            "{origin}: missing '{GPF_MAGIC}' header line"
        )));
    }

    let count_line = lines.next().unwrap_or("").trim();
    let declared: usize = count_line.parse().map_err(|_| {
        GroundPointError::Format(format!("{origin}: invalid point count '{count_line}'"))
    })?;

    let header: String = lines
        .next()
        .unwrap_or("")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if header != GPF_HEADER {
        return Err(GroundPointError::Format(format!(
            "{origin}: unexpected column header '{header}' (expected '{GPF_HEADER}')"
        )));
    }

    let tokens: Vec<&str> = lines.flat_map(str::split_whitespace).collect();
    if tokens.len() % GPF_COLUMNS != 0 {
        return Err(GroundPointError::Format(format!(
            "{origin}: {} values is not a whole number of {GPF_COLUMNS}-column rows",
            tokens.len()
        )));
    }

    let mut points = Vec::with_capacity(tokens.len() / GPF_COLUMNS);
    for row in tokens.chunks_exact(GPF_COLUMNS) {
        let id = row[0];
        points.push(GroundPoint {
            point_id: id.to_string(),
            stat: parse_field(row[1], "stat", id)?,
            known: parse_field(row[2], "known", id)?,
            lat: parse_field(row[3], "lat_Y_North", id)?,
            lon: parse_field(row[4], "long_X_East", id)?,
            height: parse_field(row[5], "ht", id)?,
            sigmas: [
                parse_field(row[6], "sig0", id)?,
                parse_field(row[7], "sig1", id)?,
                parse_field(row[8], "sig2", id)?,
            ],
            residuals: [
                parse_field(row[9], "res0", id)?,
                parse_field(row[10], "res1", id)?,
                parse_field(row[11], "res2", id)?,
            ],
        });
    }

    if points.len() != declared {
        return Err(GroundPointError::Format(format!(
            "{origin}: header declares {declared} points but {} were found",
            points.len()
        )));
    }

    Ok(points)
}

/// Read a GPF from disk.
pub fn read_gpf(path: &Utf8Path) -> Result<Vec<GroundPoint>, GroundPointError> {
    let content = std::fs::read_to_string(path)?;
    parse_gpf(&content, path.as_str())
}

/// Serialize points to the canonical GPF block layout (CRLF line endings).
pub fn format_gpf(points: &[GroundPoint]) -> String {
    let mut out = String::new();
    let _ = write!(out, "{GPF_MAGIC}\r\n{}\r\n{GPF_HEADER}\r\n", points.len());
    for p in points {
        let _ = write!(
            out,
            "{} {} {}\r\n{}         {}         {}\r\n{} {} {}\r\n{} {} {}\r\n\r\n",
            p.point_id,
            p.stat,
            p.known,
            p.lat,
            p.lon,
            p.height,
            p.sigmas[0],
            p.sigmas[1],
            p.sigmas[2],
            p.residuals[0],
            p.residuals[1],
            p.residuals[2],
        );
    }
    out
}

/// Write points to disk as a GPF, preserving their order.
pub fn save_gpf(points: &[GroundPoint], path: &Utf8Path) -> Result<(), GroundPointError> {
    std::fs::write(path, format_gpf(points))?;
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_point(id: &str, stat: u8, known: u8) -> GroundPoint {
    GroundPoint {
        point_id: id.to_string(),
        stat,
        known,
        lat: 0.5,
        lon: -1.25,
        height: 100.0,
        sigmas: [10.0, 10.0, 10.0],
        residuals: [0.1, 0.2, 0.3],
    }
}

#[cfg(test)]
mod gpf_tests {
    use super::*;

    const SAMPLE: &str = "\
GROUND POINT FILE
2
point_id,stat,known,lat_Y_North,long_X_East,ht,sig(3),res(3)
ORB_0001 1 0
0.29714059913         2.14911218180         -2517.4
1.0 1.0 1.0
0.0 0.0 0.0

ORB_0002 0 3
-0.10471975512         -0.52359877560         815.25
2.5 2.5 3.5
0.5 0.5 0.5
";

    #[test]
    fn test_parse_valid_gpf() {
        let points = parse_gpf(SAMPLE, "sample").unwrap();
        assert_eq!(points.len(), 2);

        assert_eq!(points[0].point_id, "ORB_0001");
        assert_eq!(points[0].stat, 1);
        assert_eq!(points[0].known, 0);
        assert_eq!(points[0].lat, 0.29714059913);
        assert_eq!(points[0].lon, 2.1491121818);
        assert_eq!(points[0].height, -2517.4);
        assert_eq!(points[0].sigmas, [1.0, 1.0, 1.0]);

        assert_eq!(points[1].point_id, "ORB_0002");
        assert!(!points[1].is_active());
        assert!(!points[1].is_tie());
        assert_eq!(points[1].residuals, [0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_parse_missing_magic() {
        let bad = SAMPLE.replace(GPF_MAGIC, "GROUND CONTROL FILE");
        let err = parse_gpf(&bad, "sample").unwrap_err();
        assert!(matches!(err, GroundPointError::Format(_)));
    }

    #[test]
    fn test_parse_count_mismatch() {
        let bad = SAMPLE.replace("\n2\n", "\n3\n");
        let err = parse_gpf(&bad, "sample").unwrap_err();
        assert!(matches!(err, GroundPointError::Format(_)));
    }

    #[test]
    fn test_parse_unexpected_header() {
        let bad = SAMPLE.replace("lat_Y_North", "latitude");
        let err = parse_gpf(&bad, "sample").unwrap_err();
        assert!(matches!(err, GroundPointError::Format(_)));
    }

    #[test]
    fn test_parse_inconsistent_row_width() {
        // drop one residual from the last point
        let bad = SAMPLE.replace("0.5 0.5 0.5", "0.5 0.5");
        let err = parse_gpf(&bad, "sample").unwrap_err();
        assert!(matches!(err, GroundPointError::Format(_)));
    }

    #[test]
    fn test_parse_non_numeric_field() {
        let bad = SAMPLE.replace("815.25", "tall");
        let err = parse_gpf(&bad, "sample").unwrap_err();
        match err {
            GroundPointError::Format(msg) => {
                assert!(msg.contains("ORB_0002"));
                assert!(msg.contains("ht"));
            }
            other => panic!("expected Format error, got {other:?}"),
        }
    }

    #[test]
    fn test_format_round_trip_preserves_order_and_values() {
        let points = vec![
            test_point("B_SECOND", 1, 2),
            test_point("A_FIRST", 0, 0),
            GroundPoint {
                point_id: "FRAC".into(),
                stat: 1,
                known: 3,
                lat: 0.1234567890123456,
                lon: -3.0409741429,
                height: -2517.4,
                sigmas: [1.0, 1.0, 1.0],
                residuals: [0.0, 0.0, 0.0],
            },
        ];
        let text = format_gpf(&points);
        assert!(text.starts_with("GROUND POINT FILE\r\n3\r\n"));
        assert!(text.contains(GPF_HEADER));

        let reparsed = parse_gpf(&text, "round-trip").unwrap();
        assert_eq!(reparsed, points);
    }
}
