//! # External alignment tool invocation
//!
//! Builds argument lists for and runs the **`pc_align`** program from the
//! NASA Ames Stereo Pipeline, the only process boundary in the crate
//! besides file I/O.
//!
//! ## Overview
//! -----------------
//! - [`RefShape`] – the reference shape heights are measured against,
//!   either a named datum or explicit ellipsoid semi-axes.
//! - [`apply_transform_args`] – arguments for the apply-only mode (an
//!   existing transform matrix, zero iterations).
//! - [`fit_args`] – arguments for the fitting mode used by the surface-fit
//!   workflow, with caller-supplied passthrough arguments.
//! - [`run_pc_align`] – blocking subprocess invocation with combined
//!   stdout/stderr capture.
//! - [`read_transformed_points`] – reader for the `-trans_source.csv`
//!   artifact the tool writes next to its output prefix.
//!
//! `pc_align`'s CLI contract is positional: flags first, then the source
//! and reference clouds as the two trailing arguments. The argument
//! builders preserve that order exactly; rearranging them produces a run
//! that "succeeds" with a wrong transform.
//!
//! ## Error Handling
//! -----------------
//! A non-zero exit becomes [`GroundPointError::ExternalTool`] carrying the
//! exit status and everything the tool printed. Nothing is retried; the
//! tool validates its own arguments and its output is trusted as-is.

use std::process::{Command, Stdio};

use camino::Utf8Path;
use itertools::Itertools;
use log::debug;

use crate::constants::{Datum, Degree, Meter};
use crate::groundpoint_errors::GroundPointError;

/// Program name resolved on `PATH`.
pub const PC_ALIGN: &str = "pc_align";

/// Reference shape for heights in the point files handed to `pc_align`.
#[derive(Debug, Clone, PartialEq)]
pub enum RefShape {
    /// A named datum from the tool's fixed set.
    Datum(Datum),
    /// Explicit ellipsoid semi-axes, meters.
    Radii { semi_major: Meter, semi_minor: Meter },
}

impl RefShape {
    /// The `--datum` or `--semi-major-axis`/`--semi-minor-axis` arguments.
    pub fn to_args(&self) -> Vec<String> {
        match self {
            RefShape::Datum(datum) => vec!["--datum".into(), datum.to_string()],
            RefShape::Radii {
                semi_major,
                semi_minor,
            } => vec![
                "--semi-major-axis".into(),
                semi_major.to_string(),
                "--semi-minor-axis".into(),
                semi_minor.to_string(),
            ],
        }
    }
}

/// Arguments to apply an existing transform to a point cloud.
///
/// Zero iterations and a disabled max displacement because the transform is
/// only applied, never re-estimated. The same CSV is passed as both source
/// and reference cloud: the tool requires two clouds even when it is not
/// iterating.
pub fn apply_transform_args(
    transform_matrix: &Utf8Path,
    output_prefix: &Utf8Path,
    ref_shape: &RefShape,
    cloud_csv: &Utf8Path,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--initial-transform".into(),
        transform_matrix.to_string(),
        "--num-iterations".into(),
        "0".into(),
        "--max-displacement".into(),
        "-1".into(),
        "--save-transformed-source-points".into(),
        "-o".into(),
        output_prefix.to_string(),
    ];
    args.extend(ref_shape.to_args());
    args.push(cloud_csv.to_string());
    args.push(cloud_csv.to_string());
    args
}

/// Arguments to fit a transform aligning `source_cloud` to `ref_cloud`.
///
/// `extra_args` is the caller's verbatim passthrough (at minimum
/// `--max-displacement`); it goes after the reference-shape arguments and
/// before the trailing cloud paths.
pub fn fit_args(
    output_prefix: &Utf8Path,
    ref_shape: &RefShape,
    extra_args: &[String],
    source_cloud: &Utf8Path,
    ref_cloud: &Utf8Path,
) -> Vec<String> {
    let mut args: Vec<String> = vec![
        "--save-inv-transformed-reference-points".into(),
        "-o".into(),
        output_prefix.to_string(),
    ];
    args.extend(ref_shape.to_args());
    args.extend(extra_args.iter().cloned());
    args.push(source_cloud.to_string());
    args.push(ref_cloud.to_string());
    args
}

/// Run the alignment program to completion, returning its combined
/// stdout/stderr output.
///
/// The call blocks until the program exits; there is no timeout. A
/// non-zero exit (or a signal death, reported as status -1) is returned as
/// [`GroundPointError::ExternalTool`] together with the captured output.
pub fn run_pc_align(program: &str, args: &[String]) -> Result<String, GroundPointError> {
    debug!("running {program} {}", args.join(" "));
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()?;

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    if !output.status.success() {
        return Err(GroundPointError::ExternalTool {
            program: program.to_string(),
            status: output.status.code().unwrap_or(-1),
            output: combined,
        });
    }
    Ok(combined)
}

/// One row of the tool's transformed-source artifact, degrees with
/// longitude in [0, 360).
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedPoint {
    pub lat: Degree,
    pub lon: Degree,
    pub height: Meter,
}

/// Parse the content of a `-trans_source.csv` artifact.
///
/// The tool writes three comment lines before the `lat,lon,height` data
/// rows; rows carry no point identifiers, so association back to the
/// exported points is positional.
pub fn parse_transformed_points(content: &str) -> Result<Vec<TransformedPoint>, GroundPointError> {
    let data: String = content.lines().skip(3).join("\n");
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_reader(data.as_bytes());

    let mut points = Vec::new();
    for record in reader.deserialize::<(f64, f64, f64)>() {
        let (lat, lon, height) = record?;
        points.push(TransformedPoint { lat, lon, height });
    }
    Ok(points)
}

/// Read a `-trans_source.csv` artifact from disk.
pub fn read_transformed_points(
    path: &Utf8Path,
) -> Result<Vec<TransformedPoint>, GroundPointError> {
    let content = std::fs::read_to_string(path)?;
    parse_transformed_points(&content)
}

#[cfg(test)]
mod align_tests {
    use super::*;
    use camino::Utf8Path;

    #[test]
    fn test_apply_transform_argument_order() {
        let shape = RefShape::Datum(Datum::DMars);
        let args = apply_transform_args(
            Utf8Path::new("run-transform.txt"),
            Utf8Path::new("out/tfm_points"),
            &shape,
            Utf8Path::new("points.csv"),
        );
        assert_eq!(
            args,
            vec![
                "--initial-transform",
                "run-transform.txt",
                "--num-iterations",
                "0",
                "--max-displacement",
                "-1",
                "--save-transformed-source-points",
                "-o",
                "out/tfm_points",
                "--datum",
                "D_MARS",
                "points.csv",
                "points.csv",
            ]
        );
    }

    #[test]
    fn test_fit_argument_order_with_passthrough() {
        let shape = RefShape::Radii {
            semi_major: 3396190.0,
            semi_minor: 3376200.0,
        };
        let extra = vec!["--max-displacement".to_string(), "300".to_string()];
        let args = fit_args(
            Utf8Path::new("dtm_pcAligned_DTM"),
            &shape,
            &extra,
            Utf8Path::new("socet_dtm.csv"),
            Utf8Path::new("mola_RefPC.csv"),
        );
        assert_eq!(
            args,
            vec![
                "--save-inv-transformed-reference-points",
                "-o",
                "dtm_pcAligned_DTM",
                "--semi-major-axis",
                "3396190",
                "--semi-minor-axis",
                "3376200",
                "--max-displacement",
                "300",
                "socet_dtm.csv",
                "mola_RefPC.csv",
            ]
        );
    }

    #[test]
    fn test_parse_transformed_points_skips_three_header_lines() {
        let content = "\
# Created by pc_align
# latitude,longitude,height above datum (meters)
# lat,lon,height
10.5,350.25,1234.5
-4.25,10,-20
";
        let points = parse_transformed_points(content).unwrap();
        assert_eq!(
            points,
            vec![
                TransformedPoint {
                    lat: 10.5,
                    lon: 350.25,
                    height: 1234.5
                },
                TransformedPoint {
                    lat: -4.25,
                    lon: 10.0,
                    height: -20.0
                },
            ]
        );
    }

    #[test]
    fn test_parse_transformed_points_rejects_garbage() {
        let content = "a\nb\nc\n1.0,not_a_number,3.0\n";
        assert!(parse_transformed_points(content).is_err());
    }

    #[test]
    fn test_run_reports_exit_status_and_output() {
        let args = vec!["-c".to_string(), "echo doomed; exit 3".to_string()];
        let err = run_pc_align("sh", &args).unwrap_err();
        match err {
            GroundPointError::ExternalTool {
                program,
                status,
                output,
            } => {
                assert_eq!(program, "sh");
                assert_eq!(status, 3);
                assert!(output.contains("doomed"));
            }
            other => panic!("expected ExternalTool error, got {other:?}"),
        }
    }

    #[test]
    fn test_run_captures_stdout_and_stderr() {
        let args = vec!["-c".to_string(), "echo out; echo err 1>&2".to_string()];
        let output = run_pc_align("sh", &args).unwrap();
        assert!(output.contains("out"));
        assert!(output.contains("err"));
    }
}
