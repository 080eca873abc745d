//! # Surface-fit workflow
//!
//! Aligns the points of a GPF to a reference elevation data set by acting
//! as a thin wrapper around `pc_align`. Tie points are usually too sparse
//! to register reliably on their own, so the fit runs in two stages:
//!
//! 1. align a (possibly low-resolution) DTM derived from the stereo pair
//!    to the reference elevation set, producing a transform matrix;
//! 2. apply that matrix to the selected GPF points with a zero-iteration
//!    `pc_align` run and merge the result (see [`crate::transform`]).
//!
//! Reference and source elevation data arrive in a few tabular flavors
//! that `pc_align` cannot read directly; the adapters here rewrite them as
//! the headerless `lat,lon,height` CSV it understands.

use std::str::FromStr;

use camino::{Utf8Path, Utf8PathBuf};
use log::{info, warn};

use crate::align::{self, RefShape};
use crate::groundpoint_errors::GroundPointError;
use crate::transform;

/// Format of the reference elevation data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefFormat {
    /// Socet ASCII DTM.
    AsciiDtm,
    /// Any pc_align-compatible comma-delimited text file.
    Csv,
    /// Any pc_align-compatible raster, such as GeoTIFF.
    Raster,
    /// Tabular MOLA topography from pedr2tab (legacy; heights above geoid).
    Table,
}

impl FromStr for RefFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ascii_dtm" => Ok(RefFormat::AsciiDtm),
            "csv" => Ok(RefFormat::Csv),
            "raster" => Ok(RefFormat::Raster),
            "table" => Ok(RefFormat::Table),
            _ => Err(format!(
                "unknown reference format '{s}' (expected ascii_dtm, csv, raster or table)"
            )),
        }
    }
}

/// Format of the Socet DTM to be aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    AsciiDtm,
    Csv,
    Raster,
}

impl FromStr for SourceFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ascii_dtm" => Ok(SourceFormat::AsciiDtm),
            "csv" => Ok(SourceFormat::Csv),
            "raster" => Ok(SourceFormat::Raster),
            _ => Err(format!(
                "unknown source format '{s}' (expected ascii_dtm, csv or raster)"
            )),
        }
    }
}

/// Number of header lines preceding the data block of a Socet ASCII DTM.
const ASCII_DTM_HEADER_LINES: usize = 14;

/// Rewrite a Socet ASCII DTM as a pc_align CSV.
///
/// The DTM stores `lon lat z` triplets after its header block; pc_align's
/// default CSV order is `lat,lon,z`, so the first two columns are swapped
/// on the way out.
pub fn ascii_dtm_to_csv(
    ascii_dtm: &Utf8Path,
    outname: &Utf8Path,
) -> Result<(), GroundPointError> {
    let content = std::fs::read_to_string(ascii_dtm)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(outname)?;

    for line in content.lines().skip(ASCII_DTM_HEADER_LINES) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() != 3 {
            return Err(GroundPointError::Format(format!(
                "{ascii_dtm}: expected 'lon lat z' triplets, found {} values",
                fields.len()
            )));
        }
        let lon: f64 = parse_elevation_field(fields[0], "longitude", ascii_dtm)?;
        let lat: f64 = parse_elevation_field(fields[1], "latitude", ascii_dtm)?;
        let z: f64 = parse_elevation_field(fields[2], "height", ascii_dtm)?;
        writer.serialize((lat, lon, z))?;
    }
    writer.flush()?;
    Ok(())
}

/// Rewrite a MOLA PEDR table from pedr2tab as a pc_align CSV.
///
/// The first line names the columns (pedr2tab emits different column sets
/// depending on its flags), the two lines after it are skipped, and the
/// planetographic latitude / east longitude / topography columns are
/// written out as `lat,lon,z`.
///
/// pc_align does not know these heights are relative to a geoid; the
/// caller warns about it. Supported for legacy compatibility only.
pub fn pedr_table_to_csv(table: &Utf8Path, outname: &Utf8Path) -> Result<(), GroundPointError> {
    let content = std::fs::read_to_string(table)?;
    let mut lines = content.lines();

    let columns: Vec<&str> = lines.next().unwrap_or("").split_whitespace().collect();
    let column_index = |name: &str| {
        columns.iter().position(|c| *c == name).ok_or_else(|| {
            GroundPointError::Format(format!("{table}: missing '{name}' column"))
        })
    };
    let lat_idx = column_index("areod_lat")?;
    let lon_idx = column_index("long_East")?;
    let topo_idx = column_index("topography")?;

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(outname)?;

    for line in lines.skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() != columns.len() {
            return Err(GroundPointError::Format(format!(
                "{table}: row has {} values for {} columns",
                fields.len(),
                columns.len()
            )));
        }
        let lat: f64 = parse_elevation_field(fields[lat_idx], "areod_lat", table)?;
        let lon: f64 = parse_elevation_field(fields[lon_idx], "long_East", table)?;
        let topo: f64 = parse_elevation_field(fields[topo_idx], "topography", table)?;
        writer.serialize((lat, lon, topo))?;
    }
    writer.flush()?;
    Ok(())
}

fn parse_elevation_field(
    token: &str,
    field: &str,
    origin: &Utf8Path,
) -> Result<f64, GroundPointError> {
    token.parse().map_err(|_| {
        GroundPointError::Format(format!("{origin}: invalid {field} value '{token}'"))
    })
}

fn stem_path(path: &Utf8Path) -> Utf8PathBuf {
    path.with_extension("")
}

/// Resolve the reference elevation input to a pc_align-readable path,
/// converting tabular flavors to CSV next to the input.
fn prepare_reference(
    ref_dtm: &Utf8Path,
    ref_format: RefFormat,
) -> Result<Utf8PathBuf, GroundPointError> {
    match ref_format {
        RefFormat::Table => {
            warn!("using MOLA heights above geoid");
            let out = Utf8PathBuf::from(format!("{}_RefPC.csv", stem_path(ref_dtm)));
            pedr_table_to_csv(ref_dtm, &out)?;
            Ok(out)
        }
        RefFormat::AsciiDtm => {
            let out = Utf8PathBuf::from(format!("{}_RefPC.csv", stem_path(ref_dtm)));
            ascii_dtm_to_csv(ref_dtm, &out)?;
            Ok(out)
        }
        RefFormat::Csv | RefFormat::Raster => Ok(ref_dtm.to_path_buf()),
    }
}

/// Resolve the Socet DTM input to a pc_align-readable path.
fn prepare_source(
    socet_dtm: &Utf8Path,
    socet_format: SourceFormat,
) -> Result<Utf8PathBuf, GroundPointError> {
    match socet_format {
        SourceFormat::AsciiDtm => {
            let out = socet_dtm.with_extension("csv");
            ascii_dtm_to_csv(socet_dtm, &out)?;
            Ok(out)
        }
        SourceFormat::Csv | SourceFormat::Raster => Ok(socet_dtm.to_path_buf()),
    }
}

/// Run the full two-stage surface fit.
///
/// Arguments
/// -----------------
/// * `program` – Alignment program, normally [`align::PC_ALIGN`].
/// * `ref_dtm` / `ref_format` – Reference elevation data.
/// * `socet_dtm` / `socet_format` – The DTM to align; its stem names the
///   stage output prefixes.
/// * `socet_gpf` – GPF whose points receive the fitted transform.
/// * `tfm_socet_gpf` – Output GPF; must carry the `.gpf` extension.
/// * `all_points` – Update every active point instead of tie points only.
/// * `ref_shape` – Datum or ellipsoid radii for heights in the inputs.
/// * `pc_align_args` – Extra arguments passed verbatim to the fitting run
///   (at minimum `--max-displacement`).
#[allow(clippy::too_many_arguments)]
pub fn surface_fit(
    program: &str,
    ref_dtm: &Utf8Path,
    ref_format: RefFormat,
    socet_dtm: &Utf8Path,
    socet_format: SourceFormat,
    socet_gpf: &Utf8Path,
    tfm_socet_gpf: &Utf8Path,
    all_points: bool,
    ref_shape: &RefShape,
    pc_align_args: &[String],
) -> Result<(), GroundPointError> {
    transform::require_gpf_extension(tfm_socet_gpf)?;

    let ref_cloud = prepare_reference(ref_dtm, ref_format)?;
    let source_cloud = prepare_source(socet_dtm, socet_format)?;

    let dtm_stem = stem_path(socet_dtm);
    let align_prefix = Utf8PathBuf::from(format!("{dtm_stem}_pcAligned_DTM"));
    let gpf_align_prefix = Utf8PathBuf::from(format!("{dtm_stem}_pcAligned_gpfTies"));

    let args = align::fit_args(&align_prefix, ref_shape, pc_align_args, &source_cloud, &ref_cloud);
    info!("aligning {source_cloud} to {ref_cloud}");
    let output = align::run_pc_align(program, &args)?;
    info!("{}", output.trim_end());

    let transform_matrix = Utf8PathBuf::from(format!("{align_prefix}-transform.txt"));
    info!("applying fitted transform to points from {socet_gpf}");
    transform::apply_transform_to_gpf(
        program,
        socet_gpf,
        tfm_socet_gpf,
        &transform_matrix,
        &gpf_align_prefix,
        all_points,
        ref_shape,
    )
}

#[cfg(test)]
mod surface_tests {
    use super::*;

    #[test]
    fn test_format_parsing_is_case_insensitive() {
        assert_eq!("ASCII_DTM".parse::<RefFormat>(), Ok(RefFormat::AsciiDtm));
        assert_eq!("Table".parse::<RefFormat>(), Ok(RefFormat::Table));
        assert_eq!("raster".parse::<SourceFormat>(), Ok(SourceFormat::Raster));
        assert!("dem".parse::<RefFormat>().is_err());
        assert!("table".parse::<SourceFormat>().is_err());
    }

    #[test]
    fn test_ascii_dtm_to_csv_swaps_lat_lon() {
        let dir = tempfile::tempdir().unwrap();
        let dir = camino::Utf8Path::from_path(dir.path()).unwrap();

        let header: String = (0..ASCII_DTM_HEADER_LINES)
            .map(|i| format!("header line {i}\n"))
            .collect();
        let body = "137.25 -4.5 -2517.4\n137.5 -4.75 -2600.0\n";
        let dtm = dir.join("stereo_low_res.asc");
        std::fs::write(&dtm, header + body).unwrap();

        let out = dir.join("stereo_low_res.csv");
        ascii_dtm_to_csv(&dtm, &out).unwrap();

        let csv = std::fs::read_to_string(&out).unwrap();
        let rows: Vec<&str> = csv.lines().collect();
        assert_eq!(rows, ["-4.5,137.25,-2517.4", "-4.75,137.5,-2600.0"]);
    }

    #[test]
    fn test_pedr_table_to_csv_selects_columns() {
        let dir = tempfile::tempdir().unwrap();
        let dir = camino::Utf8Path::from_path(dir.path()).unwrap();

        let table = dir.join("mola.tab");
        std::fs::write(
            &table,
            "long_East areod_lat topography range\n\
             (skipped line)\n\
             137.25 -4.5 -2517.4 400000.0\n\
             137.5 -4.75 -2600.0 400010.0\n",
        )
        .unwrap();

        let out = dir.join("mola_RefPC.csv");
        pedr_table_to_csv(&table, &out).unwrap();

        let csv = std::fs::read_to_string(&out).unwrap();
        let rows: Vec<&str> = csv.lines().collect();
        assert_eq!(rows, ["-4.5,137.25,-2517.4", "-4.75,137.5,-2600.0"]);
    }

    #[test]
    fn test_pedr_table_missing_column_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let dir = camino::Utf8Path::from_path(dir.path()).unwrap();

        let table = dir.join("mola.tab");
        std::fs::write(&table, "long_East topography\n\n1.0 2.0\n").unwrap();

        let err = pedr_table_to_csv(&table, &dir.join("out.csv")).unwrap_err();
        match err {
            GroundPointError::Format(msg) => assert!(msg.contains("areod_lat")),
            other => panic!("expected Format error, got {other:?}"),
        }
    }
}
