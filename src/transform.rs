//! # Ground point transformation and merge
//!
//! The core workflow of the crate: select the points of a GPF to update,
//! hand them to `pc_align` in its CSV convention, and merge the transformed
//! coordinates back into the full record set with the point-type
//! reclassification applied.
//!
//! ## Overview
//! -----------------
//! - [`active_subset`] – the point filter (all active points, or active
//!   tie points only).
//! - [`write_align_csv`] – headerless `lat,lon,height` export in degrees /
//!   [0, 360), the format `pc_align` reads by default.
//! - [`apply_transformed`] – positional re-association of the tool's
//!   output rows with the exported points.
//! - [`merge_coordinates`] – id-keyed overwrite of coordinates in the full
//!   set, failing loudly on duplicate or unknown ids.
//! - [`reclassify`] – the point-type state machine run after a merge.
//! - [`transform_gpf`] / [`apply_transform_to_gpf`] – the end-to-end
//!   apply-an-existing-matrix workflow.
//!
//! ## Reclassification
//! -----------------
//! Conditioned on `stat == 1`, per merge:
//!
//! ```text
//! all points updated:    any known --> 3, sigmas = 1.0, residuals = 0.0
//! tie points only:       1|2 --> 0 --> 3    (demote, then promote)
//!                        0 --> 3            sigmas = 1.0, residuals = 0.0
//!                        3 --> 3            (terminal, untouched)
//! ```
//!
//! The demotion pass must run before the promotion pass so demoted points
//! are promoted in the same merge. Inactive points never change. Running
//! the same merge twice leaves the set unchanged after the first run.

use std::collections::{HashMap, HashSet};

use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use log::info;

use crate::align::{self, RefShape, TransformedPoint};
use crate::constants::{
    CONTROL_RESIDUAL, CONTROL_SIGMA, KNOWN_TIE, KNOWN_XYZ_CONTROL,
};
use crate::coords;
use crate::gpf::{self, GroundPoint};
use crate::groundpoint_errors::GroundPointError;

/// Clone the points selected for transformation, preserving input order.
///
/// With `all_points` set the predicate is `stat == 1`; otherwise
/// `stat == 1 && known == 0` (active tie points only). The clones keep
/// their `point_id`, which is what links them back during the merge.
pub fn active_subset(points: &[GroundPoint], all_points: bool) -> Vec<GroundPoint> {
    points
        .iter()
        .filter(|p| p.is_active() && (all_points || p.is_tie()))
        .cloned()
        .collect()
}

/// Export points as a headerless `lat,lon,height` CSV in the degree /
/// [0, 360) convention `pc_align` expects.
pub fn write_align_csv(
    points: &[GroundPoint],
    path: &Utf8Path,
) -> Result<(), GroundPointError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    for p in points {
        let (lat, lon) = coords::export_lat_lon(p.lat, p.lon);
        writer.serialize((lat, lon, p.height))?;
    }
    writer.flush()?;
    Ok(())
}

/// Copy transformed coordinates onto the exported subset, by position.
///
/// The `-trans_source.csv` artifact carries no point identifiers; the tool
/// preserves input row order, so row *i* belongs to subset point *i*. A
/// count mismatch means the association is broken and is a join failure.
pub fn apply_transformed(
    subset: &mut [GroundPoint],
    transformed: &[TransformedPoint],
) -> Result<(), GroundPointError> {
    if subset.len() != transformed.len() {
        return Err(GroundPointError::Join(format!(
            "{} transformed points returned for {} exported points",
            transformed.len(),
            subset.len()
        )));
    }
    for (point, tfm) in subset.iter_mut().zip(transformed) {
        let (lat, lon) = coords::import_lat_lon(tfm.lat, tfm.lon);
        point.lat = lat;
        point.lon = lon;
        point.height = tfm.height;
    }
    Ok(())
}

/// Overwrite coordinates in `points` from `subset`, keyed on `point_id`.
///
/// Every subset id must resolve to exactly one point; duplicates on either
/// side or an id missing from `points` abort with
/// [`GroundPointError::Join`] rather than dropping rows. Row order of
/// `points` is untouched.
pub fn merge_coordinates(
    points: &mut [GroundPoint],
    subset: &[GroundPoint],
) -> Result<(), GroundPointError> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(points.len());
    for (i, p) in points.iter().enumerate() {
        if index.insert(p.point_id.as_str(), i).is_some() {
            return Err(GroundPointError::Join(format!(
                "duplicate point id '{}' in ground point file",
                p.point_id
            )));
        }
    }

    let mut seen: HashSet<&str> = HashSet::with_capacity(subset.len());
    let mut updates: Vec<(usize, &GroundPoint)> = Vec::with_capacity(subset.len());
    for s in subset {
        if !seen.insert(s.point_id.as_str()) {
            return Err(GroundPointError::Join(format!(
                "duplicate point id '{}' in transformed subset",
                s.point_id
            )));
        }
        match index.get(s.point_id.as_str()) {
            Some(&i) => updates.push((i, s)),
            None => {
                return Err(GroundPointError::Join(format!(
                    "transformed point id '{}' not present in ground point file",
                    s.point_id
                )))
            }
        }
    }

    for (i, s) in updates {
        points[i].lat = s.lat;
        points[i].lon = s.lon;
        points[i].height = s.height;
    }
    Ok(())
}

fn promote(point: &mut GroundPoint) {
    point.known = KNOWN_XYZ_CONTROL;
    point.sigmas = [CONTROL_SIGMA; 3];
    point.residuals = [CONTROL_RESIDUAL; 3];
}

/// Run the point-type state machine over active points (see module docs).
pub fn reclassify(points: &mut [GroundPoint], all_points: bool) {
    if all_points {
        for point in points.iter_mut().filter(|p| p.is_active()) {
            promote(point);
        }
        return;
    }

    // Demote partial control (XY/Z) to tie before the promotion pass, so
    // those points reach XYZ Control in the same merge. XYZ Control is
    // terminal and stays untouched.
    for point in points
        .iter_mut()
        .filter(|p| p.is_active() && p.known > KNOWN_TIE && p.known != KNOWN_XYZ_CONTROL)
    {
        point.known = KNOWN_TIE;
    }
    for point in points.iter_mut().filter(|p| p.is_active() && p.is_tie()) {
        promote(point);
    }
}

/// Apply a transform matrix to the selected points of `gpf_path` via
/// `pc_align` and write the merged result to `out_gpf`.
///
/// Arguments
/// -----------------
/// * `program` – Alignment program to run, normally [`align::PC_ALIGN`].
/// * `gpf_path` – Input GPF; its stem also names the exported CSV and the
///   `.tiePointIds.txt` sidecar.
/// * `out_gpf` – Output GPF path; must carry the `.gpf` extension.
/// * `transform_matrix` – pc_align-compatible transform to apply.
/// * `all_points` – Update every active point instead of tie points only.
/// * `ref_shape` – Datum or ellipsoid radii for heights in the GPF.
pub fn transform_gpf(
    program: &str,
    gpf_path: &Utf8Path,
    transform_matrix: &Utf8Path,
    out_gpf: &Utf8Path,
    all_points: bool,
    ref_shape: &RefShape,
) -> Result<(), GroundPointError> {
    require_gpf_extension(out_gpf)?;
    let align_prefix = out_gpf.with_extension("");
    apply_transform_to_gpf(
        program,
        gpf_path,
        out_gpf,
        transform_matrix,
        &align_prefix,
        all_points,
        ref_shape,
    )
}

/// Validate that an output path carries the `.gpf` extension.
pub fn require_gpf_extension(path: &Utf8Path) -> Result<(), GroundPointError> {
    if path.extension() != Some("gpf") {
        return Err(GroundPointError::Validation(format!(
            "output file name '{path}' must include the \".gpf\" extension"
        )));
    }
    Ok(())
}

/// Shared tail of the transform and surface-fit workflows: export, apply
/// the matrix with `pc_align`, merge the result, reclassify, save.
pub(crate) fn apply_transform_to_gpf(
    program: &str,
    gpf_path: &Utf8Path,
    out_gpf: &Utf8Path,
    transform_matrix: &Utf8Path,
    align_prefix: &Utf8Path,
    all_points: bool,
    ref_shape: &RefShape,
) -> Result<(), GroundPointError> {
    let mut points = gpf::read_gpf(gpf_path)?;
    let mut subset = active_subset(&points, all_points);
    info!(
        "selected {} of {} points for transformation",
        subset.len(),
        points.len()
    );

    let cloud_csv = gpf_path.with_extension("csv");
    write_align_csv(&subset, &cloud_csv)?;

    let args = align::apply_transform_args(transform_matrix, align_prefix, ref_shape, &cloud_csv);
    info!("applying transform {transform_matrix} with {program} (0 iterations)");
    align::run_pc_align(program, &args)?;

    let trans_csv = Utf8PathBuf::from(format!("{align_prefix}-trans_source.csv"));
    let transformed = align::read_transformed_points(&trans_csv)?;
    apply_transformed(&mut subset, &transformed)?;

    info!("merging transformed coordinates into the ground point set");
    merge_coordinates(&mut points, &subset)?;
    reclassify(&mut points, all_points);

    info!("writing transformed GPF to {out_gpf}");
    gpf::save_gpf(&points, out_gpf)?;

    // Legacy sidecar listing the ids of the transformed points.
    let ids_path = gpf_path.with_extension("tiePointIds.txt");
    let ids = subset.iter().map(|p| p.point_id.as_str()).join("\n");
    std::fs::write(&ids_path, ids + "\n")?;

    Ok(())
}
