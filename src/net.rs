//! # Point network utilities
//!
//! Housekeeping operations over GPF/IPF point networks: concatenation,
//! inactive-point cleanup with orphan removal, CSV flattening, and random
//! subsampling. All operations preserve input row order except [`sample_gpf`],
//! which intentionally returns its rows in draw order.

use std::collections::{HashMap, HashSet};

use camino::{Utf8Path, Utf8PathBuf};
use log::info;
use rand::seq::index;

use crate::gpf::{self, GroundPoint};
use crate::groundpoint_errors::GroundPointError;
use crate::ipf::{self, ImagePoint};

/// Concatenate GPFs into one file, in argument order.
pub fn merge_gpf(output: &Utf8Path, inputs: &[Utf8PathBuf]) -> Result<(), GroundPointError> {
    let mut all = Vec::new();
    for path in inputs {
        all.extend(gpf::read_gpf(path)?);
    }
    info!("writing {} points to {output}", all.len());
    gpf::save_gpf(&all, output)
}

/// Concatenate IPFs into one file, retagging every measure with the output
/// stem so the result reads back as a single image's point file.
pub fn merge_ipf(output: &Utf8Path, inputs: &[Utf8PathBuf]) -> Result<(), GroundPointError> {
    let mut measures = ipf::read_ipf(inputs)?;
    let stem = output
        .file_stem()
        .ok_or_else(|| GroundPointError::Validation(format!("'{output}' has no file name")))?
        .to_string();
    for m in &mut measures {
        m.source = stem.clone();
    }
    let dir = output.parent().unwrap_or(Utf8Path::new(""));
    info!("writing {} measures to {output}", measures.len());
    ipf::save_ipf(&measures, dir)
}

/// Index active ground points by id, failing loudly on duplicates among
/// the ids that take part in the join.
fn active_id_set<'a>(
    points: &'a [GroundPoint],
) -> Result<HashSet<&'a str>, GroundPointError> {
    let mut ids = HashSet::new();
    for p in points.iter().filter(|p| p.is_active()) {
        if !ids.insert(p.point_id.as_str()) {
            return Err(GroundPointError::Join(format!(
                "duplicate point id '{}' in ground point file",
                p.point_id
            )));
        }
    }
    Ok(ids)
}

/// Drop inactive points from a GPF and its IPFs, then remove orphans.
///
/// Active ground points are inner-joined with active image measures on
/// point id; a point must be measured on at least two images to survive
/// (single-image points cannot constrain an adjustment). Results are
/// written into `output_dir` with `suffix` appended to every stem;
/// `ipf_only` skips writing the GPF when the input is known clean.
pub fn clean(
    output_dir: &Utf8Path,
    input_gpf: &Utf8Path,
    input_ipf: &[Utf8PathBuf],
    suffix: &str,
    ipf_only: bool,
) -> Result<(), GroundPointError> {
    let points = gpf::read_gpf(input_gpf)?;
    let measures = ipf::read_ipf(input_ipf)?;

    let active_ids = active_id_set(&points)?;

    let mut measure_counts: HashMap<&str, usize> = HashMap::new();
    for m in measures.iter().filter(|m| m.is_valid()) {
        if active_ids.contains(m.point_id.as_str()) {
            *measure_counts.entry(m.point_id.as_str()).or_insert(0) += 1;
        }
    }
    let keep: HashSet<&str> = measure_counts
        .iter()
        .filter(|(_, &n)| n >= 2)
        .map(|(&id, _)| id)
        .collect();

    let clean_points: Vec<GroundPoint> = points
        .iter()
        .filter(|p| p.is_active() && keep.contains(p.point_id.as_str()))
        .cloned()
        .collect();
    let clean_measures: Vec<ImagePoint> = measures
        .iter()
        .filter(|m| m.is_valid() && keep.contains(m.point_id.as_str()))
        .map(|m| {
            let mut m = m.clone();
            m.source = format!("{}_{suffix}", m.source);
            m
        })
        .collect();

    info!(
        "{} of {} ground points survive the cleanup",
        clean_points.len(),
        points.len()
    );

    if !ipf_only {
        let gpf_stem = input_gpf
            .file_stem()
            .ok_or_else(|| {
                GroundPointError::Validation(format!("'{input_gpf}' has no file name"))
            })?;
        let out_gpf = output_dir.join(format!("{gpf_stem}_{suffix}.gpf"));
        gpf::save_gpf(&clean_points, &out_gpf)?;
    }
    ipf::save_ipf(&clean_measures, output_dir)
}

const GPF_CSV_COLUMNS: [&str; 12] = [
    "point_id",
    "stat",
    "known",
    "lat_Y_North",
    "long_X_East",
    "ht",
    "sig0",
    "sig1",
    "sig2",
    "res0",
    "res1",
    "res2",
];

const IPF_CSV_COLUMNS: [&str; 13] = [
    "pt_id", "val", "fid_val", "no_obs", "l.", "s.", "sig_l", "sig_s", "res_l", "res_s", "fid_x",
    "fid_y", "ipf_file",
];

fn gpf_csv_fields(p: &GroundPoint, convert: bool) -> Vec<String> {
    let (lat, lon) = if convert {
        (p.lat.to_degrees(), p.lon.to_degrees())
    } else {
        (p.lat, p.lon)
    };
    vec![
        p.point_id.clone(),
        p.stat.to_string(),
        p.known.to_string(),
        lat.to_string(),
        lon.to_string(),
        p.height.to_string(),
        p.sigmas[0].to_string(),
        p.sigmas[1].to_string(),
        p.sigmas[2].to_string(),
        p.residuals[0].to_string(),
        p.residuals[1].to_string(),
        p.residuals[2].to_string(),
    ]
}

fn ipf_csv_fields(m: &ImagePoint) -> Vec<String> {
    vec![
        m.point_id.clone(),
        m.val.to_string(),
        m.fid_val.to_string(),
        m.no_obs.to_string(),
        m.line.to_string(),
        m.sample.to_string(),
        m.sig_line.to_string(),
        m.sig_sample.to_string(),
        m.res_line.to_string(),
        m.res_sample.to_string(),
        m.fid_x.to_string(),
        m.fid_y.to_string(),
        m.source.clone(),
    ]
}

/// Flatten a GPF to CSV with a header row.
///
/// Latitude/longitude are converted from radians to degrees unless
/// `convert` is false, in which case the fields are copied as stored.
pub fn gpf_to_csv(
    input_gpf: &Utf8Path,
    output: &Utf8Path,
    convert: bool,
) -> Result<(), GroundPointError> {
    let points = gpf::read_gpf(input_gpf)?;
    let mut writer = csv::Writer::from_path(output)?;
    writer.write_record(GPF_CSV_COLUMNS)?;
    for p in &points {
        writer.write_record(gpf_csv_fields(p, convert))?;
    }
    writer.flush()?;
    Ok(())
}

/// Inner-join a GPF with its IPFs on point id and flatten to CSV.
///
/// One output row per (ground point, image measure) pair, ground point
/// order first and measure order within it, latitudes/longitudes in
/// degrees. Duplicate ground point ids abort with a `Join` error.
pub fn net_to_csv(
    output_csv: &Utf8Path,
    input_gpf: &Utf8Path,
    input_ipf: &[Utf8PathBuf],
) -> Result<(), GroundPointError> {
    let points = gpf::read_gpf(input_gpf)?;
    let measures = ipf::read_ipf(input_ipf)?;

    let mut ids = HashSet::new();
    for p in &points {
        if !ids.insert(p.point_id.as_str()) {
            return Err(GroundPointError::Join(format!(
                "duplicate point id '{}' in ground point file",
                p.point_id
            )));
        }
    }

    let mut measures_by_id: HashMap<&str, Vec<&ImagePoint>> = HashMap::new();
    for m in &measures {
        measures_by_id.entry(m.point_id.as_str()).or_default().push(m);
    }

    let mut writer = csv::Writer::from_path(output_csv)?;
    let header: Vec<&str> = GPF_CSV_COLUMNS
        .iter()
        .chain(IPF_CSV_COLUMNS.iter())
        .copied()
        .collect();
    writer.write_record(header)?;

    let mut rows = 0usize;
    for p in &points {
        let Some(matched) = measures_by_id.get(p.point_id.as_str()) else {
            continue;
        };
        for m in matched {
            let mut record = gpf_csv_fields(p, true);
            record.extend(ipf_csv_fields(m));
            writer.write_record(record)?;
            rows += 1;
        }
    }
    writer.flush()?;
    info!("wrote {rows} joined rows to {output_csv}");
    Ok(())
}

/// Save a uniform random sample (without replacement) of the active points.
///
/// `frac` is the fraction of active points to keep and must lie in
/// (0, 1]. Inactive points are filtered out before sampling; the sampled
/// rows are written in draw order.
pub fn sample_gpf(
    input_gpf: &Utf8Path,
    output_gpf: &Utf8Path,
    frac: f64,
) -> Result<(), GroundPointError> {
    if !(frac > 0.0 && frac <= 1.0) {
        return Err(GroundPointError::Validation(format!(
            "--frac must be a value on the interval (0, 1], got {frac}"
        )));
    }

    let points = gpf::read_gpf(input_gpf)?;
    let active: Vec<&GroundPoint> = points.iter().filter(|p| p.is_active()).collect();

    let amount = (frac * active.len() as f64).round() as usize;
    let mut rng = rand::rng();
    let sampled: Vec<GroundPoint> = index::sample(&mut rng, active.len(), amount)
        .iter()
        .map(|i| active[i].clone())
        .collect();

    info!(
        "sampled {} of {} active points",
        sampled.len(),
        active.len()
    );
    gpf::save_gpf(&sampled, output_gpf)
}
