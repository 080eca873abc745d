//! # Socet Image Point File (IPF) reader and writer
//!
//! Parses Socet Set/GXP **Image Point Files** into [`ImagePoint`] records
//! and serializes record sets back to disk. An IPF has the same shape as a
//! GPF (see [`crate::gpf`]): magic line `IMAGE POINT FILE`, point count,
//! column header, then twelve whitespace-delimited values per point.
//!
//! A ground point is usually measured on several images, so workflows deal
//! with *sets* of IPFs. [`read_ipf`] concatenates any number of files,
//! tagging each record with the stem of the file it came from; [`save_ipf`]
//! regroups records by tag and writes one IPF per tag into a directory.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::str::FromStr;

use camino::Utf8Path;

use crate::constants::PointId;
use crate::groundpoint_errors::GroundPointError;

/// Magic first line of an IPF.
pub const IPF_MAGIC: &str = "IMAGE POINT FILE";

/// Canonical IPF column header.
pub const IPF_HEADER: &str = "pt_id,val,fid_val,no_obs,l.,s.,sig_l,sig_s,res_l,res_s,fid_x,fid_y";

const IPF_COLUMNS: usize = 12;

/// One image measure of a ground point.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagePoint {
    /// Ground point identifier this measure belongs to.
    pub point_id: PointId,
    /// 0 = invalid/inactive measure, 1 = valid.
    pub val: u8,
    pub fid_val: u8,
    pub no_obs: i32,
    /// Image line coordinate.
    pub line: f64,
    /// Image sample coordinate.
    pub sample: f64,
    pub sig_line: f64,
    pub sig_sample: f64,
    pub res_line: f64,
    pub res_sample: f64,
    pub fid_x: f64,
    pub fid_y: f64,
    /// Stem of the IPF file this measure came from (no extension).
    pub source: String,
}

impl ImagePoint {
    pub fn is_valid(&self) -> bool {
        self.val == 1
    }
}

fn parse_field<T: FromStr>(token: &str, field: &str, point: &str) -> Result<T, GroundPointError> {
    token.parse().map_err(|_| {
        GroundPointError::Format(format!("point '{point}': invalid {field} value '{token}'"))
    })
}

/// Parse IPF content into records, tagging each with `source`.
pub fn parse_ipf(
    content: &str,
    source: &str,
    origin: &str,
) -> Result<Vec<ImagePoint>, GroundPointError> {
    let mut lines = content.lines();

    let magic = lines.next().unwrap_or("").trim();
    if magic != IPF_MAGIC {
        return Err(GroundPointError::Format(format!(
            "{origin}: missing '{IPF_MAGIC}' header line"
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
    if header != IPF_HEADER {
        return Err(GroundPointError::Format(format!(
            "{origin}: unexpected column header '{header}' (expected '{IPF_HEADER}')"
        )));
    }

    let tokens: Vec<&str> = lines.flat_map(str::split_whitespace).collect();
    if tokens.len() % IPF_COLUMNS != 0 {
        return Err(GroundPointError::Format(format!(
            "{origin}: {} values is not a whole number of {IPF_COLUMNS}-column rows",
            tokens.len()
        )));
    }

    let mut points = Vec::with_capacity(tokens.len() / IPF_COLUMNS);
    for row in tokens.chunks_exact(IPF_COLUMNS) {
        let id = row[0];
        points.push(ImagePoint {
            point_id: id.to_string(),
            val: parse_field(row[1], "val", id)?,
            fid_val: parse_field(row[2], "fid_val", id)?,
            no_obs: parse_field(row[3], "no_obs", id)?,
            line: parse_field(row[4], "l.", id)?,
            sample: parse_field(row[5], "s.", id)?,
            sig_line: parse_field(row[6], "sig_l", id)?,
            sig_sample: parse_field(row[7], "sig_s", id)?,
            res_line: parse_field(row[8], "res_l", id)?,
            res_sample: parse_field(row[9], "res_s", id)?,
            fid_x: parse_field(row[10], "fid_x", id)?,
            fid_y: parse_field(row[11], "fid_y", id)?,
            source: source.to_string(),
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

/// Read and concatenate a set of IPFs, in argument order.
///
/// Each record is tagged with the stem of its file so that [`save_ipf`]
/// can split the set back apart.
pub fn read_ipf<P: AsRef<Utf8Path>>(paths: &[P]) -> Result<Vec<ImagePoint>, GroundPointError> {
    let mut all = Vec::new();
    for path in paths {
        let path = path.as_ref();
        let stem = path.file_stem().ok_or_else(|| {
            GroundPointError::Validation(format!("'{path}' has no file name"))
        })?;
        let content = std::fs::read_to_string(path)?;
        all.extend(parse_ipf(&content, stem, path.as_str())?);
    }
    Ok(all)
}

/// Serialize one group of measures to the canonical IPF layout (CRLF).
pub fn format_ipf(points: &[&ImagePoint]) -> String {
    let mut out = String::new();
    let _ = write!(out, "{IPF_MAGIC}\r\n{}\r\n{IPF_HEADER}\r\n", points.len());
    for p in points {
        let _ = write!(
            out,
            "{} {} {} {}\r\n{} {}\r\n{} {}\r\n{} {}\r\n{} {}\r\n\r\n",
            p.point_id,
            p.val,
            p.fid_val,
            p.no_obs,
            p.line,
            p.sample,
            p.sig_line,
            p.sig_sample,
            p.res_line,
            p.res_sample,
            p.fid_x,
            p.fid_y,
        );
    }
    out
}

/// Write measures into `dir`, one `<source>.ipf` per source tag.
///
/// Record order within each output file follows the input order; the files
/// themselves are written in first-appearance order of their tags.
pub fn save_ipf(points: &[ImagePoint], dir: &Utf8Path) -> Result<(), GroundPointError> {
    let mut tags: Vec<&str> = Vec::new();
    let mut groups: HashMap<&str, Vec<&ImagePoint>> = HashMap::new();
    for p in points {
        let group = groups.entry(p.source.as_str()).or_insert_with(|| {
            tags.push(p.source.as_str());
            Vec::new()
        });
        group.push(p);
    }

    for tag in tags {
        let path = dir.join(format!("{tag}.ipf"));
        std::fs::write(&path, format_ipf(&groups[tag]))?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_measure(id: &str, val: u8, source: &str) -> ImagePoint {
    ImagePoint {
        point_id: id.to_string(),
        val,
        fid_val: 0,
        no_obs: 1,
        line: 2048.25,
        sample: 512.75,
        sig_line: 0.2,
        sig_sample: 0.2,
        res_line: 0.01,
        res_sample: -0.02,
        fid_x: 0.0,
        fid_y: 0.0,
        source: source.to_string(),
    }
}
