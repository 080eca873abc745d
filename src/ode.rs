//! # Orbital Data Explorer laser-altimetry client
//!
//! Client for the PDS Geoscience Node's **Orbital Data Explorer** (ODE)
//! REST interface, used to download MOLA, LOLA, or MLA laser-altimeter
//! shot data within a geographic bounding box.
//!
//! ## Overview
//! -----------------
//! - [`TargetBody`] – target body, mapped to the ODE product type
//!   (`mars` → `molapedr`, `mercury` → `mlardr`, `moon` → `lolardr`).
//! - [`BoundingBox`] – query region with range/consistency validation and
//!   [0, 360) longitude normalization before submission.
//! - [`submit_target_query`] / [`submit_status_query`] – synchronous GET
//!   requests against the `livegds` endpoint, JSON output.
//! - [`download_pts`] – downloads the `pts_csv` flavor of the result files
//!   (the per-shot CSV product and its PDS3 label counterpart are listed
//!   separately; only the CSV is fetched).
//!
//! MLA queries must be submitted asynchronously; the server processes them
//! as jobs polled by id. LOLA and MOLA accept either mode.
//!
//! ## Error Handling
//! -----------------
//! Transport failures surface as [`GroundPointError::UreqHttpError`], a
//! response without the `Status` field as [`GroundPointError::Format`],
//! and a server-reported error as [`GroundPointError::OdeService`].

use std::str::FromStr;
use std::time::Duration;

use camino::Utf8PathBuf;
use log::info;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use ureq::Agent;

use crate::groundpoint_errors::GroundPointError;

/// ODE REST endpoint.
pub const ODE_URL: &str = "http://oderest.rsl.wustl.edu/livegds";

/// Target body of a laser-altimetry query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetBody {
    Mars,
    Mercury,
    Moon,
}

impl TargetBody {
    /// The ODE product type requested for this body.
    pub fn product(&self) -> &'static str {
        match self {
            TargetBody::Mars => "molapedr",
            TargetBody::Mercury => "mlardr",
            TargetBody::Moon => "lolardr",
        }
    }
}

impl FromStr for TargetBody {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mars" => Ok(TargetBody::Mars),
            "mercury" => Ok(TargetBody::Mercury),
            "moon" => Ok(TargetBody::Moon),
            _ => Err(format!(
                "unknown target body '{s}' (expected mars, mercury or moon)"
            )),
        }
    }
}

/// Geographic search region, degrees, longitudes positive east.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub minlat: f64,
    pub maxlat: f64,
    pub westernlon: f64,
    pub easternlon: f64,
}

impl BoundingBox {
    /// Check ranges and internal consistency.
    ///
    /// The server validates its own input too, but failing before the
    /// request saves a round trip.
    pub fn validate(&self) -> Result<(), GroundPointError> {
        let fail = |msg: &str| Err(GroundPointError::Validation(msg.to_string()));
        if self.minlat < -90.0 || self.minlat >= 90.0 {
            return fail("minlat must be >= -90 and < 90");
        }
        if self.maxlat <= -90.0 || self.maxlat > 90.0 {
            return fail("maxlat must be > -90 and <= 90");
        }
        if self.westernlon < -180.0 || self.westernlon >= 360.0 {
            return fail("westernlon must be >= -180 and < 360");
        }
        if self.easternlon <= -180.0 || self.easternlon > 360.0 {
            return fail("easternlon must be > -180 and <= 360");
        }
        if self.minlat >= self.maxlat {
            return fail("minlat must be < maxlat");
        }
        if self.westernlon >= self.easternlon {
            return fail("westernlon must be < easternlon");
        }
        Ok(())
    }

    /// The same region with longitudes normalized to [0, 360).
    pub fn normalized(&self) -> BoundingBox {
        BoundingBox {
            minlat: self.minlat,
            maxlat: self.maxlat,
            westernlon: crate::coords::lon_to_positive_east(self.westernlon),
            easternlon: crate::coords::lon_to_positive_east(self.easternlon),
        }
    }
}

/// Loose email shape check, as recommended before attaching an address to
/// an asynchronous job.
pub fn is_valid_email(email: &str) -> bool {
    email.len() > 4
        && Regex::new(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9-.]+$")
            .unwrap()
            .is_match(email)
}

/// A target-mode query, ready for validation and submission.
#[derive(Debug, Clone)]
pub struct TargetQuery {
    pub target: TargetBody,
    pub bbox: BoundingBox,
    pub asynchronous: bool,
    pub email: Option<String>,
}

/// Validate a target query without touching the network.
pub fn validate_target_query(query: &TargetQuery) -> Result<(), GroundPointError> {
    if query.target == TargetBody::Mercury && !query.asynchronous {
        return Err(GroundPointError::Validation(
            "--async is required when the target is mercury".to_string(),
        ));
    }
    if let Some(email) = &query.email {
        if !is_valid_email(email) {
            return Err(GroundPointError::Validation(format!(
                "'{email}' does not appear to be a valid email address"
            )));
        }
    }
    query.bbox.validate()
}

// -------------------------------------------------------------------------------------------------
// Response envelope
// -------------------------------------------------------------------------------------------------

/// Top-level JSON envelope of every ODE response.
#[derive(Debug, Clone, Deserialize)]
pub struct OdeResponse {
    #[serde(rename = "GDSResults")]
    pub gds_results: Option<GdsResults>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GdsResults {
    #[serde(rename = "Status")]
    pub status: Option<String>,
    #[serde(rename = "Error")]
    pub error: Option<String>,
    #[serde(rename = "JobId")]
    pub job_id: Option<String>,
    #[serde(rename = "Count")]
    pub count: Option<String>,
    #[serde(rename = "StateSummary")]
    pub state_summary: Option<StateSummary>,
    #[serde(rename = "ResultFiles")]
    pub result_files: Option<ResultFiles>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StateSummary {
    #[serde(rename = "State")]
    pub state: Option<String>,
    #[serde(rename = "StatusNote")]
    pub status_note: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultFiles {
    #[serde(rename = "ResultFile", deserialize_with = "one_or_many")]
    pub result_file: Vec<ResultFile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultFile {
    #[serde(rename = "URL")]
    pub url: String,
}

/// The server collapses a single result file to a bare object instead of a
/// one-element array; accept both.
fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<ResultFile>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(ResultFile),
        Many(Vec<ResultFile>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(file) => vec![file],
        OneOrMany::Many(files) => files,
    })
}

// -------------------------------------------------------------------------------------------------
// Requests
// -------------------------------------------------------------------------------------------------

/// HTTP client with the crate's default settings.
pub fn agent() -> Agent {
    let config = Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(60)))
        .build();
    config.into()
}

fn require_status(results: Option<GdsResults>) -> Result<GdsResults, GroundPointError> {
    results
        .filter(|r| r.status.is_some())
        .ok_or_else(|| {
            GroundPointError::Format(
                "unable to find Status code in response from ODE server".to_string(),
            )
        })
}

/// Submit a target-mode query and return the parsed result envelope.
pub fn submit_target_query(
    agent: &Agent,
    query: &TargetQuery,
) -> Result<GdsResults, GroundPointError> {
    validate_target_query(query)?;
    let bbox = query.bbox.normalized();

    let mut request = agent
        .get(ODE_URL)
        .query("results", "v")
        .query("output", "json")
        .query("query", query.target.product())
        .query("minlat", &bbox.minlat.to_string())
        .query("maxlat", &bbox.maxlat.to_string())
        .query("westernlon", &bbox.westernlon.to_string())
        .query("easternlon", &bbox.easternlon.to_string())
        .query("async", if query.asynchronous { "t" } else { "f" });
    if let Some(email) = &query.email {
        request = request.query("email", email);
    }

    info!("submitting {} query to {ODE_URL}", query.target.product());
    let mut response = request.call()?;
    let raw: serde_json::Value = response.body_mut().read_json()?;
    let envelope: OdeResponse = serde_json::from_value(raw)?;
    require_status(envelope.gds_results)
}

/// Poll an asynchronous job by id.
pub fn submit_status_query(agent: &Agent, jobid: u64) -> Result<GdsResults, GroundPointError> {
    info!("checking status of job {jobid}");
    let mut response = agent
        .get(ODE_URL)
        .query("jobid", &jobid.to_string())
        .query("output", "json")
        .call()?;
    let raw: serde_json::Value = response.body_mut().read_json()?;
    let envelope: OdeResponse = serde_json::from_value(raw)?;
    require_status(envelope.gds_results)
}

/// Download the `pts_csv` result files into the current directory.
///
/// Returns the paths written, in download order.
pub fn download_pts(
    agent: &Agent,
    files: &[ResultFile],
) -> Result<Vec<Utf8PathBuf>, GroundPointError> {
    let mut saved = Vec::new();
    for file in files.iter().filter(|f| f.url.contains("pts_csv")) {
        let filename = file
            .url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                GroundPointError::Format(format!("result file URL '{}' has no file name", file.url))
            })?;

        info!("downloading {}", file.url);
        let mut response = agent.get(&file.url).call()?;
        let mut reader = response.body_mut().as_reader();
        let mut out = std::fs::File::create(filename)?;
        std::io::copy(&mut reader, &mut out)?;
        saved.push(Utf8PathBuf::from(filename));
    }
    Ok(saved)
}

#[cfg(test)]
mod ode_tests {
    use super::*;

    fn bbox(minlat: f64, maxlat: f64, westernlon: f64, easternlon: f64) -> BoundingBox {
        BoundingBox {
            minlat,
            maxlat,
            westernlon,
            easternlon,
        }
    }

    #[test]
    fn test_product_codes() {
        assert_eq!(TargetBody::Mars.product(), "molapedr");
        assert_eq!(TargetBody::Mercury.product(), "mlardr");
        assert_eq!(TargetBody::Moon.product(), "lolardr");
    }

    #[test]
    fn test_target_parsing_is_case_insensitive() {
        assert_eq!("Mars".parse::<TargetBody>(), Ok(TargetBody::Mars));
        assert_eq!("MOON".parse::<TargetBody>(), Ok(TargetBody::Moon));
        assert!("venus".parse::<TargetBody>().is_err());
    }

    #[test]
    fn test_bbox_accepts_valid_region() {
        assert!(bbox(44.0, 44.1, 340.5, 340.6).validate().is_ok());
        assert!(bbox(-90.0, 90.0, -180.0, 360.0).validate().is_ok());
    }

    #[test]
    fn test_bbox_rejects_out_of_range_values() {
        assert!(bbox(-91.0, 44.1, 340.5, 340.6).validate().is_err());
        assert!(bbox(44.0, 90.5, 340.5, 340.6).validate().is_err());
        assert!(bbox(44.0, 44.1, 360.0, 340.6).validate().is_err());
        assert!(bbox(44.0, 44.1, 340.5, 361.0).validate().is_err());
    }

    #[test]
    fn test_bbox_rejects_inverted_bounds() {
        assert!(bbox(44.1, 44.0, 340.5, 340.6).validate().is_err());
        assert!(bbox(44.0, 44.1, 340.6, 340.5).validate().is_err());
    }

    #[test]
    fn test_bbox_normalizes_longitudes() {
        let normalized = bbox(44.0, 44.1, -10.0, -5.0).normalized();
        assert_eq!(normalized.westernlon, 350.0);
        assert_eq!(normalized.easternlon, 355.0);
        assert_eq!(normalized.minlat, 44.0);
    }

    #[test]
    fn test_email_validation() {
        assert!(is_valid_email("user@example.com"));
        assert!(is_valid_email("first.last+tag@sub-domain.example.org"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("no-at-sign.example.com"));
        assert!(!is_valid_email("user@exam ple.com"));
    }

    #[test]
    fn test_mercury_requires_async() {
        let query = TargetQuery {
            target: TargetBody::Mercury,
            bbox: bbox(44.0, 44.1, 340.5, 340.6),
            asynchronous: false,
            email: None,
        };
        assert!(matches!(
            validate_target_query(&query),
            Err(GroundPointError::Validation(_))
        ));
    }

    #[test]
    fn test_deserialize_result_file_array() {
        let json = r#"{
            "GDSResults": {
                "Status": "SUCCESS",
                "Count": "1234",
                "StateSummary": {"State": "Finished", "StatusNote": "All done"},
                "ResultFiles": {
                    "ResultFile": [
                        {"URL": "https://ode.example/data/shots_pts_csv.csv"},
                        {"URL": "https://ode.example/data/shots_pts_csv.lbl"}
                    ]
                }
            }
        }"#;
        let envelope: OdeResponse = serde_json::from_str(json).unwrap();
        let results = envelope.gds_results.unwrap();
        assert_eq!(results.status.as_deref(), Some("SUCCESS"));
        assert_eq!(results.count.as_deref(), Some("1234"));
        let files = results.result_files.unwrap().result_file;
        assert_eq!(files.len(), 2);
        assert!(files[0].url.ends_with(".csv"));
    }

    #[test]
    fn test_deserialize_result_file_single_object() {
        let json = r#"{
            "GDSResults": {
                "Status": "SUCCESS",
                "ResultFiles": {
                    "ResultFile": {"URL": "https://ode.example/data/shots_pts_csv.csv"}
                }
            }
        }"#;
        let envelope: OdeResponse = serde_json::from_str(json).unwrap();
        let files = envelope
            .gds_results
            .unwrap()
            .result_files
            .unwrap()
            .result_file;
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_missing_status_is_format_error() {
        let json = r#"{"GDSResults": {"Count": "0"}}"#;
        let envelope: OdeResponse = serde_json::from_str(json).unwrap();
        assert!(matches!(
            require_status(envelope.gds_results),
            Err(GroundPointError::Format(_))
        ));
    }
}
