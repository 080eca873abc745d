//! Command-line toolkit for planetary photogrammetry ground-point tables.
//!
//! This crate reads and writes Socet Set/GXP Ground Point Files (GPF) and
//! Image Point Files (IPF), cleans and merges point networks, converts them
//! to CSV, applies rigid transforms to ground points by driving the external
//! `pc_align` program from the NASA Ames Stereo Pipeline, and downloads
//! laser-altimeter shot data from the PDS Orbital Data Explorer.

pub mod align;
pub mod cli;
pub mod constants;
pub mod coords;
pub mod gpf;
pub mod groundpoint_errors;
pub mod ipf;
pub mod net;
pub mod ode;
pub mod surface;
pub mod transform;

pub use constants::Datum;
pub use gpf::GroundPoint;
pub use groundpoint_errors::GroundPointError;
pub use ipf::ImagePoint;
