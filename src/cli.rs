//! Command-line interface for the groundpoint toolkit.

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use log::error;

use crate::align::{self, RefShape};
use crate::constants::Datum;
use crate::groundpoint_errors::GroundPointError;
use crate::net;
use crate::ode::{self, BoundingBox, GdsResults, TargetBody, TargetQuery};
use crate::surface::{self, RefFormat, SourceFormat};
use crate::transform;

#[derive(Parser)]
#[command(name = "groundpoint")]
#[command(about = "Socet ground/image point tools for planetary photogrammetry", version)]
pub struct Cli {
    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Reference shape for heights in the input files: a named datum or
/// explicit ellipsoid semi-axes, exactly one of the two.
#[derive(Args)]
#[group(required = true, multiple = false)]
struct RefShapeArgs {
    /// Datum for heights (D_MARS, D_MOON, MOLA, NAD27, NAD83, WGS72, WGS_1984)
    #[arg(long)]
    datum: Option<Datum>,

    /// Ellipsoid semi-major and semi-minor axes in meters
    #[arg(long, num_args = 2, value_names = ["SEMI_MAJOR", "SEMI_MINOR"])]
    radii: Option<Vec<f64>>,
}

impl RefShapeArgs {
    fn to_ref_shape(&self) -> RefShape {
        if let Some(datum) = self.datum {
            RefShape::Datum(datum)
        } else {
            let radii = self
                .radii
                .as_ref()
                .expect("either --datum or --radii is present");
            RefShape::Radii {
                semi_major: radii[0],
                semi_minor: radii[1],
            }
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Apply a pc_align transform matrix to the points of a GPF
    Transform {
        /// Socet ground point file to transform
        socet_gpf: Utf8PathBuf,
        /// pc_align-compatible transformation matrix to apply
        transform_matrix: Utf8PathBuf,
        /// Output ground point file; must include the ".gpf" extension
        tfm_socet_gpf: Utf8PathBuf,
        /// Update all active points, not just tie points
        #[arg(long)]
        all_points: bool,
        #[command(flatten)]
        ref_shape: RefShapeArgs,
    },

    /// Align a DTM to reference elevation data, then apply the fitted
    /// transform to the points of a GPF
    SurfaceFit {
        /// Reference elevation data
        ref_dtm: Utf8PathBuf,
        /// Format of the reference data: ascii_dtm, csv, raster or table
        ref_format: RefFormat,
        /// Socet DTM to align
        socet_dtm: Utf8PathBuf,
        /// Format of the Socet DTM: ascii_dtm, csv or raster
        socet_format: SourceFormat,
        /// GPF updated with the fitted transform
        socet_gpf: Utf8PathBuf,
        /// Output ground point file; must include the ".gpf" extension
        tfm_socet_gpf: Utf8PathBuf,
        /// Update all active points, not just tie points
        #[arg(long)]
        all_points: bool,
        #[command(flatten)]
        ref_shape: RefShapeArgs,
        /// Additional arguments passed verbatim to pc_align
        /// (at minimum "--max-displacement")
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        pc_align_args: Vec<String>,
    },

    /// Merge several GPFs into a single file
    MergeGpf {
        /// Path to the output GPF
        output_path: Utf8PathBuf,
        /// GPFs to merge together
        #[arg(required = true)]
        input_list: Vec<Utf8PathBuf>,
    },

    /// Merge several IPFs into a single file
    MergeIpf {
        /// Path to the output IPF
        output_path: Utf8PathBuf,
        /// IPFs to merge together
        #[arg(required = true)]
        input_list: Vec<Utf8PathBuf>,
    },

    /// Delete inactive points from a GPF and its IPFs and drop orphans
    Clean {
        /// Only save the updated IPFs
        #[arg(long)]
        ipf_only: bool,
        /// Suffix attached to output file names
        #[arg(long, default_value = "clean")]
        suffix: String,
        /// Directory to write the cleaned GPF and IPFs to
        output_dir: Utf8PathBuf,
        /// The GPF to clean
        input_gpf: Utf8PathBuf,
        /// The IPFs associated with the GPF
        #[arg(required = true)]
        input_ipf: Vec<Utf8PathBuf>,
    },

    /// Convert a GPF to CSV
    Gpf2csv {
        /// Input GPF to convert
        gpf: Utf8PathBuf,
        /// Path to the output CSV
        outpath: Utf8PathBuf,
        /// Copy lat/long fields as stored instead of converting radians
        /// to degrees
        #[arg(long)]
        no_convert: bool,
    },

    /// Inner-join a GPF with its IPFs and write the result to CSV
    Net2csv {
        /// Path to the output CSV
        output_csv: Utf8PathBuf,
        /// The GPF of the network
        input_gpf: Utf8PathBuf,
        /// The IPFs associated with the GPF
        #[arg(required = true)]
        input_ipf: Vec<Utf8PathBuf>,
    },

    /// Save a random sample of the active points of a GPF
    Sample {
        /// Fraction of active points to keep, on the interval (0, 1]
        #[arg(long)]
        frac: f64,
        /// The GPF to sample
        input_gpf: Utf8PathBuf,
        /// The output GPF
        output_gpf: Utf8PathBuf,
    },

    /// Download laser altimeter shot data from the PDS Orbital Data Explorer
    LaserAlt {
        #[command(subcommand)]
        command: LaserAltCommands,
    },
}

#[derive(Subcommand)]
enum LaserAltCommands {
    /// Request laser altimeter data for a target body
    Target {
        /// Target body: mars (MOLA), moon (LOLA) or mercury (MLA)
        target: TargetBody,
        /// Bounding coordinates of the search region, degrees
        #[arg(
            long,
            num_args = 4,
            required = true,
            allow_negative_numbers = true,
            value_names = ["MINLAT", "MAXLAT", "WESTERNLON", "EASTERNLON"]
        )]
        coords: Vec<f64>,
        /// Submit the query in asynchronous mode (required for mercury)
        #[arg(long = "async")]
        asynchronous: bool,
        /// Send email to this address when the job finishes
        #[arg(long)]
        email: Option<String>,
    },

    /// Check the status of an asynchronous job and download its results
    /// when finished
    Status {
        /// Job id returned by an asynchronous query
        jobid: u64,
    },
}

pub fn run() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    if let Err(err) = dispatch(cli.command) {
        error!("{err}");
        std::process::exit(1);
    }
}

fn dispatch(command: Commands) -> Result<(), GroundPointError> {
    match command {
        Commands::Transform {
            socet_gpf,
            transform_matrix,
            tfm_socet_gpf,
            all_points,
            ref_shape,
        } => transform::transform_gpf(
            align::PC_ALIGN,
            &socet_gpf,
            &transform_matrix,
            &tfm_socet_gpf,
            all_points,
            &ref_shape.to_ref_shape(),
        ),

        Commands::SurfaceFit {
            ref_dtm,
            ref_format,
            socet_dtm,
            socet_format,
            socet_gpf,
            tfm_socet_gpf,
            all_points,
            ref_shape,
            pc_align_args,
        } => surface::surface_fit(
            align::PC_ALIGN,
            &ref_dtm,
            ref_format,
            &socet_dtm,
            socet_format,
            &socet_gpf,
            &tfm_socet_gpf,
            all_points,
            &ref_shape.to_ref_shape(),
            &pc_align_args,
        ),

        Commands::MergeGpf {
            output_path,
            input_list,
        } => net::merge_gpf(&output_path, &input_list),

        Commands::MergeIpf {
            output_path,
            input_list,
        } => net::merge_ipf(&output_path, &input_list),

        Commands::Clean {
            ipf_only,
            suffix,
            output_dir,
            input_gpf,
            input_ipf,
        } => net::clean(&output_dir, &input_gpf, &input_ipf, &suffix, ipf_only),

        Commands::Gpf2csv {
            gpf,
            outpath,
            no_convert,
        } => net::gpf_to_csv(&gpf, &outpath, !no_convert),

        Commands::Net2csv {
            output_csv,
            input_gpf,
            input_ipf,
        } => net::net_to_csv(&output_csv, &input_gpf, &input_ipf),

        Commands::Sample {
            frac,
            input_gpf,
            output_gpf,
        } => net::sample_gpf(&input_gpf, &output_gpf, frac),

        Commands::LaserAlt { command } => match command {
            LaserAltCommands::Target {
                target,
                coords,
                asynchronous,
                email,
            } => cmd_laser_target(target, &coords, asynchronous, email),
            LaserAltCommands::Status { jobid } => cmd_laser_status(jobid),
        },
    }
}

fn print_finished_results(results: &GdsResults) {
    println!("   Status:  {}", results.status.as_deref().unwrap_or(""));
    println!("   Count:   {}", results.count.as_deref().unwrap_or(""));
    println!(
        "   StatusNote:  {}",
        results
            .state_summary
            .as_ref()
            .and_then(|s| s.status_note.as_deref())
            .unwrap_or("")
    );
}

fn cmd_laser_target(
    target: TargetBody,
    coords: &[f64],
    asynchronous: bool,
    email: Option<String>,
) -> Result<(), GroundPointError> {
    let query = TargetQuery {
        target,
        bbox: BoundingBox {
            minlat: coords[0],
            maxlat: coords[1],
            westernlon: coords[2],
            easternlon: coords[3],
        },
        asynchronous,
        email,
    };

    let agent = ode::agent();
    let results = ode::submit_target_query(&agent, &query)?;
    let status = results.status.as_deref().unwrap_or("").to_uppercase();

    println!("Results:");
    match status.as_str() {
        "SUCCESS" if asynchronous => {
            let jobid = results.job_id.as_deref().unwrap_or("");
            println!("   Status:  {status}");
            println!("   JobID:   {jobid}");
            if let Some(email) = &query.email {
                println!("A message will be sent to {email} when the job finishes.");
            }
            println!("Check the job with: groundpoint laser-alt status {jobid}");
            Ok(())
        }
        "SUCCESS" => {
            print_finished_results(&results);
            let files = results
                .result_files
                .map(|f| f.result_file)
                .unwrap_or_default();
            ode::download_pts(&agent, &files)?;
            Ok(())
        }
        "ERROR" => Err(GroundPointError::OdeService(
            results
                .error
                .unwrap_or_else(|| "unspecified server error".to_string()),
        )),
        _ => Err(GroundPointError::OdeService(format!(
            "unexpected response received from ODE REST service: {results:?}"
        ))),
    }
}

fn cmd_laser_status(jobid: u64) -> Result<(), GroundPointError> {
    let agent = ode::agent();
    let results = ode::submit_status_query(&agent, jobid)?;
    let status = results.status.as_deref().unwrap_or("").to_uppercase();

    println!("Results:");
    match status.as_str() {
        "SUCCESS" => {
            let state = results
                .state_summary
                .as_ref()
                .and_then(|s| s.state.as_deref())
                .unwrap_or("")
                .to_uppercase();
            match state.as_str() {
                "FINISHED" => {
                    print_finished_results(&results);
                    let files = results
                        .result_files
                        .map(|f| f.result_file)
                        .unwrap_or_default();
                    ode::download_pts(&agent, &files)?;
                    Ok(())
                }
                "RUNNING" | "WAITING" | "ERROR" | "UNKNOWN" => {
                    println!("   Status:  {state}");
                    println!(
                        "   StatusNote:  {}",
                        results
                            .state_summary
                            .as_ref()
                            .and_then(|s| s.status_note.as_deref())
                            .unwrap_or("")
                    );
                    Ok(())
                }
                _ => Err(GroundPointError::OdeService(format!(
                    "unexpected State response received from ODE REST service: {results:?}"
                ))),
            }
        }
        "ERROR" => Err(GroundPointError::OdeService(
            results
                .error
                .unwrap_or_else(|| "unspecified server error".to_string()),
        )),
        _ => Err(GroundPointError::OdeService(format!(
            "unexpected response received from ODE REST service: {results:?}"
        ))),
    }
}

#[cfg(test)]
mod cli_tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_structure_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_transform_requires_a_reference_shape() {
        let parsed = Cli::try_parse_from([
            "groundpoint",
            "transform",
            "in.gpf",
            "matrix.txt",
            "out.gpf",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_transform_accepts_datum() {
        let parsed = Cli::try_parse_from([
            "groundpoint",
            "transform",
            "in.gpf",
            "matrix.txt",
            "out.gpf",
            "--datum",
            "D_MARS",
        ])
        .unwrap();
        match parsed.command {
            Commands::Transform {
                ref_shape,
                all_points,
                ..
            } => {
                assert!(!all_points);
                assert_eq!(ref_shape.to_ref_shape(), RefShape::Datum(Datum::DMars));
            }
            _ => panic!("expected transform subcommand"),
        }
    }

    #[test]
    fn test_transform_rejects_datum_and_radii_together() {
        let parsed = Cli::try_parse_from([
            "groundpoint",
            "transform",
            "in.gpf",
            "matrix.txt",
            "out.gpf",
            "--datum",
            "D_MARS",
            "--radii",
            "3396190",
            "3376200",
        ]);
        assert!(parsed.is_err());
    }

    #[test]
    fn test_surface_fit_collects_passthrough_args() {
        let parsed = Cli::try_parse_from([
            "groundpoint",
            "surface-fit",
            "--radii",
            "3396190",
            "3376200",
            "mola.tab",
            "table",
            "stereo.asc",
            "ascii_dtm",
            "net.gpf",
            "out.gpf",
            "--max-displacement",
            "300",
        ])
        .unwrap();
        match parsed.command {
            Commands::SurfaceFit {
                ref_format,
                socet_format,
                pc_align_args,
                ..
            } => {
                assert_eq!(ref_format, RefFormat::Table);
                assert_eq!(socet_format, SourceFormat::AsciiDtm);
                assert_eq!(pc_align_args, ["--max-displacement", "300"]);
            }
            _ => panic!("expected surface-fit subcommand"),
        }
    }

    #[test]
    fn test_laser_alt_parses_negative_coordinates() {
        let parsed = Cli::try_parse_from([
            "groundpoint",
            "laser-alt",
            "target",
            "moon",
            "--coords",
            "-44.1",
            "-44.0",
            "340.5",
            "340.6",
        ])
        .unwrap();
        match parsed.command {
            Commands::LaserAlt {
                command:
                    LaserAltCommands::Target {
                        target,
                        coords,
                        asynchronous,
                        ..
                    },
            } => {
                assert_eq!(target, TargetBody::Moon);
                assert_eq!(coords, [-44.1, -44.0, 340.5, 340.6]);
                assert!(!asynchronous);
            }
            _ => panic!("expected laser-alt target subcommand"),
        }
    }
}
