//! Bone shape model command-line tool.
//!
//! # Commands
//!
//! - `bone-shape train <VOLUMES> <OUTPUT>` - Extract, register and export training meshes
//! - `bone-shape build-model <MESHES>` - Build a shape model and print its modes
//! - `bone-shape fit <MESHES> <TARGETS> <OUTPUT>` - Export fitted coefficients
//! - `bone-shape interpolate <MESHES> <COEFFICIENTS> <OUTPUT>` - Shapes along a fitted motion
//! - `bone-shape sweep <MESHES> <OUTPUT>` - Animation loop along one mode
//!
//! Logging goes to stderr. `RUST_LOG` sets the filter (default `info`);
//! `-v` switches to `debug`.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use shape_io::MeshFormat;
use shape_pipeline::BoneLabels;
use shape_registration::IcpMode;
use tracing_subscriber::EnvFilter;

/// Bone statistical shape models from labeled volumes
#[derive(Parser)]
#[command(name = "bone-shape")]
#[command(about = "Build bone shape models from labeled volumes", long_about = None)]
#[command(version)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate corresponded training meshes from a directory of volumes
    Train(TrainArgs),

    /// Build a shape model from a mesh directory and report its modes
    BuildModel {
        /// Directory of training meshes (.ply, .stl)
        meshes: PathBuf,

        #[command(flatten)]
        model: ModelArgs,

        /// Also write the mean shape here
        #[arg(long)]
        mean: Option<PathBuf>,
    },

    /// Fit a model to a directory of meshes and export the coefficients
    Fit {
        /// Directory of training meshes (.ply, .stl)
        meshes: PathBuf,

        /// Directory of meshes to fit
        targets: PathBuf,

        /// Output directory for the coefficient table
        output: PathBuf,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Write shapes along a polynomial fit of a coefficient table
    Interpolate {
        /// Directory of training meshes (.ply, .stl)
        meshes: PathBuf,

        /// Coefficient table written by `fit`
        coefficients: PathBuf,

        /// Output directory
        output: PathBuf,

        /// Polynomial degree
        #[arg(long, default_value_t = 3)]
        order: usize,

        /// Number of shapes over [-1, 1]
        #[arg(long, default_value_t = 20)]
        frames: usize,

        /// Output mesh format
        #[arg(long, value_enum, default_value_t = Format::Ply)]
        format: Format,

        #[command(flatten)]
        model: ModelArgs,
    },

    /// Write the animation loop of one shape mode
    Sweep {
        /// Directory of training meshes (.ply, .stl)
        meshes: PathBuf,

        /// Output directory
        output: PathBuf,

        /// Mode index, starting at 0
        #[arg(long, default_value_t = 0)]
        mode: usize,

        /// Largest coefficient reached
        #[arg(long, default_value_t = 2.0)]
        range: f64,

        /// Shapes per leg of the loop
        #[arg(long, default_value_t = 10)]
        steps: usize,

        /// Output mesh format
        #[arg(long, value_enum, default_value_t = Format::Ply)]
        format: Format,

        #[command(flatten)]
        model: ModelArgs,
    },
}

/// Options of the `train` command. Flags override the config file.
#[derive(Args)]
struct TrainArgs {
    /// Directory of labeled volumes (.nii)
    volumes: PathBuf,

    /// Output directory
    output: PathBuf,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// ICP mode: rigid, similarity or affine
    #[arg(long)]
    mode: Option<IcpMode>,

    /// ICP iteration cap
    #[arg(long)]
    iterations: Option<u32>,

    /// ICP landmark cap
    #[arg(long)]
    landmarks: Option<usize>,

    /// ICP RMS stopping threshold
    #[arg(long)]
    rms: Option<f64>,

    /// Bone labels: "auto" or a list such as "1,2,5"
    #[arg(long)]
    labels: Option<BoneLabels>,

    /// Reference bone label
    #[arg(long)]
    reference: Option<i32>,

    /// Smoothing iterations
    #[arg(long)]
    smoothing: Option<u32>,

    /// Smoothing relaxation factor
    #[arg(long)]
    relaxation: Option<f64>,

    /// Fraction of triangles to remove
    #[arg(long)]
    decimation: Option<f64>,

    /// Maximum number of volumes, -1 for all
    #[arg(long, allow_negative_numbers = true)]
    limit: Option<i64>,

    /// Leave the reference bone out of the export
    #[arg(long)]
    remove_reference: bool,

    /// Flip volumes along their first axis
    #[arg(long)]
    flip_horizontal: bool,

    /// Flip volumes along their second axis
    #[arg(long)]
    flip_vertical: bool,

    /// Also write every processed bone before registration
    #[arg(long)]
    save_extracted: bool,

    /// Also write every registered bone separately
    #[arg(long)]
    save_registered: bool,

    /// Stop after extraction and processing
    #[arg(long)]
    skip_registration: bool,

    /// Bring every subject into subject 0's frame
    #[arg(long)]
    subject_onto_reference: bool,

    /// Output mesh format
    #[arg(long, value_enum)]
    format: Option<Format>,
}

/// Shape model options shared by the model commands.
#[derive(Args)]
struct ModelArgs {
    /// Fraction of variance the active modes must explain
    #[arg(long, default_value_t = 1.0)]
    variance: f64,

    /// Measure coefficients in standard deviations
    #[arg(long)]
    std_dev: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Ply,
    Stl,
}

impl From<Format> for MeshFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Ply => Self::Ply,
            Format::Stl => Self::Stl,
        }
    }
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Train(args) => commands::train(&args),
        Commands::BuildModel { meshes, model, mean } => commands::build_model(&meshes, &model, mean.as_deref()),
        Commands::Fit {
            meshes,
            targets,
            output,
            model,
        } => commands::fit(&meshes, &targets, &output, &model),
        Commands::Interpolate {
            meshes,
            coefficients,
            output,
            order,
            frames,
            format,
            model,
        } => commands::interpolate(&meshes, &coefficients, &output, order, frames, format.into(), &model),
        Commands::Sweep {
            meshes,
            output,
            mode,
            range,
            steps,
            format,
            model,
        } => commands::sweep(&meshes, &output, mode, range, steps, format.into(), &model),
    }
}
