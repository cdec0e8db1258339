//! Command-line parsing for the batch checkpoint merger.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the merge engine.
//!
//! Alpha and precision flags are optional: anything left out falls back to the
//! remembered settings, then to the built-in defaults.

use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

use crate::domain::{AlphaParams, InterpolationModel, Precision};

pub mod picker;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "bcm",
    version,
    about = "Batch checkpoint merger: write a sweep of interpolated checkpoints between two models"
)]
pub struct Cli {
    /// Raise log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a merge batch and write the checkpoints to `<folder>/~batch_merges`.
    Merge(MergeArgs),
    /// Print the alpha table and curve preview without merging.
    Alphas(AlphasArgs),
    /// Print (or write) the X/Y-plot manifest for a batch.
    Manifest(ManifestArgs),
    /// List the checkpoints in a folder.
    List(ListArgs),
    /// Write a pair of small synthetic checkpoints to try the tool on.
    Demo(DemoArgs),
    /// Launch the interactive TUI.
    ///
    /// This uses the same batch pipeline as `bcm merge`, but renders the
    /// settings, curve, and progress in a terminal UI using Ratatui.
    Tui(TuiArgs),
}

/// Options shaping the alpha progression.
#[derive(Debug, Args, Clone, Default)]
pub struct AlphaArgs {
    /// First alpha fraction of the batch.
    #[arg(long, allow_negative_numbers = true)]
    pub start: Option<f64>,

    /// Increment between consecutive alphas.
    #[arg(long, allow_negative_numbers = true)]
    pub step: Option<f64>,

    /// Number of checkpoints to write.
    #[arg(long = "steps")]
    pub count: Option<usize>,

    /// Curve reshaping the raw fractions into merge weights.
    #[arg(long = "interp", value_enum)]
    pub model: Option<InterpolationModel>,
}

impl AlphaArgs {
    /// Overlay the flags that were given on top of `base`.
    pub fn resolve(&self, base: AlphaParams) -> AlphaParams {
        AlphaParams {
            start: self.start.unwrap_or(base.start),
            step: self.step.unwrap_or(base.step),
            count: self.count.unwrap_or(base.count),
            model: self.model.unwrap_or(base.model),
        }
    }
}

/// Options for the ASCII curve preview.
#[derive(Debug, Args, Clone)]
pub struct PlotArgs {
    /// Disable the terminal curve preview.
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width (columns).
    #[arg(long, default_value_t = 61)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 21)]
    pub height: usize,
}

/// Options for `bcm merge`.
#[derive(Debug, Args, Clone)]
pub struct MergeArgs {
    /// Folder holding both checkpoints (defaults to the remembered folder, then `.`).
    #[arg(short, long)]
    pub folder: Option<PathBuf>,

    /// Model A file name inside the folder (prompted for when omitted).
    #[arg(short = 'a', long)]
    pub model_a: Option<String>,

    /// Model B file name inside the folder (prompted for when omitted).
    #[arg(short = 'b', long)]
    pub model_b: Option<String>,

    #[command(flatten)]
    pub alpha: AlphaArgs,

    /// Precision of the merged parameters.
    #[arg(long, value_enum)]
    pub precision: Option<Precision>,

    /// Substring identifying the keys to merge.
    #[arg(long)]
    pub marker: Option<String>,

    #[command(flatten)]
    pub plot: PlotArgs,
}

/// Options for `bcm alphas`.
#[derive(Debug, Args, Clone)]
pub struct AlphasArgs {
    #[command(flatten)]
    pub alpha: AlphaArgs,

    #[command(flatten)]
    pub plot: PlotArgs,
}

/// Options for `bcm manifest`.
#[derive(Debug, Args, Clone)]
pub struct ManifestArgs {
    /// Model A file name.
    #[arg(short = 'a', long)]
    pub model_a: String,

    /// Model B file name.
    #[arg(short = 'b', long)]
    pub model_b: String,

    #[command(flatten)]
    pub alpha: AlphaArgs,

    /// Write the manifest to this file instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Options for `bcm list`.
#[derive(Debug, Args, Clone)]
pub struct ListArgs {
    /// Folder to scan (defaults to the remembered folder, then `.`).
    pub folder: Option<PathBuf>,
}

/// Options for `bcm demo`.
#[derive(Debug, Args, Clone)]
pub struct DemoArgs {
    /// Folder that receives `demo_a.ckpt` and `demo_b.ckpt`.
    #[arg(default_value = ".")]
    pub folder: PathBuf,

    /// Random seed for the weights.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Number of synthetic layers.
    #[arg(long, default_value_t = 4)]
    pub layers: usize,

    /// Width of each square layer.
    #[arg(long, default_value_t = 16)]
    pub width: usize,

    /// Store model B in FP16.
    #[arg(long)]
    pub half_b: bool,
}

/// Options for `bcm tui`.
#[derive(Debug, Args, Clone, Default)]
pub struct TuiArgs {
    /// Folder to browse (defaults to the remembered folder, then `.`).
    #[arg(short, long)]
    pub folder: Option<PathBuf>,

    #[command(flatten)]
    pub alpha: AlphaArgs,

    /// Precision of the merged parameters.
    #[arg(long, value_enum)]
    pub precision: Option<Precision>,

    /// Substring identifying the keys to merge.
    #[arg(long)]
    pub marker: Option<String>,
}
