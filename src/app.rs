//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - installs logging
//! - loads and saves remembered settings
//! - runs merge batches and prints reports/plots

use std::path::{Path, PathBuf};

use chrono::Local;
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{AlphasArgs, Command, DemoArgs, ListArgs, ManifestArgs, MergeArgs, PlotArgs};
use crate::data::{SyntheticConfig, write_pair};
use crate::domain::{AlphaSequence, BatchConfig};
use crate::error::AppError;
use crate::io::checkpoint::list_checkpoints;
use crate::io::manifest::{manifest, write_manifest};
use crate::io::settings::Settings;
use crate::sequence::sequence_from;

pub mod pipeline;

/// Entry point for the `bcm` binary.
pub fn run() -> Result<(), AppError> {
    // We want `bcm` and `bcm -f models` to behave like `bcm tui ...`.
    //
    // Clap requires a subcommand name, so we do a small, explicit rewrite of the
    // argv list before parsing. This preserves a clean clap structure while
    // retaining the requested UX.
    let argv = rewrite_args(std::env::args().collect());
    let cli = crate::cli::Cli::parse_from(argv);

    // The TUI owns the terminal, so it gets no stderr subscriber.
    if !matches!(cli.command, Command::Tui(_)) {
        init_tracing(cli.verbose);
    }

    match cli.command {
        Command::Merge(args) => handle_merge(args),
        Command::Alphas(args) => handle_alphas(args),
        Command::Manifest(args) => handle_manifest(args),
        Command::List(args) => handle_list(args),
        Command::Demo(args) => handle_demo(args),
        Command::Tui(args) => crate::tui::run(args, Settings::load()?),
    }
}

/// Install the stderr `fmt` subscriber. `RUST_LOG` wins over `-v`.
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A second install (e.g. from tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn handle_merge(args: MergeArgs) -> Result<(), AppError> {
    let mut settings = Settings::load()?;
    let folder = resolve_folder(args.folder.clone(), &settings);

    let model_a = match args.model_a.clone() {
        Some(name) => crate::cli::picker::validate_checkpoint_name(&folder, &name)?,
        None => crate::cli::picker::prompt_for_checkpoint(&folder, "model A")?,
    };
    let model_b = match args.model_b.clone() {
        Some(name) => crate::cli::picker::validate_checkpoint_name(&folder, &name)?,
        None => crate::cli::picker::prompt_for_checkpoint(&folder, "model B")?,
    };

    let config = batch_config_from_args(&args, &settings, folder, model_a, model_b);
    let request = pipeline::BatchRequest::from_config(&config)?;

    println!(
        "{}",
        crate::report::format_alpha_table(&request.alphas, &request.planned_filenames())
    );
    if config.plot {
        println!(
            "{}",
            crate::plot::render_curve_preview(&request.alphas, config.plot_width, config.plot_height)
        );
    }

    let started = Local::now();
    let written = pipeline::run_batch(&request, &mut |event| println!("{event}"))?;
    let finished = Local::now();

    println!(
        "{}",
        crate::report::format_batch_summary(&request, &written, started, finished)
    );

    settings.folder = Some(config.folder.clone());
    settings.alpha = config.alpha;
    settings.precision = config.precision;
    settings.marker = config.marker.clone();
    if let Err(err) = settings.save() {
        warn!(error = %err, "could not remember settings");
    }
    Ok(())
}

fn handle_alphas(args: AlphasArgs) -> Result<(), AppError> {
    let settings = Settings::load()?;
    let alphas = sequence_from(&args.alpha.resolve(settings.alpha))?;

    println!("{}", crate::report::format_alpha_table(&alphas, &[]));
    print_preview(&alphas, &args.plot);
    Ok(())
}

fn handle_manifest(args: ManifestArgs) -> Result<(), AppError> {
    let settings = Settings::load()?;
    let alphas = sequence_from(&args.alpha.resolve(settings.alpha))?;
    let text = manifest(&args.model_a, &args.model_b, &alphas.raw(), alphas.model);

    match &args.output {
        Some(path) => {
            write_manifest(path, &text)?;
            info!(path = %path.display(), "wrote manifest");
            println!("Manifest written to {}", path.display());
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn handle_list(args: ListArgs) -> Result<(), AppError> {
    let settings = Settings::load()?;
    let folder = resolve_folder(args.folder, &settings);
    let names = list_checkpoints(&folder)?;
    print!("{}", crate::report::format_checkpoint_list(&folder, &names));
    Ok(())
}

fn handle_demo(args: DemoArgs) -> Result<(), AppError> {
    std::fs::create_dir_all(&args.folder).map_err(|e| {
        AppError::new(4, format!("Failed to create folder '{}': {e}", args.folder.display()))
    })?;
    let config = SyntheticConfig {
        seed: args.seed,
        layers: args.layers,
        width: args.width,
        half_b: args.half_b,
        ..SyntheticConfig::default()
    };
    let (a, b) = write_pair(&args.folder, &config)?;
    println!("Wrote {}", a.display());
    println!("Wrote {}", b.display());
    println!(
        "Try: bcm merge -f {} -a demo_a.ckpt -b demo_b.ckpt",
        args.folder.display()
    );
    Ok(())
}

fn print_preview(alphas: &AlphaSequence, plot: &PlotArgs) {
    if !plot.no_plot {
        println!("{}", crate::plot::render_curve_preview(alphas, plot.width, plot.height));
    }
}

/// Explicit flag, then the remembered folder, then the working directory.
pub fn resolve_folder(flag: Option<PathBuf>, settings: &Settings) -> PathBuf {
    flag.or_else(|| settings.folder.clone().filter(|p| p.is_dir()))
        .unwrap_or_else(|| Path::new(".").to_path_buf())
}

pub fn batch_config_from_args(
    args: &MergeArgs,
    settings: &Settings,
    folder: PathBuf,
    model_a: String,
    model_b: String,
) -> BatchConfig {
    BatchConfig {
        folder,
        model_a,
        model_b,
        alpha: args.alpha.resolve(settings.alpha),
        precision: args.precision.unwrap_or(settings.precision),
        marker: args.marker.clone().unwrap_or_else(|| settings.marker.clone()),
        plot: !args.plot.no_plot,
        plot_width: args.plot.width,
        plot_height: args.plot.height,
    }
}

/// Rewrite argv so `bcm` defaults to `bcm tui`.
///
/// Rules:
/// - `bcm`                       -> `bcm tui`
/// - `bcm -f models ...`         -> `bcm tui -f models ...`
/// - `bcm --help/--version/-h`   -> unchanged (show top-level help/version)
fn rewrite_args(mut argv: Vec<String>) -> Vec<String> {
    let Some(arg1) = argv.get(1).cloned() else {
        argv.push("tui".to_string());
        return argv;
    };

    let is_top_level_help_or_version = matches!(
        arg1.as_str(),
        "-h" | "--help" | "-V" | "--version" | "help"
    );
    if is_top_level_help_or_version {
        return argv;
    }

    let is_subcommand = matches!(
        arg1.as_str(),
        "merge" | "alphas" | "manifest" | "list" | "demo" | "tui"
    );
    if is_subcommand {
        return argv;
    }

    // If the first token is a flag, treat it as "tui flags".
    if arg1.starts_with('-') {
        argv.insert(1, "tui".to_string());
        return argv;
    }

    // Otherwise, leave as-is.
    argv
}
