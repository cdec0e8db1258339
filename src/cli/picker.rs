//! Interactive checkpoint picker.
//!
//! This is intentionally kept separate from clap parsing:
//! - clap handles structured flags/subcommands
//! - the picker provides the "run `bcm merge` and choose a model" UX
//!
//! The picker lists the checkpoints directly inside the source folder.

use std::io::{self, BufRead, Write};
use std::path::Path;

use crate::error::AppError;
use crate::io::checkpoint::{is_checkpoint_path, list_checkpoints};

/// Prompt the user to choose a checkpoint in `folder`.
///
/// Behavior:
/// - list the folder's checkpoints
/// - accept either a number (from the list) or a file name
/// - `q` cancels
pub fn prompt_for_checkpoint(folder: &Path, label: &str) -> Result<String, AppError> {
    let files = list_checkpoints(folder)?;
    if files.is_empty() {
        return Err(AppError::new(
            2,
            format!(
                "No checkpoints (.ckpt / .safetensors) found in {}. Pass --folder or run `bcm demo`.",
                folder.display()
            ),
        ));
    }

    println!("Checkpoints in {}:", folder.display());
    for (idx, name) in files.iter().enumerate() {
        println!("{:>3}) {name}", idx + 1);
    }

    let stdin = io::stdin();
    let stdout = io::stdout();
    pick(folder, label, &files, &mut stdin.lock(), &mut stdout.lock())
}

fn pick(
    folder: &Path,
    label: &str,
    files: &[String],
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<String, AppError> {
    let write_err = |e: io::Error| AppError::new(2, format!("Failed to write prompt: {e}"));

    loop {
        write!(
            output,
            "Select {label} by number (1-{}) or name (q to quit): ",
            files.len()
        )
        .map_err(write_err)?;
        output.flush().map_err(write_err)?;

        let mut line = String::new();
        let bytes = input
            .read_line(&mut line)
            .map_err(|e| AppError::new(2, format!("Failed to read input: {e}")))?;
        if bytes == 0 {
            return Err(AppError::new(
                2,
                format!("No input received. Pass {label} with --model-a/--model-b."),
            ));
        }

        let choice = line.trim();
        if choice.eq_ignore_ascii_case("q") {
            return Err(AppError::new(2, "Canceled."));
        }

        if let Ok(number) = choice.parse::<usize>() {
            if (1..=files.len()).contains(&number) {
                return Ok(files[number - 1].clone());
            }
            writeln!(
                output,
                "Invalid choice: {number}. Enter a number between 1 and {}.",
                files.len()
            )
            .map_err(write_err)?;
            continue;
        }

        match validate_checkpoint_name(folder, choice) {
            Ok(name) => return Ok(name),
            Err(err) => writeln!(output, "{err}").map_err(write_err)?,
        }
    }
}

/// Check that `name` is a checkpoint file inside `folder`.
pub fn validate_checkpoint_name(folder: &Path, name: &str) -> Result<String, AppError> {
    let path = folder.join(name);
    if !path.exists() {
        return Err(AppError::new(2, format!("Checkpoint not found: {}", path.display())));
    }
    if path.is_dir() {
        return Err(AppError::new(
            2,
            format!("Expected a file, got a directory: {}", path.display()),
        ));
    }
    if !is_checkpoint_path(&path) {
        return Err(AppError::new(
            2,
            format!("Expected a .ckpt or .safetensors file (got: {name})."),
        ));
    }
    Ok(name.to_string())
}
