//! Formatted terminal output: alpha tables, batch summaries, folder listings.
//!
//! We keep formatting code in one place so:
//! - the merge engine stays free of presentation concerns
//! - output changes are localized (important for snapshot tests)

use std::path::Path;

use chrono::{DateTime, Local};

use crate::app::pipeline::BatchRequest;
use crate::domain::AlphaSequence;
use crate::io::checkpoint::batch_dir;
use crate::io::manifest::format_alpha;

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Table of the batch steps: index, raw alpha, effective alpha, and optionally
/// the output file of each step.
pub fn format_alpha_table(sequence: &AlphaSequence, filenames: &[String]) -> String {
    let with_files = filenames.len() == sequence.len();
    let mut out = String::new();

    out.push_str(&format!("Interpolation: {}\n", sequence.model.display_name()));
    out.push_str(&format!("{}\n", sequence.model.blurb()));
    out.push('\n');

    let file_header = if with_files { "file" } else { "" };
    out.push_str(format!("{:>3} {:>8} {:>10} {file_header}", "#", "raw", "effective").trim_end());
    out.push('\n');
    let rule = if with_files { "-".repeat(24) } else { String::new() };
    out.push_str(format!("{:-<3} {:-<8} {:-<10} {rule}", "", "", "").trim_end());
    out.push('\n');

    for (idx, step) in sequence.iter().enumerate() {
        let file = if with_files { filenames[idx].as_str() } else { "" };
        out.push_str(
            format!(
                "{:>3} {:>8} {:>10.6} {file}",
                idx + 1,
                format_alpha(step.raw),
                step.effective
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out
}

/// Summary printed after a batch finishes.
pub fn format_batch_summary(
    request: &BatchRequest,
    written: &[String],
    started: DateTime<Local>,
    finished: DateTime<Local>,
) -> String {
    let elapsed = (finished - started).num_milliseconds() as f64 / 1000.0;
    let mut out = String::new();

    out.push_str("=== bcm - Merge Batch ===\n");
    out.push_str(&format!("Model A:   {}\n", request.model_a));
    out.push_str(&format!("Model B:   {}\n", request.model_b));
    out.push_str(&format!("Curve:     {}\n", request.model().display_name()));
    out.push_str(&format!("Precision: {}\n", request.precision.display_name()));
    out.push_str(&format!("Marker:    {}\n", request.marker));
    out.push_str(&format!("Output:    {}\n", batch_dir(&request.source_dir).display()));
    out.push_str(&format!("Started:   {}\n", started.format(TIME_FORMAT)));
    out.push_str(&format!("Finished:  {} ({elapsed:.1}s)\n", finished.format(TIME_FORMAT)));
    out.push_str(&format!("Written:   {} checkpoint(s)\n", written.len()));
    for name in written {
        out.push_str(&format!("- {name}\n"));
    }

    out
}

/// Listing of the checkpoints in a folder.
pub fn format_checkpoint_list(folder: &Path, names: &[String]) -> String {
    if names.is_empty() {
        return format!("No checkpoints (.ckpt / .safetensors) in {}\n", folder.display());
    }
    let mut out = format!("{} checkpoint(s) in {}:\n", names.len(), folder.display());
    for (idx, name) in names.iter().enumerate() {
        out.push_str(&format!("{:>3}) {name}\n", idx + 1));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::path::PathBuf;

    use crate::domain::{InterpolationModel, Precision};
    use crate::sequence::sequence;

    #[test]
    fn alpha_table_with_files() {
        let seq = sequence(0.5, 0.25, 2, InterpolationModel::Exact).unwrap();
        let files = vec!["a_b_0.5_Exact.ckpt".to_string(), "a_b_0.75_Exact.ckpt".to_string()];
        let txt = format_alpha_table(&seq, &files);
        let lines: Vec<&str> = txt.lines().collect();

        assert_eq!(lines[0], "Interpolation: Exact");
        assert_eq!(lines[3], "  #      raw  effective file");
        assert_eq!(lines[5], "  1      0.5   0.500000 a_b_0.5_Exact.ckpt");
        assert_eq!(lines[6], "  2     0.75   0.750000 a_b_0.75_Exact.ckpt");
    }

    #[test]
    fn alpha_table_without_files_has_no_trailing_space() {
        let seq = sequence(0.05, 0.05, 8, InterpolationModel::SmoothStep).unwrap();
        let txt = format_alpha_table(&seq, &[]);
        let lines: Vec<&str> = txt.lines().collect();

        assert_eq!(lines[3], "  #      raw  effective");
        assert_eq!(lines[5], "  1     0.05   0.007250");
        assert_eq!(lines.len(), 5 + 8);
        assert!(lines.iter().all(|l| !l.ends_with(' ')));
    }

    #[test]
    fn batch_summary_lists_outputs() {
        let request = BatchRequest {
            source_dir: PathBuf::from("models"),
            model_a: "a.ckpt".to_string(),
            model_b: "b.ckpt".to_string(),
            alphas: sequence(0.1, 0.1, 1, InterpolationModel::SmootherStep).unwrap(),
            precision: Precision::Half,
            marker: "model".to_string(),
        };
        let started = Local.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        let finished = Local.with_ymd_and_hms(2026, 3, 1, 12, 0, 3).unwrap();
        let txt = format_batch_summary(&request, &["a_b_0.1_SmootherStep.ckpt".to_string()], started, finished);

        assert!(txt.contains("Curve:     SmootherStep\n"));
        assert!(txt.contains("Precision: Half (FP16)\n"));
        assert!(txt.contains("Started:   2026-03-01 12:00:00\n"));
        assert!(txt.contains("(3.0s)"));
        assert!(txt.ends_with("Written:   1 checkpoint(s)\n- a_b_0.1_SmootherStep.ckpt\n"));
    }

    #[test]
    fn checkpoint_list_handles_empty_folders() {
        let folder = Path::new("models");
        assert!(format_checkpoint_list(folder, &[]).starts_with("No checkpoints"));
        let txt = format_checkpoint_list(folder, &["a.ckpt".to_string()]);
        assert_eq!(txt, "1 checkpoint(s) in models:\n  1) a.ckpt\n");
    }
}
