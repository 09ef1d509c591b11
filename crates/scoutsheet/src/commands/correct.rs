use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use tracing::info;

use scoutsheet_core::pipeline::correct_single;
use scoutsheet_parser::GroundTruthTable;

#[derive(Args, Debug)]
pub struct CorrectArgs {
    /// Ground truth CSV path
    #[arg(long)]
    pub ground_truth: PathBuf,

    /// Input label document path
    #[arg(long)]
    pub input: PathBuf,

    /// Output path for the corrected document
    #[arg(long)]
    pub output: PathBuf,

    /// Output path for the correction report CSV
    #[arg(long)]
    pub report: Option<PathBuf>,
}

pub fn handle_correct(args: CorrectArgs) -> Result<()> {
    let ground_truth = fs::read(&args.ground_truth).with_context(|| {
        format!(
            "failed to read ground truth CSV {}",
            args.ground_truth.display()
        )
    })?;
    let table = GroundTruthTable::load(&ground_truth)?;

    let contents = fs::read(&args.input)
        .with_context(|| format!("failed to read label document {}", args.input.display()))?;

    let corrected = correct_single(&table, &contents)?;

    fs::write(&args.output, &corrected.contents)
        .with_context(|| format!("failed to write {}", args.output.display()))?;

    match (&args.report, &corrected.report) {
        (Some(path), Some(report)) => {
            fs::write(path, report)
                .with_context(|| format!("failed to write {}", path.display()))?;
        }
        (Some(_), None) => info!("no corrections were applied; report not written"),
        _ => {}
    }

    let result = &corrected.result;
    println!(
        "{}: {} matched / {} unmatched / {} missing key fields; {} fields corrected, {} unresolved",
        args.input.display(),
        result.matched_groups(),
        result.unmatched_groups(),
        result.missing_key_groups(),
        result.corrected_fields(),
        result.unresolved_fields()
    );

    Ok(())
}
