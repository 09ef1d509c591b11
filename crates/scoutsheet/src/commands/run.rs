use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use clap::Args;
use tracing::{info, warn};

use scoutsheet_bucket::{BucketStore, S3BucketStore, S3Config};
use scoutsheet_core::pipeline::{correct_documents, DocumentInput};
use scoutsheet_parser::GroundTruthTable;

use crate::cache::DebugCache;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Local path to the ground truth CSV
    #[arg(long, conflicts_with = "ground_truth_key")]
    pub ground_truth: Option<PathBuf>,

    /// Bucket key of the ground truth CSV, downloaded before the run
    #[arg(long)]
    pub ground_truth_key: Option<String>,

    /// Prefix the label documents are listed under
    #[arg(long, default_value = "")]
    pub prefix: String,

    /// Suffix filter applied to listed keys
    #[arg(long, default_value = ".labels.json")]
    pub suffix: String,

    /// Prefix corrected documents and reports are uploaded under
    #[arg(long, default_value = "corrected/")]
    pub destination_prefix: String,

    /// List and correct without uploading anything
    #[arg(long)]
    pub dry_run: bool,

    /// Write audit copies of downloaded and corrected files to a scratch directory
    #[arg(long)]
    pub cache: bool,

    /// Keep the scratch directory instead of deleting it on exit
    #[arg(long, requires = "cache")]
    pub keep_cache: bool,
}

pub async fn handle_run(args: RunArgs) -> Result<()> {
    dotenvy::dotenv().ok();
    let config = S3Config::from_env()?;
    let store = S3BucketStore::new(config).await?;
    run_with_store(&store, args).await
}

pub async fn run_with_store(store: &dyn BucketStore, args: RunArgs) -> Result<()> {
    let ground_truth_bytes = match (&args.ground_truth, &args.ground_truth_key) {
        (Some(path), _) => std::fs::read(path)
            .with_context(|| format!("failed to read ground truth CSV {}", path.display()))?,
        (None, Some(key)) => store
            .get_object(key)
            .await
            .with_context(|| format!("failed to download ground truth CSV '{key}'"))?
            .to_vec(),
        (None, None) => bail!("either --ground-truth or --ground-truth-key is required"),
    };

    // No ground truth means no document is safely correctable: abort here,
    // before touching any document.
    let table = GroundTruthTable::load(&ground_truth_bytes)?;
    info!(rows = table.len(), "ground truth table loaded");

    let cache = if args.cache {
        DebugCache::new(args.keep_cache)?
    } else {
        DebugCache::disabled()
    };

    let keys: Vec<String> = store
        .list_objects(&args.prefix)
        .await
        .context("failed to list label documents")?
        .into_iter()
        .filter(|key| key.ends_with(&args.suffix))
        .collect();
    info!(count = keys.len(), prefix = %args.prefix, "label documents listed");

    let mut downloaded: Vec<(String, Bytes)> = Vec::new();
    for key in keys {
        match store.get_object(&key).await {
            Ok(bytes) => {
                cache.save(&key, &bytes)?;
                downloaded.push((key, bytes));
            }
            // One unreadable blob must not abort the batch.
            Err(err) => warn!(key = %key, %err, "failed to download label document; skipping"),
        }
    }

    let inputs: Vec<DocumentInput<'_>> = downloaded
        .iter()
        .map(|(key, bytes)| DocumentInput {
            key,
            contents: bytes,
        })
        .collect();
    let batch = correct_documents(&table, &inputs);

    for report in &batch.reports {
        info!(
            key = %report.key,
            status = ?report.status,
            matched = report.matched_groups,
            unmatched = report.unmatched_groups,
            corrected = report.corrected_fields,
            "document processed"
        );
    }

    let mut uploaded = 0;
    for document in &batch.corrected {
        let destination = format!("{}{}", args.destination_prefix, document.key);
        cache.save(&destination, &document.contents)?;

        if !args.dry_run {
            store
                .put_object(
                    &destination,
                    Bytes::from(document.contents.clone()),
                    "application/json",
                )
                .await
                .with_context(|| format!("failed to upload corrected document '{destination}'"))?;
            uploaded += 1;
        }

        if let Some(report) = &document.report {
            let report_key = report_key_for(&destination);
            cache.save(&report_key, report)?;
            if !args.dry_run {
                store
                    .put_object(&report_key, Bytes::from(report.clone()), "text/csv")
                    .await
                    .with_context(|| format!("failed to upload report '{report_key}'"))?;
            }
        }
    }

    println!("\n--- Correction Summary ---");
    println!("{}", batch.summary());
    if args.dry_run {
        println!("dry run: nothing uploaded");
    } else {
        println!("uploaded: {uploaded} corrected documents");
    }
    if let Some(path) = cache.path() {
        println!("cache directory: {}", path.display());
    }

    Ok(())
}

/// `corrected/x.labels.json` -> `corrected/x.labels.report.csv`.
fn report_key_for(destination: &str) -> String {
    match destination.strip_suffix(".json") {
        Some(stem) => format!("{stem}.report.csv"),
        None => format!("{destination}.report.csv"),
    }
}
