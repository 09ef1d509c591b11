//! Per-document and batch orchestration: parse, correct, validate, render.
//! One malformed document never aborts the batch; ground-truth problems are
//! the caller's to treat as fatal.

use std::collections::HashSet;
use std::fmt;

use blake3::Hasher;
use tracing::{error, warn};

use scoutsheet_parser::{GroundTruthTable, LabelDocument};

use crate::engine::{correct_document, CorrectionResult};
use crate::error::PipelineError;
use crate::report::render_report;
use crate::validation::validate;

#[derive(Debug)]
pub struct DocumentInput<'a> {
    pub key: &'a str,
    pub contents: &'a [u8],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentStatus {
    Corrected,
    Duplicate,
    Malformed,
    FailedValidation,
}

#[derive(Debug)]
pub struct DocumentReport {
    pub key: String,
    pub hash: String,
    pub status: DocumentStatus,
    pub matched_groups: usize,
    pub unmatched_groups: usize,
    pub missing_key_groups: usize,
    pub corrected_fields: usize,
    pub unresolved_fields: usize,
    pub failure: Option<String>,
}

impl DocumentReport {
    fn new(key: &str, hash: String, status: DocumentStatus) -> Self {
        Self {
            key: key.to_string(),
            hash,
            status,
            matched_groups: 0,
            unmatched_groups: 0,
            missing_key_groups: 0,
            corrected_fields: 0,
            unresolved_fields: 0,
            failure: None,
        }
    }

    fn with_counts(mut self, result: &CorrectionResult) -> Self {
        self.matched_groups = result.matched_groups();
        self.unmatched_groups = result.unmatched_groups();
        self.missing_key_groups = result.missing_key_groups();
        self.corrected_fields = result.corrected_fields();
        self.unresolved_fields = result.unresolved_fields();
        self
    }

    fn with_failure(mut self, failure: impl Into<String>) -> Self {
        self.failure = Some(failure.into());
        self
    }
}

/// A corrected document ready for upload, with its optional change report.
#[derive(Debug)]
pub struct CorrectedDocument {
    pub key: String,
    pub contents: Vec<u8>,
    pub report: Option<Vec<u8>>,
}

#[derive(Debug)]
pub struct CorrectionBatch {
    pub corrected: Vec<CorrectedDocument>,
    pub reports: Vec<DocumentReport>,
}

impl CorrectionBatch {
    pub fn summary(&self) -> RunSummary {
        RunSummary::from_reports(&self.reports)
    }
}

/// Output of correcting one document outside of a batch.
#[derive(Debug)]
pub struct CorrectedFile {
    pub contents: Vec<u8>,
    pub report: Option<Vec<u8>>,
    pub result: CorrectionResult,
}

/// Single-document path used by the local file mode. Validation violations
/// are a hard failure here: there is no batch to isolate them in.
pub fn correct_single(
    table: &GroundTruthTable,
    contents: &[u8],
) -> Result<CorrectedFile, PipelineError> {
    let mut doc = LabelDocument::parse(contents)?;
    let result = correct_document(table, &mut doc);
    let violations = validate(&doc, &result)?;
    if !violations.is_empty() {
        return Err(PipelineError::Validation { violations });
    }
    let contents = doc.to_bytes()?;
    let report = render_report(&result.changes)?;
    Ok(CorrectedFile {
        contents,
        report,
        result,
    })
}

/// Corrects a batch of documents against one shared table. Inputs whose
/// contents were already seen in this batch are reported as duplicates and
/// not reprocessed.
pub fn correct_documents(
    table: &GroundTruthTable,
    inputs: &[DocumentInput<'_>],
) -> CorrectionBatch {
    let mut corrected = Vec::new();
    let mut reports = Vec::new();
    let mut seen_hashes: HashSet<String> = HashSet::new();

    for input in inputs {
        let hash = content_hash(input.contents);
        if !seen_hashes.insert(hash.clone()) {
            reports.push(DocumentReport::new(
                input.key,
                hash,
                DocumentStatus::Duplicate,
            ));
            continue;
        }

        let mut doc = match LabelDocument::parse(input.contents) {
            Ok(doc) => doc,
            Err(err) => {
                warn!(key = input.key, %err, "skipping malformed document");
                reports.push(
                    DocumentReport::new(input.key, hash, DocumentStatus::Malformed)
                        .with_failure(err.to_string()),
                );
                continue;
            }
        };

        let result = correct_document(table, &mut doc);

        let violations = match validate(&doc, &result) {
            Ok(violations) => violations,
            Err(err) => {
                error!(key = input.key, %err, "document corrupted during correction");
                reports.push(
                    DocumentReport::new(input.key, hash, DocumentStatus::FailedValidation)
                        .with_counts(&result)
                        .with_failure(err.to_string()),
                );
                continue;
            }
        };
        if !violations.is_empty() {
            let detail = violations
                .iter()
                .map(|violation| violation.to_string())
                .collect::<Vec<_>>()
                .join("; ");
            warn!(key = input.key, detail = %detail, "corrected document failed validation");
            reports.push(
                DocumentReport::new(input.key, hash, DocumentStatus::FailedValidation)
                    .with_counts(&result)
                    .with_failure(detail),
            );
            continue;
        }

        let rendered = doc
            .to_bytes()
            .map_err(PipelineError::from)
            .and_then(|contents| Ok((contents, render_report(&result.changes)?)));
        match rendered {
            Ok((contents, report)) => {
                corrected.push(CorrectedDocument {
                    key: input.key.to_string(),
                    contents,
                    report,
                });
                reports.push(
                    DocumentReport::new(input.key, hash, DocumentStatus::Corrected)
                        .with_counts(&result),
                );
            }
            Err(err) => {
                error!(key = input.key, %err, "failed to render corrected document");
                reports.push(
                    DocumentReport::new(input.key, hash, DocumentStatus::FailedValidation)
                        .with_counts(&result)
                        .with_failure(err.to_string()),
                );
            }
        }
    }

    CorrectionBatch { corrected, reports }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub documents: usize,
    pub corrected_documents: usize,
    pub duplicate_documents: usize,
    pub malformed_documents: usize,
    pub failed_documents: usize,
    pub matched_groups: usize,
    pub unmatched_groups: usize,
    pub missing_key_groups: usize,
    pub corrected_fields: usize,
    pub unresolved_fields: usize,
}

impl RunSummary {
    pub fn from_reports(reports: &[DocumentReport]) -> Self {
        let mut summary = RunSummary {
            documents: reports.len(),
            ..RunSummary::default()
        };
        for report in reports {
            match report.status {
                DocumentStatus::Corrected => summary.corrected_documents += 1,
                DocumentStatus::Duplicate => summary.duplicate_documents += 1,
                DocumentStatus::Malformed => summary.malformed_documents += 1,
                DocumentStatus::FailedValidation => summary.failed_documents += 1,
            }
            summary.matched_groups += report.matched_groups;
            summary.unmatched_groups += report.unmatched_groups;
            summary.missing_key_groups += report.missing_key_groups;
            summary.corrected_fields += report.corrected_fields;
            summary.unresolved_fields += report.unresolved_fields;
        }
        summary
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "documents: {}", self.documents)?;
        writeln!(f, "  corrected:         {}", self.corrected_documents)?;
        writeln!(f, "  duplicates:        {}", self.duplicate_documents)?;
        writeln!(f, "  skipped malformed: {}", self.malformed_documents)?;
        writeln!(f, "  failed validation: {}", self.failed_documents)?;
        writeln!(
            f,
            "groups: {} matched / {} unmatched / {} missing key fields",
            self.matched_groups, self.unmatched_groups, self.missing_key_groups
        )?;
        write!(
            f,
            "fields: {} corrected / {} unresolved",
            self.corrected_fields, self.unresolved_fields
        )
    }
}

fn content_hash(contents: &[u8]) -> String {
    let mut hasher = Hasher::new();
    hasher.update(contents);
    hasher.finalize().to_hex().to_string()
}
