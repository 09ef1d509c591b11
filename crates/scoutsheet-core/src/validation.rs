//! Structural checks on a corrected document before it is safe to persist.

use thiserror::Error;

use scoutsheet_parser::{FieldName, LabelDocument, SENTINEL};

use crate::engine::CorrectionResult;

/// Post-correction structural corruption. Should never occur while the
/// engine honors its contract; raising it means an engine bug, and the
/// document must not be uploaded.
#[derive(Debug, Error)]
#[error("document integrity violated after correction: {reason}")]
pub struct IntegrityError {
    pub reason: String,
}

/// A business-rule violation. Violations are data, not errors: the caller
/// decides whether to withhold the document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("document identifier is missing")]
    MissingDocumentId,

    #[error("entry '{label}' has an empty occurrence list")]
    EmptyOccurrences { label: String },

    #[error("matched group {group} has no usable measurement value")]
    MatchedGroupWithoutValues { group: u32 },
}

/// Returns the list of violations (empty means valid). Only a structurally
/// unreadable document yields `Err`.
pub fn validate(
    doc: &LabelDocument,
    result: &CorrectionResult,
) -> Result<Vec<Violation>, IntegrityError> {
    if !doc.index_consistent() {
        return Err(IntegrityError {
            reason: "group index no longer matches the entry list".to_string(),
        });
    }

    let mut violations = Vec::new();

    if doc.document_id().trim().is_empty() {
        violations.push(Violation::MissingDocumentId);
    }

    for entry in doc.entries() {
        if entry.value.is_empty() {
            violations.push(Violation::EmptyOccurrences {
                label: entry.label.clone(),
            });
        }
    }

    for outcome in &result.outcomes {
        if !outcome.status.is_matched() {
            continue;
        }
        let has_value = doc.group_fields(outcome.group).any(|(field, entry)| {
            matches!(field, FieldName::Measurement(_))
                && entry
                    .value
                    .first()
                    .map(|occurrence| {
                        let text = occurrence.text.trim();
                        !text.is_empty() && text != SENTINEL
                    })
                    .unwrap_or(false)
        });
        if !has_value {
            violations.push(Violation::MatchedGroupWithoutValues {
                group: outcome.group,
            });
        }
    }

    Ok(violations)
}
