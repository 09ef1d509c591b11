//! The correction engine: matches each dynamic group of a label document to
//! its ground-truth row and rewrites measurement text in place.

use tracing::debug;

use scoutsheet_parser::{
    FieldName, GroundTruthTable, LabelDocument, Measurement, RecordKey, SetFieldOutcome,
};

/// Why a group did or did not receive corrections. "Key fields missing" and
/// "key present but unknown" are distinct outcomes, logged differently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupStatus {
    Matched { key: RecordKey },
    KeyFieldsMissing,
    UnmatchedKey { key: RecordKey },
}

impl GroupStatus {
    pub fn is_matched(&self) -> bool {
        matches!(self, GroupStatus::Matched { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupOutcome {
    pub group: u32,
    pub status: GroupStatus,
    pub corrected: usize,
    pub unresolved: usize,
}

/// One applied text replacement, identified by the original dotted label path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionChange {
    pub label: String,
    pub previous: String,
    pub corrected: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorrectionResult {
    pub outcomes: Vec<GroupOutcome>,
    pub changes: Vec<CorrectionChange>,
}

impl CorrectionResult {
    pub fn matched_groups(&self) -> usize {
        self.outcomes.iter().filter(|o| o.status.is_matched()).count()
    }

    pub fn unmatched_groups(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, GroupStatus::UnmatchedKey { .. }))
            .count()
    }

    pub fn missing_key_groups(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| o.status == GroupStatus::KeyFieldsMissing)
            .count()
    }

    pub fn corrected_fields(&self) -> usize {
        self.outcomes.iter().map(|o| o.corrected).sum()
    }

    pub fn unresolved_fields(&self) -> usize {
        self.outcomes.iter().map(|o| o.unresolved).sum()
    }
}

/// Rewrites measurement values of every matched group in place. The table is
/// read-only; only occurrence text in the document changes. No I/O.
pub fn correct_document(table: &GroundTruthTable, doc: &mut LabelDocument) -> CorrectionResult {
    let mut outcomes = Vec::new();
    let mut changes = Vec::new();

    let groups: Vec<u32> = doc.group_indices().collect();
    for group in groups {
        let rp = doc
            .field_text(group, &FieldName::Rp)
            .map(|text| text.trim().to_string());
        let path = doc
            .field_text(group, &FieldName::Path)
            .map(|text| text.trim().to_string());

        let (Some(rp), Some(path)) = (rp, path) else {
            debug!(group, "group is missing key fields; leaving untouched");
            outcomes.push(GroupOutcome {
                group,
                status: GroupStatus::KeyFieldsMissing,
                corrected: 0,
                unresolved: 0,
            });
            continue;
        };

        let Some(values) = table.lookup(&rp, &path) else {
            debug!(group, %rp, %path, "no ground truth row for key");
            outcomes.push(GroupOutcome {
                group,
                status: GroupStatus::UnmatchedKey {
                    key: RecordKey::new(&rp, &path),
                },
                corrected: 0,
                unresolved: 0,
            });
            continue;
        };

        let mut corrected = 0;
        let mut unresolved = 0;
        for (position, value) in values.iter().enumerate() {
            // Sentinel blocks overwrite: ground truth has no opinion, the
            // document keeps whatever it extracted.
            let Measurement::Value(text) = value else {
                continue;
            };

            let field = FieldName::Measurement((position + 1) as u8);
            match doc.set_field_text(group, &field, text) {
                SetFieldOutcome::Replaced { previous } => {
                    corrected += 1;
                    changes.push(CorrectionChange {
                        label: format!("dynamic/{group}/{field}"),
                        previous,
                        corrected: text.clone(),
                    });
                }
                SetFieldOutcome::Unchanged => {}
                // Ground truth has a value but the document never extracted
                // this field; entries are never fabricated.
                SetFieldOutcome::FieldAbsent => unresolved += 1,
            }
        }

        outcomes.push(GroupOutcome {
            group,
            status: GroupStatus::Matched {
                key: RecordKey::new(&rp, &path),
            },
            corrected,
            unresolved,
        });
    }

    CorrectionResult { outcomes, changes }
}
