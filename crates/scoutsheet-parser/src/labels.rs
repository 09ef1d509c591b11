use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::DocumentError;

const DYNAMIC_SEGMENT: &str = "dynamic";

/// One page/text/bounding-box triple inside a label entry's value list.
/// Bounding boxes are opaque payloads, carried through unmodified and never
/// inspected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occurrence {
    pub page: i64,
    pub text: String,
    #[serde(rename = "boundingBoxes")]
    pub bounding_boxes: Value,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelEntry {
    pub label: String,
    pub value: Vec<Occurrence>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct LabelFile {
    #[serde(rename = "$schema", skip_serializing_if = "Option::is_none")]
    schema: Option<Value>,
    document: String,
    labels: Vec<LabelEntry>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Field position within a dynamic group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldName {
    /// `R.P`, the row.plant identifier.
    Rp,
    /// `Path`, the transect path code.
    Path,
    /// `L{n}`, a positional leaf measurement with n >= 1.
    Measurement(u8),
    Other(String),
}

impl FieldName {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "R.P" => FieldName::Rp,
            "Path" => FieldName::Path,
            _ => {
                if let Some(rest) = raw.strip_prefix('L') {
                    let plain_digits = !rest.is_empty()
                        && !rest.starts_with('0')
                        && rest.chars().all(|c| c.is_ascii_digit());
                    if plain_digits {
                        if let Ok(n) = rest.parse::<u8>() {
                            return FieldName::Measurement(n);
                        }
                    }
                }
                FieldName::Other(raw.to_string())
            }
        }
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldName::Rp => f.write_str("R.P"),
            FieldName::Path => f.write_str("Path"),
            FieldName::Measurement(n) => write!(f, "L{n}"),
            FieldName::Other(name) => f.write_str(name),
        }
    }
}

/// A label path decoded once at parse time. Anything that is not exactly
/// `dynamic/{index}/{field}` is metadata and survives round-trip untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelPath {
    Dynamic { group: u32, field: FieldName },
    Metadata,
}

impl LabelPath {
    pub fn parse(label: &str) -> Self {
        let mut segments = label.split('/');
        let (first, group, field, rest) = (
            segments.next(),
            segments.next(),
            segments.next(),
            segments.next(),
        );
        match (first, group, field, rest) {
            (Some(DYNAMIC_SEGMENT), Some(group), Some(field), None) if !field.is_empty() => {
                let plain_digits = !group.is_empty()
                    && (group.len() == 1 || !group.starts_with('0'))
                    && group.chars().all(|c| c.is_ascii_digit());
                match group.parse::<u32>() {
                    Ok(index) if plain_digits => LabelPath::Dynamic {
                        group: index,
                        field: FieldName::parse(field),
                    },
                    _ => LabelPath::Metadata,
                }
            }
            _ => LabelPath::Metadata,
        }
    }
}

/// Result of a targeted text replacement. `FieldAbsent` is a reported no-op
/// so callers can count unresolved corrections instead of losing them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetFieldOutcome {
    FieldAbsent,
    Unchanged,
    Replaced { previous: String },
}

/// A parsed label document: the raw structure plus a group index decoded from
/// the dynamic label paths. Mutation is limited to occurrence text.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelDocument {
    file: LabelFile,
    paths: Vec<LabelPath>,
    groups: BTreeMap<u32, Vec<usize>>,
}

impl LabelDocument {
    pub fn parse(contents: &[u8]) -> Result<Self, DocumentError> {
        let value: Value = serde_json::from_slice(contents)?;
        let file: LabelFile =
            serde_json::from_value(value).map_err(|err| DocumentError::Malformed {
                reason: err.to_string(),
            })?;

        let paths: Vec<LabelPath> = file
            .labels
            .iter()
            .map(|entry| LabelPath::parse(&entry.label))
            .collect();
        let groups = build_group_index(&paths);

        Ok(Self {
            file,
            paths,
            groups,
        })
    }

    pub fn document_id(&self) -> &str {
        &self.file.document
    }

    pub fn entries(&self) -> &[LabelEntry] {
        &self.file.labels
    }

    /// Group indices in ascending order.
    pub fn group_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.groups.keys().copied()
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Dynamic entries of one group, in original document order.
    pub fn group_fields(&self, group: u32) -> impl Iterator<Item = (&FieldName, &LabelEntry)> + '_ {
        self.groups
            .get(&group)
            .map(Vec::as_slice)
            .unwrap_or_default()
            .iter()
            .filter_map(|&index| match &self.paths[index] {
                LabelPath::Dynamic { field, .. } => Some((field, &self.file.labels[index])),
                LabelPath::Metadata => None,
            })
    }

    /// Text of the first occurrence of the named field, if the group has one.
    pub fn field_text(&self, group: u32, field: &FieldName) -> Option<&str> {
        self.group_fields(group)
            .find(|(name, _)| *name == field)
            .and_then(|(_, entry)| entry.value.first())
            .map(|occurrence| occurrence.text.as_str())
    }

    /// Replaces the text of every occurrence of the named field within the
    /// group. Pages and bounding boxes are untouched; occurrences are never
    /// added or removed.
    pub fn set_field_text(
        &mut self,
        group: u32,
        field: &FieldName,
        new_text: &str,
    ) -> SetFieldOutcome {
        let Some(indices) = self.groups.get(&group) else {
            return SetFieldOutcome::FieldAbsent;
        };
        let targets: Vec<usize> = indices
            .iter()
            .copied()
            .filter(|&index| {
                matches!(&self.paths[index], LabelPath::Dynamic { field: name, .. } if name == field)
            })
            .collect();
        if targets.is_empty() {
            return SetFieldOutcome::FieldAbsent;
        }

        let mut previous = None;
        let mut changed = false;
        for index in targets {
            for occurrence in &mut self.file.labels[index].value {
                if previous.is_none() {
                    previous = Some(occurrence.text.clone());
                }
                if occurrence.text != new_text {
                    occurrence.text = new_text.to_string();
                    changed = true;
                }
            }
        }

        match previous {
            Some(previous) if changed => SetFieldOutcome::Replaced { previous },
            Some(_) => SetFieldOutcome::Unchanged,
            None => SetFieldOutcome::FieldAbsent,
        }
    }

    /// True when the group index still describes the entry list. A mismatch
    /// after correction signals an engine bug, not a bad input.
    pub fn index_consistent(&self) -> bool {
        if self.paths.len() != self.file.labels.len() {
            return false;
        }
        let rebuilt: Vec<LabelPath> = self
            .file
            .labels
            .iter()
            .map(|entry| LabelPath::parse(&entry.label))
            .collect();
        rebuilt == self.paths && build_group_index(&rebuilt) == self.groups
    }

    /// Serializes the document. Output is structurally identical to the input
    /// except for corrected occurrence text.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(&self.file)
    }
}

fn build_group_index(paths: &[LabelPath]) -> BTreeMap<u32, Vec<usize>> {
    let mut groups: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for (index, path) in paths.iter().enumerate() {
        if let LabelPath::Dynamic { group, .. } = path {
            groups.entry(*group).or_default().push(index);
        }
    }
    groups
}
