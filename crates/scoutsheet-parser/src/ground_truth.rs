use std::collections::HashMap;
use std::fmt;

use tracing::warn;

use crate::errors::GroundTruthError;

/// Literal marker meaning "ground truth has no correction for this field".
pub const SENTINEL: &str = "-";

/// Number of positional measurement columns (`L1` through `L20`).
pub const MEASUREMENT_WIDTH: usize = 20;

const RP_COLUMN: usize = 0;
const PATH_COLUMN: usize = 4;
const FIRST_MEASUREMENT_COLUMN: usize = 5;

const FIXED_COLUMNS: [&str; 5] = ["R.P", "Date", "Rep", "TRT", "Path"];

/// Composite lookup key for a ground-truth row. Equality and hashing are
/// value-based so the table never has to fall back to string concatenation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecordKey {
    pub rp: String,
    pub path: String,
}

impl RecordKey {
    pub fn new(rp: impl AsRef<str>, path: impl AsRef<str>) -> Self {
        Self {
            rp: rp.as_ref().trim().to_string(),
            path: path.as_ref().trim().to_string(),
        }
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.rp, self.path)
    }
}

/// One ground-truth measurement cell. The sentinel is kept distinct from a
/// legitimate corrected value so the engine can tell "no opinion" from "write
/// this text".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Measurement {
    Sentinel,
    Value(String),
}

impl Measurement {
    /// Blank cells load as the sentinel, matching how upstream sheets leave
    /// unmeasured positions empty.
    pub fn from_cell(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed == SENTINEL {
            Measurement::Sentinel
        } else {
            Measurement::Value(trimmed.to_string())
        }
    }

    pub fn as_value(&self) -> Option<&str> {
        match self {
            Measurement::Sentinel => None,
            Measurement::Value(text) => Some(text),
        }
    }
}

/// Curated correction table, read-only after load.
#[derive(Debug, Clone)]
pub struct GroundTruthTable {
    rows: HashMap<RecordKey, Vec<Measurement>>,
}

impl GroundTruthTable {
    pub fn expected_header() -> Vec<String> {
        let mut header: Vec<String> = FIXED_COLUMNS.iter().map(|c| c.to_string()).collect();
        for n in 1..=MEASUREMENT_WIDTH {
            header.push(format!("L{n}"));
        }
        header
    }

    pub fn load(contents: &[u8]) -> Result<Self, GroundTruthError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(contents);

        let header: Vec<String> = reader
            .headers()?
            .iter()
            .map(|cell| cell.to_string())
            .collect();
        if header != Self::expected_header() {
            return Err(GroundTruthError::Schema { found: header });
        }

        let mut rows = HashMap::new();
        for (index, record) in reader.records().enumerate() {
            let record = record?;
            let row_index = index + 1;

            let rp = record.get(RP_COLUMN).unwrap_or_default();
            let path = record.get(PATH_COLUMN).unwrap_or_default();
            if rp.is_empty() || path.is_empty() {
                warn!(row = row_index, "skipping ground truth row with blank key fields");
                continue;
            }

            let key = RecordKey::new(rp, path);
            let values: Vec<Measurement> = (FIRST_MEASUREMENT_COLUMN
                ..FIRST_MEASUREMENT_COLUMN + MEASUREMENT_WIDTH)
                .map(|column| Measurement::from_cell(record.get(column).unwrap_or_default()))
                .collect();

            if rows.insert(key.clone(), values).is_some() {
                return Err(GroundTruthError::DuplicateKey { key, row_index });
            }
        }

        if rows.is_empty() {
            return Err(GroundTruthError::EmptyTable);
        }

        Ok(Self { rows })
    }

    /// Exact, case-sensitive match after trimming surrounding whitespace.
    /// `None` is an expected outcome the caller must handle, not an error.
    pub fn lookup(&self, rp: &str, path: &str) -> Option<&[Measurement]> {
        self.rows.get(&RecordKey::new(rp, path)).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
