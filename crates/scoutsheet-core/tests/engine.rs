use serde_json::json;

use scoutsheet_core::engine::{correct_document, GroupStatus};
use scoutsheet_parser::{FieldName, GroundTruthTable, LabelDocument, RecordKey};

fn ground_truth() -> GroundTruthTable {
    let mut csv = String::from("R.P,Date,Rep,TRT,Path");
    for n in 1..=20 {
        csv.push_str(&format!(",L{n}"));
    }
    csv.push('\n');
    // (1.1, BR): L1=95, L4=35, everything else sentinel.
    csv.push_str("1.1,20250505,7,PK,BR,95,-,-,35,-,-,-,-,-,-,-,-,-,-,-,-,-,-,-,-\n");
    // (1.1, DM): L1=85, L2=95.
    csv.push_str("1.1,20250505,7,PK,DM,85,95,-,-,-,-,-,-,-,-,-,-,-,-,-,-,-,-,-,-\n");
    GroundTruthTable::load(csv.as_bytes()).expect("ground truth load failed")
}

fn entry(label: &str, text: &str) -> serde_json::Value {
    json!({
        "label": label,
        "value": [{"page": 1, "text": text, "boundingBoxes": [[0.1, 0.2, 0.3, 0.4]]}]
    })
}

fn document(labels: Vec<serde_json::Value>) -> LabelDocument {
    let raw = json!({
        "$schema": "https://schema.cognitiveservices.azure.com/formrecognizer/2021-03-01/labels.json",
        "document": "TEST_20250505_R7P4_R8P2.pdf",
        "labels": labels
    });
    LabelDocument::parse(&serde_json::to_vec(&raw).unwrap()).expect("document parse failed")
}

#[test]
fn corrects_matched_group_and_counts_changes() {
    let table = ground_truth();
    let mut doc = document(vec![
        entry("dynamic/0/R.P", "1.1"),
        entry("dynamic/0/Path", "BR"),
        entry("dynamic/0/L1", "10"),
        entry("dynamic/0/L4", "-"),
    ]);

    let result = correct_document(&table, &mut doc);

    assert_eq!(result.outcomes.len(), 1);
    let outcome = &result.outcomes[0];
    assert_eq!(
        outcome.status,
        GroupStatus::Matched {
            key: RecordKey::new("1.1", "BR")
        }
    );
    // L1 rewritten, L4 rewritten from "-" to "35"; ground truth sentinel
    // positions leave the document alone.
    assert_eq!(outcome.corrected, 2);
    assert_eq!(doc.field_text(0, &FieldName::Measurement(1)), Some("95"));
    assert_eq!(doc.field_text(0, &FieldName::Measurement(4)), Some("35"));
}

#[test]
fn sentinel_never_overwrites_document_value() {
    let table = ground_truth();
    let mut doc = document(vec![
        entry("dynamic/0/R.P", "1.1"),
        entry("dynamic/0/Path", "BR"),
        entry("dynamic/0/L2", "77"),
    ]);

    let result = correct_document(&table, &mut doc);

    // Ground truth says "-" for L2: the extracted value survives.
    assert_eq!(doc.field_text(0, &FieldName::Measurement(2)), Some("77"));
    assert_eq!(result.changes.len(), 0);
    assert_eq!(result.outcomes[0].corrected, 0);
}

#[test]
fn ground_truth_value_without_document_field_counts_unresolved() {
    let table = ground_truth();
    // Document has no L4 entry even though ground truth has 35 there.
    let mut doc = document(vec![
        entry("dynamic/0/R.P", "1.1"),
        entry("dynamic/0/Path", "BR"),
        entry("dynamic/0/L1", "10"),
    ]);

    let result = correct_document(&table, &mut doc);

    let outcome = &result.outcomes[0];
    assert_eq!(outcome.corrected, 1);
    assert_eq!(outcome.unresolved, 1);
    // No entry fabricated for L4.
    assert!(doc.field_text(0, &FieldName::Measurement(4)).is_none());
}

#[test]
fn missing_key_fields_is_distinct_from_unmatched_key() {
    let table = ground_truth();
    let mut doc = document(vec![
        // Group 0 has no R.P at all.
        entry("dynamic/0/Path", "BR"),
        entry("dynamic/0/L1", "10"),
        // Group 1 has a full key that the table does not know.
        entry("dynamic/1/R.P", "9.9"),
        entry("dynamic/1/Path", "ZZ"),
        entry("dynamic/1/L1", "55"),
    ]);

    let result = correct_document(&table, &mut doc);

    assert_eq!(result.outcomes[0].status, GroupStatus::KeyFieldsMissing);
    assert_eq!(
        result.outcomes[1].status,
        GroupStatus::UnmatchedKey {
            key: RecordKey::new("9.9", "ZZ")
        }
    );
    // Neither group was touched.
    assert_eq!(doc.field_text(0, &FieldName::Measurement(1)), Some("10"));
    assert_eq!(doc.field_text(1, &FieldName::Measurement(1)), Some("55"));
    assert!(result.changes.is_empty());
}

#[test]
fn key_fields_are_trimmed_before_lookup() {
    let table = ground_truth();
    let mut doc = document(vec![
        entry("dynamic/0/R.P", " 1.1 "),
        entry("dynamic/0/Path", "BR "),
        entry("dynamic/0/L1", "10"),
    ]);

    let result = correct_document(&table, &mut doc);

    assert!(result.outcomes[0].status.is_matched());
    assert_eq!(doc.field_text(0, &FieldName::Measurement(1)), Some("95"));
}

#[test]
fn second_pass_is_idempotent() {
    let table = ground_truth();
    let mut doc = document(vec![
        entry("dynamic/0/R.P", "1.1"),
        entry("dynamic/0/Path", "BR"),
        entry("dynamic/0/L1", "10"),
        entry("dynamic/0/L4", "12"),
        entry("dynamic/1/R.P", "9.9"),
        entry("dynamic/1/Path", "ZZ"),
        entry("dynamic/1/L1", "55"),
    ]);

    let first = correct_document(&table, &mut doc);
    let second = correct_document(&table, &mut doc);

    assert_eq!(first.corrected_fields(), 2);
    assert_eq!(second.corrected_fields(), 0);
    let first_statuses: Vec<_> = first.outcomes.iter().map(|o| o.status.clone()).collect();
    let second_statuses: Vec<_> = second.outcomes.iter().map(|o| o.status.clone()).collect();
    assert_eq!(first_statuses, second_statuses);
}

#[test]
fn groups_are_processed_in_ascending_index_order() {
    let table = ground_truth();
    // Entries deliberately interleaved and out of numeric order.
    let mut doc = document(vec![
        entry("dynamic/2/R.P", "1.1"),
        entry("dynamic/2/Path", "DM"),
        entry("dynamic/0/R.P", "1.1"),
        entry("dynamic/0/Path", "BR"),
        entry("dynamic/2/L1", "12"),
        entry("dynamic/0/L1", "10"),
    ]);

    let result = correct_document(&table, &mut doc);

    let order: Vec<u32> = result.outcomes.iter().map(|o| o.group).collect();
    assert_eq!(order, vec![0, 2]);
}

#[test]
fn changes_carry_the_original_label_path() {
    let table = ground_truth();
    let mut doc = document(vec![
        entry("dynamic/1/R.P", "1.1"),
        entry("dynamic/1/Path", "DM"),
        entry("dynamic/1/L2", "19"),
    ]);

    let result = correct_document(&table, &mut doc);

    assert_eq!(result.changes.len(), 1);
    let change = &result.changes[0];
    assert_eq!(change.label, "dynamic/1/L2");
    assert_eq!(change.previous, "19");
    assert_eq!(change.corrected, "95");
}

#[test]
fn metadata_entries_are_untouched() {
    let table = ground_truth();
    let mut doc = document(vec![
        entry("ScoutName", "C. Harmon"),
        entry("dynamic/0/R.P", "1.1"),
        entry("dynamic/0/Path", "BR"),
        entry("dynamic/0/L1", "10"),
    ]);

    correct_document(&table, &mut doc);

    let metadata = doc
        .entries()
        .iter()
        .find(|entry| entry.label == "ScoutName")
        .expect("metadata entry missing");
    assert_eq!(metadata.value[0].text, "C. Harmon");
}
