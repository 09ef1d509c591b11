use bytes::Bytes;
use serde_json::json;

use scoutsheet_bucket::{BucketStore, MemoryBucketStore};
use scoutsheet_core::pipeline::{correct_documents, DocumentInput, DocumentStatus};
use scoutsheet_parser::GroundTruthTable;

fn ground_truth_csv() -> String {
    let mut csv = String::from("R.P,Date,Rep,TRT,Path");
    for n in 1..=20 {
        csv.push_str(&format!(",L{n}"));
    }
    csv.push('\n');
    csv.push_str("1.1,20250505,7,PK,BR,95,-,-,35,-,-,-,-,-,-,-,-,-,-,-,-,-,-,-,-\n");
    csv
}

fn labels_json(rp: &str, path: &str, l1: &str) -> Vec<u8> {
    serde_json::to_vec(&json!({
        "$schema": "https://schema.cognitiveservices.azure.com/formrecognizer/2021-03-01/labels.json",
        "document": "sheet.pdf",
        "labels": [
            {"label": "dynamic/0/R.P", "value": [{"page": 1, "text": rp, "boundingBoxes": []}]},
            {"label": "dynamic/0/Path", "value": [{"page": 1, "text": path, "boundingBoxes": []}]},
            {"label": "dynamic/0/L1", "value": [{"page": 1, "text": l1, "boundingBoxes": []}]}
        ]
    }))
    .unwrap()
}

#[tokio::test]
async fn listed_documents_are_corrected_and_uploaded() {
    let store = MemoryBucketStore::new();
    store
        .insert("ground_truth/sheet.csv", ground_truth_csv().into_bytes())
        .await;
    store
        .insert("sheets/sheet.pdf.labels.json", labels_json("1.1", "BR", "10"))
        .await;
    store.insert("sheets/notes.txt", &b"not a label file"[..]).await;

    // The same steps the run subcommand goes through, against the in-memory
    // collaborator.
    let gt_bytes = store.get_object("ground_truth/sheet.csv").await.unwrap();
    let table = GroundTruthTable::load(&gt_bytes).unwrap();

    let keys: Vec<String> = store
        .list_objects("sheets/")
        .await
        .unwrap()
        .into_iter()
        .filter(|key| key.ends_with(".labels.json"))
        .collect();
    assert_eq!(keys, vec!["sheets/sheet.pdf.labels.json".to_string()]);

    let mut downloaded = Vec::new();
    for key in keys {
        let bytes = store.get_object(&key).await.unwrap();
        downloaded.push((key, bytes));
    }
    let inputs: Vec<DocumentInput<'_>> = downloaded
        .iter()
        .map(|(key, bytes)| DocumentInput {
            key,
            contents: bytes,
        })
        .collect();

    let batch = correct_documents(&table, &inputs);
    assert_eq!(batch.reports[0].status, DocumentStatus::Corrected);

    for document in &batch.corrected {
        let destination = format!("corrected/{}", document.key);
        store
            .put_object(
                &destination,
                Bytes::from(document.contents.clone()),
                "application/json",
            )
            .await
            .unwrap();
        if let Some(report) = &document.report {
            let report_key = destination.replace(".json", ".report.csv");
            store
                .put_object(&report_key, Bytes::from(report.clone()), "text/csv")
                .await
                .unwrap();
        }
    }

    assert!(store
        .contains("corrected/sheets/sheet.pdf.labels.json")
        .await);
    assert!(store
        .contains("corrected/sheets/sheet.pdf.labels.report.csv")
        .await);

    let corrected = store
        .get_object("corrected/sheets/sheet.pdf.labels.json")
        .await
        .unwrap();
    let value: serde_json::Value = serde_json::from_slice(&corrected).unwrap();
    let labels = value["labels"].as_array().unwrap();
    let l1 = labels
        .iter()
        .find(|entry| entry["label"] == "dynamic/0/L1")
        .unwrap();
    assert_eq!(l1["value"][0]["text"], "95");
}

#[tokio::test]
async fn upload_is_idempotent_under_retry() {
    let store = MemoryBucketStore::new();
    let payload = Bytes::from_static(b"{\"a\":1}");

    store
        .put_object("corrected/a.labels.json", payload.clone(), "application/json")
        .await
        .unwrap();
    store
        .put_object("corrected/a.labels.json", payload.clone(), "application/json")
        .await
        .unwrap();

    assert_eq!(store.len().await, 1);
    assert_eq!(
        store.get_object("corrected/a.labels.json").await.unwrap(),
        payload
    );
}
