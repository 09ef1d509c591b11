//! Renders the per-document correction report consumed by reviewers.

use crate::engine::CorrectionChange;

const REPORT_HEADER: [&str; 3] = ["label", "previous", "corrected"];

/// CSV of applied changes in application order. An empty change list yields
/// no report at all, matching the upstream convention.
pub fn render_report(changes: &[CorrectionChange]) -> Result<Option<Vec<u8>>, csv::Error> {
    if changes.is_empty() {
        return Ok(None);
    }

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(REPORT_HEADER)?;
    for change in changes {
        writer.write_record([&change.label, &change.previous, &change.corrected])?;
    }
    let bytes = writer.into_inner().map_err(|err| err.into_error())?;
    Ok(Some(bytes))
}
