// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod hash;
pub mod lookup;
pub mod record;
pub mod timeline;
pub mod verify;

use comfy_table::presets::UTF8_FULL;
use comfy_table::{ContentArrangement, Table};
use riscv_attest::LedgerEntry;

/// Ledger entries as a table, in the order given.
pub(crate) fn entry_table<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["#", "Timestamp", "Artifact", "SHA-256"]);

    for (i, entry) in entries.into_iter().enumerate() {
        table.add_row(vec![
            (i + 1).to_string(),
            format_timestamp(entry.timestamp),
            entry.artifact.clone(),
            entry.sha256.to_string(),
        ]);
    }
    table
}

pub(crate) fn format_timestamp(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|s| chrono::DateTime::from_timestamp(s, 0))
        .map(|dt| dt.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
        .unwrap_or_else(|| secs.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use riscv_attest::ArtifactIdentity;

    #[test]
    fn test_format_timestamp() {
        assert_eq!(format_timestamp(0), "1970-01-01T00:00:00Z");
        assert_eq!(format_timestamp(1_700_000_000), "2023-11-14T22:13:20Z");
        // Out of chrono's range falls back to the raw number.
        assert_eq!(format_timestamp(u64::MAX), u64::MAX.to_string());
    }

    #[test]
    fn test_entry_table_has_one_row_per_entry() {
        let entries: Vec<LedgerEntry> = (0..3u8)
            .map(|i| LedgerEntry {
                artifact: "fixture.elf".into(),
                sha256: ArtifactIdentity::from_digest([i; 32]),
                timestamp: u64::from(i),
            })
            .collect();
        let table = entry_table(&entries);
        assert_eq!(table.row_iter().count(), 3);
    }
}
