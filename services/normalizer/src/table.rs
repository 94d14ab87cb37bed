//! Persistence of canonical single-indicator tables.

use std::path::Path;

use tracing::debug;

use crate::error::Result;
use crate::record::{validate, CanonicalRecord};

/// Validate and write `records` to `path`, replacing any previous table.
pub fn write_table(path: &Path, records: &[CanonicalRecord]) -> Result<()> {
    validate(records)?;

    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    debug!(path = %path.display(), rows = records.len(), "canonical table written");
    Ok(())
}

pub fn read_table(path: &Path) -> Result<Vec<CanonicalRecord>> {
    let mut reader = csv::Reader::from_path(path)?;
    let mut records = Vec::new();
    for row in reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}
