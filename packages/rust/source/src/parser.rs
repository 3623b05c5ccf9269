//! CSV export → strongly-typed [`Row`]s.

use sheetsync_shared::{Result, Row, SheetSyncError};

/// Columns every export must carry (after header normalization).
pub const REQUIRED_COLUMNS: [&str; 5] = ["section", "name", "audio", "image", "description"];

/// Positions of the required columns within a header row.
#[derive(Debug, Clone, Copy)]
struct ColumnMap {
    section: usize,
    name: usize,
    audio: usize,
    image: usize,
    description: usize,
}

impl ColumnMap {
    /// Resolve required columns from raw header cells.
    ///
    /// Headers are trimmed and lower-cased, so `Section` and `section` are the
    /// same column. The first occurrence of a repeated header wins.
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let normalized: Vec<String> = headers
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_lowercase())
            .collect();

        let position = |column: &str| normalized.iter().position(|h| h == column);

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .copied()
            .filter(|c| position(*c).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(SheetSyncError::parse(format!(
                "source is missing required column(s): {} (found: {})",
                missing.join(", "),
                normalized.join(", ")
            )));
        }

        // All present, checked above.
        let at = |column: &str| position(column).unwrap_or_default();
        Ok(Self {
            section: at("section"),
            name: at("name"),
            audio: at("audio"),
            image: at("image"),
            description: at("description"),
        })
    }

    fn row(&self, record: &csv::StringRecord) -> Row {
        let cell = |idx: usize| record.get(idx).unwrap_or_default().to_string();
        Row {
            section: cell(self.section),
            name: cell(self.name),
            audio: cell(self.audio),
            image: cell(self.image),
            description: cell(self.description),
        }
    }
}

/// Parse a CSV export into rows, in source order.
///
/// Fails fast when the header lacks a required column. Short rows are padded
/// with empty cells; rows with neither a section nor a name are dropped.
pub fn parse_rows(body: &str) -> Result<Vec<Row>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = reader
        .headers()
        .map_err(|e| SheetSyncError::parse(format!("failed to read CSV header: {e}")))?
        .clone();
    let columns = ColumnMap::from_headers(&headers)?;

    let mut rows = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            // Line 1 is the header.
            SheetSyncError::parse(format!("malformed CSV record {}: {e}", idx + 2))
        })?;

        let row = columns.row(&record);
        if row.section.trim().is_empty() && row.name.trim().is_empty() {
            tracing::debug!(record = idx + 2, "skipping row without section and name");
            continue;
        }
        rows.push(row);
    }

    Ok(rows)
}
