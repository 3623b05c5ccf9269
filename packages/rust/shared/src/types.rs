//! Core domain types for SheetSync records.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RecordKey
// ---------------------------------------------------------------------------

/// Identity of a row or record: the `(section, name)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    pub section: String,
    pub name: String,
}

impl RecordKey {
    pub fn new(section: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            section: section.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.section, self.name)
    }
}

// ---------------------------------------------------------------------------
// Row
// ---------------------------------------------------------------------------

/// One entry of the tabular source, before reconciliation.
///
/// Every field is free text; cells absent from the export are empty strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row {
    pub section: String,
    pub name: String,
    /// Source URL of the pronunciation audio, or empty.
    pub audio: String,
    /// Source URL of the image, or empty.
    pub image: String,
    pub description: String,
}

impl Row {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.section, &self.name)
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One persisted entry of the record store.
///
/// Field order here is the serialized order. Fields not modelled below are
/// kept in `extra` so a rewrite of the store does not drop them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub section: String,
    pub name: String,
    /// Published image URL, or empty.
    #[serde(default)]
    pub image: String,
    /// Published audio URL, or empty.
    #[serde(default)]
    pub audio: String,
    #[serde(default)]
    pub description: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Record {
    pub fn key(&self) -> RecordKey {
        RecordKey::new(&self.section, &self.name)
    }
}
