//! Uniqueness constraints and their header-blob codec.

use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Declarative constraint stored in a table's header blob.
///
/// The engine acts on `unique_columns` only; `primary_key` and
/// `auto_increment` ride along so blobs written by other tooling survive a
/// round trip unchanged.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    #[serde(default)]
    pub unique_columns: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<Vec<String>>,

    #[serde(default)]
    pub auto_increment: bool,
}

impl Constraint {
    /// Constraint requiring the combined value of `columns` to be unique
    /// across all rows.
    pub fn unique<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            unique_columns: columns.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// A constraint with no unique columns deduplicates nothing.
    pub fn is_inert(&self) -> bool {
        self.unique_columns.is_empty()
    }

    /// Encode for the header cell.
    pub fn encode(&self) -> Result<String, StoreError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a header cell. Callers attach sheet context to the error.
    pub fn decode(blob: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(blob)
    }

    /// Zero-based positions of the unique columns within `columns`,
    /// ascending and deduplicated.
    pub fn key_positions(&self, columns: &[String]) -> Result<Vec<usize>, StoreError> {
        let mut positions = Vec::with_capacity(self.unique_columns.len());
        for name in &self.unique_columns {
            match columns.iter().position(|c| c == name) {
                Some(pos) => positions.push(pos),
                None => return Err(StoreError::UnknownColumn(name.clone())),
            }
        }
        positions.sort_unstable();
        positions.dedup();
        Ok(positions)
    }
}
