//! In-memory uniqueness index over constrained columns.
//!
//! Keys are SHA-256 hex digests of the concatenated `{position}{value}`
//! pairs, ascending by column position. Booleans render as `TRUE`/`FALSE`
//! so a typed `true` and the text a formatted backend hands back digest
//! identically.

use std::fmt::Write as _;

use gridbase_common::CellValue;
use rustc_hash::FxHashMap;
use sha2::{Digest, Sha256};

use crate::backend::Row;

/// Digest buckets mapping key digests to the zero-based data-row
/// positions carrying them.
#[derive(Debug, Default, Clone)]
pub struct UniqueIndex {
    key_positions: Vec<usize>,
    buckets: FxHashMap<String, Vec<u64>>,
}

impl UniqueIndex {
    /// Index `rows` over the given ascending column positions.
    pub fn build(key_positions: Vec<usize>, rows: &[Row]) -> Self {
        debug_assert!(key_positions.windows(2).all(|w| w[0] < w[1]));
        let mut index = Self {
            key_positions,
            buckets: FxHashMap::default(),
        };
        for (pos, row) in rows.iter().enumerate() {
            index.insert(pos as u64, row);
        }
        index
    }

    /// Record `row` as stored at data position `pos`.
    pub fn insert(&mut self, pos: u64, row: &Row) {
        let digest = self.digest(row);
        self.buckets.entry(digest).or_default().push(pos);
    }

    /// Positions sharing `row`'s key, if any.
    pub fn lookup(&self, row: &Row) -> Option<&[u64]> {
        self.buckets.get(&self.digest(row)).map(Vec::as_slice)
    }

    pub fn contains(&self, row: &Row) -> bool {
        self.buckets.contains_key(&self.digest(row))
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    fn digest(&self, row: &Row) -> String {
        let mut hasher = Sha256::new();
        for &pos in &self.key_positions {
            let rendered = match row.get(pos) {
                Some(CellValue::Bool(true)) => "TRUE".to_string(),
                Some(CellValue::Bool(false)) => "FALSE".to_string(),
                Some(value) => value.to_string(),
                None => String::new(),
            };
            hasher.update(pos.to_string().as_bytes());
            hasher.update(rendered.as_bytes());
        }
        let mut hex = String::with_capacity(64);
        for byte in hasher.finalize() {
            let _ = write!(hex, "{byte:02x}");
        }
        hex
    }
}
