//! Table handles: typed row access to one managed sheet.
//!
//! A handle is a cache of the sheet's header (schema, row count) plus an
//! optional uniqueness index. The cache is trusted only between a sync and
//! the end of the current operation: every public operation starts by
//! re-reading the header when stale, and marks the cache stale again before
//! returning, so the next caller re-synchronizes. Fresh handles from
//! create/find are already synced and skip one read on their first
//! operation. There are no transactions; the re-read-before-write
//! discipline is the only consistency mechanism (one logical writer per
//! table at a time).

use std::fmt;

use gridbase_common::{CellValue, RangeAddress};

use crate::backend::{GridBackend, Matrix, Row, SheetRef};
use crate::database::GridSession;
use crate::error::StoreError;
use crate::index::UniqueIndex;
use crate::schema::{DATA_START_COL, DATA_START_ROW, Record, TableSchema};

/// Predicate over one cell of a candidate row.
pub type ColumnPredicate<'a> = &'a dyn Fn(&CellValue) -> bool;

/// Column positions paired with the predicate each cell must satisfy.
pub type ConditionGroup<'a> = &'a [(usize, ColumnPredicate<'a>)];

/// Handle to one table stored on a sheet.
pub struct Table<B: GridBackend> {
    session: GridSession<B>,
    sheet: SheetRef,
    schema: TableSchema,
    index: Option<UniqueIndex>,
    synced: bool,
}

// Manual impl: the session holds a `Box<dyn Clock>` with no `Debug`.
impl<B: GridBackend> fmt::Debug for Table<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("sheet", &self.sheet)
            .field("schema", &self.schema)
            .field("index", &self.index)
            .field("synced", &self.synced)
            .finish_non_exhaustive()
    }
}

impl<B: GridBackend> Table<B> {
    pub(crate) fn new(
        session: GridSession<B>,
        sheet: SheetRef,
        schema: TableSchema,
        synced: bool,
    ) -> Self {
        Self {
            session,
            sheet,
            schema,
            index: None,
            synced,
        }
    }

    pub fn name(&self) -> &str {
        self.schema.name()
    }

    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }

    pub fn sheet(&self) -> &SheetRef {
        &self.sheet
    }

    /// Data rows as of the last header sync.
    pub fn row_count(&self) -> u64 {
        self.schema.row_count()
    }

    fn sync(&mut self) -> Result<(), StoreError> {
        if !self.synced {
            self.schema = read_schema(&self.session, &self.sheet)?;
            self.index = None;
            self.synced = true;
        }
        Ok(())
    }

    /// Leave the synced state so the next operation re-reads the header
    /// instead of trusting cached counts.
    fn leave_synced(&mut self) {
        self.synced = false;
    }

    /// Read up to `limit` data rows in stored order; `limit < 0` reads all,
    /// `limit == 0` reads none. Requests beyond the row count clamp to it.
    pub fn select(&mut self, limit: i64) -> Result<Vec<Row>, StoreError> {
        self.sync()?;
        let rows = self.read_rows(limit);
        self.leave_synced();
        rows
    }

    /// Full select filtered row-wise by `predicates`.
    pub fn select_where(&mut self, predicates: ConditionGroup<'_>) -> Result<Vec<Row>, StoreError> {
        let rows = self.select(-1)?;
        Ok(rows
            .into_iter()
            .filter(|row| matches_all(row, &[predicates]))
            .collect())
    }

    /// Insert `rows` that are not duplicates and pass every condition.
    ///
    /// There is no update-in-place: a row whose constrained-column key is
    /// already stored (or appears earlier in the same batch) is silently
    /// skipped. `append` writes after the existing rows; otherwise the
    /// accepted rows overwrite from the data offset and become the whole
    /// table. Conditions are ANDed across all groups and short-circuit on
    /// the first failing column. Returns the number of rows written.
    ///
    /// An empty `rows` is refused with [`StoreError::EmptyBatch`]; a row
    /// that does not fit the schema aborts the whole batch with
    /// [`StoreError::SchemaMismatch`] before anything is written.
    pub fn upsert_if(
        &mut self,
        rows: Vec<Row>,
        append: bool,
        conditions: &[ConditionGroup<'_>],
    ) -> Result<usize, StoreError> {
        if rows.is_empty() {
            return Err(StoreError::EmptyBatch);
        }
        self.sync()?;
        let written = self.upsert_inner(rows, append, conditions);
        self.leave_synced();
        written
    }

    fn upsert_inner(
        &mut self,
        rows: Vec<Row>,
        append: bool,
        conditions: &[ConditionGroup<'_>],
    ) -> Result<usize, StoreError> {
        for (i, row) in rows.iter().enumerate() {
            self.schema
                .check_row(row)
                .map_err(|reason| StoreError::SchemaMismatch { row: i, reason })?;
        }

        // Dedup needs the key digests of everything currently stored.
        if self.schema.is_constrained() {
            let stored = self.read_rows(-1)?;
            self.rebuild_index(&stored)?;
        } else {
            self.index = None;
        }

        let base = if append { self.schema.row_count() } else { 0 };
        let mut accepted: Vec<Row> = Vec::with_capacity(rows.len());
        for row in rows {
            if self.index.as_ref().is_some_and(|idx| idx.contains(&row)) {
                #[cfg(feature = "tracing")]
                tracing::debug!(table = %self.schema.name(), "skipping row with duplicate key");
                continue;
            }
            if !matches_all(&row, conditions) {
                continue;
            }
            // Future position, so later batch rows dedup against this one.
            if let Some(index) = self.index.as_mut() {
                index.insert(base + accepted.len() as u64, &row);
            }
            accepted.push(row);
        }
        if accepted.is_empty() {
            return Ok(0);
        }

        let range = self.data_range(base, accepted.len() as u64);
        self.session.write_range(&range, &accepted)?;

        let new_count = if append {
            self.schema.row_count() + accepted.len() as u64
        } else {
            accepted.len() as u64
        };
        self.write_row_count(new_count)?;
        self.schema.set_row_count(new_count);
        if self.schema.is_constrained() && !append {
            self.rebuild_index(&accepted)?;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            table = %self.schema.name(),
            written = accepted.len(),
            row_count = new_count,
            "upserted rows"
        );
        Ok(accepted.len())
    }

    /// Remove every row matching `predicate`, compacting survivors up to
    /// the data offset and clearing the range they vacated. Returns the
    /// original zero-based positions of the removed rows; an empty result
    /// means nothing matched and nothing was written.
    pub fn delete(&mut self, predicate: impl Fn(&Row) -> bool) -> Result<Vec<u64>, StoreError> {
        self.sync()?;
        let removed = self.delete_inner(&predicate);
        self.leave_synced();
        removed
    }

    fn delete_inner(&mut self, predicate: &dyn Fn(&Row) -> bool) -> Result<Vec<u64>, StoreError> {
        let rows = self.read_rows(-1)?;
        let mut kept: Vec<Row> = Vec::with_capacity(rows.len());
        let mut removed: Vec<u64> = Vec::new();
        for (pos, row) in rows.into_iter().enumerate() {
            if predicate(&row) {
                removed.push(pos as u64);
            } else {
                kept.push(row);
            }
        }
        if removed.is_empty() {
            return Ok(removed);
        }

        if !kept.is_empty() {
            let range = self.data_range(0, kept.len() as u64);
            self.session.write_range(&range, &kept)?;
        }
        // The backend does not auto-shrink; clear the rows the compaction
        // vacated or stale data lingers past the new count.
        let tail = self.data_range(kept.len() as u64, removed.len() as u64);
        self.session.clear_range(&tail)?;

        let new_count = kept.len() as u64;
        self.write_row_count(new_count)?;
        self.schema.set_row_count(new_count);
        if self.schema.is_constrained() {
            self.rebuild_index(&kept)?;
        } else {
            self.index = None;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(
            table = %self.schema.name(),
            removed = removed.len(),
            row_count = new_count,
            "deleted rows"
        );
        Ok(removed)
    }

    /// Append or overwrite typed records; sugar over [`Table::upsert_if`]
    /// with no conditions.
    pub fn insert_records<R: Record>(
        &mut self,
        records: impl IntoIterator<Item = R>,
        append: bool,
    ) -> Result<usize, StoreError> {
        let rows: Vec<Row> = records.into_iter().map(Record::into_row).collect();
        self.upsert_if(rows, append, &[])
    }

    /// The whole sheet as stored, header rows included.
    pub fn export(&mut self) -> Result<Matrix, StoreError> {
        self.sync()?;
        let grid = self.session.sheet_data(&self.sheet);
        self.leave_synced();
        grid
    }

    /// Delete the backing sheet. Consumes the handle; any other handle to
    /// the same table is stale afterward.
    pub fn drop(mut self) -> Result<(), StoreError> {
        self.sync()?;
        self.session.delete_sheet(&self.sheet)
    }

    fn read_rows(&mut self, limit: i64) -> Result<Vec<Row>, StoreError> {
        let total = self.schema.row_count();
        let take = if limit < 0 {
            total
        } else {
            total.min(limit as u64)
        };
        if take == 0 {
            return Ok(Vec::new());
        }
        let range = self.data_range(0, take);
        self.session.read_range(&range)
    }

    fn data_range(&self, from_row: u64, rows: u64) -> RangeAddress {
        let start = DATA_START_ROW + from_row as u32;
        RangeAddress::new(
            &self.sheet.title,
            start,
            DATA_START_COL,
            start + rows as u32,
            DATA_START_COL + self.schema.column_count() as u32,
        )
    }

    fn write_row_count(&mut self, count: u64) -> Result<(), StoreError> {
        let cell = RangeAddress::cell(&self.sheet.title, 2, 0);
        let values = vec![vec![CellValue::Text(count.to_string())]];
        self.session.write_range(&cell, &values)
    }

    fn rebuild_index(&mut self, rows: &[Row]) -> Result<(), StoreError> {
        self.index = match self.schema.key_positions()? {
            Some(positions) => Some(UniqueIndex::build(positions, rows)),
            None => None,
        };
        Ok(())
    }
}

/// Decode the three header rows of `sheet` into a schema. Reads the counts
/// row first to learn the width, then the name and tag rows at exactly
/// that width.
pub(crate) fn read_schema<B: GridBackend>(
    session: &GridSession<B>,
    sheet: &SheetRef,
) -> Result<TableSchema, StoreError> {
    let counts_probe = RangeAddress::new(&sheet.title, 2, 0, 3, 3);
    let counts = session
        .read_range(&counts_probe)?
        .into_iter()
        .next()
        .unwrap_or_default();
    let width = TableSchema::peek_column_count(&sheet.title, &counts)?;

    let names_and_tags = RangeAddress::new(&sheet.title, 0, 0, 2, width as u32);
    let mut header = session.read_range(&names_and_tags)?;
    let tags = header.pop().unwrap_or_default();
    let names = header.pop().unwrap_or_default();
    TableSchema::from_header_rows(&sheet.title, &names, &tags, &counts)
}

/// AND of every predicate across all groups, short-circuiting on the first
/// failure. A predicate naming a position the row does not have fails the
/// row.
pub(crate) fn matches_all(row: &Row, groups: &[ConditionGroup<'_>]) -> bool {
    for group in groups {
        for &(pos, predicate) in group.iter() {
            match row.get(pos) {
                Some(value) if predicate(value) => {}
                _ => return false,
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> Row {
        vec![
            CellValue::Text("a@x.io".into()),
            CellValue::Int(30),
            CellValue::Bool(true),
        ]
    }

    #[test]
    fn conditions_and_across_groups() {
        let text_only = |v: &CellValue| matches!(v, CellValue::Text(_));
        let adult = |v: &CellValue| matches!(v, CellValue::Int(n) if *n >= 18);
        let first: &[(usize, ColumnPredicate)] = &[(0, &text_only)];
        let second: &[(usize, ColumnPredicate)] = &[(1, &adult)];

        assert!(matches_all(&row(), &[first]));
        assert!(matches_all(&row(), &[first, second]));

        let minor = |v: &CellValue| matches!(v, CellValue::Int(n) if *n >= 99);
        let failing: &[(usize, ColumnPredicate)] = &[(1, &minor)];
        assert!(!matches_all(&row(), &[first, failing]));
    }

    #[test]
    fn conditions_on_missing_positions_fail_the_row() {
        let any = |_: &CellValue| true;
        let out_of_range: &[(usize, ColumnPredicate)] = &[(9, &any)];
        assert!(!matches_all(&row(), &[out_of_range]));
    }

    #[test]
    fn no_conditions_match_everything() {
        assert!(matches_all(&row(), &[]));
        let empty: &[(usize, ColumnPredicate)] = &[];
        assert!(matches_all(&row(), &[empty]));
    }
}
