//! Table schemas: derivation from record types, row validation, and the
//! three-row header codec.
//!
//! Header layout on every managed sheet, fixed for compatibility with
//! tables written by earlier deployments:
//!
//! - row 0: column names
//! - row 1: column kind tags
//! - row 2: `[row count (stringified), column count (numeric), constraint?]`
//!
//! Data rows start at row 3, column 0.

use std::borrow::Cow;

use gridbase_common::{CellValue, ColumnKind};

use crate::backend::{Matrix, Row};
use crate::constraint::Constraint;
use crate::error::StoreError;

/// Number of header rows on a managed sheet.
pub const HEADER_ROWS: u32 = 3;

/// First data row.
pub const DATA_START_ROW: u32 = 3;

/// First data column.
pub const DATA_START_COL: u32 = 0;

/// One column of a record: name plus declared kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: Cow<'static, str>,
    pub kind: ColumnKind,
}

impl Field {
    pub fn new(name: impl Into<Cow<'static, str>>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Static description of a record type stored one per data row.
///
/// `fields()` defines the column layout in declaration order; `into_row`
/// must produce values matching it positionally.
pub trait Record {
    fn table_name() -> &'static str;
    fn fields() -> Vec<Field>;
    fn into_row(self) -> Row;
}

/// In-memory description of one table: column layout, authoritative row
/// count, and optional uniqueness constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct TableSchema {
    pub(crate) name: String,
    pub(crate) columns: Vec<String>,
    pub(crate) kinds: Vec<ColumnKind>,
    pub(crate) row_count: u64,
    pub(crate) constraint: Option<Constraint>,
}

impl TableSchema {
    /// Derive the schema of `R` with a zero row count and no constraint.
    pub fn of<R: Record>() -> Self {
        let fields = R::fields();
        let mut columns = Vec::with_capacity(fields.len());
        let mut kinds = Vec::with_capacity(fields.len());
        for field in fields {
            columns.push(field.name.into_owned());
            kinds.push(field.kind);
        }
        Self {
            name: R::table_name().to_string(),
            columns,
            kinds,
            row_count: 0,
            constraint: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn kinds(&self) -> &[ColumnKind] {
        &self.kinds
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Data rows currently stored, per the last header read.
    pub fn row_count(&self) -> u64 {
        self.row_count
    }

    pub fn constraint(&self) -> Option<&Constraint> {
        self.constraint.as_ref()
    }

    pub(crate) fn set_row_count(&mut self, count: u64) {
        self.row_count = count;
    }

    pub(crate) fn set_constraint(&mut self, constraint: Option<Constraint>) {
        self.constraint = constraint;
    }

    /// Whether a non-inert uniqueness constraint is configured.
    pub fn is_constrained(&self) -> bool {
        self.constraint.as_ref().is_some_and(|c| !c.is_inert())
    }

    /// Ascending unique-column positions, or `None` without a constraint.
    pub fn key_positions(&self) -> Result<Option<Vec<usize>>, StoreError> {
        match &self.constraint {
            Some(constraint) if !constraint.is_inert() => {
                Ok(Some(constraint.key_positions(&self.columns)?))
            }
            _ => Ok(None),
        }
    }

    /// Check a candidate data row's shape; the reason string feeds
    /// [`StoreError::SchemaMismatch`].
    pub fn check_row(&self, row: &Row) -> Result<(), String> {
        if row.len() != self.columns.len() {
            return Err(format!(
                "expected {} values, got {}",
                self.columns.len(),
                row.len()
            ));
        }
        for (pos, (value, kind)) in row.iter().zip(&self.kinds).enumerate() {
            if !kind.admits(value) {
                return Err(format!(
                    "column '{}' expects {}, got {}",
                    self.columns[pos],
                    kind,
                    value.family()
                ));
            }
        }
        Ok(())
    }

    /// Render the three header rows, padded with `Empty` to a common width.
    pub fn header_rows(&self) -> Result<Matrix, StoreError> {
        let mut counts: Row = vec![
            CellValue::Text(self.row_count.to_string()),
            CellValue::Uint(self.columns.len() as u64),
        ];
        if let Some(constraint) = &self.constraint {
            counts.push(CellValue::Text(constraint.encode()?));
        }
        let mut names: Row = self
            .columns
            .iter()
            .map(|c| CellValue::Text(c.clone()))
            .collect();
        let mut tags: Row = self
            .kinds
            .iter()
            .map(|k| CellValue::Text(k.tag().to_string()))
            .collect();
        let width = names.len().max(counts.len());
        for row in [&mut names, &mut tags, &mut counts] {
            row.resize(width, CellValue::Empty);
        }
        Ok(vec![names, tags, counts])
    }

    /// Column count from a counts row alone, so callers can size the
    /// name/tag read before decoding the rest.
    pub(crate) fn peek_column_count(sheet: &str, counts: &[CellValue]) -> Result<usize, StoreError> {
        let corrupt = |reason: String| StoreError::CorruptHeader {
            sheet: sheet.to_string(),
            reason,
        };
        let count = parse_count(counts.get(1), "column count").map_err(corrupt)?;
        if count == 0 {
            return Err(StoreError::CorruptHeader {
                sheet: sheet.to_string(),
                reason: "column count is zero".to_string(),
            });
        }
        Ok(count as usize)
    }

    /// Decode a header read from `sheet`. Malformed headers yield
    /// [`StoreError::CorruptHeader`], never a panic.
    pub fn from_header_rows(
        sheet: &str,
        names: &[CellValue],
        tags: &[CellValue],
        counts: &[CellValue],
    ) -> Result<Self, StoreError> {
        let corrupt = |reason: String| StoreError::CorruptHeader {
            sheet: sheet.to_string(),
            reason,
        };

        let row_count = parse_count(counts.first(), "row count").map_err(corrupt)?;
        let column_count = Self::peek_column_count(sheet, counts)?;

        let mut columns = Vec::with_capacity(column_count);
        for i in 0..column_count {
            match names.get(i) {
                Some(CellValue::Text(s)) if !s.is_empty() => columns.push(s.clone()),
                _ => return Err(corrupt(format!("missing column name at position {i}"))),
            }
        }

        let mut kinds = Vec::with_capacity(column_count);
        for i in 0..column_count {
            let tag = match tags.get(i) {
                Some(CellValue::Text(s)) => s.as_str(),
                _ => return Err(corrupt(format!("missing column type tag at position {i}"))),
            };
            match ColumnKind::from_tag(tag) {
                Some(kind) => kinds.push(kind),
                None => return Err(corrupt(format!("unknown column type tag '{tag}'"))),
            }
        }

        let constraint = match counts.get(2) {
            None | Some(CellValue::Empty) => None,
            Some(CellValue::Text(blob)) if blob.trim().is_empty() => None,
            Some(CellValue::Text(blob)) => match Constraint::decode(blob) {
                Ok(constraint) => Some(constraint),
                Err(e) => return Err(corrupt(format!("constraint blob: {e}"))),
            },
            Some(_) => return Err(corrupt("constraint cell is not text".to_string())),
        };

        let schema = Self {
            name: sheet.to_string(),
            columns,
            kinds,
            row_count,
            constraint,
        };
        if let Some(constraint) = &schema.constraint {
            if !constraint.is_inert() {
                constraint
                    .key_positions(&schema.columns)
                    .map_err(|e| corrupt(e.to_string()))?;
            }
        }
        Ok(schema)
    }
}

/// Declarative column-list alternative to implementing [`Record`].
#[derive(Debug)]
pub struct SchemaBuilder {
    name: String,
    columns: Vec<String>,
    kinds: Vec<ColumnKind>,
}

impl SchemaBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            kinds: Vec::new(),
        }
    }

    pub fn field(mut self, name: impl Into<String>, kind: ColumnKind) -> Self {
        self.columns.push(name.into());
        self.kinds.push(kind);
        self
    }

    /// Add a field by its header tag; unknown tags are refused.
    pub fn field_tagged(self, name: impl Into<String>, tag: &str) -> Result<Self, StoreError> {
        match ColumnKind::from_tag(tag) {
            Some(kind) => Ok(self.field(name, kind)),
            None => Err(StoreError::UnsupportedKind(tag.to_string())),
        }
    }

    pub fn build(self) -> TableSchema {
        TableSchema {
            name: self.name,
            columns: self.columns,
            kinds: self.kinds,
            row_count: 0,
            constraint: None,
        }
    }
}

fn parse_count(cell: Option<&CellValue>, what: &str) -> Result<u64, String> {
    let count = match cell {
        None | Some(CellValue::Empty) => return Err(format!("missing {what}")),
        Some(CellValue::Text(s)) => s
            .trim()
            .parse::<u64>()
            .map_err(|_| format!("{what} '{s}' is not a non-negative integer"))?,
        Some(CellValue::Uint(u)) => *u,
        Some(CellValue::Int(i)) if *i >= 0 => *i as u64,
        Some(CellValue::Float(n)) if *n >= 0.0 && n.fract() == 0.0 => *n as u64,
        Some(other) => return Err(format!("{what} has unexpected form '{other}'")),
    };
    // Sheet coordinates are u32; a count past that wraps in range math.
    if count > u64::from(u32::MAX - HEADER_ROWS) {
        return Err(format!("{what} {count} exceeds the sheet address space"));
    }
    Ok(count)
}
