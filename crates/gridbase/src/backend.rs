//! The engine-facing boundary to the external grid service.

use gridbase_common::{CellValue, RangeAddress};

use crate::error::BackendError;

/// One data row, positionally aligned to a table's columns.
pub type Row = Vec<CellValue>;

/// A rectangular block of cells; the outer `Vec` holds rows.
pub type Matrix = Vec<Row>;

/// Identity of one sheet inside a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetRef {
    pub id: i64,
    pub title: String,
}

/// Access the row store requires of a grid service.
///
/// Implementations report failures as [`BackendError`]; the engine never
/// retries a rejected call, it only paces calls through the quota throttle.
/// All range addresses arrive in the service's A1 form via
/// [`RangeAddress`].
pub trait GridBackend: Send {
    fn list_sheets(&mut self, container: &str) -> Result<Vec<SheetRef>, BackendError>;

    /// Full contents of one sheet as its tight bounding rectangle; blank
    /// interior cells come back as [`CellValue::Empty`].
    fn sheet_data(&mut self, container: &str, sheet: &SheetRef) -> Result<Matrix, BackendError>;

    fn create_sheet(&mut self, container: &str, title: &str) -> Result<SheetRef, BackendError>;

    fn delete_sheet(&mut self, container: &str, sheet: &SheetRef) -> Result<(), BackendError>;

    /// Read exactly the requested rectangle; blank cells come back as
    /// [`CellValue::Empty`].
    fn read_range(&mut self, container: &str, range: &RangeAddress)
    -> Result<Matrix, BackendError>;

    /// Write a rectangle. `values` must match the range dimensions; writing
    /// [`CellValue::Empty`] blanks the cell.
    fn write_range(
        &mut self,
        container: &str,
        range: &RangeAddress,
        values: &Matrix,
    ) -> Result<(), BackendError>;

    fn clear_range(&mut self, container: &str, range: &RangeAddress)
    -> Result<(), BackendError>;
}
