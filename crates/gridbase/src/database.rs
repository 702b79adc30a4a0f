//! Container-level operations: opening a store, creating, finding, and
//! dropping tables.

use std::sync::Arc;

use gridbase_common::RangeAddress;
use parking_lot::Mutex;

use crate::backend::{GridBackend, Matrix, SheetRef};
use crate::constraint::Constraint;
use crate::error::StoreError;
use crate::schema::{HEADER_ROWS, Record, TableSchema};
use crate::table::{Table, read_schema};
use crate::throttle::QuotaThrottle;

/// Shared handle to one backend/throttle pair, scoped to a container.
/// Every backend call reserves one quota unit first.
pub(crate) struct GridSession<B: GridBackend> {
    backend: Arc<Mutex<B>>,
    throttle: Arc<Mutex<QuotaThrottle>>,
    container: String,
    blocking: bool,
}

// Manual impl: B itself is not Clone, only the handles are.
impl<B: GridBackend> Clone for GridSession<B> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            throttle: Arc::clone(&self.throttle),
            container: self.container.clone(),
            blocking: self.blocking,
        }
    }
}

impl<B: GridBackend> GridSession<B> {
    fn reserve(&self) {
        self.throttle.lock().reserve(1, self.blocking);
    }

    pub(crate) fn list_sheets(&self) -> Result<Vec<SheetRef>, StoreError> {
        self.reserve();
        Ok(self.backend.lock().list_sheets(&self.container)?)
    }

    pub(crate) fn sheet_data(&self, sheet: &SheetRef) -> Result<Matrix, StoreError> {
        self.reserve();
        Ok(self.backend.lock().sheet_data(&self.container, sheet)?)
    }

    pub(crate) fn create_sheet(&self, title: &str) -> Result<SheetRef, StoreError> {
        self.reserve();
        Ok(self.backend.lock().create_sheet(&self.container, title)?)
    }

    pub(crate) fn delete_sheet(&self, sheet: &SheetRef) -> Result<(), StoreError> {
        self.reserve();
        Ok(self.backend.lock().delete_sheet(&self.container, sheet)?)
    }

    pub(crate) fn read_range(&self, range: &RangeAddress) -> Result<Matrix, StoreError> {
        self.reserve();
        Ok(self.backend.lock().read_range(&self.container, range)?)
    }

    pub(crate) fn write_range(
        &self,
        range: &RangeAddress,
        values: &Matrix,
    ) -> Result<(), StoreError> {
        self.reserve();
        Ok(self
            .backend
            .lock()
            .write_range(&self.container, range, values)?)
    }

    pub(crate) fn clear_range(&self, range: &RangeAddress) -> Result<(), StoreError> {
        self.reserve();
        Ok(self.backend.lock().clear_range(&self.container, range)?)
    }
}

/// A container of tables on one grid backend.
///
/// Cloning yields another handle to the same backend and quota throttle.
pub struct Database<B: GridBackend> {
    session: GridSession<B>,
}

impl<B: GridBackend> Clone for Database<B> {
    fn clone(&self) -> Self {
        Self {
            session: self.session.clone(),
        }
    }
}

impl<B: GridBackend> Database<B> {
    /// Open `container` on `backend` with a fresh wall-clock throttle in
    /// blocking mode. No backend call happens until the first operation.
    pub fn open(backend: B, container: impl Into<String>) -> Self {
        Self {
            session: GridSession {
                backend: Arc::new(Mutex::new(backend)),
                throttle: Arc::new(Mutex::new(QuotaThrottle::new())),
                container: container.into(),
                blocking: true,
            },
        }
    }

    /// Replace the quota throttle, e.g. to share one across databases or
    /// to drive time from a test clock.
    pub fn with_throttle(mut self, throttle: QuotaThrottle) -> Self {
        self.session.throttle = Arc::new(Mutex::new(throttle));
        self
    }

    /// Choose whether quota exhaustion blocks until the window rolls over
    /// (the default) or proceeds optimistically and lets the backend be
    /// the arbiter.
    pub fn quota_blocking(mut self, blocking: bool) -> Self {
        self.session.blocking = blocking;
        self
    }

    pub fn container(&self) -> &str {
        &self.session.container
    }

    /// Create the sheet for `schema` and write its three header rows with
    /// a zero row count. Any constraint already on `schema` is replaced by
    /// `constraint`. The returned handle is synced, so its first operation
    /// skips the header re-read.
    ///
    /// # Panics
    ///
    /// Panics if `schema` has no columns; that is a programming error, not
    /// an environmental condition.
    pub fn create_table(
        &self,
        mut schema: TableSchema,
        constraint: Option<Constraint>,
    ) -> Result<Table<B>, StoreError> {
        assert!(schema.column_count() > 0, "schema has no columns");
        if is_reserved_title(schema.name()) {
            return Err(StoreError::ReservedName(schema.name().to_string()));
        }
        if let Some(constraint) = &constraint {
            if !constraint.is_inert() {
                constraint.key_positions(schema.columns())?;
            }
        }
        schema.set_constraint(constraint);

        let existing = self.session.list_sheets()?;
        if existing.iter().any(|s| s.title == schema.name()) {
            return Err(StoreError::DuplicateTable(schema.name().to_string()));
        }

        let sheet = self.session.create_sheet(schema.name())?;
        let header = schema.header_rows()?;
        let range = RangeAddress::new(&sheet.title, 0, 0, HEADER_ROWS, header[0].len() as u32);
        self.session.write_range(&range, &header)?;

        #[cfg(feature = "tracing")]
        tracing::debug!(table = %schema.name(), "created table");
        Ok(Table::new(self.session.clone(), sheet, schema, true))
    }

    /// Create a table shaped after record type `R`.
    pub fn create_table_for<R: Record>(
        &self,
        constraint: Option<Constraint>,
    ) -> Result<Table<B>, StoreError> {
        self.create_table(TableSchema::of::<R>(), constraint)
    }

    /// Find the table named `name`, or `None` when no sheet carries a
    /// readable header under that title. Sheets named like the backend's
    /// own defaults are never tables.
    pub fn find_table(&self, name: &str) -> Result<Option<Table<B>>, StoreError> {
        for sheet in self.session.list_sheets()? {
            if sheet.title != name || is_reserved_title(&sheet.title) {
                continue;
            }
            match read_schema(&self.session, &sheet) {
                Ok(schema) => {
                    return Ok(Some(Table::new(self.session.clone(), sheet, schema, true)));
                }
                Err(StoreError::CorruptHeader { .. }) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(sheet = %sheet.title, "skipping sheet with unreadable table header");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    /// Handles for every sheet in the container with a readable header.
    pub fn list_tables(&self) -> Result<Vec<Table<B>>, StoreError> {
        let mut tables = Vec::new();
        for sheet in self.session.list_sheets()? {
            if is_reserved_title(&sheet.title) {
                continue;
            }
            match read_schema(&self.session, &sheet) {
                Ok(schema) => {
                    tables.push(Table::new(self.session.clone(), sheet, schema, true));
                }
                Err(StoreError::CorruptHeader { .. }) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(sheet = %sheet.title, "skipping sheet with unreadable table header");
                    continue;
                }
                Err(e) => return Err(e),
            }
        }
        Ok(tables)
    }

    /// Find `schema`'s table, creating it with `constraint` when absent.
    pub fn find_or_create_table(
        &self,
        schema: TableSchema,
        constraint: Option<Constraint>,
    ) -> Result<Table<B>, StoreError> {
        match self.find_table(schema.name())? {
            Some(table) => Ok(table),
            None => self.create_table(schema, constraint),
        }
    }

    /// Delete the sheet titled `name`, readable header or not. Returns
    /// whether a sheet was deleted.
    pub fn drop_table(&self, name: &str) -> Result<bool, StoreError> {
        for sheet in self.session.list_sheets()? {
            if sheet.title == name && !is_reserved_title(&sheet.title) {
                self.session.delete_sheet(&sheet)?;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Sheet titles following the backend's own default naming ("Sheet1",
/// "Sheet2", ...) are never tables, and table names must avoid them.
pub(crate) fn is_reserved_title(title: &str) -> bool {
    title.starts_with("Sheet")
}
