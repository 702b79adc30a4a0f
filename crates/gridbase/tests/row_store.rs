use gridbase::{
    BackendError, CellValue, Clock, ColumnKind, ColumnPredicate, Constraint, Database, Field,
    GridBackend, ManualClock, Matrix, MemoryGrid, QuotaThrottle, RangeAddress, Record, Row,
    SchemaBuilder, SheetRef, StoreError,
};

struct Signup {
    active: bool,
    age: i32,
    email: &'static str,
}

impl Record for Signup {
    fn table_name() -> &'static str {
        "Signups"
    }

    fn fields() -> Vec<Field> {
        vec![
            Field::new("Active", ColumnKind::Bool),
            Field::new("Age", ColumnKind::Int32),
            Field::new("Email", ColumnKind::Text),
        ]
    }

    fn into_row(self) -> Row {
        vec![self.active.into(), self.age.into(), self.email.into()]
    }
}

fn signup(active: bool, age: i32, email: &str) -> Row {
    vec![active.into(), age.into(), email.into()]
}

fn db() -> Database<MemoryGrid> {
    Database::open(MemoryGrid::new().with_container("demo"), "demo")
}

#[test]
fn select_returns_rows_in_insertion_order() {
    let db = db();
    let mut table = db.create_table_for::<Signup>(None).unwrap();
    assert_eq!(table.row_count(), 0);

    let rows = vec![
        signup(true, 31, "ada@x.io"),
        signup(false, 45, "bob@x.io"),
        signup(true, 27, "cyd@x.io"),
    ];
    let written = table.upsert_if(rows.clone(), true, &[]).unwrap();
    assert_eq!(written, 3);
    assert_eq!(table.row_count(), 3);
    assert_eq!(table.select(-1).unwrap(), rows);
}

#[test]
fn constrained_tables_skip_duplicate_keys() {
    let db = db();
    let mut table = db
        .create_table_for::<Signup>(Some(Constraint::unique(["Email"])))
        .unwrap();

    let written = table
        .upsert_if(
            vec![
                signup(true, 31, "ada@x.io"),
                signup(false, 45, "ada@x.io"), // same key within the batch
                signup(true, 27, "cyd@x.io"),
            ],
            true,
            &[],
        )
        .unwrap();
    assert_eq!(written, 2);

    // A later batch repeating a stored key is skipped too.
    let written = table
        .upsert_if(vec![signup(false, 99, "cyd@x.io")], true, &[])
        .unwrap();
    assert_eq!(written, 0);
    assert_eq!(table.row_count(), 2);

    let emails: Vec<_> = table
        .select(-1)
        .unwrap()
        .into_iter()
        .map(|row| row[2].clone())
        .collect();
    assert_eq!(
        emails,
        vec![
            CellValue::Text("ada@x.io".into()),
            CellValue::Text("cyd@x.io".into())
        ]
    );
}

#[test]
fn empty_upserts_are_refused() {
    let db = db();
    let mut table = db.create_table_for::<Signup>(None).unwrap();
    table
        .upsert_if(vec![signup(true, 1, "a@x.io")], true, &[])
        .unwrap();

    let err = table.upsert_if(Vec::new(), true, &[]).unwrap_err();
    assert!(matches!(err, StoreError::EmptyBatch));
    assert_eq!(table.select(-1).unwrap().len(), 1);
}

#[test]
fn delete_compacts_and_clears_the_tail() {
    let db = db();
    let mut table = db.create_table_for::<Signup>(None).unwrap();
    table
        .upsert_if(
            vec![
                signup(true, 31, "ada@x.io"),
                signup(false, 45, "bob@x.io"),
                signup(true, 27, "cyd@x.io"),
                signup(false, 66, "dee@x.io"),
            ],
            true,
            &[],
        )
        .unwrap();

    let removed = table
        .delete(|row| matches!(&row[0], CellValue::Bool(false)))
        .unwrap();
    assert_eq!(removed, vec![1, 3]);
    assert_eq!(table.row_count(), 2);

    let rows = table.select(-1).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0][2], CellValue::Text("ada@x.io".into()));
    assert_eq!(rows[1][2], CellValue::Text("cyd@x.io".into()));

    // The vacated rows really are cleared, not merely beyond the count.
    let grid = table.export().unwrap();
    assert_eq!(grid.len(), 5, "three header rows plus two survivors");
}

#[test]
fn delete_with_no_matches_writes_nothing() {
    let db = db();
    let mut table = db.create_table_for::<Signup>(None).unwrap();
    table
        .upsert_if(vec![signup(true, 1, "a@x.io")], true, &[])
        .unwrap();

    let removed = table
        .delete(|row| matches!(&row[1], CellValue::Int(n) if *n > 100))
        .unwrap();
    assert!(removed.is_empty());
    assert_eq!(table.row_count(), 1);
}

#[test]
fn deleting_every_row_empties_the_table() {
    let db = db();
    let mut table = db.create_table_for::<Signup>(None).unwrap();
    table
        .upsert_if(
            vec![
                signup(true, 31, "ada@x.io"),
                signup(false, 45, "bob@x.io"),
                signup(true, 27, "cyd@x.io"),
            ],
            true,
            &[],
        )
        .unwrap();

    let removed = table.delete(|_| true).unwrap();
    assert_eq!(removed, vec![0, 1, 2]);
    assert_eq!(table.row_count(), 0);
    assert!(table.select(-1).unwrap().is_empty());

    // Nothing lingers below the header once the whole body is cleared.
    let grid = table.export().unwrap();
    assert_eq!(grid.len(), 3, "only the header rows remain");
}

#[test]
fn end_to_end_unique_on_string_column() {
    let db = db();
    let schema = SchemaBuilder::new("Accounts")
        .field("Verified", ColumnKind::Bool)
        .field("Logins", ColumnKind::Int32)
        .field("Handle", ColumnKind::Text)
        .build();
    let mut table = db
        .create_table(schema, Some(Constraint::unique(["Handle"])))
        .unwrap();

    let written = table
        .upsert_if(
            vec![
                vec![true.into(), 4.into(), "iris".into()],
                vec![true.into(), 9.into(), "juno".into()],
            ],
            true,
            &[],
        )
        .unwrap();
    assert_eq!(written, 2);

    // Repeats an existing handle; silently dropped.
    let written = table
        .upsert_if(vec![vec![false.into(), 1.into(), "iris".into()]], true, &[])
        .unwrap();
    assert_eq!(written, 0);
    assert_eq!(table.row_count(), 2);
}

#[test]
fn schema_mismatch_aborts_the_whole_batch() {
    let db = db();
    let mut table = db.create_table_for::<Signup>(None).unwrap();
    let err = table
        .upsert_if(
            vec![
                signup(true, 31, "ada@x.io"),
                vec![true.into(), "not a number".into(), "bob@x.io".into()],
            ],
            true,
            &[],
        )
        .unwrap_err();
    match err {
        StoreError::SchemaMismatch { row, reason } => {
            assert_eq!(row, 1);
            assert!(reason.contains("'Age'"), "got: {reason}");
        }
        other => panic!("expected SchemaMismatch, got {other:?}"),
    }
    assert_eq!(table.row_count(), 0);
    assert!(table.select(-1).unwrap().is_empty());
}

#[test]
fn conditions_filter_rows_without_failing_the_batch() {
    let db = db();
    let mut table = db.create_table_for::<Signup>(None).unwrap();

    let adult = |v: &CellValue| matches!(v, CellValue::Int(n) if *n >= 18);
    let conditions: &[(usize, ColumnPredicate)] = &[(1, &adult)];
    let written = table
        .upsert_if(
            vec![signup(true, 31, "ada@x.io"), signup(true, 12, "kid@x.io")],
            true,
            &[conditions],
        )
        .unwrap();
    assert_eq!(written, 1);

    let rows = table.select(-1).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][2], CellValue::Text("ada@x.io".into()));
}

#[test]
fn overwrite_replaces_from_the_data_offset() {
    let db = db();
    let mut table = db.create_table_for::<Signup>(None).unwrap();
    table
        .upsert_if(
            vec![
                signup(true, 1, "a@x.io"),
                signup(true, 2, "b@x.io"),
                signup(true, 3, "c@x.io"),
            ],
            true,
            &[],
        )
        .unwrap();

    let written = table
        .upsert_if(vec![signup(false, 9, "z@x.io")], false, &[])
        .unwrap();
    assert_eq!(written, 1);
    assert_eq!(table.row_count(), 1);
    assert_eq!(table.select(-1).unwrap(), vec![signup(false, 9, "z@x.io")]);
}

#[test]
fn select_limits_and_clamps() {
    let db = db();
    let mut table = db.create_table_for::<Signup>(None).unwrap();
    table
        .upsert_if(
            vec![signup(true, 1, "a@x.io"), signup(true, 2, "b@x.io")],
            true,
            &[],
        )
        .unwrap();

    assert!(table.select(0).unwrap().is_empty());
    assert_eq!(table.select(1).unwrap().len(), 1);
    assert_eq!(table.select(10).unwrap().len(), 2);
}

#[test]
fn select_where_filters_row_wise() {
    let db = db();
    let mut table = db.create_table_for::<Signup>(None).unwrap();
    table
        .upsert_if(
            vec![signup(true, 31, "ada@x.io"), signup(false, 45, "bob@x.io")],
            true,
            &[],
        )
        .unwrap();

    let active = |v: &CellValue| matches!(v, CellValue::Bool(true));
    let rows = table.select_where(&[(0, &active)]).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][2], CellValue::Text("ada@x.io".into()));
}

#[test]
fn create_table_guards_names() {
    let db = db();
    db.create_table_for::<Signup>(None).unwrap();
    let err = db.create_table_for::<Signup>(None).unwrap_err();
    assert!(matches!(err, StoreError::DuplicateTable(name) if name == "Signups"));

    let schema = SchemaBuilder::new("Sheet7")
        .field("K", ColumnKind::Text)
        .build();
    let err = db.create_table(schema, None).unwrap_err();
    assert!(matches!(err, StoreError::ReservedName(_)));
}

#[test]
fn constraints_must_name_real_columns() {
    let db = db();
    let err = db
        .create_table_for::<Signup>(Some(Constraint::unique(["Ghost"])))
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownColumn(name) if name == "Ghost"));
    // Refused before anything was created.
    assert!(db.find_table("Signups").unwrap().is_none());
}

#[test]
fn find_and_list_tables() {
    let db = db();
    db.create_table_for::<Signup>(None).unwrap();
    let schema = SchemaBuilder::new("Pets")
        .field("Name", ColumnKind::Text)
        .build();
    db.create_table(schema.clone(), None).unwrap();

    let mut found = db.find_table("Pets").unwrap().unwrap();
    assert_eq!(found.name(), "Pets");
    assert_eq!(found.row_count(), 0);
    found.upsert_if(vec![vec!["Rex".into()]], true, &[]).unwrap();

    assert!(db.find_table("Missing").unwrap().is_none());

    let names: Vec<_> = db
        .list_tables()
        .unwrap()
        .iter()
        .map(|t| t.name().to_string())
        .collect();
    assert_eq!(names, vec!["Signups", "Pets"]);

    // Existing table: the handle reflects its stored count.
    let again = db.find_or_create_table(schema, None).unwrap();
    assert_eq!(again.row_count(), 1);

    // Missing table: created on the spot.
    let fresh = db
        .find_or_create_table(
            SchemaBuilder::new("Stock").field("Sku", ColumnKind::Text).build(),
            None,
        )
        .unwrap();
    assert_eq!(fresh.row_count(), 0);
    assert!(db.find_table("Stock").unwrap().is_some());
}

#[test]
fn sheets_without_readable_headers_are_skipped() {
    let mut backend = MemoryGrid::new().with_container("demo");
    backend.create_sheet("demo", "Junk").unwrap();
    let note = RangeAddress::cell("Junk", 0, 0);
    let values = vec![vec![CellValue::Text("not a table".into())]];
    backend.write_range("demo", &note, &values).unwrap();

    let db = Database::open(backend, "demo");
    assert!(db.find_table("Junk").unwrap().is_none());
    assert!(db.list_tables().unwrap().is_empty());

    // A real table beside it is unaffected.
    db.create_table_for::<Signup>(None).unwrap();
    assert_eq!(db.list_tables().unwrap().len(), 1);
}

#[test]
fn sheets_claiming_absurd_row_counts_are_skipped() {
    let mut backend = MemoryGrid::new().with_container("demo");
    backend.create_sheet("demo", "Bloated").unwrap();
    let header = RangeAddress::new("Bloated", 0, 0, 3, 2);
    let values = vec![
        vec![CellValue::Text("K".into()), CellValue::Empty],
        vec![CellValue::Text("string".into()), CellValue::Empty],
        // A row count past the u32 sheet coordinate space.
        vec![CellValue::Text("4294967296".into()), CellValue::Uint(1)],
    ];
    backend.write_range("demo", &header, &values).unwrap();

    let db = Database::open(backend, "demo");
    assert!(db.find_table("Bloated").unwrap().is_none());
    assert!(db.list_tables().unwrap().is_empty());
}

#[test]
fn drop_table_and_handle_drop() {
    let db = db();
    let table = db.create_table_for::<Signup>(None).unwrap();
    table.drop().unwrap();
    assert!(db.find_table("Signups").unwrap().is_none());

    db.create_table_for::<Signup>(None).unwrap();
    assert!(db.drop_table("Signups").unwrap());
    assert!(!db.drop_table("Signups").unwrap());
}

#[test]
fn typed_records_insert_through_the_same_path() {
    let db = db();
    let mut table = db
        .create_table_for::<Signup>(Some(Constraint::unique(["Email"])))
        .unwrap();

    let written = table
        .insert_records(
            vec![
                Signup {
                    active: true,
                    age: 31,
                    email: "ada@x.io",
                },
                Signup {
                    active: false,
                    age: 45,
                    email: "ada@x.io",
                },
            ],
            true,
        )
        .unwrap();
    assert_eq!(written, 1);

    let grid = table.export().unwrap();
    assert_eq!(grid[0][0], CellValue::Text("Active".into()));
    assert_eq!(grid[1][1], CellValue::Text("int32".into()));
    assert_eq!(grid[2][0], CellValue::Text("1".into()));
    assert_eq!(grid[3][0], CellValue::Bool(true));
}

#[test]
fn stale_handles_resync_before_each_operation() {
    let db = db();
    let mut writer = db.create_table_for::<Signup>(None).unwrap();
    let mut reader = db.find_table("Signups").unwrap().unwrap();
    assert_eq!(reader.row_count(), 0);
    assert!(reader.select(-1).unwrap().is_empty());

    writer
        .upsert_if(vec![signup(true, 1, "a@x.io")], true, &[])
        .unwrap();

    // The reader left the synced state after its first select, so this
    // one re-reads the header and sees the writer's row.
    assert_eq!(reader.select(-1).unwrap().len(), 1);
}

#[test]
fn wide_tables_use_multi_letter_columns() {
    let db = db();
    let mut builder = SchemaBuilder::new("Wide");
    for i in 0..30 {
        builder = builder.field(format!("C{i}"), ColumnKind::Int64);
    }
    let mut table = db.create_table(builder.build(), None).unwrap();

    let row: Row = (0..30).map(CellValue::Int).collect();
    table.upsert_if(vec![row.clone()], true, &[]).unwrap();
    assert_eq!(table.select(-1).unwrap(), vec![row]);
}

#[test]
fn backend_rejection_surfaces_without_retry() {
    let mut backend = MemoryGrid::new().with_container("demo");
    backend.reject_next(429);
    let db = Database::open(backend, "demo");

    let err = db.create_table_for::<Signup>(None).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Backend(BackendError::Rejected { status: 429 })
    ));
    // One-shot failure: the next attempt goes through untouched.
    db.create_table_for::<Signup>(None).unwrap();
}

/// Fails the nth backend call, then recovers.
struct FlakyGrid {
    inner: MemoryGrid,
    calls: u32,
    fail_at: u32,
}

impl FlakyGrid {
    fn failing_at(inner: MemoryGrid, fail_at: u32) -> Self {
        Self {
            inner,
            calls: 0,
            fail_at,
        }
    }

    fn tick(&mut self) -> Result<(), BackendError> {
        self.calls += 1;
        if self.calls == self.fail_at {
            return Err(BackendError::Rejected { status: 500 });
        }
        Ok(())
    }
}

impl GridBackend for FlakyGrid {
    fn list_sheets(&mut self, container: &str) -> Result<Vec<SheetRef>, BackendError> {
        self.tick()?;
        self.inner.list_sheets(container)
    }

    fn sheet_data(&mut self, container: &str, sheet: &SheetRef) -> Result<Matrix, BackendError> {
        self.tick()?;
        self.inner.sheet_data(container, sheet)
    }

    fn create_sheet(&mut self, container: &str, title: &str) -> Result<SheetRef, BackendError> {
        self.tick()?;
        self.inner.create_sheet(container, title)
    }

    fn delete_sheet(&mut self, container: &str, sheet: &SheetRef) -> Result<(), BackendError> {
        self.tick()?;
        self.inner.delete_sheet(container, sheet)
    }

    fn read_range(
        &mut self,
        container: &str,
        range: &RangeAddress,
    ) -> Result<Matrix, BackendError> {
        self.tick()?;
        self.inner.read_range(container, range)
    }

    fn write_range(
        &mut self,
        container: &str,
        range: &RangeAddress,
        values: &Matrix,
    ) -> Result<(), BackendError> {
        self.tick()?;
        self.inner.write_range(container, range, values)
    }

    fn clear_range(&mut self, container: &str, range: &RangeAddress) -> Result<(), BackendError> {
        self.tick()?;
        self.inner.clear_range(container, range)
    }
}

#[test]
fn failed_count_write_leaves_the_table_at_the_old_count() {
    // Calls: list, create sheet, header write, data write; the fifth is
    // the row-count write, and it fails.
    let backend = FlakyGrid::failing_at(MemoryGrid::new().with_container("demo"), 5);
    let db = Database::open(backend, "demo");
    let mut table = db.create_table_for::<Signup>(None).unwrap();

    let err = table
        .upsert_if(vec![signup(true, 1, "a@x.io")], true, &[])
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Backend(BackendError::Rejected { status: 500 })
    ));

    // The data block landed, but the row-count cell is the sequencer and
    // still reads zero.
    let mut reread = db.find_table("Signups").unwrap().unwrap();
    assert_eq!(reread.row_count(), 0);
    assert!(reread.select(-1).unwrap().is_empty());
}

#[test]
fn quota_blocking_rides_the_simulated_clock() {
    let clock = ManualClock::at(50_000);
    let throttle = QuotaThrottle::with_clock(Box::new(clock.clone()));
    let db = Database::open(MemoryGrid::new().with_container("demo"), "demo")
        .with_throttle(throttle);

    let mut table = db.create_table_for::<Signup>(None).unwrap();
    for i in 0..30 {
        table
            .upsert_if(vec![signup(true, i, &format!("u{i}@x.io"))], true, &[])
            .unwrap();
    }
    // Well over the 90-call budget inside one simulated window; the
    // blocking reservation sleeps the clock past the boundary.
    assert!(clock.epoch_secs() >= 50_100);
}

#[test]
fn non_blocking_quota_never_sleeps() {
    let clock = ManualClock::at(50_000);
    let throttle = QuotaThrottle::with_clock(Box::new(clock.clone()));
    let db = Database::open(MemoryGrid::new().with_container("demo"), "demo")
        .with_throttle(throttle)
        .quota_blocking(false);

    let mut table = db.create_table_for::<Signup>(None).unwrap();
    for i in 0..30 {
        table
            .upsert_if(vec![signup(true, i, &format!("u{i}@x.io"))], true, &[])
            .unwrap();
    }
    assert_eq!(clock.epoch_secs(), 50_000, "optimistic mode never sleeps");
}
