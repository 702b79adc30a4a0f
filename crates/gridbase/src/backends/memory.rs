//! In-process grid backend with JSON persistence.
//!
//! Serves as the test double for the row store and as a lightweight local
//! store in its own right. Sheets are sparse cell maps; the persisted JSON
//! form stores one record per populated cell.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use gridbase_common::{CellValue, RangeAddress};

use crate::backend::{GridBackend, Matrix, SheetRef};
use crate::error::BackendError;

const BACKEND_NAME: &str = "memory";

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
struct StoreFile {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default)]
    containers: BTreeMap<String, ContainerFile>,
}

fn default_version() -> u32 {
    1
}

#[derive(Serialize, Deserialize, Debug, Default, Clone)]
struct ContainerFile {
    #[serde(default)]
    next_sheet_id: i64,
    #[serde(default)]
    sheets: Vec<SheetFile>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct SheetFile {
    id: i64,
    title: String,
    #[serde(default)]
    cells: Vec<CellRecord>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct CellRecord {
    row: u32,
    col: u32,
    value: CellValue,
}

#[derive(Debug, Default, Clone)]
struct Container {
    next_sheet_id: i64,
    sheets: Vec<Sheet>,
}

#[derive(Debug, Clone)]
struct Sheet {
    id: i64,
    title: String,
    cells: BTreeMap<(u32, u32), CellValue>,
}

/// In-memory [`GridBackend`] holding any number of containers, with JSON
/// persistence at the byte level.
///
/// [`reject_next`](Self::reject_next) arms a one-shot failure so tests can
/// observe how callers handle a rejecting service.
#[derive(Debug, Default, Clone)]
pub struct MemoryGrid {
    containers: BTreeMap<String, Container>,
    fail_next: Option<u16>,
}

impl MemoryGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty container, returning `self` for chaining.
    pub fn with_container(mut self, id: &str) -> Self {
        self.add_container(id);
        self
    }

    pub fn add_container(&mut self, id: &str) {
        self.containers.entry(id.to_string()).or_default();
    }

    /// Fail the next request with `status`, as a rate-limited or otherwise
    /// unhappy service would.
    pub fn reject_next(&mut self, status: u16) {
        self.fail_next = Some(status);
    }

    /// Serialize every container to the JSON store format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, BackendError> {
        let file = StoreFile {
            version: 1,
            containers: self
                .containers
                .iter()
                .map(|(id, c)| (id.clone(), container_to_file(c)))
                .collect(),
        };
        serde_json::to_vec_pretty(&file).map_err(|e| BackendError::other(BACKEND_NAME, e))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BackendError> {
        let file: StoreFile =
            serde_json::from_slice(bytes).map_err(|e| BackendError::other(BACKEND_NAME, e))?;
        Ok(Self {
            containers: file
                .containers
                .into_iter()
                .map(|(id, c)| (id, container_from_file(c)))
                .collect(),
            fail_next: None,
        })
    }

    fn take_failure(&mut self) -> Result<(), BackendError> {
        match self.fail_next.take() {
            Some(status) => Err(BackendError::Rejected { status }),
            None => Ok(()),
        }
    }

    fn container(&self, id: &str) -> Result<&Container, BackendError> {
        self.containers
            .get(id)
            .ok_or_else(|| BackendError::ContainerNotFound(id.to_string()))
    }

    fn container_mut(&mut self, id: &str) -> Result<&mut Container, BackendError> {
        self.containers
            .get_mut(id)
            .ok_or_else(|| BackendError::ContainerNotFound(id.to_string()))
    }
}

fn container_to_file(container: &Container) -> ContainerFile {
    ContainerFile {
        next_sheet_id: container.next_sheet_id,
        sheets: container
            .sheets
            .iter()
            .map(|s| SheetFile {
                id: s.id,
                title: s.title.clone(),
                cells: s
                    .cells
                    .iter()
                    .map(|(&(row, col), value)| CellRecord {
                        row,
                        col,
                        value: value.clone(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

fn container_from_file(file: ContainerFile) -> Container {
    Container {
        next_sheet_id: file.next_sheet_id,
        sheets: file
            .sheets
            .into_iter()
            .map(|s| Sheet {
                id: s.id,
                title: s.title,
                cells: s
                    .cells
                    .into_iter()
                    .map(|c| ((c.row, c.col), c.value))
                    .collect(),
            })
            .collect(),
    }
}

fn sheet_by_id<'a>(container: &'a Container, sheet: &SheetRef) -> Result<&'a Sheet, BackendError> {
    container
        .sheets
        .iter()
        .find(|s| s.id == sheet.id)
        .ok_or_else(|| BackendError::SheetNotFound(sheet.title.clone()))
}

fn sheet_by_title_mut<'a>(
    container: &'a mut Container,
    title: &str,
) -> Result<&'a mut Sheet, BackendError> {
    container
        .sheets
        .iter_mut()
        .find(|s| s.title == title)
        .ok_or_else(|| BackendError::SheetNotFound(title.to_string()))
}

fn bounding_matrix(cells: &BTreeMap<(u32, u32), CellValue>) -> Matrix {
    let Some(max_row) = cells.keys().map(|&(row, _)| row).max() else {
        return Vec::new();
    };
    let max_col = cells.keys().map(|&(_, col)| col).max().unwrap_or(0);
    let mut out = vec![vec![CellValue::Empty; (max_col + 1) as usize]; (max_row + 1) as usize];
    for (&(row, col), value) in cells {
        out[row as usize][col as usize] = value.clone();
    }
    out
}

impl GridBackend for MemoryGrid {
    fn list_sheets(&mut self, container: &str) -> Result<Vec<SheetRef>, BackendError> {
        self.take_failure()?;
        let container = self.container(container)?;
        Ok(container
            .sheets
            .iter()
            .map(|s| SheetRef {
                id: s.id,
                title: s.title.clone(),
            })
            .collect())
    }

    fn sheet_data(&mut self, container: &str, sheet: &SheetRef) -> Result<Matrix, BackendError> {
        self.take_failure()?;
        let container = self.container(container)?;
        let sheet = sheet_by_id(container, sheet)?;
        Ok(bounding_matrix(&sheet.cells))
    }

    fn create_sheet(&mut self, container: &str, title: &str) -> Result<SheetRef, BackendError> {
        self.take_failure()?;
        let container = self.container_mut(container)?;
        if container.sheets.iter().any(|s| s.title == title) {
            // The real service answers a duplicate addSheet with a 400.
            return Err(BackendError::Rejected { status: 400 });
        }
        let id = container.next_sheet_id;
        container.next_sheet_id += 1;
        container.sheets.push(Sheet {
            id,
            title: title.to_string(),
            cells: BTreeMap::new(),
        });
        Ok(SheetRef {
            id,
            title: title.to_string(),
        })
    }

    fn delete_sheet(&mut self, container: &str, sheet: &SheetRef) -> Result<(), BackendError> {
        self.take_failure()?;
        let container = self.container_mut(container)?;
        let before = container.sheets.len();
        container.sheets.retain(|s| s.id != sheet.id);
        if container.sheets.len() == before {
            return Err(BackendError::SheetNotFound(sheet.title.clone()));
        }
        Ok(())
    }

    fn read_range(
        &mut self,
        container: &str,
        range: &RangeAddress,
    ) -> Result<Matrix, BackendError> {
        self.take_failure()?;
        let container = self.container_mut(container)?;
        let sheet = sheet_by_title_mut(container, &range.sheet)?;
        let mut out = Vec::with_capacity(range.height() as usize);
        for row in range.start_row..range.end_row {
            let mut cells = Vec::with_capacity(range.width() as usize);
            for col in range.start_col..range.end_col {
                cells.push(
                    sheet
                        .cells
                        .get(&(row, col))
                        .cloned()
                        .unwrap_or(CellValue::Empty),
                );
            }
            out.push(cells);
        }
        Ok(out)
    }

    fn write_range(
        &mut self,
        container: &str,
        range: &RangeAddress,
        values: &Matrix,
    ) -> Result<(), BackendError> {
        self.take_failure()?;
        if values.len() != range.height() as usize
            || values.iter().any(|row| row.len() != range.width() as usize)
        {
            return Err(BackendError::other(
                BACKEND_NAME,
                format!("values do not match the {} range", range),
            ));
        }
        let container = self.container_mut(container)?;
        let sheet = sheet_by_title_mut(container, &range.sheet)?;
        for (r, row) in values.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let key = (range.start_row + r as u32, range.start_col + c as u32);
                if value.is_empty() {
                    sheet.cells.remove(&key);
                } else {
                    sheet.cells.insert(key, value.clone());
                }
            }
        }
        Ok(())
    }

    fn clear_range(
        &mut self,
        container: &str,
        range: &RangeAddress,
    ) -> Result<(), BackendError> {
        self.take_failure()?;
        let container = self.container_mut(container)?;
        let sheet = sheet_by_title_mut(container, &range.sheet)?;
        sheet.cells.retain(|&(row, col), _| !range.contains(row, col));
        Ok(())
    }
}
