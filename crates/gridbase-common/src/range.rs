//! Rectangular range addresses in the grid service's A1 form.

use core::fmt;

use crate::coord::column_to_letters;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Errors returned when constructing ranges from unchecked inputs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RangeError {
    EmptyRowSpan { start: u32, end: u32 },
    EmptyColSpan { start: u32, end: u32 },
}

impl fmt::Display for RangeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeError::EmptyRowSpan { start, end } => {
                write!(f, "row span {start}..{end} is empty")
            }
            RangeError::EmptyColSpan { start, end } => {
                write!(f, "column span {start}..{end} is empty")
            }
        }
    }
}

impl std::error::Error for RangeError {}

/// A rectangular region of one sheet, zero-based with exclusive ends.
///
/// `Display` renders the one-based inclusive form the grid service expects
/// (`"Events!A1:C4"`), collapsing single cells to the short form
/// (`"Events!A3"`).
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RangeAddress {
    pub sheet: String,
    pub start_row: u32,
    pub start_col: u32,
    pub end_row: u32,
    pub end_col: u32,
}

impl RangeAddress {
    /// Construct a range, panicking on an empty row or column span.
    ///
    /// An empty span is a logic bug in the caller, not an environmental
    /// condition; use [`try_new`](Self::try_new) for untrusted inputs.
    pub fn new(
        sheet: impl Into<String>,
        start_row: u32,
        start_col: u32,
        end_row: u32,
        end_col: u32,
    ) -> Self {
        match Self::try_new(sheet, start_row, start_col, end_row, end_col) {
            Ok(range) => range,
            Err(e) => panic!("invalid range: {e}"),
        }
    }

    /// Fallible constructor that reports empty spans rather than panicking.
    pub fn try_new(
        sheet: impl Into<String>,
        start_row: u32,
        start_col: u32,
        end_row: u32,
        end_col: u32,
    ) -> Result<Self, RangeError> {
        if start_row >= end_row {
            return Err(RangeError::EmptyRowSpan {
                start: start_row,
                end: end_row,
            });
        }
        if start_col >= end_col {
            return Err(RangeError::EmptyColSpan {
                start: start_col,
                end: end_col,
            });
        }
        Ok(Self {
            sheet: sheet.into(),
            start_row,
            start_col,
            end_row,
            end_col,
        })
    }

    /// The 1x1 range covering a single cell.
    pub fn cell(sheet: impl Into<String>, row: u32, col: u32) -> Self {
        Self::new(sheet, row, col, row + 1, col + 1)
    }

    pub fn width(&self) -> u32 {
        self.end_col - self.start_col
    }

    pub fn height(&self) -> u32 {
        self.end_row - self.start_row
    }

    /// Whether the zero-based cell `(row, col)` falls inside the rectangle.
    pub fn contains(&self, row: u32, col: u32) -> bool {
        row >= self.start_row && row < self.end_row && col >= self.start_col && col < self.end_col
    }
}

impl fmt::Display for RangeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}!{}{}",
            self.sheet,
            column_to_letters(self.start_col),
            self.start_row + 1
        )?;
        if self.width() == 1 && self.height() == 1 {
            return Ok(());
        }
        write!(
            f,
            ":{}{}",
            column_to_letters(self.end_col - 1),
            self.end_row
        )
    }
}
