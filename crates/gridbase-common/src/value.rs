//! Cell payloads and the declared-column-type vocabulary.
//!
//! Storage is normalized to the widest member of each primitive family
//! (`Int(i64)` carries every signed width); the declared width lives in
//! [`ColumnKind`] and is purely descriptive. Row validation therefore
//! compares *families*, not widths.

use std::fmt::{self, Display};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A single grid cell payload.
///
/// `Empty` is what a backend reports for a blank cell; it is never a legal
/// data value for a typed column.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", content = "value"))]
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Bool(bool),
    Int(i64),
    Uint(u64),
    Float(f64),
    Text(String),
    Empty,
}

impl CellValue {
    pub fn family(&self) -> ValueFamily {
        match self {
            CellValue::Bool(_) => ValueFamily::Bool,
            CellValue::Int(_) => ValueFamily::Signed,
            CellValue::Uint(_) => ValueFamily::Unsigned,
            CellValue::Float(_) => ValueFamily::Float,
            CellValue::Text(_) => ValueFamily::Text,
            CellValue::Empty => ValueFamily::Empty,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

impl Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Bool(b) => write!(f, "{b}"),
            CellValue::Int(i) => write!(f, "{i}"),
            CellValue::Uint(u) => write!(f, "{u}"),
            CellValue::Float(n) => write!(f, "{n}"),
            CellValue::Text(s) => write!(f, "{s}"),
            CellValue::Empty => write!(f, ""),
        }
    }
}

impl From<bool> for CellValue {
    fn from(v: bool) -> Self {
        CellValue::Bool(v)
    }
}
impl From<i8> for CellValue {
    fn from(v: i8) -> Self {
        CellValue::Int(v as i64)
    }
}
impl From<i16> for CellValue {
    fn from(v: i16) -> Self {
        CellValue::Int(v as i64)
    }
}
impl From<i32> for CellValue {
    fn from(v: i32) -> Self {
        CellValue::Int(v as i64)
    }
}
impl From<i64> for CellValue {
    fn from(v: i64) -> Self {
        CellValue::Int(v)
    }
}
impl From<u8> for CellValue {
    fn from(v: u8) -> Self {
        CellValue::Uint(v as u64)
    }
}
impl From<u16> for CellValue {
    fn from(v: u16) -> Self {
        CellValue::Uint(v as u64)
    }
}
impl From<u32> for CellValue {
    fn from(v: u32) -> Self {
        CellValue::Uint(v as u64)
    }
}
impl From<u64> for CellValue {
    fn from(v: u64) -> Self {
        CellValue::Uint(v)
    }
}
impl From<f32> for CellValue {
    fn from(v: f32) -> Self {
        CellValue::Float(v as f64)
    }
}
impl From<f64> for CellValue {
    fn from(v: f64) -> Self {
        CellValue::Float(v)
    }
}
impl From<&str> for CellValue {
    fn from(v: &str) -> Self {
        CellValue::Text(v.to_string())
    }
}
impl From<String> for CellValue {
    fn from(v: String) -> Self {
        CellValue::Text(v)
    }
}

/// Primitive family a value or declared kind belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFamily {
    Bool,
    Signed,
    Unsigned,
    Float,
    Text,
    Empty,
}

impl Display for ValueFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueFamily::Bool => "bool",
            ValueFamily::Signed => "signed integer",
            ValueFamily::Unsigned => "unsigned integer",
            ValueFamily::Float => "float",
            ValueFamily::Text => "string",
            ValueFamily::Empty => "empty",
        };
        write!(f, "{name}")
    }
}

/// Declared column types and their header tag strings.
///
/// The tags are part of the stored header format of every managed sheet and
/// must stay stable for tables written by earlier deployments to keep
/// decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Bool,
    Int,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float32,
    Float64,
    Text,
}

impl ColumnKind {
    /// Header tag written to the type row of a managed sheet.
    pub const fn tag(self) -> &'static str {
        match self {
            ColumnKind::Bool => "bool",
            ColumnKind::Int => "int",
            ColumnKind::Int8 => "int8",
            ColumnKind::Int16 => "int16",
            ColumnKind::Int32 => "int32",
            ColumnKind::Int64 => "int64",
            ColumnKind::Uint => "uint",
            ColumnKind::Uint8 => "uint8",
            ColumnKind::Uint16 => "uint16",
            ColumnKind::Uint32 => "uint32",
            ColumnKind::Uint64 => "uint64",
            ColumnKind::Float32 => "float32",
            ColumnKind::Float64 => "float64",
            ColumnKind::Text => "string",
        }
    }

    /// Inverse of [`tag`](Self::tag); `None` for tags outside the vocabulary.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Some(match tag {
            "bool" => ColumnKind::Bool,
            "int" => ColumnKind::Int,
            "int8" => ColumnKind::Int8,
            "int16" => ColumnKind::Int16,
            "int32" => ColumnKind::Int32,
            "int64" => ColumnKind::Int64,
            "uint" => ColumnKind::Uint,
            "uint8" => ColumnKind::Uint8,
            "uint16" => ColumnKind::Uint16,
            "uint32" => ColumnKind::Uint32,
            "uint64" => ColumnKind::Uint64,
            "float32" => ColumnKind::Float32,
            "float64" => ColumnKind::Float64,
            "string" => ColumnKind::Text,
            _ => return None,
        })
    }

    pub const fn family(self) -> ValueFamily {
        match self {
            ColumnKind::Bool => ValueFamily::Bool,
            ColumnKind::Int
            | ColumnKind::Int8
            | ColumnKind::Int16
            | ColumnKind::Int32
            | ColumnKind::Int64 => ValueFamily::Signed,
            ColumnKind::Uint
            | ColumnKind::Uint8
            | ColumnKind::Uint16
            | ColumnKind::Uint32
            | ColumnKind::Uint64 => ValueFamily::Unsigned,
            ColumnKind::Float32 | ColumnKind::Float64 => ValueFamily::Float,
            ColumnKind::Text => ValueFamily::Text,
        }
    }

    /// Whether `value` may be stored in a column declared with this kind.
    pub fn admits(self, value: &CellValue) -> bool {
        // Empty rejects itself: no declared kind maps to the Empty family.
        self.family() == value.family()
    }
}

impl Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}
