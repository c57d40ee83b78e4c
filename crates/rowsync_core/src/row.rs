//! Rows carried in batch parts.

use serde::{Deserialize, Serialize};

/// State of the rows stored in one batch part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum RowState {
    /// No change information (initial snapshot rows).
    #[default]
    None,
    /// Row was inserted or updated.
    Modified,
    /// Row was deleted.
    Deleted,
}

impl RowState {
    /// Converts to the numeric code used in manifests.
    pub fn to_code(&self) -> u8 {
        match self {
            RowState::None => 0,
            RowState::Modified => 1,
            RowState::Deleted => 2,
        }
    }

    /// Converts from a numeric code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(RowState::None),
            1 => Some(RowState::Modified),
            2 => Some(RowState::Deleted),
            _ => None,
        }
    }
}

impl From<RowState> for u8 {
    fn from(state: RowState) -> Self {
        state.to_code()
    }
}

impl TryFrom<u8> for RowState {
    type Error = String;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        RowState::from_code(code).ok_or_else(|| format!("invalid row state code: {code}"))
    }
}

/// A single column value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RowValue {
    /// SQL NULL.
    Null,
    /// Boolean.
    Bool(bool),
    /// Signed integer.
    Int(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    Text(String),
    /// Binary data.
    Bytes(Vec<u8>),
}

impl RowValue {
    /// Returns an estimate of the in-batch size of this value, in bytes.
    pub fn estimated_size(&self) -> usize {
        match self {
            RowValue::Null | RowValue::Bool(_) => 1,
            RowValue::Int(_) | RowValue::Float(_) => 8,
            RowValue::Text(s) => s.len(),
            RowValue::Bytes(b) => b.len(),
        }
    }

    /// Interprets a scalar result as an integer.
    ///
    /// Booleans map to 0/1, floats are truncated and text is parsed. Returns
    /// `None` for NULL, binary data and unparsable text.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RowValue::Int(v) => Some(*v),
            RowValue::Bool(v) => Some(i64::from(*v)),
            RowValue::Float(v) if v.is_finite() => Some(*v as i64),
            RowValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns true if this is NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, RowValue::Null)
    }
}

impl From<i64> for RowValue {
    fn from(v: i64) -> Self {
        RowValue::Int(v)
    }
}

impl From<bool> for RowValue {
    fn from(v: bool) -> Self {
        RowValue::Bool(v)
    }
}

impl From<&str> for RowValue {
    fn from(v: &str) -> Self {
        RowValue::Text(v.to_string())
    }
}

impl From<String> for RowValue {
    fn from(v: String) -> Self {
        RowValue::Text(v)
    }
}

/// One changed row, with values in table column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncRow {
    /// Change state of the row.
    pub state: RowState,
    /// Column values.
    pub values: Vec<RowValue>,
}

impl SyncRow {
    /// Creates a modified row.
    pub fn modified(values: Vec<RowValue>) -> Self {
        Self {
            state: RowState::Modified,
            values,
        }
    }

    /// Creates a deleted row.
    pub fn deleted(values: Vec<RowValue>) -> Self {
        Self {
            state: RowState::Deleted,
            values,
        }
    }

    /// Returns an estimate of the in-batch size of this row, in bytes.
    pub fn estimated_size(&self) -> usize {
        1 + self.values.iter().map(RowValue::estimated_size).sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_state_codes() {
        assert_eq!(RowState::None.to_code(), 0);
        assert_eq!(RowState::Modified.to_code(), 1);
        assert_eq!(RowState::Deleted.to_code(), 2);
        assert_eq!(RowState::from_code(2), Some(RowState::Deleted));
        assert_eq!(RowState::from_code(3), None);
    }

    #[test]
    fn row_state_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&RowState::Deleted).unwrap(), "2");
        let state: RowState = serde_json::from_str("1").unwrap();
        assert_eq!(state, RowState::Modified);
        assert!(serde_json::from_str::<RowState>("9").is_err());
    }

    #[test]
    fn scalar_conversion() {
        assert_eq!(RowValue::Int(3).as_i64(), Some(3));
        assert_eq!(RowValue::Bool(true).as_i64(), Some(1));
        assert_eq!(RowValue::Float(2.9).as_i64(), Some(2));
        assert_eq!(RowValue::Text(" 7 ".into()).as_i64(), Some(7));
        assert_eq!(RowValue::Null.as_i64(), None);
        assert_eq!(RowValue::Text("x".into()).as_i64(), None);
    }

    #[test]
    fn estimated_row_size() {
        let row = SyncRow::modified(vec![RowValue::Int(1), RowValue::from("abc"), RowValue::Null]);
        assert_eq!(row.estimated_size(), 1 + 8 + 3 + 1);
    }
}
