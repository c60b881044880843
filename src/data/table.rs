use serde::{Deserialize, Serialize};

/// Parsed column/row representation of an ingested text blob.
///
/// Every row has exactly `columns.len()` cells, and every cell is finite:
/// cells that could not be read were already repaired by the parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl Table {
    /// The table produced for input with no data lines at all.
    pub fn empty() -> Self {
        Self {
            columns: vec!["time".to_string(), "value".to_string()],
            rows: Vec::new(),
        }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::empty()
    }
}
