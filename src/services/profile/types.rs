use serde::Serialize;
use smallvec::SmallVec;

use crate::models::{ColumnType, Value};

pub const SAMPLE_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnProfile {
    pub name: String,
    pub declared_type: ColumnType,
    pub missing_count: usize,
    pub distinct_count: usize,
    pub sample_values: SmallVec<[Value; SAMPLE_SIZE]>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetProfile {
    pub row_count: usize,
    pub column_count: usize,
    pub total_missing: usize,
    /// In dataset column order.
    pub columns: Vec<ColumnProfile>,
}

impl DatasetProfile {
    pub fn column(&self, name: &str) -> Option<&ColumnProfile> {
        self.columns.iter().find(|c| c.name == name)
    }
}
