use std::borrow::Cow;
use std::collections::HashSet;

use polars::frame::DataFrame;
use smallvec::SmallVec;

use super::types::*;
use crate::error::ProfileError;
use crate::models::{Column, Dataset};
use crate::services::loader;

/// Anything the profiler can enumerate column by column.
pub trait Tabular {
    fn to_dataset(&self) -> Result<Cow<'_, Dataset>, ProfileError>;
}

impl Tabular for Dataset {
    fn to_dataset(&self) -> Result<Cow<'_, Dataset>, ProfileError> {
        Ok(Cow::Borrowed(self))
    }
}

impl Tabular for DataFrame {
    fn to_dataset(&self) -> Result<Cow<'_, Dataset>, ProfileError> {
        loader::dataset_from_frame(self).map(Cow::Owned)
    }
}

impl Tabular for serde_json::Value {
    fn to_dataset(&self) -> Result<Cow<'_, Dataset>, ProfileError> {
        loader::dataset_from_json(self).map(Cow::Owned)
    }
}

pub fn compute_profile<T: Tabular + ?Sized>(source: &T) -> Result<DatasetProfile, ProfileError> {
    let dataset = source.to_dataset()?;

    let columns: Vec<ColumnProfile> = dataset.columns().iter().map(profile_column).collect();
    let total_missing = columns.iter().map(|c| c.missing_count).sum();

    tracing::debug!(
        "Profiled {} rows x {} columns, {} missing",
        dataset.row_count(),
        dataset.column_count(),
        total_missing
    );

    Ok(DatasetProfile {
        row_count: dataset.row_count(),
        column_count: dataset.column_count(),
        total_missing,
        columns,
    })
}

fn profile_column(column: &Column) -> ColumnProfile {
    let mut sample_values = SmallVec::<[_; SAMPLE_SIZE]>::new();
    let mut seen = HashSet::new();
    let mut missing_count = 0;

    // Row order is kept so samples are the first distinct values encountered.
    for value in &column.values {
        if value.is_missing() {
            missing_count += 1;
        } else if seen.insert(value) && sample_values.len() < SAMPLE_SIZE {
            sample_values.push(value.clone());
        }
    }

    ColumnProfile {
        name: column.name.clone(),
        declared_type: column.kind,
        missing_count,
        distinct_count: seen.len(),
        sample_values,
    }
}
