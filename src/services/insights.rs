//! Data series behind the dashboard charts. Everything here is a pure
//! function of a loaded dataset or its profile; drawing is left to the client.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::AppError;
use crate::models::{ColumnType, Dataset, Value};
use crate::services::profile::DatasetProfile;

pub const DEFAULT_HISTOGRAM_BINS: usize = 50;
pub const MAX_HISTOGRAM_BINS: usize = 1000;
pub const HIGH_CARDINALITY_LIMIT: usize = 5;
pub const CORRELATION_TOP_PAIRS: usize = 50;
pub const MISSING_MASK_ROWS: usize = 500;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnCount {
    pub column: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValueCount {
    pub value: Value,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassBalance {
    pub column: String,
    pub counts: Vec<ValueCount>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub column: String,
    /// `counts.len() + 1` bin edges.
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrelationMatrix {
    pub columns: Vec<String>,
    /// Row-major, `None` where the coefficient is undefined.
    pub values: Vec<Vec<Option<f64>>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MissingMask {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<bool>>,
}

/// The fixed chart set computed for every upload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub missing_by_column: Vec<ColumnCount>,
    pub class_balance: Option<ClassBalance>,
    pub missing_mask: Option<MissingMask>,
    pub high_cardinality: Vec<ColumnCount>,
    pub numeric_columns: Vec<String>,
    pub correlation: Option<CorrelationMatrix>,
}

#[derive(Debug, Clone)]
pub struct ChartOptions<'a> {
    pub class_column: &'a str,
    pub high_cardinality_threshold: usize,
}

pub fn chart_data(dataset: &Dataset, profile: &DatasetProfile, options: &ChartOptions<'_>) -> ChartData {
    ChartData {
        missing_by_column: missing_by_column(profile),
        class_balance: class_balance(dataset, options.class_column),
        missing_mask: missing_mask(dataset, MISSING_MASK_ROWS),
        high_cardinality: high_cardinality(
            profile,
            options.high_cardinality_threshold,
            HIGH_CARDINALITY_LIMIT,
        ),
        numeric_columns: numeric_columns(dataset),
        correlation: correlation(dataset, CORRELATION_TOP_PAIRS),
    }
}

pub fn missing_by_column(profile: &DatasetProfile) -> Vec<ColumnCount> {
    profile
        .columns
        .iter()
        .filter(|c| c.missing_count > 0)
        .map(|c| ColumnCount {
            column: c.name.clone(),
            count: c.missing_count,
        })
        .collect()
}

/// Value counts of a target column, most frequent first.
pub fn class_balance(dataset: &Dataset, column: &str) -> Option<ClassBalance> {
    let column = dataset.column(column)?;

    let mut index: HashMap<&Value, usize> = HashMap::new();
    let mut counts: Vec<ValueCount> = Vec::new();
    for value in column.present() {
        match index.get(value) {
            Some(&i) => counts[i].count += 1,
            None => {
                index.insert(value, counts.len());
                counts.push(ValueCount {
                    value: value.clone(),
                    count: 1,
                });
            }
        }
    }
    // Stable sort keeps first-seen order among ties.
    counts.sort_by(|a, b| b.count.cmp(&a.count));

    Some(ClassBalance {
        column: column.name.clone(),
        counts,
    })
}

pub fn high_cardinality(profile: &DatasetProfile, threshold: usize, limit: usize) -> Vec<ColumnCount> {
    let mut columns: Vec<ColumnCount> = profile
        .columns
        .iter()
        .filter(|c| c.distinct_count > threshold)
        .map(|c| ColumnCount {
            column: c.name.clone(),
            count: c.distinct_count,
        })
        .collect();
    columns.sort_by(|a, b| b.count.cmp(&a.count));
    columns.truncate(limit);
    columns
}

pub fn numeric_columns(dataset: &Dataset) -> Vec<String> {
    dataset
        .columns()
        .iter()
        .filter(|c| c.kind == ColumnType::Numeric)
        .map(|c| c.name.clone())
        .collect()
}

pub fn histogram(dataset: &Dataset, column: &str, bins: usize) -> Result<Histogram, AppError> {
    let col = dataset
        .column(column)
        .ok_or_else(|| AppError::NotFound(format!("Column '{}' does not exist", column)))?;
    if col.kind != ColumnType::Numeric {
        return Err(AppError::InvalidInput(format!(
            "Column '{}' is {}, not numeric",
            column, col.kind
        )));
    }
    if bins == 0 {
        return Err(AppError::InvalidInput("bins must be at least 1".to_string()));
    }
    if bins > MAX_HISTOGRAM_BINS {
        return Err(AppError::InvalidInput(format!(
            "bins must be at most {}, got {}",
            MAX_HISTOGRAM_BINS, bins
        )));
    }

    let values: Vec<f64> = col.values.iter().filter_map(Value::as_f64).collect();
    let (min, max) = match min_max(&values) {
        Some(bounds) => bounds,
        None => {
            return Ok(Histogram {
                column: col.name.clone(),
                edges: Vec::new(),
                counts: Vec::new(),
            })
        }
    };

    if min == max {
        return Ok(Histogram {
            column: col.name.clone(),
            edges: vec![min - 0.5, max + 0.5],
            counts: vec![values.len()],
        });
    }

    let width = (max - min) / bins as f64;
    let edges: Vec<f64> = (0..=bins)
        .map(|i| if i == bins { max } else { min + width * i as f64 })
        .collect();
    let mut counts = vec![0usize; bins];
    for v in &values {
        let idx = (((v - min) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }

    Ok(Histogram {
        column: col.name.clone(),
        edges,
        counts,
    })
}

fn min_max(values: &[f64]) -> Option<(f64, f64)> {
    values.iter().fold(None, |acc, &v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    })
}

/// Pearson correlation between numeric columns over pairwise-complete rows,
/// restricted to the columns taking part in the strongest `top_pairs` pairs.
pub fn correlation(dataset: &Dataset, top_pairs: usize) -> Option<CorrelationMatrix> {
    let numeric: Vec<(&str, Vec<Option<f64>>)> = dataset
        .columns()
        .iter()
        .filter(|c| c.kind == ColumnType::Numeric)
        .map(|c| (c.name.as_str(), c.values.iter().map(Value::as_f64).collect()))
        .collect();
    if numeric.len() < 2 {
        return None;
    }

    let n = numeric.len();
    let mut full = vec![vec![None; n]; n];
    for i in 0..n {
        for j in i..n {
            let r = pearson(&numeric[i].1, &numeric[j].1);
            full[i][j] = r;
            full[j][i] = r;
        }
    }

    let mut pairs: Vec<(usize, usize, f64)> = Vec::new();
    for i in 0..n {
        for j in (i + 1)..n {
            if let Some(r) = full[i][j] {
                pairs.push((i, j, r.abs()));
            }
        }
    }
    pairs.sort_by(|a, b| b.2.total_cmp(&a.2));

    let mut keep = vec![false; n];
    for &(i, j, _) in pairs.iter().take(top_pairs) {
        keep[i] = true;
        keep[j] = true;
    }
    let selected: Vec<usize> = (0..n).filter(|&i| keep[i]).collect();
    if selected.len() < 2 {
        return None;
    }

    Some(CorrelationMatrix {
        columns: selected.iter().map(|&i| numeric[i].0.to_string()).collect(),
        values: selected
            .iter()
            .map(|&i| selected.iter().map(|&j| full[i][j]).collect())
            .collect(),
    })
}

fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|p| p.1).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }
    if var_x == 0.0 || var_y == 0.0 {
        return None;
    }
    Some((cov / (var_x.sqrt() * var_y.sqrt())).clamp(-1.0, 1.0))
}

pub fn missing_mask(dataset: &Dataset, rows: usize) -> Option<MissingMask> {
    if !dataset.has_missing() {
        return None;
    }
    let columns = dataset.columns();
    Some(MissingMask {
        columns: columns.iter().map(|c| c.name.clone()).collect(),
        rows: (0..dataset.row_count().min(rows))
            .map(|row| columns.iter().map(|c| c.values[row].is_missing()).collect())
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Column;
    use crate::services::profile::compute_profile;

    fn orders() -> Dataset {
        Dataset::new(vec![
            Column::new(
                "Price",
                ColumnType::Numeric,
                vec![10.0.into(), 20.0.into(), 30.0.into(), Value::Null, 50.0.into()],
            ),
            Column::new(
                "Quantity",
                ColumnType::Numeric,
                vec![1i64.into(), 2i64.into(), 3i64.into(), 4i64.into(), 5i64.into()],
            ),
            Column::new(
                "Refund",
                ColumnType::Numeric,
                vec![5i64.into(), 4i64.into(), 3i64.into(), 2i64.into(), 1i64.into()],
            ),
            Column::new(
                "IsReturned",
                ColumnType::Numeric,
                vec![0i64.into(), 1i64.into(), 0i64.into(), 1i64.into(), 0i64.into()],
            ),
            Column::new(
                "Category",
                ColumnType::Text,
                vec!["Books".into(), "Home".into(), "Books".into(), "Beauty".into(), Value::Null],
            ),
        ])
        .unwrap()
    }

    #[test]
    fn missing_columns_only() {
        let profile = compute_profile(&orders()).unwrap();
        let missing = missing_by_column(&profile);
        assert_eq!(
            missing,
            vec![
                ColumnCount { column: "Price".into(), count: 1 },
                ColumnCount { column: "Category".into(), count: 1 },
            ]
        );
    }

    #[test]
    fn class_balance_most_frequent_first() {
        let balance = class_balance(&orders(), "IsReturned").unwrap();
        assert_eq!(
            balance.counts,
            vec![
                ValueCount { value: Value::Int(0), count: 3 },
                ValueCount { value: Value::Int(1), count: 2 },
            ]
        );
        assert!(class_balance(&orders(), "Missing").is_none());

        let ties = class_balance(&orders(), "Category").unwrap();
        let order: Vec<Value> = ties.counts.into_iter().map(|c| c.value).collect();
        assert_eq!(order, vec!["Books".into(), "Home".into(), "Beauty".into()]);
    }

    #[test]
    fn high_cardinality_threshold_and_limit() {
        let profile = compute_profile(&orders()).unwrap();
        let high = high_cardinality(&profile, 3, 1);
        assert_eq!(high.len(), 1);
        assert_eq!(high[0].count, 5);
        assert!(high_cardinality(&profile, 1000, 5).is_empty());
    }

    #[test]
    fn histogram_bins_cover_range() {
        let hist = histogram(&orders(), "Price", 4).unwrap();
        assert_eq!(hist.edges, vec![10.0, 20.0, 30.0, 40.0, 50.0]);
        assert_eq!(hist.counts, vec![1, 1, 1, 1]);
        assert_eq!(hist.counts.iter().sum::<usize>(), 4);
    }

    #[test]
    fn histogram_rejects_text_and_unknown_columns() {
        assert!(matches!(
            histogram(&orders(), "Category", 10),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            histogram(&orders(), "Nope", 10),
            Err(AppError::NotFound(_))
        ));
    }

    #[test]
    fn histogram_bin_count_is_bounded() {
        assert!(matches!(histogram(&orders(), "Price", 0), Err(AppError::InvalidInput(_))));
        assert!(matches!(
            histogram(&orders(), "Price", usize::MAX / 16),
            Err(AppError::InvalidInput(_))
        ));
        assert!(matches!(
            histogram(&orders(), "Price", MAX_HISTOGRAM_BINS + 1),
            Err(AppError::InvalidInput(_))
        ));
        let hist = histogram(&orders(), "Price", MAX_HISTOGRAM_BINS).unwrap();
        assert_eq!(hist.counts.len(), MAX_HISTOGRAM_BINS);
    }

    #[test]
    fn constant_column_histogram_has_one_bin() {
        let dataset = Dataset::new(vec![Column::new(
            "c",
            ColumnType::Numeric,
            vec![Value::Int(7); 3],
        )])
        .unwrap();
        let hist = histogram(&dataset, "c", DEFAULT_HISTOGRAM_BINS).unwrap();
        assert_eq!(hist.counts, vec![3]);
        assert_eq!(hist.edges.len(), 2);
    }

    #[test]
    fn correlation_of_linear_columns() {
        let matrix = correlation(&orders(), CORRELATION_TOP_PAIRS).unwrap();
        assert_eq!(matrix.columns, vec!["Price", "Quantity", "Refund", "IsReturned"]);

        let q = 1;
        let r = 2;
        let qr = matrix.values[q][r].unwrap();
        assert!((qr + 1.0).abs() < 1e-12);
        assert!((matrix.values[q][q].unwrap() - 1.0).abs() < 1e-12);
        // Price is missing on row 3, the remaining rows are still linear in Quantity.
        assert!((matrix.values[0][q].unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn correlation_needs_two_numeric_columns() {
        let dataset = Dataset::new(vec![Column::new(
            "only",
            ColumnType::Numeric,
            vec![Value::Int(1), Value::Int(2)],
        )])
        .unwrap();
        assert!(correlation(&dataset, CORRELATION_TOP_PAIRS).is_none());
    }

    #[test]
    fn mask_only_when_something_is_missing() {
        let mask = missing_mask(&orders(), 2).unwrap();
        assert_eq!(mask.rows.len(), 2);
        assert!(mask.rows.iter().all(|row| row.iter().all(|m| !m)));

        let full = Dataset::new(vec![Column::new("a", ColumnType::Numeric, vec![Value::Int(1)])]).unwrap();
        assert!(missing_mask(&full, MISSING_MASK_ROWS).is_none());
    }
}
