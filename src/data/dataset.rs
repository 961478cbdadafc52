//! Column-oriented participant data for survey analysis.

use crate::error::{Result, XwasError};
use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// A single data column.
///
/// Numeric columns store missing values as NaN; categorical columns as None.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// Continuous numeric values.
    Numeric(Vec<f64>),
    /// String-valued levels.
    Categorical(Vec<Option<String>>),
}

impl Column {
    /// Number of rows in the column.
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Categorical(v) => v.len(),
        }
    }

    /// True if the column has no rows.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True for numeric columns.
    pub fn is_numeric(&self) -> bool {
        matches!(self, Column::Numeric(_))
    }

    /// Number of non-missing entries.
    pub fn n_observed(&self) -> usize {
        match self {
            Column::Numeric(v) => v.iter().filter(|x| !x.is_nan()).count(),
            Column::Categorical(v) => v.iter().filter(|x| x.is_some()).count(),
        }
    }
}

fn is_na(raw: &str) -> bool {
    raw.is_empty() || raw == "NA" || raw == "na"
}

/// Participant-level dataset with named columns.
///
/// Rows are participants, columns are variables (outcome, exposures,
/// covariates, survey design variables). Column order is preserved from
/// construction.
#[derive(Debug, Clone)]
pub struct Dataset {
    /// Participant IDs in row order.
    row_ids: Vec<String>,
    /// Column names in order.
    column_names: Vec<String>,
    /// Column data by name.
    columns: HashMap<String, Column>,
}

impl Dataset {
    /// Create a dataset from ordered columns, checking lengths.
    pub fn new(row_ids: Vec<String>, columns: Vec<(String, Column)>) -> Result<Self> {
        let n_rows = row_ids.len();
        let mut column_names = Vec::with_capacity(columns.len());
        let mut data = HashMap::with_capacity(columns.len());

        for (name, column) in columns {
            if column.len() != n_rows {
                return Err(XwasError::DimensionMismatch {
                    expected: n_rows,
                    actual: column.len(),
                });
            }
            if data.contains_key(&name) {
                return Err(XwasError::InvalidParameter(format!(
                    "Duplicate column '{}'",
                    name
                )));
            }
            column_names.push(name.clone());
            data.insert(name, column);
        }

        Ok(Self {
            row_ids,
            column_names,
            columns: data,
        })
    }

    /// Load a dataset from a TSV file.
    ///
    /// Expected format:
    /// - First row: header with column names (first column is the participant ID)
    /// - Subsequent rows: participant ID followed by values
    ///
    /// Empty fields and "NA"/"na" are treated as missing. A column whose
    /// non-missing values all parse as numbers is numeric, otherwise
    /// categorical.
    pub fn from_tsv<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        // Parse header
        let header_line = lines
            .next()
            .ok_or_else(|| XwasError::EmptyData("Empty data file".to_string()))??;
        let header: Vec<&str> = header_line.split('\t').collect();
        if header.len() < 2 {
            return Err(XwasError::EmptyData(
                "Data must have at least one variable column".to_string(),
            ));
        }
        let column_names: Vec<String> = header[1..].iter().map(|s| s.to_string()).collect();

        // First pass: collect raw fields to infer column types
        let mut row_ids: Vec<String> = Vec::new();
        let mut raw_rows: Vec<Vec<String>> = Vec::new();
        for line_result in lines {
            let line = line_result?;
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            row_ids.push(fields[0].to_string());
            raw_rows.push(fields[1..].iter().map(|s| s.trim().to_string()).collect());
        }

        if raw_rows.is_empty() {
            return Err(XwasError::EmptyData("No rows in data file".to_string()));
        }

        let mut columns: Vec<(String, Column)> = Vec::with_capacity(column_names.len());
        for (col_idx, col_name) in column_names.iter().enumerate() {
            let all_numeric = raw_rows.iter().all(|row| {
                row.get(col_idx)
                    .map(|v| is_na(v) || v.parse::<f64>().is_ok())
                    .unwrap_or(true)
            });

            let column = if all_numeric {
                let values: Vec<f64> = raw_rows
                    .iter()
                    .map(|row| match row.get(col_idx) {
                        Some(v) if !is_na(v) => v.parse::<f64>().unwrap_or(f64::NAN),
                        _ => f64::NAN,
                    })
                    .collect();
                Column::Numeric(values)
            } else {
                let values: Vec<Option<String>> = raw_rows
                    .iter()
                    .map(|row| match row.get(col_idx) {
                        Some(v) if !is_na(v) => Some(v.clone()),
                        _ => None,
                    })
                    .collect();
                Column::Categorical(values)
            };
            columns.push((col_name.clone(), column));
        }

        Self::new(row_ids, columns)
    }

    /// Write the dataset to a TSV file. Missing values are written as "NA".
    pub fn to_tsv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);

        write!(writer, "participant_id")?;
        for name in &self.column_names {
            write!(writer, "\t{}", name)?;
        }
        writeln!(writer)?;

        for (row_idx, row_id) in self.row_ids.iter().enumerate() {
            write!(writer, "{}", row_id)?;
            for name in &self.column_names {
                match &self.columns[name] {
                    Column::Numeric(v) => {
                        if v[row_idx].is_nan() {
                            write!(writer, "\tNA")?;
                        } else {
                            write!(writer, "\t{}", v[row_idx])?;
                        }
                    }
                    Column::Categorical(v) => match &v[row_idx] {
                        Some(s) => write!(writer, "\t{}", s)?,
                        None => write!(writer, "\tNA")?,
                    },
                }
            }
            writeln!(writer)?;
        }

        Ok(())
    }

    /// Number of rows (participants).
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.row_ids.len()
    }

    /// Number of columns (variables).
    #[inline]
    pub fn n_columns(&self) -> usize {
        self.column_names.len()
    }

    /// Participant IDs in row order.
    #[inline]
    pub fn row_ids(&self) -> &[String] {
        &self.row_ids
    }

    /// Column names in order.
    #[inline]
    pub fn column_names(&self) -> &[String] {
        &self.column_names
    }

    /// Check if a column exists.
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Result<&Column> {
        self.columns
            .get(name)
            .ok_or_else(|| XwasError::MissingColumn(name.to_string()))
    }

    /// Get a numeric column by name.
    pub fn numeric(&self, name: &str) -> Result<&[f64]> {
        match self.column(name)? {
            Column::Numeric(v) => Ok(v),
            Column::Categorical(_) => Err(XwasError::InvalidColumnType {
                column: name.to_string(),
                reason: "expected numeric, found categorical".to_string(),
            }),
        }
    }

    /// Get a categorical column by name.
    pub fn categorical(&self, name: &str) -> Result<&[Option<String>]> {
        match self.column(name)? {
            Column::Categorical(v) => Ok(v),
            Column::Numeric(_) => Err(XwasError::InvalidColumnType {
                column: name.to_string(),
                reason: "expected categorical, found numeric".to_string(),
            }),
        }
    }

    /// Sorted unique non-missing levels of a categorical column.
    pub fn levels(&self, name: &str) -> Result<Vec<String>> {
        let values = self.categorical(name)?;
        let mut levels: Vec<String> = values
            .iter()
            .filter_map(|v| v.clone())
            .collect::<HashSet<_>>()
            .into_iter()
            .collect();
        levels.sort();
        Ok(levels)
    }

    /// Subset the dataset to the given row indices, in order.
    pub fn subset_rows(&self, indices: &[usize]) -> Result<Self> {
        for &idx in indices {
            if idx >= self.n_rows() {
                return Err(XwasError::InvalidParameter(format!(
                    "Row index {} out of bounds",
                    idx
                )));
            }
        }

        let row_ids: Vec<String> = indices.iter().map(|&i| self.row_ids[i].clone()).collect();
        let columns: Vec<(String, Column)> = self
            .column_names
            .iter()
            .map(|name| {
                let column = match &self.columns[name] {
                    Column::Numeric(v) => {
                        Column::Numeric(indices.iter().map(|&i| v[i]).collect())
                    }
                    Column::Categorical(v) => {
                        Column::Categorical(indices.iter().map(|&i| v[i].clone()).collect())
                    }
                };
                (name.clone(), column)
            })
            .collect();

        Self::new(row_ids, columns)
    }

    /// Drop rows whose sampling weight is missing, zero, or negative.
    ///
    /// Survey design construction requires strictly positive weights, so
    /// out-of-subsample participants (weight 0 or missing) must be removed
    /// before building the design.
    pub fn filter_positive_weights(&self, weight_column: &str) -> Result<Self> {
        let weights = self.numeric(weight_column)?;
        let keep: Vec<usize> = weights
            .iter()
            .enumerate()
            .filter(|(_, w)| w.is_finite() && **w > 0.0)
            .map(|(i, _)| i)
            .collect();
        self.subset_rows(&keep)
    }

    /// Return a copy with ln(x + epsilon) applied to the named numeric
    /// columns. The original dataset is not modified; missing values stay
    /// missing.
    pub fn log_transformed(&self, columns: &[String], epsilon: f64) -> Result<Self> {
        let mut out = self.clone();
        for name in columns {
            let transformed: Vec<f64> = self
                .numeric(name)?
                .iter()
                .map(|&x| if x.is_nan() { x } else { (x + epsilon).ln() })
                .collect();
            out.columns.insert(name.clone(), Column::Numeric(transformed));
        }
        Ok(out)
    }
}
