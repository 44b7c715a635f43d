//! Data
//!
//! In-memory containers: the column-major `Matrix` view consumed by the models,
//! and the `Dataset` of student records read from a delimited file.
use crate::config::ColumnSpec;
use crate::errors::AteError;
use log::warn;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::Path;

/// Contiguous Column Major Matrix data container.
///
/// This structure holds a dense matrix of values in a single contiguous memory block,
/// in column-major order (Fortran-style), which allows for efficient column slicing.
///
/// # Type Parameters
/// * `T` - The numeric type of the data (e.g., `f32`, `f64`).
pub struct Matrix<'a, T> {
    /// The raw data stored in a single slice.
    pub data: &'a [T],
    /// Number of rows in the matrix.
    pub rows: usize,
    /// Number of columns in the matrix.
    pub cols: usize,
}

impl<'a, T> Matrix<'a, T> {
    /// Create a new Matrix.
    pub fn new(data: &'a [T], rows: usize, cols: usize) -> Self {
        Matrix { data, rows, cols }
    }

    /// Get a single reference to an item in the matrix.
    ///
    /// * `i` - The ith row of the data to get.
    /// * `j` - the jth column of the data to get.
    pub fn get(&self, i: usize, j: usize) -> &T {
        &self.data[i + j * self.rows]
    }

    /// Get access to a row of the data, as an iterator.
    pub fn get_row_iter(&self, row: usize) -> std::iter::StepBy<std::iter::Skip<std::slice::Iter<'a, T>>> {
        self.data.iter().skip(row).step_by(self.rows)
    }

    /// Get an entire column in the matrix.
    ///
    /// * `col` - The index of the column to get.
    pub fn get_col(&self, col: usize) -> &[T] {
        &self.data[col * self.rows..(col + 1) * self.rows]
    }
}

impl<'a, T> Matrix<'a, T>
where
    T: Copy,
{
    /// Get a row of the data as a vector.
    pub fn get_row(&self, row: usize) -> Vec<T> {
        self.get_row_iter(row).copied().collect()
    }
}

const MISSING_TOKENS: [&str; 4] = ["", "NA", "nan", "NaN"];

/// Student records: outcome, binary treatment and raw covariates.
///
/// Covariates are stored column-wise in the order of `covariate_names`.
/// A dataset is never mutated after construction; resamples and splits are
/// independent copies made through [`Dataset::subset`].
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub outcome: Vec<f64>,
    pub treatment: Vec<f64>,
    pub covariate_names: Vec<String>,
    pub covariates: Vec<Vec<f64>>,
}

impl Dataset {
    /// Create a dataset, validating lengths and that treatment is 0/1.
    pub fn new(
        outcome: Vec<f64>,
        treatment: Vec<f64>,
        covariate_names: Vec<String>,
        covariates: Vec<Vec<f64>>,
    ) -> Result<Self, AteError> {
        let n = outcome.len();
        if treatment.len() != n {
            return Err(AteError::LengthMismatch("treatment".to_string(), treatment.len(), n));
        }
        if covariate_names.len() != covariates.len() {
            return Err(AteError::LengthMismatch(
                "covariate_names".to_string(),
                covariate_names.len(),
                covariates.len(),
            ));
        }
        for (name, col) in covariate_names.iter().zip(covariates.iter()) {
            if col.len() != n {
                return Err(AteError::LengthMismatch(name.clone(), col.len(), n));
            }
        }
        if let Some((i, w)) = treatment.iter().enumerate().find(|(_, w)| **w != 0.0 && **w != 1.0) {
            return Err(AteError::InvalidValue("treatment".to_string(), w.to_string(), i + 1));
        }
        Ok(Dataset {
            outcome,
            treatment,
            covariate_names,
            covariates,
        })
    }

    /// Read a delimited file with a header row.
    ///
    /// Every column named in `columns` must be present; the first missing one
    /// is reported before any row is parsed. Rows with a missing outcome,
    /// treatment or covariate cell are dropped.
    pub fn from_csv<P: AsRef<Path>>(path: P, columns: &ColumnSpec, delimiter: u8) -> Result<Self, AteError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file), columns, delimiter)
    }

    pub fn from_reader<R: Read>(reader: R, columns: &ColumnSpec, delimiter: u8) -> Result<Self, AteError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .delimiter(delimiter)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        let position = |name: &str| {
            headers
                .iter()
                .position(|h| h == name)
                .ok_or_else(|| AteError::MissingColumn(name.to_string()))
        };
        let outcome_index = position(&columns.outcome)?;
        let treatment_index = position(&columns.treatment)?;
        let covariate_indices = columns
            .covariates
            .iter()
            .map(|c| position(&c.name))
            .collect::<Result<Vec<usize>, AteError>>()?;

        let mut outcome = Vec::new();
        let mut treatment = Vec::new();
        let mut covariates: Vec<Vec<f64>> = vec![Vec::new(); covariate_indices.len()];
        let mut dropped = 0;
        let mut row_values = vec![0.0; covariate_indices.len()];

        'rows: for (row, result) in csv_reader.records().enumerate() {
            let record = result?;
            // The header is line 1.
            let line = record.position().map_or(row + 2, |p| p.line() as usize);
            let Some(y) = parse_cell(&record[outcome_index], &columns.outcome, line)? else {
                dropped += 1;
                continue;
            };
            let Some(w) = parse_cell(&record[treatment_index], &columns.treatment, line)? else {
                dropped += 1;
                continue;
            };
            if w != 0.0 && w != 1.0 {
                return Err(AteError::InvalidValue(
                    columns.treatment.clone(),
                    record[treatment_index].to_string(),
                    line,
                ));
            }
            for (j, (&idx, cov)) in covariate_indices.iter().zip(columns.covariates.iter()).enumerate() {
                match parse_cell(&record[idx], &cov.name, line)? {
                    Some(v) => row_values[j] = v,
                    None => {
                        dropped += 1;
                        continue 'rows;
                    }
                }
            }
            outcome.push(y);
            treatment.push(w);
            for (col, v) in covariates.iter_mut().zip(row_values.iter()) {
                col.push(*v);
            }
        }

        if dropped > 0 {
            warn!("Dropped {} rows with missing values, {} rows retained.", dropped, outcome.len());
        }

        Dataset::new(outcome, treatment, columns.covariate_names(), covariates)
    }

    /// Write the dataset as a comma-delimited file, outcome and treatment first.
    pub fn write_csv<W: Write>(&self, writer: W, columns: &ColumnSpec) -> Result<(), AteError> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        let mut header = vec![columns.outcome.as_str(), columns.treatment.as_str()];
        header.extend(self.covariate_names.iter().map(|s| s.as_str()));
        csv_writer.write_record(&header)?;
        for i in 0..self.len() {
            let mut record = vec![self.outcome[i].to_string(), self.treatment[i].to_string()];
            record.extend(self.covariates.iter().map(|c| c[i].to_string()));
            csv_writer.write_record(&record)?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.outcome.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcome.is_empty()
    }

    pub fn n_treated(&self) -> usize {
        self.treatment.iter().filter(|w| **w == 1.0).count()
    }

    pub fn n_control(&self) -> usize {
        self.len() - self.n_treated()
    }

    /// Raw values of a covariate.
    pub fn covariate(&self, name: &str) -> Option<&[f64]> {
        self.covariate_names
            .iter()
            .position(|n| n == name)
            .map(|i| self.covariates[i].as_slice())
    }

    /// Copy the records at `indices` (repeats allowed) into a new dataset.
    pub fn subset(&self, indices: &[usize]) -> Dataset {
        let pick = |v: &[f64]| indices.iter().map(|&i| v[i]).collect::<Vec<f64>>();
        Dataset {
            outcome: pick(&self.outcome),
            treatment: pick(&self.treatment),
            covariate_names: self.covariate_names.clone(),
            covariates: self.covariates.iter().map(|c| pick(c)).collect(),
        }
    }

    /// Outcomes split into `(treated, control)`.
    pub fn outcomes_by_arm(&self) -> (Vec<f64>, Vec<f64>) {
        split_by_arm(&self.outcome, &self.treatment)
    }

    /// Covariate values split into `(treated, control)`.
    pub fn covariate_by_arm(&self, name: &str) -> Option<(Vec<f64>, Vec<f64>)> {
        self.covariate(name).map(|c| split_by_arm(c, &self.treatment))
    }
}

pub(crate) fn split_by_arm(values: &[f64], treatment: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut treated = Vec::new();
    let mut control = Vec::new();
    for (v, w) in values.iter().zip(treatment) {
        if *w == 1.0 {
            treated.push(*v);
        } else {
            control.push(*v);
        }
    }
    (treated, control)
}

fn parse_cell(raw: &str, column: &str, line: usize) -> Result<Option<f64>, AteError> {
    if MISSING_TOKENS.contains(&raw) {
        return Ok(None);
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        Ok(_) => Ok(None),
        Err(_) => Err(AteError::InvalidValue(column.to_string(), raw.to_string(), line)),
    }
}
