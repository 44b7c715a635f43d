//! Encoding
//!
//! Turns raw covariates into a numeric design matrix. Categorical covariates
//! are expanded into indicator columns whose levels are fixed once, on the
//! full dataset, so that every resample shares the same design.
use crate::config::{ColumnSpec, CovariateKind};
use crate::data::{Dataset, Matrix};
use crate::errors::AteError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EncodedColumn {
    /// Copy of covariate `source` (index into the column spec).
    Numeric { source: usize },
    /// `1.0` where covariate `source` equals `level`.
    Indicator { source: usize, level: i64 },
}

/// Design column definitions derived from a [`ColumnSpec`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureEncoder {
    pub columns: Vec<EncodedColumn>,
    pub names: Vec<String>,
    source_names: Vec<String>,
}

impl FeatureEncoder {
    /// Fix the design columns from the levels observed in `data`.
    pub fn fit(spec: &ColumnSpec, data: &Dataset) -> Result<Self, AteError> {
        let mut columns = Vec::new();
        let mut names = Vec::new();
        let mut source_names = Vec::with_capacity(spec.covariates.len());

        for (source, covariate) in spec.covariates.iter().enumerate() {
            let values = data
                .covariate(&covariate.name)
                .ok_or_else(|| AteError::MissingColumn(covariate.name.clone()))?;
            source_names.push(covariate.name.clone());
            match covariate.kind {
                CovariateKind::Numeric => {
                    columns.push(EncodedColumn::Numeric { source });
                    names.push(covariate.name.clone());
                }
                CovariateKind::Categorical => {
                    let mut levels = Vec::new();
                    for (row, v) in values.iter().enumerate() {
                        if v.fract() != 0.0 {
                            return Err(AteError::InvalidValue(covariate.name.clone(), v.to_string(), row + 1));
                        }
                        levels.push(*v as i64);
                    }
                    levels.sort_unstable();
                    levels.dedup();
                    // The lowest level is the reference category.
                    for level in levels.into_iter().skip(1) {
                        columns.push(EncodedColumn::Indicator { source, level });
                        names.push(format!("{}[{}]", covariate.name, level));
                    }
                }
            }
        }

        Ok(FeatureEncoder {
            columns,
            names,
            source_names,
        })
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    /// Build the design matrix for `data`. Levels unseen at fit time encode as
    /// the reference category.
    pub fn transform(&self, data: &Dataset) -> Result<DesignMatrix, AteError> {
        let sources = self
            .source_names
            .iter()
            .map(|name| {
                data.covariate(name)
                    .ok_or_else(|| AteError::MissingColumn(name.clone()))
            })
            .collect::<Result<Vec<&[f64]>, AteError>>()?;

        let rows = data.len();
        let mut values = Vec::with_capacity(rows * self.columns.len());
        for column in self.columns.iter() {
            match column {
                EncodedColumn::Numeric { source } => {
                    values.extend_from_slice(sources[*source]);
                }
                EncodedColumn::Indicator { source, level } => {
                    values.extend(
                        sources[*source]
                            .iter()
                            .map(|v| if *v as i64 == *level { 1.0 } else { 0.0 }),
                    );
                }
            }
        }

        Ok(DesignMatrix {
            values,
            rows,
            cols: self.columns.len(),
            names: self.names.clone(),
        })
    }
}

/// Owned column-major design matrix with named columns.
#[derive(Debug, Clone, PartialEq)]
pub struct DesignMatrix {
    pub values: Vec<f64>,
    pub rows: usize,
    pub cols: usize,
    pub names: Vec<String>,
}

impl DesignMatrix {
    pub fn matrix(&self) -> Matrix<'_, f64> {
        Matrix::new(&self.values, self.rows, self.cols)
    }

    pub fn column(&self, col: usize) -> &[f64] {
        &self.values[col * self.rows..(col + 1) * self.rows]
    }

    /// Copy the rows at `indices` into a new matrix.
    pub fn select_rows(&self, indices: &[usize]) -> DesignMatrix {
        let mut values = Vec::with_capacity(indices.len() * self.cols);
        for col in 0..self.cols {
            let c = self.column(col);
            values.extend(indices.iter().map(|&i| c[i]));
        }
        DesignMatrix {
            values,
            rows: indices.len(),
            cols: self.cols,
            names: self.names.clone(),
        }
    }

    /// Prepend a column, used for the treatment indicator in regression adjustment.
    pub fn with_leading_column(&self, name: &str, column: &[f64]) -> DesignMatrix {
        let mut values = Vec::with_capacity(self.values.len() + self.rows);
        values.extend_from_slice(column);
        values.extend_from_slice(&self.values);
        let mut names = Vec::with_capacity(self.cols + 1);
        names.push(name.to_string());
        names.extend(self.names.iter().cloned());
        DesignMatrix {
            values,
            rows: self.rows,
            cols: self.cols + 1,
            names,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Covariate;

    fn spec() -> ColumnSpec {
        ColumnSpec {
            outcome: "Y".to_string(),
            treatment: "Z".to_string(),
            covariates: vec![
                Covariate::new("XC", CovariateKind::Categorical),
                Covariate::new("X1", CovariateKind::Numeric),
            ],
        }
    }

    fn data() -> Dataset {
        Dataset::new(
            vec![0.0; 4],
            vec![1.0, 0.0, 1.0, 0.0],
            vec!["X1".to_string(), "XC".to_string()],
            vec![vec![0.5, 1.5, 2.5, 3.5], vec![2.0, 0.0, 4.0, 2.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_one_hot_with_reference_level() {
        let data = data();
        let encoder = FeatureEncoder::fit(&spec(), &data).unwrap();
        assert_eq!(encoder.names, vec!["XC[2]", "XC[4]", "X1"]);
        let design = encoder.transform(&data).unwrap();
        assert_eq!(design.rows, 4);
        assert_eq!(design.cols, 3);
        assert_eq!(design.column(0), &[1.0, 0.0, 0.0, 1.0]);
        assert_eq!(design.column(1), &[0.0, 0.0, 1.0, 0.0]);
        assert_eq!(design.column(2), &[0.5, 1.5, 2.5, 3.5]);
    }

    #[test]
    fn test_resample_keeps_columns() {
        let data = data();
        let encoder = FeatureEncoder::fit(&spec(), &data).unwrap();
        // Resample without any level-4 record.
        let sub = data.subset(&[0, 0, 1]);
        let design = encoder.transform(&sub).unwrap();
        assert_eq!(design.cols, 3);
        assert_eq!(design.column(1), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_non_integer_category() {
        let data = Dataset::new(vec![0.0], vec![1.0], vec!["XC".to_string()], vec![vec![1.5]]).unwrap();
        let spec = ColumnSpec {
            outcome: "Y".to_string(),
            treatment: "Z".to_string(),
            covariates: vec![Covariate::new("XC", CovariateKind::Categorical)],
        };
        assert!(matches!(
            FeatureEncoder::fit(&spec, &data),
            Err(AteError::InvalidValue(..))
        ));
    }

    #[test]
    fn test_select_rows_and_leading_column() {
        let data = data();
        let design = FeatureEncoder::fit(&spec(), &data).unwrap().transform(&data).unwrap();
        let sub = design.select_rows(&[3, 1]);
        assert_eq!(sub.column(2), &[3.5, 1.5]);
        let with_w = sub.with_leading_column("Z", &[0.0, 1.0]);
        assert_eq!(with_w.cols, 4);
        assert_eq!(with_w.names[0], "Z");
        assert_eq!(with_w.column(0), &[0.0, 1.0]);
        assert_eq!(with_w.column(3), &[3.5, 1.5]);
    }
}
