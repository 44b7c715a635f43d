//! Linear Algebra
//!
//! Small dense routines for the normal equations of the regression models.
//! Matrices are square and row-major (`Vec<Vec<f64>>`), sized by the number
//! of model parameters rather than the number of records.
use crate::constants::PIVOT_EPS;
use crate::data::Matrix;
use crate::errors::AteError;

/// Gram matrix `X'WX` of `[1, X]` with optional per-row weights.
pub fn gram(x: &Matrix<f64>, weights: Option<&[f64]>) -> Vec<Vec<f64>> {
    let k = x.cols + 1;
    let ones = vec![1.0; x.rows];
    let columns: Vec<&[f64]> = std::iter::once(ones.as_slice())
        .chain((0..x.cols).map(|j| x.get_col(j)))
        .collect();
    let mut g = vec![vec![0.0; k]; k];
    for a in 0..k {
        let weighted: Vec<f64> = match weights {
            Some(w) => columns[a].iter().zip(w).map(|(v, w)| v * w).collect(),
            None => columns[a].to_vec(),
        };
        for b in a..k {
            let s: f64 = weighted.iter().zip(columns[b]).map(|(va, vb)| va * vb).sum();
            g[a][b] = s;
            g[b][a] = s;
        }
    }
    g
}

/// `[1, X]'v`.
pub fn cross(x: &Matrix<f64>, v: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(x.cols + 1);
    out.push(v.iter().sum());
    for j in 0..x.cols {
        out.push(x.get_col(j).iter().zip(v).map(|(a, b)| a * b).sum());
    }
    out
}

/// Linear predictor `b0 + X b` for every row.
pub fn linear_predictor(x: &Matrix<f64>, intercept: f64, coefficients: &[f64]) -> Vec<f64> {
    let mut eta = vec![intercept; x.rows];
    for (j, b) in coefficients.iter().enumerate() {
        for (e, v) in eta.iter_mut().zip(x.get_col(j)) {
            *e += b * v;
        }
    }
    eta
}

/// Add `penalty` to every diagonal entry except the intercept.
pub fn add_ridge(a: &mut [Vec<f64>], penalty: f64) {
    for (i, row) in a.iter_mut().enumerate().skip(1) {
        row[i] += penalty;
    }
}

/// Invert a square matrix by Gauss-Jordan elimination with partial pivoting.
pub fn invert(a: &[Vec<f64>]) -> Result<Vec<Vec<f64>>, AteError> {
    let n = a.len();
    let mut aug: Vec<Vec<f64>> = a
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let mut r = Vec::with_capacity(2 * n);
            r.extend_from_slice(row);
            r.extend((0..n).map(|j| if i == j { 1.0 } else { 0.0 }));
            r
        })
        .collect();
    eliminate(&mut aug, n)?;
    Ok(aug.into_iter().map(|r| r[n..].to_vec()).collect())
}

/// Solve `a x = b`.
pub fn solve(a: &[Vec<f64>], b: &[f64]) -> Result<Vec<f64>, AteError> {
    let n = a.len();
    let mut aug: Vec<Vec<f64>> = a
        .iter()
        .zip(b)
        .map(|(row, bi)| {
            let mut r = Vec::with_capacity(n + 1);
            r.extend_from_slice(row);
            r.push(*bi);
            r
        })
        .collect();
    eliminate(&mut aug, n)?;
    Ok(aug.into_iter().map(|r| r[n]).collect())
}

// Reduce the left n x n block of `aug` to the identity.
fn eliminate(aug: &mut [Vec<f64>], n: usize) -> Result<(), AteError> {
    let width = aug.first().map_or(0, |r| r.len());
    for col in 0..n {
        let (max_row, max_val) = (col..n)
            .map(|r| (r, aug[r][col].abs()))
            .fold((col, -1.0), |best, cur| if cur.1 > best.1 { cur } else { best });
        if max_val.is_nan() || max_val <= PIVOT_EPS {
            return Err(AteError::SingularMatrix(col, max_val));
        }
        aug.swap(col, max_row);

        let pivot = aug[col][col];
        for j in 0..width {
            aug[col][j] /= pivot;
        }
        let pivot_row = aug[col].clone();
        for (row, r) in aug.iter_mut().enumerate() {
            if row != col {
                let factor = r[col];
                if factor != 0.0 {
                    for (v, p) in r.iter_mut().zip(pivot_row.iter()) {
                        *v -= factor * p;
                    }
                }
            }
        }
    }
    Ok(())
}
