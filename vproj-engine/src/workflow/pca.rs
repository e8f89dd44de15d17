//! Three-component principal component analysis
//!
//! Columns are mean-centered, the sample covariance matrix is diagonalized
//! with cyclic Jacobi rotations, and every row is projected onto the three
//! eigenvectors with the largest eigenvalues. Inputs with fewer than three
//! dimensions produce zero-padded coordinates.
//!
//! Eigenvector signs are fixed so each component's largest-magnitude entry is
//! positive; identical input always yields identical output.

use crate::models::Coordinates;
use ndarray::{Array1, Array2, Axis};
use thiserror::Error;

const OUTPUT_COMPONENTS: usize = 3;
const MAX_SWEEPS: usize = 100;
const CONVERGENCE_EPSILON: f64 = 1e-12;

#[derive(Debug, Error, PartialEq)]
pub enum ProjectionError {
    #[error("Need at least {required} rows, got {rows}")]
    InsufficientRows { rows: usize, required: usize },

    #[error("No numeric dimensions to project")]
    NoNumericDimensions,

    #[error("Row {row} has {found} values, expected {expected}")]
    RaggedRows {
        row: usize,
        found: usize,
        expected: usize,
    },

    #[error("Input contains non-finite values")]
    NonFinite,
}

/// Project `rows` (one observation per row) onto their top three principal components
pub fn project_3d(rows: &[Vec<f64>]) -> Result<Vec<Coordinates>, ProjectionError> {
    let n = rows.len();
    if n == 0 {
        return Err(ProjectionError::InsufficientRows { rows: 0, required: 1 });
    }
    let d = rows[0].len();
    if d == 0 {
        return Err(ProjectionError::NoNumericDimensions);
    }
    if let Some((row, r)) = rows.iter().enumerate().find(|(_, r)| r.len() != d) {
        return Err(ProjectionError::RaggedRows {
            row,
            found: r.len(),
            expected: d,
        });
    }

    let mut data = Array2::<f64>::zeros((n, d));
    for (i, row) in rows.iter().enumerate() {
        for (j, value) in row.iter().enumerate() {
            if !value.is_finite() {
                return Err(ProjectionError::NonFinite);
            }
            data[[i, j]] = *value;
        }
    }

    let mean = data
        .mean_axis(Axis(0))
        .ok_or(ProjectionError::InsufficientRows { rows: n, required: 1 })?;
    let centered = &data - &mean;

    let denominator = (n.saturating_sub(1)).max(1) as f64;
    let covariance = centered.t().dot(&centered) / denominator;

    let (eigenvalues, eigenvectors) = jacobi_eigen(covariance);

    let mut order: Vec<usize> = (0..d).collect();
    order.sort_by(|a, b| eigenvalues[*b].total_cmp(&eigenvalues[*a]));

    let k = d.min(OUTPUT_COMPONENTS);
    let mut components = Array2::<f64>::zeros((d, k));
    for (out, &source) in order.iter().take(k).enumerate() {
        let mut column = eigenvectors.column(source).to_owned();
        orient(&mut column);
        components.column_mut(out).assign(&column);
    }

    let projected = centered.dot(&components);

    Ok(projected
        .outer_iter()
        .map(|row| {
            let mut coordinates = [0.0; OUTPUT_COMPONENTS];
            for (slot, value) in coordinates.iter_mut().zip(row.iter()) {
                *slot = *value;
            }
            coordinates
        })
        .collect())
}

/// Flip `v` so its largest-magnitude entry is positive
fn orient(v: &mut Array1<f64>) {
    let pivot = v
        .iter()
        .copied()
        .fold(0.0_f64, |best, x| if x.abs() > best.abs() { x } else { best });
    if pivot < 0.0 {
        v.mapv_inplace(|x| -x);
    }
}

/// Eigen-decomposition of a symmetric matrix
///
/// Returns eigenvalues and a matrix whose columns are the matching unit
/// eigenvectors.
fn jacobi_eigen(mut a: Array2<f64>) -> (Array1<f64>, Array2<f64>) {
    let n = a.nrows();
    let mut v = Array2::<f64>::eye(n);

    let scale = a.iter().map(|x| x * x).sum::<f64>().sqrt();
    if scale == 0.0 {
        return (a.diag().to_owned(), v);
    }

    for _ in 0..MAX_SWEEPS {
        let off_diagonal = off_diagonal_norm(&a);
        if off_diagonal <= CONVERGENCE_EPSILON * scale {
            break;
        }

        for p in 0..n {
            for q in (p + 1)..n {
                let apq = a[[p, q]];
                if apq == 0.0 {
                    continue;
                }

                let theta = (a[[q, q]] - a[[p, p]]) / (2.0 * apq);
                let t = theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt());
                let c = 1.0 / (t * t + 1.0).sqrt();
                let s = t * c;

                for k in 0..n {
                    let akp = a[[k, p]];
                    let akq = a[[k, q]];
                    a[[k, p]] = c * akp - s * akq;
                    a[[k, q]] = s * akp + c * akq;
                }
                for k in 0..n {
                    let apk = a[[p, k]];
                    let aqk = a[[q, k]];
                    a[[p, k]] = c * apk - s * aqk;
                    a[[q, k]] = s * apk + c * aqk;
                }
                for k in 0..n {
                    let vkp = v[[k, p]];
                    let vkq = v[[k, q]];
                    v[[k, p]] = c * vkp - s * vkq;
                    v[[k, q]] = s * vkp + c * vkq;
                }
            }
        }
    }

    (a.diag().to_owned(), v)
}

fn off_diagonal_norm(a: &Array2<f64>) -> f64 {
    a.indexed_iter()
        .filter(|((i, j), _)| i != j)
        .map(|(_, x)| x * x)
        .sum::<f64>()
        .sqrt()
}
