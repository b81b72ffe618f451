//! Shape-checked products on [`CsrMatrix`].
//!
//! The operators of `nalgebra_sparse` panic on mismatched shapes; these
//! wrappers report [`PolyMeshError::DimensionMismatch`] instead.

use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;

use crate::mesh_error::PolyMeshError;

fn check(what: &'static str, expected: usize, found: usize) -> Result<(), PolyMeshError> {
    if expected != found {
        return Err(PolyMeshError::DimensionMismatch {
            what,
            expected,
            found,
        });
    }
    Ok(())
}

/// `A * x`.
pub fn mul_vec(a: &CsrMatrix<f64>, x: &DVector<f64>) -> Result<DVector<f64>, PolyMeshError> {
    check("matrix-vector product", a.ncols(), x.len())?;
    Ok(a * x)
}

/// `Aᵀ * y`.
pub fn transpose_mul_vec(
    a: &CsrMatrix<f64>,
    y: &DVector<f64>,
) -> Result<DVector<f64>, PolyMeshError> {
    check("transposed matrix-vector product", a.nrows(), y.len())?;
    Ok(&a.transpose() * y)
}

/// Sparse `Aᵀ · diag(row_weights) · A`.
pub fn weighted_gram(
    a: &CsrMatrix<f64>,
    row_weights: &[f64],
) -> Result<CsrMatrix<f64>, PolyMeshError> {
    check("row weights", a.nrows(), row_weights.len())?;
    let mut weighted = a.clone();
    for (mut row, &w) in weighted.row_iter_mut().zip(row_weights) {
        for v in row.values_mut() {
            *v *= w;
        }
    }
    Ok(&a.transpose() * &weighted)
}
