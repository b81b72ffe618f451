//! Triplet lists: the accumulate phase of sparse assembly.
//!
//! A [`TripletList`] wraps a [`CooMatrix`] and checks every contribution
//! against the declared shape, reporting [`PolyMeshError::TripletOutOfBounds`]
//! where the bare COO matrix would panic. Entries sharing a `(row, col)` are
//! summed when the list is frozen into a [`CsrMatrix`] or densified.

use nalgebra::DMatrix;
use nalgebra_sparse::{CooMatrix, CsrMatrix};

use crate::mesh_error::PolyMeshError;

/// A single `(row, col, value)` contribution.
pub type Triplet = (usize, usize, f64);

/// Growable, shape-checked list of triplets.
#[derive(Clone, Debug, PartialEq)]
pub struct TripletList {
    coo: CooMatrix<f64>,
}

impl TripletList {
    /// Empty list for an `nrows x ncols` matrix.
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            coo: CooMatrix::new(nrows, ncols),
        }
    }

    /// Build from pre-collected entries, checking every one against the shape.
    pub fn from_entries<I>(nrows: usize, ncols: usize, entries: I) -> Result<Self, PolyMeshError>
    where
        I: IntoIterator<Item = Triplet>,
    {
        let mut list = Self::new(nrows, ncols);
        list.extend_checked(entries)?;
        Ok(list)
    }

    /// Push one contribution; fails if it lies outside the declared shape.
    pub fn try_push(&mut self, row: usize, col: usize, value: f64) -> Result<(), PolyMeshError> {
        if row >= self.nrows() || col >= self.ncols() {
            return Err(PolyMeshError::TripletOutOfBounds {
                row,
                col,
                nrows: self.nrows(),
                ncols: self.ncols(),
            });
        }
        self.coo.push(row, col, value);
        Ok(())
    }

    /// Append many contributions, checking each.
    pub fn extend_checked<I>(&mut self, entries: I) -> Result<(), PolyMeshError>
    where
        I: IntoIterator<Item = Triplet>,
    {
        for (row, col, value) in entries {
            self.try_push(row, col, value)?;
        }
        Ok(())
    }

    #[inline]
    pub fn nrows(&self) -> usize {
        self.coo.nrows()
    }

    #[inline]
    pub fn ncols(&self) -> usize {
        self.coo.ncols()
    }

    /// Number of contributions, duplicates counted separately.
    #[inline]
    pub fn len(&self) -> usize {
        self.coo.nnz()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Contributions in push order.
    pub fn iter(&self) -> impl Iterator<Item = Triplet> + '_ {
        self.coo.triplet_iter().map(|(r, c, &v)| (r, c, v))
    }

    pub fn as_coo(&self) -> &CooMatrix<f64> {
        &self.coo
    }

    /// Freeze into CSR, summing duplicates. Explicit zeros are kept.
    pub fn to_csr(&self) -> CsrMatrix<f64> {
        CsrMatrix::from(&self.coo)
    }

    /// Dense copy, summing duplicates.
    pub fn to_dense(&self) -> DMatrix<f64> {
        DMatrix::from(&self.coo)
    }
}
