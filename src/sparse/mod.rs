//! Sparse matrices: shape-checked triplet accumulation on top of
//! `nalgebra_sparse`, frozen into [`CsrMatrix`] for products.

pub mod csr;
pub mod triplet;

pub use nalgebra_sparse::CsrMatrix;
pub use triplet::{Triplet, TripletList};
