//! Constrained nonlinear least-squares problems over mesh unknowns.

pub mod offset;
pub mod traits;

pub use offset::{OffsetType, VertexOffset, offset_objective};
pub use traits::{ConstrainedLeastSquares, IterationControl, NumericalDiagnostics};
