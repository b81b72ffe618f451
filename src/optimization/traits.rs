//! Iteration contract between a constrained nonlinear least-squares driver
//! and a problem definition.
//!
//! A driver minimises `‖f(x)‖²` subject to `c(x) = 0`. Each iteration it
//! asks the problem to refresh `f`, its Jacobian and `c` at the current
//! iterate, reads them back through the accessors, and brackets the step
//! with the lifecycle hooks:
//!
//! ```text
//! initial_solution
//! loop { pre_iteration, update_energy, update_jacobian, update_constraints,
//!        <step>, post_iteration }
//! post_optimization
//! ```

use nalgebra::DVector;
use nalgebra_sparse::CsrMatrix;

use crate::mesh_error::PolyMeshError;

/// Whether the driver should keep iterating after a step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IterationControl {
    Continue,
    Stop,
}

/// NaN entries found while refreshing energy or Jacobian values.
///
/// Indices refer to the energy vector and to the stored entries of the
/// Jacobian respectively. A NaN does not abort the iteration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NumericalDiagnostics {
    pub nan_energy: Vec<usize>,
    pub nan_jacobian: Vec<usize>,
}

impl NumericalDiagnostics {
    /// True when no NaN was flagged.
    pub fn is_healthy(&self) -> bool {
        self.nan_energy.is_empty() && self.nan_jacobian.is_empty()
    }

    /// Append the flags of `other`.
    pub fn merge(&mut self, other: NumericalDiagnostics) {
        self.nan_energy.extend(other.nan_energy);
        self.nan_jacobian.extend(other.nan_jacobian);
    }

    /// Scan energy values, logging and recording every NaN.
    pub(crate) fn scan_energy(values: impl IntoIterator<Item = f64>) -> Self {
        let nan_energy = values
            .into_iter()
            .enumerate()
            .filter(|(_, v)| v.is_nan())
            .map(|(i, _)| i)
            .inspect(|i| log::warn!("nan in energy vector entry {i}"))
            .collect();
        Self {
            nan_energy,
            nan_jacobian: Vec::new(),
        }
    }

    /// Scan Jacobian values, logging and recording every NaN.
    pub(crate) fn scan_jacobian(values: impl IntoIterator<Item = f64>) -> Self {
        let nan_jacobian = values
            .into_iter()
            .enumerate()
            .filter(|(_, v)| v.is_nan())
            .map(|(i, _)| i)
            .inspect(|i| log::warn!("nan in energy jacobian entry {i}"))
            .collect();
        Self {
            nan_energy: Vec::new(),
            nan_jacobian,
        }
    }
}

/// Problem side of a constrained nonlinear least-squares solve.
pub trait ConstrainedLeastSquares {
    /// Length of the unknown vector.
    fn x_size(&self) -> usize;

    /// Starting iterate.
    fn initial_solution(&self) -> DVector<f64>;

    /// Called before every iteration with the previous iterate.
    fn pre_iteration(&mut self, _prev_x: &DVector<f64>) {}

    /// Recompute the energy vector at `x`.
    fn update_energy(&mut self, x: &DVector<f64>) -> Result<NumericalDiagnostics, PolyMeshError>;

    /// Recompute the energy Jacobian values at `x`.
    fn update_jacobian(&mut self, x: &DVector<f64>) -> Result<NumericalDiagnostics, PolyMeshError>;

    /// Recompute the constraint vector at `x`.
    fn update_constraints(&mut self, x: &DVector<f64>) -> Result<(), PolyMeshError>;

    /// Current energy vector `f`.
    fn energy(&self) -> &DVector<f64>;

    /// Current energy Jacobian `∂f/∂x`.
    fn energy_jacobian(&self) -> &CsrMatrix<f64>;

    /// Current constraint vector `c`.
    fn constraints(&self) -> &DVector<f64>;

    /// Current constraint Jacobian `∂c/∂x`.
    fn constraint_jacobian(&self) -> &CsrMatrix<f64>;

    /// Called after every accepted step.
    fn post_iteration(&mut self, _x: &DVector<f64>) -> IterationControl {
        IterationControl::Continue
    }

    /// Called once with the final iterate; returns whether the result is usable.
    fn post_optimization(&mut self, x: &DVector<f64>) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scans_flag_nan_indices() {
        let energy = NumericalDiagnostics::scan_energy([1.0, f64::NAN, 0.0, f64::NAN]);
        assert_eq!(energy.nan_energy, vec![1, 3]);
        assert!(!energy.is_healthy());

        let mut merged = NumericalDiagnostics::scan_jacobian([0.0, 2.0]);
        assert!(merged.is_healthy());
        merged.merge(energy);
        assert_eq!(merged.nan_energy, vec![1, 3]);
        assert!(merged.nan_jacobian.is_empty());
    }
}
