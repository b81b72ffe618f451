//! Approximate constant-distance offset meshes (a discrete Gauss map).
//!
//! The offset keeps every edge exactly parallel to its original through the
//! linear constraints `v'1 - v'0 - s_e (v1 - v0) = 0`, with one free scale
//! `s_e` per edge, and drives a distance measure towards `d` through the
//! energy. Unknown layout: `3 * vertices` coordinates, then `edges` scales.
//!
//! Only the vertex variant has an energy (`‖v - v_orig‖² - d²` per vertex);
//! requesting an edge or face offset fails at construction.

use nalgebra::{DVector, Point3};
use nalgebra_sparse::CsrMatrix;
use serde::{Deserialize, Serialize};

use crate::algs::assembly::{offset_constraints, offset_num_vars};
use crate::mesh_error::PolyMeshError;
use crate::optimization::traits::{ConstrainedLeastSquares, IterationControl, NumericalDiagnostics};
use crate::sparse::csr::mul_vec;
use crate::sparse::triplet::TripletList;
use crate::topology::polymesh::PolyMesh;

/// Which mesh element is held at the offset distance.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OffsetType {
    Vertex,
    Edge,
    Face,
}

/// Build the offset objective for `offset_type`.
///
/// ```rust
/// use nalgebra::Point3;
/// use polymesh_deform::optimization::offset::{OffsetType, offset_objective};
/// use polymesh_deform::optimization::traits::ConstrainedLeastSquares;
/// use polymesh_deform::topology::polymesh::PolyMesh;
///
/// let mesh = PolyMesh::from_faces(
///     vec![
///         Point3::new(0.0, 0.0, 0.0),
///         Point3::new(1.0, 0.0, 0.0),
///         Point3::new(0.0, 1.0, 0.0),
///     ],
///     vec![vec![0, 1, 2]],
/// )?;
/// let objective = offset_objective(&mesh, OffsetType::Vertex, 0.1)?;
/// assert_eq!(objective.x_size(), 3 * 3 + 3);
/// assert!(offset_objective(&mesh, OffsetType::Face, 0.1).is_err());
/// # Ok::<(), polymesh_deform::mesh_error::PolyMeshError>(())
/// ```
pub fn offset_objective(
    mesh: &PolyMesh,
    offset_type: OffsetType,
    distance: f64,
) -> Result<Box<dyn ConstrainedLeastSquares + Send>, PolyMeshError> {
    match offset_type {
        OffsetType::Vertex => Ok(Box::new(VertexOffset::new(mesh, distance)?)),
        OffsetType::Edge | OffsetType::Face => {
            Err(PolyMeshError::UnsupportedOffsetType(offset_type))
        }
    }
}

/// Offset objective holding every vertex at distance `d` from its original.
#[derive(Clone, Debug)]
pub struct VertexOffset {
    mesh: PolyMesh,
    distance: f64,
    x_size: usize,
    /// Also the constant constraint Jacobian: the constraints are linear in `x`.
    offset_constraint_matrix: CsrMatrix<f64>,
    constraint_values: DVector<f64>,
    energy_values: DVector<f64>,
    /// Row `v`, columns `3v..3v+3`; values refreshed per iteration.
    energy_jacobian: CsrMatrix<f64>,
    final_vertices: Vec<Point3<f64>>,
}

impl VertexOffset {
    pub fn new(mesh: &PolyMesh, distance: f64) -> Result<Self, PolyMeshError> {
        if !distance.is_finite() || distance < 0.0 {
            return Err(PolyMeshError::InvalidOffsetDistance(distance));
        }
        let x_size = offset_num_vars(mesh);
        let offset_constraint_matrix = offset_constraints(mesh)?.to_csr();

        let n = mesh.vertex_count();
        let pattern = (0..n).flat_map(|v| (0..3).map(move |j| (v, 3 * v + j, 0.0)));
        let energy_jacobian = TripletList::from_entries(n, x_size, pattern)?.to_csr();

        log::debug!(
            "vertex offset: {} unknowns, {} energy rows, {} constraint rows, d = {distance}",
            x_size,
            n,
            offset_constraint_matrix.nrows()
        );

        Ok(Self {
            mesh: mesh.clone(),
            distance,
            x_size,
            constraint_values: DVector::zeros(offset_constraint_matrix.nrows()),
            offset_constraint_matrix,
            energy_values: DVector::zeros(n),
            energy_jacobian,
            final_vertices: Vec::new(),
        })
    }

    /// Requested offset distance `d`.
    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn mesh(&self) -> &PolyMesh {
        &self.mesh
    }

    /// The linear edge-parallelism constraint matrix.
    pub fn offset_constraint_matrix(&self) -> &CsrMatrix<f64> {
        &self.offset_constraint_matrix
    }

    /// Offset vertex positions; empty until `post_optimization` has run.
    pub fn final_vertices(&self) -> &[Point3<f64>] {
        &self.final_vertices
    }

    fn check_len(&self, x: &DVector<f64>) -> Result<(), PolyMeshError> {
        if x.len() != self.x_size {
            return Err(PolyMeshError::DimensionMismatch {
                what: "offset unknown vector",
                expected: self.x_size,
                found: x.len(),
            });
        }
        Ok(())
    }

    fn current_vertex(x: &DVector<f64>, v: usize) -> Point3<f64> {
        Point3::new(x[3 * v], x[3 * v + 1], x[3 * v + 2])
    }
}

impl ConstrainedLeastSquares for VertexOffset {
    fn x_size(&self) -> usize {
        self.x_size
    }

    /// Original positions, zero edge scales.
    fn initial_solution(&self) -> DVector<f64> {
        let mut x0 = DVector::zeros(self.x_size);
        for (v, p) in self.mesh.vertices().iter().enumerate() {
            for j in 0..3 {
                x0[3 * v + j] = p[j];
            }
        }
        x0
    }

    fn pre_iteration(&mut self, _prev_x: &DVector<f64>) {}

    fn update_energy(&mut self, x: &DVector<f64>) -> Result<NumericalDiagnostics, PolyMeshError> {
        self.check_len(x)?;
        let d2 = self.distance * self.distance;
        for (v, orig) in self.mesh.vertices().iter().enumerate() {
            self.energy_values[v] = (Self::current_vertex(x, v) - orig).norm_squared() - d2;
        }
        Ok(NumericalDiagnostics::scan_energy(
            self.energy_values.iter().copied(),
        ))
    }

    fn update_jacobian(&mut self, x: &DVector<f64>) -> Result<NumericalDiagnostics, PolyMeshError> {
        self.check_len(x)?;
        let orig = self.mesh.vertices();
        // stored entry 3v + j is column 3v + j of row v
        for (slot, value) in self.energy_jacobian.values_mut().iter_mut().enumerate() {
            let (v, j) = (slot / 3, slot % 3);
            *value = 2.0 * (x[slot] - orig[v][j]);
        }
        Ok(NumericalDiagnostics::scan_jacobian(
            self.energy_jacobian.values().iter().copied(),
        ))
    }

    fn update_constraints(&mut self, x: &DVector<f64>) -> Result<(), PolyMeshError> {
        self.check_len(x)?;
        self.constraint_values = mul_vec(&self.offset_constraint_matrix, x)?;
        Ok(())
    }

    fn energy(&self) -> &DVector<f64> {
        &self.energy_values
    }

    fn energy_jacobian(&self) -> &CsrMatrix<f64> {
        &self.energy_jacobian
    }

    fn constraints(&self) -> &DVector<f64> {
        &self.constraint_values
    }

    fn constraint_jacobian(&self) -> &CsrMatrix<f64> {
        &self.offset_constraint_matrix
    }

    fn post_iteration(&mut self, _x: &DVector<f64>) -> IterationControl {
        IterationControl::Continue
    }

    fn post_optimization(&mut self, x: &DVector<f64>) -> bool {
        if x.len() != self.x_size {
            log::warn!(
                "offset result has {} unknowns, expected {}; keeping previous vertices",
                x.len(),
                self.x_size
            );
            return false;
        }
        self.final_vertices = (0..self.mesh.vertex_count())
            .map(|v| Self::current_vertex(x, v))
            .collect();
        true
    }
}
