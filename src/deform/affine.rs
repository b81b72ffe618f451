//! Polyhedral mesh deformation with a single affine map per face.
//!
//! # Model
//! Each spatial dimension `c` is solved separately over the layout of
//! [`crate::algs::assembly`]: the `c`-th row of every face's affine map,
//! followed by the `c`-th coordinate of every vertex. The energy
//!
//! ```text
//! ‖W^½ (E x − b_c)‖²
//! ```
//!
//! prescribes the identity row `b_c` on every face (weight 1) and penalises
//! differences between the maps of faces adjacent across an interior edge
//! (weight `bend_factor`). The continuity constraints `C x = 0` tie every
//! face's map to the displacement of its edges, and handle vertices are fixed.
//!
//! The system is factorized once in [`affine_maps_precompute`]; every
//! [`affine_maps_deform`] call is one global, non-iterative solve per
//! dimension against new handle positions.

use nalgebra::{DMatrix, DVector, Matrix3, Point3};
use serde::{Deserialize, Serialize};

use crate::algs::assembly::{affine_vertex_column, assemble_affine_system};
use crate::mesh_error::PolyMeshError;
use crate::solver::min_quad::{FixedQuadraticSolver, MinQuadParams, MinQuadWithFixed};
use crate::sparse::CsrMatrix;
use crate::sparse::csr::{mul_vec, transpose_mul_vec, weighted_gram};
use crate::topology::polymesh::PolyMesh;

/// Deformation energy class.
///
/// Both variants currently assemble the same system; the tag is kept on the
/// precomputed data as an extension point.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AffineEnergyType {
    /// As-rigid-as-possible.
    #[default]
    Arap,
    /// As-similar-as-possible (conformal).
    Asap,
}

/// Parameters of the affine deformation system.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AffineDeformParams {
    pub energy_type: AffineEnergyType,
    /// Relative weight of the bending rows against the identity prescription.
    pub bend_factor: f64,
    /// Handed to the solver backend at precompute time.
    pub solver: MinQuadParams,
}

impl Default for AffineDeformParams {
    fn default() -> Self {
        Self {
            energy_type: AffineEnergyType::Arap,
            bend_factor: 1.0,
            solver: MinQuadParams::default(),
        }
    }
}

/// Precomputed affine deformation system.
#[derive(Clone, Debug)]
pub struct AffineData<S = MinQuadWithFixed> {
    /// Energy matrix `E`.
    energy: CsrMatrix<f64>,
    /// Continuity constraint matrix `C`.
    constraints: CsrMatrix<f64>,
    /// Per-row weights of `E`.
    row_weights: Vec<f64>,
    solver: S,
    energy_type: AffineEnergyType,
    bend_factor: f64,
    face_count: usize,
    vertex_count: usize,
    handles: Vec<usize>,
}

impl<S> AffineData<S> {
    pub fn energy_matrix(&self) -> &CsrMatrix<f64> {
        &self.energy
    }

    pub fn constraint_matrix(&self) -> &CsrMatrix<f64> {
        &self.constraints
    }

    pub fn energy_type(&self) -> AffineEnergyType {
        self.energy_type
    }

    pub fn bend_factor(&self) -> f64 {
        self.bend_factor
    }

    pub fn face_count(&self) -> usize {
        self.face_count
    }

    pub fn vertex_count(&self) -> usize {
        self.vertex_count
    }

    /// Handle vertex indices, in the order handle positions must be given.
    pub fn handles(&self) -> &[usize] {
        &self.handles
    }

    /// Identity target of the energy rows for spatial dimension `dim`.
    fn energy_target(&self, dim: usize) -> DVector<f64> {
        let identity_rows = 3 * self.face_count;
        DVector::from_fn(self.energy.nrows(), |row, _| {
            if row < identity_rows && row % 3 == dim {
                1.0
            } else {
                0.0
            }
        })
    }

    /// Weighted energy `Σ w_r (E x − b)_r²` of one spatial dimension.
    pub fn dimension_energy(&self, dim: usize, x: &DVector<f64>) -> Result<f64, PolyMeshError> {
        let residual = mul_vec(&self.energy, x)? - self.energy_target(dim);
        Ok(residual
            .iter()
            .zip(&self.row_weights)
            .map(|(r, w)| w * r * r)
            .sum())
    }
}

/// Per-face affine maps and vertex positions from one deformation solve.
#[derive(Clone, Debug, PartialEq)]
pub struct AffineSolution {
    /// `3 * faces` by 3: column `c` holds row `c` of every face's map,
    /// stacked three entries per face.
    pub affine_maps: DMatrix<f64>,
    /// `vertices` by 3, handles included.
    pub positions: DMatrix<f64>,
}

impl AffineSolution {
    /// The 3x3 affine map of `face`.
    pub fn affine_map(&self, face: usize) -> Matrix3<f64> {
        Matrix3::from_fn(|row, col| self.affine_maps[(3 * face + col, row)])
    }

    pub fn vertex(&self, vertex: usize) -> Point3<f64> {
        Point3::new(
            self.positions[(vertex, 0)],
            self.positions[(vertex, 1)],
            self.positions[(vertex, 2)],
        )
    }

    pub fn vertices(&self) -> Vec<Point3<f64>> {
        (0..self.positions.nrows()).map(|v| self.vertex(v)).collect()
    }

    /// Unknown vector of spatial dimension `dim` in the assembly layout,
    /// as accepted by [`AffineData::dimension_energy`].
    pub fn dimension_unknowns(&self, dim: usize) -> DVector<f64> {
        let maps = self.affine_maps.column(dim);
        let positions = self.positions.column(dim);
        DVector::from_iterator(
            maps.len() + positions.len(),
            maps.iter().chain(positions.iter()).copied(),
        )
    }
}

/// Assemble `E` and `C` for `mesh` and factorize them with the default solver.
///
/// Fails on invalid handles or bend factor, and propagates the solver's
/// error when the handles do not determine every unknown (e.g. a connected
/// component without a handle).
pub fn affine_maps_precompute(
    mesh: &PolyMesh,
    handles: &[usize],
    params: AffineDeformParams,
) -> Result<AffineData, PolyMeshError> {
    affine_maps_precompute_with(mesh, handles, params)
}

/// [`affine_maps_precompute`] with an explicit solver backend.
pub fn affine_maps_precompute_with<S: FixedQuadraticSolver>(
    mesh: &PolyMesh,
    handles: &[usize],
    params: AffineDeformParams,
) -> Result<AffineData<S>, PolyMeshError> {
    if !params.bend_factor.is_finite() || params.bend_factor < 0.0 {
        return Err(PolyMeshError::InvalidBendFactor(params.bend_factor));
    }
    let mut seen = vec![false; mesh.vertex_count()];
    for &h in handles {
        if h >= mesh.vertex_count() {
            return Err(PolyMeshError::HandleOutOfBounds {
                vertex: h,
                vertex_count: mesh.vertex_count(),
            });
        }
        if std::mem::replace(&mut seen[h], true) {
            return Err(PolyMeshError::DuplicateHandle(h));
        }
    }

    let system = assemble_affine_system(mesh)?;
    let energy = system.energy.to_csr();
    let constraints = system.constraints.to_csr();
    let row_weights: Vec<f64> = (0..energy.nrows())
        .map(|row| {
            if row < system.identity_rows {
                1.0
            } else {
                params.bend_factor
            }
        })
        .collect();

    let known: Vec<usize> = handles
        .iter()
        .map(|&h| affine_vertex_column(mesh, h))
        .collect();
    let quadratic = weighted_gram(&energy, &row_weights)?;
    log::debug!(
        "affine precompute: {} unknowns, {} energy rows ({} bending), {} constraint rows, {} handles",
        system.num_vars,
        energy.nrows(),
        system.bending_rows(),
        constraints.nrows(),
        handles.len()
    );
    let solver = S::precompute(&quadratic, &known, &constraints, &params.solver)?;

    Ok(AffineData {
        energy,
        constraints,
        row_weights,
        solver,
        energy_type: params.energy_type,
        bend_factor: params.bend_factor,
        face_count: mesh.face_count(),
        vertex_count: mesh.vertex_count(),
        handles: handles.to_vec(),
    })
}

/// Solve the precomputed system for new handle positions.
///
/// `handle_positions[i]` is the target of `data.handles()[i]`. The initial
/// guess is checked for shape but not used: the solve is global and
/// non-iterative.
pub fn affine_maps_deform<S: FixedQuadraticSolver>(
    data: &AffineData<S>,
    handle_positions: &[Point3<f64>],
    initial_guess: &[Point3<f64>],
) -> Result<AffineSolution, PolyMeshError> {
    if handle_positions.len() != data.handles.len() {
        return Err(PolyMeshError::HandleCountMismatch {
            expected: data.handles.len(),
            found: handle_positions.len(),
        });
    }
    if initial_guess.len() != data.vertex_count {
        return Err(PolyMeshError::DimensionMismatch {
            what: "initial guess",
            expected: data.vertex_count,
            found: initial_guess.len(),
        });
    }
    log::trace!("affine deform: initial guess ignored by the global solve");

    let affine_rows = 3 * data.face_count;
    let zero_rhs = DVector::zeros(data.constraints.nrows());
    let mut affine_maps = DMatrix::zeros(affine_rows, 3);
    let mut positions = DMatrix::zeros(data.vertex_count, 3);

    for dim in 0..3 {
        let weighted_target = DVector::from_iterator(
            data.row_weights.len(),
            data.energy_target(dim)
                .iter()
                .zip(&data.row_weights)
                .map(|(b, w)| b * w),
        );
        let linear = -transpose_mul_vec(&data.energy, &weighted_target)?;
        let known_values = DVector::from_iterator(
            handle_positions.len(),
            handle_positions.iter().map(|p| p[dim]),
        );
        let x = data.solver.solve(&linear, &known_values, &zero_rhs)?;

        for row in 0..affine_rows {
            affine_maps[(row, dim)] = x[row];
        }
        for v in 0..data.vertex_count {
            positions[(v, dim)] = x[affine_rows + v];
        }
    }

    Ok(AffineSolution {
        affine_maps,
        positions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn triangle() -> PolyMesh {
        PolyMesh::from_faces(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            vec![vec![0, 1, 2]],
        )
        .unwrap()
    }

    #[test]
    fn rejects_bad_handles_and_bend_factor() {
        let mesh = triangle();
        let params = AffineDeformParams::default();
        assert_eq!(
            affine_maps_precompute(&mesh, &[0, 0], params).unwrap_err(),
            PolyMeshError::DuplicateHandle(0)
        );
        assert!(matches!(
            affine_maps_precompute(&mesh, &[9], params),
            Err(PolyMeshError::HandleOutOfBounds { vertex: 9, .. })
        ));
        let bad = AffineDeformParams {
            bend_factor: -1.0,
            ..params
        };
        assert_eq!(
            affine_maps_precompute(&mesh, &[0], bad).unwrap_err(),
            PolyMeshError::InvalidBendFactor(-1.0)
        );
    }

    #[test]
    fn no_handles_leaves_translation_free() {
        let mesh = triangle();
        let err = affine_maps_precompute(&mesh, &[], AffineDeformParams::default()).unwrap_err();
        assert!(matches!(err, PolyMeshError::RankDeficientSystem { .. }));
    }

    #[test]
    fn fixed_handles_reproduce_rest_pose() {
        let mesh = triangle();
        let data = affine_maps_precompute(&mesh, &[0], AffineDeformParams::default()).unwrap();
        assert_eq!(data.energy_type(), AffineEnergyType::Arap);
        let sol = affine_maps_deform(&data, &[mesh.vertices()[0]], mesh.vertices()).unwrap();
        assert_relative_eq!(sol.affine_map(0), Matrix3::identity(), epsilon = 1e-9);
        for (v, p) in mesh.vertices().iter().enumerate() {
            assert_relative_eq!(sol.vertex(v), *p, epsilon = 1e-9);
        }
    }

    #[test]
    fn deform_checks_input_shapes() {
        let mesh = triangle();
        let data = affine_maps_precompute(&mesh, &[0], AffineDeformParams::default()).unwrap();
        assert_eq!(
            affine_maps_deform(&data, &[], mesh.vertices()).unwrap_err(),
            PolyMeshError::HandleCountMismatch {
                expected: 1,
                found: 0
            }
        );
        assert!(affine_maps_deform(&data, &[Point3::origin()], &[]).is_err());
    }

    #[test]
    fn solver_params_reach_the_backend() {
        let mesh = triangle();
        let strict = AffineDeformParams {
            solver: MinQuadParams {
                rank_tolerance: 1.0,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            affine_maps_precompute(&mesh, &[0], strict),
            Err(PolyMeshError::RankDeficientSystem { rank: 0, .. })
        ));
    }

    #[test]
    fn params_round_trip_through_json() {
        let params = AffineDeformParams {
            energy_type: AffineEnergyType::Asap,
            bend_factor: 0.25,
            solver: MinQuadParams {
                rank_tolerance: 1e-8,
                ..Default::default()
            },
        };
        let json = serde_json::to_string(&params).unwrap();
        let back: AffineDeformParams = serde_json::from_str(&json).unwrap();
        assert_eq!(back, params);
        let defaults: AffineDeformParams = serde_json::from_str("{}").unwrap();
        assert_eq!(defaults, AffineDeformParams::default());
    }
}
