//! Triplet assembly of the constraint and energy matrices.
//!
//! This module turns [`PolyMesh`] connectivity into triplet lists for:
//! 1. the affine continuity constraints `A_f (v1 - v0) = v'1 - v'0`,
//! 2. the affine energy (identity prescription plus interior-edge bending), and
//! 3. the linear offset constraints `v'1 - v'0 - s_e (v1 - v0) = 0`.
//!
//! # Unknown layouts
//! - Affine system (one spatial dimension at a time): `3 * faces` entries for
//!   the per-face affine-map row, then `vertices` entries for the positions.
//! - Offset system: `3 * vertices` coordinates, then one scale per edge.
//!
//! Every `(row, col)` pair is produced by a single edge (or face), so the
//! per-edge collection may run in any order; with the `rayon` feature it runs
//! in parallel and is fully collected before the list is built.

use crate::mesh_error::PolyMeshError;
use crate::sparse::triplet::{Triplet, TripletList};
use crate::topology::polymesh::PolyMesh;

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Triplet lists of the affine deformation system.
#[derive(Clone, Debug)]
pub struct AffineSystem {
    /// Energy matrix `E`: identity rows first, then one bending row per interior edge.
    pub energy: TripletList,
    /// Number of leading identity rows in `energy` (`3 * faces`).
    pub identity_rows: usize,
    /// Continuity constraint matrix `C`, one row per valid (edge, side) pair.
    pub constraints: TripletList,
    /// Shared unknown count (`3 * faces + vertices`).
    pub num_vars: usize,
}

impl AffineSystem {
    /// Number of bending rows in `energy`.
    pub fn bending_rows(&self) -> usize {
        self.energy.nrows() - self.identity_rows
    }
}

/// Number of unknowns of the affine system for one spatial dimension.
#[inline]
pub fn affine_num_vars(mesh: &PolyMesh) -> usize {
    3 * mesh.face_count() + mesh.vertex_count()
}

/// Column of the free position unknown of `vertex` in the affine layout.
#[inline]
pub fn affine_vertex_column(mesh: &PolyMesh, vertex: usize) -> usize {
    3 * mesh.face_count() + vertex
}

/// Number of unknowns of the offset system.
#[inline]
pub fn offset_num_vars(mesh: &PolyMesh) -> usize {
    3 * mesh.vertex_count() + mesh.edge_count()
}

/// Assemble both matrices of the affine deformation system.
pub fn assemble_affine_system(mesh: &PolyMesh) -> Result<AffineSystem, PolyMeshError> {
    let constraints = affine_continuity_constraints(mesh)?;
    let energy = affine_energy(mesh)?;
    Ok(AffineSystem {
        energy,
        identity_rows: 3 * mesh.face_count(),
        constraints,
        num_vars: affine_num_vars(mesh),
    })
}

/// Continuity constraints: one row per (edge, adjacent face) pair.
///
/// Row for edge `e = (v0, v1)` seen from face `f`:
/// `sum_k E_k * a_f[k] + q[v0] - q[v1] = 0`, i.e. the face's affine-map row
/// applied to the original edge vector equals the deformed edge component.
/// Interior edges give two rows, boundary edges one.
pub fn affine_continuity_constraints(mesh: &PolyMesh) -> Result<TripletList, PolyMeshError> {
    // first row of every edge
    let mut row_start = Vec::with_capacity(mesh.edge_count() + 1);
    row_start.push(0usize);
    for sides in mesh.edge_faces() {
        let valid = sides.iter().flatten().count();
        row_start.push(row_start[row_start.len() - 1] + valid);
    }
    let nrows = row_start[mesh.edge_count()];

    let entries = collect_per_edge(mesh.edge_count(), |e| {
        let [v0, v1] = mesh.edge_vertices()[e];
        let edge = mesh.edge_vector(e);
        let mut out = Vec::with_capacity(10);
        for (side, face) in mesh.edge_faces()[e].iter().flatten().enumerate() {
            let row = row_start[e] + side;
            for k in 0..3 {
                out.push((row, 3 * face + k, edge[k]));
            }
            out.push((row, affine_vertex_column(mesh, v0), 1.0));
            out.push((row, affine_vertex_column(mesh, v1), -1.0));
        }
        out
    });

    TripletList::from_entries(nrows, affine_num_vars(mesh), entries)
}

/// Energy matrix: identity over the `3 * faces` affine unknowns, followed by
/// one bending row per interior edge with `-1` on the first face's columns
/// and `+1` on the second's. Boundary edges are skipped.
pub fn affine_energy(mesh: &PolyMesh) -> Result<TripletList, PolyMeshError> {
    let identity_rows = 3 * mesh.face_count();
    let interior: Vec<(usize, [usize; 2])> = mesh.interior_edges().collect();
    let nrows = identity_rows + interior.len();

    let mut list = TripletList::new(nrows, affine_num_vars(mesh));
    for i in 0..identity_rows {
        list.try_push(i, i, 1.0)?;
    }
    for (offset, &(_, [a, b])) in interior.iter().enumerate() {
        let row = identity_rows + offset;
        for k in 0..3 {
            list.try_push(row, 3 * a + k, -1.0)?;
            list.try_push(row, 3 * b + k, 1.0)?;
        }
    }
    Ok(list)
}

/// Offset constraints `v'1 - v'0 - s_e (v1 - v0) = 0`, rows `3e..3e+3`.
///
/// The matrix is linear in the unknowns, so it doubles as the constant
/// constraint Jacobian of the offset objective.
pub fn offset_constraints(mesh: &PolyMesh) -> Result<TripletList, PolyMeshError> {
    let vertex_block = 3 * mesh.vertex_count();
    let entries = collect_per_edge(mesh.edge_count(), |e| {
        let [v0, v1] = mesh.edge_vertices()[e];
        let edge = mesh.edge_vector(e);
        let mut out = Vec::with_capacity(9);
        for j in 0..3 {
            let row = 3 * e + j;
            out.push((row, 3 * v0 + j, -1.0));
            out.push((row, 3 * v1 + j, 1.0));
            out.push((row, vertex_block + e, -edge[j]));
        }
        out
    });

    TripletList::from_entries(3 * mesh.edge_count(), offset_num_vars(mesh), entries)
}

#[cfg(feature = "rayon")]
fn collect_per_edge<F>(edge_count: usize, per_edge: F) -> Vec<Triplet>
where
    F: Fn(usize) -> Vec<Triplet> + Sync + Send,
{
    (0..edge_count).into_par_iter().flat_map_iter(per_edge).collect()
}

#[cfg(not(feature = "rayon"))]
fn collect_per_edge<F>(edge_count: usize, per_edge: F) -> Vec<Triplet>
where
    F: Fn(usize) -> Vec<Triplet>,
{
    (0..edge_count).flat_map(per_edge).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{DMatrix, Point3};

    // two unit squares sharing the edge (1, 4)
    fn strip() -> PolyMesh {
        let vertices = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(2.0, 1.0, 0.0),
        ];
        PolyMesh::from_faces(vertices, vec![vec![0, 1, 4, 3], vec![1, 2, 5, 4]]).unwrap()
    }

    #[test]
    fn continuity_rows_per_valid_side() {
        let mesh = strip();
        let c = affine_continuity_constraints(&mesh).unwrap();
        // 6 boundary edges + 1 interior edge counted twice
        assert_eq!(c.nrows(), 8);
        assert_eq!(c.ncols(), 3 * 2 + 6);
        assert_eq!(c.len(), 8 * 5);
    }

    #[test]
    fn continuity_row_coefficients() {
        let mesh = strip();
        let csr = affine_continuity_constraints(&mesh).unwrap().to_csr();
        let c = DMatrix::from(&csr);
        // edge 0 is (0, 1) seen from face 0: E = (1, 0, 0)
        assert_eq!(mesh.edge_vertices()[0], [0, 1]);
        assert_eq!(c[(0, 0)], 1.0);
        assert_eq!(c[(0, 1)], 0.0);
        assert_eq!(c[(0, affine_vertex_column(&mesh, 0))], 1.0);
        assert_eq!(c[(0, affine_vertex_column(&mesh, 1))], -1.0);
        assert_eq!(csr.row(0).nnz(), 5);
    }

    #[test]
    fn energy_skips_boundary_edges() {
        let mesh = strip();
        let e = affine_energy(&mesh).unwrap();
        assert_eq!(e.nrows(), 6 + 1);
        let dense = e.to_dense();
        for k in 0..3 {
            assert_eq!(dense[(6, k)], -1.0);
            assert_eq!(dense[(6, 3 + k)], 1.0);
        }
        assert_eq!(dense.view((0, 0), (6, 6)), DMatrix::<f64>::identity(6, 6));
    }

    #[test]
    fn offset_constraint_layout() {
        let mesh = strip();
        let c = offset_constraints(&mesh).unwrap();
        assert_eq!(c.nrows(), 3 * mesh.edge_count());
        assert_eq!(c.ncols(), 3 * 6 + mesh.edge_count());
        let csr = c.to_csr();
        let dense = DMatrix::from(&csr);
        // edge 1 is (1, 4): vector (0, 1, 0)
        assert_eq!(mesh.edge_vertices()[1], [1, 4]);
        assert_eq!(dense[(4, 3 + 1)], -1.0);
        assert_eq!(dense[(4, 12 + 1)], 1.0);
        assert_eq!(dense[(4, 18 + 1)], -1.0);
        // zero edge components are stored explicitly
        assert_eq!(csr.row(3).nnz(), 3);
    }
}
