#![allow(dead_code)]
use nalgebra::{DVector, Point3, Vector3};
use polymesh_deform::optimization::traits::ConstrainedLeastSquares;
use polymesh_deform::topology::polymesh::PolyMesh;

pub fn p(x: f64, y: f64, z: f64) -> Point3<f64> {
    Point3::new(x, y, z)
}

/// Unit square in the xy-plane, counter-clockwise from the origin.
pub fn unit_square() -> PolyMesh {
    PolyMesh::from_faces(
        vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(1.0, 1.0, 0.0), p(0.0, 1.0, 0.0)],
        vec![vec![0, 1, 2, 3]],
    )
    .unwrap()
}

/// `nx` by `ny` unit quads in the xy-plane; vertex `(i, j)` is `j * (nx + 1) + i`.
pub fn quad_grid(nx: usize, ny: usize) -> PolyMesh {
    let mut vertices = Vec::with_capacity((nx + 1) * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            vertices.push(p(i as f64, j as f64, 0.0));
        }
    }
    let id = |i: usize, j: usize| j * (nx + 1) + i;
    let mut faces = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            faces.push(vec![id(i, j), id(i + 1, j), id(i + 1, j + 1), id(i, j + 1)]);
        }
    }
    PolyMesh::from_faces(vertices, faces).unwrap()
}

/// Closed tetrahedron on the unit corner.
pub fn tetrahedron() -> PolyMesh {
    PolyMesh::from_faces(
        vec![p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0), p(0.0, 0.0, 1.0)],
        vec![vec![0, 2, 1], vec![0, 1, 3], vec![1, 2, 3], vec![0, 3, 2]],
    )
    .unwrap()
}

/// A triangle glued to a quad and a pentagon, to exercise mixed degrees.
pub fn mixed_degree_patch() -> PolyMesh {
    PolyMesh::from_faces(
        vec![
            p(0.0, 0.0, 0.0),
            p(1.0, 0.0, 0.0),
            p(1.0, 1.0, 0.0),
            p(0.0, 1.0, 0.0),
            p(0.5, -0.8, 0.1),
            p(2.0, 0.0, 0.2),
            p(2.3, 1.0, 0.1),
            p(1.5, 1.7, 0.0),
        ],
        vec![
            vec![0, 1, 2, 3],
            vec![0, 4, 1],
            vec![1, 5, 6, 7, 2],
        ],
    )
    .unwrap()
}

/// Offset unknowns with every vertex translated by `t` and every edge scale set to one.
pub fn translated_offset_start(
    problem: &dyn ConstrainedLeastSquares,
    mesh: &PolyMesh,
    t: Vector3<f64>,
) -> DVector<f64> {
    let mut x = problem.initial_solution();
    for v in 0..mesh.vertex_count() {
        for j in 0..3 {
            x[3 * v + j] += t[j];
        }
    }
    for e in 0..mesh.edge_count() {
        x[3 * mesh.vertex_count() + e] = 1.0;
    }
    x
}

/// Offset vertex `v` read from the unknown vector.
pub fn offset_vertex(x: &DVector<f64>, v: usize) -> Point3<f64> {
    p(x[3 * v], x[3 * v + 1], x[3 * v + 2])
}

/// Assert `a` and `b` are parallel (or anti-parallel) within `tol`.
pub fn assert_parallel(a: Vector3<f64>, b: Vector3<f64>, tol: f64) {
    let cross = a.cross(&b).norm();
    assert!(
        cross <= tol * (1.0 + a.norm() * b.norm()),
        "not parallel: {a:?} x {b:?} = {cross}"
    );
}
