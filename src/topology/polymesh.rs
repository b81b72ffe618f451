//! Polyhedral mesh connectivity: vertices, faces of arbitrary degree, and
//! the edge-vertex / edge-face incidence tables.
//!
//! A [`PolyMesh`] is read-only once built. Both constructors validate every
//! index so that downstream assembly never sees corrupt connectivity.

use itertools::Itertools;
use nalgebra::{Point3, Vector3};

use crate::mesh_error::PolyMeshError;
use crate::topology::edge_topology::polygonal_edge_topology;

/// Mesh connectivity for a polyhedral (arbitrary face degree) surface.
#[derive(Clone, Debug, PartialEq)]
pub struct PolyMesh {
    vertices: Vec<Point3<f64>>,
    face_degree: Vec<usize>,
    face_vertices: Vec<Vec<usize>>,
    edge_vertices: Vec<[usize; 2]>,
    edge_faces: Vec<[Option<usize>; 2]>,
}

impl PolyMesh {
    /// Build a mesh from explicit incidence tables, validating all of them.
    ///
    /// `edge_faces[e]` holds the faces on either side of edge `e`; `None`
    /// marks a boundary side. Boundary edges must have exactly one face.
    pub fn try_new(
        vertices: Vec<Point3<f64>>,
        face_degree: Vec<usize>,
        face_vertices: Vec<Vec<usize>>,
        edge_vertices: Vec<[usize; 2]>,
        edge_faces: Vec<[Option<usize>; 2]>,
    ) -> Result<Self, PolyMeshError> {
        let mesh = Self {
            vertices,
            face_degree,
            face_vertices,
            edge_vertices,
            edge_faces,
        };
        mesh.validate()?;
        Ok(mesh)
    }

    /// Build a mesh from vertices and face lists, deriving face degrees and
    /// the edge topology.
    ///
    /// ```rust
    /// use nalgebra::Point3;
    /// use polymesh_deform::topology::polymesh::PolyMesh;
    ///
    /// let vertices = vec![
    ///     Point3::new(0.0, 0.0, 0.0),
    ///     Point3::new(1.0, 0.0, 0.0),
    ///     Point3::new(1.0, 1.0, 0.0),
    ///     Point3::new(0.0, 1.0, 0.0),
    /// ];
    /// let mesh = PolyMesh::from_faces(vertices, vec![vec![0, 1, 2, 3]])?;
    /// assert_eq!(mesh.edge_count(), 4);
    /// assert_eq!(mesh.boundary_edges().count(), 4);
    /// # Ok::<(), polymesh_deform::mesh_error::PolyMeshError>(())
    /// ```
    pub fn from_faces(
        vertices: Vec<Point3<f64>>,
        face_vertices: Vec<Vec<usize>>,
    ) -> Result<Self, PolyMeshError> {
        let face_degree = face_vertices.iter().map(Vec::len).collect();
        let (edge_vertices, edge_faces) =
            polygonal_edge_topology(vertices.len(), &face_vertices)?;
        Self::try_new(
            vertices,
            face_degree,
            face_vertices,
            edge_vertices,
            edge_faces,
        )
    }

    /// Copy of this connectivity with new vertex positions.
    pub fn with_vertices(&self, vertices: Vec<Point3<f64>>) -> Result<Self, PolyMeshError> {
        if vertices.len() != self.vertices.len() {
            return Err(PolyMeshError::DimensionMismatch {
                what: "vertex positions",
                expected: self.vertices.len(),
                found: vertices.len(),
            });
        }
        Self::try_new(
            vertices,
            self.face_degree.clone(),
            self.face_vertices.clone(),
            self.edge_vertices.clone(),
            self.edge_faces.clone(),
        )
    }

    fn validate(&self) -> Result<(), PolyMeshError> {
        let vertex_count = self.vertices.len();
        let face_count = self.face_vertices.len();

        for (v, p) in self.vertices.iter().enumerate() {
            if !p.coords.iter().all(|c| c.is_finite()) {
                return Err(PolyMeshError::NonFiniteVertex { vertex: v });
            }
        }

        if self.face_degree.len() != face_count {
            return Err(PolyMeshError::FaceCountMismatch {
                degrees: self.face_degree.len(),
                faces: face_count,
            });
        }
        for (f, (&degree, verts)) in self.face_degree.iter().zip(&self.face_vertices).enumerate() {
            if degree != verts.len() {
                return Err(PolyMeshError::FaceDegreeMismatch {
                    face: f,
                    degree,
                    found: verts.len(),
                });
            }
            if degree < 3 {
                return Err(PolyMeshError::DegenerateFace { face: f, degree });
            }
            if let Some(&bad) = verts.iter().find(|&&v| v >= vertex_count) {
                return Err(PolyMeshError::VertexIndexOutOfBounds {
                    element: "face",
                    index: f,
                    vertex: bad,
                    vertex_count,
                });
            }
        }

        if self.edge_vertices.len() != self.edge_faces.len() {
            return Err(PolyMeshError::EdgeCountMismatch {
                edge_vertices: self.edge_vertices.len(),
                edge_faces: self.edge_faces.len(),
            });
        }
        for (e, (&[v0, v1], faces)) in self.edge_vertices.iter().zip(&self.edge_faces).enumerate() {
            for v in [v0, v1] {
                if v >= vertex_count {
                    return Err(PolyMeshError::VertexIndexOutOfBounds {
                        element: "edge",
                        index: e,
                        vertex: v,
                        vertex_count,
                    });
                }
            }
            if v0 == v1 {
                return Err(PolyMeshError::DegenerateEdge { edge: e, vertex: v0 });
            }
            if faces.iter().all(Option::is_none) {
                return Err(PolyMeshError::IsolatedEdge { edge: e });
            }
            for &face in faces.iter().flatten() {
                if face >= face_count {
                    return Err(PolyMeshError::FaceIndexOutOfBounds {
                        edge: e,
                        face,
                        face_count,
                    });
                }
                if !face_has_side(&self.face_vertices[face], v0, v1) {
                    return Err(PolyMeshError::EdgeNotInFace {
                        edge: e,
                        v0,
                        v1,
                        face,
                    });
                }
            }
            if let [Some(a), Some(b)] = *faces {
                if a == b {
                    return Err(PolyMeshError::RepeatedEdgeFace { edge: e, face: a });
                }
            }
        }
        Ok(())
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[inline]
    pub fn face_count(&self) -> usize {
        self.face_vertices.len()
    }

    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edge_vertices.len()
    }

    /// Original vertex positions.
    pub fn vertices(&self) -> &[Point3<f64>] {
        &self.vertices
    }

    /// Degree of every face.
    pub fn face_degree(&self) -> &[usize] {
        &self.face_degree
    }

    /// Ordered vertex indices of every face.
    pub fn face_vertices(&self) -> &[Vec<usize>] {
        &self.face_vertices
    }

    /// End vertices `[v0, v1]` of every edge.
    pub fn edge_vertices(&self) -> &[[usize; 2]] {
        &self.edge_vertices
    }

    /// Adjacent faces of every edge; `None` marks a boundary side.
    pub fn edge_faces(&self) -> &[[Option<usize>; 2]] {
        &self.edge_faces
    }

    /// Edge vector `v1 - v0` in the original geometry.
    pub fn edge_vector(&self, edge: usize) -> Vector3<f64> {
        let [v0, v1] = self.edge_vertices[edge];
        self.vertices[v1] - self.vertices[v0]
    }

    /// True when only one side of `edge` has a face.
    pub fn is_boundary_edge(&self, edge: usize) -> bool {
        self.edge_faces[edge].iter().any(Option::is_none)
    }

    /// Indices of boundary edges.
    pub fn boundary_edges(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.edge_count()).filter(|&e| self.is_boundary_edge(e))
    }

    /// Interior edges with their two adjacent faces.
    pub fn interior_edges(&self) -> impl Iterator<Item = (usize, [usize; 2])> + '_ {
        self.edge_faces
            .iter()
            .enumerate()
            .filter_map(|(e, faces)| match *faces {
                [Some(a), Some(b)] => Some((e, [a, b])),
                _ => None,
            })
    }
}

/// True when `v0` and `v1` are consecutive corners of the face loop, in
/// either order.
fn face_has_side(loop_vertices: &[usize], v0: usize, v1: usize) -> bool {
    loop_vertices
        .iter()
        .circular_tuple_windows()
        .any(|(&a, &b)| (a, b) == (v0, v1) || (a, b) == (v1, v0))
}

/// Convert edge-face pairs using the `-1` boundary sentinel into `Option`s.
pub fn edge_faces_from_signed(
    raw: &[[i64; 2]],
) -> Result<Vec<[Option<usize>; 2]>, PolyMeshError> {
    raw.iter()
        .enumerate()
        .map(|(edge, pair)| {
            let side = |value: i64| match value {
                -1 => Ok(None),
                v if v >= 0 => Ok(Some(v as usize)),
                v => Err(PolyMeshError::InvalidSignedFaceIndex { edge, value: v }),
            };
            Ok([side(pair[0])?, side(pair[1])?])
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Vec<Point3<f64>> {
        vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ]
    }

    #[test]
    fn rejects_edge_with_missing_vertex() {
        let err = PolyMesh::try_new(
            triangle(),
            vec![3],
            vec![vec![0, 1, 2]],
            vec![[0, 1], [1, 2], [2, 7]],
            vec![[Some(0), None]; 3],
        )
        .unwrap_err();
        assert_eq!(
            err,
            PolyMeshError::VertexIndexOutOfBounds {
                element: "edge",
                index: 2,
                vertex: 7,
                vertex_count: 3,
            }
        );
    }

    #[test]
    fn rejects_degree_mismatch() {
        let err = PolyMesh::try_new(
            triangle(),
            vec![4],
            vec![vec![0, 1, 2]],
            vec![[0, 1], [1, 2], [2, 0]],
            vec![[Some(0), None]; 3],
        )
        .unwrap_err();
        assert!(matches!(err, PolyMeshError::FaceDegreeMismatch { face: 0, .. }));
    }

    #[test]
    fn rejects_isolated_edge_and_bad_face() {
        let isolated = PolyMesh::try_new(
            triangle(),
            vec![3],
            vec![vec![0, 1, 2]],
            vec![[0, 1], [1, 2], [2, 0]],
            vec![[Some(0), None], [None, None], [Some(0), None]],
        );
        assert_eq!(isolated, Err(PolyMeshError::IsolatedEdge { edge: 1 }));

        let bad_face = PolyMesh::try_new(
            triangle(),
            vec![3],
            vec![vec![0, 1, 2]],
            vec![[0, 1], [1, 2], [2, 0]],
            vec![[Some(0), None], [Some(3), None], [Some(0), None]],
        );
        assert!(matches!(
            bad_face,
            Err(PolyMeshError::FaceIndexOutOfBounds { edge: 1, face: 3, .. })
        ));
    }

    // triangle (0, 1, 2) and a disjoint triangle (3, 4, 5)
    fn two_triangles() -> (Vec<Point3<f64>>, Vec<Vec<usize>>) {
        let mut vertices = triangle();
        vertices.extend(triangle().iter().map(|p| p + Vector3::new(5.0, 0.0, 0.0)));
        (vertices, vec![vec![0, 1, 2], vec![3, 4, 5]])
    }

    #[test]
    fn rejects_edge_citing_a_face_without_it() {
        let (vertices, faces) = two_triangles();
        let mut edge_faces = vec![[Some(0), None]; 3];
        edge_faces.extend([[Some(1), None]; 3]);
        // edge (0, 1) also claims face 1 = (3, 4, 5)
        edge_faces[0] = [Some(0), Some(1)];
        let err = PolyMesh::try_new(
            vertices,
            vec![3, 3],
            faces,
            vec![[0, 1], [1, 2], [2, 0], [3, 4], [4, 5], [5, 3]],
            edge_faces,
        )
        .unwrap_err();
        assert_eq!(
            err,
            PolyMeshError::EdgeNotInFace {
                edge: 0,
                v0: 0,
                v1: 1,
                face: 1
            }
        );
    }

    #[test]
    fn rejects_same_face_on_both_sides() {
        let err = PolyMesh::try_new(
            triangle(),
            vec![3],
            vec![vec![0, 1, 2]],
            vec![[0, 1], [1, 2], [2, 0]],
            vec![[Some(0), None], [Some(0), None], [Some(0), Some(0)]],
        )
        .unwrap_err();
        assert_eq!(err, PolyMeshError::RepeatedEdgeFace { edge: 2, face: 0 });
    }

    #[test]
    fn edge_may_run_against_the_face_loop() {
        // the closing edge is stored as (0, 2) while the loop walks 2 -> 0
        let mesh = PolyMesh::try_new(
            triangle(),
            vec![3],
            vec![vec![0, 1, 2]],
            vec![[0, 1], [1, 2], [0, 2]],
            vec![[Some(0), None]; 3],
        )
        .unwrap();
        assert_eq!(mesh.boundary_edges().count(), 3);
    }

    #[test]
    fn signed_faces_use_minus_one_for_boundary() {
        let faces = edge_faces_from_signed(&[[0, -1], [-1, 2], [1, 0]]).unwrap();
        assert_eq!(faces, vec![[Some(0), None], [None, Some(2)], [Some(1), Some(0)]]);
        assert_eq!(
            edge_faces_from_signed(&[[0, -2]]),
            Err(PolyMeshError::InvalidSignedFaceIndex { edge: 0, value: -2 })
        );
    }

    #[test]
    fn with_vertices_keeps_connectivity() {
        let mesh = PolyMesh::from_faces(triangle(), vec![vec![0, 1, 2]]).unwrap();
        let moved: Vec<_> = mesh.vertices().iter().map(|p| p * 2.0).collect();
        let scaled = mesh.with_vertices(moved).unwrap();
        assert_eq!(scaled.edge_vertices(), mesh.edge_vertices());
        assert_eq!(scaled.edge_vector(0), mesh.edge_vector(0) * 2.0);
        assert!(mesh.with_vertices(vec![Point3::origin()]).is_err());
    }
}
