//! Edge topology of a polygonal mesh.
//
// Edges are numbered in order of first traversal over the faces (face order,
// then corner order within each face) and keep the orientation in which they
// were first walked. The first face touching an edge fills side 0 of its
// edge-face entry, the second fills side 1.

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use itertools::Itertools;

use crate::mesh_error::PolyMeshError;

/// Edge-vertex and edge-face tables produced by [`polygonal_edge_topology`].
pub type EdgeTopology = (Vec<[usize; 2]>, Vec<[Option<usize>; 2]>);

/// Derive `(edge_vertices, edge_faces)` from face vertex lists.
///
/// Fails on faces with fewer than three corners, on vertex indices outside
/// `0..vertex_count`, and on undirected edges shared by more than two faces.
pub fn polygonal_edge_topology(
    vertex_count: usize,
    face_vertices: &[Vec<usize>],
) -> Result<EdgeTopology, PolyMeshError> {
    let mut edge_vertices: Vec<[usize; 2]> = Vec::new();
    let mut edge_faces: Vec<[Option<usize>; 2]> = Vec::new();
    let mut index_of: HashMap<(usize, usize), usize> = HashMap::new();

    for (f, verts) in face_vertices.iter().enumerate() {
        if verts.len() < 3 {
            return Err(PolyMeshError::DegenerateFace {
                face: f,
                degree: verts.len(),
            });
        }
        for (&a, &b) in verts.iter().circular_tuple_windows() {
            if let Some(&bad) = [a, b].iter().find(|&&v| v >= vertex_count) {
                return Err(PolyMeshError::VertexIndexOutOfBounds {
                    element: "face",
                    index: f,
                    vertex: bad,
                    vertex_count,
                });
            }
            let key = (a.min(b), a.max(b));
            match index_of.entry(key) {
                Entry::Vacant(slot) => {
                    slot.insert(edge_vertices.len());
                    edge_vertices.push([a, b]);
                    edge_faces.push([Some(f), None]);
                }
                Entry::Occupied(slot) => {
                    let sides = &mut edge_faces[*slot.get()];
                    if sides[1].is_some() {
                        return Err(PolyMeshError::NonManifoldEdge {
                            v0: key.0,
                            v1: key.1,
                            face: f,
                        });
                    }
                    sides[1] = Some(f);
                }
            }
        }
    }

    log::debug!(
        "edge topology: {} faces, {} edges",
        face_vertices.len(),
        edge_vertices.len()
    );
    Ok((edge_vertices, edge_faces))
}
