//! Polygonal mesh connectivity.
//!
//! - [`polymesh::PolyMesh`]: vertices, variable-degree faces, and the edge list
//!   with up to two adjacent faces per edge
//! - [`edge_topology`]: deriving the edge list from face loops

pub mod edge_topology;
pub mod polymesh;

pub use edge_topology::polygonal_edge_topology;
pub use polymesh::{PolyMesh, edge_faces_from_signed};
