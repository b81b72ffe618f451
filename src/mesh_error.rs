//! PolyMeshError: Unified error type for polymesh-deform public APIs
//!
//! Every fallible operation in this crate reports failures synchronously
//! through this type. No partial output is returned alongside an error.

use thiserror::Error;

use crate::optimization::offset::OffsetType;

/// Unified error type for connectivity, assembly, and solver failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PolyMeshError {
    /// The face-degree table and the face-vertex table disagree in length.
    #[error("face degree table has {degrees} entries but {faces} faces were given")]
    FaceCountMismatch { degrees: usize, faces: usize },
    /// A face lists a different number of vertices than its degree.
    #[error("face {face} has degree {degree} but lists {found} vertices")]
    FaceDegreeMismatch {
        face: usize,
        degree: usize,
        found: usize,
    },
    /// A face has fewer than three vertices.
    #[error("face {face} is degenerate (degree {degree})")]
    DegenerateFace { face: usize, degree: usize },
    /// A face or edge cites a vertex that does not exist.
    #[error("{element} {index} references vertex {vertex} (mesh has {vertex_count} vertices)")]
    VertexIndexOutOfBounds {
        element: &'static str,
        index: usize,
        vertex: usize,
        vertex_count: usize,
    },
    /// An edge cites a face that does not exist.
    #[error("edge {edge} references face {face} (mesh has {face_count} faces)")]
    FaceIndexOutOfBounds {
        edge: usize,
        face: usize,
        face_count: usize,
    },
    /// A signed edge-face entry was negative but not the `-1` boundary sentinel.
    #[error("edge {edge} has invalid signed face index {value}")]
    InvalidSignedFaceIndex { edge: usize, value: i64 },
    /// The edge-vertex and edge-face tables disagree in length.
    #[error("edge-vertex table has {edge_vertices} rows but edge-face table has {edge_faces}")]
    EdgeCountMismatch {
        edge_vertices: usize,
        edge_faces: usize,
    },
    /// Both endpoints of an edge are the same vertex.
    #[error("edge {edge} is degenerate: both endpoints are vertex {vertex}")]
    DegenerateEdge { edge: usize, vertex: usize },
    /// An edge has no adjacent face on either side.
    #[error("edge {edge} has no adjacent face")]
    IsolatedEdge { edge: usize },
    /// An edge names the same face on both sides.
    #[error("edge {edge} lists face {face} on both sides")]
    RepeatedEdgeFace { edge: usize, face: usize },
    /// An edge cites a face whose loop does not contain it.
    #[error("edge {edge} ({v0}, {v1}) is not a side of face {face}")]
    EdgeNotInFace {
        edge: usize,
        v0: usize,
        v1: usize,
        face: usize,
    },
    /// More than two faces share an undirected edge.
    #[error("edge ({v0}, {v1}) is shared by more than two faces (third face {face})")]
    NonManifoldEdge { v0: usize, v1: usize, face: usize },
    /// A vertex coordinate is NaN or infinite.
    #[error("vertex {vertex} has a non-finite coordinate")]
    NonFiniteVertex { vertex: usize },
    /// A triplet was pushed outside the declared matrix shape.
    #[error("triplet ({row}, {col}) lies outside a {nrows}x{ncols} matrix")]
    TripletOutOfBounds {
        row: usize,
        col: usize,
        nrows: usize,
        ncols: usize,
    },
    /// A vector or matrix argument has the wrong size.
    #[error("{what}: expected size {expected}, found {found}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    /// A handle vertex index is outside the mesh.
    #[error("handle {vertex} is out of bounds (mesh has {vertex_count} vertices)")]
    HandleOutOfBounds { vertex: usize, vertex_count: usize },
    /// The same vertex was listed twice as a handle.
    #[error("vertex {0} is listed more than once as a handle")]
    DuplicateHandle(usize),
    /// The number of handle positions does not match the precomputed handles.
    #[error("expected {expected} handle positions, found {found}")]
    HandleCountMismatch { expected: usize, found: usize },
    /// The bend factor is negative or not finite.
    #[error("bend factor must be finite and non-negative, got {0}")]
    InvalidBendFactor(f64),
    /// The requested offset distance is negative or not finite.
    #[error("offset distance must be finite and non-negative, got {0}")]
    InvalidOffsetDistance(f64),
    /// The requested offset variant has no objective.
    #[error("offset type {0:?} is not supported; only vertex offsets have an objective")]
    UnsupportedOffsetType(OffsetType),
    /// The unknowns of a linear system are not uniquely determined.
    #[error("system is rank deficient: rank {rank}, required {required}")]
    RankDeficientSystem { rank: usize, required: usize },
    /// A right-hand side has no solution for the factorized system.
    #[error("system is inconsistent: residual {residual:e}")]
    InconsistentSystem { residual: f64 },
    /// The linear-algebra backend failed.
    #[error("solver failure: {0}")]
    SolverFailure(String),
}
