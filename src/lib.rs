#![cfg_attr(docsrs, feature(doc_cfg))]
//! # polymesh-deform
//!
//! polymesh-deform assembles and solves the sparse systems behind two
//! polyhedral mesh editing tools:
//!
//! - **Affine-map deformation**: every face carries one affine map, maps of
//!   neighbouring faces are tied through shared edges, and a handful of
//!   handle vertices drive a single global least-squares solve.
//! - **Offset meshes**: a parallel copy of the mesh whose edges stay parallel
//!   to the originals while vertices move to a prescribed distance, posed as
//!   a constrained nonlinear least-squares problem.
//!
//! ## Features
//! - Variable-degree polygonal meshes with boundary-aware edge topology
//! - Triplet assembly of continuity, bending and offset matrices
//! - Precompute-once, solve-many quadratic minimisation with fixed values
//! - A problem/driver split for constrained least squares
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! polymesh-deform = "0.1"
//! # Optional features:
//! # features = ["rayon"]
//! ```
//!
//! With `rayon` enabled, per-edge triplet collection runs in parallel.
//!
//! ```rust
//! use nalgebra::Point3;
//! use polymesh_deform::prelude::*;
//!
//! let mesh = PolyMesh::from_faces(
//!     vec![
//!         Point3::new(0.0, 0.0, 0.0),
//!         Point3::new(1.0, 0.0, 0.0),
//!         Point3::new(1.0, 1.0, 0.0),
//!         Point3::new(0.0, 1.0, 0.0),
//!     ],
//!     vec![vec![0, 1, 2, 3]],
//! )?;
//! let data = affine_maps_precompute(&mesh, &[0, 2], AffineDeformParams::default())?;
//! let targets = [Point3::new(0.0, 0.0, 1.0), Point3::new(1.0, 1.0, 1.0)];
//! let solution = affine_maps_deform(&data, &targets, mesh.vertices())?;
//! assert!((solution.vertex(1).z - 1.0).abs() < 1e-9);
//! # Ok::<(), PolyMeshError>(())
//! ```

pub mod algs;
pub mod deform;
pub mod mesh_error;
pub mod optimization;
pub mod solver;
pub mod sparse;
pub mod topology;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::deform::affine::{
        AffineData, AffineDeformParams, AffineEnergyType, AffineSolution, affine_maps_deform,
        affine_maps_precompute,
    };
    pub use crate::mesh_error::PolyMeshError;
    pub use crate::optimization::offset::{OffsetType, VertexOffset, offset_objective};
    pub use crate::optimization::traits::{
        ConstrainedLeastSquares, IterationControl, NumericalDiagnostics,
    };
    pub use crate::solver::levenberg_marquardt::{
        LevenbergMarquardt, LevenbergMarquardtParams, OptimizationReport,
    };
    pub use crate::solver::min_quad::{FixedQuadraticSolver, MinQuadParams, MinQuadWithFixed};
    pub use crate::sparse::{CsrMatrix, TripletList};
    pub use crate::topology::polymesh::PolyMesh;
}
