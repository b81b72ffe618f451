//! Linear and nonlinear solvers for the assembled systems.

pub mod levenberg_marquardt;
pub mod min_quad;

pub use levenberg_marquardt::{
    LevenbergMarquardt, LevenbergMarquardtParams, OptimizationReport, Termination,
};
pub use min_quad::{FixedQuadraticSolver, MinQuadParams, MinQuadWithFixed};
