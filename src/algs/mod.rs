//! Re-export public algorithms.

pub mod assembly;

pub use assembly::{
    AffineSystem, affine_continuity_constraints, affine_energy, assemble_affine_system,
    offset_constraints,
};
