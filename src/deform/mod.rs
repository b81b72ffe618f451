pub mod affine;

pub use affine::{
    AffineData, AffineDeformParams, AffineEnergyType, AffineSolution, affine_maps_deform,
    affine_maps_precompute, affine_maps_precompute_with,
};
