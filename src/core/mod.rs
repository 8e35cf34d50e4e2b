//! Core value types: 3D vectors and per-tick samples.

pub mod sample;
pub mod vector;

pub use sample::{Sample, VectorSampler};
pub use vector::{Position, Vec3};
