//! # nray
//!
//! An **n-dimensional ray tracer**: scenes of hypercubes, hyperspheres and
//! (n−1)-simplices living in any dimension d ≥ 3, lit by point and
//! directional lights and projected through a pinhole camera onto a 2-D
//! image.
//!
//! ## Architecture
//!
//! - [`simd`]: fixed-width lane vectors with masks; the batch width for
//!   packed simplex tests.
//! - [`math`]: runtime-dimension vectors and matrices (LU decomposition,
//!   generalized cross product), rays and colors.
//! - [`camera`]: origin plus orthonormal frame, with Gram-Schmidt repair.
//! - [`primitives`]: oriented solids, simplices and SIMD simplex batches
//!   with the distance-or-zero intersection contract.
//! - [`aabb`]: bounding boxes, separating-axis tests and build prototypes.
//! - [`kdtree`]: surface-area-heuristic construction (parallel via a
//!   work-stealing pool) and the two traversal variants.
//! - [`scene`]: the composite scene and the Blinn-Phong shading recursion
//!   with shadows, reflection and transparency.
//! - [`pixels`], [`renderer`]: channel packing and the tiled blocking /
//!   callback render drivers.

pub mod aabb;
pub mod camera;
pub mod error;
pub mod kdtree;
pub mod math;
pub mod pixels;
pub mod primitives;
pub mod renderer;
pub mod scene;
pub mod simd;

pub use aabb::{Aabb, PrimitivePrototype};
pub use camera::Camera;
pub use error::{Error, Result};
pub use math::{cross, Color, Matrix, Ray, Vector};
pub use pixels::{Channel, ImageFormat};
pub use primitives::{Material, Primitive, Simplex, SimplexBatch, Solid, SolidKind};
pub use renderer::{BlockingRenderer, CallbackRenderer};
pub use scene::{CompositeScene, GlobalLight, PointLight};
