//! Engine data structures: scene graph, transforms, materials and geometry.
//!
//! - `instance` holds the position/rotation/scale transform of a node
//! - `scene_graph` is the arena-backed node hierarchy shared by scenes and loaded models
//! - `material` contains the physically based material record and its flags
//! - `geometry` holds CPU-side vertex data and procedural shapes
//! - `texture` is a decoded RGBA image ready for upload by a renderer

pub mod geometry;
pub mod instance;
pub mod material;
pub mod scene_graph;
pub mod texture;
