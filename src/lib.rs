//! anchor-ngin
//!
//! Bootstraps an image-anchored augmented-reality scene: an HDR environment,
//! a glTF model with embedded clips and a textured overlay plane are loaded
//! in a fixed order and attached to a tracked image anchor. Tracking, GPU
//! rasterization and mesh decompression stay behind traits so the crate
//! runs natively and on the web.
//!
//! High-level modules
//! - `animation`: keyframe tracks, clips, actions and the mixer that drives them
//! - `bootstrap`: the ordered scene bootstrap sequence
//! - `camera`: camera parameters handed over by the tracker
//! - `config`: asset paths and tunables for the bootstrap
//! - `context`: the AR session (scene, camera, renderer settings, anchors)
//! - `data_structures`: scene graph, transforms, materials, geometry, textures
//! - `flow`: per-frame loop, clock and deferred scene mutations
//! - `overlay`: the circular image plane shown next to the model
//! - `render`: renderer settings, tone mapping and the renderer seam
//! - `resources`: asset sources and loaders (hdr, gltf, glyphs, images)
//! - `tracker`: the image tracking seam
//!

pub mod animation;
pub mod bootstrap;
pub mod camera;
pub mod config;
pub mod context;
pub mod data_structures;
pub mod flow;
pub mod overlay;
pub mod render;
pub mod resources;
pub mod tracker;

// Re-exports commonly used types for convenience in downstream code.
pub use bootstrap::{BootstrapError, Bootstrapped, Bootstrapper, Stage};
pub use cgmath::*;
pub use config::BootstrapConfig;
pub use context::{Anchor, SessionContext};
pub use render::FrameRenderer;
pub use tracker::ImageTracker;
