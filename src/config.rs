//! Bootstrap configuration.
//!
//! Every field has a default reproducing the stock scene, so a config file
//! only needs to name what it changes.

use anyhow::Context;
use serde::Deserialize;

use crate::{
    data_structures::{instance::Instance, scene_graph::AmbientLight},
    render::RendererSettings,
};

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct AssetPaths {
    /// Compiled image-target descriptor handed to the tracker.
    pub target: String,
    pub environment: String,
    pub model: String,
    /// Glyph set whose load gates the overlay plane.
    pub glyphs: String,
    pub overlay_image: String,
}

impl Default for AssetPaths {
    fn default() -> Self {
        Self {
            target: String::from("new.mind"),
            environment: String::from("assets/venice_sunset_1k.hdr"),
            model: String::from("assets/preset.glb"),
            glyphs: String::from("Edwardian.json"),
            overlay_image: String::from("assets/new1.jpg"),
        }
    }
}

/// Transform applied to the model root before it is attached.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelPlacement {
    pub scale: [f32; 3],
    pub position: [f32; 3],
    /// Euler angles in radians, `XYZ` order.
    pub rotation: [f32; 3],
}

impl ModelPlacement {
    pub fn to_instance(&self) -> Instance {
        let [sx, sy, sz] = self.scale;
        let [px, py, pz] = self.position;
        let [rx, ry, rz] = self.rotation;
        Instance::new()
            .with_scale(sx, sy, sz)
            .with_position(px, py, pz)
            .with_euler_xyz(rx, ry, rz)
    }
}

impl Default for ModelPlacement {
    fn default() -> Self {
        Self {
            scale: [0.022, 0.022, 0.022],
            position: [-0.12, 0.05, -0.05],
            rotation: [std::f32::consts::FRAC_PI_2, 0.0, 0.0],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub position: [f32; 3],
    pub radius: f32,
    pub segments: u32,
    pub metalness: f32,
    pub roughness: f32,
    pub env_map_intensity: f32,
    pub alpha_test: f32,
    pub transparent: bool,
    pub double_sided: bool,
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 0.05, 0.2],
            radius: 0.3,
            segments: 64,
            metalness: 0.5,
            roughness: 0.5,
            env_map_intensity: 1.0,
            alpha_test: 0.5,
            transparent: true,
            double_sided: true,
        }
    }
}

/// When the overlay plane is built.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverlayGate {
    /// After the glyph set finished loading.
    #[default]
    GlyphResource,
    /// Right after the anchor exists, without waiting on the glyph set.
    Immediate,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub assets: AssetPaths,
    /// Tracking target the model and overlay are anchored to.
    pub anchor_index: usize,
    pub renderer: RendererSettings,
    pub ambient_light: AmbientLight,
    pub model: ModelPlacement,
    pub overlay: OverlayConfig,
    pub overlay_gate: OverlayGate,
}

impl BootstrapConfig {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("invalid bootstrap configuration")
    }
}
