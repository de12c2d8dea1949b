//! Physically based material record.
//!
//! Materials reference shared resources (textures, the environment map) by
//! `Arc` so every mesh using the scene environment points at the same pixels.

use std::sync::Arc;

use crate::{data_structures::texture::Texture, resources::environment::EnvironmentMap};

/// Which faces of a primitive are rasterized.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Side {
    #[default]
    Front,
    Back,
    Double,
}

/// Metallic/roughness material in the glTF sense.
#[derive(Clone, Debug)]
pub struct StandardMaterial {
    pub name: String,
    pub base_color: [f32; 4],
    pub map: Option<Arc<Texture>>,
    /// Explicit reflection environment. Takes precedence over the scene environment.
    pub env_map: Option<Arc<EnvironmentMap>>,
    /// Whether the scene environment applies when `env_map` is unset.
    pub use_scene_environment: bool,
    pub env_map_intensity: f32,
    pub metalness: f32,
    pub roughness: f32,
    pub side: Side,
    pub transparent: bool,
    /// Fragments with alpha below this are discarded; `0.0` disables the test.
    pub alpha_test: f32,
    /// Set whenever a change requires the renderer to rebuild its pipeline state.
    pub needs_update: bool,
}

impl StandardMaterial {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Removes every source of environment reflections from this material.
    pub fn strip_environment(&mut self) {
        self.env_map = None;
        self.use_scene_environment = false;
        self.needs_update = true;
    }

    /// The environment map a renderer should use for reflections.
    pub fn effective_environment<'a>(
        &'a self,
        scene_environment: Option<&'a Arc<EnvironmentMap>>,
    ) -> Option<&'a Arc<EnvironmentMap>> {
        match &self.env_map {
            Some(env) => Some(env),
            None if self.use_scene_environment => scene_environment,
            None => None,
        }
    }
}

impl Default for StandardMaterial {
    fn default() -> Self {
        Self {
            name: String::from("default"),
            base_color: [1.0; 4],
            map: None,
            env_map: None,
            use_scene_environment: true,
            env_map_intensity: 1.0,
            metalness: 1.0,
            roughness: 1.0,
            side: Side::Front,
            transparent: false,
            alpha_test: 0.0,
            needs_update: false,
        }
    }
}
