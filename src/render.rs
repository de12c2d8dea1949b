//! Renderer settings and the seam to the actual renderer.
//!
//! Rasterization happens outside this crate. A [`FrameRenderer`] receives the
//! scene, the camera and the [`RendererSettings`] once per frame. The tone
//! mapping and output encoding functions here are CPU references for the
//! curves a renderer is expected to apply.

use serde::Deserialize;

use crate::{camera::Camera, data_structures::scene_graph::Scene};

/// Transfer function applied when writing the final colour.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColorEncoding {
    Linear,
    #[default]
    Srgb,
}

impl ColorEncoding {
    pub fn encode(self, linear: f32) -> f32 {
        match self {
            ColorEncoding::Linear => linear,
            ColorEncoding::Srgb if linear <= 0.003_130_8 => linear * 12.92,
            ColorEncoding::Srgb => 1.055 * linear.powf(1.0 / 2.4) - 0.055,
        }
    }
}

/// HDR to LDR curve.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToneMapping {
    None,
    Linear,
    #[default]
    AcesFilmic,
}

impl ToneMapping {
    /// Maps linear HDR `rgb` into `0.0..=1.0` (except for `None`).
    pub fn apply(self, rgb: [f32; 3], exposure: f32) -> [f32; 3] {
        match self {
            ToneMapping::None => rgb,
            ToneMapping::Linear => rgb.map(|c| (c * exposure).clamp(0.0, 1.0)),
            ToneMapping::AcesFilmic => aces_filmic(rgb, exposure),
        }
    }
}

// sRGB => XYZ => D65_2_D60 => AP1 => RRT_SAT, columns
const ACES_INPUT: [[f32; 3]; 3] = [
    [0.59719, 0.07600, 0.02840],
    [0.35458, 0.90834, 0.13383],
    [0.04823, 0.01566, 0.83777],
];

// ODT_SAT => XYZ => D60_2_D65 => sRGB, columns
const ACES_OUTPUT: [[f32; 3]; 3] = [
    [1.60475, -0.10208, -0.00327],
    [-0.53108, 1.10813, -0.07276],
    [-0.07367, -0.00605, 1.07602],
];

fn mul_columns(m: &[[f32; 3]; 3], v: [f32; 3]) -> [f32; 3] {
    [0, 1, 2].map(|row| m[0][row] * v[0] + m[1][row] * v[1] + m[2][row] * v[2])
}

fn rrt_and_odt_fit(v: f32) -> f32 {
    let a = v * (v + 0.024_578_6) - 0.000_090_537;
    let b = v * (0.983_729 * v + 0.432_951) + 0.238_081;
    a / b
}

fn aces_filmic(rgb: [f32; 3], exposure: f32) -> [f32; 3] {
    // the fit expects exposure 1.0 to land at scene value 0.6
    let scaled = rgb.map(|c| c * exposure / 0.6);
    let fitted = mul_columns(&ACES_INPUT, scaled).map(rrt_and_odt_fit);
    mul_columns(&ACES_OUTPUT, fitted).map(|c| c.clamp(0.0, 1.0))
}

#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    pub output_encoding: ColorEncoding,
    pub tone_mapping: ToneMapping,
    pub exposure: f32,
}

impl RendererSettings {
    /// Linear HDR colour to the value written to the display surface.
    pub fn display_color(&self, rgb: [f32; 3]) -> [f32; 3] {
        self.tone_mapping
            .apply(rgb, self.exposure)
            .map(|c| self.output_encoding.encode(c))
    }
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self {
            output_encoding: ColorEncoding::Srgb,
            tone_mapping: ToneMapping::AcesFilmic,
            exposure: 0.5,
        }
    }
}

/// Draws one frame of the scene.
pub trait FrameRenderer {
    fn render(
        &mut self,
        scene: &Scene,
        camera: &Camera,
        settings: &RendererSettings,
    ) -> anyhow::Result<()>;
}
