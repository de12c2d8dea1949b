//! Radiance HDR environment maps.

use anyhow::Context;
use image::ImageFormat;

use crate::resources::AssetSource;

/// How a renderer maps directions onto the image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Mapping {
    /// Plain texture lookup by UV; the state right after decoding.
    #[default]
    Uv,
    /// Longitude/latitude lookup by reflection direction.
    EquirectangularReflection,
}

/// Linear floating-point RGB image used for reflections.
#[derive(Clone, Debug, PartialEq)]
pub struct EnvironmentMap {
    pub label: String,
    pub width: u32,
    pub height: u32,
    /// Row-major, top row first.
    pub pixels: Vec<[f32; 3]>,
    pub mapping: Mapping,
}

impl EnvironmentMap {
    pub fn from_hdr_bytes(bytes: &[u8], label: &str) -> anyhow::Result<Self> {
        let img = image::load_from_memory_with_format(bytes, ImageFormat::Hdr)
            .with_context(|| format!("{label} is not a radiance hdr image"))?
            .to_rgb32f();
        let (width, height) = img.dimensions();
        Ok(Self {
            label: label.to_string(),
            width,
            height,
            pixels: img.pixels().map(|p| p.0).collect(),
            mapping: Mapping::Uv,
        })
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[f32; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).copied()
    }

    /// Nearest texel seen along `direction` with equirectangular mapping.
    ///
    /// +Y is up; the top image row corresponds to straight up.
    pub fn sample(&self, direction: cgmath::Vector3<f32>) -> Option<[f32; 3]> {
        use cgmath::InnerSpace;
        use std::f32::consts::PI;

        if self.width == 0 || self.height == 0 || direction.magnitude2() == 0.0 {
            return None;
        }
        let dir = direction.normalize();
        let u = dir.z.atan2(dir.x) / (2.0 * PI) + 0.5;
        let v = dir.y.clamp(-1.0, 1.0).asin() / PI + 0.5;

        let x = ((u * self.width as f32) as u32).min(self.width - 1);
        let y = (((1.0 - v) * self.height as f32) as u32).min(self.height - 1);
        self.pixel(x, y)
    }

    /// Average radiance over all texels.
    pub fn mean(&self) -> [f32; 3] {
        if self.pixels.is_empty() {
            return [0.0; 3];
        }
        let sum = self.pixels.iter().fold([0.0f32; 3], |acc, p| {
            [acc[0] + p[0], acc[1] + p[1], acc[2] + p[2]]
        });
        let n = self.pixels.len() as f32;
        [sum[0] / n, sum[1] / n, sum[2] / n]
    }
}

pub async fn load_environment_map<S: AssetSource>(
    source: &S,
    path: &str,
) -> anyhow::Result<EnvironmentMap> {
    let data = source.load_binary(path).await?;
    let env = EnvironmentMap::from_hdr_bytes(&data, path)?;
    log::debug!("decoded environment map {} ({}x{})", path, env.width, env.height);
    Ok(env)
}
