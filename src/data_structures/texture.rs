//! Decoded textures.
//!
//! This module provides [`Texture`], an RGBA8 image kept in CPU memory
//! together with the colour space the renderer should sample it in.

use anyhow::*;
use image::{GenericImageView, ImageFormat, load_from_memory_with_format};

/// How texel values are to be interpreted when sampled.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorSpace {
    /// Colour textures (base colour, emissive).
    Srgb,
    /// Data textures (normal maps, metallic/roughness).
    Linear,
}

/// An RGBA8 image with dimensions and a debug label.
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub color_space: ColorSpace,
    pub rgba: Vec<u8>,
}

impl Texture {
    /// Decode a texture from raw byte data (image file contents).
    ///
    /// # Arguments
    ///
    /// * `bytes` represent raw image file data (PNG, JPEG, etc.)
    /// * `label` is used as a debug name, usually the asset path
    /// * `format` is an optional file format hint (e.g., "png"). If None, auto-detect.
    pub fn from_bytes(bytes: &[u8], label: &str, format: Option<&str>) -> Result<Self> {
        let img = match format.and_then(ImageFormat::from_extension) {
            None => image::load_from_memory(bytes)?,
            Some(fmt) => load_from_memory_with_format(bytes, fmt)?,
        };
        Ok(Self::from_image(&img, label, ColorSpace::Srgb))
    }

    pub fn from_image(img: &image::DynamicImage, label: &str, color_space: ColorSpace) -> Self {
        let (width, height) = img.dimensions();
        Self {
            label: label.to_string(),
            width,
            height,
            color_space,
            rgba: img.to_rgba8().into_raw(),
        }
    }

    /// Solid single-colour texture.
    pub fn solid(label: &str, width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data = rgba
            .iter()
            .cycle()
            .take(width as usize * height as usize * 4)
            .copied()
            .collect();
        Self {
            label: label.to_string(),
            width,
            height,
            color_space: ColorSpace::Srgb,
            rgba: data,
        }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = ((y * self.width + x) * 4) as usize;
        let px = self.rgba.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }

    /// True when any texel is not fully opaque.
    pub fn has_alpha(&self) -> bool {
        self.rgba.chunks_exact(4).any(|px| px[3] < u8::MAX)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn png(img: image::RgbaImage) -> Vec<u8> {
        let mut bytes = Vec::new();
        img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    #[test]
    fn decodes_png_with_and_without_hint() {
        let mut img = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        img.put_pixel(2, 1, image::Rgba([1, 2, 3, 0]));
        let bytes = png(img);

        for hint in [None, Some("png")] {
            let tex = Texture::from_bytes(&bytes, "overlay.png", hint).unwrap();
            assert_eq!((tex.width, tex.height), (3, 2));
            assert_eq!(tex.pixel(0, 0), Some([10, 20, 30, 255]));
            assert_eq!(tex.pixel(2, 1), Some([1, 2, 3, 0]));
            assert_eq!(tex.pixel(3, 0), None);
            assert!(tex.has_alpha());
        }
    }

    #[test]
    fn garbage_bytes_fail() {
        assert!(Texture::from_bytes(b"not an image", "broken.jpg", None).is_err());
    }

    #[test]
    fn solid_texture_is_opaque() {
        let tex = Texture::solid("white", 2, 2, [255; 4]);
        assert_eq!(tex.rgba.len(), 16);
        assert!(!tex.has_alpha());
    }
}
