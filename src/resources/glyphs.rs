//! Typeface glyph sets in the JSON layout produced by facetype-style converters.
//!
//! The bootstrap only waits for a glyph set to finish loading before it shows
//! the overlay plane; [`glyphs_ready`] exposes exactly that signal.

use std::collections::HashMap;

use anyhow::Context;
use serde::Deserialize;

use crate::resources::AssetSource;

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct Glyph {
    /// Horizontal advance in font units.
    #[serde(default)]
    pub ha: f32,
    #[serde(default)]
    pub x_min: f32,
    #[serde(default)]
    pub x_max: f32,
    /// Outline commands (`m`, `l`, `q`, `b`), space separated.
    #[serde(default)]
    pub o: Option<String>,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct BoundingBox {
    #[serde(rename = "xMin")]
    pub x_min: f32,
    #[serde(rename = "xMax")]
    pub x_max: f32,
    #[serde(rename = "yMin")]
    pub y_min: f32,
    #[serde(rename = "yMax")]
    pub y_max: f32,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct GlyphSet {
    pub glyphs: HashMap<String, Glyph>,
    #[serde(rename = "familyName", default)]
    pub family_name: String,
    #[serde(default = "default_resolution")]
    pub resolution: f32,
    #[serde(rename = "boundingBox", default)]
    pub bounding_box: Option<BoundingBox>,
    #[serde(rename = "underlineThickness", default)]
    pub underline_thickness: f32,
}

fn default_resolution() -> f32 {
    1000.0
}

impl GlyphSet {
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Advance of `ch` for text set at `size` world units.
    pub fn advance(&self, ch: char, size: f32) -> Option<f32> {
        let mut buf = [0; 4];
        let key: &str = ch.encode_utf8(&mut buf);
        let glyph = self.glyphs.get(key)?;
        Some(glyph.ha / self.resolution * size)
    }
}

pub async fn load_glyphs<S: AssetSource>(source: &S, path: &str) -> anyhow::Result<GlyphSet> {
    let json = source.load_string(path).await?;
    GlyphSet::from_json(&json).with_context(|| format!("{path} is not a typeface glyph set"))
}

/// Resolves once the glyph set at `path` has loaded and parsed.
///
/// The parsed glyphs are dropped: callers use this purely to sequence work
/// behind the load.
pub async fn glyphs_ready<S: AssetSource>(source: &S, path: &str) -> anyhow::Result<()> {
    let glyphs = load_glyphs(source, path).await?;
    log::info!(
        "Font loaded: {} ({} glyphs) from {}",
        glyphs.family_name,
        glyphs.glyphs.len(),
        path
    );
    Ok(())
}
