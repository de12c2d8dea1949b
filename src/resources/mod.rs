use anyhow::Context;

use crate::data_structures::texture::Texture;

/**
 * This module contains all logic for loading hdr maps, models, glyph sets and
 * textures from external files.
 */
pub mod environment;
pub mod glyphs;
pub mod model;

/// Where asset bytes come from.
///
/// Natively this is the file system ([`FsSource`]); on the web assets are
/// fetched relative to the page origin ([`HttpSource`]). Tests substitute
/// in-memory sources.
#[allow(async_fn_in_trait)]
pub trait AssetSource {
    async fn load_binary(&self, path: &str) -> anyhow::Result<Vec<u8>>;

    async fn load_string(&self, path: &str) -> anyhow::Result<String> {
        let bytes = self.load_binary(path).await?;
        String::from_utf8(bytes).with_context(|| format!("{path} is not valid UTF-8"))
    }
}

/// Reads assets relative to a root directory.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Clone, Debug)]
pub struct FsSource {
    root: std::path::PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
impl FsSource {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Default for FsSource {
    fn default() -> Self {
        Self::new("./")
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl AssetSource for FsSource {
    async fn load_binary(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        let full = self.root.join(path);
        let data = tokio::fs::read(&full)
            .await
            .with_context(|| format!("failed to read {}", full.display()))?;
        log::debug!("read {} bytes from {}", data.len(), full.display());
        Ok(data)
    }
}

/// Fetches assets relative to the page origin.
#[cfg(target_arch = "wasm32")]
#[derive(Clone, Debug)]
pub struct HttpSource {
    base: reqwest::Url,
}

#[cfg(target_arch = "wasm32")]
impl HttpSource {
    pub fn new(base: reqwest::Url) -> Self {
        Self { base }
    }

    /// Resolves against `window.location.origin`.
    pub fn from_origin() -> anyhow::Result<Self> {
        let window = web_sys::window().context("no global window")?;
        let origin = window
            .location()
            .origin()
            .map_err(|e| anyhow::anyhow!("cannot read page origin: {e:?}"))?;
        let base = reqwest::Url::parse(&format!("{origin}/"))?;
        Ok(Self::new(base))
    }
}

#[cfg(target_arch = "wasm32")]
impl AssetSource for HttpSource {
    async fn load_binary(&self, path: &str) -> anyhow::Result<Vec<u8>> {
        let url = self.base.join(path.trim_start_matches("./"))?;
        let response = reqwest::get(url.clone())
            .await
            .with_context(|| format!("failed to fetch {url}"))?
            .error_for_status()?;
        let data = response.bytes().await?.to_vec();
        log::debug!("fetched {} bytes from {}", data.len(), url);
        Ok(data)
    }
}

/// Resolves `uri` relative to the directory that contains `base`.
pub(crate) fn sibling_path(base: &str, uri: &str) -> String {
    match base.rfind('/') {
        Some(idx) => format!("{}/{}", &base[..idx], uri),
        None => uri.to_string(),
    }
}

pub async fn load_texture<S: AssetSource>(
    source: &S,
    path: &str,
    format: Option<&str>,
) -> anyhow::Result<Texture> {
    let data = source.load_binary(path).await?;
    Texture::from_bytes(&data, path, format).with_context(|| format!("failed to decode {path}"))
}
