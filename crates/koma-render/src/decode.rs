//! Image source decoding.
//!
//! Panel `src` and overlay `file` strings are opaque to the page model.
//! Export resolves them here: `data:` URLs are decoded inline, anything
//! else is read as a path relative to an optional base directory.
//! Decoded images are cached per source string.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use image::RgbaImage;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed data URL")]
    MalformedDataUrl,
    #[error("data URL payload is not base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot decode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("empty image source")]
    Empty,
}

/// Turns a source string into decoded pixels.
pub trait ImageResolver {
    fn resolve(&mut self, src: &str) -> Result<Arc<RgbaImage>, DecodeError>;
}

/// Resolver for data URLs and local files, with a per-source cache.
#[derive(Debug, Default)]
pub struct SourceCache {
    base_dir: Option<PathBuf>,
    decoded: HashMap<String, Arc<RgbaImage>>,
}

impl SourceCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve relative file paths against `dir`.
    pub fn with_base_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: Some(dir.into()),
            decoded: HashMap::new(),
        }
    }

    /// Seed the cache with already decoded pixels for `src`.
    pub fn insert(&mut self, src: impl Into<String>, image: RgbaImage) {
        self.decoded.insert(src.into(), Arc::new(image));
    }

    pub fn len(&self) -> usize {
        self.decoded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoded.is_empty()
    }

    fn load(&self, src: &str) -> Result<RgbaImage, DecodeError> {
        if src.is_empty() {
            return Err(DecodeError::Empty);
        }
        let bytes = match src.strip_prefix("data:") {
            Some(rest) => decode_data_url(rest)?,
            None => {
                let path = match &self.base_dir {
                    Some(dir) => dir.join(src),
                    None => Path::new(src).to_path_buf(),
                };
                std::fs::read(&path).map_err(|source| DecodeError::Io { path, source })?
            }
        };
        Ok(image::load_from_memory(&bytes)?.to_rgba8())
    }
}

impl ImageResolver for SourceCache {
    fn resolve(&mut self, src: &str) -> Result<Arc<RgbaImage>, DecodeError> {
        if let Some(hit) = self.decoded.get(src) {
            return Ok(Arc::clone(hit));
        }
        let image = Arc::new(self.load(src)?);
        log::debug!(
            "decoded {}x{} image from {}",
            image.width(),
            image.height(),
            short(src)
        );
        self.decoded.insert(src.to_string(), Arc::clone(&image));
        Ok(image)
    }
}

/// Payload of `data:[<mime>][;base64],<data>`, after the `data:` prefix.
fn decode_data_url(rest: &str) -> Result<Vec<u8>, DecodeError> {
    let (meta, payload) = rest.split_once(',').ok_or(DecodeError::MalformedDataUrl)?;
    if !meta.ends_with(";base64") {
        return Err(DecodeError::MalformedDataUrl);
    }
    Ok(STANDARD.decode(payload.trim())?)
}

/// Source string trimmed for log lines; data URLs can be megabytes.
pub(crate) fn short(src: &str) -> &str {
    match src.char_indices().nth(48) {
        Some((i, _)) => &src[..i],
        None => src,
    }
}
