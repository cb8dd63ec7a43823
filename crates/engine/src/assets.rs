use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use image::{ImageError, ImageReader};
use thiserror::Error;
use tracing::{debug, warn};

use crate::app::{TextureError, TextureHandle, TextureImage, TextureStore};
use crate::asset_names::{validate_asset_name, AssetNameError};

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("invalid asset name {name:?}: {source}")]
    InvalidName {
        name: String,
        #[source]
        source: AssetNameError,
    },
    #[error("failed to open texture {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode texture {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: ImageError,
    },
    #[error("invalid texture data for {name:?}: {source}")]
    Texture {
        name: String,
        #[source]
        source: TextureError,
    },
}

/// Texture provider rooted at the assets directory. Lookups are cached by
/// name, failures included; a failed load warns once and yields
/// `TextureHandle::NONE`.
#[derive(Debug)]
pub struct AssetManager {
    root: PathBuf,
    textures: TextureStore,
    by_name: HashMap<String, TextureHandle>,
    warned: HashSet<String>,
}

impl AssetManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            textures: TextureStore::default(),
            by_name: HashMap::new(),
            warned: HashSet::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn texture(&mut self, name: &str) -> TextureHandle {
        if let Some(handle) = self.by_name.get(name) {
            return *handle;
        }

        let handle = match self.load_texture(name) {
            Ok(handle) => {
                debug!(
                    texture = name,
                    width = handle.width(),
                    height = handle.height(),
                    "texture_loaded"
                );
                handle
            }
            Err(error) => {
                self.warn_load_once(name, &error);
                TextureHandle::NONE
            }
        };
        self.by_name.insert(name.to_string(), handle);
        handle
    }

    /// Registers an in-memory RGBA8 texture under `name`. A name that already
    /// holds a texture keeps its slot and gets the new pixels; a failed
    /// lookup is replaced.
    pub fn insert_rgba(
        &mut self,
        name: &str,
        width: u32,
        height: u32,
        rgba: Vec<u8>,
    ) -> Result<TextureHandle, AssetError> {
        validate_asset_name(name).map_err(|source| AssetError::InvalidName {
            name: name.to_string(),
            source,
        })?;
        let image = TextureImage::new(width, height, rgba).map_err(|source| AssetError::Texture {
            name: name.to_string(),
            source,
        })?;
        let existing = self.by_name.get(name).copied().unwrap_or(TextureHandle::NONE);
        let handle = match self.textures.replace(existing, image) {
            Ok(handle) => handle,
            Err(image) => self.textures.insert(image),
        };
        self.by_name.insert(name.to_string(), handle);
        Ok(handle)
    }

    pub fn textures(&self) -> &TextureStore {
        &self.textures
    }

    pub fn loaded_count(&self) -> usize {
        self.textures.len()
    }

    fn load_texture(&mut self, name: &str) -> Result<TextureHandle, AssetError> {
        validate_asset_name(name).map_err(|source| AssetError::InvalidName {
            name: name.to_string(),
            source,
        })?;
        let path = self.root.join(name);
        let reader = ImageReader::open(&path).map_err(|source| AssetError::Io {
            path: path.clone(),
            source,
        })?;
        let decoded = reader
            .decode()
            .map_err(|source| AssetError::Decode { path, source })?
            .to_rgba8();
        let image = TextureImage::new(decoded.width(), decoded.height(), decoded.into_raw())
            .map_err(|source| AssetError::Texture {
                name: name.to_string(),
                source,
            })?;
        Ok(self.textures.insert(image))
    }

    fn warn_load_once(&mut self, name: &str, error: &AssetError) {
        if !self.warned.insert(name.to_string()) {
            return;
        }
        warn!(texture = name, error = %error, "texture_load_failed_using_default");
    }
}
