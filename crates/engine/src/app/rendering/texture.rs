use thiserror::Error;

use crate::math::{Vec2, Vec4};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TextureError {
    #[error("texture {width}x{height} needs {expected} rgba bytes, got {actual}")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Opaque texture reference. Id 0 is the "no texture" handle, which samples
/// as opaque white.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct TextureHandle {
    id: u32,
    width: u32,
    height: u32,
}

impl TextureHandle {
    pub const NONE: TextureHandle = TextureHandle {
        id: 0,
        width: 0,
        height: 0,
    };

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_none(&self) -> bool {
        self.id == 0
    }

    #[cfg(test)]
    pub(crate) fn for_tests(id: u32, width: u32, height: u32) -> Self {
        Self { id, width, height }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextureImage {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl TextureImage {
    pub fn new(width: u32, height: u32, rgba: Vec<u8>) -> Result<Self, TextureError> {
        let expected = width as usize * height as usize * 4;
        if rgba.len() != expected {
            return Err(TextureError::SizeMismatch {
                width,
                height,
                expected,
                actual: rgba.len(),
            });
        }
        Ok(Self {
            width,
            height,
            rgba,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Nearest-neighbour sample with repeat wrapping; `v` grows downward
    /// through the image rows. Channels are in [0, 1].
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        if self.width == 0 || self.height == 0 {
            return Vec4::new(1.0, 1.0, 1.0, 1.0);
        }
        let u = uv.x - uv.x.floor();
        let v = uv.y - uv.y.floor();
        let x = ((u * self.width as f32) as u32).min(self.width - 1);
        let y = ((v * self.height as f32) as u32).min(self.height - 1);
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let texel = &self.rgba[offset..offset + 4];
        Vec4::new(
            texel[0] as f32 / 255.0,
            texel[1] as f32 / 255.0,
            texel[2] as f32 / 255.0,
            texel[3] as f32 / 255.0,
        )
    }
}

#[derive(Debug, Default)]
pub struct TextureStore {
    images: Vec<TextureImage>,
}

impl TextureStore {
    pub fn insert(&mut self, image: TextureImage) -> TextureHandle {
        let handle = TextureHandle {
            id: self.images.len() as u32 + 1,
            width: image.width,
            height: image.height,
        };
        self.images.push(image);
        handle
    }

    /// Swaps the image behind `handle`, keeping its id, and returns the
    /// handle with the new dimensions. Hands the image back when `handle` is
    /// not in the store.
    pub fn replace(
        &mut self,
        handle: TextureHandle,
        image: TextureImage,
    ) -> Result<TextureHandle, TextureImage> {
        let Some(slot) = (handle.id as usize)
            .checked_sub(1)
            .and_then(|index| self.images.get_mut(index))
        else {
            return Err(image);
        };
        let replaced = TextureHandle {
            id: handle.id,
            width: image.width,
            height: image.height,
        };
        *slot = image;
        Ok(replaced)
    }

    pub fn get(&self, handle: TextureHandle) -> Option<&TextureImage> {
        if handle.is_none() {
            return None;
        }
        self.images.get(handle.id as usize - 1)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
