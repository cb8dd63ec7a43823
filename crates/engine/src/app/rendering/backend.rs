use crate::math::{Mat4, Vec3};

use super::context::{Batch, Light};
use super::debug_draw::LineVertex;
use super::mesh::Vertex;
use super::texture::TextureHandle;

/// How an upload should treat the backend's existing buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferWrite {
    /// Allocate a new buffer of `capacity` elements.
    Reallocate { capacity: usize },
    /// Overwrite the front of the existing buffer.
    Update,
}

#[derive(Debug, Clone, Copy)]
pub struct GeometryUpload<'a> {
    pub vertices: &'a [Vertex],
    pub indices: &'a [u32],
    pub vertex_write: BufferWrite,
    pub index_write: BufferWrite,
}

#[derive(Debug, Clone, Copy)]
pub struct FrameUniforms<'a> {
    pub view: Mat4,
    pub projection: Mat4,
    pub ambient: Vec3,
    pub environment: TextureHandle,
    pub lights: &'a [Light],
}

/// Receiver of the batched frame produced by `RenderContext::end`.
pub trait RenderBackend {
    fn upload_geometry(&mut self, upload: GeometryUpload<'_>);
    fn draw_batch(&mut self, uniforms: &FrameUniforms<'_>, batch: &Batch);
    fn draw_lines(&mut self, view_projection: &Mat4, lines: &[LineVertex]);
}
