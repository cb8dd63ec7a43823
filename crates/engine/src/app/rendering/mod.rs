pub(crate) mod backend;
mod context;
mod debug_draw;
mod mesh;
mod raster;
mod renderer;
mod texture;
mod transform;

pub use backend::{BufferWrite, FrameUniforms, GeometryUpload, RenderBackend};
pub use context::{Batch, Cursor, Light, LightBuffer, LightKind, Material, RenderContext, MAX_LIGHTS};
pub use debug_draw::{DebugDraw, LineVertex};
pub use mesh::{Mesh, Vertex};
pub use raster::{RasterState, RasterTarget};
pub use renderer::Renderer;
pub use texture::{TextureError, TextureHandle, TextureImage, TextureStore};
pub use transform::{perspective, project_to_screen, ScreenPoint, Viewport};
