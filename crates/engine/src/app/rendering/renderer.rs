use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use super::raster::{RasterState, RasterTarget};
use super::texture::TextureStore;
use super::Viewport;

const CLEAR_COLOR: [u8; 4] = [12, 13, 18, 255];

/// Presents software-rasterized frames through a `pixels` surface sized to
/// the window.
pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    viewport: Viewport,
    raster: RasterState,
}

impl Renderer {
    pub fn new(window: Arc<Window>) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(Arc::clone(&window), size.width, size.height)?;
        Ok(Self {
            window,
            pixels,
            viewport: Viewport {
                width: size.width,
                height: size.height,
            },
            raster: RasterState::default(),
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.viewport = Viewport { width, height };
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Clears the frame, lets `draw` fill it through the raster backend and
    /// presents the result.
    pub fn render_frame<F>(&mut self, textures: &TextureStore, draw: F) -> Result<(), Error>
    where
        F: FnOnce(&mut RasterTarget<'_>),
    {
        if self.viewport.is_empty() {
            return Ok(());
        }
        draw_into_frame(
            self.pixels.frame_mut(),
            self.viewport,
            &mut self.raster,
            textures,
            draw,
        );
        self.pixels.render()
    }
}

/// Clears `frame` and rasterizes whatever `draw` submits into it.
fn draw_into_frame<F>(
    frame: &mut [u8],
    viewport: Viewport,
    raster: &mut RasterState,
    textures: &TextureStore,
    draw: F,
) where
    F: FnOnce(&mut RasterTarget<'_>),
{
    let mut target = RasterTarget::new(frame, viewport, raster, textures);
    target.clear(CLEAR_COLOR);
    draw(&mut target);
}
