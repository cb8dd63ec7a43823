use crate::math::{normalize3_or_zero, Mat4, Vec2, Vec3, Vec4};

use super::backend::{BufferWrite, FrameUniforms, GeometryUpload, RenderBackend};
use super::context::{Batch, Light, LightKind};
use super::debug_draw::LineVertex;
use super::mesh::Vertex;
use super::texture::{TextureHandle, TextureStore};
use super::transform::{project_to_screen, ScreenPoint, Viewport};

const OPAQUE_ALPHA: f32 = 0.5;
const MIN_VISIBLE_ALPHA: f32 = 0.01;

/// Buffers that outlive a single frame: the depth buffer and the last
/// uploaded geometry.
#[derive(Debug, Default)]
pub struct RasterState {
    depth: Vec<f32>,
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
}

impl RasterState {
    pub fn uploaded(&self) -> (usize, usize) {
        (self.vertices.len(), self.indices.len())
    }
}

/// Software rasterizer writing RGBA8 into a borrowed frame.
pub struct RasterTarget<'a> {
    frame: &'a mut [u8],
    viewport: Viewport,
    state: &'a mut RasterState,
    textures: &'a TextureStore,
}

#[derive(Clone, Copy)]
struct ShadedVertex {
    screen: ScreenPoint,
    world: Vec3,
    normal: Vec3,
    tangent: Vec3,
    tex_coord: Vec2,
    color: Vec4,
}

impl<'a> RasterTarget<'a> {
    pub fn new(
        frame: &'a mut [u8],
        viewport: Viewport,
        state: &'a mut RasterState,
        textures: &'a TextureStore,
    ) -> Self {
        let pixel_count = viewport.width as usize * viewport.height as usize;
        state.depth.clear();
        state.depth.resize(pixel_count, f32::INFINITY);
        Self {
            frame,
            viewport,
            state,
            textures,
        }
    }

    pub fn clear(&mut self, color: [u8; 4]) {
        for chunk in self.frame.chunks_exact_mut(4) {
            chunk.copy_from_slice(&color);
        }
        self.state.depth.fill(f32::INFINITY);
    }

    fn sample(&self, texture: TextureHandle, uv: Vec2) -> Option<Vec4> {
        self.textures.get(texture).map(|image| image.sample(uv))
    }

    fn shade_vertex(&self, vertex: &Vertex, model: &Mat4, clip_from_world: &Mat4) -> Option<ShadedVertex> {
        let world = model.transform_point(&vertex.position.into()).coords;
        let screen = project_to_screen(clip_from_world, world, self.viewport)?;
        Some(ShadedVertex {
            screen,
            world,
            normal: normalize3_or_zero(model.transform_vector(&vertex.normal)),
            tangent: normalize3_or_zero(model.transform_vector(&vertex.tangent)),
            tex_coord: vertex.tex_coord,
            color: vertex.color,
        })
    }

    fn shade_fragment(
        &self,
        uniforms: &FrameUniforms<'_>,
        batch: &Batch,
        fragment: &ShadedVertex,
    ) -> Vec4 {
        let albedo = self
            .sample(batch.material.color, fragment.tex_coord)
            .unwrap_or_else(|| Vec4::new(1.0, 1.0, 1.0, 1.0))
            .component_mul(&fragment.color);

        let mut normal = normalize3_or_zero(fragment.normal);
        if let Some(texel) = self.sample(batch.material.normal, fragment.tex_coord) {
            let tangent = normalize3_or_zero(fragment.tangent);
            let bitangent = normal.cross(&tangent);
            let local = texel.xyz() * 2.0 - Vec3::new(1.0, 1.0, 1.0);
            normal = normalize3_or_zero(tangent * local.x + bitangent * local.y + normal * local.z);
        }

        let mut light = uniforms.ambient;
        for source in uniforms.lights {
            light += light_contribution(source, fragment.world, normal);
        }
        let mut rgb = albedo.xyz().component_mul(&light);

        if let Some(specular) = self.sample(batch.material.specular, fragment.tex_coord) {
            let reflected = Vec2::new(normal.x * 0.5 + 0.5, normal.y * 0.5 + 0.5);
            if let Some(environment) = self.sample(uniforms.environment, reflected) {
                rgb += environment.xyz() * specular.x;
            }
        }

        Vec4::new(rgb.x, rgb.y, rgb.z, albedo.w)
    }

    fn fill_triangle(
        &mut self,
        uniforms: &FrameUniforms<'_>,
        batch: &Batch,
        corners: [ShadedVertex; 3],
    ) {
        let [a, b, c] = corners.map(|corner| corner.screen);
        let area = edge(a, b, c.x, c.y);
        if area.abs() < f32::EPSILON {
            return;
        }

        let width = self.viewport.width as i32;
        let height = self.viewport.height as i32;
        let min_x = (a.x.min(b.x).min(c.x).floor() as i32).max(0);
        let max_x = (a.x.max(b.x).max(c.x).ceil() as i32).min(width - 1);
        let min_y = (a.y.min(b.y).min(c.y).floor() as i32).max(0);
        let max_y = (a.y.max(b.y).max(c.y).ceil() as i32).min(height - 1);

        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let (px, py) = (x as f32 + 0.5, y as f32 + 0.5);
                let w0 = edge(b, c, px, py) / area;
                let w1 = edge(c, a, px, py) / area;
                let w2 = edge(a, b, px, py) / area;
                if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
                    continue;
                }

                let depth = a.depth * w0 + b.depth * w1 + c.depth * w2;
                let pixel = y as usize * self.viewport.width as usize + x as usize;
                if depth < -1.0 || depth > 1.0 || depth >= self.state.depth[pixel] {
                    continue;
                }

                let fragment = interpolate(&corners, [w0, w1, w2]);
                let color = self.shade_fragment(uniforms, batch, &fragment);
                if color.w < MIN_VISIBLE_ALPHA {
                    continue;
                }
                if color.w >= OPAQUE_ALPHA {
                    self.state.depth[pixel] = depth;
                }
                blend_pixel(self.frame, pixel, color);
            }
        }
    }

    fn draw_line(&mut self, from: ScreenPoint, to: ScreenPoint, color: Vec4) {
        let (mut x0, mut y0) = (from.x as i32, from.y as i32);
        let (x1, y1) = (to.x as i32, to.y as i32);
        let dx = (x1 - x0).abs();
        let dy = -(y1 - y0).abs();
        let sx = if x0 < x1 { 1 } else { -1 };
        let sy = if y0 < y1 { 1 } else { -1 };
        let mut error = dx + dy;
        let width = self.viewport.width as i32;
        let height = self.viewport.height as i32;

        loop {
            if x0 >= 0 && y0 >= 0 && x0 < width && y0 < height {
                let pixel = y0 as usize * width as usize + x0 as usize;
                blend_pixel(self.frame, pixel, color);
            }
            if x0 == x1 && y0 == y1 {
                break;
            }
            let doubled = 2 * error;
            if doubled >= dy {
                error += dy;
                x0 += sx;
            }
            if doubled <= dx {
                error += dx;
                y0 += sy;
            }
        }
    }
}

impl RenderBackend for RasterTarget<'_> {
    fn upload_geometry(&mut self, upload: GeometryUpload<'_>) {
        write_buffer(&mut self.state.vertices, upload.vertices, upload.vertex_write);
        write_buffer(&mut self.state.indices, upload.indices, upload.index_write);
    }

    fn draw_batch(&mut self, uniforms: &FrameUniforms<'_>, batch: &Batch) {
        if self.viewport.is_empty() {
            return;
        }
        let clip_from_world = uniforms.projection * uniforms.view;
        let model = if batch.transform {
            batch.model
        } else {
            Mat4::identity()
        };

        let end = (batch.offset + batch.length).min(self.state.indices.len());
        let start = batch.offset.min(end);
        for triangle in (start..end).step_by(3) {
            if triangle + 3 > end {
                break;
            }
            let mut corners = Vec::with_capacity(3);
            for index in &self.state.indices[triangle..triangle + 3] {
                let Some(vertex) = self.state.vertices.get(*index as usize) else {
                    break;
                };
                let Some(shaded) = self.shade_vertex(vertex, &model, &clip_from_world) else {
                    break;
                };
                corners.push(shaded);
            }
            if let [a, b, c] = corners[..] {
                self.fill_triangle(uniforms, batch, [a, b, c]);
            }
        }
    }

    fn draw_lines(&mut self, view_projection: &Mat4, lines: &[LineVertex]) {
        if self.viewport.is_empty() {
            return;
        }
        for pair in lines.chunks_exact(2) {
            let from = project_to_screen(view_projection, pair[0].position, self.viewport);
            let to = project_to_screen(view_projection, pair[1].position, self.viewport);
            if let (Some(from), Some(to)) = (from, to) {
                self.draw_line(from, to, pair[0].color);
            }
        }
    }
}

fn write_buffer<T: Copy>(buffer: &mut Vec<T>, data: &[T], write: BufferWrite) {
    buffer.clear();
    if let BufferWrite::Reallocate { capacity } = write {
        buffer.reserve_exact(capacity);
    }
    buffer.extend_from_slice(data);
}

fn edge(a: ScreenPoint, b: ScreenPoint, x: f32, y: f32) -> f32 {
    (b.x - a.x) * (y - a.y) - (b.y - a.y) * (x - a.x)
}

fn interpolate(corners: &[ShadedVertex; 3], weights: [f32; 3]) -> ShadedVertex {
    let [a, b, c] = corners;
    let [w0, w1, w2] = weights;
    ShadedVertex {
        screen: ScreenPoint {
            x: a.screen.x * w0 + b.screen.x * w1 + c.screen.x * w2,
            y: a.screen.y * w0 + b.screen.y * w1 + c.screen.y * w2,
            depth: a.screen.depth * w0 + b.screen.depth * w1 + c.screen.depth * w2,
        },
        world: a.world * w0 + b.world * w1 + c.world * w2,
        normal: a.normal * w0 + b.normal * w1 + c.normal * w2,
        tangent: a.tangent * w0 + b.tangent * w1 + c.tangent * w2,
        tex_coord: a.tex_coord * w0 + b.tex_coord * w1 + c.tex_coord * w2,
        color: a.color * w0 + b.color * w1 + c.color * w2,
    }
}

fn light_contribution(light: &Light, position: Vec3, normal: Vec3) -> Vec3 {
    let radiance = light.color * light.intensity;
    match light.kind {
        LightKind::Sun => {
            let towards = normalize3_or_zero(-light.direction);
            radiance * normal.dot(&towards).max(0.0)
        }
        LightKind::Point | LightKind::Spot => {
            let offset = light.position - position;
            let distance = offset.norm();
            if light.radius <= 0.0 || distance >= light.radius {
                return Vec3::zeros();
            }
            let towards = normalize3_or_zero(offset);
            let falloff = (1.0 - distance / light.radius).powi(2);
            let mut amount = normal.dot(&towards).max(0.0) * falloff;
            if light.kind == LightKind::Spot {
                amount *= spot_factor(light, -towards);
            }
            radiance * amount
        }
    }
}

fn spot_factor(light: &Light, from_light: Vec3) -> f32 {
    let alignment = from_light.dot(&normalize3_or_zero(light.direction));
    let span = (1.0 - light.spot_cutoff).max(f32::EPSILON);
    ((alignment - light.spot_cutoff) / span).clamp(0.0, 1.0)
}

fn blend_pixel(frame: &mut [u8], pixel: usize, color: Vec4) {
    let Some(byte_offset) = pixel.checked_mul(4) else {
        return;
    };
    let Some(end) = byte_offset.checked_add(4) else {
        return;
    };
    if end > frame.len() {
        return;
    }
    let alpha = color.w.clamp(0.0, 1.0);
    let target = &mut frame[byte_offset..end];
    for (channel, source) in target.iter_mut().take(3).zip([color.x, color.y, color.z]) {
        let existing = *channel as f32 / 255.0;
        let mixed = source.clamp(0.0, 1.0) * alpha + existing * (1.0 - alpha);
        *channel = (mixed * 255.0).round() as u8;
    }
    target[3] = 255;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::rendering::context::{Material, RenderContext};
    use crate::app::rendering::texture::TextureImage;

    const SIZE: u32 = 16;

    fn viewport() -> Viewport {
        Viewport {
            width: SIZE,
            height: SIZE,
        }
    }

    fn pixel(frame: &[u8], x: u32, y: u32) -> [u8; 4] {
        let offset = ((y * SIZE + x) * 4) as usize;
        [frame[offset], frame[offset + 1], frame[offset + 2], frame[offset + 3]]
    }

    fn full_screen_sprite(ctx: &mut RenderContext, material: Material, tint: Vec4, z: f32) {
        ctx.cursor_mut()
            .position(Vec3::new(0.0, 0.0, z))
            .origin(Vec3::new(0.5, 0.5, 0.0))
            .scale(Vec2::new(2.0, 2.0));
        ctx.submit_sprite(material, tint);
    }

    #[test]
    fn lit_sprite_covers_the_frame_with_ambient_tint() {
        let mut frame = vec![0u8; (SIZE * SIZE * 4) as usize];
        let mut state = RasterState::default();
        let textures = TextureStore::default();
        let mut ctx = RenderContext::new();
        ctx.set_ambient(Vec3::new(1.0, 1.0, 1.0));
        ctx.begin();
        full_screen_sprite(&mut ctx, Material::default(), Vec4::new(1.0, 0.0, 0.0, 1.0), 0.0);

        let mut target = RasterTarget::new(&mut frame, viewport(), &mut state, &textures);
        target.clear([0, 0, 0, 255]);
        ctx.end(&mut target);

        assert_eq!(pixel(&frame, 8, 8), [255, 0, 0, 255]);
        assert_eq!(pixel(&frame, 0, 15), [255, 0, 0, 255]);
    }

    #[test]
    fn nearer_geometry_wins_the_depth_test() {
        let mut frame = vec![0u8; (SIZE * SIZE * 4) as usize];
        let mut state = RasterState::default();
        let textures = TextureStore::default();
        let mut ctx = RenderContext::new();
        ctx.set_ambient(Vec3::new(1.0, 1.0, 1.0));
        ctx.begin();
        full_screen_sprite(&mut ctx, Material::default(), Vec4::new(0.0, 0.0, 1.0, 1.0), -0.5);
        full_screen_sprite(&mut ctx, Material::default(), Vec4::new(0.0, 1.0, 0.0, 1.0), 0.5);

        let mut target = RasterTarget::new(&mut frame, viewport(), &mut state, &textures);
        ctx.end(&mut target);

        assert_eq!(pixel(&frame, 8, 8), [0, 0, 255, 255]);
    }

    #[test]
    fn texture_sample_multiplies_vertex_tint() {
        let mut frame = vec![0u8; (SIZE * SIZE * 4) as usize];
        let mut state = RasterState::default();
        let mut textures = TextureStore::default();
        let gray = textures.insert(TextureImage::new(1, 1, vec![128, 128, 128, 255]).expect("image"));
        let mut ctx = RenderContext::new();
        ctx.set_ambient(Vec3::new(1.0, 1.0, 1.0));
        ctx.begin();
        full_screen_sprite(&mut ctx, Material::new(gray), Vec4::new(1.0, 1.0, 0.0, 1.0), 0.0);

        let mut target = RasterTarget::new(&mut frame, viewport(), &mut state, &textures);
        ctx.end(&mut target);

        assert_eq!(pixel(&frame, 4, 4), [128, 128, 0, 255]);
    }

    #[test]
    fn point_light_falls_off_with_distance() {
        let close = Light {
            kind: LightKind::Point,
            position: Vec3::new(0.0, 0.0, 1.0),
            direction: Vec3::zeros(),
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity: 1.0,
            radius: 6.0,
            spot_cutoff: 0.0,
        };
        let normal = Vec3::new(0.0, 0.0, 1.0);
        let near = light_contribution(&close, Vec3::zeros(), normal);
        let far = light_contribution(&close, Vec3::new(3.0, 0.0, 0.0), normal);
        let outside = light_contribution(&close, Vec3::new(10.0, 0.0, 0.0), normal);

        assert!(near.x > far.x);
        assert!(far.x > 0.0);
        assert_eq!(outside, Vec3::zeros());
    }

    #[test]
    fn spot_light_ignores_points_behind_its_cone() {
        let spot = Light {
            kind: LightKind::Spot,
            position: Vec3::new(0.0, 0.0, 0.5),
            direction: Vec3::new(1.0, 0.0, -0.35),
            color: Vec3::new(1.0, 1.0, 1.0),
            intensity: 1.0,
            radius: 6.0,
            spot_cutoff: 0.6,
        };
        let normal = Vec3::new(0.0, 0.0, 1.0);
        assert!(light_contribution(&spot, Vec3::new(2.0, 0.0, 0.0), normal).x > 0.0);
        assert_eq!(
            light_contribution(&spot, Vec3::new(-2.0, 0.0, 0.0), normal),
            Vec3::zeros()
        );
    }

    #[test]
    fn lines_are_drawn_without_depth_and_clipped() {
        let mut frame = vec![0u8; (SIZE * SIZE * 4) as usize];
        let mut state = RasterState::default();
        let textures = TextureStore::default();
        let mut target = RasterTarget::new(&mut frame, viewport(), &mut state, &textures);
        let white = Vec4::new(1.0, 1.0, 1.0, 1.0);
        target.draw_lines(
            &Mat4::identity(),
            &[
                LineVertex {
                    position: Vec3::new(-2.0, 0.0, 0.0),
                    color: white,
                },
                LineVertex {
                    position: Vec3::new(2.0, 0.0, 0.0),
                    color: white,
                },
            ],
        );

        assert_eq!(pixel(&frame, 5, 8), [255, 255, 255, 255]);
        assert_eq!(pixel(&frame, 5, 3), [0, 0, 0, 0]);
    }
}
