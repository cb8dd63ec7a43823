use crate::math::{Mat4, Vec2, Vec3, Vec4};

use super::backend::{BufferWrite, FrameUniforms, GeometryUpload, RenderBackend};
use super::mesh::{Mesh, Vertex};
use super::texture::TextureHandle;

pub const MAX_LIGHTS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Sun,
    Point,
    Spot,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub position: Vec3,
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub radius: f32,
    pub spot_cutoff: f32,
}

/// Fixed-capacity light list. Past `MAX_LIGHTS` the oldest light is
/// overwritten.
#[derive(Debug, Default)]
pub struct LightBuffer {
    lights: Vec<Light>,
    next: usize,
}

impl LightBuffer {
    pub fn push(&mut self, light: Light) {
        if self.lights.len() < MAX_LIGHTS {
            self.lights.push(light);
        } else {
            self.lights[self.next] = light;
        }
        self.next = (self.next + 1) % MAX_LIGHTS;
    }

    pub fn as_slice(&self) -> &[Light] {
        &self.lights
    }

    pub fn len(&self) -> usize {
        self.lights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lights.is_empty()
    }

    pub fn clear(&mut self) {
        self.lights.clear();
        self.next = 0;
    }
}

/// Placement state read by `submit_sprite`. Region is a normalized UV rect
/// `(x, y, w, h)`; origin is the pivot as a fraction of the quad size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cursor {
    pub region: Vec4,
    pub position: Vec3,
    pub origin: Vec3,
    pub scale: Vec2,
    pub rotation: f32,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            region: Vec4::new(0.0, 0.0, 1.0, 1.0),
            position: Vec3::zeros(),
            origin: Vec3::new(0.5, 0.5, 0.5),
            scale: Vec2::new(1.0, 1.0),
            rotation: 0.0,
        }
    }
}

impl Cursor {
    pub fn reset(&mut self) -> &mut Self {
        *self = Self::default();
        self
    }

    pub fn region(&mut self, region: Vec4) -> &mut Self {
        self.region = region;
        self
    }

    pub fn position(&mut self, position: Vec3) -> &mut Self {
        self.position = position;
        self
    }

    pub fn origin(&mut self, origin: Vec3) -> &mut Self {
        self.origin = origin;
        self
    }

    pub fn scale(&mut self, scale: Vec2) -> &mut Self {
        self.scale = scale;
        self
    }

    pub fn rotation(&mut self, rotation: f32) -> &mut Self {
        self.rotation = rotation;
        self
    }

    fn model_matrix(&self) -> Mat4 {
        let mut matrix = Mat4::new_translation(&self.position);
        if self.rotation != 0.0 {
            matrix *= Mat4::from_scaled_axis(Vec3::new(0.0, 0.0, self.rotation));
        }
        if self.scale != Vec2::new(1.0, 1.0) {
            matrix *= Mat4::new_nonuniform_scaling(&Vec3::new(self.scale.x, self.scale.y, 1.0));
        }
        matrix
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Material {
    pub color: TextureHandle,
    pub normal: TextureHandle,
    pub specular: TextureHandle,
}

impl Material {
    pub fn new(color: TextureHandle) -> Self {
        Self {
            color,
            ..Self::default()
        }
    }

    pub fn with_normal(mut self, normal: TextureHandle) -> Self {
        self.normal = normal;
        self
    }

    pub fn with_specular(mut self, specular: TextureHandle) -> Self {
        self.specular = specular;
        self
    }
}

/// A run of indices sharing one material and draw mode. `offset` and
/// `length` count indices into the uploaded index buffer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Batch {
    pub transform: bool,
    pub model: Mat4,
    pub offset: usize,
    pub length: usize,
    pub material: Material,
}

#[derive(Debug)]
struct Drawable {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    transform: bool,
    model: Mat4,
    material: Material,
}

impl Drawable {
    fn batches_with(&self, other: &Drawable) -> bool {
        self.material == other.material
            && self.transform == other.transform
            && (!self.transform || self.model == other.model)
    }
}

#[derive(Debug)]
pub struct RenderContext {
    drawables: Vec<Drawable>,
    batches: Vec<Batch>,
    lights: LightBuffer,
    cursor: Cursor,
    view: Mat4,
    projection: Mat4,
    ambient: Vec3,
    environment: TextureHandle,
    viewport: (u32, u32),
    vertex_capacity: usize,
    index_capacity: usize,
    merged_vertices: Vec<Vertex>,
    merged_indices: Vec<u32>,
}

impl Default for RenderContext {
    fn default() -> Self {
        Self {
            drawables: Vec::new(),
            batches: Vec::new(),
            lights: LightBuffer::default(),
            cursor: Cursor::default(),
            view: Mat4::identity(),
            projection: Mat4::identity(),
            ambient: Vec3::zeros(),
            environment: TextureHandle::NONE,
            viewport: (1, 1),
            vertex_capacity: 0,
            index_capacity: 0,
            merged_vertices: Vec::new(),
            merged_indices: Vec::new(),
        }
    }
}

impl RenderContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self) {
        self.drawables.clear();
        self.batches.clear();
    }

    pub fn cursor_mut(&mut self) -> &mut Cursor {
        &mut self.cursor
    }

    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Queues a mesh drawn with its own model matrix.
    pub fn submit(&mut self, mesh: &Mesh, model: Mat4, material: Material) {
        self.drawables.push(Drawable {
            vertices: mesh.vertices.clone(),
            indices: mesh.indices.clone(),
            transform: true,
            model,
            material,
        });
    }

    /// Queues a quad placed by the cursor and baked into world space. The
    /// longer side of the color texture spans one unit.
    pub fn submit_sprite(&mut self, material: Material, tint: Vec4) {
        let (width, height) = sprite_extent(material.color);
        let region = self.cursor.region;
        let (u0, u1) = (region.x, region.x + region.z);
        let (v0, v1) = (region.y, region.y + region.w);

        let pivot = self.cursor.origin.component_mul(&Vec3::new(width, height, 1.0));
        let corners = [
            (Vec3::new(0.0, 0.0, 0.0), Vec2::new(u0, v1)),
            (Vec3::new(width, 0.0, 0.0), Vec2::new(u1, v1)),
            (Vec3::new(width, height, 0.0), Vec2::new(u1, v0)),
            (Vec3::new(0.0, height, 0.0), Vec2::new(u0, v0)),
        ];
        let vertices = corners
            .iter()
            .map(|(position, uv)| Vertex::new(position - pivot, *uv, tint))
            .collect();

        let mut quad = Mesh::new(vertices, vec![0, 1, 2, 0, 2, 3]);
        quad.transform(&self.cursor.model_matrix());
        quad.calculate_tangents();

        self.drawables.push(Drawable {
            vertices: quad.vertices,
            indices: quad.indices,
            transform: false,
            model: Mat4::identity(),
            material,
        });
    }

    pub fn submit_sun_light(&mut self, direction: Vec3, color: Vec3, intensity: f32) {
        self.lights.push(Light {
            kind: LightKind::Sun,
            position: Vec3::zeros(),
            direction,
            color,
            intensity,
            radius: 0.0,
            spot_cutoff: 0.0,
        });
    }

    pub fn submit_point_light(&mut self, position: Vec3, color: Vec3, intensity: f32, radius: f32) {
        self.lights.push(Light {
            kind: LightKind::Point,
            position,
            direction: Vec3::zeros(),
            color,
            intensity,
            radius,
            spot_cutoff: 0.0,
        });
    }

    #[allow(clippy::too_many_arguments)]
    pub fn submit_spot_light(
        &mut self,
        position: Vec3,
        direction: Vec3,
        color: Vec3,
        intensity: f32,
        radius: f32,
        cutoff: f32,
    ) {
        self.lights.push(Light {
            kind: LightKind::Spot,
            position,
            direction,
            color,
            intensity,
            radius,
            spot_cutoff: cutoff,
        });
    }

    /// Sorts and merges the queued draws, uploads the merged geometry and
    /// issues one draw per batch. Returns the batch count. Lights are
    /// consumed.
    pub fn end(&mut self, backend: &mut dyn RenderBackend) -> usize {
        self.build_batches();

        if !self.batches.is_empty() {
            let vertex_write = grow_capacity(&mut self.vertex_capacity, self.merged_vertices.len());
            let index_write = grow_capacity(&mut self.index_capacity, self.merged_indices.len());
            backend.upload_geometry(GeometryUpload {
                vertices: &self.merged_vertices,
                indices: &self.merged_indices,
                vertex_write,
                index_write,
            });

            let uniforms = FrameUniforms {
                view: self.view,
                projection: self.projection,
                ambient: self.ambient,
                environment: self.environment,
                lights: self.lights.as_slice(),
            };
            for batch in &self.batches {
                backend.draw_batch(&uniforms, batch);
            }
        }

        self.lights.clear();
        self.batches.len()
    }

    fn build_batches(&mut self) {
        self.batches.clear();
        self.merged_vertices.clear();
        self.merged_indices.clear();

        // Stable, so equal keys keep submission order.
        self.drawables
            .sort_by_key(|drawable| (drawable.material.color.id(), drawable.transform));

        let mut previous: Option<&Drawable> = None;
        for drawable in &self.drawables {
            let base = self.merged_vertices.len() as u32;
            let offset = self.merged_indices.len();
            self.merged_vertices.extend_from_slice(&drawable.vertices);
            self.merged_indices
                .extend(drawable.indices.iter().map(|index| index + base));

            let merge = previous.is_some_and(|prev| prev.batches_with(drawable));
            match self.batches.last_mut() {
                Some(batch) if merge => batch.length += drawable.indices.len(),
                _ => self.batches.push(Batch {
                    transform: drawable.transform,
                    model: drawable.model,
                    offset,
                    length: drawable.indices.len(),
                    material: drawable.material,
                }),
            }
            previous = Some(drawable);
        }
    }

    pub fn set_view(&mut self, view: Mat4) {
        self.view = view;
    }

    pub fn set_projection(&mut self, projection: Mat4) {
        self.projection = projection;
    }

    pub fn view(&self) -> Mat4 {
        self.view
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    pub fn set_ambient(&mut self, ambient: Vec3) {
        self.ambient = ambient;
    }

    pub fn set_environment(&mut self, environment: TextureHandle) {
        self.environment = environment;
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width.max(1), height.max(1));
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.viewport.0 as f32 / self.viewport.1 as f32
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn lights(&self) -> &[Light] {
        self.lights.as_slice()
    }

    pub fn pending_draws(&self) -> usize {
        self.drawables.len()
    }

    /// Current (vertex, index) buffer capacities. They only grow.
    pub fn buffer_capacity(&self) -> (usize, usize) {
        (self.vertex_capacity, self.index_capacity)
    }
}

fn sprite_extent(color: TextureHandle) -> (f32, f32) {
    if color.width() == 0 || color.height() == 0 {
        return (1.0, 1.0);
    }
    let aspect = color.width() as f32 / color.height() as f32;
    if aspect >= 1.0 {
        (1.0, 1.0 / aspect)
    } else {
        (aspect, 1.0)
    }
}

fn grow_capacity(capacity: &mut usize, needed: usize) -> BufferWrite {
    if needed > *capacity {
        *capacity = needed;
        BufferWrite::Reallocate { capacity: needed }
    } else {
        BufferWrite::Update
    }
}
