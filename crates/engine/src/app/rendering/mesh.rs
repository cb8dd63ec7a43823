use crate::math::{normalize3_or_zero, Mat4, Vec2, Vec3, Vec4};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tangent: Vec3,
    pub tex_coord: Vec2,
    pub color: Vec4,
}

impl Vertex {
    pub fn new(position: Vec3, tex_coord: Vec2, color: Vec4) -> Self {
        Self {
            position,
            normal: Vec3::new(0.0, 0.0, 1.0),
            tangent: Vec3::zeros(),
            tex_coord,
            color,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    fn triangles(&self) -> impl Iterator<Item = [usize; 3]> + '_ {
        self.indices
            .chunks_exact(3)
            .map(|tri| [tri[0] as usize, tri[1] as usize, tri[2] as usize])
            .filter(|tri| tri.iter().all(|index| *index < self.vertices.len()))
    }

    /// Smooth normals from accumulated face normals.
    pub fn calculate_normals(&mut self) {
        let mut sums = vec![Vec3::zeros(); self.vertices.len()];
        for [a, b, c] in self.triangles() {
            let p0 = self.vertices[a].position;
            let face = (self.vertices[b].position - p0).cross(&(self.vertices[c].position - p0));
            for index in [a, b, c] {
                sums[index] += face;
            }
        }
        for (vertex, sum) in self.vertices.iter_mut().zip(sums) {
            vertex.normal = normalize3_or_zero(sum);
        }
    }

    /// Per-vertex tangents from position and texture-coordinate deltas.
    /// Triangles with degenerate UVs contribute nothing.
    pub fn calculate_tangents(&mut self) {
        let mut sums = vec![Vec3::zeros(); self.vertices.len()];
        for [a, b, c] in self.triangles() {
            let (v0, v1, v2) = (self.vertices[a], self.vertices[b], self.vertices[c]);
            let edge1 = v1.position - v0.position;
            let edge2 = v2.position - v0.position;
            let duv1 = v1.tex_coord - v0.tex_coord;
            let duv2 = v2.tex_coord - v0.tex_coord;

            let det = duv1.x * duv2.y - duv2.x * duv1.y;
            if det.abs() < f32::EPSILON {
                continue;
            }
            let tangent = (edge1 * duv2.y - edge2 * duv1.y) / det;
            for index in [a, b, c] {
                sums[index] += tangent;
            }
        }
        for (vertex, sum) in self.vertices.iter_mut().zip(sums) {
            vertex.tangent = normalize3_or_zero(sum);
        }
    }

    pub fn transform(&mut self, matrix: &Mat4) {
        for vertex in &mut self.vertices {
            vertex.position = matrix.transform_point(&vertex.position.into()).coords;
            vertex.normal = normalize3_or_zero(matrix.transform_vector(&vertex.normal));
            vertex.tangent = normalize3_or_zero(matrix.transform_vector(&vertex.tangent));
        }
    }
}
