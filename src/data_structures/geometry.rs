//! CPU-side vertex data.
//!
//! Geometry is decoded from glTF primitives or generated procedurally and
//! handed to the renderer as-is. Index buffers are always `u32`.

/// Vertex attributes of a single drawable primitive.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geometry {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub tex_coords: Vec<[f32; 2]>,
    pub indices: Vec<u32>,
}

impl Geometry {
    /// A flat disk in the XY plane facing +Z, built as a triangle fan.
    ///
    /// Vertex 0 is the centre, followed by `segments + 1` rim vertices (the
    /// first and last rim vertex coincide so the texture seam closes).
    /// Texture coordinates map the disk onto the unit square.
    pub fn circle(radius: f32, segments: u32) -> Self {
        let segments = segments.max(3);
        let mut geometry = Self::default();

        geometry.positions.push([0.0, 0.0, 0.0]);
        geometry.normals.push([0.0, 0.0, 1.0]);
        geometry.tex_coords.push([0.5, 0.5]);

        for s in 0..=segments {
            let theta = s as f32 / segments as f32 * std::f32::consts::TAU;
            let (sin, cos) = theta.sin_cos();
            geometry.positions.push([radius * cos, radius * sin, 0.0]);
            geometry.normals.push([0.0, 0.0, 1.0]);
            geometry.tex_coords.push([(cos + 1.0) / 2.0, (sin + 1.0) / 2.0]);
        }

        for i in 1..=segments {
            geometry.indices.extend_from_slice(&[i, i + 1, 0]);
        }
        geometry
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Distance of the farthest vertex from the local origin.
    pub fn bounding_radius(&self) -> f32 {
        self.positions
            .iter()
            .map(|[x, y, z]| (x * x + y * y + z * z).sqrt())
            .fold(0.0, f32::max)
    }

    /// Fills in sequential indices for non-indexed primitives.
    pub(crate) fn ensure_indices(&mut self) {
        if self.indices.is_empty() {
            self.indices = (0..self.positions.len() as u32).collect();
        }
    }
}
