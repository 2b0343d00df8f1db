use glam::Vec3;

/// CPU-side model mesh: interleaved [pos.x, pos.y, pos.z, norm.x, norm.y, norm.z]
#[derive(Clone, Debug, Default)]
pub struct MeshData {
    /// 6 floats per vertex: position(3) + normal(3)
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

pub const MESH_STRIDE: usize = 6;

impl MeshData {
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / MESH_STRIDE
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn position(&self, i: usize) -> Vec3 {
        let b = i * MESH_STRIDE;
        Vec3::new(self.vertices[b], self.vertices[b + 1], self.vertices[b + 2])
    }

    pub fn normal(&self, i: usize) -> Vec3 {
        let b = i * MESH_STRIDE;
        Vec3::new(self.vertices[b + 3], self.vertices[b + 4], self.vertices[b + 5])
    }

    /// Corner positions of triangle `tri`
    pub fn triangle(&self, tri: usize) -> [Vec3; 3] {
        let i = &self.indices[tri * 3..tri * 3 + 3];
        [
            self.position(i[0] as usize),
            self.position(i[1] as usize),
            self.position(i[2] as usize),
        ]
    }

    /// Move every vertex by `offset`
    pub fn translate(&mut self, offset: Vec3) {
        for v in self.vertices.chunks_exact_mut(MESH_STRIDE) {
            v[0] += offset.x;
            v[1] += offset.y;
            v[2] += offset.z;
        }
    }
}

/// Lines mesh: interleaved [pos.x, pos.y, pos.z, r, g, b, a], two vertices per segment
#[derive(Clone, Debug, Default)]
pub struct LineMeshData {
    /// 7 floats per vertex: position(3) + color(4)
    pub vertices: Vec<f32>,
}

pub const LINE_STRIDE: usize = 7;

impl LineMeshData {
    pub fn segment_count(&self) -> usize {
        self.vertices.len() / (LINE_STRIDE * 2)
    }

    pub fn push_segment(&mut self, a: Vec3, b: Vec3, color: [f32; 4]) {
        push_line_vert(&mut self.vertices, a.x, a.y, a.z, color);
        push_line_vert(&mut self.vertices, b.x, b.y, b.z, color);
    }

    /// Iterate `(start, end, color)` per segment
    pub fn segments(&self) -> impl Iterator<Item = (Vec3, Vec3, [f32; 4])> + '_ {
        self.vertices.chunks_exact(LINE_STRIDE * 2).map(|s| {
            (
                Vec3::new(s[0], s[1], s[2]),
                Vec3::new(s[7], s[8], s[9]),
                [s[3], s[4], s[5], s[6]],
            )
        })
    }
}

/// Flat triangle list without normals (arrowheads, highlights): 3 floats per vertex
#[derive(Clone, Debug, Default)]
pub struct TriangleData {
    pub positions: Vec<[f32; 3]>,
}

impl TriangleData {
    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn push_triangle(&mut self, a: Vec3, b: Vec3, c: Vec3) {
        self.positions.extend_from_slice(&[a.to_array(), b.to_array(), c.to_array()]);
    }
}

// ── Grid and axes ────────────────────────────────────────────

/// Square grid on the XZ plane, `size` wide with `divisions` cells per side
pub fn grid(size: f32, divisions: u32, center_color: u32, line_color: u32) -> LineMeshData {
    let mut lines = LineMeshData::default();
    let half = size * 0.5;
    let step = size / divisions.max(1) as f32;
    let center = hex_to_rgba(center_color);
    let regular = hex_to_rgba(line_color);

    for i in 0..=divisions {
        let f = -half + i as f32 * step;
        let color = if i * 2 == divisions { center } else { regular };
        // Line along Z
        lines.push_segment(Vec3::new(f, 0.0, -half), Vec3::new(f, 0.0, half), color);
        // Line along X
        lines.push_segment(Vec3::new(-half, 0.0, f), Vec3::new(half, 0.0, f), color);
    }

    lines
}

pub fn axes(length: f32) -> LineMeshData {
    let mut lines = LineMeshData::default();
    let r = [1.0_f32, 0.0, 0.0, 1.0];
    let g = [0.0_f32, 1.0, 0.0, 1.0];
    let b = [0.0_f32, 0.0, 1.0, 1.0];

    lines.push_segment(Vec3::ZERO, Vec3::X * length, r);
    lines.push_segment(Vec3::ZERO, Vec3::Y * length, g);
    lines.push_segment(Vec3::ZERO, Vec3::Z * length, b);

    lines
}

// ── Helpers ──────────────────────────────────────────────────

fn push_line_vert(v: &mut Vec<f32>, px: f32, py: f32, pz: f32, c: [f32; 4]) {
    v.extend_from_slice(&[px, py, pz, c[0], c[1], c[2], c[3]]);
}

/// 0xRRGGBB → linear-ish RGB in [0, 1]
pub fn hex_to_rgb(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

pub fn hex_to_rgba(hex: u32) -> [f32; 4] {
    let [r, g, b] = hex_to_rgb(hex);
    [r, g, b, 1.0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_segment_count() {
        let g = grid(1000.0, 50, 0xcccccc, 0xeeeeee);
        assert_eq!(g.segment_count(), 51 * 2);
        // Every grid line lies on the ground plane
        assert!(g.segments().all(|(a, b, _)| a.y == 0.0 && b.y == 0.0));
    }

    #[test]
    fn test_axes_colors() {
        let a = axes(200.0);
        let segs: Vec<_> = a.segments().collect();
        assert_eq!(segs.len(), 3);
        assert_eq!(segs[0].1, Vec3::new(200.0, 0.0, 0.0));
        assert_eq!(segs[1].2, [0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_hex_to_rgb() {
        assert_eq!(hex_to_rgb(0xff0000), [1.0, 0.0, 0.0]);
        let c = hex_to_rgb(0xb8c2ff);
        assert!((c[0] - 184.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_translate_moves_positions_only() {
        let mut m = MeshData {
            vertices: vec![1.0, 2.0, 3.0, 0.0, 1.0, 0.0],
            indices: vec![],
        };
        m.translate(Vec3::new(1.0, 1.0, 1.0));
        assert_eq!(m.position(0), Vec3::new(2.0, 3.0, 4.0));
        assert_eq!(m.normal(0), Vec3::Y);
    }
}
