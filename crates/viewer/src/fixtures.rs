//! Factory functions for test meshes and file payloads.
//!
//! Used by unit tests, integration tests and the headless harness.

use glam::Vec3;
use shared::RawMesh;

use crate::viewport::mesh::MeshData;

// ── Boxes ───────────────────────────────────────────────────────

/// Triangles of a box over corners `0..8`, wound counter-clockwise seen from
/// outside. Corner `i` takes max x if bit 0 is set, max y for bit 1, max z for bit 2.
pub const BOX_INDICES: [u32; 36] = [
    0, 4, 6, 0, 6, 2, // -X
    1, 3, 7, 1, 7, 5, // +X
    0, 1, 5, 0, 5, 4, // -Y
    2, 6, 7, 2, 7, 3, // +Y
    0, 2, 3, 0, 3, 1, // -Z
    4, 5, 7, 4, 7, 6, // +Z
];

fn box_corners(min: Vec3, max: Vec3) -> Vec<Vec3> {
    (0..8)
        .map(|i| {
            Vec3::new(
                if i & 1 != 0 { max.x } else { min.x },
                if i & 2 != 0 { max.y } else { min.y },
                if i & 4 != 0 { max.z } else { min.z },
            )
        })
        .collect()
}

/// Indexed box spanning `min..max`
pub fn box_between(min: [f32; 3], max: [f32; 3]) -> RawMesh {
    let positions = box_corners(Vec3::from(min), Vec3::from(max))
        .into_iter()
        .map(|v| v.to_array())
        .collect();
    RawMesh::indexed(positions, BOX_INDICES.to_vec())
}

/// Indexed box of the given size centered on the origin
pub fn box_mesh(width: f32, height: f32, depth: f32) -> RawMesh {
    let half = [width * 0.5, height * 0.5, depth * 0.5];
    box_between(half.map(|h| -h), half)
}

/// Centered box as a renderable mesh (normals point away from the center)
pub fn box_mesh_data(size: Vec3) -> MeshData {
    let corners = box_corners(-size * 0.5, size * 0.5);
    let mut vertices = Vec::with_capacity(corners.len() * 6);
    for c in &corners {
        let n = c.normalize_or_zero();
        vertices.extend_from_slice(&[c.x, c.y, c.z, n.x, n.y, n.z]);
    }
    MeshData {
        vertices,
        indices: BOX_INDICES.to_vec(),
    }
}

/// One triangle in the XY plane facing +Z
pub fn single_triangle_data() -> MeshData {
    MeshData {
        vertices: vec![
            0.0, 0.0, 0.0, 0.0, 0.0, 1.0, //
            1.0, 0.0, 0.0, 0.0, 0.0, 1.0, //
            0.0, 1.0, 0.0, 0.0, 0.0, 1.0,
        ],
        indices: vec![0, 1, 2],
    }
}

/// Unindexed tetrahedron with one vertex below the others
pub fn tetrahedron(size: f32) -> RawMesh {
    let a = [0.0, -size, 0.0];
    let b = [size, 0.0, 0.0];
    let c = [-size * 0.5, 0.0, size];
    let d = [-size * 0.5, 0.0, -size];
    RawMesh::from_positions(vec![a, c, b, a, d, c, a, b, d, b, c, d])
}

// ── STL payloads ────────────────────────────────────────────────

/// Binary STL of a cube with edge `size` whose lower corner is at the origin
pub fn cube_stl_binary(size: f32) -> Vec<u8> {
    let corners = box_corners(Vec3::ZERO, Vec3::splat(size));
    let mut out = vec![0u8; 80];
    out.extend_from_slice(&(BOX_INDICES.len() as u32 / 3).to_le_bytes());
    for tri in BOX_INDICES.chunks_exact(3) {
        // Zero facet normal; readers must not rely on it
        out.extend_from_slice(&[0u8; 12]);
        for &i in tri {
            for c in corners[i as usize].to_array() {
                out.extend_from_slice(&c.to_le_bytes());
            }
        }
        out.extend_from_slice(&[0u8; 2]);
    }
    out
}

pub const TRIANGLE_STL_ASCII: &str = "solid triangle
  facet normal 0 0 1
    outer loop
      vertex 0 0 0
      vertex 10 0 0
      vertex 0 10 0
    endloop
  endfacet
endsolid triangle
";
