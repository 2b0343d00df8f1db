//! Feature-edge extraction for outline captures
//!
//! An edge is kept when the faces on either side meet at more than the
//! threshold angle, or when only one face uses it (open boundary).

use std::collections::HashMap;

use glam::Vec3;

use super::mesh::{LineMeshData, MeshData};

/// An edge shared by up to two faces
#[derive(Debug, Clone)]
pub struct MeshEdge {
    pub start: Vec3,
    pub end: Vec3,
    pub normal1: Vec3,
    pub normal2: Option<Vec3>,
}

impl MeshEdge {
    /// Angle between the adjacent face normals (radians); 0 for boundary edges
    pub fn dihedral_angle(&self) -> f32 {
        match self.normal2 {
            Some(n2) => self.normal1.dot(n2).clamp(-1.0, 1.0).acos(),
            None => 0.0,
        }
    }

    /// Whether this edge belongs in an outline drawing
    pub fn is_feature(&self, threshold_degrees: f32) -> bool {
        match self.normal2 {
            None => true,
            Some(_) => self.dihedral_angle().to_degrees() > threshold_degrees,
        }
    }
}

type QuantizedPos = (i64, i64, i64);

fn quantize_position(pos: Vec3) -> QuantizedPos {
    let scale = 10000.0;
    (
        (pos.x * scale).round() as i64,
        (pos.y * scale).round() as i64,
        (pos.z * scale).round() as i64,
    )
}

fn edge_key(p1: QuantizedPos, p2: QuantizedPos) -> (QuantizedPos, QuantizedPos) {
    if p1 < p2 {
        (p1, p2)
    } else {
        (p2, p1)
    }
}

/// Collect every unique edge of `mesh` with its adjacent face normals.
/// Vertices are welded by quantized position so unindexed soups share edges too.
pub fn extract_edges(mesh: &MeshData) -> Vec<MeshEdge> {
    let mut edge_map: HashMap<(QuantizedPos, QuantizedPos), MeshEdge> = HashMap::new();

    for tri_idx in 0..mesh.triangle_count() {
        let [v0, v1, v2] = mesh.triangle(tri_idx);
        let face = (v1 - v0).cross(v2 - v0);
        if face.length_squared() < 1e-20 {
            continue;
        }
        let normal = face.normalize();

        let q0 = quantize_position(v0);
        let q1 = quantize_position(v1);
        let q2 = quantize_position(v2);

        for (qa, qb, va, vb) in [(q0, q1, v0, v1), (q1, q2, v1, v2), (q2, q0, v2, v0)] {
            if qa == qb {
                continue;
            }
            edge_map
                .entry(edge_key(qa, qb))
                .and_modify(|e| {
                    if e.normal2.is_none() {
                        e.normal2 = Some(normal);
                    }
                })
                .or_insert(MeshEdge {
                    start: va,
                    end: vb,
                    normal1: normal,
                    normal2: None,
                });
        }
    }

    let mut edges: Vec<MeshEdge> = edge_map.into_values().collect();
    // Stable output regardless of hash order
    edges.sort_by_key(|e| edge_key(quantize_position(e.start), quantize_position(e.end)));
    edges
}

/// Build a black line set of the feature edges of `mesh`
pub fn outline_edges(mesh: &MeshData, threshold_degrees: f32, color: [f32; 4]) -> LineMeshData {
    let mut lines = LineMeshData::default();
    for edge in extract_edges(mesh) {
        if edge.is_feature(threshold_degrees) {
            lines.push_segment(edge.start, edge.end, color);
        }
    }
    lines
}
