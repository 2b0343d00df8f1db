//! Geometry store: validates incoming meshes, recenters and grounds them,
//! and owns the GPU copy of the loaded model.

use glam::Vec3;
use shared::RawMesh;

use super::mesh::{MeshData, TriangleData, MESH_STRIDE};
use super::picking::{pick_triangle, Aabb, Ray, TriangleHit};
use super::renderer::{GpuHandle, RenderBackend};
use crate::error::DecodeError;

/// A validated mesh centered on the origin, ready to install
#[derive(Clone, Debug)]
pub struct PreparedMesh {
    pub mesh: MeshData,
    /// Bounds before recentering (input coordinates)
    pub source_bounds: Aabb,
}

impl PreparedMesh {
    pub fn bounds(&self) -> Aabb {
        Aabb::from_mesh(&self.mesh)
    }
}

/// Check `raw`, fill in normals and recenter it. Never touches any scene state.
pub fn prepare(raw: &RawMesh) -> Result<PreparedMesh, DecodeError> {
    let n = raw.positions.len();
    if n == 0 {
        return Err(DecodeError::Empty);
    }

    let indices: Vec<u32> = match &raw.indices {
        Some(idx) => {
            if idx.len() % 3 != 0 {
                return Err(DecodeError::BadIndexCount(idx.len()));
            }
            if idx.is_empty() {
                return Err(DecodeError::Empty);
            }
            if let Some(&bad) = idx.iter().find(|&&i| i as usize >= n) {
                return Err(DecodeError::IndexOutOfRange {
                    index: bad,
                    vertex_count: n,
                });
            }
            idx.clone()
        }
        None => {
            if n % 3 != 0 {
                return Err(DecodeError::BadVertexCount(n));
            }
            (0..n as u32).collect()
        }
    };

    if let Some(normals) = &raw.normals {
        if normals.len() != n {
            return Err(DecodeError::NormalCountMismatch {
                normals: normals.len(),
                vertices: n,
            });
        }
    }

    if let Some(i) = raw
        .positions
        .iter()
        .position(|p| !p.iter().all(|c| c.is_finite()))
    {
        return Err(DecodeError::NonFinite(i));
    }

    let positions: Vec<Vec3> = raw.positions.iter().map(|&p| Vec3::from(p)).collect();
    let source_bounds = Aabb::from_points(positions.iter().copied());
    let size = source_bounds.size();
    if size.max_element() <= f32::EPSILON {
        return Err(DecodeError::Degenerate);
    }

    let normals = match &raw.normals {
        Some(given) => given
            .iter()
            .map(|&nrm| Vec3::from(nrm).try_normalize().unwrap_or(Vec3::Y))
            .collect(),
        None => compute_vertex_normals(&positions, &indices),
    };

    let center = source_bounds.center();
    let mut vertices = Vec::with_capacity(n * MESH_STRIDE);
    for (p, nrm) in positions.iter().zip(normals.iter()) {
        let p = *p - center;
        vertices.extend_from_slice(&[p.x, p.y, p.z, nrm.x, nrm.y, nrm.z]);
    }

    Ok(PreparedMesh {
        mesh: MeshData { vertices, indices },
        source_bounds,
    })
}

/// Area-weighted vertex normals from face winding. Shared vertices get smooth
/// normals; an unindexed soup ends up with flat ones.
pub fn compute_vertex_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut acc = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks_exact(3) {
        let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
        // Cross product length is twice the area, so larger faces weigh more
        let face = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        acc[a] += face;
        acc[b] += face;
        acc[c] += face;
    }
    acc.into_iter()
        .map(|v| v.try_normalize().unwrap_or(Vec3::Y))
        .collect()
}

/// The installed model: mesh in local space plus the root translation
#[derive(Debug)]
pub struct Model {
    pub mesh: MeshData,
    /// Translation of the model root (grounding lift)
    pub root_offset: Vec3,
    pub handle: GpuHandle,
}

impl Model {
    pub fn world_bounds(&self) -> Aabb {
        Aabb::from_mesh(&self.mesh).translated(self.root_offset)
    }
}

/// Owner of the single loaded model
#[derive(Debug, Default)]
pub struct GeometryStore {
    model: Option<Model>,
}

impl GeometryStore {
    pub fn model(&self) -> Option<&Model> {
        self.model.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.model.is_none()
    }

    /// Replace the current model. Returns the grounded world bounds.
    pub fn install<B: RenderBackend + ?Sized>(&mut self, backend: &mut B, prepared: PreparedMesh) -> Aabb {
        self.clear(backend);

        let handle = backend.upload_mesh(&prepared.mesh);
        let local = prepared.bounds();
        // Rest the lowest point on y = 0
        let root_offset = Vec3::new(0.0, -local.min.y, 0.0);
        let model = Model {
            mesh: prepared.mesh,
            root_offset,
            handle,
        };
        let bounds = model.world_bounds();
        tracing::info!(
            vertices = model.mesh.vertex_count(),
            triangles = model.mesh.triangle_count(),
            size = ?bounds.size(),
            "model installed"
        );
        self.model = Some(model);
        bounds
    }

    /// Drop the model and its GPU buffers
    pub fn clear<B: RenderBackend + ?Sized>(&mut self, backend: &mut B) {
        if let Some(old) = self.model.take() {
            backend.release(old.handle);
        }
    }

    pub fn world_bounds(&self) -> Option<Aabb> {
        self.model.as_ref().map(Model::world_bounds)
    }

    /// Bounding-box size of the loaded model (mm)
    pub fn dimensions(&self) -> Option<Vec3> {
        self.world_bounds().map(|b| b.size())
    }

    /// Nearest model hit along `ray`
    pub fn pick(&self, ray: &Ray) -> Option<TriangleHit> {
        let model = self.model.as_ref()?;
        pick_triangle(ray, &model.mesh, model.root_offset)
    }

    /// Copy the given triangles (by index) into a flat list in model-local space.
    /// Out-of-range indices are skipped.
    pub fn extract_triangles(&self, triangles: &[usize]) -> TriangleData {
        let mut out = TriangleData::default();
        if let Some(model) = &self.model {
            for &tri in triangles {
                if tri < model.mesh.triangle_count() {
                    let [a, b, c] = model.mesh.triangle(tri);
                    out.push_triangle(a, b, c);
                }
            }
        }
        out
    }
}
