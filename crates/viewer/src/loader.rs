//! Mesh conversion service
//!
//! A [`MeshConverter`] turns raw file bytes into a [`RawMesh`]. The
//! [`ConversionWorker`] runs converters off the render thread on a tokio
//! runtime and hands results back through a [`PendingLoad`] that the render
//! loop polls once per frame.

use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use shared::{ConversionRequest, FileKind, RawMesh};
use tokio::sync::oneshot;

use crate::error::{DecodeError, ViewerError};

/// Converts a source file into a triangle mesh (millimeters)
pub trait MeshConverter: Send + Sync + 'static {
    fn convert(&self, request: &ConversionRequest) -> Result<RawMesh, DecodeError>;
}

/// Default converter: STL only. CAD formats need a tessellating converter.
#[derive(Debug, Default, Clone, Copy)]
pub struct StlConverter;

impl MeshConverter for StlConverter {
    fn convert(&self, request: &ConversionRequest) -> Result<RawMesh, DecodeError> {
        match request.kind {
            FileKind::Stl => parse_stl(&request.bytes),
            other => Err(DecodeError::Unsupported(format!("{other:?}"))),
        }
    }
}

// ── STL ──────────────────────────────────────────────────────

/// Decode binary or ASCII STL into an indexed mesh. Stored facet normals are
/// ignored; the viewer derives normals from winding.
pub fn parse_stl(data: &[u8]) -> Result<RawMesh, DecodeError> {
    let mut cursor = Cursor::new(data);
    let mesh = stl_io::read_stl(&mut cursor).map_err(|e| DecodeError::Malformed(format!("STL: {e}")))?;

    let positions: Vec<[f32; 3]> = mesh.vertices.iter().map(|v| [v[0], v[1], v[2]]).collect();
    let mut indices = Vec::with_capacity(mesh.faces.len() * 3);
    for face in &mesh.faces {
        for &i in &face.vertices {
            let i = u32::try_from(i)
                .map_err(|_| DecodeError::Malformed(format!("vertex index {i} out of range")))?;
            indices.push(i);
        }
    }
    tracing::debug!(
        vertices = positions.len(),
        triangles = mesh.faces.len(),
        "STL decoded"
    );
    Ok(RawMesh::indexed(positions, indices))
}

// ── Worker ───────────────────────────────────────────────────

/// Build a request from a file on disk
pub fn request_from_path(path: &Path) -> Result<ConversionRequest, DecodeError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
    let kind = FileKind::from_extension(ext)
        .ok_or_else(|| DecodeError::Unsupported(format!("extension '{ext}'")))?;
    let bytes = std::fs::read(path)?;
    Ok(new_request(kind, bytes))
}

pub fn new_request(kind: FileKind, bytes: Vec<u8>) -> ConversionRequest {
    ConversionRequest {
        id: uuid::Uuid::new_v4().to_string(),
        kind,
        bytes,
        linear_deflection: None,
        angular_deflection: None,
    }
}

/// A conversion in flight. Dropping it detaches the caller from the result.
#[derive(Debug)]
pub struct PendingLoad {
    pub id: String,
    rx: oneshot::Receiver<Result<RawMesh, DecodeError>>,
}

impl PendingLoad {
    /// Non-blocking check for the result
    pub fn poll(&mut self) -> Option<Result<RawMesh, DecodeError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(DecodeError::WorkerGone)),
        }
    }

    /// Block until the result arrives. Must not be called from async code.
    pub fn wait(self) -> Result<RawMesh, DecodeError> {
        self.rx.blocking_recv().unwrap_or(Err(DecodeError::WorkerGone))
    }
}

/// Runs conversions on a dedicated runtime with a per-request timeout
pub struct ConversionWorker {
    runtime: tokio::runtime::Runtime,
    converter: Arc<dyn MeshConverter>,
    timeout: Duration,
}

impl ConversionWorker {
    pub fn new(converter: impl MeshConverter, timeout: Duration) -> Result<Self, ViewerError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("mesh-convert")
            .enable_time()
            .build()
            .map_err(|e| ViewerError::Initialization(format!("conversion runtime: {e}")))?;
        tracing::info!(timeout_ms = timeout.as_millis() as u64, "conversion worker started");
        Ok(Self {
            runtime,
            converter: Arc::new(converter),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Queue a conversion; the result is delivered through the returned handle
    pub fn submit(&self, request: ConversionRequest) -> PendingLoad {
        let (tx, rx) = oneshot::channel();
        let id = request.id.clone();
        let converter = Arc::clone(&self.converter);
        let timeout = self.timeout;

        self.runtime.spawn(async move {
            let task_id = request.id.clone();
            let work = tokio::task::spawn_blocking(move || converter.convert(&request));
            let result = match tokio::time::timeout(timeout, work).await {
                Ok(Ok(result)) => result,
                Ok(Err(join_err)) => {
                    tracing::error!(id = %task_id, "converter panicked: {join_err}");
                    Err(DecodeError::WorkerGone)
                }
                Err(_) => Err(DecodeError::Timeout(timeout.as_millis() as u64)),
            };
            if tx.send(result).is_err() {
                tracing::debug!(id = %task_id, "load superseded, result dropped");
            }
        });

        tracing::debug!(%id, "conversion submitted");
        PendingLoad { id, rx }
    }
}
