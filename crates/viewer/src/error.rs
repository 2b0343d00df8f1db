//! Error types for mesh decoding and viewer operations.

use thiserror::Error;

/// Mesh conversion failed or produced geometry the viewer refuses to install.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DecodeError {
    #[error("mesh contains no triangles")]
    Empty,
    #[error("vertex count {0} is not a multiple of 3")]
    BadVertexCount(usize),
    #[error("index count {0} is not a multiple of 3")]
    BadIndexCount(usize),
    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },
    #[error("normal count {normals} does not match vertex count {vertices}")]
    NormalCountMismatch { normals: usize, vertices: usize },
    #[error("vertex {0} has a non-finite coordinate")]
    NonFinite(usize),
    #[error("mesh has zero extent")]
    Degenerate,
    #[error("unsupported file format: {0}")]
    Unsupported(String),
    #[error("malformed input: {0}")]
    Malformed(String),
    #[error("i/o error: {0}")]
    Io(String),
    #[error("conversion timed out after {0} ms")]
    Timeout(u64),
    #[error("conversion worker is unavailable")]
    WorkerGone,
}

impl From<std::io::Error> for DecodeError {
    fn from(e: std::io::Error) -> Self {
        DecodeError::Io(e.to_string())
    }
}

/// Errors surfaced by the viewer facade.
#[derive(Debug, Error)]
pub enum ViewerError {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("initialization failed: {0}")]
    Initialization(String),
    #[error("capture failed: {0}")]
    Capture(String),
    #[error("viewer has been disposed")]
    Disposed,
}

pub type Result<T, E = ViewerError> = std::result::Result<T, E>;
