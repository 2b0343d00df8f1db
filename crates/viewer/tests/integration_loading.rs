//! Integration tests for asynchronous loading through the conversion worker.

use std::time::Duration;

use glam::Vec3;
use part_viewer_lib::error::{DecodeError, ViewerError};
use part_viewer_lib::fixtures;
use part_viewer_lib::harness::ViewerHarness;
use part_viewer_lib::loader::{new_request, ConversionWorker, MeshConverter, StlConverter};
use shared::{ConversionRequest, FileKind, RawMesh};

const WAIT: Duration = Duration::from_secs(5);

fn stl_worker() -> ConversionWorker {
    ConversionWorker::new(StlConverter, Duration::from_secs(5)).unwrap()
}

#[test]
fn test_async_load_installs_model() {
    let worker = stl_worker();
    let mut h = ViewerHarness::new();

    let id = h
        .begin_load(&worker, new_request(FileKind::Stl, fixtures::cube_stl_binary(10.0)))
        .unwrap();
    assert!(!id.is_empty());
    assert!(h.is_loading());

    h.wait_for_load(WAIT).expect("load did not finish").unwrap();
    assert!(!h.is_loading());
    let dims = h.model_dimensions().unwrap();
    assert!(dims.abs_diff_eq(Vec3::splat(10.0), 1e-4));
    assert!(h.model_world_bounds().unwrap().min.y.abs() < 1e-4);
}

#[test]
fn test_failed_conversion_keeps_previous_model() {
    let worker = stl_worker();
    let mut h = ViewerHarness::new();
    h.load_box(20.0, 30.0, 40.0).unwrap();
    let camera = h.camera().position;

    h.begin_load(&worker, new_request(FileKind::Stl, b"not an stl file".to_vec()))
        .unwrap();
    let result = h.wait_for_load(WAIT).expect("load did not finish");
    assert!(matches!(result, Err(ViewerError::Decode(DecodeError::Malformed(_)))));

    let dims = h.model_dimensions().unwrap();
    assert!(dims.abs_diff_eq(Vec3::new(20.0, 30.0, 40.0), 1e-4));
    assert_eq!(h.camera().position, camera);
}

#[test]
fn test_cad_file_without_tessellator_is_unsupported() {
    let worker = stl_worker();
    let mut h = ViewerHarness::new();
    h.begin_load(&worker, new_request(FileKind::Step, b"ISO-10303-21;".to_vec()))
        .unwrap();
    let result = h.wait_for_load(WAIT).expect("load did not finish");
    assert!(matches!(result, Err(ViewerError::Decode(DecodeError::Unsupported(_)))));
    assert_eq!(h.model_dimensions(), None);
}

#[test]
fn test_newer_load_supersedes_pending_one() {
    let worker = stl_worker();
    let mut h = ViewerHarness::new();

    let first = h
        .begin_load(&worker, new_request(FileKind::Stl, fixtures::cube_stl_binary(10.0)))
        .unwrap();
    let second = h
        .begin_load(&worker, new_request(FileKind::Stl, fixtures::cube_stl_binary(20.0)))
        .unwrap();
    assert_ne!(first, second);

    h.wait_for_load(WAIT).expect("load did not finish").unwrap();
    let dims = h.model_dimensions().unwrap();
    assert!(dims.abs_diff_eq(Vec3::splat(20.0), 1e-4));

    // The superseded result never lands
    std::thread::sleep(Duration::from_millis(50));
    for _ in 0..10 {
        assert!(h.step().is_none());
    }
    assert!(h.model_dimensions().unwrap().abs_diff_eq(Vec3::splat(20.0), 1e-4));
}

struct SlowConverter;

impl MeshConverter for SlowConverter {
    fn convert(&self, _request: &ConversionRequest) -> Result<RawMesh, DecodeError> {
        std::thread::sleep(Duration::from_millis(250));
        Ok(fixtures::tetrahedron(5.0))
    }
}

#[test]
fn test_conversion_timeout_surfaces_as_error() {
    let worker = ConversionWorker::new(SlowConverter, Duration::from_millis(25)).unwrap();
    let mut h = ViewerHarness::new();
    h.begin_load(&worker, new_request(FileKind::Stl, Vec::new())).unwrap();

    let result = h.wait_for_load(WAIT).expect("load did not finish");
    assert!(matches!(result, Err(ViewerError::Decode(DecodeError::Timeout(25)))));
    assert_eq!(h.model_dimensions(), None);
}

#[test]
fn test_dispose_drops_pending_load() {
    let worker = stl_worker();
    let mut h = ViewerHarness::new();
    h.begin_load(&worker, new_request(FileKind::Stl, fixtures::cube_stl_binary(10.0)))
        .unwrap();
    h.dispose();
    assert!(!h.is_loading());
    assert!(h.wait_for_load(Duration::from_millis(100)).is_none());
    assert!(matches!(
        h.begin_load(&worker, new_request(FileKind::Stl, Vec::new())),
        Err(ViewerError::Disposed)
    ));
}

#[test]
fn test_synchronous_ascii_load() {
    let mut h = ViewerHarness::new();
    h.load_stl(fixtures::TRIANGLE_STL_ASCII.as_bytes()).unwrap();
    assert!(h.model_world_bounds().unwrap().min.y.abs() < 1e-6);

    let err = h.load_stl(b"solid broken\nfacet normal 0 0 1\n").unwrap_err();
    assert!(matches!(err, ViewerError::Decode(_)));
    // Previous model survives
    assert!(h.model_dimensions().is_some());
}
