// Library crate: the viewer engine, conversion service and test tooling.
// The desktop host (egui app) lives in the binary crate.

pub mod error;
pub mod fixtures;
pub mod harness;
pub mod loader;
pub mod settings;
pub mod viewport;
