pub mod annotator;
pub mod bounds;
pub mod context;
#[cfg(target_os = "macos")]
pub mod macos;
pub mod screenshot;
pub mod tree;
pub mod types;
