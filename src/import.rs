pub mod gltf_file;
mod types;

// Re-exports
pub use types::{Character, ImportError, ImportOptions};
