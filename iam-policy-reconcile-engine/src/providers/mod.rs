//! Policy I/O: JSON documents and file-backed policy stores

pub mod filesystem;
pub mod json;

pub use filesystem::{compute_etag, FilePolicyUpdater};
pub use json::NativeJsonProvider;
