//! Firmware blob deduplication.

pub mod catalogue;
pub mod store;

pub use catalogue::Catalogue;
pub use store::{BlobError, BlobStore, LiteralRendering, content_hash};
