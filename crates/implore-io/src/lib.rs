//! implore-io - Data I/O for scientific datasets
//!
//! This crate provides the loading layer underneath the implore viewers:
//!
//! - **Byte sources**: an async capability for fetching raw bytes by location
//! - **Packed arrays**: NPY decoding/encoding into typed `f64` buffers with
//!   shape and storage-order metadata
//! - **Archives**: zip-backed asset resolution with a bounded, engine-owned
//!   index cache and a direct-fetch fallback for plain file trees
//!
//! # Design
//!
//! Archive indexes are built at most once per location. The build future is
//! what gets cached, so concurrent requesters join the same build.

pub mod archive;
pub mod npy;
pub mod reader;

pub use archive::*;
pub use npy::*;
pub use reader::*;
