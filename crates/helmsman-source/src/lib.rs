//! Declared-state source abstraction.
//!
//! A source is the versioned, authoritative description of desired resources:
//! a file-tree-shaped collection of resource documents addressable by
//! revision. The controller only ever reads from it.

pub mod cache;
pub mod dir;
pub mod error;
pub mod memory;
pub mod traits;

pub use cache::{FetchedSnapshot, SnapshotCache};
pub use dir::DirSource;
pub use error::SourceError;
pub use memory::MemorySource;
pub use traits::DeclaredSource;
