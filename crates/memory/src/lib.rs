//! Memory backends for Forgeloop.
//!
//! Long-term semantic memory lives outside the agent loop; these backends
//! give the `*_memory` tools a working store out of the box.

pub mod file_backend;
pub mod in_memory;
pub mod keyword;

pub use file_backend::FileBackend;
pub use in_memory::InMemoryBackend;
