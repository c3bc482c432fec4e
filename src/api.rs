pub mod client;
pub mod documents;
pub mod logging;
#[cfg(test)]
pub mod mock_client;
pub mod stream;

pub use client::{ApiClient, ByteStream};
pub use documents::{DocumentBackend, FsDocumentBackend, MemoryDocumentBackend};
