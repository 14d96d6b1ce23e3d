//! SVF2 Container Codec
//!
//! Streams plaintext into independently authenticated AES-256-GCM chunks
//! and back, without holding whole files in memory. Every chunk carries
//! the header bytes as associated data, and a plaintext completion marker
//! after a zero-length record proves the writer finished.

pub mod format;
pub mod progress;
pub mod reader;
pub mod writer;

pub use format::{ContainerHeader, MediaType, DEFAULT_CHUNK_SIZE};
pub use progress::{CancellationToken, ChannelProgress, ProgressSink, StreamOptions};
pub use reader::{
    is_container, read_container, read_container_from, read_container_to_temporary_file, read_header,
    read_metadata,
};
pub use writer::{write_container, write_container_to, PlaintextSource, WriteSummary};
