//! Gameserve Static File Module
//!
//! Maps request paths to files under a root directory:
//! - percent-decoding and query stripping
//! - path traversal rejection
//! - index files and directory listings
//! - MIME detection with per-extension overrides

mod file_server;
mod mime;

pub use file_server::FileServer;
pub use mime::resolve_mime;
