//! Runtime configuration for the server
//!
//! There is deliberately no config file, CLI surface, or environment lookup:
//! the binary builds one immutable [`ServerConfig`] at startup and hands it to
//! [`HttpServer::bind`](crate::server::HttpServer::bind).

use http::{HeaderName, HeaderValue};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Immutable server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to listen on
    pub addr: SocketAddr,

    /// Root directory that request paths are resolved under
    pub root: PathBuf,

    /// Headers appended to every response, whatever its status
    pub extra_headers: Vec<(HeaderName, HeaderValue)>,

    /// Lowercase file extension (without the dot) to Content-Type overrides,
    /// consulted before the generic extension table
    pub mime_overrides: HashMap<String, String>,
}

impl ServerConfig {
    /// Create a configuration serving `root` on `addr`, with no extra
    /// headers and no MIME overrides.
    pub fn new(addr: SocketAddr, root: impl Into<PathBuf>) -> Self {
        Self {
            addr,
            root: root.into(),
            extra_headers: Vec::new(),
            mime_overrides: HashMap::new(),
        }
    }

    /// Append a header to every response
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.extra_headers.push((name, value));
        self
    }

    /// Force the Content-Type for an extension
    pub fn with_mime_override(
        mut self,
        ext: impl Into<String>,
        mime: impl Into<String>,
    ) -> Self {
        self.mime_overrides.insert(ext.into(), mime.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_collects_headers_and_overrides() {
        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap(), "/tmp")
            .with_header(
                HeaderName::from_static("cross-origin-opener-policy"),
                HeaderValue::from_static("same-origin"),
            )
            .with_mime_override("ts", "application/typescript");

        assert_eq!(config.extra_headers.len(), 1);
        assert_eq!(
            config.mime_overrides.get("ts").map(String::as_str),
            Some("application/typescript")
        );
    }
}
