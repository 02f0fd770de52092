//! File server implementation

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use gameserve_core::config::ServerConfig;
use gameserve_core::server::{Handler, Request, Response};
use gameserve_core::Result;
use http::{header, HeaderValue, Method, StatusCode};

use crate::mime::resolve_mime;

/// Static file handler rooted at a single directory
pub struct FileServer {
    root: PathBuf,
    index: Vec<String>,
    mime_overrides: HashMap<String, String>,
}

impl FileServer {
    /// Build a handler from the server configuration
    pub fn new(config: &ServerConfig) -> Self {
        Self {
            root: config.root.clone(),
            index: vec!["index.html".to_string(), "index.htm".to_string()],
            mime_overrides: config.mime_overrides.clone(),
        }
    }

    async fn serve(&self, target: &str) -> Result<Response> {
        let sanitized = match sanitize_target(target) {
            Some(s) => s,
            None => return Ok(not_found()),
        };

        let mut file_path = self.root.join(&sanitized.rel);
        tracing::debug!("📁 {} -> {:?}", target, file_path);

        let metadata = match tokio::fs::metadata(&file_path).await {
            Ok(m) => m,
            Err(_) => return Ok(not_found()),
        };

        // a trailing slash names a directory; no such directory exists when
        // the path resolves to a regular file
        if sanitized.dir_request && !metadata.is_dir() {
            return Ok(not_found());
        }

        if metadata.is_dir() {
            // Relative links in the served pages only resolve with the
            // trailing slash present
            if !sanitized.dir_request {
                let raw_path = raw_path_of(target);
                let location = match target.split_once('?') {
                    Some((_, query)) => format!("{}/?{}", raw_path, query),
                    None => format!("{}/", raw_path),
                };
                return Ok(match HeaderValue::from_str(&location) {
                    Ok(value) => Response::new(StatusCode::MOVED_PERMANENTLY)
                        .with_header(header::LOCATION, value),
                    Err(_) => not_found(),
                });
            }

            let mut index_found = false;
            for index in &self.index {
                let candidate = file_path.join(index);
                if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                    file_path = candidate;
                    index_found = true;
                    break;
                }
            }

            if !index_found {
                let listing = self.render_listing(&file_path, &sanitized.display).await?;
                return Ok(Response::new(StatusCode::OK)
                    .with_body(listing, "text/html; charset=utf-8"));
            }
        }

        let metadata = match tokio::fs::metadata(&file_path).await {
            Ok(m) => m,
            Err(_) => return Ok(not_found()),
        };
        if !metadata.is_file() {
            return Ok(not_found());
        }

        let content = match tokio::fs::read(&file_path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(not_found()),
            Err(e) => return Err(e.into()),
        };

        let mime = resolve_mime(&file_path, &self.mime_overrides);
        let mut response = Response::new(StatusCode::OK).with_body(content, &mime);
        if let Ok(modified) = metadata.modified() {
            if let Ok(value) = HeaderValue::from_str(&httpdate::fmt_http_date(modified)) {
                response = response.with_header(header::LAST_MODIFIED, value);
            }
        }

        Ok(response)
    }

    /// HTML directory listing, entries sorted by name
    async fn render_listing(&self, dir: &Path, req_path: &str) -> Result<String> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await?.is_dir() {
                name.push('/');
            }
            names.push(name);
        }
        names.sort();

        let mut html = format!(
            "<html><head><title>Directory listing for {p}</title></head>\
             <body><h1>Directory listing for {p}</h1><hr><ul>",
            p = req_path
        );
        for name in &names {
            html.push_str(&format!("<li><a href=\"{0}\">{0}</a></li>", name));
        }
        html.push_str("</ul><hr></body></html>");

        Ok(html)
    }
}

#[async_trait]
impl Handler for FileServer {
    async fn handle(&self, req: &Request) -> Response {
        if req.method != Method::GET && req.method != Method::HEAD {
            return Response::text(StatusCode::NOT_IMPLEMENTED, "Unsupported method");
        }

        match self.serve(&req.target).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("failed to serve {}: {}", req.target, e);
                Response::text(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        }
    }
}

fn not_found() -> Response {
    Response::text(StatusCode::NOT_FOUND, "File not found")
}

/// The request target without its query or fragment, still percent-encoded
fn raw_path_of(target: &str) -> &str {
    target
        .split(['?', '#'])
        .next()
        .unwrap_or(target)
}

struct Sanitized {
    /// Path relative to the root, safe to join
    rel: PathBuf,
    /// The target named a directory (trailing slash or empty path)
    dir_request: bool,
    /// Decoded path for display in listings
    display: String,
}

/// Decode and validate a request target. `None` means the target cannot be
/// mapped to anything under the root and must 404: bad percent escapes,
/// non-UTF-8 escapes, NUL bytes, or any `..` component.
fn sanitize_target(target: &str) -> Option<Sanitized> {
    let raw_path = raw_path_of(target);
    let decoded = percent_decode(raw_path)?;
    let display = String::from_utf8(decoded).ok()?;
    if display.contains('\0') {
        return None;
    }

    let dir_request = display.ends_with('/') || display.is_empty();

    let mut rel = PathBuf::new();
    for component in display.split('/') {
        match component {
            "" | "." => continue,
            ".." => return None,
            other => rel.push(other),
        }
    }

    Some(Sanitized {
        rel,
        dir_request,
        display,
    })
}

/// Decode %XX escapes. `+` is left alone: this is a path, not a form field.
fn percent_decode(input: &str) -> Option<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = bytes.get(i + 1..i + 3)?;
            let hex = std::str::from_utf8(hex).ok()?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn config_for(root: &Path) -> ServerConfig {
        let addr: SocketAddr = "127.0.0.1:0".parse().unwrap();
        ServerConfig::new(addr, root)
            .with_mime_override("ts", "application/typescript")
            .with_mime_override("js", "application/javascript")
    }

    fn get(target: &str) -> Request {
        Request {
            method: Method::GET,
            target: target.to_string(),
        }
    }

    #[test]
    fn sanitize_maps_plain_paths() {
        let s = sanitize_target("/sub/file.txt").unwrap();
        assert_eq!(s.rel, PathBuf::from("sub/file.txt"));
        assert!(!s.dir_request);
    }

    #[test]
    fn sanitize_strips_query_and_fragment() {
        let s = sanitize_target("/file.txt?cache=1#top").unwrap();
        assert_eq!(s.rel, PathBuf::from("file.txt"));
    }

    #[test]
    fn sanitize_decodes_percent_escapes() {
        let s = sanitize_target("/a%20b.txt").unwrap();
        assert_eq!(s.rel, PathBuf::from("a b.txt"));
        assert!(sanitize_target("/bad%zz").is_none());
        assert!(sanitize_target("/truncated%2").is_none());
    }

    #[test]
    fn sanitize_rejects_traversal() {
        assert!(sanitize_target("/../etc/passwd").is_none());
        assert!(sanitize_target("/sub/../../etc/passwd").is_none());
        assert!(sanitize_target("/%2e%2e/etc/passwd").is_none());
    }

    #[test]
    fn sanitize_marks_directory_requests() {
        assert!(sanitize_target("/").unwrap().dir_request);
        assert!(sanitize_target("/sub/").unwrap().dir_request);
        assert!(!sanitize_target("/sub").unwrap().dir_request);
    }

    #[tokio::test]
    async fn serves_file_content() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), b"hello world").unwrap();

        let server = FileServer::new(&config_for(dir.path()));
        let response = server.handle(&get("/hello.txt")).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, b"hello world");
        assert!(response
            .headers
            .iter()
            .any(|(n, _)| *n == header::LAST_MODIFIED));
    }

    #[tokio::test]
    async fn missing_file_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let server = FileServer::new(&config_for(dir.path()));
        let response = server.handle(&get("/nope.txt")).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn mime_override_applies_to_served_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.ts"), b"export {}").unwrap();

        let server = FileServer::new(&config_for(dir.path()));
        let response = server.handle(&get("/main.ts")).await;

        let content_type = response
            .headers
            .iter()
            .find(|(n, _)| *n == header::CONTENT_TYPE)
            .map(|(_, v)| v.to_str().unwrap().to_string())
            .unwrap();
        assert_eq!(content_type, "application/typescript");
    }

    #[tokio::test]
    async fn directory_with_index_serves_it() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), b"<h1>game</h1>").unwrap();

        let server = FileServer::new(&config_for(dir.path()));
        let response = server.handle(&get("/")).await;

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, b"<h1>game</h1>");
    }

    #[tokio::test]
    async fn directory_without_index_lists_entries_sorted() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), b"b").unwrap();
        std::fs::write(dir.path().join("a.txt"), b"a").unwrap();
        std::fs::create_dir(dir.path().join("assets")).unwrap();

        let server = FileServer::new(&config_for(dir.path()));
        let response = server.handle(&get("/")).await;

        assert_eq!(response.status, StatusCode::OK);
        let html = String::from_utf8(response.body).unwrap();
        // plain byte-order sort, directories are not grouped first
        let a = html.find("a.txt").unwrap();
        let b = html.find("b.txt").unwrap();
        let assets = html.find("assets/").unwrap();
        assert!(a < assets);
        assert!(assets < b);
    }

    #[tokio::test]
    async fn directory_without_slash_redirects() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let server = FileServer::new(&config_for(dir.path()));
        let response = server.handle(&get("/sub")).await;

        assert_eq!(response.status, StatusCode::MOVED_PERMANENTLY);
        let location = response
            .headers
            .iter()
            .find(|(n, _)| *n == header::LOCATION)
            .map(|(_, v)| v.to_str().unwrap())
            .unwrap();
        assert_eq!(location, "/sub/");
    }

    #[tokio::test]
    async fn file_with_trailing_slash_is_404() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("hello.txt"), b"hello").unwrap();

        let server = FileServer::new(&config_for(dir.path()));
        let response = server.handle(&get("/hello.txt/")).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);

        // without the slash the same file serves fine
        let response = server.handle(&get("/hello.txt")).await;
        assert_eq!(response.status, StatusCode::OK);
    }

    #[tokio::test]
    async fn directory_redirect_preserves_query() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let server = FileServer::new(&config_for(dir.path()));
        let response = server.handle(&get("/sub?x=1")).await;

        assert_eq!(response.status, StatusCode::MOVED_PERMANENTLY);
        let location = response
            .headers
            .iter()
            .find(|(n, _)| *n == header::LOCATION)
            .map(|(_, v)| v.to_str().unwrap())
            .unwrap();
        assert_eq!(location, "/sub/?x=1");
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("root");
        std::fs::create_dir(&root).unwrap();
        std::fs::write(dir.path().join("secret.txt"), b"secret").unwrap();

        let server = FileServer::new(&config_for(&root));
        let response = server.handle(&get("/../secret.txt")).await;
        assert_eq!(response.status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unsupported_method_is_501() {
        let dir = tempfile::tempdir().unwrap();
        let server = FileServer::new(&config_for(dir.path()));
        let response = server
            .handle(&Request {
                method: Method::POST,
                target: "/".to_string(),
            })
            .await;
        assert_eq!(response.status, StatusCode::NOT_IMPLEMENTED);
    }
}
