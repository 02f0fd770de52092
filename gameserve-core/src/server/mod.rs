//! HTTP serving loop
//!
//! A single listening socket, one spawned task per accepted connection, and a
//! [`Handler`] seam so the file-serving logic lives in its own crate. The loop
//! owns the listener for the process lifetime and stops when the shutdown
//! future given to [`HttpServer::run_until`] resolves.

mod wire;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use http::{header, HeaderName, HeaderValue, Method, StatusCode};
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

use crate::config::ServerConfig;
use crate::error::{Error, Result};

/// A parsed request head
#[derive(Debug)]
pub struct Request {
    /// Request method
    pub method: Method,
    /// Raw request target, exactly as it appeared on the request line
    pub target: String,
}

/// A response ready to be written back to the client
#[derive(Debug)]
pub struct Response {
    pub status: StatusCode,
    pub headers: Vec<(HeaderName, HeaderValue)>,
    pub body: Vec<u8>,
}

impl Response {
    /// An empty response with the given status
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Attach a body and its Content-Type
    pub fn with_body(mut self, body: impl Into<Vec<u8>>, content_type: &str) -> Self {
        self.body = body.into();
        let value = HeaderValue::from_str(content_type)
            .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));
        self.headers.push((header::CONTENT_TYPE, value));
        self
    }

    /// Attach a header
    pub fn with_header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.push((name, value));
        self
    }

    /// A short plain-text response, used for the error statuses
    pub fn text(status: StatusCode, message: &str) -> Self {
        Self::new(status).with_body(format!("{}\r\n", message), "text/plain; charset=utf-8")
    }
}

/// Produces a response for one request.
///
/// Handlers are infallible at this seam; they map their own failures to
/// status codes.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, req: &Request) -> Response;
}

/// The serving loop, bound and ready to accept
pub struct HttpServer {
    listener: TcpListener,
    config: Arc<ServerConfig>,
    handler: Arc<dyn Handler>,
}

impl HttpServer {
    /// Bind the configured address. A bind failure (port already taken, no
    /// permission) is a startup fault and is not retried.
    pub async fn bind(config: ServerConfig, handler: impl Handler) -> Result<Self> {
        let listener = TcpListener::bind(config.addr)
            .await
            .map_err(|source| Error::Bind {
                addr: config.addr,
                source,
            })?;

        Ok(Self {
            listener,
            config: Arc::new(config),
            handler: Arc::new(handler),
        })
    }

    /// The address actually bound. Differs from the configured one when
    /// port 0 was requested.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve connections until `shutdown` resolves, then drop the
    /// listener so the port is immediately rebindable.
    pub async fn run_until(self, shutdown: impl Future<Output = ()>) -> Result<()> {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let config = self.config.clone();
                            let handler = self.handler.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, config, handler).await {
                                    tracing::debug!("connection from {} failed: {}", peer, e);
                                }
                            });
                        }
                        Err(e) => {
                            tracing::warn!("accept failed: {}", e);
                        }
                    }
                }
            }
        }

        tracing::debug!("listener on {} closed", self.config.addr);
        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    config: Arc<ServerConfig>,
    handler: Arc<dyn Handler>,
) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    let (mut response, include_body) = match wire::read_request(&mut reader).await {
        Ok(req) => {
            let response = handler.handle(&req).await;
            tracing::debug!("{} {} -> {}", req.method, req.target, response.status);
            let include_body = req.method != Method::HEAD;
            (response, include_body)
        }
        Err(Error::BadRequest(reason)) => {
            tracing::debug!("rejecting request: {}", reason);
            (Response::text(StatusCode::BAD_REQUEST, "Bad request"), true)
        }
        Err(e) => return Err(e),
    };

    finalize(&mut response, &config);
    wire::write_response(&mut write_half, &response, include_body).await?;
    write_half.shutdown().await?;

    Ok(())
}

/// Standard headers plus the configured extra headers. These go on every
/// response regardless of path, status, or method.
fn finalize(response: &mut Response, config: &ServerConfig) {
    let server = HeaderValue::from_str(&format!("gameserve/{}", crate::VERSION))
        .unwrap_or_else(|_| HeaderValue::from_static("gameserve"));
    response.headers.push((header::SERVER, server));
    if let Ok(date) = HeaderValue::from_str(&httpdate::fmt_http_date(SystemTime::now())) {
        response.headers.push((header::DATE, date));
    }
    response
        .headers
        .push((header::CONTENT_LENGTH, HeaderValue::from(response.body.len())));
    response
        .headers
        .push((header::CONNECTION, HeaderValue::from_static("close")));

    for (name, value) in &config.extra_headers {
        response.headers.push((name.clone(), value.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalize_appends_extra_headers_last() {
        let config = ServerConfig::new("127.0.0.1:0".parse().unwrap(), ".")
            .with_header(
                HeaderName::from_static("cross-origin-embedder-policy"),
                HeaderValue::from_static("require-corp"),
            );

        let mut response = Response::text(StatusCode::NOT_FOUND, "File not found");
        finalize(&mut response, &config);

        let (name, value) = response.headers.last().unwrap();
        assert_eq!(name.as_str(), "cross-origin-embedder-policy");
        assert_eq!(value, "require-corp");

        let server = response
            .headers
            .iter()
            .find(|(n, _)| *n == header::SERVER)
            .map(|(_, v)| v.to_str().unwrap())
            .unwrap();
        assert_eq!(server, format!("gameserve/{}", crate::VERSION));

        let lengths: Vec<_> = response
            .headers
            .iter()
            .filter(|(n, _)| *n == header::CONTENT_LENGTH)
            .collect();
        assert_eq!(lengths.len(), 1);
        assert_eq!(
            lengths[0].1.to_str().unwrap(),
            response.body.len().to_string()
        );
    }
}
