//! Minimal HTTP/1.1 wire handling
//!
//! Only the request line matters to this server; header fields are drained
//! and discarded. Responses are always written with `Connection: close`, so
//! there is no keep-alive state to track.

use http::Method;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use super::{Request, Response};
use crate::error::{Error, Result};

/// Request heads larger than this, request line included, are rejected
/// outright
const MAX_HEAD_BYTES: u64 = 16 * 1024;

/// Bodies are discarded, but still drained up to this size so the response
/// is not clobbered by a reset on unread data
const MAX_BODY_BYTES: u64 = 1024 * 1024;

/// Read and parse one request head from the stream
pub(crate) async fn read_request<R>(reader: &mut R) -> Result<Request>
where
    R: AsyncBufRead + Unpin,
{
    let (parsed, content_length) = {
        // The head budget covers the request line and every header field;
        // once the limit is exhausted read_line sees EOF mid-head
        let mut head = (&mut *reader).take(MAX_HEAD_BYTES);

        let mut line = String::new();
        let n = head.read_line(&mut line).await?;
        if n == 0 {
            return Err(Error::BadRequest(
                "connection closed before request line".into(),
            ));
        }
        if head.limit() == 0 && !line.ends_with('\n') {
            return Err(Error::BadRequest("request head too large".into()));
        }

        // Even when the request line is garbage the rest of the head is
        // drained below, so the 400 is not lost to a reset on unread input
        let parsed = parse_request_line(line.trim_end());

        // Drain the header fields up to the blank line, keeping only the
        // body length so the body can be drained too
        let mut content_length: u64 = 0;
        loop {
            let mut field = String::new();
            let n = head.read_line(&mut field).await?;
            if n == 0 && head.limit() == 0 {
                return Err(Error::BadRequest("request head too large".into()));
            }
            if n == 0 || field == "\r\n" || field == "\n" {
                break;
            }
            if let Some((name, value)) = field.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap_or(0);
                }
            }
        }

        (parsed, content_length)
    };

    if content_length > 0 {
        let mut body = (&mut *reader).take(content_length.min(MAX_BODY_BYTES));
        tokio::io::copy(&mut body, &mut tokio::io::sink()).await?;
    }

    parsed
}

fn parse_request_line(line: &str) -> Result<Request> {
    let mut parts = line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| Error::BadRequest("empty request line".into()))?;
    let target = parts
        .next()
        .ok_or_else(|| Error::BadRequest("missing request target".into()))?;
    let version = parts
        .next()
        .ok_or_else(|| Error::BadRequest("missing HTTP version".into()))?;

    if !version.starts_with("HTTP/") {
        return Err(Error::BadRequest(format!("bad HTTP version {:?}", version)));
    }

    let method = Method::from_bytes(method.as_bytes())
        .map_err(|_| Error::BadRequest(format!("bad method {:?}", method)))?;

    Ok(Request {
        method,
        target: target.to_string(),
    })
}

/// Write the response head and, unless the request was a HEAD, the body
pub(crate) async fn write_response<W>(
    writer: &mut W,
    response: &Response,
    include_body: bool,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let reason = response.status.canonical_reason().unwrap_or("");
    let mut head = Vec::with_capacity(256);
    head.extend_from_slice(
        format!("HTTP/1.1 {} {}\r\n", response.status.as_u16(), reason).as_bytes(),
    );
    for (name, value) in &response.headers {
        head.extend_from_slice(name.as_str().as_bytes());
        head.extend_from_slice(b": ");
        head.extend_from_slice(value.as_bytes());
        head.extend_from_slice(b"\r\n");
    }
    head.extend_from_slice(b"\r\n");

    writer.write_all(&head).await?;
    if include_body {
        writer.write_all(&response.body).await?;
    }
    writer.flush().await?;

    Ok(())
}
