//! Minimal HTTP/1.1 request parsing and response writing
//!
//! The server only speaks GET/HEAD over HTTP/1.1 with keep-alive, so the
//! wire handling is a small hand-rolled parser with a strict size bound on
//! the request head rather than a full HTTP stack.

use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use super::response::{reason_phrase, ServerResponse};

/// A parsed request head
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    /// Path with any query string stripped
    pub path: String,
    /// Lowercased header names with their values
    pub headers: Vec<(String, String)>,
    pub keep_alive: bool,
}

impl Request {
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Errors from reading one request off the socket
#[derive(Debug)]
pub enum RequestError {
    /// Peer closed the connection cleanly between requests
    ConnectionClosed,
    /// Request head exceeded the configured size limit
    TooLarge,
    /// Malformed request line or header
    Malformed(String),
    Io(std::io::Error),
}

impl From<std::io::Error> for RequestError {
    fn from(err: std::io::Error) -> Self {
        RequestError::Io(err)
    }
}

/// Read one request head from the stream. Body reading is intentionally
/// absent: the server only serves GETs.
pub async fn read_request<R>(
    reader: &mut BufReader<R>,
    max_request_size: usize,
) -> Result<Request, RequestError>
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    let mut total = 0usize;

    let n = reader.read_line(&mut line).await?;
    if n == 0 {
        return Err(RequestError::ConnectionClosed);
    }
    total += n;
    if total > max_request_size {
        return Err(RequestError::TooLarge);
    }

    let request_line = line.trim_end();
    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| RequestError::Malformed("empty request line".to_string()))?
        .to_string();
    let target = parts
        .next()
        .ok_or_else(|| RequestError::Malformed("missing request target".to_string()))?;
    let version = parts.next().unwrap_or("HTTP/1.1");
    let http_11 = version.eq_ignore_ascii_case("HTTP/1.1");

    // Strip any query string; transforms travel in the path
    let path = target.split('?').next().unwrap_or(target).to_string();

    let mut headers = Vec::new();
    loop {
        let mut header_line = String::new();
        let n = reader.read_line(&mut header_line).await?;
        if n == 0 {
            return Err(RequestError::ConnectionClosed);
        }
        total += n;
        if total > max_request_size {
            return Err(RequestError::TooLarge);
        }

        let trimmed = header_line.trim_end();
        if trimmed.is_empty() {
            break;
        }
        match trimmed.split_once(':') {
            Some((name, value)) => {
                headers.push((name.trim().to_lowercase(), value.trim().to_string()));
            }
            None => {
                return Err(RequestError::Malformed(format!(
                    "header without colon: {}",
                    trimmed
                )))
            }
        }
    }

    let connection = headers
        .iter()
        .find(|(k, _)| k == "connection")
        .map(|(_, v)| v.to_lowercase());
    let keep_alive = match connection.as_deref() {
        Some(v) if v.contains("close") => false,
        Some(v) if v.contains("keep-alive") => true,
        _ => http_11,
    };

    Ok(Request {
        method,
        path,
        headers,
        keep_alive,
    })
}

/// Serialise a response onto the stream
pub async fn write_response<W>(
    writer: &mut W,
    response: &ServerResponse,
    keep_alive: bool,
    head_only: bool,
) -> std::io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut head = format!(
        "HTTP/1.1 {} {}\r\n",
        response.status,
        reason_phrase(response.status)
    );
    if !response.content_type.is_empty() {
        head.push_str(&format!("Content-Type: {}\r\n", response.content_type));
    }
    head.push_str(&format!("Content-Length: {}\r\n", response.body.len()));
    if let Some(cache_control) = &response.cache_control {
        head.push_str(&format!("Cache-Control: {}\r\n", cache_control));
    }
    if let Some(etag) = &response.etag {
        head.push_str(&format!("ETag: \"{}\"\r\n", etag));
    }
    if let Some(vary) = response.vary {
        head.push_str(&format!("Vary: {}\r\n", vary));
    }
    head.push_str(if keep_alive {
        "Connection: keep-alive\r\n"
    } else {
        "Connection: close\r\n"
    });
    head.push_str("\r\n");

    writer.write_all(head.as_bytes()).await?;
    if !head_only && !response.body.is_empty() {
        writer.write_all(&response.body).await?;
    }
    writer.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::io::Cursor;

    async fn parse(raw: &str) -> Result<Request, RequestError> {
        let mut reader = BufReader::new(Cursor::new(raw.as_bytes().to_vec()));
        read_request(&mut reader, 8192).await
    }

    #[tokio::test]
    async fn test_parse_simple_get() {
        let request = parse("GET /photo.png/w=64 HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        assert_eq!(request.method, "GET");
        assert_eq!(request.path, "/photo.png/w=64");
        assert!(request.keep_alive);
        assert_eq!(request.header("host"), Some("localhost"));
    }

    #[tokio::test]
    async fn test_parse_strips_query_string() {
        let request = parse("GET /photo.png?x=1 HTTP/1.1\r\n\r\n").await.unwrap();
        assert_eq!(request.path, "/photo.png");
    }

    #[tokio::test]
    async fn test_connection_close_detected() {
        let request = parse("GET / HTTP/1.1\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();
        assert!(!request.keep_alive);
    }

    #[tokio::test]
    async fn test_http_10_defaults_to_close() {
        let request = parse("GET / HTTP/1.0\r\n\r\n").await.unwrap();
        assert!(!request.keep_alive);

        let request = parse("GET / HTTP/1.0\r\nConnection: keep-alive\r\n\r\n")
            .await
            .unwrap();
        assert!(request.keep_alive);
    }

    #[tokio::test]
    async fn test_header_names_lowercased() {
        let request = parse("GET / HTTP/1.1\r\nIf-None-Match: \"abc\"\r\n\r\n")
            .await
            .unwrap();
        assert_eq!(request.header("if-none-match"), Some("\"abc\""));
        assert_eq!(request.header("If-None-Match"), Some("\"abc\""));
    }

    #[tokio::test]
    async fn test_empty_stream_is_connection_closed() {
        let result = parse("").await;
        assert!(matches!(result, Err(RequestError::ConnectionClosed)));
    }

    #[tokio::test]
    async fn test_oversized_head_rejected() {
        let big_header = format!("GET / HTTP/1.1\r\nX-Big: {}\r\n\r\n", "a".repeat(10_000));
        let mut reader = BufReader::new(Cursor::new(big_header.into_bytes()));
        let result = read_request(&mut reader, 1024).await;
        assert!(matches!(result, Err(RequestError::TooLarge)));
    }

    #[tokio::test]
    async fn test_malformed_header_rejected() {
        let result = parse("GET / HTTP/1.1\r\nbroken header line\r\n\r\n").await;
        assert!(matches!(result, Err(RequestError::Malformed(_))));
    }

    #[tokio::test]
    async fn test_write_response_wire_format() {
        let response = ServerResponse::image(Bytes::from("BODY"), "image/png", 60);
        let mut out = Cursor::new(Vec::new());
        write_response(&mut out, &response, true, false).await.unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();

        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Type: image/png\r\n"));
        assert!(text.contains("Content-Length: 4\r\n"));
        assert!(text.contains("Cache-Control: public, max-age=60\r\n"));
        assert!(text.contains("Vary: Accept\r\n"));
        assert!(text.contains("Connection: keep-alive\r\n"));
        assert!(text.ends_with("BODY"));
    }

    #[tokio::test]
    async fn test_write_head_only_omits_body() {
        let response = ServerResponse::image(Bytes::from("BODY"), "image/png", 60);
        let mut out = Cursor::new(Vec::new());
        write_response(&mut out, &response, false, true).await.unwrap();
        let text = String::from_utf8(out.into_inner()).unwrap();
        assert!(text.contains("Content-Length: 4\r\n"));
        assert!(!text.ends_with("BODY"));
        assert!(text.contains("Connection: close\r\n"));
    }
}
