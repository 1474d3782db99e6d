//! Server integration tests
//!
//! Runs the real accept loop against an in-process fixture origin and
//! talks to it over raw TCP, covering routing, caching headers,
//! conditional requests and keep-alive.

use std::io::Cursor;
use std::sync::Arc;

use image::{ImageFormat, RgbaImage};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use zimgx::config::Config;
use zimgx::server::Server;

fn photo_png() -> Vec<u8> {
    let img = RgbaImage::from_fn(64, 64, |x, y| {
        image::Rgba([(x * 4) as u8, (y * 4) as u8, 99, 255])
    });
    let mut buffer = Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

/// Minimal origin: serves the PNG fixture for /photo.png, 404 otherwise
async fn spawn_origin() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = format!("http://{}", listener.local_addr().unwrap());
    let body = photo_png();

    tokio::spawn(async move {
        loop {
            let (mut stream, _) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(_) => break,
            };
            let body = body.clone();
            tokio::spawn(async move {
                let mut buf = vec![0u8; 4096];
                let n = stream.read(&mut buf).await.unwrap_or(0);
                let head = String::from_utf8_lossy(&buf[..n]);
                let found = head.starts_with("GET /photo.png");
                let response = if found {
                    let mut r = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: image/png\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                        body.len()
                    )
                    .into_bytes();
                    r.extend_from_slice(&body);
                    r
                } else {
                    b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                        .to_vec()
                };
                let _ = stream.write_all(&response).await;
            });
        }
    });

    address
}

/// Start the proxy against the given origin; returns its address
async fn spawn_proxy(origin_url: &str) -> String {
    let mut config = Config::default();
    config.origin.base_url = origin_url.to_string();
    config.origin.max_retries = 0;
    config.origin.timeout_ms = 2000;

    let server = Arc::new(Server::from_config(config).unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();

    tokio::spawn(async move {
        let _ = server.serve(listener).await;
    });

    address
}

struct Response {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

impl Response {
    fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Read exactly one HTTP response off the stream
async fn read_response(stream: &mut TcpStream) -> Response {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];

    // read until the end of the head
    let head_end = loop {
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0, "connection closed before response head");
        raw.extend_from_slice(&buf[..n]);
        if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&raw[..head_end]).into_owned();
    let mut lines = head.split("\r\n");
    let status_line = lines.next().unwrap();
    let status: u16 = status_line.split_whitespace().nth(1).unwrap().parse().unwrap();

    let mut headers = Vec::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_lowercase(), value.trim().to_string()));
        }
    }

    let content_length: usize = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .map(|(_, v)| v.parse().unwrap())
        .unwrap_or(0);

    let mut body = raw[head_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0, "connection closed mid-body");
        body.extend_from_slice(&buf[..n]);
    }
    body.truncate(content_length);

    Response {
        status,
        headers,
        body,
    }
}

async fn get(address: &str, path: &str, extra_headers: &[(&str, &str)]) -> Response {
    let mut stream = TcpStream::connect(address).await.unwrap();
    let mut request = format!("GET {} HTTP/1.1\r\nHost: zimgx.test\r\n", path);
    for (name, value) in extra_headers {
        request.push_str(&format!("{}: {}\r\n", name, value));
    }
    request.push_str("Connection: close\r\n\r\n");
    stream.write_all(request.as_bytes()).await.unwrap();
    read_response(&mut stream).await
}

#[tokio::test]
async fn test_health_endpoint_over_tcp() {
    let origin = spawn_origin().await;
    let proxy = spawn_proxy(&origin).await;

    let response = get(&proxy, "/health", &[]).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-type"), Some("application/json"));
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_metrics_endpoint_reports_counters() {
    let origin = spawn_origin().await;
    let proxy = spawn_proxy(&origin).await;

    get(&proxy, "/health", &[]).await;
    let response = get(&proxy, "/metrics", &[]).await;
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert!(body["requestsTotal"].as_u64().unwrap() >= 2);
    assert!(body.get("cacheHits").is_some());
    assert!(body.get("uptimeSeconds").is_some());
}

#[tokio::test]
async fn test_image_transform_with_caching_headers() {
    let origin = spawn_origin().await;
    let proxy = spawn_proxy(&origin).await;

    let response = get(&proxy, "/photo.png/w=32,f=png", &[]).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.header("content-type"), Some("image/png"));
    assert!(response
        .header("cache-control")
        .unwrap()
        .starts_with("public, max-age="));
    assert_eq!(response.header("vary"), Some("Accept"));
    let etag = response.header("etag").unwrap();
    assert!(etag.starts_with('"') && etag.ends_with('"'));

    // body decodes to the resized image
    let decoded = image::load_from_memory(&response.body).unwrap();
    assert_eq!(decoded.width(), 32);
}

#[tokio::test]
async fn test_if_none_match_round_trip_over_tcp() {
    let origin = spawn_origin().await;
    let proxy = spawn_proxy(&origin).await;

    let first = get(&proxy, "/photo.png/w=16,f=png", &[]).await;
    let etag = first.header("etag").unwrap().to_string();

    let revalidated = get(
        &proxy,
        "/photo.png/w=16,f=png",
        &[("If-None-Match", &etag)],
    )
    .await;
    assert_eq!(revalidated.status, 304);
    assert!(revalidated.body.is_empty());
    assert_eq!(revalidated.header("etag"), Some(etag.as_str()));
}

#[tokio::test]
async fn test_missing_origin_object_is_404() {
    let origin = spawn_origin().await;
    let proxy = spawn_proxy(&origin).await;

    let response = get(&proxy, "/nope.png", &[]).await;
    assert_eq!(response.status, 404);
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["error"]["status"], 404);
}

#[tokio::test]
async fn test_traversal_path_is_404() {
    let origin = spawn_origin().await;
    let proxy = spawn_proxy(&origin).await;

    let response = get(&proxy, "/a/../etc/passwd", &[]).await;
    assert_eq!(response.status, 404);
}

#[tokio::test]
async fn test_invalid_transform_is_400() {
    let origin = spawn_origin().await;
    let proxy = spawn_proxy(&origin).await;

    let response = get(&proxy, "/photo.png/banana=42", &[]).await;
    assert_eq!(response.status, 400);
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["error"]["detail"], "invalid transform parameters");
}

#[tokio::test]
async fn test_out_of_range_transform_is_422() {
    let origin = spawn_origin().await;
    let proxy = spawn_proxy(&origin).await;

    let response = get(&proxy, "/photo.png/w=9999", &[]).await;
    assert_eq!(response.status, 422);
}

#[tokio::test]
async fn test_keep_alive_serves_multiple_requests() {
    let origin = spawn_origin().await;
    let proxy = spawn_proxy(&origin).await;

    let mut stream = TcpStream::connect(&proxy).await.unwrap();
    for _ in 0..3 {
        stream
            .write_all(b"GET /health HTTP/1.1\r\nHost: zimgx.test\r\n\r\n")
            .await
            .unwrap();
        let response = read_response(&mut stream).await;
        assert_eq!(response.status, 200);
        assert_eq!(response.header("connection"), Some("keep-alive"));
    }
}
