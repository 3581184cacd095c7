//! HTTP Server for the catalog engine
//! Simple HTTP server using tokio and basic HTTP handling

use catalog_lens::api::{parse_query, ApiRequest, ApiResponse, ApiRouter};
use catalog_lens::config::{init_tracing, AppConfig};
use catalog_lens::{CatalogEngine, SqliteStore};
use std::sync::Arc;
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};
use tracing::{debug, info, warn};

/// Longest silence tolerated between two reads of one request.
const IDLE_READ_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    init_tracing();

    let store = Arc::new(SqliteStore::open(&config.database_path)?);
    let engine = Arc::new(CatalogEngine::new(store, config.identifier_generator()));
    let router = Arc::new(ApiRouter::new(engine, config.upload_dir.clone()));

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("Server listening on {}", config.bind_addr);

    loop {
        let (stream, addr) = listener.accept().await?;
        debug!("New connection from {}", addr);
        let router = Arc::clone(&router);
        let max_body = config.max_upload_bytes;
        tokio::spawn(async move { handle_connection(stream, router, max_body).await });
    }
}

/// Parsed request head plus how many body bytes to expect
#[derive(Debug)]
struct RequestHead {
    method: String,
    target: String,
    content_length: usize,
    body_start: usize,
}

fn find_header_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn parse_head(buffer: &[u8], body_start: usize) -> Option<RequestHead> {
    let head = String::from_utf8_lossy(&buffer[..body_start]);
    let mut lines = head.lines();

    let mut parts = lines.next()?.split_whitespace();
    let method = parts.next()?.to_string();
    let target = parts.next()?.to_string();

    let mut content_length = 0;
    for line in lines {
        if let Some((key, value)) = line.split_once(':') {
            if key.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }

    Some(RequestHead {
        method,
        target,
        content_length,
        body_start,
    })
}

/// Read one request. The timeout bounds each read, not the whole request, so
/// a slow but steady upload is never cut off.
async fn read_request<R>(
    stream: &mut R,
    max_body: usize,
    idle: Duration,
) -> io::Result<(Vec<u8>, Option<RequestHead>)>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = Vec::new();
    let mut temp_buf = [0; 8192];
    let mut head: Option<RequestHead> = None;

    loop {
        let n = timeout(idle, stream.read(&mut temp_buf))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "request read timed out"))??;
        if n == 0 {
            break;
        }
        buffer.extend_from_slice(&temp_buf[..n]);

        if head.is_none() {
            if let Some(end) = find_header_end(&buffer) {
                head = parse_head(&buffer, end);
                if head.is_none() {
                    break;
                }
            }
        }
        if let Some(h) = &head {
            if h.content_length > max_body || buffer.len() >= h.body_start + h.content_length {
                break;
            }
        }
    }

    Ok((buffer, head))
}

async fn handle_connection(mut stream: TcpStream, router: Arc<ApiRouter>, max_body: usize) {
    let response = match read_request(&mut stream, max_body, IDLE_READ_TIMEOUT).await {
        Err(e) if e.kind() == io::ErrorKind::TimedOut => {
            warn!("Request read timeout");
            return;
        }
        Err(e) => {
            warn!("Failed to read from stream: {}", e);
            return;
        }
        Ok((_, None)) => ApiResponse {
            status: 400,
            body: serde_json::json!({ "success": false, "message": "malformed request" }),
        },
        Ok((_, Some(h))) if h.content_length > max_body => ApiResponse {
            status: 413,
            body: serde_json::json!({ "success": false, "message": "upload too large" }),
        },
        Ok((buffer, Some(h))) => {
            let request = build_request(h, &buffer);
            info!("{} {}", request.method, request.path);
            router.handle(&request).await
        }
    };

    if let Err(e) = stream.write_all(create_response(&response).as_bytes()).await {
        warn!("Failed to write response: {}", e);
    }
}

fn build_request(head: RequestHead, buffer: &[u8]) -> ApiRequest {
    let (path, query) = match head.target.split_once('?') {
        Some((path, query)) => (path.to_string(), parse_query(query)),
        None => (head.target.clone(), Default::default()),
    };

    // Normalize path (remove trailing slash except for root)
    let mut path = path.trim_end_matches('/').to_string();
    if path.is_empty() {
        path = "/".to_string();
    }

    let end = (head.body_start + head.content_length).min(buffer.len());
    ApiRequest {
        method: head.method,
        path,
        query,
        body: buffer[head.body_start..end].to_vec(),
    }
}

fn create_response(response: &ApiResponse) -> String {
    let body = response.body.to_string();
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Content-Length: {}\r\n\
         Connection: close\r\n\
         \r\n\
         {}",
        response.status,
        response.status_text(),
        body.len(),
        body
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    const IDLE: Duration = Duration::from_millis(200);

    #[tokio::test]
    async fn test_slow_steady_upload_is_read_whole() {
        let (mut client, mut server) = tokio::io::duplex(64);
        let body = "style_code\nA1\nA2\nA3\n";
        let writer = tokio::spawn(async move {
            let head = format!(
                "POST /dataupload HTTP/1.1\r\nContent-Length: {}\r\n\r\n",
                body.len()
            );
            client.write_all(head.as_bytes()).await.unwrap();
            // total transfer time well past IDLE, each gap under it
            for line in body.split_inclusive('\n') {
                sleep(IDLE / 2).await;
                client.write_all(line.as_bytes()).await.unwrap();
            }
            client
        });

        let (buffer, head) = read_request(&mut server, 1024, IDLE).await.unwrap();
        let request = build_request(head.unwrap(), &buffer);
        assert_eq!(request.path, "/dataupload");
        assert_eq!(request.body, body.as_bytes());
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn test_stalled_client_times_out() {
        let (mut client, mut server) = tokio::io::duplex(64);
        client
            .write_all(b"POST /dataupload HTTP/1.1\r\nContent-Length: 10\r\n\r\nabc")
            .await
            .unwrap();

        let err = read_request(&mut server, 1024, IDLE).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        drop(client);
    }

    #[tokio::test]
    async fn test_oversized_body_stops_after_head() {
        let (mut client, mut server) = tokio::io::duplex(256);
        client
            .write_all(b"POST /dataupload HTTP/1.1\r\nContent-Length: 4096\r\n\r\n")
            .await
            .unwrap();

        let (_, head) = read_request(&mut server, 1024, IDLE).await.unwrap();
        assert_eq!(head.unwrap().content_length, 4096);
        drop(client);
    }
}
