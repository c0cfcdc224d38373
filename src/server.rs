//! Static-file documentation server.
//!
//! `masm serve` hosts the `root/` directory over HTTP so the bundled
//! documentation is browsable. The server runs on its own runtime and
//! shares nothing with the interpreter.

use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

pub const DEFAULT_PORT: u16 = 7080;

/// Ensure the document root exists, seeding a stub index page the
/// first time.
pub fn prepare_root(root: &Path) -> std::io::Result<()> {
    if !root.is_dir() {
        println!("Creating documentation directory: {}", root.display());
        std::fs::create_dir_all(root)?;
    }
    let index = root.join("index.html");
    if !index.exists() {
        std::fs::write(
            &index,
            "<html><body><h1>masm documentation</h1>\
             <p>Documentation server is running. Add HTML files to the root directory.</p>\
             </body></html>",
        )?;
    }
    Ok(())
}

/// Accept loop. Runs until the process is terminated.
pub async fn run_server(root: PathBuf, port: u16) -> std::io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    println!("Starting HTTP server at http://localhost:{}/", port);

    loop {
        let (stream, _) = listener.accept().await?;
        let root = root.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_request(stream, &root).await {
                eprintln!("error processing request: {}", e);
            }
        });
    }
}

async fn handle_request(mut stream: TcpStream, root: &Path) -> std::io::Result<()> {
    let mut buf = vec![0u8; 4096];
    let n = stream.read(&mut buf).await?;
    let request = String::from_utf8_lossy(&buf[..n]);

    let path = match parse_request_path(&request) {
        Some(p) => p,
        None => {
            respond(&mut stream, 400, "text/plain", b"Bad Request").await?;
            return Ok(());
        }
    };

    match read_document(root, &path) {
        Some((mime, body)) => respond(&mut stream, 200, mime, &body).await,
        None => {
            let message = format!("File not found: {}", path);
            respond(&mut stream, 404, "text/plain", message.as_bytes()).await
        }
    }
}

/// Pull the path out of the request line; GET only.
fn parse_request_path(request: &str) -> Option<String> {
    let line = request.lines().next()?;
    let mut parts = line.split_whitespace();
    if parts.next()? != "GET" {
        return None;
    }
    let path = parts.next()?;
    Some(path.split('?').next().unwrap_or(path).to_string())
}

/// Map a request path to a file under the root and read it. `/`
/// serves `index.html`; traversal outside the root is rejected.
fn read_document(root: &Path, request_path: &str) -> Option<(&'static str, Vec<u8>)> {
    let relative = if request_path == "/" {
        "index.html"
    } else {
        request_path.trim_start_matches('/')
    };
    if relative.split('/').any(|seg| seg == "..") {
        return None;
    }

    let file = root.join(relative);
    let body = std::fs::read(&file).ok()?;
    let mime = mime_type(file.extension().and_then(|e| e.to_str()).unwrap_or(""));
    Some((mime, body))
}

fn mime_type(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" => "application/json",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "txt" | "masm" => "text/plain",
        "pdf" => "application/pdf",
        _ => "application/octet-stream",
    }
}

async fn respond(
    stream: &mut TcpStream,
    status: u16,
    mime: &str,
    body: &[u8],
) -> std::io::Result<()> {
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        _ => "Not Found",
    };
    let header = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        reason,
        mime,
        body.len()
    );
    stream.write_all(header.as_bytes()).await?;
    stream.write_all(body).await?;
    stream.flush().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_request_path() {
        assert_eq!(
            parse_request_path("GET /docs/x.html HTTP/1.1\r\nHost: x\r\n"),
            Some("/docs/x.html".to_string())
        );
        assert_eq!(
            parse_request_path("GET /?q=1 HTTP/1.1\r\n"),
            Some("/".to_string())
        );
        assert_eq!(parse_request_path("POST / HTTP/1.1\r\n"), None);
        assert_eq!(parse_request_path(""), None);
    }

    #[test]
    fn test_read_document_and_mime() {
        let dir = tempfile::tempdir().unwrap();
        prepare_root(dir.path()).unwrap();
        std::fs::write(dir.path().join("style.css"), "body {}").unwrap();

        let (mime, body) = read_document(dir.path(), "/").unwrap();
        assert_eq!(mime, "text/html");
        assert!(!body.is_empty());

        let (mime, _) = read_document(dir.path(), "/style.css").unwrap();
        assert_eq!(mime, "text/css");

        assert!(read_document(dir.path(), "/missing.html").is_none());
        assert!(read_document(dir.path(), "/../etc/passwd").is_none());
    }

    #[tokio::test]
    async fn test_serves_index_over_http() {
        let dir = tempfile::tempdir().unwrap();
        prepare_root(dir.path()).unwrap();

        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let root = dir.path().to_path_buf();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            handle_request(stream, &root).await.unwrap();
        });

        let mut client = TcpStream::connect(("127.0.0.1", port)).await.unwrap();
        client
            .write_all(b"GET / HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        let response = String::from_utf8_lossy(&response);
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("masm documentation"));
    }
}
