//! TLS listener for the standalone adapter.
//!
//! may_minihttp exposes no TLS hook, so HTTPS terminates here: a
//! coroutine accept loop wraps each connection in rustls and parses
//! requests with httparse (the same parser may_minihttp builds on).
//! Connections are served one request at a time and closed afterwards.

use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::net::{SocketAddr, ToSocketAddrs};
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use http::Method;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::{ServerConfig, ServerConnection, StreamOwned};
use tracing::{debug, warn};

use super::http_server::ServerHandle;
use super::response::{http_error, RawResponse, WireStyle};
use super::service::AppService;

const MAX_HEADER_COUNT: usize = 32;
const MAX_HEADER_BYTES: usize = 64 * 1024;

/// Start an HTTPS accept loop and return its handle.
pub fn start(
    service: AppService,
    addr: &str,
    cert_file: &Path,
    key_file: &Path,
) -> Result<ServerHandle> {
    let config = Arc::new(load_tls_config(cert_file, key_file)?);
    let addr: SocketAddr = addr
        .to_socket_addrs()
        .with_context(|| format!("invalid address {addr}"))?
        .next()
        .ok_or_else(|| anyhow!("invalid address"))?;
    let listener =
        may::net::TcpListener::bind(addr).with_context(|| format!("failed to bind {addr}"))?;
    let handle = unsafe {
        may::coroutine::spawn(move || {
            accept_loop(listener, config, service);
        })
    };
    Ok(ServerHandle::new(addr, handle))
}

fn load_tls_config(cert_file: &Path, key_file: &Path) -> Result<ServerConfig> {
    let mut cert_reader = BufReader::new(
        File::open(cert_file)
            .with_context(|| format!("failed to open certificate {}", cert_file.display()))?,
    );
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut cert_reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .context("failed to read certificate file")?;

    let mut key_reader = BufReader::new(
        File::open(key_file)
            .with_context(|| format!("failed to open key {}", key_file.display()))?,
    );
    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut key_reader)
        .context("failed to read key file")?
        .ok_or_else(|| anyhow!("no private key found in {}", key_file.display()))?;

    ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .context("invalid certificate or key")
}

fn accept_loop(listener: may::net::TcpListener, config: Arc<ServerConfig>, service: AppService) {
    while let Ok((stream, peer)) = listener.accept() {
        let config = config.clone();
        let service = service.clone();
        unsafe {
            may::coroutine::spawn(move || {
                if let Err(error) = serve_connection(stream, config, &service) {
                    debug!(peer = %peer, %error, "TLS connection closed with error");
                }
            });
        }
    }
}

fn serve_connection(
    stream: may::net::TcpStream,
    config: Arc<ServerConfig>,
    service: &AppService,
) -> Result<()> {
    let conn = ServerConnection::new(config)?;
    let mut tls = StreamOwned::new(conn, stream);

    let (method, path_and_query, headers, body) = read_request(&mut tls)?;

    let mut rs = RawResponse::new(&mut tls, WireStyle::Http11);
    match Method::from_bytes(method.as_bytes()) {
        Ok(method) => service.handle(method, &path_and_query, headers, body, &mut rs)?,
        Err(_) => http_error(&mut rs, 405, &format!("Method {method} is not supported"))?,
    }
    tls.flush()?;
    Ok(())
}

type ParsedHead = (String, String, std::collections::HashMap<String, String>, Vec<u8>);

fn read_request(stream: &mut dyn Read) -> Result<ParsedHead> {
    let mut buf = Vec::with_capacity(4096);
    let head_len;
    loop {
        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            return Err(anyhow!("connection closed before a full request"));
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            head_len = pos + 4;
            break;
        }
        if buf.len() > MAX_HEADER_BYTES {
            return Err(anyhow!("request head too large"));
        }
    }

    let mut header_storage = [httparse::EMPTY_HEADER; MAX_HEADER_COUNT];
    let mut parsed = httparse::Request::new(&mut header_storage);
    let status = parsed
        .parse(&buf[..head_len])
        .map_err(|e| anyhow!("malformed request: {e}"))?;
    if !status.is_complete() {
        return Err(anyhow!("incomplete request head"));
    }

    let method = parsed.method.unwrap_or("GET").to_string();
    let path_and_query = parsed.path.unwrap_or("/").to_string();
    let mut headers = std::collections::HashMap::new();
    let mut content_length = 0usize;
    for header in parsed.headers.iter() {
        let name = header.name.to_ascii_lowercase();
        let value = String::from_utf8_lossy(header.value).to_string();
        if name == "content-length" {
            content_length = value.trim().parse().unwrap_or(0);
        }
        headers.insert(name, value);
    }

    let mut body = buf[head_len..].to_vec();
    while body.len() < content_length {
        let mut chunk = [0u8; 4096];
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            warn!("request body ended early");
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    Ok((method, path_and_query, headers, body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_request_parses_head_and_body() {
        let raw = b"POST /say?x=1 HTTP/1.1\r\nHost: h\r\nContent-Length: 5\r\n\r\nhello";
        let (method, path, headers, body) = read_request(&mut &raw[..]).unwrap();
        assert_eq!(method, "POST");
        assert_eq!(path, "/say?x=1");
        assert_eq!(headers.get("host").map(String::as_str), Some("h"));
        assert_eq!(body, b"hello");
    }

    #[test]
    fn test_read_request_without_body() {
        let raw = b"GET / HTTP/1.1\r\nHost: h\r\n\r\n";
        let (method, path, _, body) = read_request(&mut &raw[..]).unwrap();
        assert_eq!(method, "GET");
        assert_eq!(path, "/");
        assert!(body.is_empty());
    }

    #[test]
    fn test_read_request_rejects_garbage() {
        let raw = b"\0garbage\0\r\n\r\n";
        assert!(read_request(&mut &raw[..]).is_err());
    }
}
