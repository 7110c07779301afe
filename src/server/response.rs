//! The response seam between the pipeline and the host adapters.

use std::io::{self, Write};

/// Write side of one HTTP exchange.
///
/// Headers may be set until `start` sends the status line; after that
/// only the body writer is valid. `start` is one-shot.
pub trait ResponseStream {
    /// Set (or replace) a response header.
    fn set_header(&mut self, name: &str, value: &str);

    /// Send the status line and accumulated headers.
    fn start(&mut self, status: u16) -> io::Result<()>;

    /// The response body, valid after `start`.
    fn body(&mut self) -> &mut dyn Write;
}

pub fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        400 => "Bad Request",
        401 => "Unauthorized",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        415 => "Unsupported Media Type",
        500 => "Internal Server Error",
        503 => "Service Unavailable",
        _ => "OK",
    }
}

/// Emit a plain-text error response, the shape every error path uses.
pub fn http_error(rs: &mut dyn ResponseStream, status: u16, message: &str) -> io::Result<()> {
    rs.set_header("Content-Type", "text/plain; charset=utf-8");
    rs.set_header("Content-Length", &(message.len() + 1).to_string());
    rs.start(status)?;
    writeln!(rs.body(), "{message}")
}

/// Replace-or-append semantics shared by the adapter header buffers.
pub(crate) fn upsert_header(headers: &mut Vec<(String, String)>, name: &str, value: &str) {
    match headers
        .iter_mut()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
    {
        Some((_, existing)) => *existing = value.to_string(),
        None => headers.push((name.to_string(), value.to_string())),
    }
}

/// Buffered response used where the transport wants a full body up
/// front (the standalone HTTP adapter).
#[derive(Debug, Default)]
pub struct BufferedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    started: bool,
}

impl BufferedResponse {
    pub fn new() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: Vec::new(),
            started: false,
        }
    }
}

impl ResponseStream for BufferedResponse {
    fn set_header(&mut self, name: &str, value: &str) {
        upsert_header(&mut self.headers, name, value);
    }

    fn start(&mut self, status: u16) -> io::Result<()> {
        if !self.started {
            self.status = status;
            self.started = true;
        }
        Ok(())
    }

    fn body(&mut self) -> &mut dyn Write {
        &mut self.body
    }
}

/// Header style for responses written straight onto a byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WireStyle {
    /// `HTTP/1.1 <code> <reason>` status line (the TLS listener).
    Http11,
    /// CGI-style `Status:` header (the FastCGI responder).
    Cgi,
}

/// Response written directly to a connection or FastCGI stdout.
pub struct RawResponse<'a> {
    out: &'a mut dyn Write,
    style: WireStyle,
    headers: Vec<(String, String)>,
    started: bool,
}

impl<'a> RawResponse<'a> {
    pub fn new(out: &'a mut dyn Write, style: WireStyle) -> Self {
        Self {
            out,
            style,
            headers: Vec::new(),
            started: false,
        }
    }
}

impl ResponseStream for RawResponse<'_> {
    fn set_header(&mut self, name: &str, value: &str) {
        upsert_header(&mut self.headers, name, value);
    }

    fn start(&mut self, status: u16) -> io::Result<()> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        let reason = status_reason(status);
        match self.style {
            WireStyle::Http11 => {
                write!(self.out, "HTTP/1.1 {status} {reason}\r\n")?;
                write!(self.out, "Connection: close\r\n")?;
            }
            WireStyle::Cgi => {
                write!(self.out, "Status: {status} {reason}\r\n")?;
            }
        }
        for (name, value) in &self.headers {
            write!(self.out, "{name}: {value}\r\n")?;
        }
        write!(self.out, "\r\n")
    }

    fn body(&mut self) -> &mut dyn Write {
        &mut *self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffered_response_collects() {
        let mut rs = BufferedResponse::new();
        rs.set_header("Content-Type", "text/plain");
        rs.set_header("Content-Type", "application/json");
        rs.start(201).unwrap();
        rs.body().write_all(b"{}").unwrap();
        assert_eq!(rs.status, 201);
        assert_eq!(
            rs.headers,
            vec![("Content-Type".to_string(), "application/json".to_string())]
        );
        assert_eq!(rs.body, b"{}");
    }

    #[test]
    fn test_buffered_start_is_one_shot() {
        let mut rs = BufferedResponse::new();
        rs.start(400).unwrap();
        rs.start(200).unwrap();
        assert_eq!(rs.status, 400);
    }

    #[test]
    fn test_raw_response_http11_wire_format() {
        let mut out = Vec::new();
        {
            let mut rs = RawResponse::new(&mut out, WireStyle::Http11);
            rs.set_header("Content-Type", "text/plain");
            rs.start(404).unwrap();
            rs.body().write_all(b"gone").unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("HTTP/1.1 404 Not Found\r\n"));
        assert!(text.contains("Connection: close\r\n"));
        assert!(text.contains("Content-Type: text/plain\r\n"));
        assert!(text.ends_with("\r\n\r\ngone"));
    }

    #[test]
    fn test_raw_response_cgi_wire_format() {
        let mut out = Vec::new();
        {
            let mut rs = RawResponse::new(&mut out, WireStyle::Cgi);
            rs.set_header("Content-Type", "text/plain");
            rs.start(200).unwrap();
            rs.body().write_all(b"ok").unwrap();
        }
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("Status: 200 OK\r\n"));
        assert!(text.ends_with("\r\n\r\nok"));
    }

    #[test]
    fn test_http_error_shape() {
        let mut rs = BufferedResponse::new();
        http_error(&mut rs, 400, "Request body is empty").unwrap();
        assert_eq!(rs.status, 400);
        assert_eq!(rs.body, b"Request body is empty\n");
    }
}
