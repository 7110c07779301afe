//! FastCGI host adapter.
//!
//! Serves the same routed handler on the FastCGI standard input
//! channel, translating CGI parameters back into a transport-neutral
//! request. Only the blocking mode exists; FastCGI owns the process's
//! stdin, so a background launch is refused.

use std::collections::HashMap;
use std::io::{self, Read};

use anyhow::{bail, Result};
use http::Method;
use tracing::{error, info};

use super::http_server::Host;
use super::response::{http_error, RawResponse, WireStyle};
use super::service::AppService;

/// FastCGI responder around the routed handler.
pub struct FastCgiServer {
    service: AppService,
}

impl FastCgiServer {
    pub fn new(service: AppService) -> Self {
        Self { service }
    }
}

impl Host for FastCgiServer {
    fn run(&mut self, background: bool) -> Result<()> {
        if background {
            bail!("asynchronous launch is not supported");
        }
        info!("serving FastCGI requests on stdin");
        let service = self.service.clone();
        fastcgi::run(move |mut request| {
            if let Err(err) = serve(&service, &mut request) {
                error!(error = %err, "failed to serve FastCGI request");
            }
        });
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

fn serve(service: &AppService, request: &mut fastcgi::Request) -> io::Result<()> {
    let method_name = request
        .param("REQUEST_METHOD")
        .unwrap_or_else(|| "GET".to_string());
    let path_and_query = request
        .param("REQUEST_URI")
        .or_else(|| request.param("SCRIPT_NAME"))
        .unwrap_or_else(|| "/".to_string());
    let headers = request_headers(request);

    let mut body = Vec::new();
    request.stdin().read_to_end(&mut body)?;

    let mut stdout = request.stdout();
    let mut rs = RawResponse::new(&mut stdout, WireStyle::Cgi);
    match Method::from_bytes(method_name.as_bytes()) {
        Ok(method) => service.handle(method, &path_and_query, headers, body, &mut rs),
        Err(_) => http_error(
            &mut rs,
            405,
            &format!("Method {method_name} is not supported"),
        ),
    }
}

/// Reconstruct request headers from CGI parameters.
fn request_headers(request: &fastcgi::Request) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    for (name, value) in request.params() {
        if let Some(header) = name.strip_prefix("HTTP_") {
            headers.insert(header.to_ascii_lowercase().replace('_', "-"), value);
        } else if name == "CONTENT_TYPE" {
            headers.insert("content-type".to_string(), value);
        } else if name == "CONTENT_LENGTH" {
            headers.insert("content-length".to_string(), value);
        }
    }
    headers
}
