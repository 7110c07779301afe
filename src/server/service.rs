//! Routed application service shared by every host adapter.

use std::collections::HashMap;
use std::io::{self, Read};
use std::sync::Arc;

use http::Method;
use may_minihttp::{HttpService, Request, Response};
use once_cell::sync::Lazy;
use std::sync::Mutex;
use tracing::debug;

use crate::model::Model;

use super::handler::handle_request;
use super::request::{extract_query_parameters, GatewayRequest, QUERY_VALUE_SEPARATOR};
use super::response::{http_error, status_reason, BufferedResponse, ResponseStream};
use super::router::Router;

/// The model-driven request handler behind both host adapters.
///
/// Holds the read-only model and its routing table; cloning is cheap
/// and every clone serves requests independently.
#[derive(Clone)]
pub struct AppService {
    pub model: Arc<dyn Model>,
    pub router: Arc<Router>,
}

impl AppService {
    pub fn new(model: Arc<dyn Model>) -> Self {
        let router = Arc::new(Router::new(model.as_ref()));
        Self { model, router }
    }

    /// Serve one transport-neutral request into a response stream.
    pub fn handle(
        &self,
        method: Method,
        path_and_query: &str,
        headers: HashMap<String, String>,
        body: Vec<u8>,
        rs: &mut dyn ResponseStream,
    ) -> io::Result<()> {
        let path = path_and_query.split('?').next().unwrap_or("/").to_string();
        let query_string = path_and_query
            .split_once('?')
            .map(|(_, q)| q)
            .unwrap_or("");

        let Some(route) = self.router.route(&path) else {
            debug!(%method, %path, "no route matched");
            return http_error(rs, 404, "Not Found");
        };

        let request = GatewayRequest {
            method,
            path,
            headers,
            query: extract_query_parameters(query_string, QUERY_VALUE_SEPARATOR),
            body,
        };
        handle_request(&route, &request, rs)
    }
}

// may_minihttp keeps header lines around by reference, so dynamic
// values (the model's media types) are interned once per distinct
// line for the life of the process.
static HEADER_LINES: Lazy<Mutex<std::collections::HashSet<&'static str>>> =
    Lazy::new(|| Mutex::new(std::collections::HashSet::new()));

fn intern_header_line(line: &str) -> &'static str {
    let mut cache = HEADER_LINES.lock().unwrap();
    if let Some(existing) = cache.get(line) {
        return *existing;
    }
    let leaked: &'static str = Box::leak(line.to_string().into_boxed_str());
    cache.insert(leaked);
    leaked
}

impl HttpService for AppService {
    fn call(&mut self, req: Request, res: &mut Response) -> io::Result<()> {
        let method_name = req.method().to_string();
        let path_and_query = req.path().to_string();

        let headers: HashMap<String, String> = req
            .headers()
            .iter()
            .map(|h| {
                (
                    h.name.to_ascii_lowercase(),
                    String::from_utf8_lossy(h.value).to_string(),
                )
            })
            .collect();

        let mut body = Vec::new();
        req.body().read_to_end(&mut body)?;

        let mut buffered = BufferedResponse::new();
        match Method::from_bytes(method_name.as_bytes()) {
            Ok(method) => {
                self.handle(method, &path_and_query, headers, body, &mut buffered)?;
            }
            Err(_) => {
                http_error(
                    &mut buffered,
                    405,
                    &format!("Method {method_name} is not supported"),
                )?;
            }
        }

        res.status_code(buffered.status as usize, status_reason(buffered.status));
        for (name, value) in &buffered.headers {
            // the framework computes Content-Length from the body
            if name.eq_ignore_ascii_case("content-length") {
                continue;
            }
            res.header(intern_header_line(&format!("{name}: {value}")));
        }
        res.body_vec(buffered.body);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raml::RamlModel;

    fn service() -> AppService {
        let model = RamlModel::from_str(
            r#"
title: svc
/echo1/{msg}:
  get:
    (commandPattern): echo {{ msg }}
"#,
        )
        .unwrap();
        AppService::new(Arc::new(model))
    }

    fn get(service: &AppService, path: &str) -> BufferedResponse {
        let mut rs = BufferedResponse::new();
        service
            .handle(Method::GET, path, HashMap::new(), Vec::new(), &mut rs)
            .unwrap();
        rs
    }

    #[test]
    fn test_handle_routes_and_executes() {
        let rs = get(&service(), "/echo1/bla_bla");
        assert_eq!(rs.status, 200);
        assert_eq!(rs.body, b"bla_bla\n");
    }

    #[test]
    fn test_handle_unknown_path_is_404() {
        let rs = get(&service(), "/nope");
        assert_eq!(rs.status, 404);
    }

    #[test]
    fn test_handle_unknown_method_is_405() {
        let svc = service();
        let mut rs = BufferedResponse::new();
        svc.handle(
            Method::POST,
            "/echo1/x",
            HashMap::new(),
            Vec::new(),
            &mut rs,
        )
        .unwrap();
        assert_eq!(rs.status, 405);
        assert_eq!(rs.body, b"Method POST is not supported\n");
    }

    #[test]
    fn test_intern_header_line_is_stable() {
        let a = intern_header_line("Content-Type: text/plain");
        let b = intern_header_line("Content-Type: text/plain");
        assert!(std::ptr::eq(a, b));
    }
}
