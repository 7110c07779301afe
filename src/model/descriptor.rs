//! The abstract API model consumed by the request handler.
//!
//! A loader produces a [`Model`]: a set of endpoints keyed by path
//! pattern, each binding HTTP methods to a [`MethodDescriptor`] that
//! carries the parameter lists, the exit-code-to-response table and the
//! command executor.

use std::collections::HashMap;
use std::sync::Arc;

use http::Method;
use url::Url;

use crate::exec::CommandExecutor;

use super::parameter::Parameter;

/// Named parameters of one request position (path, query or headers).
/// For request bodies the keys are MIME types instead of names.
pub type ParameterList = HashMap<String, Parameter>;

/// How one process exit code is rendered as an HTTP response.
///
/// The body parameter's type controls response framing: a `file` body
/// spills to a temp file, everything else buffers in memory.
#[derive(Debug, Clone)]
pub struct ResponseDescriptor {
    pub status_code: u16,
    pub mime_type: String,
    pub body: Parameter,
}

/// Everything needed to serve one HTTP method of an endpoint.
///
/// `responses` is keyed by process exit code; the entry for code 0 is
/// the success response and must be present.
pub struct MethodDescriptor {
    pub query_parameters: ParameterList,
    pub request_headers: ParameterList,
    /// Request body definitions keyed by MIME type.
    pub request: ParameterList,
    pub responses: HashMap<i32, ResponseDescriptor>,
    pub executor: CommandExecutor,
}

impl std::fmt::Debug for MethodDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MethodDescriptor")
            .field("query_parameters", &self.query_parameters.len())
            .field("request_headers", &self.request_headers.len())
            .field("request", &self.request.keys())
            .field("responses", &self.responses.keys())
            .finish()
    }
}

/// The HTTP methods an endpoint may declare.
pub const WELL_KNOWN_METHODS: [Method; 7] = [
    Method::GET,
    Method::PUT,
    Method::POST,
    Method::DELETE,
    Method::OPTIONS,
    Method::HEAD,
    Method::PATCH,
];

/// One path pattern with its path parameters and per-method bindings.
#[derive(Debug, Default)]
pub struct Endpoint {
    pub path_parameters: ParameterList,
    pub methods: HashMap<Method, MethodDescriptor>,
}

impl Endpoint {
    pub fn method_descriptor(&self, method: &Method) -> Option<&MethodDescriptor> {
        self.methods.get(method)
    }

    /// Declared methods intersected with the well-known set.
    pub fn allowed_methods(&self) -> Vec<Method> {
        WELL_KNOWN_METHODS
            .iter()
            .filter(|m| self.methods.contains_key(*m))
            .cloned()
            .collect()
    }
}

/// A loaded API description, read-only for the lifetime of the server.
///
/// Path patterns use `/segment/{name}` syntax; `{name}` binds a path
/// parameter.
pub trait Model: Send + Sync {
    fn name(&self) -> &str;
    fn base_url(&self) -> Option<&Url>;
    fn endpoints(&self) -> &HashMap<String, Arc<Endpoint>>;
}

impl std::fmt::Debug for dyn Model {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Model").field("name", &self.name()).finish()
    }
}
