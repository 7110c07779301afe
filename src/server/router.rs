//! Path-pattern routing for model endpoints.
//!
//! Patterns like `/users/{id}` are compiled to anchored regexes with
//! one capture per `{name}` placeholder. Matching is by path only;
//! method selection (and the 405 answer) happens in the handler.

use std::sync::Arc;

use regex::Regex;
use tracing::{debug, info};

use crate::model::{Endpoint, Model};

/// Result of matching a request path against the routing table.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    pub endpoint: Arc<Endpoint>,
    /// The pattern that matched, for diagnostics.
    pub path_pattern: String,
    /// Placeholder values extracted from the URL, in pattern order.
    pub path_params: Vec<(String, String)>,
}

impl RouteMatch {
    pub fn path_param(&self, name: &str) -> Option<&str> {
        self.path_params
            .iter()
            .rfind(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Routing table built once from the model at startup.
pub struct Router {
    routes: Vec<(Regex, Vec<String>, String, Arc<Endpoint>)>,
}

impl Router {
    pub fn new(model: &dyn Model) -> Self {
        let mut routes = Vec::with_capacity(model.endpoints().len());
        for (pattern, endpoint) in model.endpoints() {
            let (regex, param_names) = Self::path_to_regex(pattern);
            debug!(
                pattern = %pattern,
                methods = ?endpoint.allowed_methods(),
                "route registered"
            );
            routes.push((regex, param_names, pattern.clone(), endpoint.clone()));
        }
        info!(
            model = model.name(),
            routes_count = routes.len(),
            "routing table loaded"
        );
        Self { routes }
    }

    /// Match a request path, extracting placeholder values.
    pub fn route(&self, path: &str) -> Option<RouteMatch> {
        for (regex, param_names, pattern, endpoint) in &self.routes {
            if let Some(captures) = regex.captures(path) {
                let path_params = param_names
                    .iter()
                    .zip(captures.iter().skip(1))
                    .filter_map(|(name, capture)| {
                        capture.map(|c| (name.clone(), c.as_str().to_string()))
                    })
                    .collect();
                return Some(RouteMatch {
                    endpoint: endpoint.clone(),
                    path_pattern: pattern.clone(),
                    path_params,
                });
            }
        }
        None
    }

    /// Convert a path pattern to an anchored regex plus the ordered
    /// placeholder names.
    pub(crate) fn path_to_regex(path: &str) -> (Regex, Vec<String>) {
        if path == "/" {
            return (
                Regex::new(r"^/$").expect("failed to compile path regex"),
                Vec::new(),
            );
        }

        let mut pattern = String::with_capacity(path.len() + 8);
        pattern.push('^');
        let mut param_names = Vec::with_capacity(path.matches('{').count());

        for segment in path.split('/') {
            if segment.starts_with('{') && segment.ends_with('}') {
                let param_name = segment
                    .trim_start_matches('{')
                    .trim_end_matches('}')
                    .to_string();
                pattern.push_str("/([^/]+)");
                param_names.push(param_name);
            } else if !segment.is_empty() {
                pattern.push('/');
                pattern.push_str(&regex::escape(segment));
            }
        }

        pattern.push('$');
        let regex = Regex::new(&pattern).expect("failed to compile path regex");

        (regex, param_names)
    }
}
