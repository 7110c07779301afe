//! Transport-neutral request data handed to the pipeline.

use std::collections::HashMap;

use http::Method;

/// Separator used when a query parameter is given more than once.
pub const QUERY_VALUE_SEPARATOR: &str = ",";

/// An incoming HTTP request, already detached from its transport.
///
/// Header names are lower-cased; multi-valued query parameters are
/// joined with [`QUERY_VALUE_SEPARATOR`].
#[derive(Debug)]
pub struct GatewayRequest {
    pub method: Method,
    pub path: String,
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl GatewayRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }
}

/// Parse an URL-encoded query string, joining repeated names.
pub fn extract_query_parameters(query_string: &str, separator: &str) -> HashMap<String, String> {
    let mut result: HashMap<String, String> = HashMap::new();
    for (name, value) in url::form_urlencoded::parse(query_string.as_bytes()) {
        result
            .entry(name.into_owned())
            .and_modify(|joined| {
                joined.push_str(separator);
                joined.push_str(&value);
            })
            .or_insert_with(|| value.into_owned());
    }
    result
}
