//! RAML-flavored YAML model loader.
//!
//! The accepted document shape is a small RAML subset: a top-level
//! `title` and optional `baseUri`, and one mapping per endpoint keyed
//! by its `/path` pattern. Endpoints declare `uriParameters` and
//! lower-case HTTP method keys; each method carries `(commandPattern)`,
//! optional `queryParameters`, `headers` and `body` (keyed by MIME
//! type), and `responses` keyed by HTTP status code with an
//! `(exitCode)` annotation selecting which process exit code renders
//! that response.
//!
//! Loading failures are fatal at startup and never a per-request
//! concern.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use http::Method;
use regex::Regex;
use serde_yaml::Value as Yaml;
use tracing::{debug, warn};
use url::Url;

use crate::exec::{CommandExecutor, CommandTemplate};
use crate::model::{
    Endpoint, MethodDescriptor, Model, Parameter, ParameterKind, ParameterList,
    ResponseDescriptor, MAX_SIZE_BOUND, SMALLEST_NONZERO_F64,
};

const FIELD_TYPE: &str = "type";
const FIELD_REQUIRED: &str = "required";
const FIELD_DEFAULT: &str = "default";
const FIELD_PATTERN: &str = "pattern";
const FIELD_MINIMUM: &str = "minimum";
const FIELD_MAXIMUM: &str = "maximum";
const FIELD_MIN_LENGTH: &str = "minLength";
const FIELD_MAX_LENGTH: &str = "maxLength";
const FIELD_MIN_ITEMS: &str = "minItems";
const FIELD_MAX_ITEMS: &str = "maxItems";
const FIELD_ITEMS: &str = "items";
const FIELD_HEADERS: &str = "headers";
const FIELD_QUERY_PARAMETERS: &str = "queryParameters";
const FIELD_URI_PARAMETERS: &str = "uriParameters";
const FIELD_BODY: &str = "body";
const FIELD_RESPONSES: &str = "responses";
const FIELD_TITLE: &str = "title";
const FIELD_BASE_URI: &str = "baseUri";
const FIELD_EXIT_CODE: &str = "(exitCode)";
const FIELD_COMMAND_PATTERN: &str = "(commandPattern)";

/// API model restored from RAML-flavored YAML markup.
#[derive(Debug)]
pub struct RamlModel {
    title: String,
    base_url: Option<Url>,
    endpoints: HashMap<String, Arc<Endpoint>>,
}

impl Model for RamlModel {
    fn name(&self) -> &str {
        &self.title
    }

    fn base_url(&self) -> Option<&Url> {
        self.base_url.as_ref()
    }

    fn endpoints(&self) -> &HashMap<String, Arc<Endpoint>> {
        &self.endpoints
    }
}

impl RamlModel {
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read model file {}", path.display()))?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self> {
        let document: Yaml =
            serde_yaml::from_str(content).context("model is not valid YAML")?;
        let Yaml::Mapping(root) = document else {
            bail!("model root must be a mapping");
        };

        let mut model = RamlModel {
            title: String::new(),
            base_url: None,
            endpoints: HashMap::new(),
        };

        for (key, value) in &root {
            let Some(field) = key.as_str() else { continue };
            match field {
                FIELD_TITLE => {
                    model.title = value
                        .as_str()
                        .context("model title must be a string")?
                        .to_string();
                }
                FIELD_BASE_URI => {
                    let raw = value.as_str().context("baseUri must be a string")?;
                    match Url::parse(raw) {
                        Ok(url) => model.base_url = Some(url),
                        Err(err) => warn!(base_uri = raw, error = %err, "failed to parse base URI"),
                    }
                }
                path if path.starts_with('/') => {
                    debug!(endpoint = path, "parsing endpoint");
                    let endpoint = parse_endpoint(value)
                        .with_context(|| format!("endpoint {path}"))?;
                    model.endpoints.insert(path.to_string(), Arc::new(endpoint));
                }
                _ => {}
            }
        }

        Ok(model)
    }
}

fn parse_endpoint(description: &Yaml) -> Result<Endpoint> {
    let Yaml::Mapping(tree) = description else {
        bail!("endpoint description must be a mapping");
    };
    let mut endpoint = Endpoint::default();
    for (key, value) in tree {
        let Some(field) = key.as_str() else { continue };
        match field {
            FIELD_URI_PARAMETERS => {
                parse_parameter_list(value, &mut endpoint.path_parameters)?;
            }
            "get" | "post" | "put" | "delete" | "patch" | "head" | "options" => {
                let method = Method::from_bytes(field.to_ascii_uppercase().as_bytes())
                    .expect("method name is a valid token");
                let descriptor =
                    parse_method(value).with_context(|| format!("method {field}"))?;
                endpoint.methods.insert(method, descriptor);
            }
            _ => {}
        }
    }
    Ok(endpoint)
}

fn parse_method(description: &Yaml) -> Result<MethodDescriptor> {
    let Yaml::Mapping(tree) = description else {
        bail!("method description must be a mapping");
    };

    let mut query_parameters = ParameterList::new();
    let mut request_headers = ParameterList::new();
    let mut request = ParameterList::new();
    let mut responses = HashMap::new();
    let mut executor = None;

    for (key, value) in tree {
        let Some(field) = key.as_str() else { continue };
        match field {
            FIELD_HEADERS => parse_parameter_list(value, &mut request_headers)?,
            FIELD_QUERY_PARAMETERS => parse_parameter_list(value, &mut query_parameters)?,
            FIELD_BODY => parse_parameter_list(value, &mut request)?,
            FIELD_COMMAND_PATTERN => {
                let pattern = value.as_str().context("command pattern must be a string")?;
                let template = CommandTemplate::auto_named(pattern)
                    .with_context(|| format!("failed to parse command pattern {pattern:?}"))?;
                executor = Some(CommandExecutor::new(template));
            }
            FIELD_RESPONSES => parse_responses(value, &mut responses)?,
            _ => {}
        }
    }

    let Some(executor) = executor else {
        bail!("command pattern is not specified");
    };

    if responses.is_empty() {
        // success still needs a response shape; default to plain text
        responses.insert(
            0,
            ResponseDescriptor {
                status_code: 200,
                mime_type: "text/plain".to_string(),
                body: Parameter::optional(ParameterKind::unconstrained_string()),
            },
        );
    }

    Ok(MethodDescriptor {
        query_parameters,
        request_headers,
        request,
        responses,
        executor,
    })
}

fn parse_responses(
    description: &Yaml,
    responses: &mut HashMap<i32, ResponseDescriptor>,
) -> Result<()> {
    let Yaml::Mapping(tree) = description else {
        bail!("responses must map HTTP status codes to response descriptions");
    };
    for (status, response) in tree {
        let status_code = status
            .as_i64()
            .and_then(|s| u16::try_from(s).ok())
            .context("response key must be an HTTP status code")?;
        let Yaml::Mapping(fields) = response else {
            bail!("description of response {status_code} must be a mapping");
        };
        let exit_code = mapping_get(fields, FIELD_EXIT_CODE)
            .and_then(Yaml::as_i64)
            .with_context(|| format!("response {status_code} must carry an {FIELD_EXIT_CODE}"))?
            as i32;
        let body = mapping_get(fields, FIELD_BODY).with_context(|| {
            format!("response body is not specified for status code {status_code}")
        })?;
        let mut bodies = ParameterList::new();
        parse_parameter_list(body, &mut bodies)?;
        for (mime_type, parameter) in bodies {
            responses.insert(
                exit_code,
                ResponseDescriptor {
                    status_code,
                    mime_type,
                    body: parameter,
                },
            );
        }
    }
    Ok(())
}

fn mapping_get<'a>(mapping: &'a serde_yaml::Mapping, key: &str) -> Option<&'a Yaml> {
    mapping
        .iter()
        .find(|(k, _)| k.as_str() == Some(key))
        .map(|(_, v)| v)
}

fn parse_parameter_list(description: &Yaml, output: &mut ParameterList) -> Result<()> {
    let Yaml::Mapping(tree) = description else {
        bail!("parameter list must be a mapping");
    };
    for (name, parameter) in tree {
        let Some(name) = name.as_str() else { continue };
        debug!(parameter = name, "parsing parameter");
        let parsed =
            parse_parameter(parameter).with_context(|| format!("parameter {name}"))?;
        output.insert(name.to_string(), parsed);
    }
    Ok(())
}

fn parse_parameter(description: &Yaml) -> Result<Parameter> {
    let Yaml::Mapping(tree) = description else {
        warn!("parameter has incorrect declaration, assuming an optional string");
        return Ok(Parameter {
            required: false,
            has_default: true,
            kind: ParameterKind::unconstrained_string(),
        });
    };
    let fields: HashMap<&str, &Yaml> = tree
        .iter()
        .filter_map(|(k, v)| k.as_str().map(|k| (k, v)))
        .collect();
    let type_name = fields
        .get(FIELD_TYPE)
        .and_then(|v| v.as_str())
        .unwrap_or("any");
    parse_parameter_type(type_name, &fields)
}

fn parse_parameter_type(type_name: &str, fields: &HashMap<&str, &Yaml>) -> Result<Parameter> {
    // presence rules shared by every type
    let required = match fields.get(FIELD_REQUIRED) {
        Some(value) => value.as_bool().unwrap_or(value.as_str() != Some("false")),
        None => true,
    };
    let has_default = fields.contains_key(FIELD_DEFAULT);
    let default = fields.get(FIELD_DEFAULT).copied();

    let kind = match type_name {
        "string" => ParameterKind::Str {
            pattern: match fields.get(FIELD_PATTERN).and_then(|v| v.as_str()) {
                Some(pattern) => Some(
                    Regex::new(pattern)
                        .with_context(|| format!("invalid pattern {pattern:?}"))?,
                ),
                None => None,
            },
            min_length: match fields.get(FIELD_MIN_LENGTH) {
                Some(v) => yaml_to_usize(v).context("minLength")?,
                None => 0,
            },
            max_length: match fields.get(FIELD_MAX_LENGTH) {
                Some(v) => yaml_to_usize(v).context("maxLength")?,
                None => MAX_SIZE_BOUND,
            },
            default: match (has_default, default) {
                (true, Some(v)) => yaml_to_string(v).context("default")?,
                _ => String::new(),
            },
        },
        "integer" => ParameterKind::Integer {
            minimum: match fields.get(FIELD_MINIMUM) {
                Some(v) => yaml_to_i64(v).context("minimum")?,
                None => i64::MIN,
            },
            maximum: match fields.get(FIELD_MAXIMUM) {
                Some(v) => yaml_to_i64(v).context("maximum")?,
                None => i64::MAX,
            },
            default: match (has_default, default) {
                (true, Some(v)) => yaml_to_i64(v).context("default")?,
                _ => 0,
            },
        },
        "number" => ParameterKind::Number {
            minimum: match fields.get(FIELD_MINIMUM) {
                Some(v) => yaml_to_f64(v).context("minimum")?,
                None => SMALLEST_NONZERO_F64,
            },
            maximum: match fields.get(FIELD_MAXIMUM) {
                Some(v) => yaml_to_f64(v).context("maximum")?,
                None => f64::MAX,
            },
            default: match (has_default, default) {
                (true, Some(v)) => yaml_to_f64(v).context("default")?,
                _ => 0.0,
            },
        },
        "boolean" => ParameterKind::Boolean {
            default: match (has_default, default) {
                (true, Some(v)) => yaml_to_bool(v).context("default")?,
                _ => false,
            },
        },
        "file" => {
            return Ok(Parameter {
                required,
                has_default: false,
                kind: ParameterKind::File,
            })
        }
        "any" => ParameterKind::Any,
        "array" => {
            let element = match fields.get(FIELD_ITEMS) {
                Some(Yaml::String(element_type)) => {
                    parse_parameter_type(element_type, &HashMap::new())?
                }
                Some(items @ Yaml::Mapping(_)) => parse_parameter(items)?,
                _ => bail!("unsupported array element type"),
            };
            return array_parameter(required, element, fields);
        }
        // `T[]` shorthand for arrays of scalars
        shorthand if shorthand.ends_with("[]") => {
            let element =
                parse_parameter_type(shorthand.trim_end_matches("[]"), &HashMap::new())?;
            return array_parameter(required, element, fields);
        }
        other => bail!("Unsupported parameter type {other}"),
    };

    Ok(Parameter {
        required,
        has_default,
        kind,
    })
}

fn array_parameter(
    required: bool,
    element: Parameter,
    fields: &HashMap<&str, &Yaml>,
) -> Result<Parameter> {
    Ok(Parameter {
        required,
        has_default: false,
        kind: ParameterKind::Array {
            element: Box::new(element),
            min_items: match fields.get(FIELD_MIN_ITEMS) {
                Some(v) => yaml_to_usize(v).context("minItems")?,
                None => 0,
            },
            max_items: match fields.get(FIELD_MAX_ITEMS) {
                Some(v) => yaml_to_usize(v).context("maxItems")?,
                None => MAX_SIZE_BOUND,
            },
        },
    })
}

fn yaml_to_string(value: &Yaml) -> Result<String> {
    match value {
        Yaml::String(s) => Ok(s.clone()),
        Yaml::Number(n) => Ok(n.to_string()),
        Yaml::Bool(b) => Ok(b.to_string()),
        other => bail!("failed to parse string constant: {other:?}"),
    }
}

fn yaml_to_i64(value: &Yaml) -> Result<i64> {
    match value {
        Yaml::Number(n) => n
            .as_i64()
            .with_context(|| format!("failed to parse integer constant: {n}")),
        Yaml::String(s) => crate::model::parameter::parse_prefixed_int(s)
            .map_err(|_| anyhow::anyhow!("failed to parse integer constant: {s:?}")),
        other => bail!("failed to parse integer constant: {other:?}"),
    }
}

fn yaml_to_f64(value: &Yaml) -> Result<f64> {
    match value {
        Yaml::Number(n) => n
            .as_f64()
            .with_context(|| format!("failed to parse numeric constant: {n}")),
        Yaml::String(s) => s
            .parse::<f64>()
            .with_context(|| format!("failed to parse numeric constant: {s:?}")),
        other => bail!("failed to parse numeric constant: {other:?}"),
    }
}

fn yaml_to_usize(value: &Yaml) -> Result<usize> {
    match value {
        Yaml::Number(n) => n
            .as_u64()
            .and_then(|v| usize::try_from(v).ok())
            .with_context(|| format!("failed to parse size constant: {n}")),
        Yaml::String(s) => s
            .parse::<usize>()
            .with_context(|| format!("failed to parse size constant: {s:?}")),
        other => bail!("failed to parse size constant: {other:?}"),
    }
}

fn yaml_to_bool(value: &Yaml) -> Result<bool> {
    match value {
        Yaml::Bool(b) => Ok(*b),
        Yaml::String(s) => crate::model::parameter::parse_bool(s)
            .map_err(|_| anyhow::anyhow!("failed to parse boolean constant: {s:?}")),
        other => bail!("failed to parse boolean constant: {other:?}"),
    }
}
