//! The request pipeline: bind an endpoint to a process execution.
//!
//! One request flows through argument assembly (path, query, headers,
//! body), command execution with stdout captured by a recorder, and
//! response shaping keyed by the process exit code. Cleanup is
//! guaranteed on every exit path: the recorder closes through
//! ownership, decoded temp files are deleted by the request context.

use std::collections::HashMap;
use std::io;

use thiserror::Error;
use tracing::{info, warn};

use crate::exec::{ExecError, MemoryRecorder, ResultRecorder, TempFileRecorder};
use crate::model::{
    format_for_media_type, parse_media_type, DecodeError, MethodDescriptor, Parameter,
    ParameterList, ValueFormat,
};
use crate::model::{Arguments, Value, TEMPLATE_PARAM_BODY};

use super::context::RequestContext;
use super::request::GatewayRequest;
use super::response::{http_error, ResponseStream};
use super::router::RouteMatch;

/// Pipeline failure with its HTTP mapping.
///
/// `Http` carries an explicit status; decode and I/O failures are
/// generic and map to 500.
#[derive(Debug, Error)]
pub enum ServeError {
    #[error("{message}")]
    Http { status: u16, message: String },
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ServeError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        ServeError::Http {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            ServeError::Http { status, .. } => *status,
            _ => 500,
        }
    }
}

/// Serve one routed request, writing the response into `rs`.
pub fn handle_request(
    route: &RouteMatch,
    request: &GatewayRequest,
    rs: &mut dyn ResponseStream,
) -> io::Result<()> {
    let mut ctx = RequestContext::new();
    let mut args = Arguments::new();

    // path parameters bind first, from the router captures
    let path_vars: HashMap<&str, &str> = route
        .path_params
        .iter()
        .map(|(k, v)| (k.as_str(), v.as_str()))
        .collect();
    if let Err(err) = parse_parameter_source(
        &route.endpoint.path_parameters,
        |name| path_vars.get(name).copied(),
        &mut args,
        &mut ctx,
    ) {
        warn!(path = %request.path, error = %err, "invalid path arguments");
        return http_error(rs, err.status(), &err.to_string());
    }

    let Some(descriptor) = route.endpoint.method_descriptor(&request.method) else {
        return http_error(
            rs,
            405,
            &format!("Method {} is not supported", request.method),
        );
    };

    if let Err(err) = parse_request(descriptor, request, &mut args, &mut ctx) {
        warn!(path = %request.path, error = %err, "failed to assemble arguments");
        return http_error(rs, err.status(), &err.to_string());
    }

    execute(descriptor, &args, request, rs)
}

/// Assemble query, header and body arguments for a method descriptor.
fn parse_request(
    descriptor: &MethodDescriptor,
    request: &GatewayRequest,
    args: &mut Arguments,
    ctx: &mut RequestContext,
) -> Result<(), ServeError> {
    // the body definition is selected by media type, text/plain by default
    let content_type = match request.header("content-type") {
        Some(value) if !value.is_empty() => value,
        _ => "text/plain",
    };
    let media_type =
        parse_media_type(content_type).map_err(|e| ServeError::http(400, e.to_string()))?;

    parse_parameter_source(
        &descriptor.query_parameters,
        |name| request.query.get(name).map(String::as_str),
        args,
        ctx,
    )?;
    parse_parameter_source(
        &descriptor.request_headers,
        |name| request.header(name),
        args,
        ctx,
    )?;
    parse_request_body(&descriptor.request, &media_type, &request.body, args, ctx)
}

/// Bind one source of named string values (path, query or headers)
/// against its parameter list.
fn parse_parameter_source<'a>(
    parameters: &ParameterList,
    lookup: impl Fn(&str) -> Option<&'a str>,
    args: &mut Arguments,
    ctx: &mut RequestContext,
) -> Result<(), ServeError> {
    for (name, parameter) in parameters {
        // file payloads can only arrive through the request body
        if parameter.is_file() {
            return Err(ServeError::http(
                500,
                format!("File parameter {name} is not allowed outside of the request body"),
            ));
        }
        match lookup(name) {
            Some(raw) => {
                let value = parameter.read_value(&mut raw.as_bytes(), ValueFormat::Text)?;
                if !parameter.validate(&value) {
                    return Err(ServeError::http(
                        400,
                        format!("Argument {name} has invalid value {value}"),
                    ));
                }
                bind_argument(name, value, args, ctx);
            }
            None if parameter.has_default => {
                if let Some(default) = parameter.default_value() {
                    args.insert(name.clone(), default);
                }
            }
            None if parameter.required => {
                return Err(ServeError::http(
                    400,
                    format!("Parameter {name} is required but not specified in actual request"),
                ));
            }
            None => {}
        }
    }
    Ok(())
}

/// Decode the request body according to its media type definition.
fn parse_request_body(
    parameters: &ParameterList,
    media_type: &str,
    body: &[u8],
    args: &mut Arguments,
    ctx: &mut RequestContext,
) -> Result<(), ServeError> {
    let Some(parameter) = parameters.get(media_type) else {
        if parameters.is_empty() {
            // the model defines no body at all, which is fine
            return Ok(());
        }
        return Err(ServeError::http(
            415,
            format!("Unsupported media type: {media_type}"),
        ));
    };
    let format = format_for_media_type(media_type);
    if format == ValueFormat::Xml {
        // the XML format is reserved and nothing decodes it
        return Err(ServeError::http(
            415,
            format!("Unsupported media type: {media_type}"),
        ));
    }
    if body.is_empty() {
        return Err(ServeError::http(400, "Request body is empty"));
    }
    let value = parameter.read_value(&mut &body[..], format)?;
    if !parameter.validate(&value) {
        return Err(ServeError::http(
            400,
            format!("Argument {TEMPLATE_PARAM_BODY} has invalid value {value}"),
        ));
    }
    bind_argument(TEMPLATE_PARAM_BODY, value, args, ctx);
    Ok(())
}

/// Store a decoded value in the bag; temp files are owned by the
/// request and scheduled for deletion at finalization.
fn bind_argument(name: &str, value: Value, args: &mut Arguments, ctx: &mut RequestContext) {
    if let Value::File(path) = &value {
        ctx.defer_remove_file(path.clone());
    }
    args.insert(name.to_string(), value);
}

/// Run the command and shape the response from its outcome.
fn execute(
    descriptor: &MethodDescriptor,
    args: &Arguments,
    request: &GatewayRequest,
    rs: &mut dyn ResponseStream,
) -> io::Result<()> {
    // success is always keyed by exit code zero
    let Some(success) = descriptor.responses.get(&0) else {
        return http_error(
            rs,
            500,
            "There is no status code associated with process exit code 0",
        );
    };

    let mut recorder = match new_recorder(&success.body) {
        Ok(recorder) => recorder,
        Err(err) => return http_error(rs, 500, &err.to_string()),
    };

    rs.set_header("Content-Type", &success.mime_type);

    match descriptor.executor.execute(args, recorder.as_mut()) {
        Ok(()) => {
            rs.set_header("Content-Length", &recorder.len().to_string());
            rs.start(success.status_code)?;
            info!(
                method = %request.method,
                path = %request.path,
                status = success.status_code,
                content_length = recorder.len(),
                "request served"
            );
            if let Err(error) = recorder.write_to(rs.body()) {
                // headers are gone already, all that is left is logging
                warn!(%error, "failed to stream process output into the response");
            }
            Ok(())
        }
        Err(ExecError::Process(error)) => {
            info!(
                method = %request.method,
                path = %request.path,
                exit_code = error.exit_code,
                "subprocess failed"
            );
            match descriptor.responses.get(&error.exit_code) {
                Some(response) => {
                    let message = error.to_string();
                    rs.set_header("Content-Type", &response.mime_type);
                    rs.set_header("Content-Length", &(message.len() + 1).to_string());
                    rs.start(response.status_code)?;
                    writeln!(rs.body(), "{message}")
                }
                None => http_error(rs, 500, &error.to_string()),
            }
        }
        Err(error) => {
            warn!(%error, "command execution failed");
            http_error(rs, 500, &error.to_string())
        }
    }
}

/// Pick the stdout sink from the success body type: file responses
/// spill to a delete-on-close temp file, everything else stays in
/// memory.
fn new_recorder(body: &Parameter) -> io::Result<Box<dyn ResultRecorder>> {
    if body.is_file() {
        Ok(Box::new(TempFileRecorder::new(true)?))
    } else {
        Ok(Box::new(MemoryRecorder::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParameterKind;

    fn string_param(required: bool) -> Parameter {
        let mut p = Parameter::required(ParameterKind::unconstrained_string());
        p.required = required;
        p
    }

    #[test]
    fn test_parse_source_binds_present_value() {
        let mut parameters = ParameterList::new();
        parameters.insert("name".into(), string_param(true));
        let mut args = Arguments::new();
        let mut ctx = RequestContext::new();
        parse_parameter_source(
            &parameters,
            |n| (n == "name").then_some("val"),
            &mut args,
            &mut ctx,
        )
        .unwrap();
        assert_eq!(args.get("name"), Some(&Value::Str("val".into())));
    }

    #[test]
    fn test_parse_source_missing_required() {
        let mut parameters = ParameterList::new();
        parameters.insert("name".into(), string_param(true));
        let mut args = Arguments::new();
        let mut ctx = RequestContext::new();
        let err =
            parse_parameter_source(&parameters, |_| None, &mut args, &mut ctx).unwrap_err();
        assert_eq!(err.status(), 400);
        assert_eq!(
            err.to_string(),
            "Parameter name is required but not specified in actual request"
        );
    }

    #[test]
    fn test_parse_source_injects_default() {
        let mut p = Parameter::optional(ParameterKind::Integer {
            minimum: 0,
            maximum: 100,
            default: 7,
        });
        p.has_default = true;
        let mut parameters = ParameterList::new();
        parameters.insert("count".into(), p);
        let mut args = Arguments::new();
        let mut ctx = RequestContext::new();
        parse_parameter_source(&parameters, |_| None, &mut args, &mut ctx).unwrap();
        assert_eq!(args.get("count"), Some(&Value::Int(7)));
    }

    #[test]
    fn test_parse_source_optional_missing_is_skipped() {
        let mut parameters = ParameterList::new();
        parameters.insert("opt".into(), string_param(false));
        let mut args = Arguments::new();
        let mut ctx = RequestContext::new();
        parse_parameter_source(&parameters, |_| None, &mut args, &mut ctx).unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn test_parse_source_validation_failure() {
        let mut parameters = ParameterList::new();
        parameters.insert(
            "id".into(),
            Parameter::required(ParameterKind::Integer {
                minimum: 0,
                maximum: 200,
                default: 0,
            }),
        );
        let mut args = Arguments::new();
        let mut ctx = RequestContext::new();
        let err = parse_parameter_source(&parameters, |_| Some("201"), &mut args, &mut ctx)
            .unwrap_err();
        assert_eq!(err.status(), 400);
        assert_eq!(err.to_string(), "Argument id has invalid value 201");
    }

    #[test]
    fn test_parse_source_rejects_file_parameters() {
        let mut parameters = ParameterList::new();
        parameters.insert("blob".into(), Parameter::required(ParameterKind::File));
        let mut args = Arguments::new();
        let mut ctx = RequestContext::new();
        let err = parse_parameter_source(&parameters, |_| Some("data"), &mut args, &mut ctx)
            .unwrap_err();
        assert_eq!(err.status(), 500);
    }

    #[test]
    fn test_body_empty_with_definition() {
        let mut parameters = ParameterList::new();
        parameters.insert("text/plain".into(), string_param(true));
        let mut args = Arguments::new();
        let mut ctx = RequestContext::new();
        let err = parse_request_body(&parameters, "text/plain", b"", &mut args, &mut ctx)
            .unwrap_err();
        assert_eq!(err.status(), 400);
        assert_eq!(err.to_string(), "Request body is empty");
    }

    #[test]
    fn test_body_unknown_media_type() {
        let mut parameters = ParameterList::new();
        parameters.insert("text/plain".into(), string_param(true));
        let mut args = Arguments::new();
        let mut ctx = RequestContext::new();
        let err = parse_request_body(
            &parameters,
            "application/json",
            b"{}",
            &mut args,
            &mut ctx,
        )
        .unwrap_err();
        assert_eq!(err.status(), 415);
        assert_eq!(err.to_string(), "Unsupported media type: application/json");
    }

    #[test]
    fn test_body_xml_is_unsupported() {
        let mut parameters = ParameterList::new();
        parameters.insert("application/xml".into(), string_param(true));
        let mut args = Arguments::new();
        let mut ctx = RequestContext::new();
        let err = parse_request_body(
            &parameters,
            "application/xml",
            b"<x/>",
            &mut args,
            &mut ctx,
        )
        .unwrap_err();
        assert_eq!(err.status(), 415);
    }

    #[test]
    fn test_body_absent_definition_is_fine() {
        let parameters = ParameterList::new();
        let mut args = Arguments::new();
        let mut ctx = RequestContext::new();
        parse_request_body(&parameters, "text/plain", b"ignored", &mut args, &mut ctx)
            .unwrap();
        assert!(args.is_empty());
    }

    #[test]
    fn test_body_binds_under_reserved_name() {
        let mut parameters = ParameterList::new();
        parameters.insert("text/plain".into(), string_param(true));
        let mut args = Arguments::new();
        let mut ctx = RequestContext::new();
        parse_request_body(&parameters, "text/plain", b"hello", &mut args, &mut ctx)
            .unwrap();
        assert_eq!(
            args.get(TEMPLATE_PARAM_BODY),
            Some(&Value::Str("hello".into()))
        );
    }

    #[test]
    fn test_file_body_is_deleted_at_finalize() {
        let mut parameters = ParameterList::new();
        parameters.insert(
            "application/octet-stream".into(),
            Parameter::required(ParameterKind::File),
        );
        let mut args = Arguments::new();
        let path = {
            let mut ctx = RequestContext::new();
            parse_request_body(
                &parameters,
                "application/octet-stream",
                b"payload",
                &mut args,
                &mut ctx,
            )
            .unwrap();
            let Some(Value::File(path)) = args.get(TEMPLATE_PARAM_BODY) else {
                panic!("expected a file argument");
            };
            assert!(path.exists());
            path.clone()
        };
        // the context finalized above, taking the temp file with it
        assert!(!path.exists());
    }
}
