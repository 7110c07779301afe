//! The parameter type system: tagged variants with per-type decoding,
//! validation and defaults.
//!
//! Decoding is format-aware (text, JSON, binary) and always runs before
//! validation. Bounds carry their source defaults: integers span the
//! full signed 64-bit range, string and array sizes are capped at
//! 2^31 - 1, and the number minimum is the smallest positive subnormal
//! rather than negative infinity, so negative numbers fail validation
//! unless a model sets `minimum` explicitly.

use std::io::{self, Read};

use regex::Regex;
use thiserror::Error;

use crate::exec::new_temp_file;

use super::format::ValueFormat;
use super::value::Value;

/// Upper bound applied to string lengths and array sizes when the
/// model does not constrain them.
pub const MAX_SIZE_BOUND: usize = i32::MAX as usize;

/// Smallest positive subnormal f64, the default `Number` minimum.
pub const SMALLEST_NONZERO_F64: f64 = f64::from_bits(1);

/// Failure to decode a raw parameter value.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Unsupported parameter value format")]
    UnsupportedFormat,
    #[error("invalid integer literal {0:?}")]
    InvalidInteger(String),
    #[error("invalid number literal {0:?}")]
    InvalidNumber(String),
    #[error("invalid boolean literal {0:?}")]
    InvalidBoolean(String),
    #[error("binary value is shorter than 8 bytes")]
    TruncatedBinary,
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Per-type constraints and default values.
#[derive(Debug, Clone)]
pub enum ParameterKind {
    Str {
        pattern: Option<Regex>,
        min_length: usize,
        max_length: usize,
        default: String,
    },
    Integer {
        minimum: i64,
        maximum: i64,
        default: i64,
    },
    Number {
        minimum: f64,
        maximum: f64,
        default: f64,
    },
    Boolean {
        default: bool,
    },
    /// Byte payload materialized as a temp file. Never has a default.
    File,
    /// Homogeneous list with an element type and exclusive size bounds.
    Array {
        element: Box<Parameter>,
        min_items: usize,
        max_items: usize,
    },
    Any,
}

impl ParameterKind {
    /// A `Str` kind with unconstrained bounds and no pattern.
    pub fn unconstrained_string() -> Self {
        ParameterKind::Str {
            pattern: None,
            min_length: 0,
            max_length: MAX_SIZE_BOUND,
            default: String::new(),
        }
    }
}

/// A request parameter: presence rules plus a typed kind.
///
/// `required` and `has_default` are independent. An absent value is
/// filled from the default when `has_default` is set, rejected when the
/// parameter is required, and silently skipped otherwise.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub required: bool,
    pub has_default: bool,
    pub kind: ParameterKind,
}

impl Parameter {
    /// A required parameter of the given kind without a default.
    pub fn required(kind: ParameterKind) -> Self {
        Parameter {
            required: true,
            has_default: false,
            kind,
        }
    }

    /// An optional parameter of the given kind without a default.
    pub fn optional(kind: ParameterKind) -> Self {
        Parameter {
            required: false,
            has_default: false,
            kind,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self.kind, ParameterKind::File)
    }

    /// The value injected when the parameter is absent and
    /// `has_default` is set. Files and `any` never produce one; arrays
    /// default to the empty array.
    pub fn default_value(&self) -> Option<Value> {
        if !self.has_default {
            return None;
        }
        match &self.kind {
            ParameterKind::Str { default, .. } => Some(Value::Str(default.clone())),
            ParameterKind::Integer { default, .. } => Some(Value::Int(*default)),
            ParameterKind::Number { default, .. } => Some(Value::Float(*default)),
            ParameterKind::Boolean { default } => Some(Value::Bool(*default)),
            ParameterKind::Array { .. } => Some(Value::Array(Vec::new())),
            ParameterKind::File | ParameterKind::Any => None,
        }
    }

    /// Decode a raw value in the given format. Validation is separate
    /// and always runs after decoding.
    pub fn read_value(
        &self,
        input: &mut dyn Read,
        format: ValueFormat,
    ) -> Result<Value, DecodeError> {
        match &self.kind {
            ParameterKind::Str { .. } => {
                let raw = read_all(input)?;
                match format {
                    ValueFormat::Text | ValueFormat::Binary => {
                        Ok(Value::Str(String::from_utf8_lossy(&raw).into_owned()))
                    }
                    ValueFormat::Json => Ok(Value::Str(serde_json::from_slice(&raw)?)),
                    ValueFormat::Xml => Err(DecodeError::UnsupportedFormat),
                }
            }
            ParameterKind::Integer { .. } => {
                let raw = read_all(input)?;
                match format {
                    ValueFormat::Binary => Ok(Value::Int(i64::from_le_bytes(le_bytes(&raw)?))),
                    ValueFormat::Text => {
                        let text = String::from_utf8_lossy(&raw);
                        Ok(Value::Int(parse_prefixed_int(&text)?))
                    }
                    ValueFormat::Json => Ok(Value::Int(serde_json::from_slice(&raw)?)),
                    ValueFormat::Xml => Err(DecodeError::UnsupportedFormat),
                }
            }
            ParameterKind::Number { .. } => {
                let raw = read_all(input)?;
                match format {
                    ValueFormat::Binary => Ok(Value::Float(f64::from_bits(u64::from_le_bytes(
                        le_bytes(&raw)?,
                    )))),
                    ValueFormat::Text => {
                        let text = String::from_utf8_lossy(&raw);
                        let parsed = text
                            .trim()
                            .parse::<f64>()
                            .map_err(|_| DecodeError::InvalidNumber(text.into_owned()))?;
                        Ok(Value::Float(parsed))
                    }
                    ValueFormat::Json => Ok(Value::Float(serde_json::from_slice(&raw)?)),
                    ValueFormat::Xml => Err(DecodeError::UnsupportedFormat),
                }
            }
            ParameterKind::Boolean { .. } => {
                let raw = read_all(input)?;
                match format {
                    ValueFormat::Binary => Ok(Value::Bool(raw.first().is_some_and(|b| *b != 0))),
                    ValueFormat::Text => {
                        let text = String::from_utf8_lossy(&raw);
                        Ok(Value::Bool(parse_bool(&text)?))
                    }
                    ValueFormat::Json => Ok(Value::Bool(serde_json::from_slice(&raw)?)),
                    ValueFormat::Xml => Err(DecodeError::UnsupportedFormat),
                }
            }
            ParameterKind::File => spill_to_temp_file(input),
            ParameterKind::Array { .. } => match format {
                ValueFormat::Json | ValueFormat::Text => {
                    let raw = read_all(input)?;
                    let items: Vec<serde_json::Value> = serde_json::from_slice(&raw)?;
                    Ok(Value::Array(items.into_iter().map(Value::from_json).collect()))
                }
                ValueFormat::Binary | ValueFormat::Xml => Err(DecodeError::UnsupportedFormat),
            },
            ParameterKind::Any => match format {
                ValueFormat::Text => {
                    let raw = read_all(input)?;
                    Ok(Value::Str(String::from_utf8_lossy(&raw).into_owned()))
                }
                ValueFormat::Json => {
                    let raw = read_all(input)?;
                    let parsed: serde_json::Value = serde_json::from_slice(&raw)?;
                    Ok(Value::from_json(parsed))
                }
                ValueFormat::Binary => spill_to_temp_file(input),
                ValueFormat::Xml => Err(DecodeError::UnsupportedFormat),
            },
        }
    }

    /// Check a decoded value against the parameter constraints.
    pub fn validate(&self, value: &Value) -> bool {
        match &self.kind {
            ParameterKind::Str {
                pattern,
                min_length,
                max_length,
                ..
            } => match value {
                Value::Null => true,
                Value::Str(s) => {
                    let length = s.len();
                    if length < *min_length || length > *max_length {
                        return false;
                    }
                    match pattern {
                        // the whole value must match, not just a substring
                        Some(re) => re
                            .find(s)
                            .is_some_and(|m| m.start() == 0 && m.end() == s.len()),
                        None => true,
                    }
                }
                _ => false,
            },
            ParameterKind::Integer {
                minimum, maximum, ..
            } => match value {
                Value::Int(v) => *v >= *minimum && *v <= *maximum,
                Value::Float(f) => {
                    let v = *f as i64;
                    v >= *minimum && v <= *maximum
                }
                _ => false,
            },
            ParameterKind::Number {
                minimum, maximum, ..
            } => match value {
                Value::Float(v) => *v >= *minimum && *v <= *maximum,
                Value::Int(v) => {
                    let v = *v as f64;
                    v >= *minimum && v <= *maximum
                }
                _ => false,
            },
            ParameterKind::Boolean { .. } => matches!(value, Value::Bool(_)),
            ParameterKind::File => matches!(value, Value::File(_) | Value::Bytes(_)),
            ParameterKind::Array {
                element,
                min_items,
                max_items,
            } => match value {
                Value::Array(items) => {
                    // bounds are exclusive on both ends
                    if items.len() <= *min_items || items.len() >= *max_items {
                        return false;
                    }
                    items.iter().all(|item| element.validate(item))
                }
                _ => false,
            },
            ParameterKind::Any => matches!(
                value,
                Value::Str(_)
                    | Value::Int(_)
                    | Value::Float(_)
                    | Value::Bool(_)
                    | Value::Bytes(_)
                    | Value::File(_)
                    | Value::Null
            ),
        }
    }
}

fn read_all(input: &mut dyn Read) -> io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    input.read_to_end(&mut buf)?;
    Ok(buf)
}

fn le_bytes(raw: &[u8]) -> Result<[u8; 8], DecodeError> {
    raw.get(..8)
        .and_then(|b| b.try_into().ok())
        .ok_or(DecodeError::TruncatedBinary)
}

fn spill_to_temp_file(input: &mut dyn Read) -> Result<Value, DecodeError> {
    let mut file = new_temp_file()?;
    io::copy(input, file.as_file_mut())?;
    let (_, path) = file.keep().map_err(|e| e.error)?;
    Ok(Value::File(path))
}

/// Parse a decimal integer, or a hex, octal or binary one when the
/// value carries a `0x`, `0o` or `0b` prefix.
pub(crate) fn parse_prefixed_int(text: &str) -> Result<i64, DecodeError> {
    let trimmed = text.trim();
    let (negative, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let (radix, digits) = if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        (16, hex)
    } else if let Some(oct) = unsigned
        .strip_prefix("0o")
        .or_else(|| unsigned.strip_prefix("0O"))
    {
        (8, oct)
    } else if let Some(bin) = unsigned
        .strip_prefix("0b")
        .or_else(|| unsigned.strip_prefix("0B"))
    {
        (2, bin)
    } else {
        (10, unsigned)
    };
    let magnitude = i64::from_str_radix(digits, radix)
        .map_err(|_| DecodeError::InvalidInteger(trimmed.to_string()))?;
    Ok(if negative { -magnitude } else { magnitude })
}

/// Parse the boolean literals accepted in text parameters.
pub(crate) fn parse_bool(text: &str) -> Result<bool, DecodeError> {
    match text.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Ok(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Ok(false),
        other => Err(DecodeError::InvalidBoolean(other.to_string())),
    }
}
