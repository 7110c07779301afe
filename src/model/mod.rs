//! # Model Module
//!
//! The typed API model: argument-bag values, the parameter type system
//! with format-aware decoding and validation, and the descriptor tree
//! (`Model` → `Endpoint` → `MethodDescriptor`) that loaders produce and
//! the request handler consumes.

pub mod descriptor;
pub mod format;
pub mod parameter;
pub mod value;

pub use descriptor::{
    Endpoint, MethodDescriptor, Model, ParameterList, ResponseDescriptor, WELL_KNOWN_METHODS,
};
pub use format::{format_for_media_type, parse_media_type, MediaTypeError, ValueFormat};
pub use parameter::{DecodeError, Parameter, ParameterKind, MAX_SIZE_BOUND, SMALLEST_NONZERO_F64};
pub use value::{Arguments, Value, TEMPLATE_PARAM_BODY};
