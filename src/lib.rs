//! # cmdgate
//!
//! A declarative REST-to-subprocess gateway. An API model maps HTTP
//! endpoints to command-line templates; for every request the gateway
//! validates the arguments, renders a concrete command line, runs the
//! tool, and streams its stdout back as the response. Process exit
//! codes select the response shape through the model's exit-code
//! table.
//!
//! The crate splits into:
//! - [`model`]: the parameter type system and the descriptor tree
//!   loaders produce
//! - [`raml`]: the RAML-flavored YAML model loader
//! - [`exec`]: command templates, tokenization, recorders and the
//!   subprocess runtime
//! - [`server`]: the request pipeline plus the standalone HTTP(S) and
//!   FastCGI host adapters

pub mod cli;
pub mod exec;
pub mod model;
pub mod raml;
pub mod server;
pub mod telemetry;

pub use exec::{CommandExecutor, CommandTemplate, ExecutionError, ResultRecorder};
pub use model::{Endpoint, MethodDescriptor, Model, Parameter, ParameterKind, Value};
pub use raml::RamlModel;
pub use server::{AppService, FastCgiServer, Host, StandaloneServer};
