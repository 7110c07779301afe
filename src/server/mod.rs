//! # Server Module
//!
//! The request pipeline and its host adapters.
//!
//! One request flows through:
//!
//! ```text
//! Host adapter → Router → handler (arguments → execute → response)
//! ```
//!
//! The pipeline itself is transport-neutral: it reads a
//! [`GatewayRequest`] and writes into a [`ResponseStream`]. The
//! standalone HTTP(S) server and the FastCGI responder are thin
//! adapters that translate their transport into that pair.

pub mod context;
pub mod fcgi;
pub mod handler;
pub mod http_server;
pub mod request;
pub mod response;
pub mod router;
pub mod service;
mod tls;

pub use context::RequestContext;
pub use fcgi::FastCgiServer;
pub use handler::{handle_request, ServeError};
pub use http_server::{Host, HttpServer, ServerHandle, StandaloneServer};
pub use request::{extract_query_parameters, GatewayRequest, QUERY_VALUE_SEPARATOR};
pub use response::{http_error, status_reason, BufferedResponse, RawResponse, ResponseStream, WireStyle};
pub use router::{RouteMatch, Router};
pub use service::AppService;
