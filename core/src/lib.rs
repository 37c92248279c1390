//! Typed client for the readings resource of the core-data service.
//!
//! # Overview
//! `ReadingRestClient` maps each query on readings to exactly one HTTP
//! request and decodes the answer into `Reading` values, a count, or a new id.
//! Code that uses readings depends on the `ReadingClient` trait and can swap
//! in `mock::MockReadingClient` (feature `mock`) in its own tests.
//!
//! # Design
//! - `request` builds requests and parses responses without I/O.
//! - `transport` is the only I/O boundary; `UreqTransport` is the default.
//! - `endpoint` resolves the base URL on every call, since service discovery
//!   may move the service.
//! - `context` threads cancellation and deadlines through each call.
//! - The client holds no mutable state and is `Send + Sync`.

pub mod client;
pub mod context;
pub mod endpoint;
pub mod error;
pub mod http;
pub mod model;
pub mod request;
pub mod transport;

#[cfg(any(test, feature = "mock"))]
pub use client::mock;
pub use client::{ReadingClient, ReadingRestClient};
pub use context::{CallContext, CancelToken};
pub use endpoint::{EndpointParams, Endpointer, StaticEndpointer, UrlResolver};
pub use error::{ClientError, ErrorKind, ResolveError};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use model::Reading;
pub use request::{ReadingQuery, ReadingRequests};
pub use transport::{Transport, UreqTransport};
