// apistore-api: transport layer consumed by the apistore resource cache.
//
// The core never talks to reqwest directly. It drives a `Transport` trait
// object; `HttpTransport` is the default implementation.

pub mod error;
pub mod http;
pub mod request;
pub mod transport;

pub use error::Error;
pub use http::HttpTransport;
pub use request::{Body, Credentials, Headers, Method, Request, Response, Transport};
pub use transport::{TlsMode, TransportConfig};
