//! HTTP transport to the generation service.

mod http;

pub use http::{HttpTransport, TransportError};
