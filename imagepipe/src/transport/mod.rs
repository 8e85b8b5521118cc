//! Byte transport used by the fetch stage.
//!
//! The [`Transport`] trait is the seam between the pipeline and the network.
//! [`ReqwestTransport`] is the production implementation; tests drive the
//! pipeline with scripted transports instead.

mod http;
mod types;

pub use http::ReqwestTransport;
pub use types::{is_retryable_status, Transport, TransportError};

#[cfg(test)]
pub use http::tests::ScriptedTransport;
