//! Schema-validated RPC client.
//!
//! fender turns a compiled service/message schema bundle into callable
//! service handles: requests are validated before they leave the process,
//! responses are validated before they reach the caller, and every failure
//! comes back as a structured error.
//!
//! # Crate Structure
//!
//! - [`schema`] — Schema registry, bundle loader and message validator
//! - [`frame`] — Correlation-tagged wire framing
//! - [`transport`] — Transport trait, Unix socket and in-process transports
//! - [`client`] — Service binding, handles and the call runtime

/// Re-export schema types.
pub mod schema {
    pub use fender_schema::*;
}

/// Re-export frame types.
pub mod frame {
    pub use fender_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use fender_transport::*;
}

/// Re-export client types.
pub mod client {
    pub use fender_client::*;
}

pub use fender_client::{CallError, ClientConfig, FenderClient};
pub use fender_schema::SchemaRegistry;
