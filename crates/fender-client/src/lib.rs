//! Schema-bound RPC client runtime.
//!
//! [`FenderClient`] binds the services of a [`fender_schema::ServiceSet`]
//! into [`ServiceFactory`]s. Each factory instantiates a [`ServiceHandle`]
//! with one [`BoundMethod`] per declared method. Invoking a method validates
//! the request, sends it over the client's transport, awaits the correlated
//! reply and validates the response before handing it back.
//!
//! ```no_run
//! # async fn demo(registry: fender_schema::SchemaRegistry) -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use fender_client::FenderClient;
//! use fender_transport::ChannelTransport;
//!
//! let (transport, _responder) = ChannelTransport::pair();
//! let client = FenderClient::new(Arc::new(transport))?;
//! client.prepare_scope(&registry, "spotify.v1")?;
//!
//! let tracks = client.service("spotify.v1.TrackMetadata")?.instantiate();
//! let response = tracks.call("Search", serde_json::json!({ "q": "Hot" })).await?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```

pub mod binder;
pub mod client;
pub mod config;
pub mod error;
pub mod handle;
pub mod runtime;

pub use client::FenderClient;
pub use config::{CallOptions, ClientConfig};
pub use error::{CallError, CallErrorKind, ClientError, ErrorPayload, Result};
pub use handle::{BoundMethod, ServiceFactory, ServiceHandle};
pub use runtime::CallState;
