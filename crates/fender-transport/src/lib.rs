//! Correlated request/response transports.
//!
//! A [`Transport`] moves serialized requests to a peer and hands replies back
//! through an attached [`ResponseSink`], keyed by [`CorrelationId`]. The
//! client runtime owns the pending-call bookkeeping; transports only move
//! bytes.
//!
//! Two implementations ship here:
//! - [`SocketTransport`]: framed traffic over a Unix domain socket
//! - [`ChannelTransport`]: an in-process pair for tests and embedding

pub mod channel;
pub mod error;
#[cfg(unix)]
pub mod socket;
pub mod traits;

pub use channel::{CallReceiver, ChannelTransport, InboundCall};
pub use error::{Result, TransportError};
#[cfg(unix)]
pub use socket::SocketTransport;
pub use traits::{CorrelationId, Delivery, ResponseSink, Transport};
