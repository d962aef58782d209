use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use fender_schema::MethodDescriptor;

use crate::error::{Result, TransportError};

/// Identifies one in-flight call on a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CorrelationId(u64);

impl CorrelationId {
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for CorrelationId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a transport hands back for a correlation id.
#[derive(Debug)]
pub enum Delivery {
    /// Raw response body.
    Response(Bytes),
    /// The call failed in or beyond the transport.
    Failure(TransportError),
}

/// Receives replies from a transport.
///
/// Implementations must tolerate deliveries for ids they no longer track.
pub trait ResponseSink: Send + Sync {
    fn deliver(&self, id: CorrelationId, delivery: Delivery);

    /// The connection is gone; no further deliveries will arrive.
    fn disconnected(&self, reason: &str);
}

/// A request/response channel multiplexed by correlation id.
///
/// `send` only queues the request; the reply arrives later through the
/// attached sink. A send that returns `Err` will never produce a delivery.
pub trait Transport: Send + Sync {
    /// Register the sink replies are delivered to.
    ///
    /// A transport serves one sink for its whole life; a second attach fails
    /// with [`TransportError::AlreadyAttached`](crate::TransportError) and
    /// leaves the first sink in place.
    fn attach(&self, sink: Arc<dyn ResponseSink>) -> Result<()>;

    fn send(&self, id: CorrelationId, method: &MethodDescriptor, request: Bytes) -> Result<()>;

    /// The caller stopped waiting for `id`. Best-effort.
    fn abandon(&self, id: CorrelationId);
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn attach(&self, sink: Arc<dyn ResponseSink>) -> Result<()> {
        (**self).attach(sink)
    }

    fn send(&self, id: CorrelationId, method: &MethodDescriptor, request: Bytes) -> Result<()> {
        (**self).send(id, method, request)
    }

    fn abandon(&self, id: CorrelationId) {
        (**self).abandon(id)
    }
}

/// Write-once sink slot used by the bundled transports.
#[derive(Default)]
pub(crate) struct SinkSlot {
    sink: std::sync::RwLock<Option<Arc<dyn ResponseSink>>>,
}

impl SinkSlot {
    pub(crate) fn set(&self, sink: Arc<dyn ResponseSink>) -> Result<()> {
        let mut slot = self
            .sink
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if slot.is_some() {
            return Err(TransportError::AlreadyAttached);
        }
        *slot = Some(sink);
        Ok(())
    }

    pub(crate) fn get(&self) -> Option<Arc<dyn ResponseSink>> {
        self.sink
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

impl fmt::Debug for SinkSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SinkSlot")
            .field("attached", &self.get().is_some())
            .finish()
    }
}
