use std::sync::{Arc, Mutex, PoisonError};

use bytes::Bytes;
use fender_schema::MethodDescriptor;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{Result, TransportError};
use crate::traits::{CorrelationId, Delivery, ResponseSink, SinkSlot, Transport};

/// A call as seen by the in-process responder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundCall {
    pub id: CorrelationId,
    /// `/pkg.Service/Method`.
    pub route: String,
    pub payload: Bytes,
}

/// In-process transport paired with a [`CallReceiver`].
///
/// Every send and abandon is recorded, which makes it the transport of
/// choice for exercising the client runtime in tests.
#[derive(Debug)]
pub struct ChannelTransport {
    slot: Arc<SinkSlot>,
    calls: mpsc::UnboundedSender<InboundCall>,
    sent: Mutex<Vec<InboundCall>>,
    abandoned: Mutex<Vec<CorrelationId>>,
}

impl ChannelTransport {
    /// Create a connected transport/receiver pair.
    pub fn pair() -> (Self, CallReceiver) {
        let (calls, inbound) = mpsc::unbounded_channel();
        let slot = Arc::new(SinkSlot::default());
        let transport = Self {
            slot: Arc::clone(&slot),
            calls,
            sent: Mutex::new(Vec::new()),
            abandoned: Mutex::new(Vec::new()),
        };
        (transport, CallReceiver { inbound, slot })
    }

    /// Calls accepted by `send`, in order.
    pub fn sent(&self) -> Vec<InboundCall> {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn send_count(&self) -> usize {
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Ids passed to `abandon`, in order.
    pub fn abandoned(&self) -> Vec<CorrelationId> {
        self.abandoned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Transport for ChannelTransport {
    fn attach(&self, sink: Arc<dyn ResponseSink>) -> Result<()> {
        self.slot.set(sink)
    }

    fn send(&self, id: CorrelationId, method: &MethodDescriptor, request: Bytes) -> Result<()> {
        let call = InboundCall {
            id,
            route: method.route(),
            payload: request,
        };
        self.calls
            .send(call.clone())
            .map_err(|_| TransportError::Shutdown)?;
        debug!(%id, route = %call.route, "call queued in-process");
        self.sent
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
        Ok(())
    }

    fn abandon(&self, id: CorrelationId) {
        debug!(%id, "call abandoned");
        self.abandoned
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(id);
    }
}

/// Responder side of a [`ChannelTransport`].
#[derive(Debug)]
pub struct CallReceiver {
    inbound: mpsc::UnboundedReceiver<InboundCall>,
    slot: Arc<SinkSlot>,
}

impl CallReceiver {
    /// Wait for the next call. `None` once the transport is dropped.
    pub async fn next(&mut self) -> Option<InboundCall> {
        self.inbound.recv().await
    }

    /// Take a queued call without waiting.
    pub fn try_next(&mut self) -> Option<InboundCall> {
        self.inbound.try_recv().ok()
    }

    /// Answer `id` with a response body.
    pub fn respond(&self, id: CorrelationId, payload: impl Into<Bytes>) {
        self.deliver(id, Delivery::Response(payload.into()));
    }

    /// Fail `id` with a transport error.
    pub fn fail(&self, id: CorrelationId, error: TransportError) {
        self.deliver(id, Delivery::Failure(error));
    }

    /// Report the connection as lost.
    pub fn disconnect(&self, reason: &str) {
        match self.slot.get() {
            Some(sink) => sink.disconnected(reason),
            None => warn!(reason, "disconnect with no sink attached"),
        }
    }

    fn deliver(&self, id: CorrelationId, delivery: Delivery) {
        match self.slot.get() {
            Some(sink) => sink.deliver(id, delivery),
            None => warn!(%id, "reply dropped: no sink attached"),
        }
    }
}
