//! Per-call execution: the call state machine, the pending-call table and
//! the invocation pipeline every [`BoundMethod`](crate::BoundMethod) runs.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use fender_schema::{
    MessageSchema, MethodDescriptor, SchemaRegistry, ValidationResult, Validator, ValidatorConfig,
};
use fender_transport::{CorrelationId, Delivery, ResponseSink, Transport, TransportError};
use serde_json::Value;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::error::CallError;

/// Lifecycle of one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallState {
    Created,
    ValidatingRequest,
    RequestInvalid,
    Sent,
    AwaitingResponse,
    ValidatingResponse,
    Fulfilled,
    ResponseInvalid,
    TransportFailed,
    TimedOut,
}

impl CallState {
    pub fn can_transition_to(self, next: CallState) -> bool {
        use CallState::*;
        matches!(
            (self, next),
            (Created, ValidatingRequest)
                | (ValidatingRequest, RequestInvalid | Sent)
                | (Sent, AwaitingResponse | TransportFailed)
                | (AwaitingResponse, ValidatingResponse | TransportFailed | TimedOut)
                | (ValidatingResponse, Fulfilled | ResponseInvalid)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::RequestInvalid
                | Self::Fulfilled
                | Self::ResponseInvalid
                | Self::TransportFailed
                | Self::TimedOut
        )
    }
}

impl fmt::Display for CallState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

type Outcome = Result<Bytes, TransportError>;

/// In-flight calls keyed by correlation id.
///
/// The entry is the only holder of the completion sender, so whichever path
/// removes it (delivery, failure, timeout or cancellation) is the single
/// writer of the call's outcome.
#[derive(Default)]
pub(crate) struct PendingCalls {
    calls: Mutex<HashMap<CorrelationId, oneshot::Sender<Outcome>>>,
}

impl PendingCalls {
    fn register(&self, id: CorrelationId) -> oneshot::Receiver<Outcome> {
        let (completion, outcome) = oneshot::channel();
        self.lock().insert(id, completion);
        outcome
    }

    /// Drop interest in `id`. True when the entry was still present.
    fn forget(&self, id: CorrelationId) -> bool {
        self.lock().remove(&id).is_some()
    }

    /// Resolve `id`. False when another path already resolved it.
    fn complete(&self, id: CorrelationId, outcome: Outcome) -> bool {
        let Some(completion) = self.lock().remove(&id) else {
            return false;
        };
        // The receiver may already be gone if the caller was dropped between
        // removal attempts; nothing is waiting in that case.
        let _ = completion.send(outcome);
        true
    }

    fn fail_all(&self, reason: &str) -> usize {
        let drained: Vec<_> = self.lock().drain().collect();
        let count = drained.len();
        for (_, completion) in drained {
            let _ = completion.send(Err(TransportError::Disconnected(reason.to_string())));
        }
        count
    }

    pub(crate) fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<CorrelationId, oneshot::Sender<Outcome>>> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ResponseSink for PendingCalls {
    fn deliver(&self, id: CorrelationId, delivery: Delivery) {
        let outcome = match delivery {
            Delivery::Response(body) => Ok(body),
            Delivery::Failure(err) => Err(err),
        };
        if !self.complete(id, outcome) {
            warn!(%id, "dropping late or unknown delivery");
        }
    }

    fn disconnected(&self, reason: &str) {
        let failed = self.fail_all(reason);
        if failed > 0 {
            warn!(reason, failed, "transport disconnected with calls in flight");
        } else {
            debug!(reason, "transport disconnected");
        }
    }
}

/// Transport plus call bookkeeping shared by every handle of one client.
pub(crate) struct Session {
    transport: Arc<dyn Transport>,
    pending: Arc<PendingCalls>,
    next_id: AtomicU64,
}

impl Session {
    pub(crate) fn new(transport: Arc<dyn Transport>) -> Result<Self, TransportError> {
        let pending = Arc::new(PendingCalls::default());
        transport.attach(Arc::clone(&pending) as Arc<dyn ResponseSink>)?;
        Ok(Self {
            transport,
            pending,
            next_id: AtomicU64::new(1),
        })
    }

    pub(crate) fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    fn next_id(&self) -> CorrelationId {
        CorrelationId::new(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

/// Everything one bound method needs to run a call.
pub(crate) struct MethodRuntime {
    pub(crate) descriptor: MethodDescriptor,
    pub(crate) full_name: String,
    pub(crate) request: Arc<MessageSchema>,
    pub(crate) response: Arc<MessageSchema>,
    pub(crate) registry: SchemaRegistry,
    pub(crate) session: Arc<Session>,
    pub(crate) request_validation: ValidatorConfig,
    pub(crate) response_validation: ValidatorConfig,
    pub(crate) default_deadline: Option<Duration>,
}

impl MethodRuntime {
    pub(crate) async fn invoke(
        &self,
        request: &Value,
        deadline: Option<Duration>,
    ) -> Result<Value, CallError> {
        let deadline = deadline.or(self.default_deadline);
        let mut call = Tracker::new(&self.full_name);

        call.advance(CallState::ValidatingRequest);
        let validator = Validator::with_config(&self.registry, self.request_validation);
        if let ValidationResult::Invalid(violations) = validator.validate(&self.request, request) {
            call.advance(CallState::RequestInvalid);
            return Err(CallError::RequestValidation {
                method: self.full_name.clone(),
                violations,
            });
        }

        let id = self.session.next_id();
        call.id = Some(id);
        let body = Bytes::from(request.to_string());
        let outcome = self.session.pending.register(id);

        call.advance(CallState::Sent);
        if let Err(source) = self.session.transport.send(id, &self.descriptor, body) {
            self.session.pending.forget(id);
            call.advance(CallState::TransportFailed);
            return Err(CallError::Transport {
                method: self.full_name.clone(),
                source,
            });
        }
        debug!(%id, method = %self.full_name, "request sent");

        call.advance(CallState::AwaitingResponse);
        let mut guard = AbandonOnDrop {
            session: &self.session,
            id,
            armed: true,
        };
        let mut outcome = outcome;
        let received = match deadline {
            Some(after) => match tokio::time::timeout(after, &mut outcome).await {
                Ok(received) => received,
                Err(_) if self.session.pending.forget(id) => {
                    guard.armed = false;
                    self.session.transport.abandon(id);
                    call.advance(CallState::TimedOut);
                    return Err(CallError::Timeout {
                        method: self.full_name.clone(),
                        after,
                    });
                }
                // A delivery won the race and already wrote the outcome.
                Err(_) => outcome.await,
            },
            None => outcome.await,
        };
        guard.armed = false;

        let body = match received {
            Ok(Ok(body)) => body,
            Ok(Err(source)) => {
                call.advance(CallState::TransportFailed);
                return Err(CallError::Transport {
                    method: self.full_name.clone(),
                    source,
                });
            }
            Err(_) => {
                call.advance(CallState::TransportFailed);
                return Err(CallError::Transport {
                    method: self.full_name.clone(),
                    source: TransportError::Disconnected("call slot dropped".into()),
                });
            }
        };

        call.advance(CallState::ValidatingResponse);
        let value: Value = match serde_json::from_slice(&body) {
            Ok(value) => value,
            Err(err) => {
                call.advance(CallState::ResponseInvalid);
                return Err(CallError::ResponseValidation {
                    method: self.full_name.clone(),
                    violations: Default::default(),
                    decode_error: Some(err.to_string()),
                });
            }
        };

        let validator = Validator::with_config(&self.registry, self.response_validation);
        if let ValidationResult::Invalid(violations) = validator.validate(&self.response, &value) {
            call.advance(CallState::ResponseInvalid);
            return Err(CallError::ResponseValidation {
                method: self.full_name.clone(),
                violations,
                decode_error: None,
            });
        }

        call.advance(CallState::Fulfilled);
        Ok(value)
    }
}

/// Removes the pending entry and abandons the id if the call future is
/// dropped while awaiting its reply.
struct AbandonOnDrop<'a> {
    session: &'a Session,
    id: CorrelationId,
    armed: bool,
}

impl Drop for AbandonOnDrop<'_> {
    fn drop(&mut self) {
        if self.armed && self.session.pending.forget(self.id) {
            debug!(id = %self.id, "call cancelled");
            self.session.transport.abandon(self.id);
        }
    }
}

struct Tracker<'a> {
    method: &'a str,
    id: Option<CorrelationId>,
    state: CallState,
}

impl<'a> Tracker<'a> {
    fn new(method: &'a str) -> Self {
        Self {
            method,
            id: None,
            state: CallState::Created,
        }
    }

    fn advance(&mut self, next: CallState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal call transition {} -> {}",
            self.state,
            next
        );
        trace!(
            method = self.method,
            id = ?self.id.map(CorrelationId::get),
            from = %self.state,
            to = %next,
            "call state"
        );
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_edges() {
        use CallState::*;

        assert!(Created.can_transition_to(ValidatingRequest));
        assert!(ValidatingRequest.can_transition_to(RequestInvalid));
        assert!(Sent.can_transition_to(TransportFailed));
        assert!(AwaitingResponse.can_transition_to(TimedOut));
        assert!(ValidatingResponse.can_transition_to(ResponseInvalid));

        assert!(!Created.can_transition_to(Sent));
        assert!(!ValidatingRequest.can_transition_to(AwaitingResponse));
        assert!(!TimedOut.can_transition_to(ValidatingResponse));
        for terminal in [RequestInvalid, Fulfilled, ResponseInvalid, TransportFailed, TimedOut] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(Fulfilled));
        }
        assert!(!AwaitingResponse.is_terminal());
    }

    #[tokio::test]
    async fn outcome_is_written_once() {
        let pending = PendingCalls::default();
        let id = CorrelationId::new(7);
        let outcome = pending.register(id);

        assert!(pending.complete(id, Ok(Bytes::from_static(b"first"))));
        assert!(!pending.complete(id, Ok(Bytes::from_static(b"second"))));
        assert!(!pending.forget(id));
        assert_eq!(pending.fail_all("gone"), 0);

        assert_eq!(outcome.await.unwrap().unwrap(), Bytes::from_static(b"first"));
    }

    #[tokio::test]
    async fn disconnect_fails_every_pending_call() {
        let pending = PendingCalls::default();
        let first = pending.register(CorrelationId::new(1));
        let second = pending.register(CorrelationId::new(2));

        pending.disconnected("socket closed");
        assert_eq!(pending.len(), 0);

        for outcome in [first, second] {
            let err = outcome.await.unwrap().unwrap_err();
            assert!(matches!(err, TransportError::Disconnected(reason) if reason == "socket closed"));
        }
        pending.deliver(CorrelationId::new(1), Delivery::Response(Bytes::new()));
    }

    #[test]
    fn forgotten_calls_ignore_later_deliveries() {
        let pending = PendingCalls::default();
        let id = CorrelationId::new(3);
        let _outcome = pending.register(id);

        assert!(pending.forget(id));
        pending.deliver(id, Delivery::Failure(TransportError::Remote("late".into())));
        assert_eq!(pending.len(), 0);
    }
}
