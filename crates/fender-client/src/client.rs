use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use fender_schema::{SchemaRegistry, ServiceDescriptor, ServiceSet};
use fender_transport::Transport;
use tracing::info;

use crate::binder;
use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::handle::ServiceFactory;
use crate::runtime::Session;

type Factories = HashMap<String, Arc<ServiceFactory>>;

/// Entry point: owns the transport session and the bound service factories.
///
/// Bindings are per client. Each successful bind swaps in a new snapshot of
/// the factory map, so lookups never see a half-applied batch.
pub struct FenderClient {
    session: Arc<Session>,
    config: ClientConfig,
    factories: RwLock<Arc<Factories>>,
}

impl FenderClient {
    /// Client with the default configuration.
    pub fn new<T: Transport + 'static>(transport: Arc<T>) -> Result<Self> {
        Self::with_config(transport, ClientConfig::default())
    }

    /// Attaches the client's pending-call table to `transport`.
    ///
    /// Each client needs a transport of its own: replies are routed to the
    /// first attached client only, so a transport already in use fails with
    /// [`ClientError::Attach`].
    pub fn with_config<T: Transport + 'static>(
        transport: Arc<T>,
        config: ClientConfig,
    ) -> Result<Self> {
        let transport: Arc<dyn Transport> = transport;
        let session = Session::new(transport).map_err(ClientError::Attach)?;
        Ok(Self {
            session: Arc::new(session),
            config,
            factories: RwLock::new(Arc::new(HashMap::new())),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Bind every service in `services`, replacing earlier bindings of the
    /// same names. Returns the bound service names in order.
    ///
    /// Fails with [`ClientError::UnresolvedScope`] when any method touches a
    /// type missing from the set's registry; nothing is installed then.
    pub fn prepare_service_handlers(&self, services: &ServiceSet) -> Result<Vec<String>> {
        let bound = binder::bind(services, &self.session, &self.config)?;
        let names: Vec<String> = bound.iter().map(|(name, _)| name.clone()).collect();

        let mut factories = self
            .factories
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next = Factories::clone(&factories);
        next.extend(bound);
        *factories = Arc::new(next);

        info!(services = names.len(), total = factories.len(), "service handlers prepared");
        Ok(names)
    }

    /// Bind every service declared in `scope` of `registry`.
    pub fn prepare_scope(&self, registry: &SchemaRegistry, scope: &str) -> Result<Vec<String>> {
        let services = registry.scope(scope)?.services();
        self.prepare_service_handlers(&services)
    }

    /// Factory for a bound service, by fully-qualified name.
    pub fn service(&self, name: &str) -> Result<Arc<ServiceFactory>> {
        self.snapshot()
            .get(name.trim_start_matches('.'))
            .cloned()
            .ok_or_else(|| ClientError::UnknownService(name.to_string()))
    }

    /// Factory for the service `descriptor` describes.
    pub fn handle(&self, descriptor: &ServiceDescriptor) -> Result<Arc<ServiceFactory>> {
        self.service(descriptor.full_name())
    }

    /// Bound service names, sorted.
    pub fn services(&self) -> Vec<String> {
        let mut names: Vec<String> = self.snapshot().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Calls currently awaiting a reply.
    pub fn pending_calls(&self) -> usize {
        self.session.pending_calls()
    }

    fn snapshot(&self) -> Arc<Factories> {
        Arc::clone(&self.factories.read().unwrap_or_else(PoisonError::into_inner))
    }
}

impl fmt::Debug for FenderClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FenderClient")
            .field("config", &self.config)
            .field("services", &self.services())
            .field("pending_calls", &self.pending_calls())
            .finish()
    }
}
