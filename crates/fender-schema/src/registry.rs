use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, SchemaError};
use crate::node::{parent_scope, EnumSchema, MessageSchema};
use crate::service::ServiceDescriptor;

/// Immutable registry of compiled messages, enums and services.
///
/// Cloning is cheap: all clones share one snapshot.
#[derive(Clone, Default)]
pub struct SchemaRegistry {
    inner: Arc<RegistryInner>,
}

#[derive(Default)]
struct RegistryInner {
    messages: HashMap<String, Arc<MessageSchema>>,
    enums: HashMap<String, Arc<EnumSchema>>,
    services: HashMap<String, Arc<ServiceDescriptor>>,
    /// Namespace name -> services declared directly in it, in declaration order.
    scopes: BTreeMap<String, Vec<Arc<ServiceDescriptor>>>,
    /// Services declared outside any package.
    unscoped: Vec<Arc<ServiceDescriptor>>,
}

impl SchemaRegistry {
    /// Start building a registry programmatically.
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Look up a namespace by name (e.g. `spotify.v1`).
    pub fn scope(&self, name: &str) -> Result<Scope> {
        if self.inner.scopes.contains_key(name) {
            Ok(Scope {
                registry: self.clone(),
                name: name.to_string(),
            })
        } else {
            Err(SchemaError::ScopeNotFound(name.to_string()))
        }
    }

    /// Known namespace names, sorted.
    pub fn scopes(&self) -> Vec<&str> {
        self.inner.scopes.keys().map(String::as_str).collect()
    }

    /// Resolve a fully-qualified message name. A leading `.` is accepted.
    pub fn message(&self, full_name: &str) -> Option<Arc<MessageSchema>> {
        self.inner
            .messages
            .get(full_name.trim_start_matches('.'))
            .cloned()
    }

    /// Resolve a fully-qualified enum name. A leading `.` is accepted.
    pub fn enumeration(&self, full_name: &str) -> Option<Arc<EnumSchema>> {
        self.inner
            .enums
            .get(full_name.trim_start_matches('.'))
            .cloned()
    }

    /// Resolve a fully-qualified service name.
    pub fn service(&self, full_name: &str) -> Option<Arc<ServiceDescriptor>> {
        self.inner
            .services
            .get(full_name.trim_start_matches('.'))
            .cloned()
    }

    /// Every service: package-less ones first, then by scope, each in
    /// declaration order.
    pub fn services(&self) -> ServiceSet {
        let services = self
            .inner
            .unscoped
            .iter()
            .chain(self.inner.scopes.values().flatten())
            .cloned();
        ServiceSet::new(self.clone(), services)
    }

    /// Fully-qualified names of all messages, sorted.
    pub fn message_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.inner.messages.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Fully-qualified names of all enums, sorted.
    pub fn enum_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.inner.enums.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// True when both handles share the same snapshot.
    pub fn same_snapshot(&self, other: &SchemaRegistry) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("scopes", &self.inner.scopes.len())
            .field("messages", &self.inner.messages.len())
            .field("enums", &self.inner.enums.len())
            .field("services", &self.inner.services.len())
            .finish()
    }
}

/// Collects definitions and freezes them into a [`SchemaRegistry`].
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    messages: Vec<MessageSchema>,
    enums: Vec<EnumSchema>,
    services: Vec<ServiceDescriptor>,
}

impl RegistryBuilder {
    pub fn message(mut self, message: MessageSchema) -> Self {
        self.messages.push(message);
        self
    }

    pub fn enumeration(mut self, enumeration: EnumSchema) -> Self {
        self.enums.push(enumeration);
        self
    }

    pub fn service(mut self, service: ServiceDescriptor) -> Self {
        self.services.push(service);
        self
    }

    /// Freeze the collected definitions.
    ///
    /// Fails with [`SchemaError::DuplicateSymbol`] when two definitions share
    /// a fully-qualified name. Type references are not checked here; unbound
    /// references surface when services are bound.
    pub fn build(self) -> Result<SchemaRegistry> {
        let mut symbols = HashSet::new();
        let mut inner = RegistryInner::default();

        for message in self.messages {
            claim_symbol(&mut symbols, message.full_name())?;
            register_ancestors(&mut inner.scopes, parent_scope(message.full_name()));
            inner
                .messages
                .insert(message.full_name().to_string(), Arc::new(message));
        }

        for enumeration in self.enums {
            claim_symbol(&mut symbols, enumeration.full_name())?;
            register_ancestors(&mut inner.scopes, parent_scope(enumeration.full_name()));
            inner
                .enums
                .insert(enumeration.full_name().to_string(), Arc::new(enumeration));
        }

        for service in self.services {
            claim_symbol(&mut symbols, service.full_name())?;
            register_ancestors(&mut inner.scopes, service.scope());
            let service = Arc::new(service);
            if service.scope().is_empty() {
                inner.unscoped.push(Arc::clone(&service));
            } else {
                inner
                    .scopes
                    .entry(service.scope().to_string())
                    .or_default()
                    .push(Arc::clone(&service));
            }
            inner
                .services
                .insert(service.full_name().to_string(), service);
        }

        // Types nested in messages name their parent message, not a namespace.
        inner.scopes.retain(|name, services| {
            !services.is_empty()
                || !(inner.messages.contains_key(name) || inner.enums.contains_key(name))
        });

        debug!(
            scopes = inner.scopes.len(),
            messages = inner.messages.len(),
            enums = inner.enums.len(),
            services = inner.services.len(),
            "schema registry built"
        );

        Ok(SchemaRegistry {
            inner: Arc::new(inner),
        })
    }
}

fn claim_symbol(symbols: &mut HashSet<String>, name: &str) -> Result<()> {
    if symbols.insert(name.to_string()) {
        Ok(())
    } else {
        Err(SchemaError::DuplicateSymbol(name.to_string()))
    }
}

fn register_ancestors(scopes: &mut BTreeMap<String, Vec<Arc<ServiceDescriptor>>>, scope: &str) {
    let mut current = scope;
    while !current.is_empty() {
        scopes.entry(current.to_string()).or_default();
        current = parent_scope(current);
    }
}

/// A namespace view over a registry snapshot.
#[derive(Debug, Clone)]
pub struct Scope {
    registry: SchemaRegistry,
    name: String,
}

impl Scope {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Find a service declared directly in this scope, by short or full name.
    pub fn lookup(&self, service: &str) -> Result<Arc<ServiceDescriptor>> {
        self.declared()
            .iter()
            .find(|candidate| candidate.name() == service || candidate.full_name() == service)
            .cloned()
            .ok_or_else(|| SchemaError::ServiceNotFound {
                scope: self.name.clone(),
                service: service.to_string(),
            })
    }

    /// All services declared directly in this scope, in declaration order.
    pub fn services(&self) -> ServiceSet {
        ServiceSet::new(self.registry.clone(), self.declared().iter().cloned())
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    fn declared(&self) -> &[Arc<ServiceDescriptor>] {
        self.registry
            .inner
            .scopes
            .get(&self.name)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

/// An ordered batch of services together with the registry snapshot they
/// were enumerated from.
#[derive(Debug, Clone)]
pub struct ServiceSet {
    registry: SchemaRegistry,
    services: Vec<Arc<ServiceDescriptor>>,
}

impl ServiceSet {
    pub fn new(
        registry: SchemaRegistry,
        services: impl IntoIterator<Item = Arc<ServiceDescriptor>>,
    ) -> Self {
        Self {
            registry,
            services: services.into_iter().collect(),
        }
    }

    /// The snapshot type references are resolved against.
    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Arc<ServiceDescriptor>> {
        self.services.iter()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Fully-qualified service names in order.
    pub fn names(&self) -> Vec<&str> {
        self.services
            .iter()
            .map(|service| service.full_name())
            .collect()
    }
}

impl<'a> IntoIterator for &'a ServiceSet {
    type Item = &'a Arc<ServiceDescriptor>;
    type IntoIter = std::slice::Iter<'a, Arc<ServiceDescriptor>>;

    fn into_iter(self) -> Self::IntoIter {
        self.services.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{FieldDescriptor, FieldKind, ScalarKind};

    fn sample() -> SchemaRegistry {
        SchemaRegistry::builder()
            .message(MessageSchema::new(
                "spotify.v1.SearchRequest",
                vec![FieldDescriptor::new("q", 1, FieldKind::Scalar(ScalarKind::String))],
            ))
            .message(MessageSchema::new("spotify.v1.SearchResponse", vec![]))
            .service(ServiceDescriptor::new(
                "spotify.v1",
                "TrackMetadata",
                [(
                    "Search".to_string(),
                    "spotify.v1.SearchRequest".to_string(),
                    "spotify.v1.SearchResponse".to_string(),
                )],
            ))
            .service(ServiceDescriptor::new("spotify.v1", "AlbumMetadata", []))
            .build()
            .unwrap()
    }

    #[test]
    fn scope_lookup_and_enumeration() {
        let registry = sample();
        let scope = registry.scope("spotify.v1").unwrap();

        let track = scope.lookup("TrackMetadata").unwrap();
        assert_eq!(track.full_name(), "spotify.v1.TrackMetadata");
        assert!(scope.lookup("spotify.v1.AlbumMetadata").is_ok());

        let services = scope.services();
        assert_eq!(
            services.names(),
            vec!["spotify.v1.TrackMetadata", "spotify.v1.AlbumMetadata"]
        );
        assert!(services.registry().same_snapshot(&registry));
    }

    #[test]
    fn ancestor_namespaces_are_scopes() {
        let registry = sample();
        assert_eq!(registry.scopes(), vec!["spotify", "spotify.v1"]);
        assert!(registry.scope("spotify").unwrap().services().is_empty());
    }

    #[test]
    fn nested_types_and_top_level_services_add_no_scopes() {
        let registry = SchemaRegistry::builder()
            .message(MessageSchema::new("spotify.v1.Track", vec![]))
            .message(MessageSchema::new("spotify.v1.Track.Credit", vec![]))
            .enumeration(crate::node::EnumSchema::new(
                "spotify.v1.Track.Credit.Role",
                vec![("PERFORMER".into(), 0)],
            ))
            .service(ServiceDescriptor::new(
                "",
                "Health",
                [(
                    "Check".to_string(),
                    "spotify.v1.Track".to_string(),
                    "spotify.v1.Track".to_string(),
                )],
            ))
            .build()
            .unwrap();

        assert_eq!(registry.scopes(), vec!["spotify", "spotify.v1"]);
        assert!(registry.scope("spotify.v1.Track").is_err());
        assert!(registry.scope("").is_err());
        assert_eq!(registry.services().names(), vec!["Health"]);
        assert!(registry.service("Health").is_some());
    }

    #[test]
    fn unknown_scope_and_service_fail() {
        let registry = sample();
        assert!(matches!(
            registry.scope("apple.v1"),
            Err(SchemaError::ScopeNotFound(_))
        ));
        assert!(matches!(
            registry.scope("spotify.v1").unwrap().lookup("ArtistMetadata"),
            Err(SchemaError::ServiceNotFound { .. })
        ));
    }

    #[test]
    fn duplicate_symbols_are_rejected() {
        let result = SchemaRegistry::builder()
            .message(MessageSchema::new("a.Thing", vec![]))
            .service(ServiceDescriptor::new("a", "Thing", []))
            .build();
        assert!(matches!(result, Err(SchemaError::DuplicateSymbol(name)) if name == "a.Thing"));
    }

    #[test]
    fn message_lookup_accepts_leading_dot() {
        let registry = sample();
        assert!(registry.message(".spotify.v1.SearchRequest").is_some());
        assert!(registry.message("spotify.v1.Missing").is_none());
        assert_eq!(registry.services().len(), 2);
    }
}
