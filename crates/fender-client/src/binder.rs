//! Turns service descriptors into callable factories.
//!
//! Every type a method can touch is resolved up front, so a successful bind
//! guarantees that validation never meets an unknown type.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use fender_schema::{FieldKind, MessageSchema, SchemaRegistry, ServiceDescriptor, ServiceSet};
use tracing::{debug, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::handle::{BoundMethod, ServiceFactory};
use crate::runtime::{MethodRuntime, Session};

/// Bind every service in `services`, in order.
///
/// All-or-nothing: on error no factory is returned.
pub(crate) fn bind(
    services: &ServiceSet,
    session: &Arc<Session>,
    config: &ClientConfig,
) -> Result<Vec<(String, Arc<ServiceFactory>)>> {
    let registry = services.registry();
    let mut factories = Vec::with_capacity(services.len());

    for service in services {
        let factory = bind_service(registry, service, session, config)?;
        factories.push((service.full_name().to_string(), Arc::new(factory)));
    }

    Ok(factories)
}

fn bind_service(
    registry: &SchemaRegistry,
    service: &Arc<ServiceDescriptor>,
    session: &Arc<Session>,
    config: &ClientConfig,
) -> Result<ServiceFactory> {
    let mut methods = HashMap::with_capacity(service.methods().len());

    for method in service.methods() {
        let unresolved = |type_name: &str| ClientError::UnresolvedScope {
            service: service.full_name().to_string(),
            method: method.name().to_string(),
            type_name: type_name.to_string(),
        };

        let request = registry
            .message(method.request_type())
            .ok_or_else(|| unresolved(method.request_type()))?;
        let response = registry
            .message(method.response_type())
            .ok_or_else(|| unresolved(method.response_type()))?;

        let mut reachable = Reachable::new(registry);
        reachable.check(&request).map_err(|name| unresolved(&name))?;
        reachable.check(&response).map_err(|name| unresolved(&name))?;

        if !method.mode().is_unary() {
            warn!(
                method = %method.full_name(),
                mode = ?method.mode(),
                "streaming method bound with unary call semantics"
            );
        }

        let runtime = MethodRuntime {
            descriptor: method.clone(),
            full_name: method.full_name(),
            request,
            response,
            registry: registry.clone(),
            session: Arc::clone(session),
            request_validation: config.request_validator(),
            response_validation: config.response_validator(),
            default_deadline: config.default_deadline,
        };
        methods.insert(method.name().to_string(), BoundMethod::new(runtime));
    }

    debug!(
        service = service.full_name(),
        methods = methods.len(),
        "service bound"
    );
    Ok(ServiceFactory::new(Arc::clone(service), methods))
}

/// Walks message fields to confirm every referenced type is registered.
struct Reachable<'r> {
    registry: &'r SchemaRegistry,
    seen: HashSet<String>,
}

impl<'r> Reachable<'r> {
    fn new(registry: &'r SchemaRegistry) -> Self {
        Self {
            registry,
            seen: HashSet::new(),
        }
    }

    /// `Err` carries the first unregistered type name found.
    fn check(&mut self, message: &MessageSchema) -> std::result::Result<(), String> {
        if !self.seen.insert(message.full_name().to_string()) {
            return Ok(());
        }

        for field in message.fields() {
            match leaf(&field.kind) {
                FieldKind::Message(name) => {
                    let nested = self.registry.message(name).ok_or_else(|| name.clone())?;
                    self.check(&nested)?;
                }
                FieldKind::Enum(name) => {
                    if self.registry.enumeration(name).is_none() {
                        return Err(name.clone());
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn leaf(kind: &FieldKind) -> &FieldKind {
    match kind {
        FieldKind::Repeated(element) => leaf(element),
        FieldKind::Map { value, .. } => leaf(value),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use fender_schema::{EnumSchema, FieldDescriptor, ScalarKind};
    use fender_transport::ChannelTransport;

    use super::*;

    fn session() -> Arc<Session> {
        let (transport, _receiver) = ChannelTransport::pair();
        Arc::new(Session::new(Arc::new(transport)).unwrap())
    }

    fn service(methods: &[(&str, &str, &str)]) -> ServiceDescriptor {
        ServiceDescriptor::new(
            "shop.v1",
            "Catalog",
            methods
                .iter()
                .map(|(m, req, resp)| (m.to_string(), req.to_string(), resp.to_string())),
        )
    }

    fn registry(extra: Vec<MessageSchema>, service: ServiceDescriptor) -> SchemaRegistry {
        let mut builder = SchemaRegistry::builder()
            .enumeration(EnumSchema::new("shop.v1.Color", vec![("RED".into(), 0)]))
            .message(MessageSchema::new("shop.v1.Empty", vec![]))
            .service(service);
        for message in extra {
            builder = builder.message(message);
        }
        builder.build().unwrap()
    }

    #[test]
    fn binds_one_method_per_descriptor() {
        let registry = registry(
            vec![],
            service(&[
                ("Get", "shop.v1.Empty", "shop.v1.Empty"),
                ("List", "shop.v1.Empty", "shop.v1.Empty"),
            ]),
        );
        let factories = bind(&registry.services(), &session(), &ClientConfig::default()).unwrap();

        assert_eq!(factories.len(), 1);
        assert_eq!(factories[0].0, "shop.v1.Catalog");
        let handle = factories[0].1.instantiate();
        assert_eq!(handle.methods().collect::<Vec<_>>(), vec!["Get", "List"]);
        assert!(handle.method("Get").is_some());
        assert!(handle.method("Delete").is_none());
    }

    #[test]
    fn missing_request_type_is_unresolved() {
        let registry = registry(vec![], service(&[("Get", "shop.v1.Missing", "shop.v1.Empty")]));
        let err = bind(&registry.services(), &session(), &ClientConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ClientError::UnresolvedScope { ref method, ref type_name, .. }
                if method == "Get" && type_name == "shop.v1.Missing"
        ));
    }

    #[test]
    fn nested_references_are_checked_transitively() {
        let item = MessageSchema::new(
            "shop.v1.Item",
            vec![
                FieldDescriptor::new("color", 1, FieldKind::Enum("shop.v1.Color".into())),
                FieldDescriptor::new(
                    "parts",
                    2,
                    FieldKind::map(ScalarKind::String, FieldKind::Message("shop.v1.Part".into())),
                ),
                FieldDescriptor::new("self", 3, FieldKind::Message("shop.v1.Item".into())),
            ],
        );
        let registry = registry(vec![item], service(&[("Get", "shop.v1.Empty", "shop.v1.Item")]));

        let err = bind(&registry.services(), &session(), &ClientConfig::default()).unwrap_err();
        assert!(matches!(
            err,
            ClientError::UnresolvedScope { ref type_name, .. } if type_name == "shop.v1.Part"
        ));
    }
}
