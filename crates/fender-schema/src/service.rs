use serde::Serialize;

use crate::node::last_segment;

/// Request/response cardinality of a method.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationMode {
    #[default]
    Unary,
    ServerStreaming,
    ClientStreaming,
    Bidirectional,
}

impl InvocationMode {
    /// Derive the mode from a bundle's `requestStream`/`responseStream` flags.
    pub fn from_flags(request_stream: bool, response_stream: bool) -> Self {
        match (request_stream, response_stream) {
            (false, false) => Self::Unary,
            (false, true) => Self::ServerStreaming,
            (true, false) => Self::ClientStreaming,
            (true, true) => Self::Bidirectional,
        }
    }

    pub fn is_unary(self) -> bool {
        self == Self::Unary
    }
}

/// One remote procedure of a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodDescriptor {
    name: String,
    service: String,
    request_type: String,
    response_type: String,
    mode: InvocationMode,
}

impl MethodDescriptor {
    /// `service` is the fully-qualified name of the owning service; the
    /// request/response types are fully-qualified message names.
    pub fn new(
        name: impl Into<String>,
        service: impl Into<String>,
        request_type: impl Into<String>,
        response_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            service: service.into(),
            request_type: request_type.into(),
            response_type: response_type.into(),
            mode: InvocationMode::Unary,
        }
    }

    pub fn with_mode(mut self, mode: InvocationMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Fully-qualified name of the owning service.
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn request_type(&self) -> &str {
        &self.request_type
    }

    pub fn response_type(&self) -> &str {
        &self.response_type
    }

    pub fn mode(&self) -> InvocationMode {
        self.mode
    }

    /// `pkg.Service.Method`.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.service, self.name)
    }

    /// Routing path in `/pkg.Service/Method` form.
    pub fn route(&self) -> String {
        format!("/{}/{}", self.service, self.name)
    }
}

/// A service: its scope, name and ordered methods.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDescriptor {
    full_name: String,
    scope: String,
    methods: Vec<MethodDescriptor>,
}

impl ServiceDescriptor {
    /// Build a descriptor from its scope, short name and `(method, request,
    /// response)` triples; methods are unary.
    pub fn new(
        scope: impl Into<String>,
        name: &str,
        methods: impl IntoIterator<Item = (String, String, String)>,
    ) -> Self {
        let scope = scope.into();
        let full_name = if scope.is_empty() {
            name.to_string()
        } else {
            format!("{scope}.{name}")
        };
        let methods = methods
            .into_iter()
            .map(|(method, request, response)| {
                MethodDescriptor::new(method, full_name.clone(), request, response)
            })
            .collect();
        Self {
            full_name,
            scope,
            methods,
        }
    }

    pub(crate) fn from_parts(
        scope: String,
        full_name: String,
        methods: Vec<MethodDescriptor>,
    ) -> Self {
        Self {
            full_name,
            scope,
            methods,
        }
    }

    /// Short name, e.g. `TrackMetadata`.
    pub fn name(&self) -> &str {
        last_segment(&self.full_name)
    }

    /// Fully-qualified name, e.g. `spotify.v1.TrackMetadata`.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Owning scope (package), e.g. `spotify.v1`.
    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Methods in declaration order.
    pub fn methods(&self) -> &[MethodDescriptor] {
        &self.methods
    }

    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|method| method.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_names_and_routes() {
        let service = ServiceDescriptor::new(
            "spotify.v1",
            "TrackMetadata",
            [(
                "Search".to_string(),
                "spotify.v1.SearchRequest".to_string(),
                "spotify.v1.SearchResponse".to_string(),
            )],
        );

        assert_eq!(service.name(), "TrackMetadata");
        assert_eq!(service.full_name(), "spotify.v1.TrackMetadata");
        let method = service.method("Search").unwrap();
        assert_eq!(method.route(), "/spotify.v1.TrackMetadata/Search");
        assert!(method.mode().is_unary());
    }

    #[test]
    fn mode_from_stream_flags() {
        assert_eq!(InvocationMode::from_flags(false, true), InvocationMode::ServerStreaming);
        assert_eq!(InvocationMode::from_flags(true, true), InvocationMode::Bidirectional);
    }
}
