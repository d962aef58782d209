use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use fender_schema::{MessageSchema, MethodDescriptor, ServiceDescriptor};
use serde_json::Value;

use crate::config::CallOptions;
use crate::error::{CallError, ClientError, Result};
use crate::runtime::MethodRuntime;

/// A remote procedure bound to its schemas and the client's transport.
pub struct BoundMethod {
    runtime: MethodRuntime,
}

impl BoundMethod {
    pub(crate) fn new(runtime: MethodRuntime) -> Self {
        Self { runtime }
    }

    pub fn name(&self) -> &str {
        self.runtime.descriptor.name()
    }

    /// `pkg.Service.Method`.
    pub fn full_name(&self) -> &str {
        &self.runtime.full_name
    }

    pub fn descriptor(&self) -> &MethodDescriptor {
        &self.runtime.descriptor
    }

    pub fn request_schema(&self) -> &MessageSchema {
        &self.runtime.request
    }

    pub fn response_schema(&self) -> &MessageSchema {
        &self.runtime.response
    }

    /// Call with the client's default deadline.
    pub async fn invoke(&self, request: Value) -> std::result::Result<Value, CallError> {
        self.invoke_with(request, CallOptions::default()).await
    }

    pub async fn invoke_with(
        &self,
        request: Value,
        options: CallOptions,
    ) -> std::result::Result<Value, CallError> {
        self.runtime.invoke(&request, options.deadline).await
    }
}

impl fmt::Debug for BoundMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundMethod")
            .field("method", &self.runtime.full_name)
            .field("request", &self.runtime.request.full_name())
            .field("response", &self.runtime.response.full_name())
            .finish()
    }
}

/// Produces [`ServiceHandle`]s for one bound service.
#[derive(Debug)]
pub struct ServiceFactory {
    descriptor: Arc<ServiceDescriptor>,
    methods: Arc<HashMap<String, BoundMethod>>,
}

impl ServiceFactory {
    pub(crate) fn new(descriptor: Arc<ServiceDescriptor>, methods: HashMap<String, BoundMethod>) -> Self {
        Self {
            descriptor,
            methods: Arc::new(methods),
        }
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    pub fn instantiate(&self) -> ServiceHandle {
        ServiceHandle {
            descriptor: Arc::clone(&self.descriptor),
            methods: Arc::clone(&self.methods),
        }
    }
}

/// A callable service: one [`BoundMethod`] per declared method.
#[derive(Debug, Clone)]
pub struct ServiceHandle {
    descriptor: Arc<ServiceDescriptor>,
    methods: Arc<HashMap<String, BoundMethod>>,
}

impl ServiceHandle {
    /// The service this handle was generated from.
    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    pub fn method(&self, name: &str) -> Option<&BoundMethod> {
        self.methods.get(name)
    }

    /// Method names in declaration order.
    pub fn methods(&self) -> impl Iterator<Item = &str> + '_ {
        self.descriptor.methods().iter().map(MethodDescriptor::name)
    }

    /// Invoke `method` by name with the default call options.
    pub async fn call(&self, method: &str, request: Value) -> Result<Value> {
        self.call_with(method, request, CallOptions::default()).await
    }

    pub async fn call_with(&self, method: &str, request: Value, options: CallOptions) -> Result<Value> {
        let bound = self.method(method).ok_or_else(|| ClientError::UnknownMethod {
            service: self.descriptor.full_name().to_string(),
            method: method.to_string(),
        })?;
        Ok(bound.invoke_with(request, options).await?)
    }
}
