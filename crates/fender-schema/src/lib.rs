//! Compiled message/service schemas and structural validation.
//!
//! A [`SchemaRegistry`] holds message, enum and service definitions grouped
//! into scopes (packages). It is immutable once built and cheap to clone, so
//! it can be shared by every in-flight call without locking.
//!
//! The [`Validator`] walks a [`MessageSchema`] against a `serde_json::Value`
//! and classifies it as valid or as an ordered list of [`Violation`]s. It
//! never mutates the value it checks.

pub mod bundle;
pub mod config;
pub mod error;
pub mod node;
pub mod registry;
pub mod service;
pub mod validator;

pub use config::{BundleConfig, UnknownFieldPolicy, ValidatorConfig};
pub use error::{Result, SchemaError};
pub use node::{EnumSchema, FieldDescriptor, FieldKind, Label, MessageSchema, ScalarKind};
pub use registry::{RegistryBuilder, SchemaRegistry, Scope, ServiceSet};
pub use service::{InvocationMode, MethodDescriptor, ServiceDescriptor};
pub use validator::{Rule, ValidationResult, Validator, Violation, Violations};
