//! Loader for protobuf.js-style JSON schema bundles.
//!
//! A bundle is a tree of `nested` namespaces. A node with `fields` is a
//! message, with `values` an enum, with `methods` a service; anything else is
//! a plain namespace. Type references are resolved the way protoc does:
//! innermost enclosing scope first, walking outward, with a leading `.`
//! marking an absolute name. References that cannot be resolved are kept
//! verbatim so binding reports them.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::BundleConfig;
use crate::error::{Result, SchemaError};
use crate::node::{
    parent_scope, EnumSchema, FieldDescriptor, FieldKind, Label, MessageSchema, ScalarKind,
};
use crate::registry::{RegistryBuilder, SchemaRegistry};
use crate::service::{InvocationMode, MethodDescriptor, ServiceDescriptor};

#[derive(Debug, Default, Deserialize)]
struct RawNode {
    nested: Option<Map<String, Value>>,
    fields: Option<Map<String, Value>>,
    values: Option<Map<String, Value>>,
    methods: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawField {
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    id: u32,
    rule: Option<String>,
    key_type: Option<String>,
    options: Option<RawFieldOptions>,
}

#[derive(Debug, Deserialize)]
struct RawFieldOptions {
    default: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMethod {
    request_type: String,
    response_type: String,
    #[serde(default)]
    request_stream: bool,
    #[serde(default)]
    response_stream: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SymbolKind {
    Message,
    Enum,
    Service,
}

/// Declarations collected in the first pass, before references resolve.
#[derive(Default)]
struct Declarations {
    symbols: HashMap<String, SymbolKind>,
    messages: Vec<(String, Map<String, Value>)>,
    enums: Vec<(String, Map<String, Value>)>,
    services: Vec<(String, Map<String, Value>)>,
}

impl SchemaRegistry {
    /// Load a bundle from a JSON string with default limits.
    pub fn from_bundle_str(bundle: &str) -> Result<Self> {
        let config = BundleConfig::default();
        if bundle.len() > config.max_bundle_size {
            return Err(SchemaError::LoadFailed(format!(
                "bundle too large ({} bytes, max {})",
                bundle.len(),
                config.max_bundle_size
            )));
        }
        let value: Value = serde_json::from_str(bundle)?;
        Self::from_bundle_value_with_config(&value, &config)
    }

    /// Load a bundle from an already parsed JSON value with default limits.
    pub fn from_bundle_value(bundle: &Value) -> Result<Self> {
        Self::from_bundle_value_with_config(bundle, &BundleConfig::default())
    }

    /// Load a bundle from a parsed JSON value with explicit limits.
    pub fn from_bundle_value_with_config(bundle: &Value, config: &BundleConfig) -> Result<Self> {
        let mut declarations = Declarations::default();
        collect(bundle, "", 0, config, &mut declarations)?;
        declarations.compile()
    }

    /// Load a bundle file with default limits.
    pub fn from_bundle_file(path: &Path) -> Result<Self> {
        Self::from_bundle_file_with_config(path, &BundleConfig::default())
    }

    /// Load a bundle file with explicit limits.
    pub fn from_bundle_file_with_config(path: &Path, config: &BundleConfig) -> Result<Self> {
        let file = std::fs::File::open(path)
            .map_err(|err| SchemaError::LoadFailed(format!("{}: {err}", path.display())))?;
        let metadata = file
            .metadata()
            .map_err(|err| SchemaError::LoadFailed(format!("{}: {err}", path.display())))?;
        if !metadata.is_file() {
            return Err(SchemaError::LoadFailed(format!(
                "{} is not a regular file",
                path.display()
            )));
        }
        if metadata.len() > config.max_bundle_size as u64 {
            return Err(SchemaError::LoadFailed(format!(
                "bundle too large ({} bytes, max {}): {}",
                metadata.len(),
                config.max_bundle_size,
                path.display()
            )));
        }

        let read_limit =
            u64::try_from(config.max_bundle_size.saturating_add(1)).unwrap_or(u64::MAX);
        let mut content = String::new();
        file.take(read_limit)
            .read_to_string(&mut content)
            .map_err(|err| SchemaError::LoadFailed(format!("{}: {err}", path.display())))?;
        if content.len() > config.max_bundle_size {
            return Err(SchemaError::LoadFailed(format!(
                "bundle grew while reading: {}",
                path.display()
            )));
        }

        debug!(path = %path.display(), bytes = content.len(), "loading schema bundle");
        let value: Value = serde_json::from_str(&content)?;
        Self::from_bundle_value_with_config(&value, config)
    }
}

fn collect(
    node: &Value,
    full_name: &str,
    depth: usize,
    config: &BundleConfig,
    out: &mut Declarations,
) -> Result<()> {
    if depth > config.max_nesting_depth {
        return Err(SchemaError::InvalidBundle(format!(
            "nesting deeper than {} at '{full_name}'",
            config.max_nesting_depth
        )));
    }

    let raw: RawNode = RawNode::deserialize(node).map_err(|err| {
        SchemaError::InvalidBundle(format!("malformed node '{}': {err}", display_name(full_name)))
    })?;

    if !full_name.is_empty() {
        let kind = match (&raw.fields, &raw.values, &raw.methods) {
            (Some(fields), None, None) => {
                out.messages.push((full_name.to_string(), fields.clone()));
                Some(SymbolKind::Message)
            }
            (None, Some(values), None) => {
                out.enums.push((full_name.to_string(), values.clone()));
                Some(SymbolKind::Enum)
            }
            (None, None, Some(methods)) => {
                out.services.push((full_name.to_string(), methods.clone()));
                Some(SymbolKind::Service)
            }
            (None, None, None) => None,
            _ => {
                return Err(SchemaError::InvalidBundle(format!(
                    "'{full_name}' mixes fields, values and methods"
                )))
            }
        };

        if let Some(kind) = kind {
            if out.symbols.insert(full_name.to_string(), kind).is_some() {
                return Err(SchemaError::DuplicateSymbol(full_name.to_string()));
            }
        }
    }

    if let Some(nested) = &raw.nested {
        for (name, child) in nested {
            if name.is_empty() {
                return Err(SchemaError::InvalidBundle(format!(
                    "empty name inside '{}'",
                    display_name(full_name)
                )));
            }
            let child_name = if full_name.is_empty() {
                name.clone()
            } else {
                format!("{full_name}.{name}")
            };
            collect(child, &child_name, depth + 1, config, out)?;
        }
    }

    Ok(())
}

impl Declarations {
    fn compile(&self) -> Result<SchemaRegistry> {
        let mut builder = RegistryBuilder::default();

        for (full_name, fields) in &self.messages {
            builder = builder.message(self.compile_message(full_name, fields)?);
        }
        for (full_name, values) in &self.enums {
            builder = builder.enumeration(compile_enum(full_name, values)?);
        }
        for (full_name, methods) in &self.services {
            builder = builder.service(self.compile_service(full_name, methods)?);
        }

        builder.build()
    }

    fn compile_message(
        &self,
        full_name: &str,
        fields: &Map<String, Value>,
    ) -> Result<MessageSchema> {
        let mut compiled = Vec::with_capacity(fields.len());
        for (name, raw) in fields {
            let raw = RawField::deserialize(raw).map_err(|err| {
                SchemaError::InvalidBundle(format!("malformed field '{full_name}.{name}': {err}"))
            })?;

            let element = self.field_kind(full_name, &raw.type_name);
            let (kind, label) = match (raw.key_type.as_deref(), raw.rule.as_deref()) {
                (Some(key_type), _) => {
                    let key = ScalarKind::from_type_name(key_type)
                        .filter(|key| key.is_valid_map_key())
                        .ok_or_else(|| {
                            SchemaError::InvalidBundle(format!(
                                "invalid map key type '{key_type}' on '{full_name}.{name}'"
                            ))
                        })?;
                    (FieldKind::map(key, element), Label::Optional)
                }
                (None, Some("repeated")) => (FieldKind::repeated(element), Label::Optional),
                (None, Some("required")) => (element, Label::Required),
                (None, Some("optional") | None) => (element, Label::Optional),
                (None, Some(other)) => {
                    return Err(SchemaError::InvalidBundle(format!(
                        "unknown rule '{other}' on '{full_name}.{name}'"
                    )))
                }
            };

            let mut field = FieldDescriptor::new(name.clone(), raw.id, kind);
            field.label = label;
            field.default = raw.options.and_then(|options| options.default);
            compiled.push(field);
        }
        Ok(MessageSchema::new(full_name, compiled))
    }

    fn compile_service(
        &self,
        full_name: &str,
        methods: &Map<String, Value>,
    ) -> Result<ServiceDescriptor> {
        let mut compiled = Vec::with_capacity(methods.len());
        for (name, raw) in methods {
            let raw = RawMethod::deserialize(raw).map_err(|err| {
                SchemaError::InvalidBundle(format!("malformed method '{full_name}.{name}': {err}"))
            })?;
            let request = self.message_reference(full_name, &raw.request_type);
            let response = self.message_reference(full_name, &raw.response_type);
            let mode = InvocationMode::from_flags(raw.request_stream, raw.response_stream);
            compiled.push(
                MethodDescriptor::new(name.clone(), full_name, request, response).with_mode(mode),
            );
        }
        Ok(ServiceDescriptor::from_parts(
            parent_scope(full_name).to_string(),
            full_name.to_string(),
            compiled,
        ))
    }

    fn field_kind(&self, from_scope: &str, type_name: &str) -> FieldKind {
        if let Some(scalar) = ScalarKind::from_type_name(type_name) {
            return FieldKind::Scalar(scalar);
        }
        match self.resolve(from_scope, type_name) {
            Some((full_name, SymbolKind::Enum)) => FieldKind::Enum(full_name),
            Some((full_name, _)) => FieldKind::Message(full_name),
            None => {
                warn!(scope = from_scope, type_name, "unresolved field type in bundle");
                FieldKind::Message(type_name.trim_start_matches('.').to_string())
            }
        }
    }

    fn message_reference(&self, from_scope: &str, type_name: &str) -> String {
        match self.resolve(from_scope, type_name) {
            Some((full_name, SymbolKind::Message)) => full_name,
            _ => {
                warn!(scope = from_scope, type_name, "unresolved method type in bundle");
                type_name.trim_start_matches('.').to_string()
            }
        }
    }

    /// Resolve `reference` as seen from inside `from_scope`.
    fn resolve(&self, from_scope: &str, reference: &str) -> Option<(String, SymbolKind)> {
        if let Some(absolute) = reference.strip_prefix('.') {
            return self.type_symbol(absolute);
        }

        let mut scope = from_scope;
        loop {
            let candidate = if scope.is_empty() {
                reference.to_string()
            } else {
                format!("{scope}.{reference}")
            };
            if let Some(found) = self.type_symbol(&candidate) {
                return Some(found);
            }
            if scope.is_empty() {
                return None;
            }
            scope = parent_scope(scope);
        }
    }

    fn type_symbol(&self, full_name: &str) -> Option<(String, SymbolKind)> {
        match self.symbols.get(full_name) {
            Some(kind @ (SymbolKind::Message | SymbolKind::Enum)) => {
                Some((full_name.to_string(), *kind))
            }
            _ => None,
        }
    }
}

fn compile_enum(full_name: &str, values: &Map<String, Value>) -> Result<EnumSchema> {
    let mut compiled = Vec::with_capacity(values.len());
    for (name, number) in values {
        let number = number
            .as_i64()
            .and_then(|number| i32::try_from(number).ok())
            .ok_or_else(|| {
                SchemaError::InvalidBundle(format!(
                    "enum value '{full_name}.{name}' is not a 32-bit integer"
                ))
            })?;
        compiled.push((name.clone(), number));
    }
    Ok(EnumSchema::new(full_name, compiled))
}

fn display_name(full_name: &str) -> &str {
    if full_name.is_empty() {
        "<root>"
    } else {
        full_name
    }
}
