use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Protobuf scalar value kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    Double,
    Float,
    Int32,
    Int64,
    Uint32,
    Uint64,
    Sint32,
    Sint64,
    Fixed32,
    Fixed64,
    Sfixed32,
    Sfixed64,
    Bool,
    String,
    Bytes,
}

impl ScalarKind {
    /// Parse a protobuf scalar type name (`int32`, `string`, ...).
    pub fn from_type_name(name: &str) -> Option<Self> {
        let kind = match name {
            "double" => Self::Double,
            "float" => Self::Float,
            "int32" => Self::Int32,
            "int64" => Self::Int64,
            "uint32" => Self::Uint32,
            "uint64" => Self::Uint64,
            "sint32" => Self::Sint32,
            "sint64" => Self::Sint64,
            "fixed32" => Self::Fixed32,
            "fixed64" => Self::Fixed64,
            "sfixed32" => Self::Sfixed32,
            "sfixed64" => Self::Sfixed64,
            "bool" => Self::Bool,
            "string" => Self::String,
            "bytes" => Self::Bytes,
            _ => return None,
        };
        Some(kind)
    }

    /// The protobuf type name of this kind.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Double => "double",
            Self::Float => "float",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Uint32 => "uint32",
            Self::Uint64 => "uint64",
            Self::Sint32 => "sint32",
            Self::Sint64 => "sint64",
            Self::Fixed32 => "fixed32",
            Self::Fixed64 => "fixed64",
            Self::Sfixed32 => "sfixed32",
            Self::Sfixed64 => "sfixed64",
            Self::Bool => "bool",
            Self::String => "string",
            Self::Bytes => "bytes",
        }
    }

    /// Inclusive value range for integer kinds, `None` for everything else.
    pub fn integer_range(self) -> Option<(i128, i128)> {
        match self {
            Self::Int32 | Self::Sint32 | Self::Sfixed32 => {
                Some((i32::MIN as i128, i32::MAX as i128))
            }
            Self::Uint32 | Self::Fixed32 => Some((0, u32::MAX as i128)),
            Self::Int64 | Self::Sint64 | Self::Sfixed64 => {
                Some((i64::MIN as i128, i64::MAX as i128))
            }
            Self::Uint64 | Self::Fixed64 => Some((0, u64::MAX as i128)),
            _ => None,
        }
    }

    /// 64-bit integers may also be written as decimal strings in JSON.
    pub fn accepts_string_integer(self) -> bool {
        matches!(
            self,
            Self::Int64 | Self::Sint64 | Self::Sfixed64 | Self::Uint64 | Self::Fixed64
        )
    }

    /// Whether this kind may be used as a map key.
    pub fn is_valid_map_key(self) -> bool {
        !matches!(self, Self::Double | Self::Float | Self::Bytes)
    }
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a field must be present.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    #[default]
    Optional,
    Required,
}

/// Semantic kind of a field, as a tagged tree.
///
/// Message and enum kinds hold the fully-qualified name of the referenced
/// type; the registry resolves it on demand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Scalar(ScalarKind),
    Message(String),
    Enum(String),
    Repeated(Box<FieldKind>),
    Map {
        key: ScalarKind,
        value: Box<FieldKind>,
    },
}

impl FieldKind {
    /// Shorthand for a repeated field of `element`.
    pub fn repeated(element: FieldKind) -> Self {
        Self::Repeated(Box::new(element))
    }

    /// Shorthand for a map field.
    pub fn map(key: ScalarKind, value: FieldKind) -> Self {
        Self::Map {
            key,
            value: Box::new(value),
        }
    }

    /// Named message/enum types this kind refers to (at most one).
    pub fn referenced_type(&self) -> Option<&str> {
        match self {
            Self::Scalar(_) => None,
            Self::Message(name) | Self::Enum(name) => Some(name),
            Self::Repeated(inner) => inner.referenced_type(),
            Self::Map { value, .. } => value.referenced_type(),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scalar(kind) => write!(f, "{kind}"),
            Self::Message(name) => write!(f, "message {name}"),
            Self::Enum(name) => write!(f, "enum {name}"),
            Self::Repeated(inner) => write!(f, "repeated {inner}"),
            Self::Map { key, value } => write!(f, "map<{key}, {value}>"),
        }
    }
}

/// One declared field of a message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    pub number: u32,
    pub kind: FieldKind,
    pub label: Label,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl FieldDescriptor {
    /// An optional field without a default.
    pub fn new(name: impl Into<String>, number: u32, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            number,
            kind,
            label: Label::Optional,
            default: None,
        }
    }

    /// Mark the field as required.
    pub fn required(mut self) -> Self {
        self.label = Label::Required;
        self
    }

    /// Attach a declared default value.
    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn is_required(&self) -> bool {
        self.label == Label::Required
    }
}

/// A compiled message type: its name and ordered fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MessageSchema {
    full_name: String,
    fields: Vec<FieldDescriptor>,
}

impl MessageSchema {
    pub fn new(full_name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            full_name: full_name.into(),
            fields,
        }
    }

    /// Fully-qualified name, e.g. `spotify.v1.Track`.
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Last segment of the full name.
    pub fn name(&self) -> &str {
        last_segment(&self.full_name)
    }

    /// Fields in declaration order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }
}

/// A compiled enum type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnumSchema {
    full_name: String,
    values: Vec<(String, i32)>,
}

impl EnumSchema {
    pub fn new(full_name: impl Into<String>, values: Vec<(String, i32)>) -> Self {
        Self {
            full_name: full_name.into(),
            values,
        }
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn name(&self) -> &str {
        last_segment(&self.full_name)
    }

    /// Declared `(name, number)` pairs in declaration order.
    pub fn values(&self) -> &[(String, i32)] {
        &self.values
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.values.iter().any(|(value, _)| value == name)
    }

    pub fn contains_number(&self, number: i64) -> bool {
        self.values
            .iter()
            .any(|(_, value)| i64::from(*value) == number)
    }
}

pub(crate) fn last_segment(full_name: &str) -> &str {
    full_name.rsplit('.').next().unwrap_or(full_name)
}

pub(crate) fn parent_scope(full_name: &str) -> &str {
    full_name.rsplit_once('.').map_or("", |(scope, _)| scope)
}
