//! Structural validation of JSON values against compiled message schemas.
//!
//! Values follow the protobuf JSON mapping: 64-bit integers may be decimal
//! strings, floating point kinds accept `"NaN"`/`"Infinity"`/`"-Infinity"`,
//! enums accept a value name or number, and `null` counts as absent.
//!
//! Violations are reported in encounter order: declared fields in
//! declaration order, depth first, followed by undeclared keys of the same
//! object when the strict policy is active.

use std::fmt;

use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::config::{UnknownFieldPolicy, ValidatorConfig};
use crate::node::{FieldKind, MessageSchema, ScalarKind};
use crate::registry::SchemaRegistry;

/// The rule a value broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    MissingField,
    TypeMismatch,
    UnknownField,
    OutOfRange,
    UnknownEnumValue,
    UnresolvedType,
    MaxDepthExceeded,
}

impl Rule {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::MissingField => "missing_field",
            Self::TypeMismatch => "type_mismatch",
            Self::UnknownField => "unknown_field",
            Self::OutOfRange => "out_of_range",
            Self::UnknownEnumValue => "unknown_enum_value",
            Self::UnresolvedType => "unresolved_type",
            Self::MaxDepthExceeded => "max_depth_exceeded",
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structural problem found in a value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Dotted path with `[index]`/`[key]` suffixes, e.g. `results[0].title`.
    /// Empty for the root value.
    pub field_path: String,
    pub rule: Rule,
    pub detail: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.field_path.is_empty() {
            write!(f, "<root>: {} ({})", self.rule, self.detail)
        } else {
            write!(f, "{}: {} ({})", self.field_path, self.rule, self.detail)
        }
    }
}

/// Ordered, non-empty-on-failure list of violations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Violations(Vec<Violation>);

impl Violations {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Violation> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Violation] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Violation> {
        self.0
    }

    /// Violations at exactly `path`.
    pub fn at<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a Violation> + 'a {
        self.0.iter().filter(move |violation| violation.field_path == path)
    }

    /// JSON array of `{field_path, rule, detail}` objects.
    pub fn as_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<Vec<Violation>> for Violations {
    fn from(violations: Vec<Violation>) -> Self {
        Self(violations)
    }
}

impl<'a> IntoIterator for &'a Violations {
    type Item = &'a Violation;
    type IntoIter = std::slice::Iter<'a, Violation>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Violations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, violation) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{violation}")?;
        }
        Ok(())
    }
}

/// Outcome of validating one value. Never both valid and invalid.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult<'v> {
    /// The value conforms; it is handed back untouched.
    Valid(&'v Value),
    Invalid(Violations),
}

impl<'v> ValidationResult<'v> {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid(_))
    }

    pub fn violations(&self) -> Option<&Violations> {
        match self {
            Self::Valid(_) => None,
            Self::Invalid(violations) => Some(violations),
        }
    }

    pub fn into_result(self) -> Result<&'v Value, Violations> {
        match self {
            Self::Valid(value) => Ok(value),
            Self::Invalid(violations) => Err(violations),
        }
    }
}

/// Validates values against schemas from one registry snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'r> {
    registry: &'r SchemaRegistry,
    config: ValidatorConfig,
}

impl<'r> Validator<'r> {
    /// Validator with the permissive default configuration.
    pub fn new(registry: &'r SchemaRegistry) -> Self {
        Self::with_config(registry, ValidatorConfig::default())
    }

    pub fn with_config(registry: &'r SchemaRegistry, config: ValidatorConfig) -> Self {
        Self { registry, config }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    /// Classify `value` against `schema`.
    pub fn validate<'v>(&self, schema: &MessageSchema, value: &'v Value) -> ValidationResult<'v> {
        let mut walk = Walk {
            path: String::new(),
            violations: Vec::new(),
        };
        self.check_message(schema, value, 0, &mut walk);

        if walk.violations.is_empty() {
            ValidationResult::Valid(value)
        } else {
            ValidationResult::Invalid(Violations(walk.violations))
        }
    }

    fn check_message(&self, schema: &MessageSchema, value: &Value, depth: usize, walk: &mut Walk) {
        if depth > self.config.max_depth {
            walk.report(
                Rule::MaxDepthExceeded,
                format!("message nesting deeper than {}", self.config.max_depth),
            );
            return;
        }

        let Some(object) = value.as_object() else {
            walk.report(
                Rule::TypeMismatch,
                format!("expected message {}, got {}", schema.full_name(), json_kind(value)),
            );
            return;
        };

        for field in schema.fields() {
            let mark = walk.enter_field(&field.name);
            match object.get(&field.name) {
                None | Some(Value::Null) => {
                    if field.is_required() {
                        walk.report(Rule::MissingField, "required field is absent".to_string());
                    }
                }
                Some(present) => self.check_kind(&field.kind, present, depth, walk),
            }
            walk.leave(mark);
        }

        if self.config.unknown_fields == UnknownFieldPolicy::Strict {
            self.check_unknown_fields(schema, object, walk);
        }
    }

    fn check_unknown_fields(&self, schema: &MessageSchema, object: &Map<String, Value>, walk: &mut Walk) {
        for key in object.keys() {
            if !schema.has_field(key) {
                let mark = walk.enter_field(key);
                walk.report(
                    Rule::UnknownField,
                    format!("field is not declared by {}", schema.full_name()),
                );
                walk.leave(mark);
            }
        }
    }

    fn check_kind(&self, kind: &FieldKind, value: &Value, depth: usize, walk: &mut Walk) {
        match kind {
            FieldKind::Scalar(scalar) => {
                if let Err((rule, detail)) = check_scalar(*scalar, value) {
                    walk.report(rule, detail);
                }
            }
            FieldKind::Message(name) => match self.registry.message(name) {
                Some(schema) => self.check_message(&schema, value, depth + 1, walk),
                None => walk.report(
                    Rule::UnresolvedType,
                    format!("message type {name} is not registered"),
                ),
            },
            FieldKind::Enum(name) => self.check_enum(name, value, walk),
            FieldKind::Repeated(element) => {
                let Some(items) = value.as_array() else {
                    walk.report(
                        Rule::TypeMismatch,
                        format!("expected {kind}, got {}", json_kind(value)),
                    );
                    return;
                };
                for (index, item) in items.iter().enumerate() {
                    let mark = walk.enter_index(&index.to_string());
                    self.check_kind(element, item, depth, walk);
                    walk.leave(mark);
                }
            }
            FieldKind::Map { key, value: entry } => {
                let Some(entries) = value.as_object() else {
                    walk.report(
                        Rule::TypeMismatch,
                        format!("expected {kind}, got {}", json_kind(value)),
                    );
                    return;
                };
                for (map_key, item) in entries {
                    let mark = walk.enter_index(map_key);
                    if let Err((rule, detail)) = check_map_key(*key, map_key) {
                        walk.report(rule, detail);
                    }
                    self.check_kind(entry, item, depth, walk);
                    walk.leave(mark);
                }
            }
        }
    }

    fn check_enum(&self, name: &str, value: &Value, walk: &mut Walk) {
        let Some(schema) = self.registry.enumeration(name) else {
            walk.report(
                Rule::UnresolvedType,
                format!("enum type {name} is not registered"),
            );
            return;
        };

        let known = match value {
            Value::String(text) => schema.contains_name(text),
            Value::Number(number) => match number.as_i64() {
                Some(number) => schema.contains_number(number),
                None => {
                    walk.report(
                        Rule::TypeMismatch,
                        format!("expected enum {name}, got non-integral number"),
                    );
                    return;
                }
            },
            other => {
                walk.report(
                    Rule::TypeMismatch,
                    format!("expected enum {name}, got {}", json_kind(other)),
                );
                return;
            }
        };

        if !known {
            walk.report(
                Rule::UnknownEnumValue,
                format!("{value} is not a value of {name}"),
            );
        }
    }
}

/// Path buffer and collected violations for one validation walk.
struct Walk {
    path: String,
    violations: Vec<Violation>,
}

impl Walk {
    fn enter_field(&mut self, name: &str) -> usize {
        let mark = self.path.len();
        if !self.path.is_empty() {
            self.path.push('.');
        }
        self.path.push_str(name);
        mark
    }

    fn enter_index(&mut self, index: &str) -> usize {
        let mark = self.path.len();
        self.path.push('[');
        self.path.push_str(index);
        self.path.push(']');
        mark
    }

    fn leave(&mut self, mark: usize) {
        self.path.truncate(mark);
    }

    fn report(&mut self, rule: Rule, detail: String) {
        self.violations.push(Violation {
            field_path: self.path.clone(),
            rule,
            detail,
        });
    }
}

type Check = Result<(), (Rule, String)>;

fn check_scalar(kind: ScalarKind, value: &Value) -> Check {
    let ok = match kind {
        ScalarKind::String | ScalarKind::Bytes => value.is_string(),
        ScalarKind::Bool => value.is_boolean(),
        ScalarKind::Double | ScalarKind::Float => match value {
            Value::Number(_) => true,
            Value::String(text) => matches!(text.as_str(), "NaN" | "Infinity" | "-Infinity"),
            _ => false,
        },
        _ => return check_integer(kind, value),
    };

    if ok {
        Ok(())
    } else {
        Err(mismatch(kind, value))
    }
}

fn check_integer(kind: ScalarKind, value: &Value) -> Check {
    let parsed = match value {
        Value::Number(number) => integral(number),
        Value::String(text) if kind.accepts_string_integer() => text.parse::<i128>().ok(),
        _ => return Err(mismatch(kind, value)),
    };

    let Some(parsed) = parsed else {
        return Err((
            Rule::TypeMismatch,
            format!("expected {kind}, got non-integral {}", json_kind(value)),
        ));
    };
    check_range(kind, parsed)
}

fn check_map_key(kind: ScalarKind, key: &str) -> Check {
    match kind {
        ScalarKind::String => Ok(()),
        ScalarKind::Bool if key == "true" || key == "false" => Ok(()),
        _ if kind.integer_range().is_some() => match key.parse::<i128>() {
            Ok(parsed) => check_range(kind, parsed),
            Err(_) => Err((
                Rule::TypeMismatch,
                format!("map key '{key}' is not a valid {kind}"),
            )),
        },
        _ => Err((
            Rule::TypeMismatch,
            format!("map key '{key}' is not a valid {kind}"),
        )),
    }
}

fn check_range(kind: ScalarKind, value: i128) -> Check {
    match kind.integer_range() {
        Some((min, max)) if value < min || value > max => Err((
            Rule::OutOfRange,
            format!("{value} is outside the {kind} range [{min}, {max}]"),
        )),
        _ => Ok(()),
    }
}

fn integral(number: &Number) -> Option<i128> {
    if let Some(value) = number.as_i64() {
        return Some(i128::from(value));
    }
    if let Some(value) = number.as_u64() {
        return Some(i128::from(value));
    }
    let value = number.as_f64()?;
    if value.is_finite() && value.fract() == 0.0 {
        // Saturates far outside every protobuf range, so range checks still fire.
        Some(value as i128)
    } else {
        None
    }
}

fn mismatch(kind: ScalarKind, value: &Value) -> (Rule, String) {
    (
        Rule::TypeMismatch,
        format!("expected {kind}, got {}", json_kind(value)),
    )
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::node::{EnumSchema, FieldDescriptor};

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builder()
            .enumeration(EnumSchema::new(
                "spotify.v1.Kind",
                vec![("TRACK".into(), 0), ("ALBUM".into(), 1)],
            ))
            .message(MessageSchema::new(
                "spotify.v1.Artist",
                vec![FieldDescriptor::new("name", 1, FieldKind::Scalar(ScalarKind::String)).required()],
            ))
            .message(MessageSchema::new(
                "spotify.v1.Track",
                vec![
                    FieldDescriptor::new("title", 1, FieldKind::Scalar(ScalarKind::String)).required(),
                    FieldDescriptor::new("duration_ms", 2, FieldKind::Scalar(ScalarKind::Uint32)),
                    FieldDescriptor::new("plays", 3, FieldKind::Scalar(ScalarKind::Int64)),
                    FieldDescriptor::new("kind", 4, FieldKind::Enum("spotify.v1.Kind".into())),
                    FieldDescriptor::new("artist", 5, FieldKind::Message("spotify.v1.Artist".into())),
                    FieldDescriptor::new(
                        "ratings",
                        6,
                        FieldKind::map(ScalarKind::Int32, FieldKind::Scalar(ScalarKind::Double)),
                    ),
                ],
            ))
            .message(MessageSchema::new(
                "spotify.v1.SearchResponse",
                vec![FieldDescriptor::new(
                    "results",
                    1,
                    FieldKind::repeated(FieldKind::Message("spotify.v1.Track".into())),
                )],
            ))
            .message(MessageSchema::new(
                "spotify.v1.Node",
                vec![FieldDescriptor::new("child", 1, FieldKind::Message("spotify.v1.Node".into()))],
            ))
            .build()
            .unwrap()
    }

    fn schema(registry: &SchemaRegistry, name: &str) -> std::sync::Arc<MessageSchema> {
        registry.message(name).unwrap()
    }

    #[test]
    fn valid_value_is_returned_unchanged() {
        let registry = registry();
        let track = schema(&registry, "spotify.v1.Track");
        let value = json!({
            "title": "Hot N Cold",
            "duration_ms": 220000,
            "plays": "9007199254740993",
            "kind": "TRACK",
            "artist": { "name": "Katy Perry" },
            "ratings": { "5": 4.5, "-1": "NaN" }
        });
        let before = value.clone();

        let result = Validator::new(&registry).validate(&track, &value);

        match result {
            ValidationResult::Valid(accepted) => assert!(std::ptr::eq(accepted, &value)),
            ValidationResult::Invalid(violations) => panic!("unexpected violations: {violations}"),
        }
        assert_eq!(value, before);
    }

    #[test]
    fn missing_required_field_reported_once() {
        let registry = registry();
        let track = schema(&registry, "spotify.v1.Track");

        let value = json!({ "duration_ms": 1 });
        let result = Validator::new(&registry).validate(&track, &value);
        let violations = result.violations().unwrap();

        assert_eq!(violations.len(), 1);
        let violation = &violations.as_slice()[0];
        assert_eq!(violation.field_path, "title");
        assert_eq!(violation.rule, Rule::MissingField);
    }

    #[test]
    fn null_counts_as_absent() {
        let registry = registry();
        let track = schema(&registry, "spotify.v1.Track");
        let validator = Validator::new(&registry);

        assert!(validator
            .validate(&track, &json!({ "title": "x", "artist": null }))
            .is_valid());
        let value = json!({ "title": null });
        let result = validator.validate(&track, &value);
        assert_eq!(result.violations().unwrap().as_slice()[0].rule, Rule::MissingField);
    }

    #[test]
    fn nested_and_repeated_paths_are_prefixed() {
        let registry = registry();
        let response = schema(&registry, "spotify.v1.SearchResponse");
        let value = json!({
            "results": [
                { "title": "ok" },
                { "artist": {} },
                { "title": 7 }
            ]
        });

        let violations = Validator::new(&registry)
            .validate(&response, &value)
            .into_result()
            .unwrap_err();
        let summary: Vec<(&str, Rule)> = violations
            .iter()
            .map(|v| (v.field_path.as_str(), v.rule))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("results[1].title", Rule::MissingField),
                ("results[1].artist.name", Rule::MissingField),
                ("results[2].title", Rule::TypeMismatch),
            ]
        );
        assert_eq!(
            violations.as_slice()[2].detail,
            "expected string, got number"
        );
    }

    #[test]
    fn repeated_field_requires_array() {
        let registry = registry();
        let response = schema(&registry, "spotify.v1.SearchResponse");
        let value = json!({ "results": {} });
        let result = Validator::new(&registry).validate(&response, &value);
        let violation = &result.violations().unwrap().as_slice()[0];
        assert_eq!(violation.field_path, "results");
        assert_eq!(
            violation.detail,
            "expected repeated message spotify.v1.Track, got object"
        );
    }

    #[test]
    fn integer_and_map_key_checks() {
        let registry = registry();
        let track = schema(&registry, "spotify.v1.Track");
        let value = json!({
            "title": "t",
            "duration_ms": -5,
            "plays": 1.5,
            "ratings": { "abc": 1.0, "7": "high" }
        });

        let violations = Validator::new(&registry)
            .validate(&track, &value)
            .into_result()
            .unwrap_err();
        let summary: Vec<(&str, Rule)> = violations
            .iter()
            .map(|v| (v.field_path.as_str(), v.rule))
            .collect();

        assert_eq!(
            summary,
            vec![
                ("duration_ms", Rule::OutOfRange),
                ("plays", Rule::TypeMismatch),
                ("ratings[abc]", Rule::TypeMismatch),
                ("ratings[7]", Rule::TypeMismatch),
            ]
        );
    }

    #[test]
    fn thirty_two_bit_integers_reject_strings() {
        let registry = registry();
        let track = schema(&registry, "spotify.v1.Track");
        let value = json!({ "title": "t", "duration_ms": "5" });
        let result = Validator::new(&registry).validate(&track, &value);
        assert_eq!(result.violations().unwrap().as_slice()[0].rule, Rule::TypeMismatch);
    }

    #[test]
    fn enum_values_by_name_or_number() {
        let registry = registry();
        let track = schema(&registry, "spotify.v1.Track");
        let validator = Validator::new(&registry);

        assert!(validator.validate(&track, &json!({ "title": "t", "kind": 1 })).is_valid());
        let value = json!({ "title": "t", "kind": "PODCAST" });
        let result = validator.validate(&track, &value);
        assert_eq!(
            result.violations().unwrap().as_slice()[0].rule,
            Rule::UnknownEnumValue
        );
    }

    #[test]
    fn unknown_fields_follow_policy() {
        let registry = registry();
        let track = schema(&registry, "spotify.v1.Track");
        let value = json!({ "title": "t", "explicit": true, "artist": { "name": "a", "born": 1984 } });

        assert!(Validator::new(&registry).validate(&track, &value).is_valid());

        let strict = Validator::with_config(&registry, ValidatorConfig::strict());
        let violations = strict.validate(&track, &value).into_result().unwrap_err();
        let summary: Vec<(&str, Rule)> = violations
            .iter()
            .map(|v| (v.field_path.as_str(), v.rule))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("artist.born", Rule::UnknownField),
                ("explicit", Rule::UnknownField),
            ]
        );
    }

    #[test]
    fn non_object_root_is_a_single_mismatch() {
        let registry = registry();
        let track = schema(&registry, "spotify.v1.Track");
        let violations = Validator::new(&registry)
            .validate(&track, &json!(["title"]))
            .into_result()
            .unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations.as_slice()[0].field_path, "");
        assert_eq!(violations.as_slice()[0].rule, Rule::TypeMismatch);
    }

    #[test]
    fn recursion_stops_at_max_depth() {
        let registry = registry();
        let node = schema(&registry, "spotify.v1.Node");
        let config = ValidatorConfig {
            max_depth: 2,
            ..ValidatorConfig::default()
        };
        let value = json!({ "child": { "child": { "child": { "child": {} } } } });

        let violations = Validator::with_config(&registry, config)
            .validate(&node, &value)
            .into_result()
            .unwrap_err();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations.as_slice()[0].field_path, "child.child.child");
        assert_eq!(violations.as_slice()[0].rule, Rule::MaxDepthExceeded);
    }

    #[test]
    fn unregistered_nested_type_is_reported() {
        let registry = SchemaRegistry::builder()
            .message(MessageSchema::new(
                "a.Holder",
                vec![FieldDescriptor::new("ghost", 1, FieldKind::Message("a.Ghost".into()))],
            ))
            .build()
            .unwrap();
        let holder = schema(&registry, "a.Holder");
        let value = json!({ "ghost": {} });
        let result = Validator::new(&registry).validate(&holder, &value);
        assert_eq!(
            result.violations().unwrap().as_slice()[0].rule,
            Rule::UnresolvedType
        );
    }

    #[test]
    fn violations_render_as_json_and_text() {
        let violations = Violations::from(vec![Violation {
            field_path: "q".into(),
            rule: Rule::MissingField,
            detail: "required field is absent".into(),
        }]);

        assert_eq!(
            violations.as_json(),
            json!([{ "field_path": "q", "rule": "missing_field", "detail": "required field is absent" }])
        );
        assert_eq!(violations.to_string(), "q: missing_field (required field is absent)");
        assert_eq!(violations.at("q").count(), 1);
    }
}
