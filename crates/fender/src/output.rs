use std::fmt::Write as _;
use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use fender_schema::{EnumSchema, Label, MessageSchema, ServiceDescriptor, Violations};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Clone, Debug, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
    );
}

/// A JSON body: compact for `json`, indented otherwise.
pub fn print_value(value: &Value, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(value),
        OutputFormat::Table | OutputFormat::Pretty => println!(
            "{}",
            serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
        ),
    }
}

pub fn print_services<'a>(
    services: impl IntoIterator<Item = &'a ServiceDescriptor>,
    format: OutputFormat,
) {
    let services: Vec<&ServiceDescriptor> = services.into_iter().collect();
    match format {
        OutputFormat::Json => print_json(&json!({ "services": services })),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["SERVICE", "METHOD", "REQUEST", "RESPONSE", "MODE"]);
            for service in &services {
                for method in service.methods() {
                    table.add_row(vec![
                        service.full_name().to_string(),
                        method.name().to_string(),
                        method.request_type().to_string(),
                        method.response_type().to_string(),
                        serde_json::to_value(method.mode())
                            .ok()
                            .and_then(|mode| mode.as_str().map(str::to_string))
                            .unwrap_or_default(),
                    ]);
                }
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for service in &services {
                println!("service {}", service.full_name());
                for method in service.methods() {
                    println!(
                        "  rpc {}({}) returns ({})",
                        method.name(),
                        method.request_type(),
                        method.response_type()
                    );
                }
            }
        }
    }
}

pub fn print_violations(violations: &Violations, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(&json!({ "valid": false, "violations": violations })),
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["FIELD", "RULE", "DETAIL"]);
            for violation in violations {
                let path = if violation.field_path.is_empty() {
                    "<root>"
                } else {
                    violation.field_path.as_str()
                };
                table.add_row(vec![path, violation.rule.as_str(), violation.detail.as_str()]);
            }
            println!("{table}");
        }
        OutputFormat::Pretty => {
            for violation in violations {
                println!("{violation}");
            }
        }
    }
}

/// Proto-style rendering of a message definition.
pub fn render_message(message: &MessageSchema) -> String {
    let mut out = format!("message {} {{\n", message.full_name());
    for field in message.fields() {
        let label = match field.label {
            Label::Required => "required ",
            Label::Optional => "",
        };
        let _ = write!(out, "  {label}{} {} = {}", field.kind, field.name, field.number);
        if let Some(default) = &field.default {
            let _ = write!(out, " [default = {default}]");
        }
        out.push_str(";\n");
    }
    out.push('}');
    out
}

pub fn render_enum(enumeration: &EnumSchema) -> String {
    let mut out = format!("enum {} {{\n", enumeration.full_name());
    for (name, number) in enumeration.values() {
        let _ = writeln!(out, "  {name} = {number};");
    }
    out.push('}');
    out
}

pub fn render_service(service: &ServiceDescriptor) -> String {
    let mut out = format!("service {} {{\n", service.full_name());
    for method in service.methods() {
        let _ = writeln!(
            out,
            "  rpc {}({}) returns ({});",
            method.name(),
            method.request_type(),
            method.response_type()
        );
    }
    out.push('}');
    out
}

#[cfg(test)]
mod tests {
    use fender_schema::{FieldDescriptor, FieldKind, ScalarKind};

    use super::*;

    #[test]
    fn renders_message_fields_in_order() {
        let message = MessageSchema::new(
            "spotify.v1.SearchRequest",
            vec![
                FieldDescriptor::new("q", 1, FieldKind::Scalar(ScalarKind::String)).required(),
                FieldDescriptor::new("limit", 2, FieldKind::Scalar(ScalarKind::Int32))
                    .with_default(json!(10)),
            ],
        );
        assert_eq!(
            render_message(&message),
            "message spotify.v1.SearchRequest {\n  required string q = 1;\n  int32 limit = 2 [default = 10];\n}"
        );
    }

    #[test]
    fn renders_enum_values() {
        let kind = EnumSchema::new("a.Kind", vec![("TRACK".into(), 0), ("EPISODE".into(), 1)]);
        assert_eq!(render_enum(&kind), "enum a.Kind {\n  TRACK = 0;\n  EPISODE = 1;\n}");
    }
}
