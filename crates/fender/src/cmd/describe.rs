use serde_json::json;

use crate::cmd::DescribeArgs;
use crate::exit::{CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_json, render_enum, render_message, render_service, OutputFormat};

pub fn run(args: DescribeArgs, format: OutputFormat) -> CliResult<i32> {
    let registry = args.bundle.load()?;
    let symbol = args.symbol.as_str();

    let (json, text) = if let Some(message) = registry.message(symbol) {
        (json!({ "kind": "message", "message": *message }), render_message(&message))
    } else if let Some(enumeration) = registry.enumeration(symbol) {
        (json!({ "kind": "enum", "enum": *enumeration }), render_enum(&enumeration))
    } else if let Some(service) = registry.service(symbol) {
        (json!({ "kind": "service", "service": *service }), render_service(&service))
    } else {
        return Err(CliError::new(USAGE, format!("unknown symbol: {symbol}")));
    };

    match format {
        OutputFormat::Json => print_json(&json),
        OutputFormat::Table | OutputFormat::Pretty => println!("{text}"),
    }
    Ok(SUCCESS)
}
