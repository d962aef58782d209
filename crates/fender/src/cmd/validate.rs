use fender_schema::{UnknownFieldPolicy, ValidationResult, Validator, ValidatorConfig};
use serde_json::json;

use crate::cmd::ValidateArgs;
use crate::exit::{CliError, CliResult, DATA_INVALID, SUCCESS, USAGE};
use crate::output::{print_json, print_violations, OutputFormat};

pub fn run(args: ValidateArgs, format: OutputFormat) -> CliResult<i32> {
    let registry = args.bundle.load()?;
    let schema = registry
        .message(&args.message)
        .ok_or_else(|| CliError::new(USAGE, format!("unknown message type: {}", args.message)))?;
    let value = args.payload.value()?;

    let config = ValidatorConfig {
        unknown_fields: if args.strict {
            UnknownFieldPolicy::Strict
        } else {
            UnknownFieldPolicy::Permissive
        },
        ..ValidatorConfig::default()
    };

    match Validator::with_config(&registry, config).validate(&schema, &value) {
        ValidationResult::Valid(_) => {
            match format {
                OutputFormat::Json => print_json(&json!({ "valid": true })),
                OutputFormat::Table | OutputFormat::Pretty => println!("valid"),
            }
            Ok(SUCCESS)
        }
        ValidationResult::Invalid(violations) => {
            print_violations(&violations, format);
            Ok(DATA_INVALID)
        }
    }
}
