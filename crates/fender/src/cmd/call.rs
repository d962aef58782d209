use std::sync::Arc;
use std::time::Duration;

use fender_client::{CallOptions, ClientConfig, ClientError, FenderClient};
use fender_schema::{SchemaRegistry, ServiceDescriptor, ServiceSet, UnknownFieldPolicy};
use fender_transport::SocketTransport;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::cmd::CallArgs;
use crate::exit::{
    call_exit_code, client_error, transport_error, CliError, CliResult, INTERNAL, SUCCESS, USAGE,
};
use crate::output::{print_json, print_value, OutputFormat};

pub fn run(args: CallArgs, format: OutputFormat) -> CliResult<i32> {
    let deadline = parse_duration(&args.timeout)?;
    let (service_name, _) = split_method(&args.method)?;
    let registry = args.bundle.load()?;
    let request = args.payload.value()?;

    let service = registry.service(service_name).ok_or_else(|| {
        CliError::new(USAGE, format!("unknown service: {service_name}"))
    })?;

    let policy = if args.strict {
        UnknownFieldPolicy::Strict
    } else {
        UnknownFieldPolicy::Permissive
    };
    let config = ClientConfig {
        request_unknown_fields: policy,
        response_unknown_fields: policy,
        default_deadline: Some(deadline),
        ..ClientConfig::default()
    };

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(INTERNAL, format!("failed to start runtime: {err}")))?;

    runtime.block_on(perform(&args, &registry, &service, request, config, format))
}

async fn perform(
    args: &CallArgs,
    registry: &SchemaRegistry,
    service: &Arc<ServiceDescriptor>,
    request: Value,
    config: ClientConfig,
    format: OutputFormat,
) -> CliResult<i32> {
    let (_, method_name) = split_method(&args.method)?;
    let deadline = config.default_deadline;

    let transport = SocketTransport::connect(&args.socket)
        .await
        .map_err(|err| transport_error("connect failed", err))?;
    let transport = Arc::new(transport);
    let client = FenderClient::with_config(Arc::clone(&transport), config)
        .map_err(|err| client_error("client setup failed", err))?;
    let bound = if service.scope().is_empty() {
        client.prepare_service_handlers(&ServiceSet::new(registry.clone(), [Arc::clone(service)]))
    } else {
        client.prepare_scope(registry, service.scope())
    };
    bound.map_err(|err| client_error("bind failed", err))?;

    let handle = client
        .handle(service)
        .map_err(|err| client_error("bind failed", err))?
        .instantiate();
    let options = CallOptions { deadline };
    let outcome = handle.call_with(method_name, request, options).await;
    transport.shutdown();

    match outcome {
        Ok(response) => {
            info!(method = %args.method, "call fulfilled");
            print_value(&response, format);
            Ok(SUCCESS)
        }
        Err(ClientError::Call(err)) => {
            warn!(error = %err, "call failed");
            print_json(&json!({ "error": err.payload() }));
            Ok(call_exit_code(&err))
        }
        Err(err) => Err(client_error("call failed", err)),
    }
}

/// Split `pkg.Service/Method` (a leading `/` is allowed).
fn split_method(input: &str) -> CliResult<(&str, &str)> {
    input
        .trim_start_matches('/')
        .rsplit_once('/')
        .filter(|(service, method)| !service.is_empty() && !method.is_empty())
        .ok_or_else(|| {
            CliError::new(
                USAGE,
                format!("method must look like pkg.Service/Method, got '{input}'"),
            )
        })
}

fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    let (number, scale) = if let Some(num) = input.strip_suffix("ms") {
        (num, 1)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, 1000)
    } else {
        (input, 1000)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration: '{input}'")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }
    Ok(Duration::from_millis(value.saturating_mul(scale)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_durations() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("0s").unwrap_err().code, USAGE);
        assert_eq!(parse_duration("soon").unwrap_err().code, USAGE);
    }

    #[test]
    fn splits_method_routes() {
        assert_eq!(
            split_method("spotify.v1.TrackMetadata/Search").unwrap(),
            ("spotify.v1.TrackMetadata", "Search")
        );
        assert_eq!(
            split_method("/spotify.v1.TrackMetadata/Search").unwrap(),
            ("spotify.v1.TrackMetadata", "Search")
        );
        assert!(split_method("spotify.v1.TrackMetadata.Search").is_err());
        assert!(split_method("Svc/").is_err());
    }
}
