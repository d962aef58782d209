use crate::cmd::ServicesArgs;
use crate::exit::{schema_error, CliResult, SUCCESS};
use crate::output::{print_services, OutputFormat};

pub fn run(args: ServicesArgs, format: OutputFormat) -> CliResult<i32> {
    let registry = args.bundle.load()?;
    let services = match &args.scope {
        Some(scope) => registry
            .scope(scope)
            .map_err(|err| schema_error("scope lookup failed", err))?
            .services(),
        None => registry.services(),
    };

    print_services(services.iter().map(|service| service.as_ref()), format);
    Ok(SUCCESS)
}
