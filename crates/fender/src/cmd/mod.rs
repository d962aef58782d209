use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use fender_schema::SchemaRegistry;
use serde_json::Value;
use tracing::debug;

use crate::exit::{schema_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod call;
pub mod describe;
pub mod services;
pub mod validate;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List scopes, services and methods in a bundle.
    Services(ServicesArgs),
    /// Print a message, enum or service definition.
    Describe(DescribeArgs),
    /// Validate a JSON value against a message type.
    Validate(ValidateArgs),
    /// Perform one validated call over a Unix socket.
    Call(CallArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Services(args) => services::run(args, format),
        Command::Describe(args) => describe::run(args, format),
        Command::Validate(args) => validate::run(args, format),
        Command::Call(args) => call::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct BundleArgs {
    /// Schema bundle (protobuf.js JSON).
    #[arg(long, value_name = "FILE", env = "FENDER_BUNDLE")]
    pub bundle: PathBuf,
}

impl BundleArgs {
    pub fn load(&self) -> CliResult<SchemaRegistry> {
        let registry = SchemaRegistry::from_bundle_file(&self.bundle).map_err(|err| {
            schema_error(&format!("failed loading {}", self.bundle.display()), err)
        })?;
        debug!(bundle = %self.bundle.display(), ?registry, "bundle loaded");
        Ok(registry)
    }
}

#[derive(Args, Debug)]
pub struct PayloadArgs {
    /// JSON value inline.
    #[arg(long, conflicts_with = "file")]
    pub json: Option<String>,
    /// Read the JSON value from a file.
    #[arg(long, value_name = "PATH")]
    pub file: Option<PathBuf>,
}

impl PayloadArgs {
    pub fn value(&self) -> CliResult<Value> {
        let (text, origin) = match (&self.json, &self.file) {
            (Some(json), _) => (json.clone(), "--json"),
            (None, Some(path)) => (read_file(path)?, "--file"),
            (None, None) => return Err(CliError::new(USAGE, "one of --json or --file is required")),
        };
        serde_json::from_str(&text)
            .map_err(|err| CliError::new(USAGE, format!("{origin} is not valid JSON: {err}")))
    }
}

/// An unreadable payload file is a bad argument, whatever the I/O cause.
fn read_file(path: &Path) -> CliResult<String> {
    std::fs::read_to_string(path)
        .map_err(|err| CliError::new(USAGE, format!("failed reading {}: {err}", path.display())))
}

#[derive(Args, Debug)]
pub struct ServicesArgs {
    #[command(flatten)]
    pub bundle: BundleArgs,
    /// Only list services declared in this scope (e.g. spotify.v1).
    #[arg(long)]
    pub scope: Option<String>,
}

#[derive(Args, Debug)]
pub struct DescribeArgs {
    #[command(flatten)]
    pub bundle: BundleArgs,
    /// Fully-qualified message, enum or service name.
    pub symbol: String,
}

#[derive(Args, Debug)]
pub struct ValidateArgs {
    #[command(flatten)]
    pub bundle: BundleArgs,
    /// Fully-qualified message name.
    pub message: String,
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Report keys the schema does not declare.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct CallArgs {
    #[command(flatten)]
    pub bundle: BundleArgs,
    /// Socket path to connect to.
    pub socket: PathBuf,
    /// Method as pkg.Service/Method.
    pub method: String,
    #[command(flatten)]
    pub payload: PayloadArgs,
    /// Call deadline (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub timeout: String,
    /// Reject requests and responses with undeclared keys.
    #[arg(long)]
    pub strict: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}
