/// Errors raised while building or querying a schema registry.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The bundle could not be read.
    #[error("failed to load bundle: {0}")]
    LoadFailed(String),

    /// The bundle parsed as JSON but does not describe a valid schema set.
    #[error("invalid bundle: {0}")]
    InvalidBundle(String),

    /// The bundle is not valid JSON.
    #[error("bundle is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The same fully-qualified name was declared twice.
    #[error("duplicate symbol '{0}'")]
    DuplicateSymbol(String),

    /// No namespace with this name exists in the registry.
    #[error("scope '{0}' not found")]
    ScopeNotFound(String),

    /// The scope exists but declares no service with this name.
    #[error("service '{service}' not found in scope '{scope}'")]
    ServiceNotFound { scope: String, service: String },
}

pub type Result<T> = std::result::Result<T, SchemaError>;
