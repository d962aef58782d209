use std::time::Duration;

use fender_schema::{UnknownFieldPolicy, ValidatorConfig};

/// Default per-call deadline.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// Client-wide call behavior.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Unknown-field policy applied to outgoing requests.
    pub request_unknown_fields: UnknownFieldPolicy,
    /// Unknown-field policy applied to incoming responses.
    pub response_unknown_fields: UnknownFieldPolicy,
    /// Deadline for calls that do not set their own. `None` waits forever.
    pub default_deadline: Option<Duration>,
    /// Maximum message nesting depth validated.
    pub max_depth: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_unknown_fields: UnknownFieldPolicy::Permissive,
            response_unknown_fields: UnknownFieldPolicy::Permissive,
            default_deadline: Some(DEFAULT_DEADLINE),
            max_depth: ValidatorConfig::default().max_depth,
        }
    }
}

impl ClientConfig {
    pub(crate) fn request_validator(&self) -> ValidatorConfig {
        ValidatorConfig {
            unknown_fields: self.request_unknown_fields,
            max_depth: self.max_depth,
        }
    }

    pub(crate) fn response_validator(&self) -> ValidatorConfig {
        ValidatorConfig {
            unknown_fields: self.response_unknown_fields,
            max_depth: self.max_depth,
        }
    }
}

/// Per-call overrides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallOptions {
    /// Overrides [`ClientConfig::default_deadline`] when set.
    pub deadline: Option<Duration>,
}

impl CallOptions {
    pub fn with_deadline(deadline: Duration) -> Self {
        Self {
            deadline: Some(deadline),
        }
    }
}
