/// How the validator treats object keys that the schema does not declare.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UnknownFieldPolicy {
    /// Undeclared keys are ignored, tolerating newer peers.
    #[default]
    Permissive,
    /// Every undeclared key is reported as `unknown_field`.
    Strict,
}

/// Controls message validation behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatorConfig {
    /// Treatment of keys not declared by the schema.
    pub unknown_fields: UnknownFieldPolicy,
    /// Maximum nested message depth walked before reporting `max_depth_exceeded`.
    pub max_depth: usize,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            unknown_fields: UnknownFieldPolicy::Permissive,
            max_depth: 64,
        }
    }
}

impl ValidatorConfig {
    /// Default configuration with the strict unknown-field policy.
    pub fn strict() -> Self {
        Self {
            unknown_fields: UnknownFieldPolicy::Strict,
            ..Self::default()
        }
    }
}

/// Limits applied when loading a schema bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleConfig {
    /// Maximum bundle size in bytes.
    pub max_bundle_size: usize,
    /// Maximum namespace/message nesting depth.
    pub max_nesting_depth: usize,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            max_bundle_size: 16 * 1024 * 1024,
            max_nesting_depth: 32,
        }
    }
}
