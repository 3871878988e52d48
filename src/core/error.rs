//! Typed errors raised by the provider layer.
//!
//! Everything here is converted into degraded-but-valid data by the
//! resilience resolver before it can reach a caller; only
//! [`ProviderError::MissingCredential`] is allowed to abort startup.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    /// No API key configured. Fatal at construction time, never per-call.
    #[error("no API key configured for {provider}; set {env_var} or add it to the config file")]
    MissingCredential {
        provider: &'static str,
        env_var: &'static str,
    },

    /// The provider answered with a non-2xx status.
    #[error("provider request failed with HTTP {status}: {message}")]
    Request { status: u16, message: String },

    /// The request exceeded its wall-clock bound.
    #[error("provider request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The response parsed but lacked the fields we need.
    #[error("provider response unusable: {0}")]
    Unusable(String),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}

impl ProviderError {
    /// True when the failure is an authentication rejection rather than a
    /// transient network condition.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ProviderError::Request { status: 400 | 401 | 403, .. })
    }

    /// True when the provider is signalling quota exhaustion.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ProviderError::Request { status: 429, .. })
    }
}
