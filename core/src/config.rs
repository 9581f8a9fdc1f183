//! Client configuration.
//!
//! `OktaConfig` is built with `new` plus `with_*` setters. The library never
//! reads the environment by itself; `from_env` is an opt-in helper for
//! binaries that want `OKTA_*` variables. Nothing is validated against the
//! network.

use std::time::Duration;

use crate::error::ApiError;

pub const DEFAULT_DOMAIN: &str = "okta.com";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OktaConfig {
    /// Tenant subdomain, e.g. `acme` in `acme.okta.com`.
    pub org: String,
    pub domain: String,
    /// Long-lived `SSWS` API token.
    pub api_token: Option<String>,
    /// Overrides `https://{org}.{domain}`; mostly for pointing the client at
    /// a local mock provider.
    pub base_url: Option<String>,
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl OktaConfig {
    pub fn new(org: &str) -> Self {
        Self {
            org: org.to_string(),
            domain: DEFAULT_DOMAIN.to_string(),
            api_token: None,
            base_url: None,
            timeout: None,
        }
    }

    pub fn with_domain(mut self, domain: &str) -> Self {
        self.domain = domain.to_string();
        self
    }

    pub fn with_api_token(mut self, token: &str) -> Self {
        self.api_token = Some(token.to_string());
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.to_string());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Caller convenience: read `OKTA_ORG` (required), `OKTA_DOMAIN`,
    /// `OKTA_API_TOKEN`, `OKTA_BASE_URL` and `OKTA_TIMEOUT_SECS` from the
    /// process environment. No client constructor calls this.
    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env` with an injectable variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let org = var("OKTA_ORG").ok_or_else(|| ApiError::Config("OKTA_ORG is not set".to_string()))?;
        let mut config = Self::new(org.trim());
        if let Some(domain) = var("OKTA_DOMAIN") {
            config = config.with_domain(domain.trim());
        }
        if let Some(token) = var("OKTA_API_TOKEN") {
            config = config.with_api_token(token.trim());
        }
        if let Some(base_url) = var("OKTA_BASE_URL") {
            config = config.with_base_url(base_url.trim());
        }
        if let Some(secs) = var("OKTA_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|_| ApiError::Config(format!("OKTA_TIMEOUT_SECS is not a number: {secs}")))?;
            config = config.with_timeout(Duration::from_secs(secs));
        }
        Ok(config)
    }

    /// Host the session cookie is scoped to.
    pub fn cookie_domain(&self) -> String {
        format!("{}.{}", self.org, self.domain)
    }

    /// Absolute API prefix every endpoint is appended to, always ending in `/`.
    pub fn api_base(&self) -> String {
        let root = match &self.base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("https://{}", self.cookie_domain()),
        };
        format!("{root}/api/v1/")
    }
}
