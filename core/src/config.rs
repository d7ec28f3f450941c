//! Connection settings for a `Session`.
//!
//! The settings can be built explicitly or read from the environment:
//!
//! - `STAFFO_SUBDOMAIN` - account subdomain, used to derive the base URL
//! - `STAFFO_BASE_URL` - full base URL, wins over `STAFFO_SUBDOMAIN`
//! - `STAFFO_USERNAME` / `STAFFO_PASSWORD` (required)
//! - `STAFFO_PAGE_POLICY` - `header` (default) or `until-empty`

use std::fmt;

use base64::{engine::general_purpose::STANDARD, Engine as _};

use crate::error::ApiError;
use crate::paginate::PagePolicy;

pub const DEFAULT_API_ROOT: &str = "https://api.staffomaticapp.com/v3";

/// Username and password sent as HTTP basic auth on every request.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    username: String,
    password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Value for the `Authorization` header.
    pub fn authorization(&self) -> String {
        let token = STANDARD.encode(format!("{}:{}", self.username, self.password));
        format!("Basic {token}")
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub base_url: String,
    pub credential: Credential,
    pub page_policy: PagePolicy,
}

impl SessionConfig {
    pub fn new(base_url: impl Into<String>, credential: Credential) -> Self {
        Self {
            base_url: base_url.into(),
            credential,
            page_policy: PagePolicy::default(),
        }
    }

    /// Settings for `https://api.staffomaticapp.com/v3/{subdomain}`.
    pub fn for_subdomain(subdomain: &str, credential: Credential) -> Self {
        Self::new(format!("{DEFAULT_API_ROOT}/{subdomain}"), credential)
    }

    pub fn page_policy(mut self, page_policy: PagePolicy) -> Self {
        self.page_policy = page_policy;
        self
    }

    pub fn from_env() -> Result<Self, ApiError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`SessionConfig::from_env`], reading variables through `lookup`.
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ApiError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.is_empty());
        let require =
            |key: &str| get(key).ok_or_else(|| ApiError::Config(format!("{key} is not set")));

        let base_url = match get("STAFFO_BASE_URL") {
            Some(base_url) => base_url,
            None => {
                let subdomain = require("STAFFO_SUBDOMAIN")?;
                format!("{DEFAULT_API_ROOT}/{subdomain}")
            }
        };
        let credential = Credential::new(require("STAFFO_USERNAME")?, require("STAFFO_PASSWORD")?);
        let page_policy = match get("STAFFO_PAGE_POLICY") {
            Some(raw) => raw.parse()?,
            None => PagePolicy::default(),
        };
        Ok(Self {
            base_url,
            credential,
            page_policy,
        })
    }
}
