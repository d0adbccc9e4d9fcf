use std::collections::HashMap;

use {
    secrecy::SecretString,
    serde::{Deserialize, Serialize},
};

use crate::error::{OAuthError, Result};

pub const LIVE: &str = "live";
pub const SANDBOX: &str = "sandbox";

/// Environment names with this prefix are routed to a staging host.
pub const STAGING_PREFIX: &str = "stage2";

pub const DEFAULT_SCOPES: &str = "openid email profile address \
     https://uri.paypal.com/services/paypalhere \
     https://uri.paypal.com/services/paypalattributes/business";

/// Which family of provider hosts an environment talks to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvironmentClass {
    Sandbox,
    Production,
    /// Carries the staging host identifier (the environment name).
    Staging(String),
}

impl EnvironmentClass {
    pub fn from_name(name: &str) -> Self {
        if name == SANDBOX {
            Self::Sandbox
        } else if name.starts_with(STAGING_PREFIX) {
            Self::Staging(name.to_string())
        } else {
            Self::Production
        }
    }

    pub fn endpoints(&self) -> ProviderEndpoints {
        match self {
            Self::Sandbox => ProviderEndpoints {
                authorize_url: "https://www.sandbox.paypal.com/signin/authorize".into(),
                token_url: "https://api.sandbox.paypal.com/v1/identity/openidconnect/tokenservice"
                    .into(),
                client_credentials_url: "https://api.sandbox.paypal.com/v1/oauth2/token".into(),
            },
            Self::Production => ProviderEndpoints {
                authorize_url: "https://www.paypal.com/signin/authorize".into(),
                token_url: "https://api.paypal.com/v1/identity/openidconnect/tokenservice".into(),
                client_credentials_url: "https://api.paypal.com/v1/oauth2/token".into(),
            },
            Self::Staging(id) => ProviderEndpoints {
                authorize_url: format!("https://www.{id}.stage.paypal.com/signin/authorize"),
                token_url: format!(
                    "https://www.{id}.stage.paypal.com:12714/v1/identity/openidconnect/tokenservice"
                ),
                client_credentials_url: format!(
                    "https://www.{id}.stage.paypal.com:11888/v1/oauth2/token"
                ),
            },
        }
    }
}

/// Provider URLs used by one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    /// Browser login / consent page.
    pub authorize_url: String,
    /// Authorization-code and refresh-token grants.
    pub token_url: String,
    /// Client-credentials grant used for the scope check.
    pub client_credentials_url: String,
}

/// Raw input to [`EnvironmentStore::configure`]; every field is optional so
/// that validation can name what is missing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_url: Option<String>,
    /// Space-delimited; [`DEFAULT_SCOPES`] when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<String>,
    /// Overrides the hosts implied by the environment name.
    #[serde(skip)]
    pub endpoints: Option<ProviderEndpoints>,
}

/// A validated provider environment.
#[derive(Debug)]
pub struct EnvironmentConfig {
    pub name: String,
    pub client_id: String,
    pub client_secret: SecretString,
    pub return_url: String,
    pub refresh_url: String,
    pub scopes: Vec<String>,
    pub class: EnvironmentClass,
    pub endpoints: ProviderEndpoints,
}

impl EnvironmentConfig {
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}

/// Named environments, built once at startup and read-only afterwards.
#[derive(Debug, Default)]
pub struct EnvironmentStore {
    environments: HashMap<String, EnvironmentConfig>,
}

impl EnvironmentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate `options` and insert (or replace) the environment `name`.
    pub fn configure(&mut self, name: &str, options: EnvironmentOptions) -> Result<()> {
        let client_id = required(name, "clientId", options.client_id)?;
        let secret = required(name, "secret", options.secret)?;
        let return_url = required(name, "returnUrl", options.return_url)?;
        let refresh_url = required(name, "refreshUrl", options.refresh_url)?;

        let scopes = options
            .scopes
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or(DEFAULT_SCOPES)
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let class = EnvironmentClass::from_name(name);
        let endpoints = options.endpoints.unwrap_or_else(|| class.endpoints());

        let replaced = self
            .environments
            .insert(name.to_string(), EnvironmentConfig {
                name: name.to_string(),
                client_id,
                client_secret: SecretString::new(secret),
                return_url,
                refresh_url,
                scopes,
                class,
                endpoints,
            })
            .is_some();
        tracing::debug!(environment = %name, replaced, "configured environment");
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&EnvironmentConfig> {
        self.environments
            .get(name)
            .ok_or_else(|| OAuthError::UnknownEnvironment(urlencoding::encode(name).into_owned()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.environments.contains_key(name)
    }

    /// Configured environment names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.environments.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.environments.is_empty()
    }
}

fn required(environment: &str, field: &'static str, value: Option<String>) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| OAuthError::Configuration {
            environment: environment.to_string(),
            field,
        })
}
