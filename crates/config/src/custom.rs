use {
    base64::{Engine as _, engine::general_purpose::STANDARD},
    serde::{Deserialize, Serialize},
    tokenrelay_oauth::EnvironmentOptions,
};

use crate::ConfigError;

/// One entry of a custom environment token: a named environment, usually a
/// staging host, whose URLs default to this server's when omitted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomEnvironment {
    pub name: String,
    pub client_id: String,
    pub secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scopes: Option<String>,
}

impl CustomEnvironment {
    /// Entries sharing one set of credentials, one per name.
    pub fn for_names(names: &[&str], client_id: &str, secret: &str) -> Vec<Self> {
        names
            .iter()
            .map(|name| name.trim())
            .filter(|name| !name.is_empty())
            .map(|name| Self {
                name: name.to_string(),
                client_id: client_id.to_string(),
                secret: secret.to_string(),
                return_url: None,
                refresh_url: None,
                scopes: None,
            })
            .collect()
    }

    /// Base64 of the JSON array, as accepted in `CUSTOM_ENVIRONMENTS`.
    pub fn encode_all(environments: &[Self]) -> Result<String, ConfigError> {
        let json = serde_json::to_vec(environments)
            .map_err(|e| ConfigError::CustomEnvironments(e.to_string()))?;
        Ok(STANDARD.encode(json))
    }

    /// Accepts either an array of entries or a single entry object.
    pub fn decode_all(token: &str) -> Result<Vec<Self>, ConfigError> {
        let json = STANDARD
            .decode(token.trim())
            .map_err(|e| ConfigError::CustomEnvironments(e.to_string()))?;
        let value: serde_json::Value = serde_json::from_slice(&json)
            .map_err(|e| ConfigError::CustomEnvironments(e.to_string()))?;

        let parsed = if value.is_array() {
            serde_json::from_value(value)
        } else {
            serde_json::from_value(value).map(|single| vec![single])
        };
        parsed.map_err(|e| ConfigError::CustomEnvironments(e.to_string()))
    }

    pub(crate) fn into_options(
        self,
        default_return_url: &str,
        default_refresh_url: &str,
        default_scopes: Option<&str>,
    ) -> (String, EnvironmentOptions) {
        let options = EnvironmentOptions {
            client_id: Some(self.client_id),
            secret: Some(self.secret),
            return_url: Some(
                self.return_url
                    .unwrap_or_else(|| default_return_url.to_string()),
            ),
            refresh_url: Some(
                self.refresh_url
                    .unwrap_or_else(|| default_refresh_url.to_string()),
            ),
            scopes: self.scopes.or_else(|| default_scopes.map(str::to_string)),
            endpoints: None,
        };
        (self.name, options)
    }
}
