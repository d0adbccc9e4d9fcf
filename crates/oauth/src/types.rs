use {
    base64::{Engine as _, engine::general_purpose::STANDARD},
    serde::Deserialize,
};

use crate::query;

/// Query parameters the provider sends back to the return URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

/// Query parameters presented to the refresh URL.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RefreshQuery {
    /// Sealed `[environment, refreshToken]` payload.
    pub token: Option<String>,
}

/// Result of a successful code exchange, handed to the caller and never
/// stored server-side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenInformation {
    pub access_token: String,
    /// Seconds until the access token expires.
    pub expires_in: u64,
    /// Refresh URL with the sealed refresh token in its `token` parameter.
    pub refresh_url: String,
    pub environment: String,
}

impl TokenInformation {
    /// Name of the opaque destination parameter.
    pub const SDK_TOKEN_PARAM: &'static str = "sdk_token";

    /// Append the token as plain query parameters
    /// (`access_token`, `expires_in`, `refresh_url`, `env`).
    pub fn append_as_query(&self, final_url: &str) -> String {
        query::append_query(final_url, &[
            ("access_token", self.access_token.as_str()),
            ("expires_in", self.expires_in.to_string().as_str()),
            ("refresh_url", self.refresh_url.as_str()),
            ("env", self.environment.as_str()),
        ])
    }

    /// Append the token as a single `sdk_token=<env>:<base64 json>` parameter.
    pub fn append_as_sdk_token(&self, final_url: &str) -> String {
        let payload = serde_json::json!([self.access_token, self.expires_in, self.refresh_url]);
        let fragment = format!(
            "{}={}:{}",
            Self::SDK_TOKEN_PARAM,
            urlencoding::encode(&self.environment),
            urlencoding::encode(&STANDARD.encode(payload.to_string())),
        );
        query::append_raw(final_url, &fragment)
    }

    /// Inverse of the `sdk_token` value (already percent-decoded).
    pub fn decode_sdk_token(value: &str) -> Option<Self> {
        let (environment, encoded) = value.rsplit_once(':')?;
        let json = STANDARD.decode(encoded).ok()?;
        let (access_token, expires_in, refresh_url): (String, u64, String) =
            serde_json::from_slice(&json).ok()?;
        Some(Self {
            access_token,
            expires_in,
            refresh_url,
            environment: environment.to_string(),
        })
    }
}

/// Fields of a token-endpoint response this crate looks at.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: u64,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ClientMetadataResponse {
    pub client_metadata: Option<ClientMetadata>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ClientMetadata {
    pub scopes: Option<Vec<String>>,
}
