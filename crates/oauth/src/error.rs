use thiserror::Error;

/// Failures of the sealed refresh-token codec.
#[derive(Debug, Error)]
pub enum CipherError {
    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    /// The system random source could not produce salt or IV bytes.
    #[error("random source unavailable: {0}")]
    Entropy(String),

    #[error("malformed sealed blob: {0}")]
    MalformedBlob(String),

    /// Tag mismatch: wrong passphrase or a modified blob.
    #[error("HMAC mismatch")]
    Authentication,

    /// Only reachable after the tag verified, so it points at an internal inconsistency.
    #[error("decryption failed: {0}")]
    Decryption(String),
}

/// Errors surfaced by the authorization flow.
#[derive(Debug, Error)]
pub enum OAuthError {
    #[error("missing {field} for environment \"{environment}\"")]
    Configuration {
        environment: String,
        field: &'static str,
    },

    #[error("invalid environment {0}")]
    UnknownEnvironment(String),

    #[error("app secure identifier is required to complete authentication")]
    MissingSecret,

    #[error("authorization code is missing from the callback")]
    MissingCode,

    /// The provider redirected back with `error` / `error_description`.
    #[error("login error from identity provider: {code}: {description}")]
    Provider { code: String, description: String },

    #[error("the \"state\" parameter is invalid: {0}")]
    InvalidState(String),

    #[error("token exchange failed for environment \"{environment}\": {code} {description}")]
    TokenExchange {
        environment: String,
        code: String,
        description: String,
    },

    #[error("refresh token is missing from request")]
    MissingToken,

    /// Deliberately opaque; the underlying cause is only logged.
    #[error("invalid refresh token presented")]
    InvalidRefreshToken,

    #[error("identity provider did not return scopes for environment \"{environment}\"")]
    ScopesUnavailable { environment: String },

    #[error("application is missing the following required scopes: {}", missing.join(" "))]
    MissingScopes {
        missing: Vec<String>,
        required: Vec<String>,
    },

    #[error("identity provider unavailable for environment \"{environment}\": {source}")]
    ProviderUnavailable {
        environment: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid response from identity provider for environment \"{environment}\": {reason}")]
    InvalidResponse { environment: String, reason: String },

    #[error("failed to seal refresh token for environment \"{environment}\": {source}")]
    Seal {
        environment: String,
        #[source]
        source: CipherError,
    },
}

impl OAuthError {
    /// Environment the failure is tagged with, when there is one.
    pub fn environment(&self) -> Option<&str> {
        match self {
            Self::Configuration { environment, .. }
            | Self::TokenExchange { environment, .. }
            | Self::ScopesUnavailable { environment }
            | Self::ProviderUnavailable { environment, .. }
            | Self::InvalidResponse { environment, .. }
            | Self::Seal { environment, .. } => Some(environment),
            Self::UnknownEnvironment(name) => Some(name),
            _ => None,
        }
    }
}

pub type Result<T, E = OAuthError> = std::result::Result<T, E>;
