use {
    secrecy::{ExposeSecret, SecretString},
    serde::de::DeserializeOwned,
    serde_json::Value,
    tracing::{debug, info, warn},
};

use crate::{
    cipher,
    environment::{EnvironmentConfig, EnvironmentStore},
    error::{OAuthError, Result},
    query,
    state::StateToken,
    types::{CallbackQuery, ClientMetadataResponse, RefreshQuery, TokenInformation, TokenResponse},
};

/// Drives the authorization-code flow against the configured environments.
///
/// Holds no per-request state: the only thing that survives a request is the
/// sealed refresh token, and that lives with the caller.
#[derive(Debug)]
pub struct FlowController {
    environments: EnvironmentStore,
    client: reqwest::Client,
}

impl FlowController {
    /// Uses a default `reqwest::Client`, which applies no request timeout.
    pub fn new(environments: EnvironmentStore) -> Self {
        Self::with_client(environments, reqwest::Client::new())
    }

    pub fn with_client(environments: EnvironmentStore, client: reqwest::Client) -> Self {
        Self {
            environments,
            client,
        }
    }

    pub fn environments(&self) -> &EnvironmentStore {
        &self.environments
    }

    /// URL to send the user agent to for login and consent.
    pub fn build_authorization_url(
        &self,
        environment: &str,
        final_url: &str,
        return_token_on_query_string: bool,
    ) -> Result<String> {
        let cfg = self.environments.get(environment)?;
        let state = StateToken::new(environment, final_url, return_token_on_query_string);

        Ok(query::append_query(&cfg.endpoints.authorize_url, &[
            ("response_type", "code"),
            ("client_id", cfg.client_id.as_str()),
            ("scope", cfg.scope_string().as_str()),
            ("redirect_uri", cfg.return_url.as_str()),
            ("state", state.encode().as_str()),
        ]))
    }

    /// Handle the provider's redirect back to the return URL: exchange the
    /// code, seal the refresh token and build the caller's destination URL.
    pub async fn complete_authorization(
        &self,
        callback: &CallbackQuery,
        passphrase: Option<&SecretString>,
    ) -> Result<String> {
        let passphrase = passphrase
            .filter(|p| !p.expose_secret().is_empty())
            .ok_or(OAuthError::MissingSecret)?;

        if let Some(code) = &callback.error {
            return Err(OAuthError::Provider {
                code: code.clone(),
                description: callback.error_description.clone().unwrap_or_default(),
            });
        }

        let state = callback
            .state
            .as_deref()
            .ok_or_else(|| OAuthError::InvalidState("missing".into()))
            .and_then(StateToken::parse)?;
        let code = callback
            .code
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or(OAuthError::MissingCode)?;
        let cfg = self.environments.get(&state.environment)?;

        let tokens: TokenResponse = self
            .post_token_form(
                cfg,
                &cfg.endpoints.token_url,
                &[
                    ("grant_type", "authorization_code"),
                    ("code", code),
                    ("redirect_uri", cfg.return_url.as_str()),
                ],
                true,
            )
            .await?;

        if let Some(code) = tokens.error {
            return Err(OAuthError::TokenExchange {
                environment: cfg.name.clone(),
                code,
                description: tokens.error_description.unwrap_or_default(),
            });
        }
        let access_token = tokens
            .access_token
            .ok_or_else(|| invalid_response(cfg, "missing access_token"))?;
        let refresh_token = tokens
            .refresh_token
            .ok_or_else(|| invalid_response(cfg, "missing refresh_token"))?;

        let plaintext = serde_json::json!([cfg.name, refresh_token]).to_string();
        let sealed = cipher::seal(&plaintext, passphrase.expose_secret()).map_err(|source| {
            OAuthError::Seal {
                environment: cfg.name.clone(),
                source,
            }
        })?;

        let token_info = TokenInformation {
            access_token,
            expires_in: tokens.expires_in,
            refresh_url: query::append_query(&cfg.refresh_url, &[("token", sealed.as_str())]),
            environment: cfg.name.clone(),
        };

        info!(
            environment = %cfg.name,
            query_string = state.return_token_on_query_string,
            "authorization completed"
        );

        Ok(if state.return_token_on_query_string {
            token_info.append_as_query(&state.final_url)
        } else {
            token_info.append_as_sdk_token(&state.final_url)
        })
    }

    /// Trade a sealed refresh token for a new access token. The provider's
    /// JSON body is returned as-is.
    pub async fn refresh(
        &self,
        request: &RefreshQuery,
        passphrase: Option<&SecretString>,
    ) -> Result<Value> {
        let token = request
            .token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(OAuthError::MissingToken)?;
        let passphrase = passphrase
            .filter(|p| !p.expose_secret().is_empty())
            .ok_or(OAuthError::MissingSecret)?;

        let plaintext = cipher::open(token, passphrase.expose_secret()).map_err(|e| {
            warn!(error = %e, "rejecting refresh token");
            OAuthError::InvalidRefreshToken
        })?;
        let (environment, refresh_token) = parse_refresh_payload(&plaintext).ok_or_else(|| {
            warn!("rejecting refresh token: unexpected payload shape");
            OAuthError::InvalidRefreshToken
        })?;

        let cfg = self.environments.get(&environment)?;
        let payload: Value = self
            .post_token_form(
                cfg,
                &cfg.endpoints.token_url,
                &[
                    ("grant_type", "refresh_token"),
                    ("refresh_token", refresh_token.as_str()),
                ],
                true,
            )
            .await?;

        if let Some(error) = payload.get("error").and_then(Value::as_str) {
            warn!(environment = %cfg.name, %error, "provider rejected refresh token");
        } else {
            debug!(environment = %cfg.name, "access token refreshed");
        }
        Ok(payload)
    }

    /// Ask the provider which scopes the client may use and fail when any of
    /// the configured scopes is missing. Meant as a deployment check.
    pub async fn query_available_scopes(&self, environment: &str) -> Result<Vec<String>> {
        let cfg = self.environments.get(environment)?;
        let response: ClientMetadataResponse = self
            .post_token_form(
                cfg,
                &cfg.endpoints.client_credentials_url,
                &[
                    ("grant_type", "client_credentials"),
                    ("return_client_metadata", "true"),
                ],
                false,
            )
            .await?;

        if let Some(code) = response.error {
            return Err(OAuthError::TokenExchange {
                environment: cfg.name.clone(),
                code,
                description: response.error_description.unwrap_or_default(),
            });
        }
        let granted = response
            .client_metadata
            .ok_or_else(|| invalid_response(cfg, "missing client_metadata"))?
            .scopes
            .ok_or_else(|| OAuthError::ScopesUnavailable {
                environment: cfg.name.clone(),
            })?;

        let missing = missing_scopes(&cfg.scopes, &granted);
        if !missing.is_empty() {
            return Err(OAuthError::MissingScopes {
                missing,
                required: cfg.scopes.clone(),
            });
        }
        Ok(granted)
    }

    /// POST a form to a provider endpoint with HTTP Basic client auth and
    /// decode the JSON body regardless of status; error bodies carry
    /// `error` / `error_description`.
    async fn post_token_form<T: DeserializeOwned>(
        &self,
        cfg: &EnvironmentConfig,
        url: &str,
        form: &[(&str, &str)],
        with_secret: bool,
    ) -> Result<T> {
        let secret = with_secret.then(|| cfg.client_secret.expose_secret().as_str());
        let mut request = self
            .client
            .post(url)
            .basic_auth(&cfg.client_id, secret)
            .form(form);
        if !with_secret {
            request = request.header("X-IDENTITY-ROUTE-TO", "APS");
        }

        let unavailable = |source: reqwest::Error| OAuthError::ProviderUnavailable {
            environment: cfg.name.clone(),
            source,
        };
        let response = request.send().await.map_err(unavailable)?;
        let status = response.status();
        let body = response.text().await.map_err(unavailable)?;
        debug!(environment = %cfg.name, %url, status = status.as_u16(), "token endpoint responded");

        serde_json::from_str(&body).map_err(|e| {
            invalid_response(cfg, &format!("status {}: {e}", status.as_u16()))
        })
    }
}

fn invalid_response(cfg: &EnvironmentConfig, reason: &str) -> OAuthError {
    OAuthError::InvalidResponse {
        environment: cfg.name.clone(),
        reason: reason.to_string(),
    }
}

/// `[environment, refreshToken]`, both non-empty strings.
fn parse_refresh_payload(plaintext: &str) -> Option<(String, String)> {
    let (environment, refresh_token): (String, String) = serde_json::from_str(plaintext).ok()?;
    (!environment.is_empty() && !refresh_token.is_empty()).then_some((environment, refresh_token))
}

fn missing_scopes(required: &[String], granted: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|scope| !granted.contains(scope))
        .cloned()
        .collect()
}
