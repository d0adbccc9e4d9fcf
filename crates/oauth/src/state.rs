use serde_json::Value;

use crate::error::{OAuthError, Result};

/// Context round-tripped through the provider in the `state` parameter,
/// serialized as the JSON array `[environment, finalUrl, returnTokenOnQueryString]`.
///
/// Only the structure is checked on the way back; nothing binds a returned
/// state to one this server issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateToken {
    pub environment: String,
    pub final_url: String,
    pub return_token_on_query_string: bool,
}

impl StateToken {
    pub fn new(
        environment: impl Into<String>,
        final_url: impl Into<String>,
        return_token_on_query_string: bool,
    ) -> Self {
        Self {
            environment: environment.into(),
            final_url: final_url.into(),
            return_token_on_query_string,
        }
    }

    pub fn encode(&self) -> String {
        serde_json::json!([
            self.environment,
            self.final_url,
            self.return_token_on_query_string
        ])
        .to_string()
    }

    /// Parse a returned `state` value. The flag is optional and defaults to
    /// `false`, so two-element states from older links still work.
    pub fn parse(raw: &str) -> Result<Self> {
        let items: Vec<Value> = serde_json::from_str(raw)
            .map_err(|e| OAuthError::InvalidState(format!("not a JSON array: {e}")))?;
        if items.len() < 2 {
            return Err(OAuthError::InvalidState(format!(
                "expected at least 2 elements, got {}",
                items.len()
            )));
        }

        let environment = items[0]
            .as_str()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| OAuthError::InvalidState("environment must be a string".into()))?;
        let final_url = items[1]
            .as_str()
            .ok_or_else(|| OAuthError::InvalidState("final url must be a string".into()))?;
        let return_token_on_query_string = items
            .get(2)
            .and_then(Value::as_bool)
            .unwrap_or(false);

        Ok(Self::new(environment, final_url, return_token_on_query_string))
    }
}
