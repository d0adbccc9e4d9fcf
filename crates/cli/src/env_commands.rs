use {
    anyhow::{Context, Result, bail},
    tokenrelay_config::{CustomEnvironment, Settings},
    tokenrelay_oauth::{FlowController, OAuthError},
};

/// Root used for return/refresh URLs when only talking to the provider.
const OFFLINE_ROOT_URL: &str = "http://localhost:3000";

pub async fn check_scopes(settings: &Settings, env: &str) -> Result<()> {
    let root_url = settings.root_url.as_deref().unwrap_or(OFFLINE_ROOT_URL);
    let store = settings.build_environments(root_url)?;

    let mut client = reqwest::Client::builder();
    if let Some(timeout) = settings.http_timeout {
        client = client.timeout(timeout);
    }
    let flow = FlowController::with_client(store, client.build()?);
    let cfg = flow.environments().get(env)?;
    let required = cfg.scope_string();

    match flow.query_available_scopes(env).await {
        Ok(granted) => {
            println!("Environment {env} has every required scope.");
            println!("  required: {required}");
            println!("  granted:  {}", granted.join(" "));
            Ok(())
        },
        Err(OAuthError::MissingScopes { missing, .. }) => {
            bail!("environment {env} is missing scopes: {}", missing.join(" "))
        },
        Err(e) => Err(e).with_context(|| format!("scope check failed for {env}")),
    }
}

pub fn custom_env_token(client_id: &str, secret: &str, names: &[&str]) -> Result<String> {
    let environments = CustomEnvironment::for_names(names, client_id, secret);
    if environments.is_empty() {
        bail!("at least one environment name is required");
    }
    Ok(CustomEnvironment::encode_all(&environments)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> Settings {
        Settings {
            live_client_id: Some("live-id".into()),
            live_secret: Some(secrecy::SecretString::new("shh".to_string())),
            root_url: Some("https://relay.test".into()),
            scopes: Some("openid email".into()),
            ..Settings::default()
        }
    }

    #[test]
    fn test_custom_env_token() {
        let token = custom_env_token("cid", "sec", &["stage2a", "stage2b"]).unwrap();
        let decoded = CustomEnvironment::decode_all(&token).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].client_id, "cid");

        assert!(custom_env_token("cid", "sec", &[" "]).is_err());
    }

    #[tokio::test]
    async fn test_check_scopes_unknown_environment() {
        let err = check_scopes(&settings(), "nowhere")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid environment"));
    }
}
