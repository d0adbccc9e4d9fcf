use std::time::Duration;

use {
    secrecy::{ExposeSecret, SecretString},
    tokenrelay_oauth::{EnvironmentOptions, EnvironmentStore, LIVE, SANDBOX},
    tracing::{debug, error, warn},
};

use crate::{ConfigError, custom::CustomEnvironment};

pub const RETURN_PATH: &str = "returnFromPayPal";
pub const REFRESH_PATH: &str = "refresh";

/// Everything the relay reads from its process environment.
#[derive(Debug, Default)]
pub struct Settings {
    pub passphrase: Option<SecretString>,
    pub live_client_id: Option<String>,
    pub live_secret: Option<SecretString>,
    pub sandbox_client_id: Option<String>,
    pub sandbox_secret: Option<SecretString>,
    pub root_url: Option<String>,
    pub app_redirect_url: Option<String>,
    pub setup_enabled: bool,
    pub scopes: Option<String>,
    pub custom_environments: Vec<CustomEnvironment>,
    pub http_timeout: Option<Duration>,
}

/// Outcome of the startup checks. Errors keep the guarded routes disabled,
/// warnings are informational.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Validation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub has_live: bool,
    pub has_sandbox: bool,
}

impl Validation {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn log(&self) {
        for message in &self.warnings {
            warn!("{message}");
        }
        for message in &self.errors {
            error!("{message}");
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from an arbitrary variable source. Blank values count
    /// as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let secret = |key: &str| get(key).map(SecretString::new);

        let custom_environments = match get("CUSTOM_ENVIRONMENTS") {
            Some(token) => CustomEnvironment::decode_all(&token)?,
            None => Vec::new(),
        };

        let http_timeout = get("HTTP_TIMEOUT_SECS")
            .map(|raw| {
                raw.parse::<u64>()
                    .map(Duration::from_secs)
                    .map_err(|e| ConfigError::InvalidValue {
                        var: "HTTP_TIMEOUT_SECS",
                        reason: e.to_string(),
                    })
            })
            .transpose()?;

        let settings = Self {
            passphrase: secret("APP_SECURE_IDENTIFIER"),
            live_client_id: get("PAYPAL_LIVE_CLIENTID"),
            live_secret: secret("PAYPAL_LIVE_SECRET"),
            sandbox_client_id: get("PAYPAL_SANDBOX_CLIENTID"),
            sandbox_secret: secret("PAYPAL_SANDBOX_SECRET"),
            root_url: get("ROOT_URL"),
            app_redirect_url: get("APP_REDIRECT_URL"),
            setup_enabled: get("SETUP_ENABLED").is_some_and(|v| v.eq_ignore_ascii_case("true")),
            scopes: get("SCOPES"),
            custom_environments,
            http_timeout,
        };
        debug!(
            setup_enabled = settings.setup_enabled,
            custom_environments = settings.custom_environments.len(),
            "settings loaded"
        );
        Ok(settings)
    }

    pub fn validate(&self) -> Validation {
        let live_id = self.live_client_id.is_some();
        let sandbox_id = self.sandbox_client_id.is_some();
        let mut v = Validation {
            has_live: live_id && self.live_secret.is_some(),
            has_sandbox: sandbox_id && self.sandbox_secret.is_some(),
            ..Validation::default()
        };

        if self.passphrase.is_none() {
            v.errors.push(
                "APP_SECURE_IDENTIFIER is not set. It encrypts refresh tokens and must be \
                 a long random value shared by every instance."
                    .into(),
            );
        }

        if self.app_redirect_url.is_none() && !self.setup_enabled {
            v.errors.push(
                "Neither APP_REDIRECT_URL nor SETUP_ENABLED is set, so no login flow is \
                 available."
                    .into(),
            );
        }

        match (live_id, sandbox_id) {
            (false, false) => v.errors.push(
                "Neither PAYPAL_LIVE_CLIENTID nor PAYPAL_SANDBOX_CLIENTID is set.".into(),
            ),
            (true, false) => v.warnings.push(
                "Only the live environment is configured. Set PAYPAL_SANDBOX_CLIENTID \
                 to enable sandbox logins."
                    .into(),
            ),
            (false, true) => v.warnings.push(
                "Only the sandbox environment is configured. Set PAYPAL_LIVE_CLIENTID \
                 to enable live logins."
                    .into(),
            ),
            (true, true) => {},
        }

        if live_id && !v.has_live {
            v.errors
                .push("PAYPAL_LIVE_CLIENTID is set but PAYPAL_LIVE_SECRET is not.".into());
        }
        if sandbox_id && !v.has_sandbox {
            v.errors
                .push("PAYPAL_SANDBOX_CLIENTID is set but PAYPAL_SANDBOX_SECRET is not.".into());
        }

        match &self.app_redirect_url {
            None => v.warnings.push(
                "APP_REDIRECT_URL is not set. Third-party logins via /toPayPal are disabled."
                    .into(),
            ),
            Some(url) if !is_absolute(url) => v
                .errors
                .push(format!("APP_REDIRECT_URL is not an absolute URL: {url}")),
            Some(_) => {},
        }

        match &self.root_url {
            None => v.warnings.push(
                "ROOT_URL is not set. Return and refresh URLs are derived from the listen \
                 address, which is rarely what the provider has registered."
                    .into(),
            ),
            Some(url) if !is_absolute(url) => v
                .errors
                .push(format!("ROOT_URL is not an absolute URL: {url}")),
            Some(_) => {},
        }

        v
    }

    /// `ROOT_URL`, or the address the server listens on.
    pub fn effective_root_url(&self, bind: &str, port: u16) -> String {
        self.root_url
            .clone()
            .unwrap_or_else(|| format!("http://{bind}:{port}"))
    }

    /// Configure every environment with complete credentials. Incomplete
    /// live/sandbox credentials are skipped here and reported by
    /// [`Settings::validate`].
    pub fn build_environments(&self, root_url: &str) -> Result<EnvironmentStore, ConfigError> {
        let return_url = combine_url(root_url, RETURN_PATH);
        let refresh_url = combine_url(root_url, REFRESH_PATH);
        let mut store = EnvironmentStore::new();

        let standard = [
            (LIVE, &self.live_client_id, &self.live_secret),
            (SANDBOX, &self.sandbox_client_id, &self.sandbox_secret),
        ];
        for (name, client_id, secret) in standard {
            let (Some(client_id), Some(secret)) = (client_id, secret) else {
                continue;
            };
            store.configure(name, EnvironmentOptions {
                client_id: Some(client_id.clone()),
                secret: Some(secret.expose_secret().clone()),
                return_url: Some(return_url.clone()),
                refresh_url: Some(refresh_url.clone()),
                scopes: self.scopes.clone(),
                endpoints: None,
            })?;
        }

        for custom in &self.custom_environments {
            let (name, options) =
                custom
                    .clone()
                    .into_options(&return_url, &refresh_url, self.scopes.as_deref());
            store.configure(&name, options)?;
        }

        Ok(store)
    }
}

/// Join `base` and `path` with exactly one `/`.
pub fn combine_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

fn is_absolute(raw: &str) -> bool {
    url::Url::parse(raw).is_ok_and(|u| u.has_host())
}

#[cfg(test)]
mod tests {
    use {super::*, std::collections::HashMap};

    fn settings(vars: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| map.get(key).cloned()).unwrap()
    }

    fn complete() -> Vec<(&'static str, &'static str)> {
        vec![
            ("APP_SECURE_IDENTIFIER", "correct horse battery staple"),
            ("PAYPAL_LIVE_CLIENTID", "live-id"),
            ("PAYPAL_LIVE_SECRET", "live-secret"),
            ("PAYPAL_SANDBOX_CLIENTID", "sb-id"),
            ("PAYPAL_SANDBOX_SECRET", "sb-secret"),
            ("ROOT_URL", "https://relay.example.com/"),
            ("APP_REDIRECT_URL", "myapp://oauth"),
        ]
    }

    #[test]
    fn test_combine_url() {
        assert_eq!(combine_url("https://a.b/", "/refresh"), "https://a.b/refresh");
        assert_eq!(combine_url("https://a.b", "refresh"), "https://a.b/refresh");
        assert_eq!(combine_url("https://a.b//", "//x"), "https://a.b/x");
    }

    #[test]
    fn test_complete_settings_validate_clean() {
        let s = settings(&complete());
        let v = s.validate();
        assert!(v.is_ok(), "{:?}", v.errors);
        assert!(v.warnings.is_empty(), "{:?}", v.warnings);
        assert!(v.has_live && v.has_sandbox);
    }

    #[test]
    fn test_blank_counts_as_unset() {
        let s = settings(&[("APP_SECURE_IDENTIFIER", "  "), ("SETUP_ENABLED", "TRUE")]);
        assert!(s.passphrase.is_none());
        assert!(s.setup_enabled);

        let v = s.validate();
        assert!(v.errors.iter().any(|e| e.contains("APP_SECURE_IDENTIFIER")));
        assert!(v.errors.iter().any(|e| e.contains("Neither PAYPAL_LIVE_CLIENTID")));
        assert!(!v.errors.iter().any(|e| e.contains("SETUP_ENABLED")));
    }

    #[test]
    fn test_no_flow_available() {
        let mut vars = complete();
        vars.retain(|(k, _)| *k != "APP_REDIRECT_URL");
        let v = settings(&vars).validate();
        assert!(v.errors.iter().any(|e| e.contains("SETUP_ENABLED")));
        assert!(v.warnings.iter().any(|w| w.contains("APP_REDIRECT_URL")));
    }

    #[test]
    fn test_client_id_without_secret() {
        let mut vars = complete();
        vars.retain(|(k, _)| *k != "PAYPAL_SANDBOX_SECRET");
        let s = settings(&vars);
        let v = s.validate();
        assert!(v.has_live && !v.has_sandbox);
        assert_eq!(v.errors, vec![
            "PAYPAL_SANDBOX_CLIENTID is set but PAYPAL_SANDBOX_SECRET is not.".to_string()
        ]);

        let store = s.build_environments("https://relay.example.com").unwrap();
        assert_eq!(store.names(), vec![LIVE]);
    }

    #[test]
    fn test_single_environment_warns() {
        let mut vars = complete();
        vars.retain(|(k, _)| !k.starts_with("PAYPAL_SANDBOX"));
        let v = settings(&vars).validate();
        assert!(v.is_ok());
        assert!(v.warnings.iter().any(|w| w.contains("Only the live")));
    }

    #[test]
    fn test_relative_urls_rejected() {
        let mut vars = complete();
        vars.retain(|(k, _)| *k != "ROOT_URL" && *k != "APP_REDIRECT_URL");
        vars.push(("ROOT_URL", "relay.example.com"));
        vars.push(("APP_REDIRECT_URL", "/done"));
        let v = settings(&vars).validate();
        assert_eq!(v.errors.len(), 2, "{:?}", v.errors);
    }

    #[test]
    fn test_missing_root_url() {
        let mut vars = complete();
        vars.retain(|(k, _)| *k != "ROOT_URL");
        let s = settings(&vars);
        assert!(s.validate().warnings.iter().any(|w| w.contains("ROOT_URL")));
        assert_eq!(s.effective_root_url("0.0.0.0", 3000), "http://0.0.0.0:3000");
    }

    #[test]
    fn test_build_environments_derives_urls() {
        let mut vars = complete();
        vars.push(("SCOPES", "openid email"));
        let s = settings(&vars);
        let root = s.effective_root_url("127.0.0.1", 3000);
        let store = s.build_environments(&root).unwrap();

        assert_eq!(store.names(), vec![LIVE, SANDBOX]);
        let live = store.get(LIVE).unwrap();
        assert_eq!(live.client_id, "live-id");
        assert_eq!(live.return_url, "https://relay.example.com/returnFromPayPal");
        assert_eq!(live.refresh_url, "https://relay.example.com/refresh");
        assert_eq!(live.scopes, vec!["openid", "email"]);
    }

    #[test]
    fn test_custom_environments_loaded() {
        let token = CustomEnvironment::encode_all(&CustomEnvironment::for_names(
            &["stage2abc"],
            "stage-id",
            "stage-secret",
        ))
        .unwrap();
        let mut vars = complete();
        vars.push(("CUSTOM_ENVIRONMENTS", token.as_str()));
        let s = settings(&vars);
        let store = s.build_environments("https://relay.example.com").unwrap();

        let stage = store.get("stage2abc").unwrap();
        assert_eq!(stage.client_id, "stage-id");
        assert_eq!(stage.return_url, "https://relay.example.com/returnFromPayPal");
        assert!(
            stage
                .endpoints
                .authorize_url
                .starts_with("https://www.stage2abc.stage.paypal.com/")
        );
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = Settings::from_lookup(|key| {
            (key == "CUSTOM_ENVIRONMENTS").then(|| "not base64!".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::CustomEnvironments(_)));

        let err = Settings::from_lookup(|key| {
            (key == "HTTP_TIMEOUT_SECS").then(|| "soon".to_string())
        })
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue {
            var: "HTTP_TIMEOUT_SECS",
            ..
        }));

        let s = Settings::from_lookup(|key| (key == "HTTP_TIMEOUT_SECS").then(|| "15".into()))
            .unwrap();
        assert_eq!(s.http_timeout, Some(Duration::from_secs(15)));
    }
}
