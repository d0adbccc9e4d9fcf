use std::sync::Arc;

use {
    axum::{
        Json, Router,
        extract::{Path, Query, Request, State},
        http::{HeaderValue, StatusCode, header},
        middleware::{self, Next},
        response::{Html, IntoResponse, Response},
        routing::get,
    },
    serde::Deserialize,
    tokenrelay_oauth::{CallbackQuery, RefreshQuery},
};

use crate::{error::ApiError, pages, state::GatewayState};

/// Final URL for first-party setup logins.
pub const SETUP_PATH: &str = "/setup";

type AppState = State<Arc<GatewayState>>;

#[derive(Debug, Default, Deserialize)]
struct SetupQuery {
    sdk_token: Option<String>,
}

pub fn build_router(state: Arc<GatewayState>) -> Router {
    let mut guarded = Router::new().route("/", get(index));
    if state.setup_enabled {
        guarded = guarded.route("/setup/{env}", get(setup_start));
    }
    if state.app_redirect_url.is_some() {
        guarded = guarded.route("/toPayPal/{env}", get(to_provider));
    }
    let guarded = guarded.route_layer(middleware::from_fn_with_state(
        Arc::clone(&state),
        require_valid_config,
    ));

    let mut open = Router::new()
        .route("/returnFromPayPal", get(return_from_provider))
        .route("/refresh", get(refresh));
    if state.setup_enabled {
        open = open.route(SETUP_PATH, get(setup_page));
    }

    guarded.merge(open).with_state(state)
}

async fn require_valid_config(
    State(state): AppState,
    request: Request,
    next: Next,
) -> Response {
    if state.is_configured() {
        return next.run(request).await;
    }
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Html(pages::config_errors_page(&state.config_errors)),
    )
        .into_response()
}

async fn index(State(state): AppState) -> Html<String> {
    let names = if state.setup_enabled {
        state.flow.environments().names()
    } else {
        Vec::new()
    };
    Html(pages::ready_page(&names))
}

async fn setup_start(
    State(state): AppState,
    Path(env): Path<String>,
) -> Result<Response, ApiError> {
    let url = state.flow.build_authorization_url(&env, SETUP_PATH, false)?;
    Ok(found(&url))
}

async fn setup_page(Query(query): Query<SetupQuery>) -> Html<String> {
    Html(pages::setup_page(query.sdk_token.as_deref().unwrap_or_default()))
}

async fn to_provider(
    State(state): AppState,
    Path(env): Path<String>,
) -> Result<Response, ApiError> {
    let Some(final_url) = state.app_redirect_url.as_deref() else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    let url = state.flow.build_authorization_url(&env, final_url, false)?;
    Ok(found(&url))
}

async fn return_from_provider(
    State(state): AppState,
    Query(callback): Query<CallbackQuery>,
) -> Result<Response, ApiError> {
    let destination = state
        .flow
        .complete_authorization(&callback, state.passphrase.as_ref())
        .await?;
    Ok(found(&destination))
}

async fn refresh(
    State(state): AppState,
    Query(request): Query<RefreshQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let payload = state
        .flow
        .refresh(&request, state.passphrase.as_ref())
        .await?;
    Ok(Json(payload))
}

/// `302 Found`. Targets that cannot be sent as a header are refused.
fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(header::LOCATION, value)]).into_response(),
        Err(_) => (StatusCode::BAD_REQUEST, "redirect target is not a valid URL").into_response(),
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        secrecy::SecretString,
        tokenrelay_oauth::{
            EnvironmentOptions, EnvironmentStore, FlowController, LIVE, ProviderEndpoints,
            SANDBOX, StateToken, TokenInformation,
        },
    };

    const TOKEN_PATH: &str = "/v1/identity/openidconnect/tokenservice";

    struct Setup {
        provider_url: String,
        setup_enabled: bool,
        app_redirect_url: Option<&'static str>,
        config_errors: Vec<String>,
    }

    impl Default for Setup {
        fn default() -> Self {
            Self {
                provider_url: "https://idp.test".into(),
                setup_enabled: true,
                app_redirect_url: Some("myapp://oauth"),
                config_errors: Vec::new(),
            }
        }
    }

    fn state(setup: Setup) -> GatewayState {
        let mut store = EnvironmentStore::new();
        for name in [LIVE, SANDBOX] {
            store
                .configure(name, EnvironmentOptions {
                    client_id: Some(format!("{name}-id")),
                    secret: Some("shh".into()),
                    return_url: Some("https://relay.test/returnFromPayPal".into()),
                    refresh_url: Some("https://relay.test/refresh".into()),
                    scopes: None,
                    endpoints: Some(ProviderEndpoints {
                        authorize_url: format!("{}/signin/authorize", setup.provider_url),
                        token_url: format!("{}{TOKEN_PATH}", setup.provider_url),
                        client_credentials_url: format!("{}/v1/oauth2/token", setup.provider_url),
                    }),
                })
                .unwrap();
        }
        GatewayState {
            flow: FlowController::new(store),
            passphrase: Some(SecretString::new("relay-pass".to_string())),
            app_redirect_url: setup.app_redirect_url.map(str::to_string),
            setup_enabled: setup.setup_enabled,
            config_errors: setup.config_errors,
        }
    }

    async fn serve(state: GatewayState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = build_router(Arc::new(state));
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn client() -> reqwest::Client {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap()
    }

    fn location(resp: &reqwest::Response) -> String {
        resp.headers()[header::LOCATION.as_str()]
            .to_str()
            .unwrap()
            .to_string()
    }

    fn query_param(url: &str, name: &str) -> String {
        url::Url::parse(url)
            .unwrap()
            .query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
            .unwrap()
    }

    #[tokio::test]
    async fn test_index_lists_setup_links() {
        let base = serve(state(Setup::default())).await;
        let body = client().get(&base).send().await.unwrap().text().await.unwrap();
        assert!(body.contains("Server is Ready"));
        assert!(body.contains("/setup/live"));
        assert!(body.contains("/setup/sandbox"));

        let base = serve(state(Setup {
            setup_enabled: false,
            ..Setup::default()
        }))
        .await;
        let body = client().get(&base).send().await.unwrap().text().await.unwrap();
        assert!(!body.contains("/setup/"));
    }

    #[tokio::test]
    async fn test_config_errors_block_guarded_routes() {
        let base = serve(state(Setup {
            config_errors: vec!["APP_SECURE_IDENTIFIER is not set.".into()],
            ..Setup::default()
        }))
        .await;
        let http = client();

        for path in ["/", "/setup/live", "/toPayPal/live"] {
            let resp = http.get(format!("{base}{path}")).send().await.unwrap();
            assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE, "{path}");
            let body = resp.text().await.unwrap();
            assert!(body.contains("Configuration Errors"));
            assert!(body.contains("<li>APP_SECURE_IDENTIFIER is not set.</li>"));
        }

        let resp = http.get(format!("{base}/refresh")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_setup_redirects_to_provider() {
        let base = serve(state(Setup::default())).await;
        let resp = client()
            .get(format!("{base}/setup/sandbox"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FOUND);

        let target = location(&resp);
        assert!(target.starts_with("https://idp.test/signin/authorize?"));
        assert_eq!(query_param(&target, "client_id"), "sandbox-id");
        assert_eq!(
            StateToken::parse(&query_param(&target, "state")).unwrap(),
            StateToken::new(SANDBOX, SETUP_PATH, false)
        );
    }

    #[tokio::test]
    async fn test_to_provider_uses_app_redirect_url() {
        let base = serve(state(Setup::default())).await;
        let resp = client()
            .get(format!("{base}/toPayPal/live"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FOUND);
        let state = StateToken::parse(&query_param(&location(&resp), "state")).unwrap();
        assert_eq!(state.final_url, "myapp://oauth");

        let resp = client()
            .get(format!("{base}/toPayPal/nowhere"))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.text().await.unwrap(), "invalid environment nowhere");
    }

    #[tokio::test]
    async fn test_optional_routes_absent() {
        let base = serve(state(Setup {
            setup_enabled: false,
            app_redirect_url: None,
            ..Setup::default()
        }))
        .await;
        let http = client();
        for path in ["/toPayPal/live", "/setup/live", "/setup"] {
            let resp = http.get(format!("{base}{path}")).send().await.unwrap();
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{path}");
        }
    }

    #[tokio::test]
    async fn test_setup_page_escapes_token() {
        let base = serve(state(Setup::default())).await;
        let body = client()
            .get(format!("{base}/setup"))
            .query(&[("sdk_token", "live:<script>alert(1)</script>")])
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();
        assert!(body.contains("live:&lt;script&gt;alert(1)&lt;/script&gt;"));
        assert!(!body.contains("<script>alert"));
    }

    #[tokio::test]
    async fn test_return_and_refresh() {
        let mut provider = mockito::Server::new_async().await;
        let _exchange = provider
            .mock("POST", TOKEN_PATH)
            .match_body(mockito::Matcher::UrlEncoded(
                "grant_type".into(),
                "authorization_code".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"AT","refresh_token":"RT","expires_in":28800}"#)
            .create_async()
            .await;
        let refresh = provider
            .mock("POST", TOKEN_PATH)
            .match_body(mockito::Matcher::UrlEncoded(
                "refresh_token".into(),
                "RT".into(),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"access_token":"AT2","expires_in":28800,"scope":"openid"}"#)
            .expect(1)
            .create_async()
            .await;

        let base = serve(state(Setup {
            provider_url: provider.url(),
            ..Setup::default()
        }))
        .await;
        let http = client();
        let state = StateToken::new(LIVE, "myapp://oauth", false).encode();

        let resp = http
            .get(format!("{base}/returnFromPayPal"))
            .query(&[("code", "abc"), ("state", state.as_str())])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::FOUND);
        let destination = location(&resp);
        assert!(destination.starts_with("myapp://oauth?sdk_token=live:"));

        let sdk_token = query_param(&destination, TokenInformation::SDK_TOKEN_PARAM);
        let info = TokenInformation::decode_sdk_token(&sdk_token).unwrap();
        assert_eq!(info.access_token, "AT");
        let sealed = query_param(&info.refresh_url, "token");

        let refreshed: serde_json::Value = http
            .get(format!("{base}/refresh"))
            .query(&[("token", sealed.as_str())])
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(
            refreshed,
            serde_json::json!({"access_token":"AT2","expires_in":28800,"scope":"openid"})
        );
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_return_reports_provider_error() {
        let base = serve(state(Setup::default())).await;
        let resp = client()
            .get(format!("{base}/returnFromPayPal"))
            .query(&[
                ("error", "access_denied"),
                ("error_description", "user cancelled"),
            ])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            resp.text().await.unwrap(),
            "login error from identity provider: access_denied: user cancelled"
        );
    }

    #[tokio::test]
    async fn test_refresh_rejects_bad_tokens() {
        let base = serve(state(Setup::default())).await;
        let http = client();

        let resp = http.get(format!("{base}/refresh")).send().await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            resp.text().await.unwrap(),
            "refresh token is missing from request"
        );

        let resp = http
            .get(format!("{base}/refresh"))
            .query(&[("token", "bm90IGEgcmVhbCBibG9i")])
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(resp.text().await.unwrap(), "invalid refresh token presented");
    }
}
