use std::sync::Arc;

use {
    anyhow::Context,
    tokenrelay_config::{Settings, combine_url},
    tokenrelay_oauth::FlowController,
    tracing::{info, warn},
};

use crate::{routes::build_router, state::GatewayState};

/// Validate settings, build the environment store and serve until ctrl-c.
pub async fn start_gateway(settings: Settings, bind: &str, port: u16) -> anyhow::Result<()> {
    let validation = settings.validate();
    validation.log();

    let root_url = settings.effective_root_url(bind, port);
    let store = settings
        .build_environments(&root_url)
        .context("failed to configure provider environments")?;

    let mut client = reqwest::Client::builder();
    if let Some(timeout) = settings.http_timeout {
        client = client.timeout(timeout);
    }
    let client = client.build().context("failed to build HTTP client")?;

    let state = GatewayState {
        flow: FlowController::with_client(store, client),
        passphrase: settings.passphrase,
        app_redirect_url: settings.app_redirect_url,
        setup_enabled: settings.setup_enabled,
        config_errors: validation.errors,
    };

    if state.is_configured() {
        for line in startup_banner(&state, &root_url) {
            info!("{line}");
        }
    }

    let listener = tokio::net::TcpListener::bind((bind, port))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    info!(address = %listener.local_addr()?, "token relay listening");

    axum::serve(listener, build_router(Arc::new(state)))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("token relay stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}

/// Where to point a browser, and what to register with the provider.
pub fn startup_banner(state: &GatewayState, root_url: &str) -> Vec<String> {
    let names = state.flow.environments().names();
    let mut lines = Vec::new();

    if state.setup_enabled {
        lines.push("To generate a token for your account, open in a browser:".to_string());
        for name in &names {
            lines.push(format!(
                "    {name}: {}",
                combine_url(root_url, &format!("setup/{name}"))
            ));
        }
    }

    if let Some(app_url) = &state.app_redirect_url {
        lines.push(
            "To begin the login flow in your app, open a browser or webview on the device to:"
                .to_string(),
        );
        for name in &names {
            lines.push(format!(
                "    {name}: {}",
                combine_url(root_url, &format!("toPayPal/{name}"))
            ));
        }
        let separator = if app_url.contains('?') { '&' } else { '?' };
        lines.push("When the flow is complete the browser is redirected to:".to_string());
        lines.push(format!(
            "    {app_url}{separator}sdk_token=[what you give to InitializeMerchant]"
        ));
        lines.push("The return URL registered with the provider must be:".to_string());
        lines.push(format!("    {}", combine_url(root_url, "returnFromPayPal")));
    }

    lines
}
