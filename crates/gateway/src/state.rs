use {secrecy::SecretString, tokenrelay_oauth::FlowController};

/// Shared, read-only state handed to every request.
#[derive(Debug)]
pub struct GatewayState {
    pub flow: FlowController,
    pub passphrase: Option<SecretString>,
    /// Final destination for `/toPayPal/{env}` logins.
    pub app_redirect_url: Option<String>,
    pub setup_enabled: bool,
    /// Startup validation errors; non-empty disables the guarded routes.
    pub config_errors: Vec<String>,
}

impl GatewayState {
    pub fn is_configured(&self) -> bool {
        self.config_errors.is_empty()
    }
}
