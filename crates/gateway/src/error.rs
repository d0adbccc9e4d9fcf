use {
    axum::{
        http::StatusCode,
        response::{IntoResponse, Response},
    },
    tokenrelay_oauth::OAuthError,
    tracing::{error, warn},
};

/// An [`OAuthError`] on its way to the client as plain text.
#[derive(Debug)]
pub struct ApiError(pub OAuthError);

impl From<OAuthError> for ApiError {
    fn from(err: OAuthError) -> Self {
        Self(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match &self.0 {
            OAuthError::Provider { .. }
            | OAuthError::InvalidState(_)
            | OAuthError::MissingCode
            | OAuthError::MissingToken
            | OAuthError::InvalidRefreshToken => StatusCode::BAD_REQUEST,
            OAuthError::UnknownEnvironment(_) => StatusCode::NOT_FOUND,
            OAuthError::ProviderUnavailable { .. } => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let environment = self.0.environment().unwrap_or("-");
        if status.is_server_error() {
            error!(%status, environment, error = %self.0, "request failed");
        } else {
            warn!(%status, environment, error = %self.0, "request rejected");
        }
        (status, self.0.to_string()).into_response()
    }
}
