//! Process-environment settings for the token relay.

pub mod custom;
pub mod settings;

pub use {
    custom::CustomEnvironment,
    settings::{Settings, Validation, combine_url},
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: &'static str, reason: String },

    #[error("invalid custom environment token: {0}")]
    CustomEnvironments(String),

    #[error(transparent)]
    Environment(#[from] tokenrelay_oauth::OAuthError),
}
