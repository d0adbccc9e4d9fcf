pub mod cipher;
pub mod environment;
pub mod error;
pub mod flow;
pub mod query;
pub mod state;
pub mod types;

pub use {
    environment::{
        EnvironmentClass, EnvironmentConfig, EnvironmentOptions, EnvironmentStore, LIVE,
        ProviderEndpoints, SANDBOX,
    },
    error::{CipherError, OAuthError},
    flow::FlowController,
    state::StateToken,
    types::{CallbackQuery, RefreshQuery, TokenInformation},
};
