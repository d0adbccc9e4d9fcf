//! HTTP surface of the token relay: login redirects, the provider return
//! endpoint and token refresh.

pub mod error;
pub mod pages;
pub mod routes;
pub mod server;
pub mod state;

pub use {routes::build_router, server::start_gateway, state::GatewayState};
