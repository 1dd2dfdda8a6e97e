pub mod config;
pub mod errors;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

pub use config::GatewayConfig;
pub use errors::{ErrorEnvelope, GatewayError};
pub use models::{AppState, Operation, Page, SessionContext, SessionToken};
pub use services::{ClientFactory, ClientOptions, ContentClient, UpstreamError};
