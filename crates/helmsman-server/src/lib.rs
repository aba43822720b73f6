//! HTTP control surface for the reconciliation controller.

pub mod config;
pub mod error;
pub mod observability;
pub mod routes;
pub mod server;
pub mod state;

pub use config::AppConfig;
pub use routes::build_router;
pub use server::Server;
pub use state::AppState;
