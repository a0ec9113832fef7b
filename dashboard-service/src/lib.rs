pub mod analytics;
pub mod auth;
pub mod config;
pub mod error;
pub mod etag;
pub mod export;
pub mod meters;
pub mod metrics_server;
pub mod observability;
pub mod routes;
pub mod state;
pub mod store;

#[cfg(test)]
mod test_support;

pub use error::{ApiError, ApiResult};
pub use state::AppState;
