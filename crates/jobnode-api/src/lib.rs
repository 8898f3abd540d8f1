//! # jobnode API
//!
//! HTTP surface for creating jobs, triggering runs and reading their
//! history.

pub mod error;
pub mod routes;
pub mod server;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use server::{ApiConfig, ApiServer};
pub use state::AppState;
