pub mod backend;
pub mod config;
pub mod models;
pub mod service;

pub use backend::{StoredSubmission, SubmissionStore};
pub use config::{ConfigError, ServiceConfig};
pub use service::{AppState, CORRELATION_HEADER, build_router, create_app};
