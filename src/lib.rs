pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod service;

pub use api::AppState;
pub use config::AppConfig;
pub use db::{create_pool, init_schema};
pub use error::ServiceError;
pub use service::{DocumentExtractor, ErpNextClient};
