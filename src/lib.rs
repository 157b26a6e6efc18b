pub mod client;
pub mod config;
pub mod db;
pub mod dtos;
pub mod error;
pub mod handler;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod service;
pub mod utils;

use std::sync::Arc;

use config::Config;
use db::DBClient;

#[derive(Debug, Clone)]
pub struct AppState {
    pub env: Config,
    pub db_client: Arc<DBClient>,
}

impl AppState {
    pub fn new(db_client: DBClient, config: Config) -> Self {
        AppState {
            env: config,
            db_client: Arc::new(db_client),
        }
    }
}
