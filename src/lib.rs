pub mod config;
pub mod db;
pub mod engine;
pub mod entities;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;
pub mod utils;

pub use config::Config;
pub use engine::Engine;
pub use error::{AppError, AppResult};

#[derive(Clone)]
pub struct AppState {
    pub engine: Engine,
    pub config: Config,
}
