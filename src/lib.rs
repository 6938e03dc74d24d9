use config::Config;
use sqlx::PgPool;

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod router;
pub mod routes;
pub mod utils;

pub use router::create_router;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
}
