pub mod app;
pub mod auth;
pub mod config;
pub mod errors;
pub mod models;
pub mod screens;
pub mod seed;
pub mod session;
pub mod state;
pub mod stats;
pub mod storage;
pub mod ui;

pub use app::router;
pub use config::Config;
pub use state::AppState;
pub use storage::Store;
