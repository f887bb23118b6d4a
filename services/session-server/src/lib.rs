pub mod auth;
pub mod config;
pub mod http;
pub mod jobs;
pub mod state;
pub mod tcp;

pub use config::Config;
pub use state::AppState;
