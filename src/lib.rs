pub mod alarm;
pub mod auth;
pub mod client;
pub mod config;
pub mod errors;
pub mod models;
pub mod state;
pub mod stats;
pub mod storage;
pub mod sync;
pub mod time_utils;

pub use client::ApiClient;
pub use config::Config;
pub use state::Store;
pub use sync::SyncContext;
