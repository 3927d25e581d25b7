// src/lib.rs

pub mod error;
pub mod config;
pub mod models;
pub mod session;
pub mod platforms;
pub mod services;
pub mod context;
pub mod liveness;
pub mod test_utils;

pub use error::Error;
pub use config::BotConfig;
pub use context::BotContext;
