pub mod browse;
pub mod client;
pub mod config;
pub mod error;
pub mod import;
pub mod logging;
pub mod session;
pub mod types;
