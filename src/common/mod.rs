pub mod config;
pub mod error;
pub mod file_utils;

pub use config::Config;
