//! Configuration and shared constants

pub mod config;
pub mod constants;

pub use config::TranslatorConfig;
