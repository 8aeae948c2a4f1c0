//! Configuration management for the ladder service
//!
//! This module handles all configuration loading from environment variables,
//! TOML files and CLI overrides, plus validation and default values.

pub mod app;
pub mod maps;

// Re-export commonly used types
pub use app::{
    validate_config, AmqpSettings, AppConfig, LadderSettings, SchedulerSettings, ServiceSettings,
};
pub use maps::default_map_pool;
