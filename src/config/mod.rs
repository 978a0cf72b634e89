//! Configuration module for Pantopod
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use pantopod::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("pantopod.toml")).unwrap();
//! println!("Participant: {}", config.cluster.participant_name);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BrokerConfig, ClusterConfig, Config, CrawlerConfig, HandlerType, HttpClientConfig,
    OutputConfig, ResourceEntry, TorConfig, RANDOM_GROUP_ID,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
