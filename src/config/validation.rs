use crate::config::types::{Config, HandlerType, ResourceEntry, TorConfig};
use crate::ConfigError;
use std::collections::HashSet;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_cluster_config(config)?;
    validate_output_config(config)?;
    validate_tor_config(&config.tor)?;
    validate_resources(&config.resources)?;
    Ok(())
}

/// Validates cluster and broker identity settings
fn validate_cluster_config(config: &Config) -> Result<(), ConfigError> {
    if config.cluster.cluster_name.is_empty() {
        return Err(ConfigError::Validation(
            "cluster-name cannot be empty".to_string(),
        ));
    }

    if config.cluster.participant_name.is_empty() {
        return Err(ConfigError::Validation(
            "participant-name cannot be empty".to_string(),
        ));
    }

    if config.broker.group_id.is_empty() {
        return Err(ConfigError::Validation(
            "group-id cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates that the selected storage backend has a location
fn validate_output_config(config: &Config) -> Result<(), ConfigError> {
    match config.crawler.handler_type {
        HandlerType::Database if config.output.database_path.is_empty() => Err(
            ConfigError::Validation("database-path is required for handler-type \"database\"".to_string()),
        ),
        HandlerType::File if config.output.output_dir.is_empty() => Err(ConfigError::Validation(
            "output-dir is required for handler-type \"file\"".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Validates Tor settings when the proxy is enabled
fn validate_tor_config(config: &TorConfig) -> Result<(), ConfigError> {
    if !config.enabled {
        return Ok(());
    }

    if config.socks_port == 0 || config.control_port == 0 {
        return Err(ConfigError::Validation(
            "Tor ports must be non-zero".to_string(),
        ));
    }

    if config.socks_port == config.control_port {
        return Err(ConfigError::Validation(format!(
            "Tor socks-port and control-port must differ, both are {}",
            config.socks_port
        )));
    }

    if config.executable.is_empty() {
        return Err(ConfigError::Validation(
            "Tor executable cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates resource entries
fn validate_resources(resources: &[ResourceEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for entry in resources {
        if entry.name.is_empty() {
            return Err(ConfigError::Validation(
                "Resource name cannot be empty".to_string(),
            ));
        }

        if !seen.insert(entry.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Resource '{}' is declared more than once",
                entry.name
            )));
        }

        if let Some(chroot) = &entry.chroot {
            if !chroot.starts_with('/') {
                return Err(ConfigError::Validation(format!(
                    "Resource '{}' chroot must start with '/', got '{}'",
                    entry.name, chroot
                )));
            }
        }
    }

    Ok(())
}
