use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_yaml::from_str(content)?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.chain.is_empty() {
        return Err(ConfigError::Validation {
            message: "chain must name at least one analyser".to_string(),
        });
    }

    if config.workers == 0 {
        return Err(ConfigError::Validation {
            message: "workers must be greater than zero".to_string(),
        });
    }

    // Options for an analyser that never runs are almost always a typo
    for name in config.analysers.keys() {
        if !config.chain.iter().any(|c| c == name) {
            return Err(ConfigError::Validation {
                message: format!("options given for '{}' which is not in the chain", name),
            });
        }
    }

    Ok(())
}
