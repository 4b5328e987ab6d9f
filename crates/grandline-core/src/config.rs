//! Loading [`GenerationConfig`] from JSON.
//!
//! `GRANDLINE_CONFIG_PATH` points at an override file. Without it, or when the
//! file cannot be used, the built-in `data/generation_config.json` applies.

use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use grandline_logic::config::GenerationConfig;
use thiserror::Error;

pub const CONFIG_PATH_ENV: &str = "GRANDLINE_CONFIG_PATH";
pub const BUILTIN_GENERATION_CONFIG: &str = include_str!("data/generation_config.json");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse generation config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("failed to read generation config from {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid generation config: {field} {reason}")]
    Invalid { field: &'static str, reason: &'static str },
}

pub fn read_config_from_str(json: &str) -> Result<GenerationConfig, ConfigError> {
    let config: GenerationConfig = serde_json::from_str(json)?;
    validate(&config)?;
    Ok(config)
}

pub fn read_config_from_file(path: &Path) -> Result<GenerationConfig, ConfigError> {
    let json = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    read_config_from_str(&json)
}

pub fn builtin_config() -> GenerationConfig {
    match read_config_from_str(BUILTIN_GENERATION_CONFIG) {
        Ok(config) => config,
        Err(err) => {
            log::error!("built-in generation config rejected ({err}); using defaults");
            GenerationConfig::default()
        }
    }
}

/// Config from the override path, falling back to the built-in one. Also
/// returns the path that was used, if any.
pub fn load_config_from_env() -> (GenerationConfig, Option<PathBuf>) {
    let Some(path) = env::var_os(CONFIG_PATH_ENV).map(PathBuf::from) else {
        return (builtin_config(), None);
    };
    match read_config_from_file(&path) {
        Ok(config) => {
            log::info!("generation config loaded from {}", path.display());
            (config, Some(path))
        }
        Err(err) => {
            log::warn!("{err}; falling back to built-in generation config");
            (builtin_config(), None)
        }
    }
}

fn validate(config: &GenerationConfig) -> Result<(), ConfigError> {
    let probabilities = [
        ("regularCrewHelp", config.regular_crew_help),
        ("regularCrewSharedGain", config.regular_crew_shared_gain),
        ("dockedFactor", config.docked_factor),
        ("allowKingHakiFor", config.allow_king_haki_for),
        ("devilFruitDropRate", config.devil_fruit_drop_rate),
        ("recruitStopChance", config.tuning.recruit_stop_chance),
        ("removalChance", config.tuning.removal_chance),
        ("removalStopChance", config.tuning.removal_stop_chance),
        ("moveChance", config.tuning.move_chance),
        ("easierPoolChance", config.tuning.easier_pool_chance),
        ("samePoolChance", config.tuning.same_pool_chance),
    ];
    for (field, value) in probabilities {
        if !(0.0..=1.0).contains(&value) {
            return Err(ConfigError::Invalid {
                field,
                reason: "must be within 0..=1",
            });
        }
    }
    if config.tuning.easier_pool_chance > config.tuning.same_pool_chance {
        return Err(ConfigError::Invalid {
            field: "easierPoolChance",
            reason: "must not exceed samePoolChance",
        });
    }
    if config.ship_factor == 0 {
        return Err(ConfigError::Invalid {
            field: "shipFactor",
            reason: "must be at least 1",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_matches_defaults() {
        assert_eq!(builtin_config(), GenerationConfig::default());
    }

    #[test]
    fn misspelled_shichibukai_key_accepted() {
        let config = read_config_from_str(r#"{ "schichibukai": 3, "shipFactor": 2 }"#).unwrap();
        assert_eq!(config.shichibukai_count, 3);
        assert_eq!(config.ship_factor, 2);
        assert_eq!(config.yonkou_count, 4);
    }

    #[test]
    fn out_of_range_probability_rejected() {
        let err = read_config_from_str(r#"{ "dockedFactor": 1.5 }"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field: "dockedFactor", .. }));
    }

    #[test]
    fn malformed_json_is_parse_error() {
        assert!(matches!(read_config_from_str("{ nope"), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn missing_file_is_read_error() {
        let err = read_config_from_file(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
