//! World configuration.
//!
//! Capacity knobs only; none of them are hard limits. Entity ids and pool
//! storage grow past the configured capacities, the values just size the
//! initial allocations.

use std::path::Path;

use serde::Deserialize;

use crate::error::{EcsError, EcsResult};

/// Startup configuration for a [`World`](crate::World).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Initial capacity of the entity registry (id rows, free queue).
    pub entity_capacity: usize,
    /// Initial dense-array reservation of each component pool.
    pub component_capacity: usize,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            entity_capacity: 1024,
            component_capacity: 256,
        }
    }
}

impl WorldConfig {
    /// Parse a config from TOML text. Missing keys fall back to defaults.
    pub fn from_toml_str(text: &str) -> EcsResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a config from a TOML file on disk.
    pub fn load(path: impl AsRef<Path>) -> EcsResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| EcsError::ConfigIo {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_empty_toml() {
        let parsed = WorldConfig::from_toml_str("").expect("empty toml should parse");
        let defaults = WorldConfig::default();
        assert_eq!(parsed.entity_capacity, defaults.entity_capacity);
        assert_eq!(parsed.component_capacity, defaults.component_capacity);
    }

    #[test]
    fn partial_toml_overrides_only_named_keys() {
        let parsed = WorldConfig::from_toml_str("entity_capacity = 16").expect("should parse");
        assert_eq!(parsed.entity_capacity, 16);
        assert_eq!(
            parsed.component_capacity,
            WorldConfig::default().component_capacity
        );
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        writeln!(file, "entity_capacity = 8\ncomponent_capacity = 4").expect("write");

        let config = WorldConfig::load(file.path()).expect("load");
        assert_eq!(config.entity_capacity, 8);
        assert_eq!(config.component_capacity, 4);
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let err = WorldConfig::load("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, EcsError::ConfigIo { .. }));
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let err = WorldConfig::from_toml_str("entity_capacity = \"lots\"").unwrap_err();
        assert!(matches!(err, EcsError::ConfigParse(_)));
    }
}
