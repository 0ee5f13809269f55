use serde::{Deserialize, Serialize};
use crate::core::{MappingError, Result};
use crate::descriptor::EmbeddedMode;

/// Environment variable holding the metadata cache capacity.
pub const ENV_CACHE_CAPACITY: &str = "DOCMAPPER_CACHE_CAPACITY";
/// Environment variable enabling generated string identifiers.
pub const ENV_GENERATE_STRING_IDS: &str = "DOCMAPPER_GENERATE_STRING_IDS";
/// Environment variable holding the default embedded mode.
pub const ENV_EMBEDDED_MODE: &str = "DOCMAPPER_EMBEDDED_MODE";

/// Mapper configuration
///
/// ```
/// use docmapper::{EmbeddedMode, MapperConfig};
///
/// let config = MapperConfig::new()
///     .cache_capacity(64)
///     .default_embedded_mode(EmbeddedMode::Imploded);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapperConfig {
    /// Maximum number of classes kept in the metadata cache
    pub cache_capacity: usize,

    /// Assign a UUID to unset string identifiers on insert
    pub generate_string_ids: bool,

    /// Storage mode of embedded fields that do not choose one
    pub default_embedded_mode: EmbeddedMode,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 256,
            generate_string_ids: true,
            default_embedded_mode: EmbeddedMode::Exploded,
        }
    }
}

impl MapperConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the metadata cache capacity
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Enable or disable generated string identifiers
    pub fn generate_string_ids(mut self, generate: bool) -> Self {
        self.generate_string_ids = generate;
        self
    }

    /// Set the default embedded mode
    pub fn default_embedded_mode(mut self, mode: EmbeddedMode) -> Self {
        self.default_embedded_mode = mode;
        self
    }

    /// Parse from JSON; missing keys keep their defaults.
    ///
    /// ```
    /// # use docmapper::MapperConfig;
    /// let config = MapperConfig::from_json(r#"{"cache_capacity": 16}"#)?;
    /// assert_eq!(config.cache_capacity, 16);
    /// assert!(config.generate_string_ids);
    /// # Ok::<(), docmapper::MappingError>(())
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| MappingError::Configuration(format!("invalid mapper configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read overrides from `DOCMAPPER_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Like [`from_env`](Self::from_env), with variables read through `lookup`.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_CACHE_CAPACITY) {
            config.cache_capacity = raw
                .trim()
                .parse()
                .map_err(|_| invalid_var(ENV_CACHE_CAPACITY, &raw))?;
        }

        if let Some(raw) = lookup(ENV_GENERATE_STRING_IDS) {
            config.generate_string_ids = match raw.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                _ => return Err(invalid_var(ENV_GENERATE_STRING_IDS, &raw)),
            };
        }

        if let Some(raw) = lookup(ENV_EMBEDDED_MODE) {
            config.default_embedded_mode = match raw.trim().to_ascii_lowercase().as_str() {
                "exploded" => EmbeddedMode::Exploded,
                "imploded" => EmbeddedMode::Imploded,
                _ => return Err(invalid_var(ENV_EMBEDDED_MODE, &raw)),
            };
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(MappingError::Configuration(
                "cache_capacity must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn invalid_var(name: &str, raw: &str) -> MappingError {
    MappingError::Configuration(format!("{} has an invalid value '{}'", name, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = MapperConfig::default();
        assert_eq!(config.cache_capacity, 256);
        assert!(config.generate_string_ids);
        assert_eq!(config.default_embedded_mode, EmbeddedMode::Exploded);
        assert_eq!(MapperConfig::from_vars(vars(&[])).unwrap(), config);
    }

    #[test]
    fn test_from_json() {
        let config = MapperConfig::from_json(
            r#"{"generate_string_ids": false, "default_embedded_mode": "imploded"}"#,
        )
        .unwrap();
        assert_eq!(config.cache_capacity, 256);
        assert!(!config.generate_string_ids);
        assert_eq!(config.default_embedded_mode, EmbeddedMode::Imploded);

        assert!(MapperConfig::from_json(r#"{"cache_capacity": 0}"#).is_err());
        assert!(MapperConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_from_vars() {
        let config = MapperConfig::from_vars(vars(&[
            (ENV_CACHE_CAPACITY, " 12 "),
            (ENV_GENERATE_STRING_IDS, "off"),
            (ENV_EMBEDDED_MODE, "Imploded"),
        ]))
        .unwrap();
        assert_eq!(config.cache_capacity, 12);
        assert!(!config.generate_string_ids);
        assert_eq!(config.default_embedded_mode, EmbeddedMode::Imploded);

        let err = MapperConfig::from_vars(vars(&[(ENV_CACHE_CAPACITY, "many")])).unwrap_err();
        assert!(err.to_string().contains(ENV_CACHE_CAPACITY));
        assert!(MapperConfig::from_vars(vars(&[(ENV_CACHE_CAPACITY, "0")])).is_err());
    }
}
