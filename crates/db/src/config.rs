// Copyright (C) 2026 Ryan Daum <ryan.daum@gmail.com> This program is free
// software: you can redistribute it and/or modify it under the terms of the GNU
// General Public License as published by the Free Software Foundation, version
// 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use std::path::Path;

use eyre::eyre;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Yaml};
use serde::{Deserialize, Serialize};
use tessera_common::StoreNumber;

use crate::catalog::MAX_PARTITIONS;
use crate::dialect::LockMode;

pub const DEFAULT_BULK_THRESHOLD: usize = 32;
pub const ENV_PREFIX: &str = "TESSERA_";

/// The map (storage namespace) an engine writes to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub id: String,
    /// Packed into every store number; at most 4095.
    pub number: u16,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            id: "default".to_string(),
            number: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub map: MapConfig,
    /// Recorded as `app_id` on every row written.
    pub app_id: String,
    /// Recorded as `author` on rows written, when set.
    pub author: Option<String>,
    /// Requests with at least this many feature operations run on the bulk executor.
    pub bulk_threshold: usize,
    /// Reaction to rows or a database locked by another writer.
    pub lock_mode: LockMode,
    /// How long a write blocks on a lock under [`LockMode::Wait`].
    pub lock_wait_ms: u64,
    /// Partition count of collections created without one.
    pub default_partitions: u16,
    pub max_partitions: u16,
    /// Upper bound on ids bound into one prefetch query.
    pub max_query_params: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            map: MapConfig::default(),
            app_id: "tessera".to_string(),
            author: None,
            bulk_threshold: DEFAULT_BULK_THRESHOLD,
            lock_mode: LockMode::NoWait,
            lock_wait_ms: 5000,
            default_partitions: 1,
            max_partitions: MAX_PARTITIONS,
            max_query_params: 30000,
        }
    }
}

impl EngineConfig {
    /// Defaults, overlaid with `config_file` (YAML, or JSON by extension) when given, overlaid
    /// with `TESSERA_`-prefixed environment variables.
    pub fn load(config_file: Option<&Path>) -> Result<Self, eyre::Report> {
        let mut figment = Figment::new().merge(Serialized::defaults(EngineConfig::default()));
        if let Some(config_file) = config_file {
            let is_json = config_file
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
            figment = if is_json {
                figment.merge(Json::file(config_file))
            } else {
                figment.merge(Yaml::file(config_file))
            };
        }
        let config: EngineConfig = figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| eyre!("Invalid engine configuration: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, eyre::Report> {
        let config: EngineConfig = Figment::new()
            .merge(Serialized::defaults(EngineConfig::default()))
            .merge(Yaml::string(yaml))
            .extract()
            .map_err(|e| eyre!("Invalid engine configuration: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), eyre::Report> {
        if self.map.number > StoreNumber::MAX_MAP {
            return Err(eyre!(
                "map number {} exceeds {}",
                self.map.number,
                StoreNumber::MAX_MAP
            ));
        }
        if self.max_partitions == 0 || self.max_partitions > MAX_PARTITIONS {
            return Err(eyre!(
                "max_partitions must be between 1 and {MAX_PARTITIONS}"
            ));
        }
        if self.default_partitions > self.max_partitions {
            return Err(eyre!(
                "default_partitions {} exceeds max_partitions {}",
                self.default_partitions,
                self.max_partitions
            ));
        }
        if self.bulk_threshold == 0 {
            return Err(eyre!("bulk_threshold must be at least 1"));
        }
        if self.max_query_params == 0 {
            return Err(eyre!("max_query_params must be at least 1"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.bulk_threshold, 32);
        assert_eq!(config.lock_mode, LockMode::NoWait);
    }

    #[test]
    fn test_yaml_overrides() {
        let config = EngineConfig::from_yaml_str(
            r#"
map:
  id: city
  number: 7
author: alice
bulk_threshold: 4
lock_mode: wait
lock_wait_ms: 250
default_partitions: 8
"#,
        )
        .unwrap();
        assert_eq!(config.map.id, "city");
        assert_eq!(config.map.number, 7);
        assert_eq!(config.author.as_deref(), Some("alice"));
        assert_eq!(config.bulk_threshold, 4);
        assert_eq!(config.lock_mode, LockMode::Wait);
        assert_eq!(config.lock_wait_ms, 250);
        assert_eq!(config.default_partitions, 8);
        assert_eq!(config.app_id, "tessera");
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(EngineConfig::from_yaml_str("map: {number: 5000}").is_err());
        assert!(EngineConfig::from_yaml_str("bulk_threshold: 0").is_err());
        assert!(EngineConfig::from_yaml_str("default_partitions: 300").is_err());
        assert!(EngineConfig::from_yaml_str("lock_mode: sometimes").is_err());
    }
}
