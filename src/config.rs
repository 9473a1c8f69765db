use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub policy: PolicyConfig,
    pub warmer: WarmerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl_seconds: u64,
    /// Interval of the background sweep that drops expired decisions
    pub cleanup_interval_seconds: u64,
    /// 0 means unbounded
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: 300, // 5 minutes
            cleanup_interval_seconds: 60,
            max_entries: 100_000,
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.enabled && self.ttl_seconds == 0 {
            return Err(crate::error::GrantWalkError::InvalidConfig(
                "cache.ttl_seconds must be greater than 0".to_string(),
            ));
        }

        if self.cleanup_interval_seconds == 0 {
            return Err(crate::error::GrantWalkError::InvalidConfig(
                "cache.cleanup_interval_seconds must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Grant everything to holders of ALL_PERMISSIONS on the ALL target
    pub super_user_shortcut: bool,
    /// Check ALL_PORTLETS / ALL_CATEGORIES / ALL_GROUPS before the concrete target
    pub collective_targets: bool,
    /// Longest parent chain followed before a branch is abandoned
    pub max_traversal_depth: usize,
    pub seen_groups_capacity: usize,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            super_user_shortcut: true,
            collective_targets: true,
            max_traversal_depth: 256,
            seen_groups_capacity: 100,
        }
    }
}

impl PolicyConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.max_traversal_depth == 0 {
            return Err(crate::error::GrantWalkError::InvalidConfig(
                "policy.max_traversal_depth must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WarmerConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
}

impl Default for WarmerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval_seconds: 240, // refresh ahead of the default TTL
        }
    }
}

impl WarmerConfig {
    pub fn validate(&self) -> crate::Result<()> {
        if self.interval_seconds == 0 {
            return Err(crate::error::GrantWalkError::InvalidConfig(
                "warmer.interval_seconds must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn from_file(path: &str) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::error::GrantWalkError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> crate::Result<()> {
        self.cache.validate()?;
        self.policy.validate()?;
        self.warmer.validate()?;

        if self.logging.level.trim().is_empty() {
            return Err(crate::error::GrantWalkError::InvalidConfig(
                "logging.level cannot be empty".to_string(),
            ));
        }

        Ok(())
    }
}
