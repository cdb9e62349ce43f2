use std::time::Duration;

use crate::constants::net;

/// How remote player name tags are drawn by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameTagMode {
    /// No name tags
    Off,
    /// Full name tag above the sprite
    Normal,
    /// Condensed tag for crowded rooms
    Compact,
}

impl NameTagMode {
    fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "off" => Some(Self::Off),
            "normal" => Some(Self::Normal),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Engine configuration, supplied by the host at startup
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Relay server address handed to the transport
    pub remote_addr: String,
    /// Display name broadcast to peers (empty = anonymous)
    pub display_name: String,
    /// Name-tag rendering mode
    pub name_tag_mode: NameTagMode,
    /// Delay before the single automatic reconnect attempt
    pub reconnect_delay: Duration,
    /// Keep-alive emission interval while connected
    pub keepalive_interval: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_addr: "wss://localhost:8028".to_string(),
            display_name: String::new(),
            name_tag_mode: NameTagMode::Normal,
            reconnect_delay: Duration::from_millis(net::RECONNECT_DELAY_MS),
            keepalive_interval: Duration::from_millis(net::KEEPALIVE_INTERVAL_MS),
        }
    }
}

impl SyncConfig {
    /// Load config from environment or use defaults
    pub fn load_or_default() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("SYNC_REMOTE_ADDR") {
            if !addr.is_empty() {
                config.remote_addr = addr;
            } else {
                tracing::warn!("SYNC_REMOTE_ADDR is empty, using default");
            }
        }

        if let Ok(name) = std::env::var("SYNC_DISPLAY_NAME") {
            config.display_name = name;
        }

        if let Ok(mode) = std::env::var("SYNC_NAME_TAG_MODE") {
            if let Some(parsed) = NameTagMode::parse(&mode) {
                config.name_tag_mode = parsed;
            } else {
                tracing::warn!("Invalid SYNC_NAME_TAG_MODE '{}', using default", mode);
            }
        }

        if let Ok(delay) = std::env::var("SYNC_RECONNECT_DELAY_MS") {
            if let Ok(parsed) = delay.parse::<u64>() {
                if parsed > 0 {
                    config.reconnect_delay = Duration::from_millis(parsed);
                } else {
                    tracing::warn!("SYNC_RECONNECT_DELAY_MS must be > 0, using default");
                }
            } else {
                tracing::warn!("Invalid SYNC_RECONNECT_DELAY_MS '{}', using default", delay);
            }
        }

        if let Ok(interval) = std::env::var("SYNC_KEEPALIVE_INTERVAL_MS") {
            if let Ok(parsed) = interval.parse::<u64>() {
                if parsed > 0 {
                    config.keepalive_interval = Duration::from_millis(parsed);
                } else {
                    tracing::warn!("SYNC_KEEPALIVE_INTERVAL_MS must be > 0, using default");
                }
            } else {
                tracing::warn!(
                    "Invalid SYNC_KEEPALIVE_INTERVAL_MS '{}', using default",
                    interval
                );
            }
        }

        config
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.remote_addr.is_empty() {
            return Err(ConfigError::MissingRemoteAddr);
        }
        if self.display_name.len() > 64 {
            return Err(ConfigError::DisplayNameTooLong(self.display_name.len()));
        }
        if self.reconnect_delay.is_zero() {
            return Err(ConfigError::ZeroDuration("reconnect_delay"));
        }
        if self.keepalive_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("keepalive_interval"));
        }
        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("remote address must not be empty")]
    MissingRemoteAddr,
    #[error("display name too long: {0} bytes (max 64)")]
    DisplayNameTooLong(usize),
    #[error("{0} must be non-zero")]
    ZeroDuration(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.name_tag_mode, NameTagMode::Normal);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_empty_addr() {
        let config = SyncConfig {
            remote_addr: String::new(),
            ..SyncConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingRemoteAddr)
        ));
    }

    #[test]
    fn test_validate_long_name() {
        let config = SyncConfig {
            display_name: "x".repeat(100),
            ..SyncConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DisplayNameTooLong(100))
        ));
    }

    #[test]
    fn test_name_tag_mode_parse() {
        assert_eq!(NameTagMode::parse("off"), Some(NameTagMode::Off));
        assert_eq!(NameTagMode::parse("Normal"), Some(NameTagMode::Normal));
        assert_eq!(NameTagMode::parse("COMPACT"), Some(NameTagMode::Compact));
        assert_eq!(NameTagMode::parse("sideways"), None);
    }
}
