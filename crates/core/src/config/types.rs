use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::announce::Locale;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub announcement: AnnouncementConfig,
    #[serde(default)]
    pub view: ViewConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_port() -> u16 {
    8080
}

/// Database configuration. Tickets, patients and counters share one file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("frontdesk.db")
}

/// Dispatch engine tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatchConfig {
    /// How many times call-next re-reads and retries after a conflicting write.
    #[serde(default = "default_max_conflict_retries")]
    pub max_conflict_retries: u32,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: default_max_conflict_retries(),
        }
    }
}

fn default_max_conflict_retries() -> u32 {
    3
}

/// Spoken announcement configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AnnouncementConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Locale tag, `pt-BR` or `en-US`.
    #[serde(default = "default_locale")]
    pub locale: String,
    /// Capacity of the announcement channel.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl AnnouncementConfig {
    /// Parsed locale; falls back to the default for unknown tags.
    pub fn locale(&self) -> Locale {
        self.locale.parse().unwrap_or_default()
    }
}

impl Default for AnnouncementConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            locale: default_locale(),
            buffer_size: default_buffer_size(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_locale() -> String {
    Locale::default().tag().to_string()
}

fn default_buffer_size() -> usize {
    64
}

/// Queue view configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ViewConfig {
    /// Periodic full refresh, on top of change notifications.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

impl ViewConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

fn default_refresh_interval() -> u64 {
    5
}
