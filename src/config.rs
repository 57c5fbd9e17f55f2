//! Configuration for campus-hub

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default data directory
pub fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("campus-hub")
}

/// Configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for the SQLite database and config file
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// HTTP API port
    #[serde(default = "default_http_port")]
    pub http_port: u16,

    /// Maximum pooled database connections
    #[serde(default = "default_max_db_connections")]
    pub max_db_connections: u32,

    /// Auth keys granted the admin role when they onboard or sync
    #[serde(default)]
    pub admin_ids: Vec<String>,
}

fn default_http_port() -> u16 {
    8080
}

fn default_max_db_connections() -> u32 {
    8
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            http_port: default_http_port(),
            max_db_connections: default_max_db_connections(),
            admin_ids: Vec::new(),
        }
    }
}

impl Config {
    /// Load config from file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))
    }

    /// Save config to file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), std::io::Error> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// Get database file path
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("portal.db")
    }

    /// Get config file path
    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.http_port = 9090;
        config.admin_ids = vec!["admin-1".to_string()];
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.http_port, 9090);
        assert_eq!(loaded.admin_ids, vec!["admin-1".to_string()]);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "http_port = 9191\n").unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.http_port, 9191);
        assert_eq!(loaded.max_db_connections, default_max_db_connections());
        assert!(loaded.admin_ids.is_empty());
    }
}
