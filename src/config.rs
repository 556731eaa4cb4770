use std::collections::HashMap;
use std::net::IpAddr;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_BACKUP_PREFIX: &str = "pharmacy_backup";
pub const DEFAULT_DOWNLOAD_URL_PREFIX: &str = "/api/backup/download";

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub database_path: PathBuf,
    pub backup_dir: PathBuf,
    pub backup_prefix: String,
    pub download_url_prefix: String,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let host = env_map
            .get("HOST")
            .map(|s| s.as_str())
            .unwrap_or("127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|_| {
                ConfigError::InvalidValue("HOST".to_string(), "must be an IP address".to_string())
            })?;

        let port = env_map
            .get("PORT")
            .map(|s| s.as_str())
            .unwrap_or("8080")
            .parse::<u16>()
            .map_err(|_| {
                ConfigError::InvalidValue("PORT".to_string(), "must be a valid u16".to_string())
            })?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let backup_dir = env_map
            .get("BACKUP_DIR")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(std::env::temp_dir);

        let backup_prefix = env_map
            .get("BACKUP_PREFIX")
            .cloned()
            .unwrap_or_else(|| DEFAULT_BACKUP_PREFIX.to_string());
        if backup_prefix.is_empty()
            || !backup_prefix
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(ConfigError::InvalidValue(
                "BACKUP_PREFIX".to_string(),
                format!("must be non-empty [A-Za-z0-9_-], got {}", backup_prefix),
            ));
        }

        let download_url_prefix = env_map
            .get("DOWNLOAD_URL_PREFIX")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_DOWNLOAD_URL_PREFIX.to_string());

        Ok(Config {
            host,
            port,
            database_path,
            backup_dir,
            backup_prefix,
            download_url_prefix,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup_required_env() -> HashMap<String, String> {
        let mut map = HashMap::new();
        map.insert("DATABASE_PATH".to_string(), "/tmp/app.db".to_string());
        map
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_env_map(setup_required_env()).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.host, IpAddr::from([127, 0, 0, 1]));
        assert_eq!(config.database_path, PathBuf::from("/tmp/app.db"));
        assert_eq!(config.backup_dir, std::env::temp_dir());
        assert_eq!(config.backup_prefix, "pharmacy_backup");
        assert_eq!(config.download_url_prefix, "/api/backup/download");
    }

    #[test]
    fn test_missing_database_path() {
        let mut env_map = setup_required_env();
        env_map.remove("DATABASE_PATH");
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::MissingEnv(s)) => assert_eq!(s, "DATABASE_PATH"),
            _ => panic!("Expected MissingEnv error"),
        }
    }

    #[test]
    fn test_blank_database_path_is_missing() {
        let mut env_map = setup_required_env();
        env_map.insert("DATABASE_PATH".to_string(), "  ".to_string());
        assert!(matches!(
            Config::from_env_map(env_map),
            Err(ConfigError::MissingEnv(_))
        ));
    }

    #[test]
    fn test_invalid_port() {
        let mut env_map = setup_required_env();
        env_map.insert("PORT".to_string(), "not_a_number".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "PORT"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_invalid_host() {
        let mut env_map = setup_required_env();
        env_map.insert("HOST".to_string(), "localhost".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "HOST"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_backup_prefix_rejects_path_characters() {
        let mut env_map = setup_required_env();
        env_map.insert("BACKUP_PREFIX".to_string(), "../evil".to_string());
        let result = Config::from_env_map(env_map);
        match result {
            Err(ConfigError::InvalidValue(k, _)) => assert_eq!(k, "BACKUP_PREFIX"),
            _ => panic!("Expected InvalidValue error"),
        }
    }

    #[test]
    fn test_overrides() {
        let mut env_map = setup_required_env();
        env_map.insert("BACKUP_DIR".to_string(), "/var/backups".to_string());
        env_map.insert("BACKUP_PREFIX".to_string(), "clinic".to_string());
        env_map.insert(
            "DOWNLOAD_URL_PREFIX".to_string(),
            "/admin/backups/".to_string(),
        );
        env_map.insert("PORT".to_string(), "5000".to_string());

        let config = Config::from_env_map(env_map).unwrap();
        assert_eq!(config.backup_dir, PathBuf::from("/var/backups"));
        assert_eq!(config.backup_prefix, "clinic");
        assert_eq!(config.download_url_prefix, "/admin/backups");
        assert_eq!(config.port, 5000);
    }
}
