use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSeed {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub database_path: PathBuf,
    pub uploads_dir: PathBuf,
    pub jwt_secret: String,
    pub token_ttl: Duration,
    pub max_upload_bytes: usize,
    pub cors_allowed_origins: Vec<String>,
    pub admin_seed: Option<AdminSeed>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            database_path: PathBuf::from("data/civicwatch.sqlite"),
            uploads_dir: PathBuf::from("uploads"),
            jwt_secret: String::new(),
            token_ttl: Duration::from_secs(24 * 60 * 60),
            max_upload_bytes: 5 * 1024 * 1024,
            cors_allowed_origins: Vec::new(),
            admin_seed: None,
        }
    }
}

pub fn validate_startup_config(config: &ServerConfig) -> Result<(), String> {
    if config.jwt_secret.trim().is_empty() {
        return Err("jwt secret must be set".to_string());
    }
    if config.token_ttl.is_zero() {
        return Err("token ttl must be > 0".to_string());
    }
    if config.max_upload_bytes == 0 {
        return Err("max upload bytes must be > 0".to_string());
    }
    if config.bind_addr.parse::<std::net::SocketAddr>().is_err() {
        return Err(format!("invalid bind addr: {}", config.bind_addr));
    }
    if let Some(seed) = &config.admin_seed {
        if seed.email.trim().is_empty() || seed.password.trim().is_empty() {
            return Err("admin seed requires both email and password".to_string());
        }
    }
    Ok(())
}
