use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub elevation: ElevationConfig,
    pub privilege: PrivilegeConfig,
    pub notify: NotifyConfig,
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind_host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub busy_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElevationConfig {
    pub challenge_ttl_secs: i64,
    pub grant_ttl_secs: i64,
    pub activation_secs: i64,
    pub sweep_interval_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ToggleKind {
    Sudoers,
    DryRun,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivilegeConfig {
    pub toggle: ToggleKind,
    pub sudoers_path: PathBuf,
    pub block_start: String,
    pub block_end: String,
    pub rule_user: String,
    pub validate_command: String,
    pub use_sudo: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub telegram_api_base: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_expiry_hours: u64,
    pub enable_cors: bool,
    pub cors_origins: Vec<String>,
    pub enable_audit_logging: bool,
}

impl StorageConfig {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("elevation.db")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join("locks").join("privilege.lock")
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let environment = match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            Ok("staging") | Ok("stage") => Environment::Staging,
            _ => Environment::Development,
        };

        // Set defaults based on environment, then override with specific env vars
        match environment {
            Environment::Production => Self::production(),
            Environment::Staging => Self::staging(),
            Environment::Development => Self::development(),
        }
        .with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        // Server overrides
        if let Ok(v) = env::var("SERVER_BIND_HOST") {
            self.server.bind_host = v;
        }
        if let Some(v) = env::var("ENGINEX_PORT").ok().or_else(|| env::var("PORT").ok()) {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }

        // Storage overrides
        if let Ok(v) = env::var("STORAGE_DATA_DIR") {
            self.storage.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("STORAGE_BUSY_TIMEOUT_MS") {
            self.storage.busy_timeout_ms = v.parse().unwrap_or(self.storage.busy_timeout_ms);
        }

        // Elevation overrides
        if let Ok(v) = env::var("ELEVATION_CHALLENGE_TTL_SECS") {
            self.elevation.challenge_ttl_secs = v.parse().unwrap_or(self.elevation.challenge_ttl_secs);
        }
        if let Ok(v) = env::var("ELEVATION_GRANT_TTL_SECS") {
            self.elevation.grant_ttl_secs = v.parse().unwrap_or(self.elevation.grant_ttl_secs);
        }
        if let Ok(v) = env::var("ELEVATION_ACTIVATION_SECS") {
            self.elevation.activation_secs = v.parse().unwrap_or(self.elevation.activation_secs);
        }
        if let Ok(v) = env::var("ELEVATION_SWEEP_INTERVAL_SECS") {
            self.elevation.sweep_interval_secs = v.parse().unwrap_or(self.elevation.sweep_interval_secs);
        }

        // Privilege overrides
        if let Ok(v) = env::var("PRIVILEGE_TOGGLE") {
            self.privilege.toggle = match v.as_str() {
                "dry-run" | "dryrun" => ToggleKind::DryRun,
                "sudoers" => ToggleKind::Sudoers,
                _ => self.privilege.toggle,
            };
        }
        if let Ok(v) = env::var("PRIVILEGE_SUDOERS_PATH") {
            self.privilege.sudoers_path = PathBuf::from(v);
        }
        if let Ok(v) = env::var("PRIVILEGE_BLOCK_START") {
            self.privilege.block_start = v;
        }
        if let Ok(v) = env::var("PRIVILEGE_BLOCK_END") {
            self.privilege.block_end = v;
        }
        if let Ok(v) = env::var("PRIVILEGE_RULE_USER") {
            self.privilege.rule_user = v;
        }
        if let Ok(v) = env::var("PRIVILEGE_VALIDATE_COMMAND") {
            self.privilege.validate_command = v;
        }
        if let Ok(v) = env::var("PRIVILEGE_USE_SUDO") {
            self.privilege.use_sudo = v.parse().unwrap_or(self.privilege.use_sudo);
        }

        // Notify overrides
        if let Ok(v) = env::var("TELEGRAM_BOT_TOKEN") {
            self.notify.telegram_bot_token = Some(v).filter(|s| !s.is_empty());
        }
        if let Ok(v) = env::var("TELEGRAM_CHAT_ID") {
            self.notify.telegram_chat_id = Some(v).filter(|s| !s.is_empty());
        }
        if let Ok(v) = env::var("TELEGRAM_API_BASE") {
            self.notify.telegram_api_base = v;
        }
        if let Ok(v) = env::var("NOTIFY_TIMEOUT_SECS") {
            self.notify.timeout_secs = v.parse().unwrap_or(self.notify.timeout_secs);
        }

        // Security overrides
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("SECURITY_JWT_EXPIRY_HOURS") {
            self.security.jwt_expiry_hours = v.parse().unwrap_or(self.security.jwt_expiry_hours);
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_CORS") {
            self.security.enable_cors = v.parse().unwrap_or(self.security.enable_cors);
        }
        if let Ok(v) = env::var("SECURITY_CORS_ORIGINS") {
            self.security.cors_origins = v.split(',').map(|s| s.trim().to_string()).collect();
        }
        if let Ok(v) = env::var("SECURITY_ENABLE_AUDIT_LOGGING") {
            self.security.enable_audit_logging = v.parse().unwrap_or(self.security.enable_audit_logging);
        }

        self
    }

    fn base_privilege() -> PrivilegeConfig {
        PrivilegeConfig {
            toggle: ToggleKind::Sudoers,
            sudoers_path: PathBuf::from("/etc/sudoers.d/nginx-dash"),
            block_start: "# ===== BLOQUE TEMPORAL =====".to_string(),
            block_end: "# ===== FIN BLOQUE TEMPORAL =====".to_string(),
            rule_user: "www-data".to_string(),
            validate_command: "/usr/sbin/visudo -cf {path}".to_string(),
            use_sudo: true,
        }
    }

    fn base_elevation() -> ElevationConfig {
        ElevationConfig {
            challenge_ttl_secs: 300,
            grant_ttl_secs: 1800,
            activation_secs: 600,
            sweep_interval_secs: 30,
        }
    }

    fn base_notify() -> NotifyConfig {
        NotifyConfig {
            telegram_bot_token: None,
            telegram_chat_id: None,
            telegram_api_base: "https://api.telegram.org".to_string(),
            timeout_secs: 10,
        }
    }

    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                bind_host: "127.0.0.1".to_string(),
                port: 3000,
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("./data"),
                busy_timeout_ms: 5_000,
            },
            elevation: Self::base_elevation(),
            privilege: PrivilegeConfig {
                toggle: ToggleKind::DryRun,
                use_sudo: false,
                ..Self::base_privilege()
            },
            notify: Self::base_notify(),
            security: SecurityConfig {
                jwt_secret: "development-secret-change-me".to_string(),
                jwt_expiry_hours: 24,
                enable_cors: true,
                cors_origins: vec!["http://localhost:3000".to_string(), "http://localhost:5173".to_string()],
                enable_audit_logging: true,
            },
        }
    }

    pub fn staging() -> Self {
        Self {
            environment: Environment::Staging,
            server: ServerConfig {
                bind_host: "127.0.0.1".to_string(),
                port: 3000,
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("/var/www/panel/data"),
                busy_timeout_ms: 5_000,
            },
            elevation: Self::base_elevation(),
            privilege: Self::base_privilege(),
            notify: Self::base_notify(),
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 8,
                enable_cors: true,
                cors_origins: vec!["https://staging.example.com".to_string()],
                enable_audit_logging: true,
            },
        }
    }

    pub fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                bind_host: "127.0.0.1".to_string(),
                port: 3000,
            },
            storage: StorageConfig {
                data_dir: PathBuf::from("/var/www/panel/data"),
                busy_timeout_ms: 10_000,
            },
            elevation: ElevationConfig {
                sweep_interval_secs: 15,
                ..Self::base_elevation()
            },
            privilege: Self::base_privilege(),
            notify: Self::base_notify(),
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_expiry_hours: 1,
                enable_cors: false,
                cors_origins: Vec::new(),
                enable_audit_logging: true,
            },
        }
    }
}

// Global singleton config - initialized once at startup
pub static CONFIG: Lazy<AppConfig> = Lazy::new(AppConfig::from_env);

// Convenience function for accessing config
pub fn config() -> &'static AppConfig {
    &CONFIG
}

#[macro_export]
macro_rules! is_production {
    () => {
        matches!($crate::config::CONFIG.environment, $crate::config::Environment::Production)
    };
}
