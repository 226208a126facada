//! Service configuration, read from flags and environment.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(author, version, about)]
pub struct Config {
    /// Port the HTTP service binds to
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Address the HTTP service binds to
    #[arg(long, env = "BIND_ADDR", default_value = "0.0.0.0")]
    pub bind_addr: String,

    /// Path to the sqlite database file
    #[arg(long, env = "DATABASE_URL", default_value = "appforge.db")]
    pub database_url: String,

    /// Secret used to sign and verify bearer tokens
    #[arg(long, env = "JWT_SECRET", hide_env_values = true)]
    pub jwt_secret: String,

    /// Root directory for per-workspace file trees
    #[arg(long, env = "STORAGE_PATH", default_value = "./storage")]
    pub storage_path: PathBuf,

    /// Allowed CORS origin; permissive when unset
    #[arg(long, env = "CORS_ORIGIN")]
    pub cors_origin: Option<String>,

    /// Directory holding the frontend bundle served as SPA fallback
    #[arg(long, env = "STATIC_DIR")]
    pub static_dir: Option<PathBuf>,

    /// First port handed to dev servers; defaults to the service port + 2
    #[arg(long, env = "DEV_PORT_BASE")]
    pub dev_port_base: Option<u16>,

    /// Maximum number of concurrently running workspaces (port pool size)
    #[arg(long, env = "MAX_WORKSPACES", default_value_t = 100)]
    pub max_workspaces: u16,

    /// Dependency install timeout in seconds
    #[arg(long, env = "INSTALL_TIMEOUT_SECS", default_value_t = 120)]
    pub install_timeout_secs: u64,

    /// Command that installs workspace dependencies
    #[arg(long, env = "INSTALL_COMMAND", default_value = "npm install")]
    pub install_command: String,

    /// Command that starts a workspace dev server; the allocated port is
    /// appended as `-- --port <port>` and exported as `PORT`
    #[arg(long, env = "DEV_COMMAND", default_value = "npm run dev")]
    pub dev_command: String,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub anthropic_api_key: Option<String>,

    #[arg(long, env = "GOOGLE_API_KEY", hide_env_values = true)]
    pub google_api_key: Option<String>,
}

impl Config {
    /// First port of the dev-server pool.
    pub fn dev_port_base(&self) -> u16 {
        self.dev_port_base.unwrap_or(self.port.saturating_add(2))
    }

    /// Credential for a provider name, if configured.
    pub fn api_key_for(&self, provider: &str) -> Option<String> {
        match provider {
            "openai" => self.openai_api_key.clone(),
            "anthropic" => self.anthropic_api_key.clone(),
            "google" => self.google_api_key.clone(),
            _ => None,
        }
    }

    /// Public path under which a workspace's dev server is reachable.
    pub fn preview_url(&self, app_id: i64) -> String {
        format!("/preview/{app_id}")
    }

    #[cfg(test)]
    pub fn for_tests(storage_path: PathBuf) -> Self {
        Self {
            port: 8080,
            bind_addr: "127.0.0.1".to_string(),
            database_url: ":memory:".to_string(),
            jwt_secret: "test-secret".to_string(),
            storage_path,
            cors_origin: None,
            static_dir: None,
            dev_port_base: Some(39000),
            max_workspaces: 4,
            install_timeout_secs: 10,
            install_command: "true".to_string(),
            dev_command: "sh dev.sh".to_string(),
            openai_api_key: None,
            anthropic_api_key: None,
            google_api_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dev_port_base_defaults_above_service_port() {
        let mut config = Config::for_tests(PathBuf::from("/tmp"));
        config.dev_port_base = None;
        config.port = 3000;
        assert_eq!(config.dev_port_base(), 3002);
    }

    #[test]
    fn api_key_lookup_by_provider_name() {
        let mut config = Config::for_tests(PathBuf::from("/tmp"));
        config.openai_api_key = Some("sk-test".into());
        assert_eq!(config.api_key_for("openai").as_deref(), Some("sk-test"));
        assert_eq!(config.api_key_for("anthropic"), None);
        assert_eq!(config.api_key_for("acme"), None);
    }

    #[test]
    fn preview_url_is_path_scoped() {
        let config = Config::for_tests(PathBuf::from("/tmp"));
        assert_eq!(config.preview_url(3), "/preview/3");
    }
}
