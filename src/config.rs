use figment::{
    Figment,
    providers::{Env, Serialized},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Runtime configuration. Defaults are overridden by `PANEL_*` environment variables,
/// e.g. `PANEL_DATABASE_URL` or `PANEL_WATERMARK_FILE`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,
    pub database_url: String,
    pub loglevel: String,
    /// Shared secret required on every API request.
    pub panel_key: String,
    pub upload_root: PathBuf,
    pub upload_url_prefix: String,
    /// Mark image overlaid on uploaded images; no watermarking when unset.
    pub watermark_file: Option<PathBuf>,
    pub upload_body_limit: usize,
    /// Comma separated list of accepted extensions (`png,jpg,pdf`). Empty accepts any.
    pub upload_extensions: String,
    /// Idle time after which a login session and its cached credentials expire.
    pub session_ttl_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8000".to_string(),
            database_url: "sqlite:dbpanel.sqlite".to_string(),
            loglevel: "info".to_string(),
            panel_key: String::new(),
            upload_root: PathBuf::from("uploads"),
            upload_url_prefix: "/uploads".to_string(),
            watermark_file: None,
            upload_body_limit: 32 * 1024 * 1024,
            upload_extensions: String::new(),
            session_ttl_secs: 12 * 60 * 60,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment().extract()
    }

    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Config::default())).merge(Env::prefixed("PANEL_"))
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    /// Lowercased extensions (without the leading dot) accepted by uploads.
    pub fn allowed_extensions(&self) -> Vec<String> {
        self.upload_extensions
            .split(',')
            .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_extensions_are_normalized() {
        let cfg = Config {
            upload_extensions: " PNG, .jpg ,,pdf".to_string(),
            ..Config::default()
        };
        assert_eq!(cfg.allowed_extensions(), vec!["png", "jpg", "pdf"]);
        assert!(Config::default().allowed_extensions().is_empty());
    }

    #[test]
    fn env_overrides_defaults() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("PANEL_PANEL_KEY", "secret");
            jail.set_env("PANEL_UPLOAD_BODY_LIMIT", "1024");
            jail.set_env("PANEL_SESSION_TTL_SECS", "90");
            let cfg = Config::load()?;
            assert_eq!(cfg.session_ttl(), Duration::from_secs(90));
            assert_eq!(cfg.panel_key, "secret");
            assert_eq!(cfg.upload_body_limit, 1024);
            assert_eq!(cfg.listen_addr, "0.0.0.0:8000");
            Ok(())
        });
    }
}
