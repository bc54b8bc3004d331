// ============================================================================
// Module : config
// ============================================================================
// Configuration de l'application : URL de l'API, intervalle de polling,
// répertoires de données et de logs
//
// Valeurs par défaut, surchargeables par variables d'environnement.
// Seul le binaire lit l'environnement : la lib reçoit un AppConfig.
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::api::DEFAULT_API_URL;
use crate::session::DEFAULT_POLL_INTERVAL;

/// Nom du répertoire applicatif (données + logs)
pub const APP_DIR_NAME: &str = "cotacao";

pub const ENV_API_URL: &str = "COTACAO_API_URL";
pub const ENV_POLL_SECONDS: &str = "COTACAO_POLL_SECONDS";
pub const ENV_DATA_DIR: &str = "COTACAO_DATA_DIR";
pub const ENV_LOG_DIR: &str = "COTACAO_LOG_DIR";

/// Configuration complète
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// URL de base de l'API (se termine par '/')
    pub api_url: String,

    /// Intervalle entre deux fetchs automatiques
    pub poll_interval: Duration,

    /// Répertoire du stockage du token
    pub data_dir: PathBuf,

    /// Répertoire des logs
    pub log_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            log_dir: data_dir.join("logs"),
            data_dir,
        }
    }
}

impl AppConfig {
    /// Lit la configuration depuis l'environnement du processus
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Construit la configuration à partir d'une fonction de lookup
    ///
    /// CONCEPT RUST : Closure en paramètre générique
    /// - Les tests passent une HashMap au lieu de modifier l'environnement
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            config.api_url = url.trim().to_string();
        }

        if let Some(raw) = lookup(ENV_POLL_SECONDS) {
            match raw.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => config.poll_interval = Duration::from_secs(secs),
                _ => warn!(value = %raw, "Invalid {}, using default", ENV_POLL_SECONDS),
            }
        }

        if let Some(dir) = lookup(ENV_DATA_DIR).filter(|v| !v.trim().is_empty()) {
            config.data_dir = PathBuf::from(dir);
            config.log_dir = config.data_dir.join("logs");
        }

        if let Some(dir) = lookup(ENV_LOG_DIR).filter(|v| !v.trim().is_empty()) {
            config.log_dir = PathBuf::from(dir);
        }

        config
    }
}

/// ~/.local/share/cotacao sous Linux, ./.cotacao si introuvable
fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join(APP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(format!(".{}", APP_DIR_NAME)))
}
