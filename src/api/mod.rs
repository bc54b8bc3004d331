// ============================================================================
// Module : api
// ============================================================================
// Clients de l'API de cotação : login (POST /login) et cotação (GET /)
//
// CONCEPT RUST : Traits async comme points d'injection
// - Le contrôleur de session ne connaît que Authenticator et QuoteSource
// - Les implémentations HTTP (reqwest) vivent dans auth.rs et quote.rs
// - Les tests fournissent leurs propres implémentations
// ============================================================================

pub mod auth;  // Client d'authentification
pub mod quote; // Client de cotação

use async_trait::async_trait;

use crate::error::ApiError;
use crate::models::QuoteEnvelope;

pub use auth::AuthClient;
pub use quote::QuoteClient;

/// URL de base par défaut de l'API
pub const DEFAULT_API_URL: &str = "https://cotacao-api-desafio.onrender.com/";

/// Échange des identifiants contre un token
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self, username: &str, password: &str) -> Result<String, ApiError>;
}

/// Source de cotações authentifiée par bearer token
///
/// Le token est celui de la session qui demande : un 401 n'efface le
/// token stocké que s'il vaut encore celui envoyé.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    async fn get_quote(&self, token: &str) -> Result<QuoteEnvelope, ApiError>;
}

/// Normalise l'URL de base pour qu'elle finisse par '/'
///
/// "http://host:8080" et "http://host:8080/" donnent la même base,
/// ce qui permet de construire "{base}login" avec format!
pub(crate) fn normalize_base_url(base_url: &str) -> String {
    let trimmed = base_url.trim();
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    }
}

/// Client HTTP partagé par les deux clients
pub(crate) fn build_http_client() -> Result<reqwest::Client, ApiError> {
    let client = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .timeout(std::time::Duration::from_secs(30))
        .build()?;
    Ok(client)
}
