// ============================================================================
// API Client : Authentification
// ============================================================================
// POST {base}login avec {"username", "password"} -> {"token": "..."}
//
// Une seule tentative par appel, pas de retry.
// ============================================================================

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::{build_http_client, normalize_base_url, Authenticator};
use crate::error::{ApiError, LOGIN_FAILED_MESSAGE};

/// Corps de la requête de login
///
/// CONCEPT RUST : Lifetime 'a
/// - La structure emprunte les identifiants au lieu de les copier
#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Réponse du login (les autres champs éventuels sont ignorés)
#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: Option<String>,
}

/// Client pour POST /login
#[derive(Debug, Clone)]
pub struct AuthClient {
    http: reqwest::Client,
    login_url: String,
}

impl AuthClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Ok(Self {
            http: build_http_client()?,
            login_url: format!("{}login", normalize_base_url(base_url)),
        })
    }

    /// Échange les identifiants contre un token
    ///
    /// # Erreurs
    /// * `Authentication` - réponse non-2xx (identifiants refusés)
    /// * `MalformedResponse` - réponse 2xx sans token exploitable
    /// * `Network` - échec de transport
    #[instrument(skip(self, password), fields(url = %self.login_url))]
    pub async fn login(&self, username: &str, password: &str) -> Result<String, ApiError> {
        debug!("Sending login request");
        let response = self
            .http
            .post(&self.login_url)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let status = response.status();
        debug!(status = %status, "Received login response");

        if !status.is_success() {
            warn!(status = %status, "Login rejected");
            return Err(ApiError::Authentication(LOGIN_FAILED_MESSAGE.to_string()));
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| ApiError::MalformedResponse(e.to_string()))?;

        extract_token(body)
    }
}

#[async_trait]
impl Authenticator for AuthClient {
    async fn login(&self, username: &str, password: &str) -> Result<String, ApiError> {
        AuthClient::login(self, username, password).await
    }
}

/// Extrait le token : absent ou vide => réponse malformée
fn extract_token(body: LoginResponse) -> Result<String, ApiError> {
    match body.token {
        Some(token) if !token.trim().is_empty() => {
            info!("Login successful");
            Ok(token)
        }
        _ => {
            warn!("Login response without token");
            Err(ApiError::MalformedResponse(
                "campo 'token' ausente na resposta de login".to_string(),
            ))
        }
    }
}
