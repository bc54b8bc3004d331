// ============================================================================
// API Client : Cotação
// ============================================================================
// GET {base} avec "Authorization: Bearer <token>" -> {"value": [Quote, ...]}
//
// Le token est fourni par l'appelant. Sur un 401, ce client efface le token
// stocké avant de signaler l'expiration, mais seulement s'il s'agit encore
// du token envoyé : une session ouverte entre-temps garde le sien.
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{debug, error, instrument, warn};

use super::{build_http_client, normalize_base_url, QuoteSource};
use crate::error::ApiError;
use crate::models::QuoteEnvelope;
use crate::storage::{KeyValueStore, TOKEN_KEY};

/// Client pour GET /
#[derive(Clone)]
pub struct QuoteClient {
    http: reqwest::Client,
    quote_url: String,
    store: Arc<dyn KeyValueStore>,
}

impl QuoteClient {
    pub fn new(base_url: &str, store: Arc<dyn KeyValueStore>) -> Result<Self, ApiError> {
        Ok(Self {
            http: build_http_client()?,
            quote_url: normalize_base_url(base_url),
            store,
        })
    }

    /// Récupère l'enveloppe de cotação avec `token`
    ///
    /// # Erreurs
    /// * `MissingCredential` - token vide (aucune requête envoyée)
    /// * `AuthorizationExpired` - 401, le token stocké a été effacé s'il valait `token`
    /// * `Fetch` - autre statut non-2xx
    /// * `MalformedResponse` / `Network`
    #[instrument(skip(self, token), fields(url = %self.quote_url))]
    pub async fn get_quote(&self, token: &str) -> Result<QuoteEnvelope, ApiError> {
        if token.is_empty() {
            warn!("No token, skipping request");
            return Err(ApiError::MissingCredential);
        }

        debug!("Sending quote request");
        let response = self
            .http
            .get(&self.quote_url)
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        debug!(status = %status, "Received quote response");

        if status == StatusCode::UNAUTHORIZED {
            if self.store.remove_item_if(TOKEN_KEY, token).await? {
                warn!("Token rejected by API, cleared stored token");
            } else {
                warn!("Token rejected by API, stored token already replaced");
            }
            return Err(ApiError::AuthorizationExpired);
        }

        if !status.is_success() {
            error!(status = %status, "Quote API returned error status");
            return Err(ApiError::Fetch {
                status: status.as_u16(),
            });
        }

        let envelope: QuoteEnvelope = response
            .json()
            .await
            .map_err(|e| ApiError::MalformedResponse(e.to_string()))?;

        debug!(quotes = envelope.value.len(), "Parsed quote envelope");
        Ok(envelope)
    }
}

#[async_trait]
impl QuoteSource for QuoteClient {
    async fn get_quote(&self, token: &str) -> Result<QuoteEnvelope, ApiError> {
        QuoteClient::get_quote(self, token).await
    }
}
