// ============================================================================
// Module : error
// ============================================================================
// Erreurs typées de la librairie
//
// CONCEPT RUST : thiserror
// - #[derive(Error)] génère l'implémentation de std::error::Error
// - #[error("...")] définit le message Display (ici : message utilisateur)
// - #[from] génère la conversion automatique pour l'opérateur ?
//
// Le contrôleur de session a besoin de distinguer les cas (session expirée
// vs erreur passagère), d'où un enum plutôt qu'un anyhow::Error.
// ============================================================================

use thiserror::Error;

/// Message affiché quand l'API refuse les identifiants
pub const LOGIN_FAILED_MESSAGE: &str = "Falha no login. Verifique suas credenciais.";

/// Erreurs du stockage clé-valeur
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Erro de leitura/escrita do armazenamento : {0}")]
    Io(#[from] std::io::Error),

    #[error("Armazenamento corrompido : {0}")]
    Json(#[from] serde_json::Error),
}

/// Erreurs des clients API (login + cotação)
#[derive(Debug, Error)]
pub enum ApiError {
    /// Identifiants refusés (réponse non-2xx sur /login)
    #[error("{0}")]
    Authentication(String),

    /// Pas de token de session : pas de requête envoyée
    #[error("Nenhum token de autenticação encontrado.")]
    MissingCredential,

    /// Le serveur a répondu 401 : le token envoyé a été effacé du stockage
    #[error("Sessão expirada (Status: 401). Faça login novamente.")]
    AuthorizationExpired,

    /// Toute autre réponse non-2xx
    #[error("Falha ao buscar dados da API. Status: {status}")]
    Fetch { status: u16 },

    /// Réponse 2xx mais corps inattendu (ex: pas de champ token)
    #[error("Resposta inválida da API : {0}")]
    MalformedResponse(String),

    /// Erreur de transport (DNS, connexion, timeout...)
    #[error("Erro de rede : {0}")]
    Network(#[from] reqwest::Error),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Vrai si l'erreur impose un retour à l'écran de login
    pub fn is_authorization_expired(&self) -> bool {
        matches!(self, ApiError::AuthorizationExpired)
    }
}
