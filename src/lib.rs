// ============================================================================
// Cotacao - Library
// ============================================================================
// Expose les modules publics pour le binaire et les tests d'intégration
// ============================================================================

pub mod api;      // Clients HTTP (login, cotação)
pub mod app;      // État de l'interface
pub mod calendar; // Jours ouvrés brésiliens
pub mod config;   // Configuration (défauts + environnement)
pub mod error;    // Erreurs typées
pub mod models;   // Structures de données
pub mod session;  // Contrôleur de session / polling
pub mod storage;  // Stockage clé-valeur du token
pub mod ui;       // Interface utilisateur

pub use error::{ApiError, StorageError};
pub use session::{SessionController, SessionDeps, SessionEvent, SessionState};
