// ============================================================================
// Module : models
// ============================================================================
// Structures de données échangées avec l'API de cotação
// ============================================================================

pub mod quote; // Cotação + enveloppe de réponse

// Re-export : use cotacao::models::Quote au lieu de models::quote::Quote
pub use quote::{format_brl, Quote, QuoteEnvelope};
