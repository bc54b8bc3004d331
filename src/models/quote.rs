// ============================================================================
// Structures : Quote / QuoteEnvelope
// ============================================================================
// Représente la cotação du dollar renvoyée par l'API
//
// Le JSON de l'API utilise des noms en portugais camelCase :
//   {"value": [{"cotacaoCompra": 5.10, "cotacaoVenda": 5.15,
//               "dataHoraCotacao": "2024-01-02T10:00:00"}]}
//
// CONCEPT RUST : #[serde(rename = "...")]
// - Les champs Rust restent en snake_case
// - Serde fait la correspondance avec le nom JSON
// ============================================================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Formats acceptés pour dataHoraCotacao (avec T ou espace, millis optionnels)
const TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Une cotação : taux d'achat, taux de vente et horodatage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Taux d'achat (compra)
    #[serde(rename = "cotacaoCompra")]
    pub buy: f64,

    /// Taux de vente (venda)
    #[serde(rename = "cotacaoVenda")]
    pub sell: f64,

    /// Horodatage brut tel que renvoyé par l'API
    #[serde(rename = "dataHoraCotacao")]
    pub quoted_at: String,
}

impl Quote {
    pub fn new(buy: f64, sell: f64, quoted_at: impl Into<String>) -> Self {
        Self {
            buy,
            sell,
            quoted_at: quoted_at.into(),
        }
    }

    /// Parse l'horodatage (None si format inconnu)
    pub fn timestamp(&self) -> Option<NaiveDateTime> {
        TIMESTAMP_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(&self.quoted_at, fmt).ok())
    }

    /// Horodatage au format brésilien (dd/mm/yyyy, HH:MM:SS)
    ///
    /// Retombe sur la chaîne brute si elle n'est pas parsable
    pub fn formatted_timestamp(&self) -> String {
        match self.timestamp() {
            Some(ts) => ts.format("%d/%m/%Y, %H:%M:%S").to_string(),
            None => self.quoted_at.clone(),
        }
    }
}

/// Enveloppe de la réponse GET / : zéro ou plusieurs cotações
///
/// CONCEPT RUST : #[serde(default)]
/// - Si "value" est absent du JSON, on obtient un Vec vide au lieu d'une erreur
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuoteEnvelope {
    #[serde(default)]
    pub value: Vec<Quote>,
}

impl QuoteEnvelope {
    /// Première cotação de l'enveloppe, si présente
    pub fn first(&self) -> Option<&Quote> {
        self.value.first()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Consomme l'enveloppe et retourne la première cotação
    pub fn into_first(self) -> Option<Quote> {
        self.value.into_iter().next()
    }
}

/// Formate un montant en reais : "R$ 5,1000"
pub fn format_brl(rate: f64) -> String {
    format!("R$ {:.4}", rate).replace('.', ",")
}
