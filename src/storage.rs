// ============================================================================
// Module : storage
// ============================================================================
// Stockage clé-valeur durable pour le token de session
//
// CONCEPTS RUST :
// 1. Traits async (async-trait) : le contrôleur reçoit un Arc<dyn KeyValueStore>
//    au lieu d'aller lire un état global
// 2. tokio::fs : I/O fichier non-bloquantes
// 3. Mutex : implémentation mémoire partageable entre tâches (tests)
// ============================================================================

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::StorageError;

/// Clé unique sous laquelle le token de session est stocké
pub const TOKEN_KEY: &str = "authToken";

/// Nom du fichier de stockage dans le répertoire de données
pub const STORAGE_FILE: &str = "storage.json";

/// Stockage clé-valeur asynchrone (chaînes uniquement)
///
/// Une clé absente signifie "pas de valeur" : pour TOKEN_KEY, "déconnecté".
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Supprime la clé (pas d'erreur si elle est déjà absente)
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;

    /// Supprime la clé seulement si sa valeur vaut encore `expected`
    ///
    /// Retourne vrai si la clé a été supprimée.
    async fn remove_item_if(&self, key: &str, expected: &str) -> Result<bool, StorageError>;
}

// ============================================================================
// FileStore : un objet JSON dans un fichier
// ============================================================================

/// Stockage persistant : un objet JSON {"clé": "valeur"} sur disque
///
/// Chaque écriture réécrit le fichier entier (il ne contient qu'un token).
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Stockage dans <data_dir>/storage.json
    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(STORAGE_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Lit tout le fichier (map vide si le fichier n'existe pas)
    async fn load(&self) -> Result<BTreeMap<String, String>, StorageError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Storage file not found, starting empty");
                Ok(BTreeMap::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Réécrit le fichier (crée le répertoire parent si besoin)
    async fn save(&self, items: &BTreeMap<String, String>) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let bytes = serde_json::to_vec_pretty(items)?;
        tokio::fs::write(&self.path, bytes).await?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut items = self.load().await?;
        Ok(items.remove(key))
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut items = self.load().await.unwrap_or_else(|e| {
            // Fichier illisible : on repart de zéro plutôt que de bloquer le login
            warn!(path = %self.path.display(), error = %e, "Storage file unreadable, overwriting");
            BTreeMap::new()
        });
        items.insert(key.to_string(), value.to_string());
        self.save(&items).await?;
        debug!(key, "Stored item");
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut items = self.load().await?;
        if items.remove(key).is_some() {
            self.save(&items).await?;
            debug!(key, "Removed item");
        }
        Ok(())
    }

    async fn remove_item_if(&self, key: &str, expected: &str) -> Result<bool, StorageError> {
        let mut items = self.load().await?;
        if items.get(key).map(String::as_str) != Some(expected) {
            debug!(key, "Stored value changed, keeping item");
            return Ok(false);
        }
        items.remove(key);
        self.save(&items).await?;
        debug!(key, "Removed item");
        Ok(true)
    }
}

// ============================================================================
// MemoryStore : pour les tests et le mode sans disque
// ============================================================================

/// Stockage en mémoire (non persistant)
#[derive(Debug, Default)]
pub struct MemoryStore {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stockage pré-rempli avec un token
    pub fn with_token(token: &str) -> Self {
        let store = Self::new();
        store.lock().insert(TOKEN_KEY.to_string(), token.to_string());
        store
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // Un panic pendant un insert ne laisse pas la map incohérente
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.lock().remove(key);
        Ok(())
    }

    async fn remove_item_if(&self, key: &str, expected: &str) -> Result<bool, StorageError> {
        let mut items = self.lock();
        if items.get(key).map(String::as_str) != Some(expected) {
            return Ok(false);
        }
        items.remove(key);
        Ok(true)
    }
}
