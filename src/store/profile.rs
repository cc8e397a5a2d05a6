use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use crate::store::error::{Result, StoreError};
use crate::store::kv::KeyValueStore;
use crate::store::models::{SavedLook, User};

/// Typed access to the current-user pointer and per-user favorites lists.
#[derive(Debug)]
pub struct ProfileStore<K> {
    store: K,
    namespace: String,
}

impl<K: KeyValueStore> ProfileStore<K> {
    pub fn new(store: K, namespace: impl Into<String>) -> Self {
        Self {
            store,
            namespace: namespace.into(),
        }
    }

    pub fn user_key(&self) -> String {
        format!("{}_user", self.namespace)
    }

    pub fn favorites_key(&self, user_id: &str) -> String {
        format!("{}_favs_{}", self.namespace, user_id)
    }

    fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_str::<T>(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                warn!("Stored value {} is corrupted: {}", key, err);
                Err(StoreError::Corrupted {
                    key: key.to_string(),
                    message: err.to_string(),
                })
            }
        }
    }

    fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value).map_err(|source| StoreError::Serialization {
            key: key.to_string(),
            source,
        })?;
        self.store.set(key, &json)
    }

    pub fn load_current_user(&self) -> Result<Option<User>> {
        self.read_json(&self.user_key())
    }

    pub fn save_current_user(&self, user: &User) -> Result<()> {
        self.write_json(&self.user_key(), user)?;
        info!("Saved current user {}", user.id);
        Ok(())
    }

    pub fn clear_current_user(&self) -> Result<()> {
        self.store.remove(&self.user_key())
    }

    /// Missing lists read as empty; corrupt lists are an error.
    pub fn load_favorites(&self, user_id: &str) -> Result<Vec<SavedLook>> {
        Ok(self
            .read_json::<Vec<SavedLook>>(&self.favorites_key(user_id))?
            .unwrap_or_default())
    }

    pub fn save_favorites(&self, user_id: &str, favorites: &[SavedLook]) -> Result<()> {
        self.write_json(&self.favorites_key(user_id), favorites)?;
        info!("Saved {} favorite(s) for user {}", favorites.len(), user_id);
        Ok(())
    }
}
