//! Key-value settings storage for the persisted watchlist
//!
//! The registry only needs three keys (`favoriteCoins`, `primaryCoin` and
//! `customCoins`). Values are JSON so that a back-end can store arrays, strings and
//! maps without knowing what they mean.

use crate::{
    constants::{KEY_CUSTOM_COINS, KEY_FAVORITE_COINS, KEY_PRIMARY_COIN},
    error::SettingsError,
};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Keys persisted by the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsKey {
    /// Ordered list of favorite symbols
    FavoriteCoins,
    /// The single primary symbol
    PrimaryCoin,
    /// Map of custom id -> symbol
    CustomCoins,
}

impl SettingsKey {
    /// Name of the key in the backing store
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingsKey::FavoriteCoins => KEY_FAVORITE_COINS,
            SettingsKey::PrimaryCoin => KEY_PRIMARY_COIN,
            SettingsKey::CustomCoins => KEY_CUSTOM_COINS,
        }
    }

    /// All keys, in the order they are cleared by a reset
    pub fn all() -> &'static [SettingsKey] {
        &[
            SettingsKey::FavoriteCoins,
            SettingsKey::PrimaryCoin,
            SettingsKey::CustomCoins,
        ]
    }
}

/// Trait for settings back-ends
///
/// Writes must be durable when `set` returns.
pub trait SettingsStore: Send + Sync {
    /// Reads the raw value stored under `key`
    fn get(&self, key: SettingsKey) -> Result<Option<Value>, SettingsError>;

    /// Stores `value` under `key`
    fn set(&self, key: SettingsKey, value: Value) -> Result<(), SettingsError>;

    /// Deletes `key`; missing keys are not an error
    fn remove(&self, key: SettingsKey) -> Result<(), SettingsError>;

    /// Clears every watchlist key (the `--reset` startup flag)
    fn reset(&self) -> Result<(), SettingsError> {
        for key in SettingsKey::all() {
            self.remove(*key)?;
        }
        tracing::info!("Cleared stored watchlist settings");
        Ok(())
    }

    /// Reads the favorites list
    fn favorite_coins(&self) -> Result<Option<Vec<String>>, SettingsError> {
        decode(self.get(SettingsKey::FavoriteCoins)?)
    }

    /// Reads the primary symbol
    fn primary_coin(&self) -> Result<Option<String>, SettingsError> {
        decode(self.get(SettingsKey::PrimaryCoin)?)
    }

    /// Reads the custom id -> symbol map
    fn custom_coins(&self) -> Result<Option<BTreeMap<String, String>>, SettingsError> {
        decode(self.get(SettingsKey::CustomCoins)?)
    }

    fn set_favorite_coins(&self, favorites: &[String]) -> Result<(), SettingsError> {
        self.set(SettingsKey::FavoriteCoins, serde_json::to_value(favorites)?)
    }

    fn set_primary_coin(&self, symbol: &str) -> Result<(), SettingsError> {
        self.set(SettingsKey::PrimaryCoin, Value::String(symbol.to_string()))
    }

    fn set_custom_coins(&self, customs: &BTreeMap<String, String>) -> Result<(), SettingsError> {
        self.set(SettingsKey::CustomCoins, serde_json::to_value(customs)?)
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: Option<Value>) -> Result<Option<T>, SettingsError> {
    value
        .map(serde_json::from_value)
        .transpose()
        .map_err(SettingsError::from)
}

/// In-process settings, lost on exit
#[derive(Debug, Default)]
pub struct MemorySettings {
    values: Mutex<Map<String, Value>>,
}

impl MemorySettings {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

impl SettingsStore for MemorySettings {
    fn get(&self, key: SettingsKey) -> Result<Option<Value>, SettingsError> {
        Ok(self.values.lock().get(key.as_str()).cloned())
    }

    fn set(&self, key: SettingsKey, value: Value) -> Result<(), SettingsError> {
        self.values.lock().insert(key.as_str().to_string(), value);
        Ok(())
    }

    fn remove(&self, key: SettingsKey) -> Result<(), SettingsError> {
        self.values.lock().remove(key.as_str());
        Ok(())
    }
}

/// Settings kept in a single JSON object file
///
/// Every `set`/`remove` rewrites the whole file through a temp file in the same
/// directory followed by an atomic rename, so a crash never leaves a torn file.
#[derive(Debug)]
pub struct JsonFileSettings {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
}

impl JsonFileSettings {
    /// Opens (or lazily creates) the settings file at `path`
    ///
    /// A file that is not a JSON object is ignored with a warning and replaced on
    /// the next write. Only I/O errors other than a missing file are returned.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Map::new(),
            Ok(text) => match serde_json::from_str::<Map<String, Value>>(&text) {
                Ok(values) => values,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Settings file is unreadable, starting from defaults"
                    );
                    Map::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(e.into()),
        };

        tracing::debug!(path = %path.display(), keys = values.len(), "Loaded settings file");

        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Default location under the user's config directory
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("coin-watch").join("settings.json"))
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, values: &Map<String, Value>) -> Result<(), SettingsError> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;

        let mut file = tempfile::NamedTempFile::new_in(&dir)?;
        serde_json::to_writer_pretty(&mut file, values)?;
        file.write_all(b"\n")?;
        file.as_file().sync_all()?;
        file.persist(&self.path)?;
        Ok(())
    }
}

impl SettingsStore for JsonFileSettings {
    fn get(&self, key: SettingsKey) -> Result<Option<Value>, SettingsError> {
        Ok(self.values.lock().get(key.as_str()).cloned())
    }

    fn set(&self, key: SettingsKey, value: Value) -> Result<(), SettingsError> {
        let mut values = self.values.lock();
        values.insert(key.as_str().to_string(), value);
        self.flush(&values)
    }

    fn remove(&self, key: SettingsKey) -> Result<(), SettingsError> {
        let mut values = self.values.lock();
        if values.remove(key.as_str()).is_some() {
            self.flush(&values)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_settings_typed_accessors() {
        let store = MemorySettings::new();
        assert_eq!(store.favorite_coins().unwrap(), None);

        store
            .set_favorite_coins(&["BTC".to_string(), "PEPE".to_string()])
            .unwrap();
        store.set_primary_coin("PEPE").unwrap();
        let mut customs = BTreeMap::new();
        customs.insert("pepecoin".to_string(), "PEPE".to_string());
        store.set_custom_coins(&customs).unwrap();

        assert_eq!(
            store.favorite_coins().unwrap(),
            Some(vec!["BTC".to_string(), "PEPE".to_string()])
        );
        assert_eq!(store.primary_coin().unwrap().as_deref(), Some("PEPE"));
        assert_eq!(store.custom_coins().unwrap(), Some(customs));
    }

    #[test]
    fn test_reset_clears_all_keys() {
        let store = MemorySettings::new();
        store.set_primary_coin("ETH").unwrap();
        store.set_favorite_coins(&["ETH".to_string()]).unwrap();
        store.reset().unwrap();
        for key in SettingsKey::all() {
            assert!(store.get(*key).unwrap().is_none());
        }
    }

    #[test]
    fn test_wrong_shape_is_reported() {
        let store = MemorySettings::new();
        store
            .set(SettingsKey::FavoriteCoins, Value::String("BTC".to_string()))
            .unwrap();
        assert!(matches!(
            store.favorite_coins(),
            Err(SettingsError::Serde(_))
        ));
    }

    #[test]
    fn test_json_file_settings_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        {
            let store = JsonFileSettings::open(&path).unwrap();
            store.set_primary_coin("SOL").unwrap();
            store
                .set_favorite_coins(&["SOL".to_string(), "ETH".to_string()])
                .unwrap();
        }

        let reopened = JsonFileSettings::open(&path).unwrap();
        assert_eq!(reopened.primary_coin().unwrap().as_deref(), Some("SOL"));
        assert_eq!(
            reopened.favorite_coins().unwrap(),
            Some(vec!["SOL".to_string(), "ETH".to_string()])
        );

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["primaryCoin"], "SOL");
    }

    #[test]
    fn test_json_file_reset_removes_keys_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let store = JsonFileSettings::open(&path).unwrap();
        store.set_primary_coin("ETH").unwrap();
        store.reset().unwrap();

        let reopened = JsonFileSettings::open(&path).unwrap();
        assert_eq!(reopened.primary_coin().unwrap(), None);
    }

    #[test]
    fn test_corrupt_file_opens_empty_and_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{ not json").unwrap();

        let store = JsonFileSettings::open(&path).unwrap();
        assert_eq!(store.favorite_coins().unwrap(), None);

        store.set_primary_coin("ETH").unwrap();
        let reopened = JsonFileSettings::open(&path).unwrap();
        assert_eq!(reopened.primary_coin().unwrap().as_deref(), Some("ETH"));
    }
}
