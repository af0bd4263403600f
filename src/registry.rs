//! Symbol registry: ticker symbols <-> provider identifiers plus the watchlist
//!
//! The registry owns the fixed built-in coins, the user-added custom coins, the
//! ordered favorites and the primary selection. Every mutation is written through
//! to the [`SettingsStore`] before the call returns.
//!
//! Invariant: whenever `favorites` is non-empty, `primary` is one of them.

use crate::{
    constants::{BUILTIN_COINS, DEFAULT_FAVORITES, FALLBACK_PRIMARY},
    error::{CoinError, SettingsError},
    settings::{SettingsKey, SettingsStore},
    types::normalize_symbol,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Symbol <-> identifier mapping with persisted favorites
pub struct SymbolRegistry {
    /// Fixed (id, symbol) pairs, in declaration order
    builtins: Vec<(String, String)>,
    /// User-added id -> symbol
    customs: BTreeMap<String, String>,
    favorites: Vec<String>,
    primary: String,
    store: Arc<dyn SettingsStore>,
}

impl std::fmt::Debug for SymbolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolRegistry")
            .field("builtins", &self.builtins.len())
            .field("customs", &self.customs)
            .field("favorites", &self.favorites)
            .field("primary", &self.primary)
            .finish()
    }
}

impl SymbolRegistry {
    /// Loads the registry with the default built-in coins
    pub fn load(store: Arc<dyn SettingsStore>) -> Self {
        Self::with_builtins(BUILTIN_COINS, store)
    }

    /// Loads the registry with a custom built-in set
    ///
    /// Absent or unreadable keys fall back to defaults: no custom coins, the
    /// default favorites and `BTC` as primary. A stored primary that is not a
    /// favorite is repaired and written back.
    pub fn with_builtins(builtins: &[(&str, &str)], store: Arc<dyn SettingsStore>) -> Self {
        let builtins = builtins
            .iter()
            .map(|(id, symbol)| (id.to_string(), normalize_symbol(symbol)))
            .collect();

        let customs = stored_or_default(SettingsKey::CustomCoins, store.custom_coins())
            .unwrap_or_default()
            .into_iter()
            .map(|(id, symbol)| (id, normalize_symbol(&symbol)))
            .collect();

        let favorites = stored_or_default(SettingsKey::FavoriteCoins, store.favorite_coins())
            .map(|favorites| dedup_symbols(&favorites))
            .unwrap_or_else(default_favorites);

        let stored_primary = stored_or_default(SettingsKey::PrimaryCoin, store.primary_coin())
            .map(|symbol| normalize_symbol(&symbol))
            .unwrap_or_else(|| FALLBACK_PRIMARY.to_string());
        let primary = repaired_primary(&favorites, &stored_primary);

        if primary != stored_primary {
            tracing::info!(primary = %primary, "Stored primary coin was not a favorite, repaired");
            if let Err(e) = store.set_primary_coin(&primary) {
                tracing::warn!(error = %e, "Failed to save repaired primary coin");
            }
        }

        let registry = Self {
            builtins,
            customs,
            favorites,
            primary,
            store,
        };

        tracing::debug!(
            builtins = registry.builtins.len(),
            customs = registry.customs.len(),
            favorites = registry.favorites.len(),
            primary = %registry.primary,
            "Loaded symbol registry"
        );

        registry
    }

    /// Looks up the provider id for a symbol, built-ins first
    pub fn resolve(&self, symbol: &str) -> Result<String, CoinError> {
        let wanted = normalize_symbol(symbol);
        self.builtins
            .iter()
            .find(|(_, s)| *s == wanted)
            .map(|(id, _)| id.clone())
            .or_else(|| {
                self.customs
                    .iter()
                    .find(|(_, s)| **s == wanted)
                    .map(|(id, _)| id.clone())
            })
            .ok_or_else(|| CoinError::not_found(&wanted))
    }

    /// Looks up the symbol for a provider id, or the uppercased id if unmapped
    pub fn reverse_resolve(&self, id: &str) -> String {
        self.builtins
            .iter()
            .find(|(builtin_id, _)| builtin_id == id)
            .map(|(_, symbol)| symbol.clone())
            .or_else(|| self.customs.get(id).cloned())
            .unwrap_or_else(|| id.to_uppercase())
    }

    /// Returns true if the symbol is a built-in or custom coin
    pub fn contains_symbol(&self, symbol: &str) -> bool {
        self.resolve(symbol).is_ok()
    }

    /// Returns true if the symbol was added by the user
    pub fn is_custom(&self, symbol: &str) -> bool {
        let wanted = normalize_symbol(symbol);
        self.customs.values().any(|s| *s == wanted)
    }

    fn contains_id(&self, id: &str) -> bool {
        self.customs.contains_key(id) || self.builtins.iter().any(|(b, _)| b == id)
    }

    /// Adds a user coin and makes it a favorite
    ///
    /// Like every mutation, the new state is saved before it replaces the
    /// in-memory state, so a failed save leaves the registry untouched.
    pub fn add_custom(&mut self, symbol: &str, id: &str) -> Result<(), CoinError> {
        let symbol = normalize_symbol(symbol);
        let id = id.trim().to_string();

        if self.contains_symbol(&symbol) {
            return Err(CoinError::duplicate_symbol(&symbol));
        }
        if self.contains_id(&id) {
            return Err(CoinError::DuplicateId { id });
        }

        let mut customs = self.customs.clone();
        customs.insert(id.clone(), symbol.clone());
        self.store.set_custom_coins(&customs)?;

        let mut favorites = self.favorites.clone();
        if !favorites.contains(&symbol) {
            favorites.push(symbol.clone());
            self.store.set_favorite_coins(&favorites)?;
        }

        self.customs = customs;
        self.favorites = favorites;

        tracing::info!(symbol = %symbol, id = %id, "Added custom coin");
        Ok(())
    }

    /// Removes a user coin; built-ins and unknown symbols are left alone
    pub fn remove_custom(&mut self, symbol: &str) -> Result<(), CoinError> {
        let symbol = normalize_symbol(symbol);
        let Some(id) = self
            .customs
            .iter()
            .find(|(_, s)| **s == symbol)
            .map(|(id, _)| id.clone())
        else {
            return Ok(());
        };

        let mut customs = self.customs.clone();
        customs.remove(&id);
        let favorites: Vec<String> = self
            .favorites
            .iter()
            .filter(|s| **s != symbol)
            .cloned()
            .collect();
        let primary = repaired_primary(&favorites, &self.primary);

        self.store.set_custom_coins(&customs)?;
        self.store.set_favorite_coins(&favorites)?;
        if primary != self.primary {
            self.store.set_primary_coin(&primary)?;
        }

        self.customs = customs;
        self.favorites = favorites;
        self.commit_primary(primary);

        tracing::info!(symbol = %symbol, id = %id, "Removed custom coin");
        Ok(())
    }

    /// Makes `symbol` the primary coin, adding it to favorites first if needed
    pub fn set_primary(&mut self, symbol: &str) -> Result<(), CoinError> {
        let symbol = normalize_symbol(symbol);

        let mut favorites = self.favorites.clone();
        if !favorites.contains(&symbol) {
            favorites.push(symbol.clone());
            self.store.set_favorite_coins(&favorites)?;
        }
        self.store.set_primary_coin(&symbol)?;

        self.favorites = favorites;
        self.primary = symbol;

        tracing::info!(primary = %self.primary, "Primary coin set");
        Ok(())
    }

    /// Adds or removes a favorite
    ///
    /// Returns true if the symbol is a favorite afterwards.
    pub fn toggle_favorite(&mut self, symbol: &str) -> Result<bool, CoinError> {
        let symbol = normalize_symbol(symbol);

        let mut favorites = self.favorites.clone();
        let now_favorite = if favorites.contains(&symbol) {
            favorites.retain(|s| *s != symbol);
            false
        } else {
            favorites.push(symbol.clone());
            true
        };

        let primary = if now_favorite && favorites.len() == 1 {
            symbol.clone()
        } else {
            repaired_primary(&favorites, &self.primary)
        };

        self.store.set_favorite_coins(&favorites)?;
        if primary != self.primary {
            self.store.set_primary_coin(&primary)?;
        }

        self.favorites = favorites;
        self.commit_primary(primary);

        tracing::debug!(symbol = %symbol, favorite = now_favorite, "Toggled favorite");
        Ok(now_favorite)
    }

    /// Restores the default favorites
    pub fn reset_favorites(&mut self) -> Result<(), CoinError> {
        let favorites = default_favorites();
        let primary = if favorites.contains(&self.primary) {
            self.primary.clone()
        } else {
            FALLBACK_PRIMARY.to_string()
        };

        self.store.set_favorite_coins(&favorites)?;
        self.store.set_primary_coin(&primary)?;

        self.favorites = favorites;
        self.primary = primary;

        tracing::info!("Favorites reset to defaults");
        Ok(())
    }

    /// Ordered favorite symbols
    pub fn favorites(&self) -> &[String] {
        &self.favorites
    }

    /// Current primary symbol
    pub fn primary(&self) -> &str {
        &self.primary
    }

    /// User-added id -> symbol map
    pub fn custom_coins(&self) -> &BTreeMap<String, String> {
        &self.customs
    }

    /// Every tracked id, built-ins first, then customs
    pub fn tracked_ids(&self) -> Vec<String> {
        self.builtins
            .iter()
            .map(|(id, _)| id.clone())
            .chain(self.customs.keys().cloned())
            .collect()
    }

    /// Every tracked (id, symbol) pair, built-ins first
    pub fn entries(&self) -> Vec<(String, String)> {
        self.builtins
            .iter()
            .cloned()
            .chain(self.customs.iter().map(|(id, s)| (id.clone(), s.clone())))
            .collect()
    }

    fn commit_primary(&mut self, primary: String) {
        if primary != self.primary {
            tracing::debug!(primary = %primary, "Primary coin reassigned");
            self.primary = primary;
        }
    }
}

/// Primary that satisfies `primary ∈ favorites`
///
/// Keeps `primary` when it is a favorite, otherwise prefers `BTC`, then the first
/// favorite. With no favorites at all the fallback is `BTC`.
fn repaired_primary(favorites: &[String], primary: &str) -> String {
    if favorites.iter().any(|s| s == primary) {
        primary.to_string()
    } else if favorites.iter().any(|s| s == FALLBACK_PRIMARY) {
        FALLBACK_PRIMARY.to_string()
    } else if let Some(first) = favorites.first() {
        first.clone()
    } else {
        FALLBACK_PRIMARY.to_string()
    }
}

/// Value of a stored key, or None (use the default) when it cannot be read
fn stored_or_default<T>(key: SettingsKey, value: Result<Option<T>, SettingsError>) -> Option<T> {
    match value {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!(key = key.as_str(), error = %e, "Ignoring unreadable stored setting");
            None
        }
    }
}

fn default_favorites() -> Vec<String> {
    DEFAULT_FAVORITES.iter().map(|s| s.to_string()).collect()
}

fn dedup_symbols(symbols: &[String]) -> Vec<String> {
    let mut result: Vec<String> = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        let symbol = normalize_symbol(symbol);
        if !symbol.is_empty() && !result.contains(&symbol) {
            result.push(symbol);
        }
    }
    result
}
