//! Wallet index
//!
//! Records which wallet ids hold a stored record and which one is current.
//! It is kept as one JSON value under [`INDEX_KEY`] in the same backend as
//! the wallets themselves. Wallet field keys always end in a field name, so
//! they never collide with it.

use serde::{Deserialize, Serialize};

/// Storage key of the index.
pub const INDEX_KEY: &str = "stardust.wallets";

/// One stored wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletEntry {
    /// Wallet namespace
    pub id: String,
    /// Public address stored with the wallet
    pub address: String,
    /// When the wallet was first stored (unix timestamp)
    pub created_at: u64,
}

/// All stored wallets plus the current selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletIndex {
    /// Wallets in the order they were first stored
    #[serde(default)]
    pub wallets: Vec<WalletEntry>,
    /// Wallet id selected as current
    #[serde(default)]
    pub current: Option<String>,
}

impl WalletIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn is_empty(&self) -> bool {
        self.wallets.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&WalletEntry> {
        self.wallets.iter().find(|w| w.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Add `id` or refresh its address, and make it current.
    ///
    /// A wallet that is stored again keeps its original `created_at`.
    pub fn upsert(&mut self, id: &str, address: &str, now: u64) {
        match self.wallets.iter_mut().find(|w| w.id == id) {
            Some(entry) => entry.address = address.to_string(),
            None => self.wallets.push(WalletEntry {
                id: id.to_string(),
                address: address.to_string(),
                created_at: now,
            }),
        }
        self.current = Some(id.to_string());
    }

    /// Remove `id`. If it was current, the oldest remaining wallet becomes current.
    pub fn remove(&mut self, id: &str) -> Option<WalletEntry> {
        let idx = self.wallets.iter().position(|w| w.id == id)?;
        let entry = self.wallets.remove(idx);
        if self.current.as_deref() == Some(id) {
            self.current = self.wallets.first().map(|w| w.id.clone());
        }
        Some(entry)
    }

    pub fn ids(&self) -> Vec<String> {
        self.wallets.iter().map(|w| w.id.clone()).collect()
    }
}

/// Seconds since the unix epoch; zero if the clock is before it.
pub fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
