//! Persisted client state.
//!
//! A small key/value store that lets the next session resume where the last
//! one stopped. Keys follow the `landSale:<field>` convention.

use crate::errors::Result;
use crate::form::{fields, FormState};
use crate::utils::is_address;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Key holding the contract ABI as a JSON array.
pub const ABI_KEY: &str = "landSale:artifactABI";

/// Persisted form fields: `(store key, form field)`.
pub const PERSISTED_FIELDS: [(&str, &str); 9] = [
    ("landSale:contractAddress", fields::CONTRACT_ADDRESS),
    ("landSale:tokenURI", fields::TOKEN_URI),
    ("landSale:assetType", fields::ASSET_TYPE),
    ("landSale:priceEth", fields::PRICE_ETH),
    ("landSale:priceUsdt", fields::PRICE_USDT),
    ("landSale:priceUsdc", fields::PRICE_USDC),
    ("landSale:streetAddress", fields::STREET_ADDRESS),
    ("landSale:county", fields::COUNTY),
    ("landSale:buyerAddress", fields::BUYER_ADDRESS),
];

/// Key/value storage for resumable state.
pub trait StateStore: Send + Sync {
    /// Value stored under `key`.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`.
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Writes the resumable fields of `form` to `store`.
///
/// Addresses are only written when they parse, so a half-typed address never
/// replaces a good one.
pub fn persist_form(store: &dyn StateStore, form: &FormState) -> Result<()> {
    for (key, field) in PERSISTED_FIELDS {
        let value = form.get(field);
        let is_address_field = field == fields::CONTRACT_ADDRESS || field == fields::BUYER_ADDRESS;
        if is_address_field && !is_address(value) {
            continue;
        }
        store.set(key, value)?;
    }
    Ok(())
}

/// Writes the contract ABI JSON to `store`.
pub fn persist_abi(store: &dyn StateStore, abi_json: &str) -> Result<()> {
    store.set(ABI_KEY, abi_json)
}

/// In-memory store, for tests and sessions that should not outlive the process.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        if let Ok(mut values) = self.values.lock() {
            values.insert(key.to_string(), value.to_string());
        }
        Ok(())
    }
}

/// Store backed by a JSON object on disk, rewritten on every `set`.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    values: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`. A missing file is an empty store; an
    /// unreadable or malformed one is an error.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let values = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            values: Mutex::new(values),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let snapshot = {
            let Ok(mut values) = self.values.lock() else {
                return Ok(());
            };
            if values.get(key).map(String::as_str) == Some(value) {
                return Ok(());
            }
            values.insert(key.to_string(), value.to_string());
            serde_json::to_string_pretty(&*values)?
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, snapshot)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_persist_form_skips_bad_addresses() {
        let store = MemoryStore::new();
        let form = FormState::new()
            .with_field(fields::CONTRACT_ADDRESS, "0x1234")
            .with_field(fields::BUYER_ADDRESS, "0xdAC17F958D2ee523a2206206994597C13D831ec7")
            .with_field(fields::COUNTY, "Travis");

        persist_form(&store, &form).unwrap();

        assert_eq!(store.get("landSale:contractAddress"), None);
        assert_eq!(
            store.get("landSale:buyerAddress").as_deref(),
            Some("0xdAC17F958D2ee523a2206206994597C13D831ec7")
        );
        assert_eq!(store.get("landSale:county").as_deref(), Some("Travis"));
        assert_eq!(store.get("landSale:assetType").as_deref(), Some("ETH"));
        assert_eq!(store.get("landSale:priceUsdt").as_deref(), Some(""));
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = std::env::temp_dir().join(format!("landsale-store-{}", std::process::id()));
        let path = dir.join("state.json");
        let _ = std::fs::remove_file(&path);

        let store = FileStore::open(&path).unwrap();
        assert_eq!(store.get("landSale:county"), None);
        store.set("landSale:county", "Travis").unwrap();
        persist_abi(&store, "[]").unwrap();

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("landSale:county").as_deref(), Some("Travis"));
        assert_eq!(reopened.get(ABI_KEY).as_deref(), Some("[]"));

        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_file_store_rejects_garbage() {
        let path = std::env::temp_dir().join(format!("landsale-bad-{}.json", std::process::id()));
        std::fs::write(&path, "not json").unwrap();
        assert!(FileStore::open(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }
}
