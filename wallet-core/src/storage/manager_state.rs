use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use blake3::Hasher as Blake3;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{WalletError, WalletResult};
use crate::storage::SystemPaths;

const SNAPSHOT_VERSION: u16 = 1;

/// What a wallet manager remembers between sessions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManagerSnapshot {
    pub network_uids: String,
    pub mode: String,
    /// Network height at the last successful sync
    pub last_synced_height: Option<u64>,
    /// Currency code to balance, as decimal base units
    pub balances: BTreeMap<String, String>,
    pub saved_at: DateTime<Utc>,
}

impl ManagerSnapshot {
    pub fn new(network_uids: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            network_uids: network_uids.into(),
            mode: mode.into(),
            last_synced_height: None,
            balances: BTreeMap::new(),
            saved_at: Utc::now(),
        }
    }

    /// Balance for `currency_code` in base units, if one was recorded.
    pub fn balance(&self, currency_code: &str) -> Option<u128> {
        self.balances
            .get(currency_code)
            .and_then(|value| value.parse().ok())
    }

    pub fn set_balance(&mut self, currency_code: &str, base_units: u128) {
        self.balances
            .insert(currency_code.to_string(), base_units.to_string());
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnapshotEnvelope {
    version: u16,
    checksum: [u8; 32],
    payload: ManagerSnapshot,
}

/// Persists one manager's snapshot with integrity checks.
#[derive(Debug, Clone)]
pub struct ManagerStateStore {
    path: PathBuf,
}

impl ManagerStateStore {
    pub fn from_paths(paths: &SystemPaths, network_uids: &str) -> WalletResult<Self> {
        Ok(Self {
            path: paths.manager_state_file(network_uids)?,
        })
    }

    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// The stored snapshot, or `None` when nothing has been saved yet.
    pub fn load(&self) -> WalletResult<Option<ManagerSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(&self.path)?;
        let envelope: SnapshotEnvelope = serde_json::from_slice(&bytes)?;
        if envelope.version != SNAPSHOT_VERSION {
            return Err(WalletError::StorageError(format!(
                "Unsupported manager state version {}",
                envelope.version
            )));
        }

        if checksum(&envelope.payload)? != envelope.checksum {
            return Err(WalletError::StorageError(
                "Manager state integrity verification failed".to_string(),
            ));
        }

        Ok(Some(envelope.payload))
    }

    /// Atomically replace the stored snapshot.
    pub fn save(&self, snapshot: &ManagerSnapshot) -> WalletResult<()> {
        let mut payload = snapshot.clone();
        payload.saved_at = Utc::now();

        let envelope = SnapshotEnvelope {
            version: SNAPSHOT_VERSION,
            checksum: checksum(&payload)?,
            payload,
        };

        let serialized = serde_json::to_vec_pretty(&envelope)?;
        let tmp_path = self.path.with_extension("new");
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(&serialized)?;
            file.sync_all()?;
        }
        fs::rename(tmp_path, &self.path)?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn checksum(snapshot: &ManagerSnapshot) -> WalletResult<[u8; 32]> {
    let mut hasher = Blake3::new();
    hasher.update(&serde_json::to_vec(snapshot)?);
    let mut output = [0u8; 32];
    output.copy_from_slice(hasher.finalize().as_bytes());
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_snapshot_loads_as_none() {
        let temp = TempDir::new().unwrap();
        let store = ManagerStateStore::new(temp.path().join("manager.state"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn saved_snapshot_is_restored() {
        let temp = TempDir::new().unwrap();
        let paths = SystemPaths::new(temp.path(), "account-a").unwrap();
        let store = ManagerStateStore::from_paths(&paths, "bitcoin-testnet").unwrap();

        let mut snapshot = ManagerSnapshot::new("bitcoin-testnet", "API_ONLY");
        snapshot.last_synced_height = Some(1_700_000);
        snapshot.set_balance("btc", 150_000_000);
        store.save(&snapshot).unwrap();

        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.last_synced_height, Some(1_700_000));
        assert_eq!(loaded.balance("btc"), Some(150_000_000));
        assert_eq!(loaded.balance("eth"), None);
        assert!(store.path().ends_with("bitcoin-testnet/manager.state"));
    }

    #[test]
    fn tampered_snapshot_detected() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("manager.state");
        let store = ManagerStateStore::new(&path);
        let mut snapshot = ManagerSnapshot::new("bitcoin-testnet", "API_ONLY");
        snapshot.set_balance("btc", 1);
        store.save(&snapshot).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        fs::write(&path, text.replace("\"1\"", "\"9\"")).unwrap();

        assert!(matches!(store.load(), Err(WalletError::StorageError(_))));
    }
}
