use std::fs;
use std::path::{Path, PathBuf};

use crate::errors::{WalletError, WalletResult};
use crate::validation::validator;

/// Filesystem layout of one system's persisted state.
///
/// ```text
/// <root>/<account-uids>/<network-uids>/manager.state
/// ```
#[derive(Debug, Clone)]
pub struct SystemPaths {
    /// Storage root shared by every system of the host.
    root_dir: PathBuf,
    /// Directory owned by this system's account.
    account_dir: PathBuf,
}

impl SystemPaths {
    /// File name of a manager's persisted snapshot.
    pub const MANAGER_STATE_FILENAME: &'static str = "manager.state";

    /// Create the layout for `account_uids` below `root`.
    pub fn new(root: impl AsRef<Path>, account_uids: &str) -> WalletResult<Self> {
        let root_dir = root.as_ref().to_path_buf();
        if root_dir.as_os_str().is_empty() {
            return Err(WalletError::StorageError(
                "Storage root directory cannot be empty".to_string(),
            ));
        }
        validator().validate_storage_name(account_uids)?;

        Ok(Self {
            account_dir: root_dir.join(account_uids),
            root_dir,
        })
    }

    /// Root directory for all systems.
    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Directory holding every manager of this system.
    pub fn account_dir(&self) -> &Path {
        &self.account_dir
    }

    /// Directory of the manager bound to `network_uids`.
    pub fn manager_dir(&self, network_uids: &str) -> WalletResult<PathBuf> {
        validator().validate_storage_name(network_uids)?;
        Ok(self.account_dir.join(network_uids))
    }

    pub fn manager_state_file(&self, network_uids: &str) -> WalletResult<PathBuf> {
        Ok(self
            .manager_dir(network_uids)?
            .join(Self::MANAGER_STATE_FILENAME))
    }

    /// Ensure the account directory exists.
    pub fn ensure_directories(&self) -> WalletResult<()> {
        fs::create_dir_all(&self.account_dir)?;
        Ok(())
    }

    /// Network uids of every manager with a directory on disk.
    pub fn list_managers(&self) -> WalletResult<Vec<String>> {
        list_child_dirs(&self.account_dir)
    }

    /// Recursively delete this system's state. Missing state is not an error.
    pub fn wipe_account(&self) -> WalletResult<()> {
        remove_dir_if_present(&self.account_dir)
    }

    /// Recursively delete one manager's state.
    pub fn wipe_manager(&self, network_uids: &str) -> WalletResult<()> {
        remove_dir_if_present(&self.manager_dir(network_uids)?)
    }

    /// Delete every system directory under `root` except those named in
    /// `keep`. Returns the names of the deleted directories.
    pub fn wipe_all_except(root: impl AsRef<Path>, keep: &[&str]) -> WalletResult<Vec<String>> {
        let root = root.as_ref();
        let mut deleted = Vec::new();
        for name in list_child_dirs(root)? {
            if keep.contains(&name.as_str()) {
                continue;
            }
            remove_dir_if_present(&root.join(&name))?;
            deleted.push(name);
        }
        deleted.sort();
        Ok(deleted)
    }
}

fn list_child_dirs(dir: &Path) -> WalletResult<Vec<String>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    names.sort();
    Ok(names)
}

fn remove_dir_if_present(dir: &Path) -> WalletResult<()> {
    match fs::remove_dir_all(dir) {
        Ok(()) => {
            log::info!("Wiped {}", dir.display());
            Ok(())
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}
