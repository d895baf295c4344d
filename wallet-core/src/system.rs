//! The top-level registry: one account, its networks, and one wallet manager
//! per network.
//!
//! All listener callbacks for a system run on its serial executor. Lifecycle
//! operations are guarded so duplicate calls from the host are harmless, and
//! a destroyed system rejects further use with [`WalletError::SystemDestroyed`].

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

use crate::account::Account;
use crate::blockchain_client::{BlockchainClient, BlockchainModel};
use crate::dispatcher::{isolate, SystemListener};
use crate::engine::LedgerEngine;
use crate::errors::{WalletError, WalletResult};
use crate::events::{SystemEvent, TransferEvent, WalletEvent, WalletManagerEvent};
use crate::executor::SerialExecutor;
use crate::handle::Handle;
use crate::manager::{WalletManager, WalletManagerMode};
use crate::network::Network;
use crate::storage::SystemPaths;
use crate::transfer::Transfer;
use crate::wallet::Wallet;

/// Everything a system is built from. Shared unchanged by `reset` and `wipe`.
#[derive(Clone)]
pub struct SystemParams {
    pub executor: SerialExecutor,
    pub listener: Arc<dyn SystemListener>,
    pub account: Handle<Account>,
    pub is_mainnet: bool,
    /// Storage root shared by every system
    pub storage_path: PathBuf,
    pub client: Arc<dyn BlockchainClient>,
    pub engine: Arc<dyn LedgerEngine>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkSelection {
    All,
    /// Networks whose native currency has one of these codes
    CurrencyCodes(Vec<String>),
    NetworkUids(Vec<String>),
}

/// Which networks `configure` creates managers for, and in which mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkFilter {
    pub selection: NetworkSelection,
    pub mode: WalletManagerMode,
}

impl NetworkFilter {
    pub fn all(mode: WalletManagerMode) -> Self {
        Self {
            selection: NetworkSelection::All,
            mode,
        }
    }

    pub fn currency_codes<S: AsRef<str>>(codes: &[S], mode: WalletManagerMode) -> Self {
        Self {
            selection: NetworkSelection::CurrencyCodes(
                codes.iter().map(|code| code.as_ref().to_string()).collect(),
            ),
            mode,
        }
    }

    pub fn network_uids<S: AsRef<str>>(uids: &[S], mode: WalletManagerMode) -> Self {
        Self {
            selection: NetworkSelection::NetworkUids(
                uids.iter().map(|uids| uids.as_ref().to_string()).collect(),
            ),
            mode,
        }
    }

    pub fn matches(&self, network: &Network) -> bool {
        match &self.selection {
            NetworkSelection::All => true,
            NetworkSelection::CurrencyCodes(codes) => {
                let native = network.currency().code();
                codes.iter().any(|code| code.eq_ignore_ascii_case(native))
            }
            NetworkSelection::NetworkUids(uids) => uids.iter().any(|uids| uids == network.uids()),
        }
    }
}

impl Default for NetworkFilter {
    fn default() -> Self {
        Self::all(WalletManagerMode::default())
    }
}

pub(crate) struct SystemInner {
    params: SystemParams,
    paths: SystemPaths,
    networks: RwLock<Vec<Handle<Network>>>,
    managers: RwLock<Vec<WalletManager>>,
    destroyed: AtomicBool,
    /// Set once teardown has delivered its final events
    detached: AtomicBool,
}

#[derive(Clone)]
pub struct System {
    inner: Arc<SystemInner>,
}

/// Back-reference from a manager to its system.
#[derive(Clone)]
pub(crate) struct WeakSystem(Weak<SystemInner>);

impl WeakSystem {
    pub(crate) fn upgrade(&self) -> Option<System> {
        self.0.upgrade().map(|inner| System { inner })
    }
}

impl System {
    /// Build a system with no networks and no wallet managers.
    pub fn create(params: SystemParams) -> WalletResult<System> {
        let paths = SystemPaths::new(&params.storage_path, params.account.uids())?;
        paths.ensure_directories()?;

        log::info!(
            "Created {} system for account {} at {}",
            if params.is_mainnet { "mainnet" } else { "testnet" },
            params.account.uids(),
            paths.account_dir().display()
        );

        let system = System {
            inner: Arc::new(SystemInner {
                params,
                paths,
                networks: RwLock::new(Vec::new()),
                managers: RwLock::new(Vec::new()),
                destroyed: AtomicBool::new(false),
                detached: AtomicBool::new(false),
            }),
        };
        system.announce_system_event(SystemEvent::Created);
        Ok(system)
    }

    pub(crate) fn downgrade(&self) -> WeakSystem {
        WeakSystem(Arc::downgrade(&self.inner))
    }

    pub fn same_object(&self, other: &System) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn account(&self) -> Handle<Account> {
        self.inner.params.account.take()
    }

    pub fn is_mainnet(&self) -> bool {
        self.inner.params.is_mainnet
    }

    pub fn storage_path(&self) -> &Path {
        &self.inner.params.storage_path
    }

    pub fn paths(&self) -> &SystemPaths {
        &self.inner.paths
    }

    pub fn executor(&self) -> &SerialExecutor {
        &self.inner.params.executor
    }

    pub fn listener(&self) -> Arc<dyn SystemListener> {
        Arc::clone(&self.inner.params.listener)
    }

    pub fn client(&self) -> Arc<dyn BlockchainClient> {
        Arc::clone(&self.inner.params.client)
    }

    pub(crate) fn engines(&self) -> Arc<dyn LedgerEngine> {
        Arc::clone(&self.inner.params.engine)
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::SeqCst)
    }

    pub fn networks(&self) -> Vec<Handle<Network>> {
        self.inner.networks.read().clone()
    }

    pub fn network_for(&self, uids: &str) -> Option<Handle<Network>> {
        self.inner
            .networks
            .read()
            .iter()
            .find(|network| network.uids() == uids)
            .cloned()
    }

    pub fn wallet_managers(&self) -> Vec<WalletManager> {
        self.inner.managers.read().clone()
    }

    pub fn wallet_manager_for(&self, network_uids: &str) -> Option<WalletManager> {
        self.inner
            .managers
            .read()
            .iter()
            .find(|manager| manager.network().uids() == network_uids)
            .cloned()
    }

    /// Register a network. Returns false when one with the same uids is
    /// already known.
    pub fn add_network(&self, network: &Handle<Network>) -> WalletResult<bool> {
        self.ensure_live()?;
        if network.is_mainnet() != self.is_mainnet() {
            return Err(WalletError::ValidationError(format!(
                "{} is not a {} network",
                network.uids(),
                if self.is_mainnet() { "mainnet" } else { "testnet" }
            )));
        }

        {
            let mut networks = self.inner.networks.write();
            if networks.iter().any(|known| known.uids() == network.uids()) {
                return Ok(false);
            }
            networks.push(network.take());
        }
        log::info!("Added network {}", network.uids());
        self.announce_system_event(SystemEvent::NetworkAdded {
            network: network.take(),
        });
        Ok(true)
    }

    /// Discover networks from the blockchain client and create a manager for
    /// every network the filter selects that has none yet. Returns once the
    /// fetch is scheduled; results arrive as events.
    pub fn configure(&self, filter: &NetworkFilter) -> WalletResult<()> {
        self.ensure_live()?;
        log::debug!("Configuring with {:?}", filter);

        let client = self.client();
        let is_mainnet = self.is_mainnet();
        let executor = self.executor().clone();
        let system = self.clone();
        let filter = filter.clone();
        self.executor().spawn_io(async move {
            let catalogue = client.get_blockchains(is_mainnet).await;
            let applied = executor.execute(move || system.apply_catalogue(catalogue, &filter));
            if let Err(e) = applied {
                log::warn!("Could not queue network catalogue: {}", e);
            }
        })
    }

    fn apply_catalogue(&self, catalogue: WalletResult<Vec<BlockchainModel>>, filter: &NetworkFilter) {
        if self.is_destroyed() {
            log::debug!("Ignoring network catalogue for destroyed system");
            return;
        }

        let models = catalogue.unwrap_or_else(|e| {
            log::warn!("Could not fetch networks: {}", e);
            Vec::new()
        });
        let mut discovered = Vec::new();
        for model in models
            .iter()
            .filter(|model| model.is_mainnet == self.is_mainnet())
        {
            if self.network_for(&model.id).is_some() {
                continue;
            }
            let added = Network::from_blockchain_model(model)
                .and_then(|network| self.add_network(&network).map(|added| (network, added)));
            match added {
                Ok((network, true)) => discovered.push(network),
                Ok(_) => {}
                Err(e) => log::warn!("Skipping network {}: {}", model.id, e),
            }
        }
        if !discovered.is_empty() {
            self.announce_system_event(SystemEvent::NetworksDiscovered {
                networks: discovered,
            });
        }

        for network in self.networks() {
            if !filter.matches(&network) || self.wallet_manager_for(network.uids()).is_some() {
                continue;
            }
            if let Err(e) = self.create_wallet_manager(&network, filter.mode) {
                log::warn!("Could not create manager for {}: {}", network.uids(), e);
            }
        }
    }

    /// Create the manager for `network`, registering the network if needed.
    pub fn create_wallet_manager(
        &self,
        network: &Handle<Network>,
        mode: WalletManagerMode,
    ) -> WalletResult<WalletManager> {
        self.ensure_live()?;
        self.add_network(network)?;

        let manager = {
            let mut managers = self.inner.managers.write();
            if managers
                .iter()
                .any(|manager| manager.network().uids() == network.uids())
            {
                return Err(WalletError::AlreadyExists(format!(
                    "wallet manager for {}",
                    network.uids()
                )));
            }
            let manager = WalletManager::create(self, network, mode)?;
            managers.push(manager.clone());
            manager
        };

        self.announce_system_event(SystemEvent::ManagerAdded {
            manager: manager.clone(),
        });
        manager.announce_created();
        Ok(manager)
    }

    /// Connect every manager that is not already connected.
    pub fn connect_all(&self) -> WalletResult<()> {
        self.ensure_live()?;
        for manager in self.wallet_managers() {
            match manager.connect() {
                Ok(()) | Err(WalletError::InvalidState { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub fn disconnect_all(&self) -> WalletResult<()> {
        self.ensure_live()?;
        for manager in self.wallet_managers() {
            match manager.disconnect() {
                Ok(()) | Err(WalletError::InvalidState { .. }) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Stop and release every manager, then detach the listener. Idempotent.
    pub fn destroy(&self) {
        if self.claim_destroy().is_err() {
            log::debug!("System already destroyed");
        }
    }

    /// Mark the system destroyed, failing if it already was.
    fn claim_destroy(&self) -> WalletResult<()> {
        if self.inner.destroyed.swap(true, Ordering::SeqCst) {
            return Err(WalletError::SystemDestroyed);
        }
        self.schedule_teardown();
        Ok(())
    }

    fn schedule_teardown(&self) {
        log::info!("Destroying system for account {}", self.inner.params.account.uids());

        if self.executor().is_current() {
            self.teardown();
            return;
        }
        let system = self.clone();
        if let Err(e) = self.executor().execute(move || system.teardown()) {
            log::debug!("Tearing down inline: {}", e);
            self.teardown();
        }
    }

    fn teardown(&self) {
        let managers = std::mem::take(&mut *self.inner.managers.write());
        for manager in managers {
            manager.stop_on_queue();
            self.announce_system_event(SystemEvent::ManagerRemoved { manager });
        }
        self.announce_system_event(SystemEvent::Destroyed);
        self.inner.detached.store(true, Ordering::SeqCst);
        log::debug!("System for account {} detached", self.inner.params.account.uids());
    }

    /// Destroy this system and build a fresh one from the same parameters.
    /// Fails with [`WalletError::SystemDestroyed`] if this system was already
    /// destroyed, so one account never ends up with two live systems.
    pub fn reset(&self) -> WalletResult<System> {
        self.claim_destroy()?;
        System::create(self.inner.params.clone())
    }

    /// Like [`System::reset`], but also delete this account's persisted
    /// state once the old managers have stopped.
    pub fn wipe(&self) -> WalletResult<System> {
        self.claim_destroy()?;

        let paths = self.inner.paths.clone();
        let wipe = move || {
            if let Err(e) = paths.wipe_account() {
                log::error!("Wipe of {} failed: {}", paths.account_dir().display(), e);
            }
        };
        if self.executor().is_current() || self.executor().is_stopped() {
            wipe();
        } else {
            self.executor().execute(wipe)?;
        }
        System::create(self.inner.params.clone())
    }

    /// Delete the persisted state of every system under `root` except those
    /// in `except`. Returns the deleted account directory names.
    pub fn wipe_all(root: impl AsRef<Path>, except: &[&System]) -> WalletResult<Vec<String>> {
        let keep: Vec<String> = except
            .iter()
            .map(|system| system.inner.params.account.uids().to_string())
            .collect();
        let keep: Vec<&str> = keep.iter().map(String::as_str).collect();
        let deleted = SystemPaths::wipe_all_except(root, &keep)?;
        log::info!("Wiped {} system(s), kept {}", deleted.len(), keep.len());
        Ok(deleted)
    }

    fn ensure_live(&self) -> WalletResult<()> {
        if self.is_destroyed() {
            return Err(WalletError::SystemDestroyed);
        }
        Ok(())
    }

    pub(crate) fn announce_system_event(&self, event: SystemEvent) {
        self.deliver(move |system| {
            log::debug!("System event {}", event);
            let listener = system.listener();
            isolate("system", &event, || listener.handle_system_event(system, &event));
        });
    }

    pub(crate) fn announce_manager_event(&self, manager: &WalletManager, event: WalletManagerEvent) {
        let manager = manager.clone();
        self.deliver(move |system| {
            log::debug!("{} event {}", manager.network().uids(), event);
            let listener = system.listener();
            isolate("manager", &event, || {
                listener.handle_manager_event(system, &manager, &event)
            });
        });
    }

    pub(crate) fn announce_wallet_event(
        &self,
        manager: &WalletManager,
        wallet: &Wallet,
        event: WalletEvent,
    ) {
        let manager = manager.clone();
        let wallet = wallet.clone();
        self.deliver(move |system| {
            log::debug!("{} wallet event {}", wallet.currency().code(), event);
            let listener = system.listener();
            isolate("wallet", &event, || {
                listener.handle_wallet_event(system, &manager, &wallet, &event)
            });
        });
    }

    pub(crate) fn announce_transfer_event(
        &self,
        manager: &WalletManager,
        wallet: &Wallet,
        transfer: &Transfer,
        event: TransferEvent,
    ) {
        let manager = manager.clone();
        let wallet = wallet.clone();
        let transfer = transfer.clone();
        self.deliver(move |system| {
            log::debug!("Transfer {} event {}", transfer.uids(), event);
            let listener = system.listener();
            isolate("transfer", &event, || {
                listener.handle_transfer_event(system, &manager, &wallet, &transfer, &event)
            });
        });
    }

    /// Run `deliver` on the executor: inline when already there, otherwise
    /// queued behind earlier events.
    fn deliver<F>(&self, deliver: F)
    where
        F: FnOnce(&System) + Send + 'static,
    {
        let guarded = {
            let system = self.clone();
            move || {
                if system.inner.detached.load(Ordering::SeqCst) {
                    log::debug!("Dropping event for detached system");
                    return;
                }
                deliver(&system)
            }
        };

        if self.executor().is_current() {
            guarded();
        } else if let Err(e) = self.executor().execute(guarded) {
            log::warn!("Dropping event: {}", e);
        }
    }
}

impl fmt::Debug for System {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("System")
            .field("account", &self.inner.params.account.uids())
            .field("is_mainnet", &self.inner.params.is_mainnet)
            .field("managers", &self.inner.managers.read().len())
            .field("destroyed", &self.is_destroyed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain_client::StaticBlockchainClient;

    fn networks() -> Vec<Handle<Network>> {
        StaticBlockchainClient::builtin(false)
            .blockchains()
            .iter()
            .map(|model| Network::from_blockchain_model(model).unwrap())
            .collect()
    }

    #[test]
    fn filter_by_currency_code_matches_native_currency() {
        let filter = NetworkFilter::currency_codes(&["BTC"], WalletManagerMode::ApiOnly);
        let selected: Vec<String> = networks()
            .iter()
            .filter(|network| filter.matches(network))
            .map(|network| network.uids().to_string())
            .collect();
        assert_eq!(selected, vec!["bitcoin-testnet".to_string()]);
    }

    #[test]
    fn filter_by_uids_and_default() {
        let filter = NetworkFilter::network_uids(&["ethereum-testnet"], WalletManagerMode::P2pOnly);
        assert_eq!(
            networks().iter().filter(|n| filter.matches(n)).count(),
            1
        );
        assert_eq!(NetworkFilter::default().mode, WalletManagerMode::ApiOnly);
        assert_eq!(networks().iter().filter(|n| NetworkFilter::default().matches(n)).count(), 3);
    }
}
