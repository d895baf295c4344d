//! Wallet managers: one per (account, network), owning that network's wallets
//! and driving its engine through the connection state machine.
//!
//! ```text
//! CREATED ──connect──▶ CONNECTED ──sync──▶ SYNCING
//!    ▲                  │   ▲                 │
//!    │              disconnect  └─succeeded───┤
//!    │                  ▼                     │ failed / disconnect
//!    └── set_mode ── DISCONNECTED ◀───────────┘
//! ```
//!
//! Public operations validate the current state and queue the work on the
//! system's serial executor; engine completions come back on the same
//! executor, so state changes and listener callbacks never interleave.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::amount::Amount;
use crate::engine::{
    EngineEvent, EngineEventSink, LedgerEngine, ManagerEngine, ManagerEngineParams, TransferRecord,
};
use crate::errors::{WalletError, WalletResult};
use crate::events::{TransferEvent, WalletEvent, WalletManagerEvent};
use crate::executor::SerialExecutor;
use crate::handle::{Handle, HandleId, NativeResource, WeakHandle};
use crate::network::{Network, NetworkType};
use crate::storage::{ManagerSnapshot, ManagerStateStore};
use crate::system::{System, WeakSystem};
use crate::transfer::{Transfer, TransferParts, TransferState};
use crate::wallet::{Wallet, WalletState};

/// How a manager gets its chain data and submits transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum WalletManagerMode {
    #[default]
    ApiOnly,
    ApiWithP2pSubmit,
    P2pWithApiSync,
    P2pOnly,
}

impl WalletManagerMode {
    pub const ALL: [WalletManagerMode; 4] = [
        WalletManagerMode::ApiOnly,
        WalletManagerMode::ApiWithP2pSubmit,
        WalletManagerMode::P2pWithApiSync,
        WalletManagerMode::P2pOnly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            WalletManagerMode::ApiOnly => "API_ONLY",
            WalletManagerMode::ApiWithP2pSubmit => "API_WITH_P2P_SUBMIT",
            WalletManagerMode::P2pWithApiSync => "P2P_WITH_API_SYNC",
            WalletManagerMode::P2pOnly => "P2P_ONLY",
        }
    }

    /// Parse a mode name, ignoring case.
    pub fn parse(value: &str) -> WalletResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| WalletError::ValidationError(format!("Unknown sync mode: {}", value)))
    }

    /// True when chain data comes from the blockchain API.
    pub fn is_api_synced(&self) -> bool {
        matches!(
            self,
            WalletManagerMode::ApiOnly | WalletManagerMode::ApiWithP2pSubmit
        )
    }

    pub fn is_supported_by(&self, network_type: NetworkType) -> bool {
        match network_type {
            NetworkType::Btc | NetworkType::Bch => true,
            NetworkType::Eth => *self != WalletManagerMode::P2pWithApiSync,
            NetworkType::Generic => *self == WalletManagerMode::ApiOnly,
        }
    }
}

impl fmt::Display for WalletManagerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WalletManagerState {
    Created,
    Connected,
    Syncing,
    Disconnected,
    Deleted,
}

impl WalletManagerState {
    fn can_connect(&self) -> bool {
        matches!(
            self,
            WalletManagerState::Created | WalletManagerState::Disconnected
        )
    }

    fn is_online(&self) -> bool {
        matches!(
            self,
            WalletManagerState::Connected | WalletManagerState::Syncing
        )
    }
}

impl fmt::Display for WalletManagerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WalletManagerState::Created => "CREATED",
            WalletManagerState::Connected => "CONNECTED",
            WalletManagerState::Syncing => "SYNCING",
            WalletManagerState::Disconnected => "DISCONNECTED",
            WalletManagerState::Deleted => "DELETED",
        };
        f.write_str(name)
    }
}

/// Engine ownership and the current connection session.
///
/// Every connect, disconnect and failure ends the session, so completions
/// still in flight for an earlier session are recognised and dropped.
struct EngineLink {
    engine: Option<Box<dyn ManagerEngine>>,
    session: u64,
    connecting: bool,
}

impl EngineLink {
    fn end_session(&mut self, network_uids: &str) {
        self.session += 1;
        self.connecting = false;
        if let Some(engine) = self.engine.as_mut() {
            if let Err(e) = engine.disconnect() {
                log::warn!("Engine disconnect failed for {}: {}", network_uids, e);
            }
        }
    }
}

pub struct ManagerCore {
    system: WeakSystem,
    executor: SerialExecutor,
    engines: Arc<dyn LedgerEngine>,
    network: Handle<Network>,
    account: Handle<Account>,
    path: PathBuf,
    store: ManagerStateStore,
    mode: RwLock<WalletManagerMode>,
    state: RwLock<WalletManagerState>,
    wallets: RwLock<Vec<Wallet>>,
    link: Mutex<EngineLink>,
    last_synced_height: RwLock<Option<u64>>,
}

impl NativeResource for ManagerCore {
    const KIND: &'static str = "wallet-manager";

    fn release(&mut self) {
        if let Some(mut engine) = self.link.get_mut().engine.take() {
            engine.close();
        }
        self.wallets.get_mut().clear();
    }
}

/// Manager of one network's wallets for the system's account.
#[derive(Clone)]
pub struct WalletManager {
    core: Handle<ManagerCore>,
}

impl WalletManager {
    /// Build a manager for `network`, restoring whatever the previous session
    /// persisted. Listeners are told about it by the system once registered.
    pub(crate) fn create(
        system: &System,
        network: &Handle<Network>,
        mode: WalletManagerMode,
    ) -> WalletResult<Self> {
        if !mode.is_supported_by(network.network_type()) {
            return Err(WalletError::ValidationError(format!(
                "{} does not support {}",
                network.uids(),
                mode
            )));
        }

        let paths = system.paths();
        let path = paths.manager_dir(network.uids())?;
        let store = ManagerStateStore::from_paths(paths, network.uids())?;
        let snapshot = match store.load() {
            Ok(snapshot) => snapshot,
            Err(e) => {
                log::warn!("Discarding saved state for {}: {}", network.uids(), e);
                None
            }
        };
        let last_synced_height = snapshot.as_ref().and_then(|s| s.last_synced_height);

        let engines = system.engines();
        let engine = engines.create_manager(&ManagerEngineParams {
            network: network.take(),
            account: system.account(),
            mode,
            storage_path: path.clone(),
            last_synced_height,
        })?;

        let core = Handle::new(ManagerCore {
            system: system.downgrade(),
            executor: system.executor().clone(),
            engines,
            network: network.take(),
            account: system.account(),
            path,
            store,
            mode: RwLock::new(mode),
            state: RwLock::new(WalletManagerState::Created),
            wallets: RwLock::new(Vec::new()),
            link: Mutex::new(EngineLink {
                engine: Some(engine),
                session: 0,
                connecting: false,
            }),
            last_synced_height: RwLock::new(last_synced_height),
        });
        let manager = WalletManager { core };

        let currency = network.currency();
        manager.ensure_wallet(currency.code(), false).ok_or_else(|| {
            WalletError::MissingPrerequisite(format!("default unit for {}", currency.code()))
        })?;

        if let Some(snapshot) = snapshot {
            manager.restore(&snapshot);
        }
        if let Some(height) = last_synced_height {
            network.advance_height(height);
        }

        log::info!(
            "Created wallet manager for {} ({})",
            network.uids(),
            mode
        );
        Ok(manager)
    }

    pub(crate) fn from_core(core: Handle<ManagerCore>) -> Self {
        WalletManager { core }
    }

    pub(crate) fn downgrade(&self) -> WeakHandle<ManagerCore> {
        self.core.downgrade()
    }

    pub fn take(&self) -> Self {
        self.clone()
    }

    pub fn id(&self) -> HandleId {
        self.core.id()
    }

    pub fn same_object(&self, other: &WalletManager) -> bool {
        self.core.same_object(&other.core)
    }

    /// The owning system; fails once it has been destroyed and dropped.
    pub fn system(&self) -> WalletResult<System> {
        self.core.system.upgrade().ok_or(WalletError::SystemDestroyed)
    }

    pub fn network(&self) -> Handle<Network> {
        self.core.network.take()
    }

    pub fn account(&self) -> Handle<Account> {
        self.core.account.take()
    }

    /// Directory holding this manager's persistent state.
    pub fn path(&self) -> &Path {
        &self.core.path
    }

    pub fn mode(&self) -> WalletManagerMode {
        *self.core.mode.read()
    }

    pub fn state(&self) -> WalletManagerState {
        *self.core.state.read()
    }

    pub fn last_synced_height(&self) -> Option<u64> {
        *self.core.last_synced_height.read()
    }

    /// Wallet of the network's native currency. `None` once deleted.
    pub fn primary_wallet(&self) -> Option<Wallet> {
        self.core.wallets.read().first().cloned()
    }

    pub fn wallets(&self) -> Vec<Wallet> {
        self.core.wallets.read().clone()
    }

    pub fn wallet_for_currency_code(&self, code: &str) -> Option<Wallet> {
        self.core
            .wallets
            .read()
            .iter()
            .find(|wallet| wallet.currency().code().eq_ignore_ascii_case(code))
            .cloned()
    }

    pub fn has_wallet(&self, wallet: &Wallet) -> bool {
        self.core
            .wallets
            .read()
            .iter()
            .any(|known| known.same_object(wallet))
    }

    /// What would be persisted right now.
    pub fn snapshot(&self) -> ManagerSnapshot {
        let mut snapshot = ManagerSnapshot::new(self.core.network.uids(), self.mode().as_str());
        snapshot.last_synced_height = self.last_synced_height();
        for wallet in self.wallets() {
            snapshot.set_balance(wallet.currency().code(), wallet.balance().base_units());
        }
        snapshot
    }

    /// Change the sync mode. Only allowed while not connected; the engine is
    /// recreated for the new mode.
    pub fn set_mode(&self, mode: WalletManagerMode) -> WalletResult<()> {
        let state = self.state();
        if !state.can_connect() {
            return Err(WalletError::invalid_state("change mode", state));
        }
        if !mode.is_supported_by(self.core.network.network_type()) {
            return Err(WalletError::ValidationError(format!(
                "{} does not support {}",
                self.core.network.uids(),
                mode
            )));
        }
        if mode == self.mode() {
            return Ok(());
        }

        let manager = self.clone();
        self.core
            .executor
            .execute(move || manager.set_mode_on_queue(mode))
    }

    /// Start connecting. Valid from CREATED or DISCONNECTED.
    pub fn connect(&self) -> WalletResult<()> {
        let state = self.state();
        if !state.can_connect() {
            return Err(WalletError::invalid_state("connect", state));
        }
        let manager = self.clone();
        self.core.executor.execute(move || manager.connect_on_queue())
    }

    /// Start a sync. Valid only while CONNECTED.
    pub fn sync(&self) -> WalletResult<()> {
        let state = self.state();
        if state != WalletManagerState::Connected {
            return Err(WalletError::invalid_state("sync", state));
        }
        let manager = self.clone();
        self.core.executor.execute(move || manager.sync_on_queue())
    }

    /// Disconnect, cancelling any sync in flight. Valid while CONNECTED or
    /// SYNCING.
    pub fn disconnect(&self) -> WalletResult<()> {
        let state = self.state();
        if !state.is_online() {
            return Err(WalletError::invalid_state("disconnect", state));
        }
        let manager = self.clone();
        self.core
            .executor
            .execute(move || manager.disconnect_on_queue())
    }

    fn set_mode_on_queue(&self, mode: WalletManagerMode) {
        let state = self.state();
        if !state.can_connect() {
            log::debug!("{}: ignoring mode change while {}", self.uids(), state);
            return;
        }

        let params = ManagerEngineParams {
            network: self.network(),
            account: self.account(),
            mode,
            storage_path: self.core.path.clone(),
            last_synced_height: self.last_synced_height(),
        };
        let engine = match self.core.engines.create_manager(&params) {
            Ok(engine) => engine,
            Err(e) => {
                log::error!("{}: could not switch to {}: {}", self.uids(), mode, e);
                return;
            }
        };

        let mut link = self.core.link.lock();
        link.session += 1;
        link.connecting = false;
        if let Some(mut old) = link.engine.replace(engine) {
            old.close();
        }
        drop(link);

        *self.core.mode.write() = mode;
        self.persist();
        log::info!("{}: sync mode is now {}", self.uids(), mode);
    }

    fn connect_on_queue(&self) {
        let state = self.state();
        let mut guard = self.core.link.lock();
        let link = &mut *guard;
        if !state.can_connect() || link.connecting {
            log::debug!("{}: ignoring connect while {}", self.uids(), state);
            return;
        }

        link.session += 1;
        let sink = self.sink(link.session);
        let result = match link.engine.as_mut() {
            Some(engine) => {
                link.connecting = true;
                engine.connect(sink)
            }
            None => Err(WalletError::EngineError("engine closed".to_string())),
        };

        if let Err(e) = result {
            link.connecting = false;
            drop(guard);
            self.connect_failed(e.to_string());
        }
    }

    fn sync_on_queue(&self) {
        let state = self.state();
        if state != WalletManagerState::Connected {
            log::debug!("{}: ignoring sync while {}", self.uids(), state);
            return;
        }
        self.transition(WalletManagerState::Syncing);

        let result = {
            let mut link = self.core.link.lock();
            let sink = self.sink(link.session);
            match link.engine.as_mut() {
                Some(engine) => engine.sync(sink),
                None => Err(WalletError::EngineError("engine closed".to_string())),
            }
        };

        if let Err(e) = result {
            self.sync_failed(e.to_string());
        }
    }

    fn disconnect_on_queue(&self) {
        let state = self.state();
        if !state.is_online() {
            log::debug!("{}: ignoring disconnect while {}", self.uids(), state);
            return;
        }
        self.go_offline();
    }

    /// Tear down on behalf of the system: disconnect, close the engine and
    /// delete every wallet. Runs on the executor.
    pub(crate) fn stop_on_queue(&self) {
        if self.state() == WalletManagerState::Deleted {
            return;
        }
        if self.state().is_online() {
            self.go_offline();
        }

        let engine = {
            let mut link = self.core.link.lock();
            link.session += 1;
            link.connecting = false;
            link.engine.take()
        };
        if let Some(mut engine) = engine {
            engine.close();
        }

        let wallets = std::mem::take(&mut *self.core.wallets.write());
        for wallet in wallets {
            for transfer in wallet.clear_transfers() {
                transfer.set_state(TransferState::Deleted);
                self.announce_transfer(&wallet, &transfer, TransferEvent::Deleted);
                self.announce_wallet(&wallet, WalletEvent::TransferDeleted { transfer });
            }
            wallet.set_state(WalletState::Deleted);
            self.announce_wallet(&wallet, WalletEvent::Deleted);
            self.announce(WalletManagerEvent::WalletDeleted { wallet });
        }
        self.transition(WalletManagerState::Deleted);
    }

    /// Announce the wallets that exist at construction.
    pub(crate) fn announce_created(&self) {
        for wallet in self.wallets() {
            self.announce_wallet(&wallet, WalletEvent::Created);
            self.announce(WalletManagerEvent::WalletAdded { wallet });
        }
    }

    /// Apply one engine completion. Runs on the executor.
    pub(crate) fn handle_engine_event(&self, session: u64, event: EngineEvent) {
        let current = self.core.link.lock().session;
        if session != current {
            log::debug!(
                "{}: dropping {} from ended session {}",
                self.uids(),
                event,
                session
            );
            return;
        }

        let state = self.state();
        if event.is_sync_event() && state != WalletManagerState::Syncing {
            log::debug!("{}: dropping {} while {}", self.uids(), event, state);
            return;
        }
        log::trace!("{}: engine reported {}", self.uids(), event);

        match event {
            EngineEvent::Connected => {
                let was_connecting = std::mem::replace(&mut self.core.link.lock().connecting, false);
                if was_connecting && state.can_connect() {
                    self.transition(WalletManagerState::Connected);
                }
            }
            EngineEvent::ConnectFailed { reason } => {
                let was_connecting = std::mem::replace(&mut self.core.link.lock().connecting, false);
                if was_connecting {
                    self.connect_failed(reason);
                }
            }
            EngineEvent::Disconnected { reason } => {
                if state.is_online() {
                    log::warn!("{}: engine disconnected: {}", self.uids(), reason);
                    self.go_offline();
                }
            }
            EngineEvent::SyncProgress {
                percent_complete,
                timestamp,
            } => self.announce(WalletManagerEvent::SyncProgress {
                percent_complete,
                timestamp,
            }),
            EngineEvent::SyncSucceeded => {
                *self.core.last_synced_height.write() = Some(self.core.network.height());
                self.persist();
                self.announce(WalletManagerEvent::SyncSucceeded);
                self.transition(WalletManagerState::Connected);
            }
            EngineEvent::SyncFailed { reason } => self.sync_failed(reason),
            EngineEvent::BlockHeightUpdated { height } => {
                if self.core.network.advance_height(height) {
                    self.announce(WalletManagerEvent::BlockUpdated { height });
                }
            }
            EngineEvent::BalanceUpdated {
                currency_code,
                balance,
            } => self.update_balance(&currency_code, balance),
            EngineEvent::TransferDiscovered {
                currency_code,
                transfer,
            } => self.discover_transfer(&currency_code, transfer),
            EngineEvent::TransferStateChanged {
                currency_code,
                uids,
                state,
            } => self.change_transfer_state(&currency_code, &uids, state),
            EngineEvent::TransferRemoved {
                currency_code,
                uids,
            } => self.remove_transfer(&currency_code, &uids),
        }
    }

    fn connect_failed(&self, reason: String) {
        log::warn!("{}: connect failed: {}", self.uids(), reason);
        self.core.link.lock().end_session(self.uids());
        self.announce(WalletManagerEvent::ConnectFailed { reason });
        self.transition(WalletManagerState::Disconnected);
    }

    fn sync_failed(&self, reason: String) {
        log::warn!("{}: sync failed: {}", self.uids(), reason);
        self.announce(WalletManagerEvent::SyncFailed { reason });
        self.go_offline();
    }

    fn go_offline(&self) {
        self.core.link.lock().end_session(self.uids());
        self.persist();
        self.transition(WalletManagerState::Disconnected);
    }

    fn update_balance(&self, currency_code: &str, balance: u128) {
        let Some(wallet) = self.ensure_wallet(currency_code, true) else {
            log::debug!("{}: no currency {} for balance", self.uids(), currency_code);
            return;
        };
        if let Some(amount) = wallet.set_balance(balance) {
            self.announce_wallet(&wallet, WalletEvent::BalanceUpdated { amount });
            self.announce(WalletManagerEvent::WalletChanged { wallet });
        }
    }

    fn discover_transfer(&self, currency_code: &str, record: TransferRecord) {
        let Some(wallet) = self.ensure_wallet(currency_code, true) else {
            log::debug!("{}: no currency {} for transfer", self.uids(), currency_code);
            return;
        };
        if wallet.transfer_by_uids(&record.uids).is_some() {
            self.change_transfer_state(currency_code, &record.uids, record.state);
            return;
        }

        let network = &self.core.network;
        let fee_unit = network
            .base_unit(network.currency())
            .unwrap_or_else(|| wallet.base_unit());
        let amount = Amount::from_base_units(record.amount, false, &wallet.base_unit());
        let fee = Amount::from_base_units(record.fee, false, &fee_unit);
        let transfer = Transfer::new(
            &wallet,
            TransferParts {
                uids: &record.uids,
                source: record.source.as_deref(),
                target: record.target.as_deref(),
                amount: &amount,
                fee: &fee,
                direction: record.direction,
                hash: record.hash.as_deref(),
                state: record.state,
            },
        );
        wallet.add_transfer(&transfer);

        self.announce_transfer(&wallet, &transfer, TransferEvent::Created);
        self.announce_wallet(&wallet, WalletEvent::TransferAdded { transfer });
        self.announce(WalletManagerEvent::WalletChanged { wallet });
    }

    fn change_transfer_state(&self, currency_code: &str, uids: &str, state: TransferState) {
        let Some((wallet, transfer)) = self.find_transfer(currency_code, uids) else {
            return;
        };
        let old_state = transfer.set_state(state.clone());
        if old_state == state {
            return;
        }
        self.announce_transfer(
            &wallet,
            &transfer,
            TransferEvent::Changed {
                old_state,
                new_state: state,
            },
        );
        self.announce_wallet(&wallet, WalletEvent::TransferChanged { transfer });
    }

    fn remove_transfer(&self, currency_code: &str, uids: &str) {
        let Some((wallet, _)) = self.find_transfer(currency_code, uids) else {
            return;
        };
        if let Some(transfer) = wallet.remove_transfer(uids) {
            transfer.set_state(TransferState::Deleted);
            self.announce_transfer(&wallet, &transfer, TransferEvent::Deleted);
            self.announce_wallet(&wallet, WalletEvent::TransferDeleted { transfer });
            self.announce(WalletManagerEvent::WalletChanged { wallet });
        }
    }

    fn find_transfer(&self, currency_code: &str, uids: &str) -> Option<(Wallet, Transfer)> {
        let found = self
            .wallet_for_currency_code(currency_code)
            .and_then(|wallet| wallet.transfer_by_uids(uids).map(|t| (wallet, t)));
        if found.is_none() {
            log::debug!("{}: unknown transfer {} {}", self.uids(), currency_code, uids);
        }
        found
    }

    /// Existing wallet for `code`, or a new one when the network knows the
    /// currency. Wallets made during construction are announced later, with
    /// the manager.
    fn ensure_wallet(&self, code: &str, announce: bool) -> Option<Wallet> {
        if let Some(wallet) = self.wallet_for_currency_code(code) {
            return Some(wallet);
        }
        let network = &self.core.network;
        let currency = network.currency_by_code(code)?;
        let unit = network.default_unit(&currency)?;
        let wallet = Wallet::new(self.core.downgrade(), &currency, &unit);
        self.core.wallets.write().push(wallet.clone());

        if announce {
            self.announce_wallet(&wallet, WalletEvent::Created);
            self.announce(WalletManagerEvent::WalletAdded {
                wallet: wallet.clone(),
            });
        }
        Some(wallet)
    }

    fn restore(&self, snapshot: &ManagerSnapshot) {
        if snapshot.network_uids != self.core.network.uids() {
            log::warn!(
                "{}: ignoring saved state of {}",
                self.uids(),
                snapshot.network_uids
            );
            return;
        }
        for code in snapshot.balances.keys() {
            let balance = snapshot.balance(code);
            match (self.ensure_wallet(code, false), balance) {
                (Some(wallet), Some(balance)) => {
                    wallet.set_balance(balance);
                }
                _ => log::debug!("{}: skipping saved balance for {}", self.uids(), code),
            }
        }
    }

    fn persist(&self) {
        if let Err(e) = self.core.store.save(&self.snapshot()) {
            log::warn!("{}: could not save state: {}", self.uids(), e);
        }
    }

    fn transition(&self, new_state: WalletManagerState) {
        let old_state = std::mem::replace(&mut *self.core.state.write(), new_state);
        if old_state == new_state {
            return;
        }
        log::info!("{}: {} -> {}", self.uids(), old_state, new_state);
        self.announce(WalletManagerEvent::Changed {
            old_state,
            new_state,
        });
    }

    fn sink(&self, session: u64) -> EngineEventSink {
        EngineEventSink::new(self.core.executor.clone(), self.core.downgrade(), session)
    }

    fn uids(&self) -> &str {
        self.core.network.uids()
    }

    fn announce(&self, event: WalletManagerEvent) {
        match self.core.system.upgrade() {
            Some(system) => system.announce_manager_event(self, event),
            None => log::debug!("{}: no system for {}", self.uids(), event),
        }
    }

    fn announce_wallet(&self, wallet: &Wallet, event: WalletEvent) {
        match self.core.system.upgrade() {
            Some(system) => system.announce_wallet_event(self, wallet, event),
            None => log::debug!("{}: no system for {}", self.uids(), event),
        }
    }

    fn announce_transfer(&self, wallet: &Wallet, transfer: &Transfer, event: TransferEvent) {
        match self.core.system.upgrade() {
            Some(system) => system.announce_transfer_event(self, wallet, transfer, event),
            None => log::debug!("{}: no system for {}", self.uids(), event),
        }
    }
}

impl fmt::Debug for WalletManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletManager")
            .field("id", &self.id())
            .field("network", &self.uids())
            .field("mode", &self.mode())
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_parse_case_insensitively() {
        assert_eq!(
            WalletManagerMode::parse("api_only").unwrap(),
            WalletManagerMode::ApiOnly
        );
        assert_eq!(
            WalletManagerMode::parse(" P2P_WITH_API_SYNC ").unwrap(),
            WalletManagerMode::P2pWithApiSync
        );
        assert!(WalletManagerMode::parse("bluetooth").is_err());
    }

    #[test]
    fn mode_support_depends_on_network_type() {
        for mode in WalletManagerMode::ALL {
            assert!(mode.is_supported_by(NetworkType::Btc));
        }
        assert!(!WalletManagerMode::P2pWithApiSync.is_supported_by(NetworkType::Eth));
        assert!(!WalletManagerMode::P2pOnly.is_supported_by(NetworkType::Generic));
        assert!(WalletManagerMode::ApiOnly.is_supported_by(NetworkType::Generic));
    }

    #[test]
    fn states_render_uppercase() {
        assert_eq!(WalletManagerState::Disconnected.to_string(), "DISCONNECTED");
        assert!(WalletManagerState::Created.can_connect());
        assert!(!WalletManagerState::Syncing.can_connect());
        assert!(WalletManagerState::Syncing.is_online());
    }
}
