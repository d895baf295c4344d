//! Boundary to the native ledger engine.
//!
//! The engine is opaque: a [`LedgerEngine`] creates one [`ManagerEngine`] per
//! wallet manager, commands are issued to it only from the serial executor,
//! and everything it reports comes back as an [`EngineEvent`] through an
//! [`EngineEventSink`], which queues the event on the same executor.

pub mod simulated;

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::account::Account;
use crate::errors::WalletResult;
use crate::executor::SerialExecutor;
use crate::handle::{Handle, WeakHandle};
use crate::manager::{ManagerCore, WalletManager, WalletManagerMode};
use crate::network::Network;
use crate::transfer::{TransferDirection, TransferState};

/// Transfer as reported by the engine, in base units of its currency.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferRecord {
    pub uids: String,
    pub source: Option<String>,
    pub target: Option<String>,
    pub amount: u128,
    pub fee: u128,
    pub direction: TransferDirection,
    pub hash: Option<String>,
    pub state: TransferState,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Connected,
    ConnectFailed {
        reason: String,
    },
    /// The engine lost its data source on its own
    Disconnected {
        reason: String,
    },
    SyncProgress {
        percent_complete: f32,
        timestamp: Option<DateTime<Utc>>,
    },
    SyncSucceeded,
    SyncFailed {
        reason: String,
    },
    BlockHeightUpdated {
        height: u64,
    },
    BalanceUpdated {
        currency_code: String,
        balance: u128,
    },
    TransferDiscovered {
        currency_code: String,
        transfer: TransferRecord,
    },
    TransferStateChanged {
        currency_code: String,
        uids: String,
        state: TransferState,
    },
    TransferRemoved {
        currency_code: String,
        uids: String,
    },
}

impl EngineEvent {
    /// Sync lifecycle events are only meaningful while syncing.
    pub fn is_sync_event(&self) -> bool {
        matches!(
            self,
            EngineEvent::SyncProgress { .. }
                | EngineEvent::SyncSucceeded
                | EngineEvent::SyncFailed { .. }
        )
    }
}

impl fmt::Display for EngineEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineEvent::Connected => write!(f, "Connected"),
            EngineEvent::ConnectFailed { reason } => write!(f, "ConnectFailed({})", reason),
            EngineEvent::Disconnected { reason } => write!(f, "Disconnected({})", reason),
            EngineEvent::SyncProgress {
                percent_complete, ..
            } => write!(f, "SyncProgress({:.0}%)", percent_complete),
            EngineEvent::SyncSucceeded => write!(f, "SyncSucceeded"),
            EngineEvent::SyncFailed { reason } => write!(f, "SyncFailed({})", reason),
            EngineEvent::BlockHeightUpdated { height } => write!(f, "BlockHeightUpdated({})", height),
            EngineEvent::BalanceUpdated {
                currency_code,
                balance,
            } => write!(f, "BalanceUpdated({} {})", balance, currency_code),
            EngineEvent::TransferDiscovered {
                currency_code,
                transfer,
            } => write!(f, "TransferDiscovered({} {})", currency_code, transfer.uids),
            EngineEvent::TransferStateChanged {
                currency_code,
                uids,
                state,
            } => write!(f, "TransferStateChanged({} {} {})", currency_code, uids, state),
            EngineEvent::TransferRemoved {
                currency_code,
                uids,
            } => write!(f, "TransferRemoved({} {})", currency_code, uids),
        }
    }
}

/// Where engine completions for one manager connection are delivered.
///
/// Each sink carries the connection session that created it; the manager
/// discards events from sessions it has since ended.
#[derive(Clone)]
pub struct EngineEventSink {
    executor: SerialExecutor,
    manager: WeakHandle<ManagerCore>,
    session: u64,
}

impl EngineEventSink {
    pub(crate) fn new(
        executor: SerialExecutor,
        manager: WeakHandle<ManagerCore>,
        session: u64,
    ) -> Self {
        Self {
            executor,
            manager,
            session,
        }
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    /// Queue `event` for the manager. Safe to call from any thread.
    pub fn deliver(&self, event: EngineEvent) -> WalletResult<()> {
        let manager = self.manager.clone();
        let session = self.session;
        self.executor.execute(move || match manager.upgrade() {
            Ok(core) => WalletManager::from_core(core).handle_engine_event(session, event),
            Err(_) => log::debug!("Dropping {} for released manager", event),
        })
    }
}

impl fmt::Debug for EngineEventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineEventSink")
            .field("manager", &self.manager.id())
            .field("session", &self.session)
            .finish()
    }
}

/// Everything an engine needs to set up one manager.
#[derive(Debug)]
pub struct ManagerEngineParams {
    pub network: Handle<Network>,
    pub account: Handle<Account>,
    pub mode: WalletManagerMode,
    pub storage_path: PathBuf,
    /// Height of the last successful sync, if any
    pub last_synced_height: Option<u64>,
}

/// Factory for per-manager engines.
pub trait LedgerEngine: Send + Sync {
    fn create_manager(&self, params: &ManagerEngineParams) -> WalletResult<Box<dyn ManagerEngine>>;
}

/// Command surface of one manager's engine. Called only from the serial
/// executor; results are reported through the sink.
pub trait ManagerEngine: Send {
    /// Begin connecting; report `Connected` or `ConnectFailed`.
    fn connect(&mut self, sink: EngineEventSink) -> WalletResult<()>;

    fn disconnect(&mut self) -> WalletResult<()>;

    /// Begin a sync; report progress and then `SyncSucceeded` or `SyncFailed`.
    fn sync(&mut self, sink: EngineEventSink) -> WalletResult<()>;

    /// Release engine resources; no further commands follow.
    fn close(&mut self);
}
