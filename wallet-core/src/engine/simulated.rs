//! Scriptable in-process engine used by the demo and the tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::engine::{
    EngineEvent, EngineEventSink, LedgerEngine, ManagerEngine, ManagerEngineParams, TransferRecord,
};
use crate::errors::{WalletError, WalletResult};

#[derive(Default)]
struct NetworkScript {
    unreachable: bool,
    failing_sync: Option<String>,
    height: Option<u64>,
    progress: Vec<f32>,
    balances: Vec<(String, u128)>,
    transfers: Vec<(String, TransferRecord)>,
    /// Sink of the most recent connect or sync
    sink: Option<EngineEventSink>,
    /// Sync issued while completion is manual
    pending_sync: bool,
}

#[derive(Default)]
struct SimulatedState {
    manual_sync: bool,
    networks: HashMap<String, NetworkScript>,
    commands: Vec<String>,
    open_managers: HashSet<String>,
}

/// Engine whose behaviour per network is set up ahead of time.
///
/// Connecting succeeds unless the network was marked unreachable. A sync
/// reports the scripted height, balances and transfers and then succeeds,
/// unless a failure was scripted. With manual sync enabled the sync stays
/// in flight until [`SimulatedEngine::complete_sync`] is called.
#[derive(Clone, Default)]
pub struct SimulatedEngine {
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reachable(&self, network_uids: &str, reachable: bool) {
        self.script(network_uids, |script| script.unreachable = !reachable);
    }

    /// Make every subsequent sync on `network_uids` fail with `reason`;
    /// `None` restores success.
    pub fn set_sync_failure(&self, network_uids: &str, reason: Option<&str>) {
        self.script(network_uids, |script| {
            script.failing_sync = reason.map(str::to_string)
        });
    }

    pub fn set_manual_sync(&self, manual: bool) {
        self.state.lock().manual_sync = manual;
    }

    pub fn set_block_height(&self, network_uids: &str, height: u64) {
        self.script(network_uids, |script| script.height = Some(height));
    }

    /// Progress percentages reported, in order, before a sync completes.
    pub fn set_sync_progress(&self, network_uids: &str, steps: &[f32]) {
        self.script(network_uids, |script| script.progress = steps.to_vec());
    }

    pub fn set_balance(&self, network_uids: &str, currency_code: &str, balance: u128) {
        self.script(network_uids, |script| {
            script.balances.retain(|(code, _)| code != currency_code);
            script.balances.push((currency_code.to_string(), balance));
        });
    }

    pub fn add_transfer(&self, network_uids: &str, currency_code: &str, transfer: TransferRecord) {
        self.script(network_uids, |script| {
            script
                .transfers
                .push((currency_code.to_string(), transfer))
        });
    }

    /// Finish a manually completed sync through the sink that started it.
    pub fn complete_sync(&self, network_uids: &str, success: bool) -> WalletResult<()> {
        let mut state = self.state.lock();
        let script = state
            .networks
            .get_mut(network_uids)
            .filter(|script| script.pending_sync)
            .ok_or_else(|| WalletError::NotFound(format!("sync in flight on {}", network_uids)))?;
        script.pending_sync = false;
        let sink = script
            .sink
            .clone()
            .ok_or_else(|| WalletError::NotFound(format!("sink for {}", network_uids)))?;

        if success {
            Self::report_sync_data(script, &sink)?;
            sink.deliver(EngineEvent::SyncSucceeded)
        } else {
            sink.deliver(EngineEvent::SyncFailed {
                reason: "sync aborted".to_string(),
            })
        }
    }

    /// Deliver an arbitrary event through the most recent sink of `network_uids`.
    pub fn inject(&self, network_uids: &str, event: EngineEvent) -> WalletResult<()> {
        let sink = self
            .state
            .lock()
            .networks
            .get(network_uids)
            .and_then(|script| script.sink.clone())
            .ok_or_else(|| WalletError::NotFound(format!("sink for {}", network_uids)))?;
        sink.deliver(event)
    }

    /// Every command issued so far, e.g. `connect bitcoin-testnet`.
    pub fn commands(&self) -> Vec<String> {
        self.state.lock().commands.clone()
    }

    /// Networks with a created, not yet closed, manager engine.
    pub fn open_managers(&self) -> Vec<String> {
        let mut open: Vec<String> = self.state.lock().open_managers.iter().cloned().collect();
        open.sort();
        open
    }

    fn script<F: FnOnce(&mut NetworkScript)>(&self, network_uids: &str, update: F) {
        let mut state = self.state.lock();
        update(state.networks.entry(network_uids.to_string()).or_default());
    }

    fn report_sync_data(script: &NetworkScript, sink: &EngineEventSink) -> WalletResult<()> {
        for percent_complete in &script.progress {
            sink.deliver(EngineEvent::SyncProgress {
                percent_complete: *percent_complete,
                timestamp: None,
            })?;
        }
        if let Some(height) = script.height {
            sink.deliver(EngineEvent::BlockHeightUpdated { height })?;
        }
        for (currency_code, balance) in &script.balances {
            sink.deliver(EngineEvent::BalanceUpdated {
                currency_code: currency_code.clone(),
                balance: *balance,
            })?;
        }
        for (currency_code, transfer) in &script.transfers {
            sink.deliver(EngineEvent::TransferDiscovered {
                currency_code: currency_code.clone(),
                transfer: transfer.clone(),
            })?;
        }
        Ok(())
    }
}

impl LedgerEngine for SimulatedEngine {
    fn create_manager(&self, params: &ManagerEngineParams) -> WalletResult<Box<dyn ManagerEngine>> {
        let network_uids = params.network.uids().to_string();
        let mut state = self.state.lock();
        state
            .commands
            .push(format!("create {} {}", network_uids, params.mode));
        state.open_managers.insert(network_uids.clone());
        Ok(Box::new(SimulatedManagerEngine {
            network_uids,
            state: Arc::clone(&self.state),
        }))
    }
}

struct SimulatedManagerEngine {
    network_uids: String,
    state: Arc<Mutex<SimulatedState>>,
}

impl SimulatedManagerEngine {
    fn record(&self, state: &mut SimulatedState, command: &str) {
        state
            .commands
            .push(format!("{} {}", command, self.network_uids));
    }
}

impl ManagerEngine for SimulatedManagerEngine {
    fn connect(&mut self, sink: EngineEventSink) -> WalletResult<()> {
        let mut state = self.state.lock();
        self.record(&mut state, "connect");
        let script = state.networks.entry(self.network_uids.clone()).or_default();
        script.sink = Some(sink.clone());
        script.pending_sync = false;

        if script.unreachable {
            return sink.deliver(EngineEvent::ConnectFailed {
                reason: format!("{} is unreachable", self.network_uids),
            });
        }
        sink.deliver(EngineEvent::Connected)?;
        if let Some(height) = script.height {
            sink.deliver(EngineEvent::BlockHeightUpdated { height })?;
        }
        Ok(())
    }

    fn disconnect(&mut self) -> WalletResult<()> {
        let mut state = self.state.lock();
        self.record(&mut state, "disconnect");
        Ok(())
    }

    fn sync(&mut self, sink: EngineEventSink) -> WalletResult<()> {
        let mut state = self.state.lock();
        self.record(&mut state, "sync");
        let manual = state.manual_sync;
        let script = state.networks.entry(self.network_uids.clone()).or_default();
        script.sink = Some(sink.clone());

        if manual {
            script.pending_sync = true;
            return Ok(());
        }
        if let Some(reason) = script.failing_sync.clone() {
            return sink.deliver(EngineEvent::SyncFailed { reason });
        }
        SimulatedEngine::report_sync_data(script, &sink)?;
        sink.deliver(EngineEvent::SyncSucceeded)
    }

    fn close(&mut self) {
        let mut state = self.state.lock();
        self.record(&mut state, "close");
        state.open_managers.remove(&self.network_uids);
    }
}
