#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use parking_lot::Mutex;
use tempfile::TempDir;

use silica_wallet_core::{
    Account, DispatchingSystemListener, Handle, NetworkFilter, SerialExecutor, SimulatedEngine,
    StaticBlockchainClient, System, SystemEvent, SystemListener, SystemParams, Transfer,
    TransferEvent, TransferListener, Wallet, WalletEvent, WalletListener, WalletManager,
    WalletManagerEvent, WalletManagerListener, WalletManagerMode,
};

pub const PHRASE_A: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
pub const PHRASE_B: &str =
    "legal winner thank year wave sausage worth useful legal winner thank yellow";

pub const BITCOIN: &str = "bitcoin-testnet";
pub const ETHEREUM: &str = "ethereum-testnet";

const SETTLE_TIMEOUT: Duration = Duration::from_secs(5);

/// Records every event as a line of text, in delivery order.
#[derive(Default)]
pub struct RecordingListener {
    lines: Mutex<Vec<String>>,
}

impl RecordingListener {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().clone()
    }

    pub fn clear(&self) {
        self.lines.lock().clear();
    }

    /// Manager-level events for one network, without the network prefix.
    pub fn manager_events(&self, network_uids: &str) -> Vec<String> {
        let prefix = format!("manager {} ", network_uids);
        self.lines()
            .iter()
            .filter_map(|line| line.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn system_events(&self) -> Vec<String> {
        self.lines()
            .iter()
            .filter_map(|line| line.strip_prefix("system ").map(str::to_string))
            .collect()
    }

    pub fn count_matching(&self, needle: &str) -> usize {
        self.lines().iter().filter(|line| line.contains(needle)).count()
    }

    fn push(&self, line: String) {
        self.lines.lock().push(line);
    }
}

impl SystemListener for RecordingListener {
    fn handle_system_event(&self, _: &System, event: &SystemEvent) -> anyhow::Result<()> {
        self.push(format!("system {}", event));
        Ok(())
    }
}

impl WalletManagerListener for RecordingListener {
    fn handle_manager_event(
        &self,
        _: &System,
        manager: &WalletManager,
        event: &WalletManagerEvent,
    ) -> anyhow::Result<()> {
        self.push(format!("manager {} {}", manager.network().uids(), event));
        Ok(())
    }
}

impl WalletListener for RecordingListener {
    fn handle_wallet_event(
        &self,
        _: &System,
        _: &WalletManager,
        wallet: &Wallet,
        event: &WalletEvent,
    ) -> anyhow::Result<()> {
        self.push(format!("wallet {} {}", wallet.currency().code(), event));
        Ok(())
    }
}

impl TransferListener for RecordingListener {
    fn handle_transfer_event(
        &self,
        _: &System,
        _: &WalletManager,
        _: &Wallet,
        transfer: &Transfer,
        event: &TransferEvent,
    ) -> anyhow::Result<()> {
        self.push(format!("transfer {} {}", transfer.uids(), event));
        Ok(())
    }
}

pub fn init_logging() {
    silica_wallet_core::logging::init_test_logging();
}

pub fn account(phrase: &str) -> Handle<Account> {
    Account::create_from_phrase(phrase, Utc::now(), &Account::derive_uids(phrase))
        .expect("valid test phrase")
}

/// One testnet system over the built-in catalogue and a simulated engine.
pub struct Fixture {
    pub root: TempDir,
    pub executor: SerialExecutor,
    pub engine: SimulatedEngine,
    pub dispatcher: Arc<DispatchingSystemListener>,
    pub recorder: Arc<RecordingListener>,
    pub system: System,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_root(TempDir::new().expect("temp dir"), PHRASE_A)
    }

    pub fn with_root(root: TempDir, phrase: &str) -> Self {
        init_logging();
        let executor = SerialExecutor::new("wallet-core-test", 256).expect("executor");
        let engine = SimulatedEngine::new();
        let recorder = Arc::new(RecordingListener::default());
        let dispatcher = Arc::new(DispatchingSystemListener::new());
        dispatcher.add_system_listener(recorder.clone());

        let system = System::create(params(
            root.path(),
            &executor,
            dispatcher.clone(),
            &engine,
            account(phrase),
        ))
        .expect("system");

        let fixture = Fixture {
            root,
            executor,
            engine,
            dispatcher,
            recorder,
            system,
        };
        fixture.settle();
        fixture
    }

    /// Block until every queued job and callback has run.
    pub fn settle(&self) {
        self.executor
            .wait_idle(SETTLE_TIMEOUT)
            .expect("executor settles");
    }

    pub fn configure(&self, filter: &NetworkFilter) {
        self.system.configure(filter).expect("configure");
        self.settle();
    }

    /// Configure just `network_uids` and return its manager.
    pub fn manager(&self, network_uids: &str) -> WalletManager {
        self.configure(&NetworkFilter::network_uids(
            &[network_uids],
            WalletManagerMode::ApiOnly,
        ));
        self.system
            .wallet_manager_for(network_uids)
            .expect("manager for configured network")
    }

    pub fn connect(&self, manager: &WalletManager) {
        manager.connect().expect("connect accepted");
        self.settle();
    }

    pub fn sync(&self, manager: &WalletManager) {
        manager.sync().expect("sync accepted");
        self.settle();
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        self.system.destroy();
        let _ = self.executor.wait_idle(SETTLE_TIMEOUT);
        self.executor.shutdown();
    }
}

pub fn params(
    root: &Path,
    executor: &SerialExecutor,
    listener: Arc<dyn SystemListener>,
    engine: &SimulatedEngine,
    account: Handle<Account>,
) -> SystemParams {
    SystemParams {
        executor: executor.clone(),
        listener,
        account,
        is_mainnet: false,
        storage_path: root.to_path_buf(),
        client: Arc::new(StaticBlockchainClient::builtin(false)),
        engine: Arc::new(engine.clone()),
    }
}
