//! Demo host: brings up a system over the simulated engine, connects and
//! syncs every manager, and reports the resulting wallets.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;

use silica_wallet_core::config::TEST_PAPER_KEY;
use silica_wallet_core::logging::init_logging_from_config;
use silica_wallet_core::{
    blockchain_client_for, Account, HostContext, RuntimeConfig, SimulatedEngine, System,
    SystemEvent, SystemListener, Transfer, TransferDirection, TransferEvent, TransferListener,
    TransferRecord, TransferState, Wallet, WalletEvent, WalletListener, WalletManager,
    WalletManagerEvent, WalletManagerListener, WalletManagerState,
};

const SETTLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Logs every event and drives each new manager through connect and sync.
struct DemoListener;

impl SystemListener for DemoListener {
    fn handle_system_event(&self, _system: &System, event: &SystemEvent) -> anyhow::Result<()> {
        log::info!("system: {}", event);
        if let SystemEvent::ManagerAdded { manager } = event {
            manager.connect()?;
        }
        Ok(())
    }
}

impl WalletManagerListener for DemoListener {
    fn handle_manager_event(
        &self,
        _system: &System,
        manager: &WalletManager,
        event: &WalletManagerEvent,
    ) -> anyhow::Result<()> {
        log::info!("{}: {}", manager.network().uids(), event);
        if let WalletManagerEvent::Changed {
            old_state: WalletManagerState::Created,
            new_state: WalletManagerState::Connected,
        } = event
        {
            manager.sync()?;
        }
        Ok(())
    }
}

impl WalletListener for DemoListener {
    fn handle_wallet_event(
        &self,
        _system: &System,
        _manager: &WalletManager,
        wallet: &Wallet,
        event: &WalletEvent,
    ) -> anyhow::Result<()> {
        log::info!("wallet {}: {}", wallet.currency().code(), event);
        Ok(())
    }
}

impl TransferListener for DemoListener {
    fn handle_transfer_event(
        &self,
        _system: &System,
        _manager: &WalletManager,
        _wallet: &Wallet,
        transfer: &Transfer,
        event: &TransferEvent,
    ) -> anyhow::Result<()> {
        log::info!("transfer {}: {}", transfer.uids(), event);
        Ok(())
    }
}

fn scripted_engine(is_mainnet: bool) -> SimulatedEngine {
    let suffix = if is_mainnet { "mainnet" } else { "testnet" };
    let bitcoin = format!("bitcoin-{}", suffix);
    let ethereum = format!("ethereum-{}", suffix);

    let engine = SimulatedEngine::new();
    engine.set_sync_progress(&bitcoin, &[25.0, 75.0]);
    engine.set_block_height(&bitcoin, 1_700_100);
    engine.set_balance(&bitcoin, "btc", 150_000_000);
    engine.add_transfer(
        &bitcoin,
        "btc",
        TransferRecord {
            uids: "demo-receive-1".to_string(),
            source: Some("tb1qsender".to_string()),
            target: Some("tb1qdemo".to_string()),
            amount: 150_000_000,
            fee: 1_000,
            direction: TransferDirection::Received,
            hash: Some("00aa".repeat(16)),
            state: TransferState::Included {
                block_number: 1_700_050,
                transaction_index: 3,
                timestamp: Utc::now(),
            },
        },
    );
    engine.set_block_height(&ethereum, 7_000_250);
    engine.set_balance(&ethereum, "eth", 2_500_000_000_000_000_000);
    engine.set_reachable(&format!("bitcoin-cash-{}", suffix), false);
    engine
}

fn main() -> anyhow::Result<()> {
    let config = RuntimeConfig::from_env().context("loading configuration")?;
    init_logging_from_config(&config);

    let mut options = config.launch_options()?;
    if let Err(e) = Account::validate_phrase(&options.paper_key) {
        anyhow::ensure!(!config.is_production(), "configured paper key is invalid: {}", e);
        log::warn!("Paper key rejected ({}); using the test phrase", e);
        options.paper_key = TEST_PAPER_KEY.to_string().into();
    }

    let engine = Arc::new(scripted_engine(options.is_mainnet));
    let client = blockchain_client_for(&options)?;

    let context = HostContext::new();
    context.listener().add_system_listener(Arc::new(DemoListener));
    let system = context.initialize(options, engine.clone(), client)?;
    context.configure()?;

    // Managers connect and sync from the listener; wait for it all to settle
    system.executor().wait_idle(SETTLE_TIMEOUT)?;

    for manager in system.wallet_managers() {
        println!(
            "{} [{}] {} height {}",
            manager.network().uids(),
            manager.mode(),
            manager.state(),
            manager.network().height()
        );
        for wallet in manager.wallets() {
            println!(
                "  {}: {} ({} transfers)",
                wallet.currency().code(),
                *wallet.balance(),
                wallet.transfer_count()
            );
        }
    }
    log::debug!("Engine commands: {:?}", engine.commands());

    context.shutdown()?;
    Ok(())
}
