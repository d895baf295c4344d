use std::sync::Arc;
use std::time::Duration;

use once_cell::sync::OnceCell;
use parking_lot::{Mutex, RwLock};

use crate::account::Account;
use crate::blockchain_client::{BlockchainClient, HttpBlockchainClient, StaticBlockchainClient};
use crate::config::LaunchOptions;
use crate::dispatcher::{DispatchingSystemListener, SystemListener};
use crate::engine::LedgerEngine;
use crate::errors::{WalletError, WalletResult};
use crate::executor::SerialExecutor;
use crate::storage::SystemPaths;
use crate::system::{NetworkFilter, System, SystemParams};

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

struct HostState {
    options: LaunchOptions,
    executor: SerialExecutor,
    system: RwLock<System>,
}

/// What a host application holds instead of a process-wide singleton.
///
/// Listeners are registered on [`HostContext::listener`], before or after
/// initialisation; `initialize` runs once and reports repeats as
/// [`WalletError::AlreadyInitialized`].
pub struct HostContext {
    listener: Arc<DispatchingSystemListener>,
    state: OnceCell<HostState>,
    initializing: Mutex<()>,
}

impl HostContext {
    pub fn new() -> Self {
        HostContext {
            listener: Arc::new(DispatchingSystemListener::new()),
            state: OnceCell::new(),
            initializing: Mutex::new(()),
        }
    }

    /// Build the account, executor and system described by `options`.
    pub fn initialize(
        &self,
        options: LaunchOptions,
        engine: Arc<dyn LedgerEngine>,
        client: Arc<dyn BlockchainClient>,
    ) -> WalletResult<System> {
        let _guard = self.initializing.lock();
        if self.state.get().is_some() {
            return Err(WalletError::AlreadyInitialized);
        }

        Account::validate_phrase(&options.paper_key)?;
        let account_uids = Account::derive_uids(&options.paper_key);
        let account =
            Account::create_from_phrase(&options.paper_key, options.account_timestamp, &account_uids)?;

        if options.wipe_on_start {
            log::info!("Wiping stored state for account {}", account_uids);
            SystemPaths::new(&options.storage_path, &account_uids)?.wipe_account()?;
        }

        let executor = SerialExecutor::new("wallet-core", options.queue_capacity)?;
        let listener: Arc<dyn SystemListener> = self.listener.clone();
        let system = System::create(SystemParams {
            executor: executor.clone(),
            listener,
            account,
            is_mainnet: options.is_mainnet,
            storage_path: options.storage_path.clone(),
            client,
            engine,
        })?;

        log::info!(
            "Host initialised ({:?}, {})",
            options.environment,
            if options.is_mainnet { "mainnet" } else { "testnet" }
        );
        let state = HostState {
            options,
            executor,
            system: RwLock::new(system.clone()),
        };
        if self.state.set(state).is_err() {
            return Err(WalletError::AlreadyInitialized);
        }
        Ok(system)
    }

    pub fn is_initialized(&self) -> bool {
        self.state.get().is_some()
    }

    pub fn listener(&self) -> Arc<DispatchingSystemListener> {
        Arc::clone(&self.listener)
    }

    pub fn options(&self) -> WalletResult<&LaunchOptions> {
        Ok(&self.host()?.options)
    }

    pub fn system(&self) -> WalletResult<System> {
        Ok(self.host()?.system.read().clone())
    }

    /// Filter built from the configured currency codes and mode.
    pub fn network_filter(&self) -> WalletResult<NetworkFilter> {
        let options = self.options()?;
        Ok(match &options.currency_codes {
            Some(codes) => NetworkFilter::currency_codes(codes, options.mode),
            None => NetworkFilter::all(options.mode),
        })
    }

    /// Discover networks and create managers per the configured filter.
    pub fn configure(&self) -> WalletResult<()> {
        self.system()?.configure(&self.network_filter()?)
    }

    /// Replace the current system with a fresh one over the same account and
    /// configure it with the launch filter.
    pub fn reset_system(&self) -> WalletResult<System> {
        self.replace_system(System::reset)
    }

    /// Like [`HostContext::reset_system`], deleting persisted state first.
    pub fn wipe_system(&self) -> WalletResult<System> {
        self.replace_system(System::wipe)
    }

    fn replace_system<F>(&self, replace: F) -> WalletResult<System>
    where
        F: FnOnce(&System) -> WalletResult<System>,
    {
        let filter = self.network_filter()?;
        let host = self.host()?;
        let mut current = host.system.write();
        let fresh = replace(&*current)?;
        *current = fresh.clone();
        drop(current);

        fresh.configure(&filter)?;
        Ok(fresh)
    }

    /// Destroy the system and stop the executor once it has drained.
    pub fn shutdown(&self) -> WalletResult<()> {
        let host = self.host()?;
        host.system.read().destroy();
        if let Err(e) = host.executor.wait_idle(SHUTDOWN_TIMEOUT) {
            log::warn!("Executor did not drain before shutdown: {}", e);
        }
        host.executor.shutdown();
        Ok(())
    }

    fn host(&self) -> WalletResult<&HostState> {
        self.state.get().ok_or(WalletError::NotInitialized)
    }
}

impl Default for HostContext {
    fn default() -> Self {
        Self::new()
    }
}

/// HTTP client for a configured endpoint, otherwise the built-in catalogue.
pub fn blockchain_client_for(options: &LaunchOptions) -> WalletResult<Arc<dyn BlockchainClient>> {
    Ok(match &options.blockchain_endpoint {
        Some(endpoint) => Arc::new(HttpBlockchainClient::new(endpoint)?),
        None => Arc::new(StaticBlockchainClient::builtin(options.is_mainnet)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Environment, RuntimeConfig, KEY_STORAGE_PATH};
    use crate::engine::simulated::SimulatedEngine;
    use tempfile::TempDir;

    const SETTLE: Duration = Duration::from_secs(5);

    fn options(temp: &TempDir) -> LaunchOptions {
        let mut config = RuntimeConfig::new(Environment::Test);
        config.set(KEY_STORAGE_PATH, &temp.path().display().to_string());
        config.launch_options().unwrap()
    }

    #[test]
    fn initialize_runs_once() {
        let temp = TempDir::new().unwrap();
        let context = HostContext::new();
        assert_eq!(context.system().unwrap_err(), WalletError::NotInitialized);

        let options = options(&temp);
        let client = blockchain_client_for(&options).unwrap();
        let engine = Arc::new(SimulatedEngine::new());
        context
            .initialize(options.clone(), engine.clone(), client.clone())
            .unwrap();
        assert!(context.is_initialized());
        assert_eq!(
            context.initialize(options, engine, client).unwrap_err(),
            WalletError::AlreadyInitialized
        );

        context.shutdown().unwrap();
        assert!(context.system().unwrap().is_destroyed());
    }

    #[test]
    fn reset_replaces_the_system() {
        let temp = TempDir::new().unwrap();
        let context = HostContext::new();
        let options = options(&temp);
        let client = blockchain_client_for(&options).unwrap();
        let first = context
            .initialize(options, Arc::new(SimulatedEngine::new()), client)
            .unwrap();

        let second = context.reset_system().unwrap();
        assert!(first.is_destroyed());
        assert!(!second.is_destroyed());
        assert!(context.system().unwrap().same_object(&second));
        assert_eq!(first.account().uids(), second.account().uids());

        context.shutdown().unwrap();
    }

    #[test]
    fn recovered_systems_come_back_configured() {
        let temp = TempDir::new().unwrap();
        let context = HostContext::new();
        let options = options(&temp);
        let client = blockchain_client_for(&options).unwrap();
        let first = context
            .initialize(options, Arc::new(SimulatedEngine::new()), client)
            .unwrap();
        context.configure().unwrap();
        first.executor().wait_idle(SETTLE).unwrap();
        assert_eq!(first.wallet_managers().len(), 3);

        let reset = context.reset_system().unwrap();
        reset.executor().wait_idle(SETTLE).unwrap();
        assert!(first.wallet_managers().is_empty());
        assert_eq!(reset.wallet_managers().len(), 3);

        let wiped = context.wipe_system().unwrap();
        wiped.executor().wait_idle(SETTLE).unwrap();
        assert!(reset.is_destroyed());
        assert_eq!(wiped.wallet_managers().len(), 3);

        context.shutdown().unwrap();
    }
}
