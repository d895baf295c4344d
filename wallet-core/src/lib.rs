//! Resource ownership and lifecycle core of a multi-chain wallet runtime.
//!
//! A [`System`] owns one [`Account`] and a wallet manager per network. Every
//! native-backed entity is held through a reference-counted [`Handle`], all
//! engine completions and listener callbacks are serialised on one
//! [`SerialExecutor`], and hosts observe the runtime only through listeners.

pub mod account;
pub mod amount;
pub mod app_state;
pub mod blockchain_client;
pub mod config;
pub mod currency;
pub mod dispatcher;
pub mod engine;
pub mod errors;
pub mod events;
pub mod executor;
pub mod handle;
pub mod logging;
pub mod manager;
pub mod network;
pub mod network_fee;
pub mod storage;
pub mod system;
pub mod transfer;
pub mod unit;
pub mod validation;
pub mod wallet;

// Re-export common types
pub use account::Account;
pub use amount::Amount;
pub use app_state::{blockchain_client_for, HostContext};
pub use blockchain_client::{BlockchainClient, HttpBlockchainClient, StaticBlockchainClient};
pub use config::{Environment, LaunchOptions, RuntimeConfig};
pub use currency::{Currency, CurrencyType};
pub use dispatcher::{
    DispatchingSystemListener, SystemListener, TransferListener, WalletListener,
    WalletManagerListener,
};
pub use engine::simulated::SimulatedEngine;
pub use engine::{EngineEvent, LedgerEngine, ManagerEngine, TransferRecord};
pub use errors::{WalletError, WalletResult};
pub use events::{SystemEvent, TransferEvent, WalletEvent, WalletManagerEvent};
pub use executor::SerialExecutor;
pub use handle::{Handle, HandleId, NativeResource, WeakHandle};
pub use manager::{WalletManager, WalletManagerMode, WalletManagerState};
pub use network::{Network, NetworkBuilder, NetworkType};
pub use network_fee::NetworkFee;
pub use storage::{ManagerSnapshot, ManagerStateStore, SystemPaths};
pub use system::{NetworkFilter, NetworkSelection, System, SystemParams};
pub use transfer::{Transfer, TransferDirection, TransferState};
pub use unit::Unit;
pub use validation::InputValidator;
pub use wallet::{Wallet, WalletState};
