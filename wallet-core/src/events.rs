//! Events delivered to listeners, one type per entity level.
//!
//! Events for one wallet manager are delivered in the order they were
//! generated; ordering across managers is unspecified.

use std::fmt;

use chrono::{DateTime, Utc};

use crate::amount::Amount;
use crate::handle::Handle;
use crate::manager::{WalletManager, WalletManagerState};
use crate::network::Network;
use crate::transfer::{Transfer, TransferState};
use crate::wallet::Wallet;

#[derive(Debug, Clone)]
pub enum SystemEvent {
    Created,
    NetworkAdded { network: Handle<Network> },
    /// Networks added by one `configure` pass
    NetworksDiscovered { networks: Vec<Handle<Network>> },
    ManagerAdded { manager: WalletManager },
    ManagerRemoved { manager: WalletManager },
    Destroyed,
}

impl fmt::Display for SystemEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SystemEvent::Created => write!(f, "Created"),
            SystemEvent::NetworkAdded { network } => write!(f, "NetworkAdded({})", network.uids()),
            SystemEvent::NetworksDiscovered { networks } => {
                let uids: Vec<&str> = networks.iter().map(|network| network.uids()).collect();
                write!(f, "NetworksDiscovered({})", uids.join(","))
            }
            SystemEvent::ManagerAdded { manager } => {
                write!(f, "ManagerAdded({})", manager.network().uids())
            }
            SystemEvent::ManagerRemoved { manager } => {
                write!(f, "ManagerRemoved({})", manager.network().uids())
            }
            SystemEvent::Destroyed => write!(f, "Destroyed"),
        }
    }
}

#[derive(Debug, Clone)]
pub enum WalletManagerEvent {
    Changed {
        old_state: WalletManagerState,
        new_state: WalletManagerState,
    },
    /// The engine could not reach any data source
    ConnectFailed { reason: String },
    SyncProgress {
        percent_complete: f32,
        timestamp: Option<DateTime<Utc>>,
    },
    SyncSucceeded,
    SyncFailed { reason: String },
    WalletAdded { wallet: Wallet },
    WalletChanged { wallet: Wallet },
    WalletDeleted { wallet: Wallet },
    BlockUpdated { height: u64 },
}

impl fmt::Display for WalletManagerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletManagerEvent::Changed {
                old_state,
                new_state,
            } => write!(f, "Changed({} -> {})", old_state, new_state),
            WalletManagerEvent::ConnectFailed { reason } => write!(f, "ConnectFailed({})", reason),
            WalletManagerEvent::SyncProgress {
                percent_complete, ..
            } => write!(f, "SyncProgress({:.0}%)", percent_complete),
            WalletManagerEvent::SyncSucceeded => write!(f, "SyncSucceeded"),
            WalletManagerEvent::SyncFailed { reason } => write!(f, "SyncFailed({})", reason),
            WalletManagerEvent::WalletAdded { wallet } => {
                write!(f, "WalletAdded({})", wallet.currency().code())
            }
            WalletManagerEvent::WalletChanged { wallet } => {
                write!(f, "WalletChanged({})", wallet.currency().code())
            }
            WalletManagerEvent::WalletDeleted { wallet } => {
                write!(f, "WalletDeleted({})", wallet.currency().code())
            }
            WalletManagerEvent::BlockUpdated { height } => write!(f, "BlockUpdated({})", height),
        }
    }
}

#[derive(Debug, Clone)]
pub enum WalletEvent {
    Created,
    BalanceUpdated { amount: Handle<Amount> },
    TransferAdded { transfer: Transfer },
    TransferChanged { transfer: Transfer },
    TransferDeleted { transfer: Transfer },
    Deleted,
}

impl fmt::Display for WalletEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletEvent::Created => write!(f, "Created"),
            WalletEvent::BalanceUpdated { amount } => write!(f, "BalanceUpdated({})", **amount),
            WalletEvent::TransferAdded { transfer } => {
                write!(f, "TransferAdded({})", transfer.uids())
            }
            WalletEvent::TransferChanged { transfer } => {
                write!(f, "TransferChanged({})", transfer.uids())
            }
            WalletEvent::TransferDeleted { transfer } => {
                write!(f, "TransferDeleted({})", transfer.uids())
            }
            WalletEvent::Deleted => write!(f, "Deleted"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransferEvent {
    Created,
    Changed {
        old_state: TransferState,
        new_state: TransferState,
    },
    Deleted,
}

impl fmt::Display for TransferEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferEvent::Created => write!(f, "Created"),
            TransferEvent::Changed {
                old_state,
                new_state,
            } => write!(f, "Changed({} -> {})", old_state, new_state),
            TransferEvent::Deleted => write!(f, "Deleted"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manager_events_render_states() {
        let event = WalletManagerEvent::Changed {
            old_state: WalletManagerState::Connected,
            new_state: WalletManagerState::Syncing,
        };
        assert_eq!(event.to_string(), "Changed(CONNECTED -> SYNCING)");

        let progress = WalletManagerEvent::SyncProgress {
            percent_complete: 49.6,
            timestamp: None,
        };
        assert_eq!(progress.to_string(), "SyncProgress(50%)");
    }

    #[test]
    fn transfer_events_render_states() {
        let event = TransferEvent::Changed {
            old_state: TransferState::Submitted,
            new_state: TransferState::Errored {
                message: "rejected".to_string(),
            },
        };
        assert_eq!(event.to_string(), "Changed(SUBMITTED -> ERRORED (rejected))");
    }
}
