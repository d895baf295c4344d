use std::fmt;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::errors::WalletResult;
use crate::handle::{Handle, HandleId, NativeResource, WeakHandle};
use crate::wallet::{Wallet, WalletCore};

/// Direction of a transfer relative to the wallet that holds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransferDirection {
    Sent,
    Received,
    /// Sent from the wallet to itself
    Recovered,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TransferState {
    Created,
    Signed,
    Submitted,
    Included {
        block_number: u64,
        transaction_index: u64,
        timestamp: DateTime<Utc>,
    },
    Errored {
        message: String,
    },
    Deleted,
}

impl TransferState {
    pub fn is_included(&self) -> bool {
        matches!(self, TransferState::Included { .. })
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransferState::Created => write!(f, "CREATED"),
            TransferState::Signed => write!(f, "SIGNED"),
            TransferState::Submitted => write!(f, "SUBMITTED"),
            TransferState::Included { block_number, .. } => {
                write!(f, "INCLUDED @ {}", block_number)
            }
            TransferState::Errored { message } => write!(f, "ERRORED ({})", message),
            TransferState::Deleted => write!(f, "DELETED"),
        }
    }
}

pub struct TransferCore {
    uids: String,
    wallet: WeakHandle<WalletCore>,
    source: Option<String>,
    target: Option<String>,
    amount: Handle<Amount>,
    fee: Handle<Amount>,
    direction: TransferDirection,
    hash: RwLock<Option<String>>,
    state: RwLock<TransferState>,
}

impl NativeResource for TransferCore {
    const KIND: &'static str = "transfer";
}

/// Field values for a new transfer.
#[derive(Debug)]
pub(crate) struct TransferParts<'a> {
    pub uids: &'a str,
    pub source: Option<&'a str>,
    pub target: Option<&'a str>,
    pub amount: &'a Handle<Amount>,
    pub fee: &'a Handle<Amount>,
    pub direction: TransferDirection,
    pub hash: Option<&'a str>,
    pub state: TransferState,
}

/// A movement of value recorded in one wallet.
///
/// Owned by its wallet; the back-reference to the wallet never keeps the
/// wallet alive.
#[derive(Clone)]
pub struct Transfer {
    core: Handle<TransferCore>,
}

impl Transfer {
    pub(crate) fn new(wallet: &Wallet, parts: TransferParts<'_>) -> Self {
        Transfer {
            core: Handle::new(TransferCore {
                uids: parts.uids.to_string(),
                wallet: wallet.downgrade(),
                source: parts.source.map(str::to_string),
                target: parts.target.map(str::to_string),
                amount: parts.amount.take(),
                fee: parts.fee.take(),
                direction: parts.direction,
                hash: RwLock::new(parts.hash.map(str::to_string)),
                state: RwLock::new(parts.state),
            }),
        }
    }

    /// Another owning reference to this transfer.
    pub fn take(&self) -> Self {
        self.clone()
    }

    pub fn id(&self) -> HandleId {
        self.core.id()
    }

    pub fn same_object(&self, other: &Transfer) -> bool {
        self.core.same_object(&other.core)
    }

    pub fn uids(&self) -> &str {
        &self.core.uids
    }

    /// The owning wallet; fails once the wallet has been released.
    pub fn wallet(&self) -> WalletResult<Wallet> {
        self.core.wallet.upgrade().map(Wallet::from_core)
    }

    pub fn source_address(&self) -> Option<&str> {
        self.core.source.as_deref()
    }

    pub fn target_address(&self) -> Option<&str> {
        self.core.target.as_deref()
    }

    pub fn amount(&self) -> Handle<Amount> {
        self.core.amount.take()
    }

    pub fn fee(&self) -> Handle<Amount> {
        self.core.fee.take()
    }

    pub fn direction(&self) -> TransferDirection {
        self.core.direction
    }

    /// Amount signed from the wallet's point of view: negative when sent,
    /// zero when recovered.
    pub fn amount_directed(&self) -> Handle<Amount> {
        let amount = &self.core.amount;
        match self.core.direction {
            TransferDirection::Sent => amount.negate(),
            TransferDirection::Received => amount.take(),
            TransferDirection::Recovered => Amount::from_base_units(0, false, amount.unit()),
        }
    }

    pub fn hash(&self) -> Option<String> {
        self.core.hash.read().clone()
    }

    pub fn state(&self) -> TransferState {
        self.core.state.read().clone()
    }

    /// Replace the state; returns the previous one. Executor only.
    pub(crate) fn set_state(&self, state: TransferState) -> TransferState {
        std::mem::replace(&mut *self.core.state.write(), state)
    }

    pub(crate) fn set_hash(&self, hash: Option<String>) {
        *self.core.hash.write() = hash;
    }
}

impl fmt::Debug for Transfer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transfer")
            .field("id", &self.id())
            .field("uids", &self.core.uids)
            .field("direction", &self.core.direction)
            .field("amount", &self.core.amount.to_string())
            .field("state", &*self.core.state.read())
            .finish()
    }
}
