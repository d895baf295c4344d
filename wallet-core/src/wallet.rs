use std::fmt;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::currency::Currency;
use crate::errors::WalletResult;
use crate::handle::{Handle, HandleId, NativeResource, WeakHandle};
use crate::manager::{ManagerCore, WalletManager};
use crate::transfer::Transfer;
use crate::unit::Unit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WalletState {
    Created,
    Deleted,
}

impl fmt::Display for WalletState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WalletState::Created => write!(f, "CREATED"),
            WalletState::Deleted => write!(f, "DELETED"),
        }
    }
}

pub struct WalletCore {
    manager: WeakHandle<ManagerCore>,
    currency: Handle<Currency>,
    unit: Handle<Unit>,
    base_unit: Handle<Unit>,
    balance: RwLock<Handle<Amount>>,
    transfers: RwLock<Vec<Transfer>>,
    state: RwLock<WalletState>,
}

impl NativeResource for WalletCore {
    const KIND: &'static str = "wallet";

    fn release(&mut self) {
        // Transfers go with their wallet
        self.transfers.get_mut().clear();
    }
}

/// Holdings of one currency within a wallet manager.
#[derive(Clone)]
pub struct Wallet {
    core: Handle<WalletCore>,
}

impl Wallet {
    /// Empty wallet for `currency`, displayed in `unit`.
    pub(crate) fn new(
        manager: WeakHandle<ManagerCore>,
        currency: &Handle<Currency>,
        unit: &Handle<Unit>,
    ) -> Self {
        let base_unit = unit.base_unit();
        Wallet {
            core: Handle::new(WalletCore {
                manager,
                currency: currency.take(),
                unit: unit.take(),
                balance: RwLock::new(Amount::from_base_units(0, false, unit)),
                base_unit,
                transfers: RwLock::new(Vec::new()),
                state: RwLock::new(WalletState::Created),
            }),
        }
    }

    pub(crate) fn from_core(core: Handle<WalletCore>) -> Self {
        Wallet { core }
    }

    pub(crate) fn downgrade(&self) -> WeakHandle<WalletCore> {
        self.core.downgrade()
    }

    pub fn take(&self) -> Self {
        self.clone()
    }

    pub fn id(&self) -> HandleId {
        self.core.id()
    }

    pub fn same_object(&self, other: &Wallet) -> bool {
        self.core.same_object(&other.core)
    }

    /// The owning manager; fails once the manager has been released.
    pub fn manager(&self) -> WalletResult<WalletManager> {
        self.core.manager.upgrade().map(WalletManager::from_core)
    }

    pub fn currency(&self) -> Handle<Currency> {
        self.core.currency.take()
    }

    /// Default display unit.
    pub fn unit(&self) -> Handle<Unit> {
        self.core.unit.take()
    }

    pub fn base_unit(&self) -> Handle<Unit> {
        self.core.base_unit.take()
    }

    pub fn balance(&self) -> Handle<Amount> {
        self.core.balance.read().take()
    }

    pub fn state(&self) -> WalletState {
        *self.core.state.read()
    }

    /// Transfers in the order they were discovered.
    pub fn transfers(&self) -> Vec<Transfer> {
        self.core.transfers.read().clone()
    }

    pub fn transfer_count(&self) -> usize {
        self.core.transfers.read().len()
    }

    pub fn transfer_by_uids(&self, uids: &str) -> Option<Transfer> {
        self.core
            .transfers
            .read()
            .iter()
            .find(|transfer| transfer.uids() == uids)
            .cloned()
    }

    pub fn has_transfer(&self, transfer: &Transfer) -> bool {
        self.core
            .transfers
            .read()
            .iter()
            .any(|known| known.same_object(transfer))
    }

    /// Set the balance in base units. Returns the new balance when it changed.
    pub(crate) fn set_balance(&self, base_units: u128) -> Option<Handle<Amount>> {
        let mut balance = self.core.balance.write();
        if balance.base_units() == base_units && !balance.is_negative() {
            return None;
        }
        let updated = Amount::from_base_units(base_units, false, &self.core.unit);
        *balance = updated.take();
        Some(updated)
    }

    pub(crate) fn add_transfer(&self, transfer: &Transfer) {
        self.core.transfers.write().push(transfer.take());
    }

    pub(crate) fn remove_transfer(&self, uids: &str) -> Option<Transfer> {
        let mut transfers = self.core.transfers.write();
        let index = transfers.iter().position(|transfer| transfer.uids() == uids)?;
        Some(transfers.remove(index))
    }

    /// Drop every transfer; returns them in discovery order.
    pub(crate) fn clear_transfers(&self) -> Vec<Transfer> {
        std::mem::take(&mut *self.core.transfers.write())
    }

    pub(crate) fn set_state(&self, state: WalletState) -> WalletState {
        std::mem::replace(&mut *self.core.state.write(), state)
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("id", &self.id())
            .field("currency", &self.core.currency.code())
            .field("balance", &self.core.balance.read().to_string())
            .field("transfers", &self.transfer_count())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::transfer::{TransferDirection, TransferParts, TransferState};

    /// A bitcoin wallet with no owning manager.
    pub(crate) fn btc_wallet() -> Wallet {
        let btc = Currency::create("bitcoin", "bitcoin", "btc", "native", None).unwrap();
        let sat = Unit::create_as_base(&btc, "sat", "satoshi", "SAT").unwrap();
        let bitcoin = Unit::create(&btc, "btc", "bitcoin", "B", &sat, 8).unwrap();
        Wallet::new(WeakHandle::detached(), &btc, &bitcoin)
    }

    fn received(wallet: &Wallet, uids: &str) -> Transfer {
        let amount = Amount::create_integer(1, &wallet.unit()).unwrap();
        let fee = Amount::create_integer(0, &wallet.base_unit()).unwrap();
        Transfer::new(
            wallet,
            TransferParts {
                uids,
                source: None,
                target: Some("me"),
                amount: &amount,
                fee: &fee,
                direction: TransferDirection::Received,
                hash: None,
                state: TransferState::Created,
            },
        )
    }

    #[test]
    fn new_wallet_is_empty() {
        let wallet = btc_wallet();
        assert!(wallet.balance().is_zero());
        assert_eq!(wallet.state(), WalletState::Created);
        assert!(wallet.base_unit().is_base());
        assert_eq!(wallet.unit().decimals(), 8);
        assert!(wallet.manager().is_err());
    }

    #[test]
    fn balance_changes_are_reported_once() {
        let wallet = btc_wallet();
        let updated = wallet.set_balance(150_000_000).unwrap();
        assert_eq!(updated.to_string(), "1.5 B");
        assert!(wallet.set_balance(150_000_000).is_none());
        assert_eq!(*wallet.balance(), *updated);
    }

    #[test]
    fn transfers_keep_discovery_order() {
        let wallet = btc_wallet();
        for uids in ["a", "b", "c"] {
            let transfer = received(&wallet, uids);
            wallet.add_transfer(&transfer);
        }
        let order: Vec<String> = wallet
            .transfers()
            .iter()
            .map(|t| t.uids().to_string())
            .collect();
        assert_eq!(order, vec!["a", "b", "c"]);

        let removed = wallet.remove_transfer("b").unwrap();
        assert!(!wallet.has_transfer(&removed));
        assert!(wallet.transfer_by_uids("c").is_some());
        assert_eq!(wallet.clear_transfers().len(), 2);
        assert_eq!(wallet.transfer_count(), 0);
    }
}
