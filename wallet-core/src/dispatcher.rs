//! Listener interfaces and fan-out.
//!
//! Listeners are read/react-only: they observe events and may query entities
//! but have no mutation path into the runtime beyond the public operations.
//! Every callback runs on the serial executor, so callbacks never overlap.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::events::{SystemEvent, TransferEvent, WalletEvent, WalletManagerEvent};
use crate::manager::WalletManager;
use crate::system::System;
use crate::transfer::Transfer;
use crate::wallet::Wallet;

pub trait TransferListener: Send + Sync {
    fn handle_transfer_event(
        &self,
        system: &System,
        manager: &WalletManager,
        wallet: &Wallet,
        transfer: &Transfer,
        event: &TransferEvent,
    ) -> anyhow::Result<()>;
}

pub trait WalletListener: Send + Sync {
    fn handle_wallet_event(
        &self,
        system: &System,
        manager: &WalletManager,
        wallet: &Wallet,
        event: &WalletEvent,
    ) -> anyhow::Result<()>;
}

pub trait WalletManagerListener: Send + Sync {
    fn handle_manager_event(
        &self,
        system: &System,
        manager: &WalletManager,
        event: &WalletManagerEvent,
    ) -> anyhow::Result<()>;
}

/// Receives events at every level.
pub trait SystemListener: WalletManagerListener + WalletListener + TransferListener {
    fn handle_system_event(&self, system: &System, event: &SystemEvent) -> anyhow::Result<()>;
}

#[derive(Clone)]
enum Registration {
    System(Arc<dyn SystemListener>),
    Manager(Arc<dyn WalletManagerListener>),
    Wallet(Arc<dyn WalletListener>),
    Transfer(Arc<dyn TransferListener>),
}

/// Fans each event out to its registered listeners in registration order.
///
/// A listener that returns an error or panics is logged and skipped; the
/// remaining listeners still receive the event.
#[derive(Default)]
pub struct DispatchingSystemListener {
    registrations: RwLock<Vec<Registration>>,
}

impl DispatchingSystemListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register for events at every level.
    pub fn add_system_listener(&self, listener: Arc<dyn SystemListener>) {
        self.registrations
            .write()
            .push(Registration::System(listener));
    }

    pub fn add_manager_listener(&self, listener: Arc<dyn WalletManagerListener>) {
        self.registrations
            .write()
            .push(Registration::Manager(listener));
    }

    pub fn add_wallet_listener(&self, listener: Arc<dyn WalletListener>) {
        self.registrations
            .write()
            .push(Registration::Wallet(listener));
    }

    pub fn add_transfer_listener(&self, listener: Arc<dyn TransferListener>) {
        self.registrations
            .write()
            .push(Registration::Transfer(listener));
    }

    pub fn listener_count(&self) -> usize {
        self.registrations.read().len()
    }

    // Listeners may register further listeners from a callback, so dispatch
    // works on a copy of the list.
    fn snapshot(&self) -> Vec<Registration> {
        self.registrations.read().clone()
    }
}

impl WalletManagerListener for DispatchingSystemListener {
    fn handle_manager_event(
        &self,
        system: &System,
        manager: &WalletManager,
        event: &WalletManagerEvent,
    ) -> anyhow::Result<()> {
        for registration in self.snapshot() {
            match registration {
                Registration::System(listener) => isolate("system", event, || {
                    listener.handle_manager_event(system, manager, event)
                }),
                Registration::Manager(listener) => isolate("manager", event, || {
                    listener.handle_manager_event(system, manager, event)
                }),
                _ => {}
            }
        }
        Ok(())
    }
}

impl WalletListener for DispatchingSystemListener {
    fn handle_wallet_event(
        &self,
        system: &System,
        manager: &WalletManager,
        wallet: &Wallet,
        event: &WalletEvent,
    ) -> anyhow::Result<()> {
        for registration in self.snapshot() {
            match registration {
                Registration::System(listener) => isolate("system", event, || {
                    listener.handle_wallet_event(system, manager, wallet, event)
                }),
                Registration::Wallet(listener) => isolate("wallet", event, || {
                    listener.handle_wallet_event(system, manager, wallet, event)
                }),
                _ => {}
            }
        }
        Ok(())
    }
}

impl TransferListener for DispatchingSystemListener {
    fn handle_transfer_event(
        &self,
        system: &System,
        manager: &WalletManager,
        wallet: &Wallet,
        transfer: &Transfer,
        event: &TransferEvent,
    ) -> anyhow::Result<()> {
        for registration in self.snapshot() {
            match registration {
                Registration::System(listener) => isolate("system", event, || {
                    listener.handle_transfer_event(system, manager, wallet, transfer, event)
                }),
                Registration::Transfer(listener) => isolate("transfer", event, || {
                    listener.handle_transfer_event(system, manager, wallet, transfer, event)
                }),
                _ => {}
            }
        }
        Ok(())
    }
}

impl SystemListener for DispatchingSystemListener {
    fn handle_system_event(&self, system: &System, event: &SystemEvent) -> anyhow::Result<()> {
        for registration in self.snapshot() {
            if let Registration::System(listener) = registration {
                isolate("system", event, || listener.handle_system_event(system, event));
            }
        }
        Ok(())
    }
}

/// Run one listener callback, logging instead of propagating its failure.
pub(crate) fn isolate<F>(level: &str, event: &dyn fmt::Display, call: F)
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(call)) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => log::warn!("{} listener failed handling {}: {:#}", level, event, err),
        Err(_) => log::error!("{} listener panicked handling {}", level, event),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn isolate_contains_errors_and_panics() {
        let calls = AtomicUsize::new(0);
        isolate("test", &"event", || {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(anyhow::anyhow!("listener bug"))
        });
        isolate("test", &"event", || {
            calls.fetch_add(1, Ordering::SeqCst);
            panic!("listener panic")
        });
        isolate("test", &"event", || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn registrations_accumulate() {
        struct Quiet;
        impl WalletListener for Quiet {
            fn handle_wallet_event(
                &self,
                _: &System,
                _: &WalletManager,
                _: &Wallet,
                _: &WalletEvent,
            ) -> anyhow::Result<()> {
                Ok(())
            }
        }

        let dispatcher = DispatchingSystemListener::new();
        dispatcher.add_wallet_listener(Arc::new(Quiet));
        dispatcher.add_wallet_listener(Arc::new(Quiet));
        assert_eq!(dispatcher.listener_count(), 2);
    }
}
