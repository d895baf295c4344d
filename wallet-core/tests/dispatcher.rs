mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use common::{Fixture, RecordingListener, BITCOIN};
use silica_wallet_core::{
    System, Wallet, WalletEvent, WalletListener, WalletManager, WalletManagerEvent,
    WalletManagerListener, WalletManagerState,
};

struct FailingListener {
    calls: AtomicUsize,
}

impl WalletManagerListener for FailingListener {
    fn handle_manager_event(
        &self,
        _: &System,
        _: &WalletManager,
        event: &WalletManagerEvent,
    ) -> anyhow::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        anyhow::bail!("rejecting {}", event)
    }
}

struct PanickingListener;

impl WalletListener for PanickingListener {
    fn handle_wallet_event(
        &self,
        _: &System,
        _: &WalletManager,
        _: &Wallet,
        _: &WalletEvent,
    ) -> anyhow::Result<()> {
        panic!("wallet listener blew up");
    }
}

/// Syncs a manager as soon as it reports a fresh connection.
struct AutoSync;

impl WalletManagerListener for AutoSync {
    fn handle_manager_event(
        &self,
        _: &System,
        manager: &WalletManager,
        event: &WalletManagerEvent,
    ) -> anyhow::Result<()> {
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

#[test]
fn failing_listeners_do_not_starve_later_ones() {
    let fixture = Fixture::new();
    let failing = Arc::new(FailingListener {
        calls: AtomicUsize::new(0),
    });
    let later = Arc::new(RecordingListener::default());
    fixture.dispatcher.add_manager_listener(failing.clone());
    fixture.dispatcher.add_wallet_listener(Arc::new(PanickingListener));
    fixture.dispatcher.add_system_listener(later.clone());
    assert_eq!(fixture.dispatcher.listener_count(), 4);

    let manager = fixture.manager(BITCOIN);
    fixture.engine.set_balance(BITCOIN, "btc", 42);
    fixture.connect(&manager);
    fixture.sync(&manager);

    assert!(failing.calls.load(Ordering::SeqCst) > 0);
    assert!(!later.lines().is_empty());
    // `later` joined after the system was created and missed only that
    let mut first = fixture.recorder.lines();
    assert_eq!(first.remove(0), "system Created");
    assert_eq!(first, later.lines());
    assert_eq!(later.count_matching("wallet btc BalanceUpdated"), 1);
}

#[test]
fn listeners_see_events_in_registration_order() {
    let fixture = Fixture::new();
    let order = Arc::new(parking_lot::Mutex::new(Vec::new()));

    struct Tagged {
        tag: &'static str,
        order: Arc<parking_lot::Mutex<Vec<&'static str>>>,
    }

    impl WalletManagerListener for Tagged {
        fn handle_manager_event(
            &self,
            _: &System,
            _: &WalletManager,
            _: &WalletManagerEvent,
        ) -> anyhow::Result<()> {
            self.order.lock().push(self.tag);
            Ok(())
        }
    }

    for tag in ["first", "second", "third"] {
        fixture.dispatcher.add_manager_listener(Arc::new(Tagged {
            tag,
            order: order.clone(),
        }));
    }

    let manager = fixture.manager(BITCOIN);
    order.lock().clear();
    fixture.connect(&manager);

    assert_eq!(*order.lock(), vec!["first", "second", "third"]);
}

#[test]
fn listener_may_drive_the_manager_it_observes() {
    let fixture = Fixture::new();
    fixture.dispatcher.add_manager_listener(Arc::new(AutoSync));

    let manager = fixture.manager(BITCOIN);
    fixture.recorder.clear();
    fixture.connect(&manager);

    assert_eq!(
        fixture.recorder.manager_events(BITCOIN),
        vec![
            "Changed(CREATED -> CONNECTED)",
            "Changed(CONNECTED -> SYNCING)",
            "SyncSucceeded",
            "Changed(SYNCING -> CONNECTED)",
        ]
    );
    assert!(manager.last_synced_height().is_some());
}
