//! Reference-counted ownership of native-backed objects.
//!
//! A [`Handle`] is one owning reference. `take` hands out another owning
//! reference to the same object, `give` returns one; the object's
//! [`NativeResource::release`] hook runs exactly once, when the final owner is
//! given back. Borrowing is plain `&Handle<T>` (or `&T` through `Deref`), so the
//! borrow checker bounds a borrowed handle by its lender.
//!
//! `give` consumes the handle, so releasing twice or using a handle after
//! giving it back does not compile. Back-references that must not keep an
//! object alive use [`WeakHandle`], whose `upgrade` reports a released object
//! as [`WalletError::ReleasedHandle`].

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};

use crate::errors::{WalletError, WalletResult};

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of one native object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct HandleId(u64);

impl HandleId {
    fn next() -> Self {
        HandleId(NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An object whose lifetime is governed by [`Handle`] reference counting.
pub trait NativeResource: Send + Sync + 'static {
    /// Label used in logs and released-handle errors.
    const KIND: &'static str;

    /// Runs once, when the last owning reference is given back.
    fn release(&mut self) {}
}

struct Slot<T: NativeResource> {
    id: HandleId,
    object: T,
}

impl<T: NativeResource> Drop for Slot<T> {
    fn drop(&mut self) {
        log::trace!("Releasing {} {}", T::KIND, self.id);
        self.object.release();
    }
}

/// Owning reference to a native-backed object.
pub struct Handle<T: NativeResource> {
    slot: Arc<Slot<T>>,
}

impl<T: NativeResource> Handle<T> {
    /// Wrap a freshly created object; the returned handle is its first owner.
    pub fn new(object: T) -> Self {
        let id = HandleId::next();
        log::trace!("Created {} {}", T::KIND, id);
        Self {
            slot: Arc::new(Slot { id, object }),
        }
    }

    /// Acquire another owning reference to the same object.
    pub fn take(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }

    /// Give this owning reference back. The object is released when the last
    /// reference is given.
    pub fn give(self) {
        drop(self);
    }

    /// Number of owning references currently alive.
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.slot)
    }

    pub fn id(&self) -> HandleId {
        self.slot.id
    }

    /// True when both handles reference the same native object.
    pub fn same_object(&self, other: &Handle<T>) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    /// Non-owning reference that does not extend the object's lifetime.
    pub fn downgrade(&self) -> WeakHandle<T> {
        WeakHandle {
            id: self.slot.id,
            slot: Arc::downgrade(&self.slot),
        }
    }
}

impl<T: NativeResource> Clone for Handle<T> {
    fn clone(&self) -> Self {
        self.take()
    }
}

impl<T: NativeResource> Deref for Handle<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.slot.object
    }
}

impl<T: NativeResource> AsRef<T> for Handle<T> {
    fn as_ref(&self) -> &T {
        &self.slot.object
    }
}

impl<T: NativeResource + fmt::Debug> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("id", &self.slot.id)
            .field("refs", &self.ref_count())
            .field("object", &self.slot.object)
            .finish()
    }
}

/// Navigational back-reference; never keeps the object alive.
pub struct WeakHandle<T: NativeResource> {
    id: HandleId,
    slot: Weak<Slot<T>>,
}

impl<T: NativeResource> WeakHandle<T> {
    /// Borrow-for-a-moment access to the referenced object.
    ///
    /// Fails with [`WalletError::ReleasedHandle`] once the object has been
    /// released.
    pub fn upgrade(&self) -> WalletResult<Handle<T>> {
        self.slot
            .upgrade()
            .map(|slot| Handle { slot })
            .ok_or_else(|| WalletError::ReleasedHandle(format!("{} {}", T::KIND, self.id)))
    }

    pub fn is_released(&self) -> bool {
        self.slot.strong_count() == 0
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    /// A back-reference that never pointed at a live object.
    #[cfg(test)]
    pub(crate) fn detached() -> Self {
        Self {
            id: HandleId(0),
            slot: Weak::new(),
        }
    }
}

impl<T: NativeResource> Clone for WeakHandle<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            slot: Weak::clone(&self.slot),
        }
    }
}

impl<T: NativeResource> fmt::Debug for WeakHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakHandle")
            .field("kind", &T::KIND)
            .field("id", &self.id)
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug)]
    struct Probe {
        releases: Arc<AtomicUsize>,
    }

    impl NativeResource for Probe {
        const KIND: &'static str = "probe";

        fn release(&mut self) {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn probe() -> (Handle<Probe>, Arc<AtomicUsize>) {
        let releases = Arc::new(AtomicUsize::new(0));
        let handle = Handle::new(Probe {
            releases: Arc::clone(&releases),
        });
        (handle, releases)
    }

    #[test]
    fn ref_count_tracks_takes_and_gives() {
        let (owner, releases) = probe();
        let mut extra = Vec::new();
        for _ in 0..5 {
            extra.push(owner.take());
        }
        assert_eq!(owner.ref_count(), 6);

        for _ in 0..3 {
            extra.pop().unwrap().give();
        }
        assert_eq!(owner.ref_count(), 3);
        assert_eq!(releases.load(Ordering::SeqCst), 0);

        for handle in extra.drain(..) {
            handle.give();
        }
        assert_eq!(owner.ref_count(), 1);
        assert_eq!(releases.load(Ordering::SeqCst), 0);

        owner.give();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn release_happens_once_whichever_owner_goes_last() {
        let (owner, releases) = probe();
        let survivor = owner.take();
        owner.give();
        assert_eq!(releases.load(Ordering::SeqCst), 0);
        assert_eq!(survivor.ref_count(), 1);
        drop(survivor);
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn weak_handle_reports_released_object() {
        let (owner, releases) = probe();
        let weak = owner.downgrade();
        assert_eq!(weak.id(), owner.id());
        {
            let upgraded = weak.upgrade().expect("object alive");
            assert!(upgraded.same_object(&owner));
            assert_eq!(owner.ref_count(), 2);
        }
        assert_eq!(owner.ref_count(), 1);

        owner.give();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
        assert!(weak.is_released());
        let err = weak.upgrade().unwrap_err();
        assert!(matches!(err, WalletError::ReleasedHandle(msg) if msg.starts_with("probe #")));
    }

    #[test]
    fn handles_across_threads_release_once() {
        let (owner, releases) = probe();
        let threads: Vec<_> = (0..8)
            .map(|_| {
                let local = owner.take();
                std::thread::spawn(move || {
                    let again = local.take();
                    again.give();
                    local.give();
                })
            })
            .collect();
        for thread in threads {
            thread.join().unwrap();
        }
        assert_eq!(owner.ref_count(), 1);
        owner.give();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn ids_are_unique() {
        let (a, _) = probe();
        let (b, _) = probe();
        assert_ne!(a.id(), b.id());
        assert!(!a.same_object(&b));
        assert_eq!(a.take().id(), a.id());
    }
}
