//! Cached unlock method state for the active user
//!
//! The cache recomputes five flags from the trust subsystem whenever one of
//! its events arrives and tells listeners when the result actually changed.
//! There is one cache per session; it is constructed explicitly and shared
//! through an `Rc`.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::shell::TrustSource;
use crate::types::UserId;

/// Snapshot of the cached flags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UnlockMethodState {
    /// A secure credential is configured
    pub secure: bool,
    /// The challenge may be skipped right now
    pub can_skip_bouncer: bool,
    /// A trust agent manages the user
    pub trust_managed: bool,
    /// The user is currently trusted
    pub trusted: bool,
    /// Face unlock is running under a trust agent
    pub face_unlock_running: bool,
}

/// Events from the trust subsystem that may change the cached state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrustEvent {
    UserSwitchComplete { user: UserId },
    TrustChanged { user: UserId },
    TrustManagedChanged { user: UserId },
    StartedWakingUp,
    FingerprintAuthenticated { user: UserId },
    FaceUnlockStateChanged { running: bool, user: UserId },
    StrongAuthStateChanged { user: UserId },
}

/// Handle returned by [`UnlockMethodCache::add_listener`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Rc<dyn Fn(&UnlockMethodState)>;

/// Unlock method cache for the active user
pub struct UnlockMethodCache {
    trust: Rc<dyn TrustSource>,
    state: Cell<UnlockMethodState>,
    listeners: RefCell<Vec<(ListenerId, Listener)>>,
    next_listener: Cell<u64>,
}

impl fmt::Debug for UnlockMethodCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnlockMethodCache")
            .field("state", &self.state.get())
            .field("listeners", &self.listeners.borrow().len())
            .finish()
    }
}

impl UnlockMethodCache {
    /// Create the cache and load the initial state
    pub fn new(trust: Rc<dyn TrustSource>) -> Self {
        let cache = Self {
            trust,
            state: Cell::new(UnlockMethodState::default()),
            listeners: RefCell::new(Vec::new()),
            next_listener: Cell::new(0),
        };
        cache.refresh(true);
        cache
    }

    /// Recompute the flags for the current user.
    ///
    /// Listeners are notified when any flag changed, or always when
    /// `force_notify` is set. Returns whether listeners were notified.
    pub fn refresh(&self, force_notify: bool) -> bool {
        let user = self.trust.current_user();
        let secure = self.trust.is_secure(user);
        let trust_managed = self.trust.user_trust_is_managed(user);
        let next = UnlockMethodState {
            secure,
            can_skip_bouncer: !secure || self.trust.user_can_skip_bouncer(user),
            trust_managed,
            trusted: self.trust.user_has_trust(user),
            face_unlock_running: self.trust.is_face_unlock_running(user) && trust_managed,
        };

        let changed = next != self.state.get();
        if !changed && !force_notify {
            trace!("Unlock method state unchanged for user {:?}", user);
            return false;
        }

        debug!(
            "Unlock method state for user {:?}: {:?} (forced: {})",
            user, next, force_notify
        );
        self.state.set(next);
        self.notify_listeners();
        true
    }

    /// Feed a trust subsystem event
    pub fn handle_event(&self, event: TrustEvent) {
        trace!("Trust event {:?}", event);
        if let TrustEvent::FingerprintAuthenticated { .. } = event {
            if !self.trust.is_unlocking_with_fingerprint_allowed() {
                return;
            }
        }
        self.refresh(false);
    }

    /// Register a listener; listeners run in registration order
    pub fn add_listener(&self, listener: impl Fn(&UnlockMethodState) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener.get());
        self.next_listener.set(id.0 + 1);
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Remove a listener; returns false if it was not registered
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        before != listeners.len()
    }

    fn notify_listeners(&self) {
        // Listeners may add or remove listeners while being notified
        let listeners: Vec<Listener> = self
            .listeners
            .borrow()
            .iter()
            .map(|(_, l)| Rc::clone(l))
            .collect();
        let state = self.state.get();
        for listener in listeners {
            listener(&state);
        }
    }

    pub fn state(&self) -> UnlockMethodState {
        self.state.get()
    }

    pub fn is_method_secure(&self) -> bool {
        self.state.get().secure
    }

    pub fn can_skip_bouncer(&self) -> bool {
        self.state.get().can_skip_bouncer
    }

    pub fn is_trusted(&self) -> bool {
        self.state.get().trusted
    }

    pub fn is_trust_managed(&self) -> bool {
        self.state.get().trust_managed
    }

    pub fn is_face_unlock_running(&self) -> bool {
        self.state.get().face_unlock_running
    }
}
