//! Keyguard state published to shell consumers (quick settings, tiles)

use std::fmt;
use std::rc::Rc;

use tracing::debug;

use crate::shell::TrustSource;
use crate::types::UserId;

/// Handle returned by [`KeyguardMonitor::add_callback`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

/// Tracks whether the keyguard is showing and secure, and whether the
/// current user may skip the bouncer.
///
/// Trust and user events are only followed while at least one callback is
/// registered.
pub struct KeyguardMonitor {
    trust: Rc<dyn TrustSource>,
    callbacks: Vec<(CallbackId, Box<dyn FnMut()>)>,
    next_callback: u64,
    current_user: UserId,
    showing: bool,
    secure: bool,
    can_skip_bouncer: bool,
    listening: bool,
}

impl fmt::Debug for KeyguardMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyguardMonitor")
            .field("callbacks", &self.callbacks.len())
            .field("current_user", &self.current_user)
            .field("showing", &self.showing)
            .field("secure", &self.secure)
            .field("can_skip_bouncer", &self.can_skip_bouncer)
            .field("listening", &self.listening)
            .finish()
    }
}

impl KeyguardMonitor {
    pub fn new(trust: Rc<dyn TrustSource>) -> Self {
        Self {
            trust,
            callbacks: Vec::new(),
            next_callback: 0,
            current_user: UserId::OWNER,
            showing: false,
            secure: false,
            can_skip_bouncer: false,
            listening: false,
        }
    }

    /// Register a change callback; the first one starts listening
    pub fn add_callback(&mut self, callback: impl FnMut() + 'static) -> CallbackId {
        let id = CallbackId(self.next_callback);
        self.next_callback += 1;
        self.callbacks.push((id, Box::new(callback)));
        if !self.listening {
            self.listening = true;
            self.current_user = self.trust.current_user();
            self.update_can_skip_bouncer();
            debug!("Keyguard monitor listening for user {:?}", self.current_user);
        }
        id
    }

    /// Remove a callback; removing the last one stops listening
    pub fn remove_callback(&mut self, id: CallbackId) -> bool {
        let before = self.callbacks.len();
        self.callbacks.retain(|(cid, _)| *cid != id);
        let removed = before != self.callbacks.len();
        if removed && self.callbacks.is_empty() && self.listening {
            self.listening = false;
            debug!("Keyguard monitor stopped listening");
        }
        removed
    }

    /// Publish a new showing/secure pair; callbacks run only on change
    pub fn notify_keyguard_state(&mut self, showing: bool, secure: bool) {
        if self.showing == showing && self.secure == secure {
            return;
        }
        self.showing = showing;
        self.secure = secure;
        self.notify_changed();
    }

    pub fn on_trust_changed(&mut self, _user: UserId) {
        if !self.listening {
            return;
        }
        self.update_can_skip_bouncer();
        self.notify_changed();
    }

    pub fn on_user_switched(&mut self, user: UserId) {
        if !self.listening {
            return;
        }
        self.current_user = user;
        self.update_can_skip_bouncer();
    }

    fn update_can_skip_bouncer(&mut self) {
        self.can_skip_bouncer = self.trust.user_can_skip_bouncer(self.current_user);
    }

    fn notify_changed(&mut self) {
        for (_, callback) in self.callbacks.iter_mut() {
            callback();
        }
    }

    pub fn is_showing(&self) -> bool {
        self.showing
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn can_skip_bouncer(&self) -> bool {
        self.can_skip_bouncer
    }

    pub fn is_listening(&self) -> bool {
        self.listening
    }

    pub fn current_user(&self) -> UserId {
        self.current_user
    }
}
