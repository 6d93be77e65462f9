//! Single-flight discipline for completion requests.
//!
//! A [`SendGate`] holds at most one sender at a time. Clients share the
//! process-wide gate from [`SendGate::shared`] unless they are built with a
//! gate of their own, so at most one completion is in flight per process.

use std::sync::{Arc, LazyLock, Mutex, MutexGuard};

use uuid::Uuid;

use crate::ChatError;

/// Identity of a client as seen by a [`SendGate`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SenderId(Uuid);

impl SenderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SenderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SenderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Where a client is in its request lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// No request of this client is open
    Idle,
    /// This client owns the gate and a request is open
    Sending,
}

static PROCESS_GATE: LazyLock<Arc<SendGate>> = LazyLock::new(|| Arc::new(SendGate::new()));

/// Shared single-permit marker of the sender currently in flight
#[derive(Debug, Default)]
pub struct SendGate {
    current: Mutex<Option<SenderId>>,
}

impl SendGate {
    /// A fresh gate, independent of the process-wide one
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide gate every client uses by default
    pub fn shared() -> Arc<SendGate> {
        Arc::clone(&PROCESS_GATE)
    }

    /// Sender currently holding the gate
    pub fn current(&self) -> Option<SenderId> {
        *self.lock()
    }

    pub fn is_idle(&self) -> bool {
        self.current().is_none()
    }

    /// Claim the gate for `sender`, failing immediately when it is taken.
    ///
    /// The gate is released when the returned permit is dropped.
    pub fn acquire(self: &Arc<Self>, sender: SenderId) -> Result<SendPermit, ChatError> {
        let mut current = self.lock();
        if current.is_some() {
            return Err(ChatError::RequestInProgress);
        }
        *current = Some(sender);

        Ok(SendPermit {
            gate: Arc::clone(self),
            sender,
        })
    }

    fn lock(&self) -> MutexGuard<'_, Option<SenderId>> {
        // The guarded value is a plain Option, a poisoned lock still holds a valid one
        self.current
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Proof of owning a [`SendGate`]; releases it on drop
#[derive(Debug)]
pub struct SendPermit {
    gate: Arc<SendGate>,
    sender: SenderId,
}

impl SendPermit {
    pub fn sender(&self) -> SenderId {
        self.sender
    }
}

impl Drop for SendPermit {
    fn drop(&mut self) {
        *self.gate.lock() = None;
    }
}
