use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

/// Lifetime of a mounted view. Background tasks take a ticket when they
/// start and check it before touching view state; once the view is
/// unmounted (or mounted again for another item) old tickets go stale and
/// their results are dropped.
#[derive(Debug, Clone, Default)]
pub struct ViewScope {
    epoch: Arc<AtomicU64>,
}

#[derive(Debug, Clone)]
pub struct ScopeTicket {
    epoch: u64,
    current: Arc<AtomicU64>,
}

impl ViewScope {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ticket(&self) -> ScopeTicket {
        ScopeTicket {
            epoch: self.epoch.load(Ordering::Acquire),
            current: self.epoch.clone(),
        }
    }

    /// Starts a new lifetime and returns its first ticket.
    pub fn remount(&self) -> ScopeTicket {
        self.unmount();
        self.ticket()
    }

    pub fn unmount(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }
}

impl ScopeTicket {
    pub fn is_live(&self) -> bool {
        self.current.load(Ordering::Acquire) == self.epoch
    }
}
