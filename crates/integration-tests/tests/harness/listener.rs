//! Recording lifecycle and auth listeners

use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use quill_llm::{AuthListener, LifecycleListener, LlmError, Usage};

/// One lifecycle notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lifecycle {
    Start(u64),
    Done(u64, Option<Usage>),
    Error(u64, String),
    Finally(u64),
}

impl Lifecycle {
    pub const fn id(&self) -> u64 {
        match self {
            Self::Start(id) | Self::Done(id, _) | Self::Error(id, _) | Self::Finally(id) => *id,
        }
    }
}

/// Records every lifecycle notification in arrival order
#[derive(Default)]
pub struct LifecycleRecorder {
    events: Mutex<Vec<Lifecycle>>,
}

impl LifecycleRecorder {
    pub fn events(&self) -> Vec<Lifecycle> {
        self.events.lock().unwrap().clone()
    }

    /// Notifications for one request id
    pub fn for_id(&self, id: u64) -> Vec<Lifecycle> {
        self.events().into_iter().filter(|e| e.id() == id).collect()
    }

    /// Distinct request ids in order of first appearance
    pub fn ids(&self) -> Vec<u64> {
        let mut ids = Vec::new();
        for event in self.events() {
            if !ids.contains(&event.id()) {
                ids.push(event.id());
            }
        }
        ids
    }

    fn push(&self, event: Lifecycle) {
        self.events.lock().unwrap().push(event);
    }
}

impl LifecycleListener for LifecycleRecorder {
    fn on_start(&self, id: u64) {
        self.push(Lifecycle::Start(id));
    }

    fn on_done(&self, id: u64, usage: Option<&Usage>) {
        self.push(Lifecycle::Done(id, usage.copied()));
    }

    fn on_error(&self, id: u64, error: &LlmError) {
        self.push(Lifecycle::Error(id, error.to_string()));
    }

    fn on_finally(&self, id: u64) {
        self.push(Lifecycle::Finally(id));
    }
}

/// Counts auth notifications
#[derive(Default)]
pub struct AuthRecorder {
    pub refreshed: AtomicU32,
    pub sign_in_required: AtomicU32,
}

impl AuthRecorder {
    pub fn refreshed(&self) -> u32 {
        self.refreshed.load(Ordering::SeqCst)
    }

    pub fn sign_in_required(&self) -> u32 {
        self.sign_in_required.load(Ordering::SeqCst)
    }
}

impl AuthListener for AuthRecorder {
    fn credentials_refreshed(&self, _identity: &str) {
        self.refreshed.fetch_add(1, Ordering::SeqCst);
    }

    fn sign_in_required(&self, _identity: &str) {
        self.sign_in_required.fetch_add(1, Ordering::SeqCst);
    }
}

/// Assert the per-id ordering every dispatch must honour
///
/// `Start` first, `Finally` last and exactly once, at most one of `Done`/`Error` between.
pub fn assert_well_ordered(events: &[Lifecycle]) {
    assert!(matches!(events.first(), Some(Lifecycle::Start(_))), "{events:?}");
    assert!(matches!(events.last(), Some(Lifecycle::Finally(_))), "{events:?}");
    let finals = events.iter().filter(|e| matches!(e, Lifecycle::Finally(_))).count();
    assert_eq!(finals, 1, "{events:?}");
    let terminals = events
        .iter()
        .filter(|e| matches!(e, Lifecycle::Done(..) | Lifecycle::Error(..)))
        .count();
    assert!(terminals <= 1, "{events:?}");
}
