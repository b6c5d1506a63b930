//! IRCv3 capability negotiation state.
//!
//! [`CapabilityTracker`] records which capabilities the client wants, which
//! the server has advertised, and the server's verdict on each requested
//! one. It is written from the reader task during negotiation and read from
//! user code at any time, so all state sits behind a mutex.
//!
//! Negotiation for a connection is complete once every requested capability
//! has been acknowledged or rejected (the outstanding counter reaches zero).
//!
//! # Reference
//! - IRCv3 Capability Negotiation: <https://ircv3.net/specs/extensions/capability-negotiation>

use std::collections::HashSet;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct CapsInner {
    wanted: Vec<String>,
    advertised: HashSet<String>,
    acknowledged: HashSet<String>,
    rejected: HashSet<String>,
    outstanding: usize,
}

/// Thread-safe tracker for client capability negotiation.
#[derive(Debug, Default)]
pub struct CapabilityTracker {
    inner: Mutex<CapsInner>,
}

impl CapabilityTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add capability names to the wanted set. Idempotent; order of first
    /// insertion is preserved and used for `CAP REQ`.
    pub fn add_wanted_caps(&self, names: &[&str]) {
        let mut inner = self.inner.lock().unwrap();
        for name in names {
            if !inner.wanted.iter().any(|w| w == name) {
                inner.wanted.push((*name).to_string());
            }
        }
    }

    /// Record a capability the server advertised in `CAP LS`/`LIST`.
    pub fn advertise(&self, name: &str) {
        self.inner.lock().unwrap().advertised.insert(name.to_string());
    }

    /// The wanted ∩ advertised intersection, in wanted order, minus anything
    /// already resolved. This is the exact set to put in `CAP REQ`.
    pub fn to_request(&self) -> Vec<String> {
        let inner = self.inner.lock().unwrap();
        inner
            .wanted
            .iter()
            .filter(|w| {
                inner.advertised.contains(*w)
                    && !inner.acknowledged.contains(*w)
                    && !inner.rejected.contains(*w)
            })
            .cloned()
            .collect()
    }

    /// Note that `count` capability requests are now in flight.
    pub fn begin_request(&self, count: usize) {
        self.inner.lock().unwrap().outstanding += count;
    }

    /// Mark a capability acknowledged by the server (`CAP ACK`).
    pub fn acknowledge(&self, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.acknowledged.insert(name.to_string());
        inner.outstanding = inner.outstanding.saturating_sub(1);
    }

    /// Mark a capability rejected by the server (`CAP NAK`). Not a failure:
    /// negotiation proceeds without it.
    pub fn reject(&self, name: &str) {
        let mut inner = self.inner.lock().unwrap();
        inner.rejected.insert(name.to_string());
        inner.outstanding = inner.outstanding.saturating_sub(1);
    }

    /// Remove a capability from the acknowledged set (`CAP DEL`, or an ACK
    /// of a removal). Does not touch the outstanding counter.
    pub fn disable(&self, name: &str) {
        self.inner.lock().unwrap().acknowledged.remove(name);
    }

    /// Whether the server acknowledged the named capability.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.inner.lock().unwrap().acknowledged.contains(name)
    }

    /// Whether every requested capability has been acknowledged or rejected.
    pub fn is_complete(&self) -> bool {
        self.inner.lock().unwrap().outstanding == 0
    }

    /// Names acknowledged so far.
    pub fn acknowledged(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .inner
            .lock()
            .unwrap()
            .acknowledged
            .iter()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Names rejected so far.
    pub fn rejected(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.lock().unwrap().rejected.iter().cloned().collect();
        names.sort();
        names
    }

    /// Reset per-connection state, keeping the wanted set. Called at the
    /// start of each connection attempt; the wanted list outlives sockets.
    pub fn reset_session(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.advertised.clear();
        inner.acknowledged.clear();
        inner.rejected.clear();
        inner.outstanding = 0;
    }
}
