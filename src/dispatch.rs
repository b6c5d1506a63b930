//! Priority-ordered callback registries.
//!
//! Each direction (inbound, outbound) has one registry, keyed by uppercased
//! command name plus the sentinels [`ALL_EVENTS`] and [`RAW_EVENTS`].
//! Dispatch is synchronous, in the calling task, in ascending priority
//! order with ties broken by registration order.
//!
//! A dispatch pass snapshots the callback set before invoking anything, so
//! a callback may remove itself (or any other entry) mid-pass: the pass
//! completes with the set it started with, and the removed entry never
//! fires in a later pass.
//!
//! Registries belong to the client, not to a socket: they survive
//! reconnects.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::error;

use crate::event::Event;

/// Sentinel event name matched by every structured event, invoked after the
/// name-specific bucket.
pub const ALL_EVENTS: &str = "ALL";

/// Sentinel event name invoked once per wire line, before structured
/// dispatch. Not folded into [`ALL_EVENTS`].
pub const RAW_EVENTS: &str = "RAW";

/// Which registry a callback attaches to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Inbound events (lines received from the server).
    In,
    /// Outbound events (lines sent to the server).
    Out,
    /// Both registries.
    Both,
}

/// Callback invoked for each matching event.
pub type Handler = Arc<dyn Fn(&Event) + Send + Sync>;

#[derive(Clone)]
struct Entry {
    priority: i32,
    id: u64,
    handler: Handler,
}

/// One direction's registry.
pub(crate) struct Dispatcher {
    strict: bool,
    next_id: AtomicU64,
    buckets: Mutex<HashMap<String, Vec<Entry>>>,
}

impl Dispatcher {
    pub(crate) fn new(strict: bool) -> Self {
        Self {
            strict,
            next_id: AtomicU64::new(1),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Attach a handler. Returns the id used for removal.
    pub(crate) fn register(&self, name: &str, handler: Handler, priority: i32) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let entry = Entry {
            priority,
            id,
            handler,
        };

        let mut buckets = self.buckets.lock().unwrap();
        let bucket = buckets.entry(name.to_ascii_uppercase()).or_default();
        // Keep the bucket ordered by (priority, id); ids are monotonic, so
        // the insertion point is the partition on priority alone.
        let pos = bucket.partition_point(|e| e.priority <= priority);
        bucket.insert(pos, entry);
        id
    }

    /// Detach a handler by event name and id. Safe to call from within a
    /// callback running under `dispatch`.
    pub(crate) fn remove(&self, name: &str, id: u64) {
        let mut buckets = self.buckets.lock().unwrap();
        if let Some(bucket) = buckets.get_mut(&name.to_ascii_uppercase()) {
            bucket.retain(|e| e.id != id);
            if bucket.is_empty() {
                buckets.remove(&name.to_ascii_uppercase());
            }
        }
    }

    /// Invoke handlers for a structured event: the named bucket, then the
    /// `ALL` bucket.
    pub(crate) fn dispatch(&self, name: &str, event: &Event) {
        let upper = name.to_ascii_uppercase();
        let (named, all) = {
            let buckets = self.buckets.lock().unwrap();
            let named = buckets.get(&upper).cloned().unwrap_or_default();
            let all = if upper == ALL_EVENTS {
                Vec::new()
            } else {
                buckets.get(ALL_EVENTS).cloned().unwrap_or_default()
            };
            (named, all)
        };

        self.invoke(&named, event);
        self.invoke(&all, event);
    }

    /// Invoke the `RAW` bucket only.
    pub(crate) fn dispatch_raw(&self, event: &Event) {
        let raw = {
            let buckets = self.buckets.lock().unwrap();
            buckets.get(RAW_EVENTS).cloned().unwrap_or_default()
        };
        self.invoke(&raw, event);
    }

    fn invoke(&self, entries: &[Entry], event: &Event) {
        for entry in entries {
            let result = panic::catch_unwind(AssertUnwindSafe(|| (entry.handler)(event)));
            if let Err(payload) = result {
                if self.strict {
                    panic::resume_unwind(payload);
                }
                error!(
                    callback_id = entry.id,
                    command = event.command(),
                    "callback panicked: {}",
                    panic_message(&payload)
                );
            }
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "non-string panic payload"
    }
}
