//! [`Watchdog`] – reply deadline monitor.
//!
//! The authority registers every arming check it expects replies from and
//! records a heartbeat for each reply received. A component whose last
//! heartbeat is older than its deadline is *timed out*, and the authority
//! treats it as an implicit check failure.
//!
//! Time is passed in explicitly so callers control the clock.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::{Duration, Instant};

// ────────────────────────────────────────────────────────────────────────────
// Public types
// ────────────────────────────────────────────────────────────────────────────

/// Health state reported for a single component.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentHealth {
    /// A heartbeat arrived within the deadline.
    Healthy,
    /// No heartbeat yet since registration.
    Pending,
    /// The last heartbeat is older than the deadline, or the component is
    /// unknown.
    TimedOut,
}

struct ComponentEntry {
    last_heartbeat: Option<Instant>,
    registered_at: Instant,
    timeout: Duration,
}

// ────────────────────────────────────────────────────────────────────────────
// Watchdog
// ────────────────────────────────────────────────────────────────────────────

/// Tracks heartbeats from registered components and detects silent ones.
///
/// # Example
///
/// ```
/// use std::time::{Duration, Instant};
/// use skymode_kernel::watchdog::{ComponentHealth, Watchdog};
///
/// let start = Instant::now();
/// let mut wd = Watchdog::new();
/// wd.register(1u8, Duration::from_secs(1), start);
/// assert_eq!(wd.health(&1, start), ComponentHealth::Pending);
///
/// wd.heartbeat(&1, start);
/// assert_eq!(wd.health(&1, start), ComponentHealth::Healthy);
/// assert_eq!(wd.health(&1, start + Duration::from_secs(2)), ComponentHealth::TimedOut);
/// ```
pub struct Watchdog<K> {
    components: HashMap<K, ComponentEntry>,
}

impl<K> Default for Watchdog<K> {
    fn default() -> Self {
        Self {
            components: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone> Watchdog<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `component` with a heartbeat `timeout`.
    ///
    /// The component is [`ComponentHealth::Pending`] until its first
    /// heartbeat, and times out if none arrives within `timeout` of `now`.
    /// Re-registering resets it.
    pub fn register(&mut self, component: K, timeout: Duration, now: Instant) {
        self.components.insert(
            component,
            ComponentEntry {
                last_heartbeat: None,
                registered_at: now,
                timeout,
            },
        );
    }

    pub fn unregister(&mut self, component: &K) {
        self.components.remove(component);
    }

    /// Record a heartbeat. No-ops for unregistered components.
    pub fn heartbeat(&mut self, component: &K, now: Instant) {
        if let Some(entry) = self.components.get_mut(component) {
            entry.last_heartbeat = Some(now);
        }
    }

    pub fn health(&self, component: &K, now: Instant) -> ComponentHealth {
        match self.components.get(component) {
            Some(entry) => {
                let since = entry.last_heartbeat.unwrap_or(entry.registered_at);
                if now.saturating_duration_since(since) > entry.timeout {
                    ComponentHealth::TimedOut
                } else if entry.last_heartbeat.is_some() {
                    ComponentHealth::Healthy
                } else {
                    ComponentHealth::Pending
                }
            }
            None => ComponentHealth::TimedOut,
        }
    }

    /// Every component currently timed out. Order is unspecified.
    pub fn check_all(&self, now: Instant) -> Vec<K> {
        self.components
            .keys()
            .filter(|k| self.health(k, now) == ComponentHealth::TimedOut)
            .cloned()
            .collect()
    }
}
