// src/peer.rs
//! Routes learned from directly-attached neighbors.
//!
//! This module handles:
//! - One record per (port, destination) as last advertised by that neighbor
//! - Expiry of learned routes (static routes never expire)
//! - Poisoning: rewriting a route as unreachable instead of dropping it
//!
//! It sits below route selection: the forwarding table is always derived
//! from the peer tables, never edited directly.

use std::collections::BTreeMap;

use crate::types::{HostId, Latency, Time};

/// When a peer route stops being trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Directly-attached host, installed by a static route.
    Permanent,
    At(Time),
}

impl Expiry {
    /// A route is stale strictly after its expiry time.
    pub fn is_stale(&self, now: Time) -> bool {
        match self {
            Expiry::Permanent => false,
            Expiry::At(t) => now > *t,
        }
    }
}

/// A single route as advertised by the neighbor on one port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRouteRecord {
    pub destination: HostId,
    /// Latency from the neighbor to the destination (link latency excluded).
    pub latency: Latency,
    pub expiry: Expiry,
}

impl PeerRouteRecord {
    /// Zero-latency, never-expiring route to a host on our own interface.
    pub fn permanent(destination: HostId) -> Self {
        PeerRouteRecord {
            destination,
            latency: 0,
            expiry: Expiry::Permanent,
        }
    }

    /// Route heard from a neighbor at `now`, valid for `ttl` time units.
    pub fn learned(destination: HostId, latency: Latency, now: Time, ttl: u64) -> Self {
        PeerRouteRecord {
            destination,
            latency,
            expiry: Expiry::At(now + ttl),
        }
    }

    pub fn is_stale(&self, now: Time) -> bool {
        self.expiry.is_stale(now)
    }

    pub fn is_permanent(&self) -> bool {
        self.expiry == Expiry::Permanent
    }

    /// Mark unreachable and restart the expiry clock.
    pub fn poison(&mut self, infinity: Latency, now: Time, ttl: u64) {
        self.latency = infinity;
        self.expiry = Expiry::At(now + ttl);
    }
}

/// What happened to a peer table during an expiry pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExpiryOutcome {
    pub poisoned: Vec<HostId>,
    pub removed: Vec<HostId>,
}

impl ExpiryOutcome {
    pub fn is_empty(&self) -> bool {
        self.poisoned.is_empty() && self.removed.is_empty()
    }
}

/// All routes learned through a single port, keyed by destination.
#[derive(Debug, Default, Clone)]
pub struct PeerTable {
    routes: BTreeMap<HostId, PeerRouteRecord>,
}

impl PeerTable {
    pub fn new() -> Self {
        PeerTable {
            routes: BTreeMap::new(),
        }
    }

    pub fn get(&self, destination: &HostId) -> Option<&PeerRouteRecord> {
        self.routes.get(destination)
    }

    pub fn all(&self) -> impl Iterator<Item = &PeerRouteRecord> {
        self.routes.values()
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Insert or overwrite the record for its destination (last write wins).
    pub fn upsert(&mut self, record: PeerRouteRecord) {
        self.routes.insert(record.destination.clone(), record);
    }

    /// Poison every record, static ones included. Used when the link dies.
    pub fn poison_all(&mut self, infinity: Latency, now: Time, ttl: u64) -> usize {
        for r in self.routes.values_mut() {
            r.poison(infinity, now, ttl);
        }
        self.routes.len()
    }

    /// Drop every stale record.
    pub fn prune_stale(&mut self, now: Time) -> Vec<HostId> {
        let mut removed = Vec::new();
        self.routes.retain(|dst, r| {
            if r.is_stale(now) {
                removed.push(dst.clone());
                false
            } else {
                true
            }
        });
        removed
    }

    /// Poison stale records that are still reachable; drop stale records
    /// that were already poisoned, since their unreachability has had a full
    /// TTL to propagate.
    pub fn poison_stale(&mut self, now: Time, infinity: Latency, ttl: u64) -> ExpiryOutcome {
        let mut outcome = ExpiryOutcome::default();
        self.routes.retain(|dst, r| {
            if !r.is_stale(now) {
                return true;
            }
            if r.latency >= infinity {
                outcome.removed.push(dst.clone());
                false
            } else {
                r.poison(infinity, now, ttl);
                outcome.poisoned.push(dst.clone());
                true
            }
        });
        outcome
    }
}
