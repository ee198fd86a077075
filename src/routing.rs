// src/routing.rs
//! Forwarding table and route selection.
//!
//! The table is rebuilt from scratch out of the peer tables on every change:
//! - one entry per destination known on any port
//! - lowest total latency (advertised + link) wins
//! - equal latencies go to the lowest port number

use std::collections::BTreeMap;

use crate::peer::PeerTable;
use crate::types::{HostId, Latency, Port};

/// The router's chosen route to one destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardingEntry {
    pub destination: HostId,
    /// Port the route was learned on, i.e. where packets leave.
    pub port: Port,
    /// Total latency, capped at infinity.
    pub latency: Latency,
}

impl ForwardingEntry {
    pub fn is_reachable(&self, infinity: Latency) -> bool {
        self.latency < infinity
    }

    /// Return a short human-ish description string for debugging/logging.
    pub fn summary(&self) -> String {
        format!(
            "dst={} port={} latency={}",
            self.destination, self.port, self.latency
        )
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ForwardingTable {
    entries: BTreeMap<HostId, ForwardingEntry>,
}

impl ForwardingTable {
    pub fn new() -> Self {
        ForwardingTable {
            entries: BTreeMap::new(),
        }
    }

    /// Build the table from every peer table plus per-port link latencies.
    ///
    /// Ports without a known link latency are skipped.
    pub fn compute(
        peer_tables: &BTreeMap<Port, PeerTable>,
        link_latency: &BTreeMap<Port, Latency>,
        infinity: Latency,
    ) -> Self {
        let mut table = ForwardingTable::new();

        // BTreeMap iterates ports in ascending order, so keeping only
        // strict improvements leaves ties with the lowest port.
        for (&port, peers) in peer_tables {
            let Some(&link) = link_latency.get(&port) else {
                continue;
            };
            for record in peers.all() {
                let latency = record.latency.saturating_add(link).min(infinity);
                match table.entries.get(&record.destination) {
                    Some(best) if best.latency <= latency => {}
                    _ => {
                        table.entries.insert(
                            record.destination.clone(),
                            ForwardingEntry {
                                destination: record.destination.clone(),
                                port,
                                latency,
                            },
                        );
                    }
                }
            }
        }

        table
    }

    pub fn get(&self, destination: &HostId) -> Option<&ForwardingEntry> {
        self.entries.get(destination)
    }

    pub fn all(&self) -> impl Iterator<Item = &ForwardingEntry> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
