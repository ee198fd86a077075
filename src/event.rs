// src/event.rs
//! High-level events emitted by a router.
//!
//! This allows drivers to react to link / route changes without
//! constantly polling and diffing the forwarding table.

use crate::routing::{ForwardingEntry, ForwardingTable};
use crate::types::{HostId, Latency, Port};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    LinkUp { port: Port, latency: Latency },

    LinkDown { port: Port },

    /// A destination was added, or its port or latency changed.
    BestRouteChanged {
        destination: HostId,
        entry: ForwardingEntry,
    },

    /// A destination is no longer in the forwarding table.
    RouteLost { destination: HostId },
}

/// Events describing how `new` differs from `old`.
pub fn diff_tables(old: &ForwardingTable, new: &ForwardingTable) -> Vec<Event> {
    let mut events = Vec::new();

    for entry in new.all() {
        if old.get(&entry.destination) != Some(entry) {
            events.push(Event::BestRouteChanged {
                destination: entry.destination.clone(),
                entry: entry.clone(),
            });
        }
    }

    for entry in old.all() {
        if new.get(&entry.destination).is_none() {
            events.push(Event::RouteLost {
                destination: entry.destination.clone(),
            });
        }
    }

    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::{PeerRouteRecord, PeerTable};
    use std::collections::BTreeMap;

    fn table(routes: &[(&str, Latency)]) -> ForwardingTable {
        let mut p = PeerTable::new();
        for &(dst, lat) in routes {
            p.upsert(PeerRouteRecord::learned(HostId::from(dst), lat, 0, 15));
        }
        let peers = BTreeMap::from([(1, p)]);
        ForwardingTable::compute(&peers, &BTreeMap::from([(1, 1)]), 16)
    }

    #[test]
    fn identical_tables_produce_no_events() {
        let t = table(&[("x", 1)]);
        assert!(diff_tables(&t, &t.clone()).is_empty());
    }

    #[test]
    fn reports_added_changed_and_lost() {
        let old = table(&[("x", 1), ("y", 1)]);
        let new = table(&[("x", 4), ("z", 1)]);

        let events = diff_tables(&old, &new);
        assert_eq!(events.len(), 3);
        assert!(events.contains(&Event::RouteLost {
            destination: HostId::from("y")
        }));
        assert!(events.iter().any(|e| matches!(
            e,
            Event::BestRouteChanged { destination, entry }
                if destination.as_str() == "x" && entry.latency == 5
        )));
        assert!(events.iter().any(|e| matches!(
            e,
            Event::BestRouteChanged { destination, .. } if destination.as_str() == "z"
        )));
    }
}
