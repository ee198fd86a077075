// src/advert.rs
//! Advertisement policy: what to tell each neighbor about each route.
//!
//! One policy decides the value for a (port, route) pair:
//! - split horizon: a route is never advertised back out the port it was
//!   learned on; with poison reverse it is advertised as infinity instead
//! - unreachable routes are advertised as infinity
//! - everything else is advertised with its real latency
//!
//! Triggered rounds send only values that differ from the last one sent on
//! that port; forced rounds send everything.

use std::collections::HashMap;

use crate::routing::{ForwardingEntry, ForwardingTable};
use crate::types::{HostId, Latency, Port};

/// One route advertisement to put on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub port: Port,
    pub destination: HostId,
    pub latency: Latency,
}

/// Last latency advertised per (port, destination).
#[derive(Debug, Default, Clone)]
pub struct AdvertisementHistory {
    sent: HashMap<(Port, HostId), Latency>,
}

impl AdvertisementHistory {
    pub fn new() -> Self {
        AdvertisementHistory {
            sent: HashMap::new(),
        }
    }

    pub fn last(&self, port: Port, destination: &HostId) -> Option<Latency> {
        self.sent.get(&(port, destination.clone())).copied()
    }

    pub fn record(&mut self, port: Port, destination: HostId, latency: Latency) {
        self.sent.insert((port, destination), latency);
    }

    /// Forget everything sent on a port, e.g. because its neighbor changed.
    pub fn forget_port(&mut self, port: Port) -> usize {
        let before = self.sent.len();
        self.sent.retain(|(p, _), _| *p != port);
        before - self.sent.len()
    }

    pub fn len(&self) -> usize {
        self.sent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sent.is_empty()
    }
}

/// Value to advertise for `entry` on `port`, or `None` to stay silent.
pub fn advertised_latency(
    entry: &ForwardingEntry,
    port: Port,
    poison_mode: bool,
    infinity: Latency,
) -> Option<Latency> {
    if entry.port == port {
        poison_mode.then_some(infinity)
    } else if entry.latency >= infinity {
        Some(infinity)
    } else {
        Some(entry.latency)
    }
}

/// Work out one advertisement round and record it in `history`.
///
/// `ports` are the ports with a listening neighbor.
pub fn plan_round(
    table: &ForwardingTable,
    ports: &[Port],
    history: &mut AdvertisementHistory,
    force: bool,
    poison_mode: bool,
    infinity: Latency,
) -> Vec<Advertisement> {
    let mut out = Vec::new();

    for entry in table.all() {
        for &port in ports {
            let Some(latency) = advertised_latency(entry, port, poison_mode, infinity) else {
                continue;
            };
            if !force && history.last(port, &entry.destination) == Some(latency) {
                continue;
            }
            history.record(port, entry.destination.clone(), latency);
            out.push(Advertisement {
                port,
                destination: entry.destination.clone(),
                latency,
            });
        }
    }

    out
}

/// Everything in `table`, for a neighbor that just came up on `port`.
///
/// No split horizon here: the new neighbor cannot have taught us anything
/// yet.
pub fn full_dump(
    table: &ForwardingTable,
    port: Port,
    history: &mut AdvertisementHistory,
    infinity: Latency,
) -> Vec<Advertisement> {
    table
        .all()
        .map(|entry| {
            let latency = entry.latency.min(infinity);
            history.record(port, entry.destination.clone(), latency);
            Advertisement {
                port,
                destination: entry.destination.clone(),
                latency,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::peer::{PeerRouteRecord, PeerTable};
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn h(name: &str) -> HostId {
        HostId::from(name)
    }

    fn entry(dst: &str, port: Port, latency: Latency) -> ForwardingEntry {
        ForwardingEntry {
            destination: h(dst),
            port,
            latency,
        }
    }

    /// Table with `x` via port 1 at latency 3 and `y` via port 2 unreachable.
    fn sample_table() -> ForwardingTable {
        let mut peers = BTreeMap::new();
        let mut p1 = PeerTable::new();
        p1.upsert(PeerRouteRecord::learned(h("x"), 2, 0, 15));
        let mut p2 = PeerTable::new();
        p2.upsert(PeerRouteRecord::learned(h("y"), 16, 0, 15));
        peers.insert(1, p1);
        peers.insert(2, p2);
        let links = BTreeMap::from([(1, 1), (2, 1)]);
        ForwardingTable::compute(&peers, &links, 16)
    }

    #[test]
    fn split_horizon_suppresses_learned_port() {
        let e = entry("x", 1, 3);
        assert_eq!(advertised_latency(&e, 1, false, 16), None);
        assert_eq!(advertised_latency(&e, 2, false, 16), Some(3));
    }

    #[test]
    fn poison_reverse_advertises_infinity_on_learned_port() {
        let e = entry("x", 1, 3);
        assert_eq!(advertised_latency(&e, 1, true, 16), Some(16));
        assert_eq!(advertised_latency(&e, 2, true, 16), Some(3));
    }

    #[test]
    fn unreachable_route_is_advertised_as_infinity() {
        let e = entry("x", 1, 20);
        assert_eq!(advertised_latency(&e, 2, false, 16), Some(16));
    }

    #[test]
    fn triggered_round_sends_only_changes() {
        let table = sample_table();
        let mut history = AdvertisementHistory::new();

        let first = plan_round(&table, &[1, 2, 3], &mut history, false, false, 16);
        assert_eq!(
            first,
            vec![
                Advertisement { port: 2, destination: h("x"), latency: 3 },
                Advertisement { port: 3, destination: h("x"), latency: 3 },
                Advertisement { port: 1, destination: h("y"), latency: 16 },
                Advertisement { port: 3, destination: h("y"), latency: 16 },
            ]
        );

        let second = plan_round(&table, &[1, 2, 3], &mut history, false, false, 16);
        assert!(second.is_empty());
    }

    #[test]
    fn forced_round_resends_everything() {
        let table = sample_table();
        let mut history = AdvertisementHistory::new();

        let first = plan_round(&table, &[1, 2, 3], &mut history, true, true, 16);
        let second = plan_round(&table, &[1, 2, 3], &mut history, true, true, 16);
        assert_eq!(first.len(), 6);
        assert_eq!(first, second);
        assert_eq!(history.last(1, &h("x")), Some(16));
        assert_eq!(history.last(2, &h("x")), Some(3));
    }

    #[test]
    fn forgotten_port_is_advertised_again() {
        let table = sample_table();
        let mut history = AdvertisementHistory::new();
        plan_round(&table, &[2, 3], &mut history, false, false, 16);

        assert_eq!(history.forget_port(3), 2);
        let again = plan_round(&table, &[2, 3], &mut history, false, false, 16);
        assert!(again.iter().all(|a| a.port == 3));
        assert_eq!(again.len(), 2);
    }

    #[test]
    fn full_dump_ignores_split_horizon() {
        let table = sample_table();
        let mut history = AdvertisementHistory::new();

        let dump = full_dump(&table, 1, &mut history, 16);
        assert_eq!(dump.len(), 2);
        assert_eq!(dump[0].latency, 3);
        assert_eq!(dump[1].latency, 16);
        assert_eq!(history.last(1, &h("x")), Some(3));
    }

    proptest! {
        #[test]
        fn never_advertises_real_route_on_learned_port(
            routes in proptest::collection::vec((0u32..3, 0usize..4, 0u32..20), 0..30),
            force in any::<bool>(),
            poison in any::<bool>(),
        ) {
            let names = ["a", "b", "c", "d"];
            let mut peers: BTreeMap<Port, PeerTable> = BTreeMap::new();
            for (p, d, l) in routes {
                peers.entry(p).or_default()
                    .upsert(PeerRouteRecord::learned(h(names[d]), l, 0, 15));
            }
            let links = BTreeMap::from([(0, 1), (1, 2), (2, 3)]);
            let table = ForwardingTable::compute(&peers, &links, 16);
            let mut history = AdvertisementHistory::new();

            for ad in plan_round(&table, &[0, 1, 2], &mut history, force, poison, 16) {
                let best = table.get(&ad.destination).unwrap();
                if best.port == ad.port {
                    prop_assert!(poison);
                    prop_assert_eq!(ad.latency, 16);
                }
                prop_assert!(ad.latency <= 16);
            }
        }
    }
}
