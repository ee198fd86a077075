// src/router.rs
//! Distance-vector router.
//!
//! This wraps the peer tables, forwarding table and advertisement history
//! into a [`Router`] that a driver feeds link, route, data and timer events.

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, trace};

use crate::advert::{self, AdvertisementHistory};
use crate::error::RouterError;
use crate::event::{self, Event};
use crate::harness::{Harness, Router};
use crate::packet::{DataPacket, Packet};
use crate::peer::{PeerRouteRecord, PeerTable};
use crate::routing::ForwardingTable;
use crate::types::{HostId, Latency, Port, Time};

/// Latency at and above which a destination is unreachable.
pub const DEFAULT_INFINITY: Latency = 16;

/// Minimum lifetime of a learned route, in time units.
pub const DEFAULT_ROUTE_TTL: u64 = 15;

/// Configuration for a distance-vector router.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterConfig {
    /// Advertise infinity instead of staying silent (split horizon), and
    /// poison routes instead of deleting them.
    pub poison_mode: bool,
    pub infinity: Latency,
    pub route_ttl: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        RouterConfig {
            poison_mode: false,
            infinity: DEFAULT_INFINITY,
            route_ttl: DEFAULT_ROUTE_TTL,
        }
    }
}

impl RouterConfig {
    /// Create a new config with the classic RIP-like defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn poison_mode(mut self, value: bool) -> Self {
        self.poison_mode = value;
        self
    }

    /// Set the unreachable sentinel.
    pub fn infinity(mut self, value: Latency) -> Self {
        self.infinity = value;
        self
    }

    /// Set how long a learned route lives without a refresh.
    pub fn route_ttl(mut self, value: u64) -> Self {
        self.route_ttl = value;
        self
    }
}

/// A single-owner distance-vector router.
#[derive(Debug)]
pub struct DvRouter {
    config: RouterConfig,
    /// Latency of the link on each port that is (or was, if poisoned) up.
    link_latency: BTreeMap<Port, Latency>,
    /// One table per port whose link is up, plus poisoned ports.
    peer_tables: BTreeMap<Port, PeerTable>,
    forwarding: ForwardingTable,
    history: AdvertisementHistory,
    /// Down links whose routes are still being advertised as unreachable.
    poisoned_ports: BTreeSet<Port>,
    events: Vec<Event>,
}

impl DvRouter {
    pub fn new(config: RouterConfig) -> Self {
        DvRouter {
            config,
            link_latency: BTreeMap::new(),
            peer_tables: BTreeMap::new(),
            forwarding: ForwardingTable::new(),
            history: AdvertisementHistory::new(),
            poisoned_ports: BTreeSet::new(),
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    pub fn forwarding_table(&self) -> &ForwardingTable {
        &self.forwarding
    }

    pub fn peer_table(&self, port: Port) -> Option<&PeerTable> {
        self.peer_tables.get(&port)
    }

    pub fn link_latency(&self, port: Port) -> Option<Latency> {
        self.link_latency.get(&port).copied()
    }

    pub fn history(&self) -> &AdvertisementHistory {
        &self.history
    }

    pub fn is_poisoned(&self, port: Port) -> bool {
        self.poisoned_ports.contains(&port)
    }

    /// Whether a neighbor is listening on `port`.
    pub fn is_link_up(&self, port: Port) -> bool {
        self.peer_tables.contains_key(&port) && !self.poisoned_ports.contains(&port)
    }

    /// Ports with a listening neighbor, ascending.
    pub fn live_ports(&self) -> Vec<Port> {
        self.peer_tables
            .keys()
            .copied()
            .filter(|p| !self.poisoned_ports.contains(p))
            .collect()
    }

    /// Take and return all pending events since the last call.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    /// Rebuild the forwarding table from the peer tables.
    pub fn update_forwarding_table(&mut self) {
        let new = ForwardingTable::compute(
            &self.peer_tables,
            &self.link_latency,
            self.config.infinity,
        );

        for ev in event::diff_tables(&self.forwarding, &new) {
            match &ev {
                Event::BestRouteChanged { entry, .. } => {
                    debug!("best route changed: {}", entry.summary());
                }
                Event::RouteLost { destination } => debug!(%destination, "route lost"),
                _ => {}
            }
            self.events.push(ev);
        }

        self.forwarding = new;
    }

    /// Advertise the forwarding table on every live port.
    ///
    /// With `force` every applicable value is sent; otherwise only values
    /// that changed since the last advertisement on that port.
    pub fn send_routes(&mut self, ctx: &mut dyn Harness, force: bool) {
        let ports = self.live_ports();
        let round = advert::plan_round(
            &self.forwarding,
            &ports,
            &mut self.history,
            force,
            self.config.poison_mode,
            self.config.infinity,
        );

        for ad in round {
            trace!(port = ad.port, destination = %ad.destination, latency = ad.latency, "advertise");
            ctx.send(Packet::route(ad.destination, ad.latency), ad.port);
        }
    }

    /// Drop (or poison, in poison mode) stale peer routes and rebuild the
    /// forwarding table.
    pub fn expire_routes(&mut self, now: Time) {
        let RouterConfig {
            poison_mode,
            infinity,
            route_ttl,
        } = self.config;

        for (port, table) in self.peer_tables.iter_mut() {
            if poison_mode {
                let outcome = table.poison_stale(now, infinity, route_ttl);
                if !outcome.is_empty() {
                    debug!(
                        port,
                        poisoned = outcome.poisoned.len(),
                        removed = outcome.removed.len(),
                        "expired routes"
                    );
                }
            } else {
                let removed = table.prune_stale(now);
                if !removed.is_empty() {
                    debug!(port, removed = removed.len(), "expired routes");
                }
            }
        }

        // A down link is forgotten once all of its poisoned routes are gone.
        let retired: Vec<Port> = self
            .poisoned_ports
            .iter()
            .copied()
            .filter(|p| self.peer_tables.get(p).is_none_or(PeerTable::is_empty))
            .collect();
        for port in retired {
            debug!(port, "poisoned link retired");
            self.poisoned_ports.remove(&port);
            self.peer_tables.remove(&port);
            self.link_latency.remove(&port);
        }

        self.update_forwarding_table();
    }
}

impl Router for DvRouter {
    fn add_static_route(
        &mut self,
        _ctx: &mut dyn Harness,
        host: HostId,
        port: Port,
    ) -> Result<(), RouterError> {
        if !self.is_link_up(port) {
            return Err(RouterError::LinkNotUp(port));
        }
        let table = self
            .peer_tables
            .get_mut(&port)
            .ok_or(RouterError::LinkNotUp(port))?;

        debug!(%host, port, "static route");
        table.upsert(PeerRouteRecord::permanent(host));
        self.update_forwarding_table();
        Ok(())
    }

    fn handle_link_up(&mut self, ctx: &mut dyn Harness, port: Port, latency: Latency) {
        debug!(port, latency, "link up");

        self.link_latency.insert(port, latency);
        let replaced = self.peer_tables.insert(port, PeerTable::new());
        self.poisoned_ports.remove(&port);
        self.history.forget_port(port);
        self.events.push(Event::LinkUp { port, latency });

        if replaced.is_some_and(|t| !t.is_empty()) {
            self.update_forwarding_table();
        }

        let dump = advert::full_dump(
            &self.forwarding,
            port,
            &mut self.history,
            self.config.infinity,
        );
        for ad in dump {
            trace!(port, destination = %ad.destination, latency = ad.latency, "advertise (link up)");
            ctx.send(Packet::route(ad.destination, ad.latency), port);
        }
    }

    fn handle_link_down(&mut self, ctx: &mut dyn Harness, port: Port) {
        if !self.is_link_up(port) {
            debug!(port, "link down on a port that is not up; ignoring");
            return;
        }
        debug!(port, poison = self.config.poison_mode, "link down");

        if self.config.poison_mode {
            let now = ctx.current_time();
            if let Some(table) = self.peer_tables.get_mut(&port) {
                table.poison_all(self.config.infinity, now, self.config.route_ttl);
            }
            self.poisoned_ports.insert(port);
        } else {
            self.peer_tables.remove(&port);
            self.link_latency.remove(&port);
        }
        self.history.forget_port(port);
        self.events.push(Event::LinkDown { port });

        self.update_forwarding_table();
        self.send_routes(ctx, false);
    }

    fn handle_route_advertisement(
        &mut self,
        ctx: &mut dyn Harness,
        destination: HostId,
        port: Port,
        latency: Latency,
    ) -> Result<(), RouterError> {
        if !self.is_link_up(port) {
            return Err(RouterError::LinkNotUp(port));
        }
        let now = ctx.current_time();
        let table = self
            .peer_tables
            .get_mut(&port)
            .ok_or(RouterError::LinkNotUp(port))?;

        trace!(%destination, port, latency, "route advertisement");
        table.upsert(PeerRouteRecord::learned(
            destination,
            latency,
            now,
            self.config.route_ttl,
        ));

        self.update_forwarding_table();
        self.send_routes(ctx, false);
        Ok(())
    }

    fn handle_data_packet(&mut self, ctx: &mut dyn Harness, packet: DataPacket, in_port: Port) {
        let out_port = match self.forwarding.get(&packet.destination) {
            Some(e) if e.is_reachable(self.config.infinity) && e.port != in_port => e.port,
            _ => {
                trace!(destination = %packet.destination, in_port, "drop data packet");
                return;
            }
        };

        trace!(destination = %packet.destination, in_port, out_port, "forward data packet");
        ctx.send(Packet::Data(packet), out_port);
    }

    fn handle_timer(&mut self, ctx: &mut dyn Harness) {
        self.expire_routes(ctx.current_time());
        self.send_routes(ctx, true);
    }
}
