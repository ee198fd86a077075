// src/sim.rs
//! In-process network of routers and hosts.
//!
//! Links carry encoded frames, so everything a router sends goes through the
//! packet codec. Delivery is instant and in order; an optional loss rate
//! drops route advertisements (never data) to exercise recovery by the
//! periodic timer.

use std::collections::{BTreeMap, HashMap, VecDeque};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, error, info, warn};

use crate::error::SimError;
use crate::harness::{Outbox, Router};
use crate::packet::{DataPacket, Packet};
use crate::router::{DvRouter, RouterConfig};
use crate::types::{HostId, Latency, Port, Time};

/// Upper bound on frames delivered by one [`Network::run_until_idle`].
const MAX_DELIVERIES: usize = 100_000;

/// Simulator knobs.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Time between two timer ticks.
    pub timer_interval: u64,
    /// Probability in [0, 1] of losing a route advertisement.
    pub loss: f64,
    pub seed: u64,
}

impl Default for SimConfig {
    fn default() -> Self {
        SimConfig {
            timer_interval: 5,
            loss: 0.0,
            seed: 0,
        }
    }
}

impl SimConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timer_interval(mut self, value: u64) -> Self {
        self.timer_interval = value;
        self
    }

    pub fn loss(mut self, value: f64) -> Self {
        self.loss = value.clamp(0.0, 1.0);
        self
    }

    pub fn seed(mut self, value: u64) -> Self {
        self.seed = value;
        self
    }
}

/// Delivery counters.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SimStats {
    pub delivered: usize,
    pub lost: usize,
    pub dead_link: usize,
    pub undecodable: usize,
}

#[derive(Debug, Default)]
struct HostState {
    port: Option<Port>,
    received: Vec<DataPacket>,
}

#[derive(Debug)]
enum Node {
    Router(Box<DvRouter>),
    Host(HostState),
}

/// The far side of a link, as seen from one end.
#[derive(Debug, Clone)]
struct LinkEnd {
    node: String,
    port: Port,
}

#[derive(Debug)]
struct Frame {
    to: String,
    port: Port,
    bytes: Vec<u8>,
}

/// A simulated network driving a set of [`DvRouter`]s.
pub struct Network {
    config: SimConfig,
    now: Time,
    nodes: BTreeMap<String, Node>,
    next_port: HashMap<String, Port>,
    links: HashMap<(String, Port), LinkEnd>,
    queue: VecDeque<Frame>,
    rng: StdRng,
    stats: SimStats,
}

impl Network {
    pub fn new(config: SimConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Network {
            config,
            now: 0,
            nodes: BTreeMap::new(),
            next_port: HashMap::new(),
            links: HashMap::new(),
            queue: VecDeque::new(),
            rng,
            stats: SimStats::default(),
        }
    }

    pub fn now(&self) -> Time {
        self.now
    }

    pub fn stats(&self) -> SimStats {
        self.stats
    }

    pub fn set_loss(&mut self, loss: f64) {
        self.config.loss = loss.clamp(0.0, 1.0);
    }

    pub fn add_router(&mut self, name: &str, config: RouterConfig) -> Result<(), SimError> {
        self.add_node(name, Node::Router(Box::new(DvRouter::new(config))))
    }

    pub fn add_host(&mut self, name: &str) -> Result<(), SimError> {
        self.add_node(name, Node::Host(HostState::default()))
    }

    fn add_node(&mut self, name: &str, node: Node) -> Result<(), SimError> {
        if self.nodes.contains_key(name) {
            return Err(SimError::DuplicateNode(name.to_owned()));
        }
        self.nodes.insert(name.to_owned(), node);
        Ok(())
    }

    pub fn router(&self, name: &str) -> Option<&DvRouter> {
        match self.nodes.get(name) {
            Some(Node::Router(r)) => Some(&**r),
            _ => None,
        }
    }

    /// Router names, sorted.
    pub fn routers(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|(_, n)| matches!(n, Node::Router(_)))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Data packets delivered to `host` so far.
    pub fn received(&self, host: &str) -> &[DataPacket] {
        match self.nodes.get(host) {
            Some(Node::Host(h)) => &h.received,
            _ => &[],
        }
    }

    /// Port `name` uses for the link to `peer`, if they are linked.
    pub fn port_towards(&self, name: &str, peer: &str) -> Option<Port> {
        self.links
            .iter()
            .find(|((node, _), end)| node == name && end.node == peer)
            .map(|((_, port), _)| *port)
    }

    fn alloc_port(&mut self, name: &str) -> Port {
        let next = self.next_port.entry(name.to_owned()).or_insert(1);
        let port = *next;
        *next += 1;
        port
    }

    /// Bring up a link; a host end installs a static route on its router.
    pub fn link(&mut self, a: &str, b: &str, latency: Latency) -> Result<(), SimError> {
        let a_host = self.host_state(a)?.is_some();
        let b_host = self.host_state(b)?.is_some();
        if a_host && b_host {
            return Err(SimError::HostToHost(a.to_owned(), b.to_owned()));
        }
        for (name, is_host) in [(a, a_host), (b, b_host)] {
            if is_host && self.host_state(name)?.and_then(|h| h.port).is_some() {
                return Err(SimError::HostAlreadyLinked(name.to_owned()));
            }
        }

        let pa = self.alloc_port(a);
        let pb = self.alloc_port(b);
        self.links.insert(
            (a.to_owned(), pa),
            LinkEnd {
                node: b.to_owned(),
                port: pb,
            },
        );
        self.links.insert(
            (b.to_owned(), pb),
            LinkEnd {
                node: a.to_owned(),
                port: pa,
            },
        );
        info!(a, b, latency, "link up");

        for (name, port, is_host) in [(a, pa, a_host), (b, pb, b_host)] {
            if is_host {
                if let Some(Node::Host(h)) = self.nodes.get_mut(name) {
                    h.port = Some(port);
                }
            } else {
                self.with_router(name, |r, out| r.handle_link_up(out, port, latency))?;
            }
        }

        if b_host {
            let host = HostId::from(b);
            self.with_router(a, |r, out| r.add_static_route(out, host, pa))??;
        } else if a_host {
            let host = HostId::from(a);
            self.with_router(b, |r, out| r.add_static_route(out, host, pb))??;
        }

        self.run_until_idle()?;
        Ok(())
    }

    /// Take down the link between `a` and `b`.
    pub fn unlink(&mut self, a: &str, b: &str) -> Result<(), SimError> {
        let pa = self
            .port_towards(a, b)
            .ok_or_else(|| SimError::NotLinked(a.to_owned(), b.to_owned()))?;
        let pb = self
            .port_towards(b, a)
            .ok_or_else(|| SimError::NotLinked(a.to_owned(), b.to_owned()))?;
        self.links.remove(&(a.to_owned(), pa));
        self.links.remove(&(b.to_owned(), pb));
        info!(a, b, "link down");

        for (name, port) in [(a, pa), (b, pb)] {
            if let Some(Node::Host(h)) = self.nodes.get_mut(name) {
                h.port = None;
            } else {
                self.with_router(name, |r, out| r.handle_link_down(out, port))?;
            }
        }

        self.run_until_idle()?;
        Ok(())
    }

    /// Advance the clock one timer interval and fire every router's timer.
    pub fn tick(&mut self) -> Result<(), SimError> {
        self.now += self.config.timer_interval;
        for name in self.routers() {
            self.with_router(&name, |r, out| r.handle_timer(out))?;
        }
        self.run_until_idle()?;
        Ok(())
    }

    pub fn run_ticks(&mut self, n: usize) -> Result<(), SimError> {
        for _ in 0..n {
            self.tick()?;
        }
        Ok(())
    }

    /// Send a data packet from host `src` to host `dst`; true if it arrived.
    pub fn send_data(&mut self, src: &str, dst: &str, payload: &[u8]) -> Result<bool, SimError> {
        let port = self
            .host_state(src)?
            .ok_or_else(|| SimError::UnknownNode(src.to_owned()))?
            .port
            .ok_or_else(|| SimError::HostNotLinked(src.to_owned()))?;
        let before = self.received(dst).len();

        let packet = Packet::data(HostId::from(src), HostId::from(dst), payload.to_vec());
        self.dispatch(src, port, packet);
        self.run_until_idle()?;

        Ok(self.received(dst)[before..]
            .iter()
            .any(|d| d.source.as_str() == src && d.payload == payload))
    }

    /// Deliver queued frames until none are left; returns how many were
    /// delivered.
    pub fn run_until_idle(&mut self) -> Result<usize, SimError> {
        let mut count = 0;
        while let Some(frame) = self.queue.pop_front() {
            if count == MAX_DELIVERIES {
                warn!(pending = self.queue.len() + 1, "delivery limit reached");
                self.queue.clear();
                break;
            }
            count += 1;
            self.deliver(frame)?;
        }
        Ok(count)
    }

    fn deliver(&mut self, frame: Frame) -> Result<(), SimError> {
        if !self.links.contains_key(&(frame.to.clone(), frame.port)) {
            self.stats.dead_link += 1;
            return Ok(());
        }
        let packet = match Packet::from_bytes(&frame.bytes) {
            Ok(p) => p,
            Err(e) => {
                warn!(to = %frame.to, port = frame.port, "dropping undecodable frame: {e}");
                self.stats.undecodable += 1;
                return Ok(());
            }
        };
        self.stats.delivered += 1;

        let port = frame.port;
        if let Some(Node::Host(h)) = self.nodes.get_mut(&frame.to) {
            // Hosts only care about data addressed to them.
            if let Packet::Data(d) = packet {
                if d.destination.as_str() == frame.to {
                    h.received.push(d);
                }
            }
            return Ok(());
        }

        match packet {
            Packet::Route(r) => {
                let res = self.with_router(&frame.to, |rt, out| {
                    rt.handle_route_advertisement(out, r.destination, port, r.latency)
                })?;
                if let Err(e) = res {
                    error!(router = %frame.to, "route advertisement rejected: {e}");
                    return Err(e.into());
                }
            }
            Packet::Data(d) => {
                self.with_router(&frame.to, |rt, out| rt.handle_data_packet(out, d, port))?;
            }
        }
        Ok(())
    }

    /// Run `f` against router `name`, then put whatever it sent on the wire.
    fn with_router<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut DvRouter, &mut Outbox) -> T,
    ) -> Result<T, SimError> {
        let mut out = Outbox::new(self.now);
        let result = match self.nodes.get_mut(name) {
            Some(Node::Router(r)) => f(&mut **r, &mut out),
            _ => return Err(SimError::UnknownNode(name.to_owned())),
        };
        for (port, packet) in out.drain() {
            self.dispatch(name, port, packet);
        }
        Ok(result)
    }

    fn dispatch(&mut self, from: &str, port: Port, packet: Packet) {
        let Some(end) = self.links.get(&(from.to_owned(), port)).cloned() else {
            self.stats.dead_link += 1;
            return;
        };
        if matches!(packet, Packet::Route(_))
            && self.config.loss > 0.0
            && self.rng.random_bool(self.config.loss)
        {
            debug!(from, port, "advertisement lost");
            self.stats.lost += 1;
            return;
        }
        match packet.to_bytes() {
            Ok(bytes) => self.queue.push_back(Frame {
                to: end.node,
                port: end.port,
                bytes,
            }),
            Err(e) => warn!(from, port, "cannot encode packet: {e}"),
        }
    }

    /// `Ok(None)` for routers, `Err` for unknown names.
    fn host_state(&self, name: &str) -> Result<Option<&HostState>, SimError> {
        match self.nodes.get(name) {
            Some(Node::Host(h)) => Ok(Some(h)),
            Some(Node::Router(_)) => Ok(None),
            None => Err(SimError::UnknownNode(name.to_owned())),
        }
    }
}
