// src/harness.rs
//! The boundary between a router and whatever drives it.
//!
//! The driver (a simulator, a test, a real forwarding plane) owns the clock
//! and the wires. It calls into a [`Router`] when something happens and
//! hands it a [`Harness`] to read the time and send packets with.

use crate::error::RouterError;
use crate::packet::{DataPacket, Packet};
use crate::types::{HostId, Latency, Port, Time};

/// Primitives a router consumes from its environment.
pub trait Harness {
    /// Monotonic clock reading, comparable to stored expiry times.
    fn current_time(&self) -> Time;

    /// Best-effort, fire-and-forget delivery to whatever is on `port`.
    fn send(&mut self, packet: Packet, port: Port);
}

/// Event handlers a router exposes to its driver.
///
/// Calls are never interleaved: each one runs to completion before the
/// next begins.
pub trait Router {
    /// A host was wired directly to this router on `port`.
    fn add_static_route(
        &mut self,
        ctx: &mut dyn Harness,
        host: HostId,
        port: Port,
    ) -> Result<(), RouterError>;

    fn handle_link_up(&mut self, ctx: &mut dyn Harness, port: Port, latency: Latency);

    fn handle_link_down(&mut self, ctx: &mut dyn Harness, port: Port);

    /// The neighbor on `port` can reach `destination` at `latency`.
    fn handle_route_advertisement(
        &mut self,
        ctx: &mut dyn Harness,
        destination: HostId,
        port: Port,
        latency: Latency,
    ) -> Result<(), RouterError>;

    fn handle_data_packet(&mut self, ctx: &mut dyn Harness, packet: DataPacket, in_port: Port);

    /// Periodic tick; the driver picks the interval.
    fn handle_timer(&mut self, ctx: &mut dyn Harness);
}

/// A harness that records what was sent instead of sending it.
///
/// Drivers hand one to a router per call and then route the captured
/// packets themselves.
#[derive(Debug, Default)]
pub struct Outbox {
    pub now: Time,
    pub sent: Vec<(Port, Packet)>,
}

impl Outbox {
    pub fn new(now: Time) -> Self {
        Outbox {
            now,
            sent: Vec::new(),
        }
    }

    /// Take and return everything sent since the last call.
    pub fn drain(&mut self) -> Vec<(Port, Packet)> {
        std::mem::take(&mut self.sent)
    }

    /// Route advertisements sent so far, as (port, destination, latency).
    pub fn routes(&self) -> Vec<(Port, HostId, Latency)> {
        self.sent
            .iter()
            .filter_map(|(port, p)| match p {
                Packet::Route(r) => Some((*port, r.destination.clone(), r.latency)),
                Packet::Data(_) => None,
            })
            .collect()
    }
}

impl Harness for Outbox {
    fn current_time(&self) -> Time {
        self.now
    }

    fn send(&mut self, packet: Packet, port: Port) {
        self.sent.push((port, packet));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbox_records_and_drains() {
        let mut out = Outbox::new(42);
        assert_eq!(out.current_time(), 42);

        out.send(Packet::route(HostId::from("h1"), 3), 2);
        out.send(
            Packet::data(HostId::from("a"), HostId::from("b"), Vec::new()),
            1,
        );
        assert_eq!(out.routes(), vec![(2, HostId::from("h1"), 3)]);

        let drained = out.drain();
        assert_eq!(drained.len(), 2);
        assert!(out.sent.is_empty());
    }
}
