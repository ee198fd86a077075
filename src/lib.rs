pub mod advert;
pub mod error;
pub mod event;
pub mod harness;
pub mod packet;
pub mod peer;
pub mod router;
pub mod routing;
pub mod sim;
pub mod types;

pub use error::{PacketError, RouterError, SimError};
pub use harness::{Harness, Outbox, Router};
pub use router::{DvRouter, RouterConfig};
pub use types::{HostId, Latency, Port, Time};
