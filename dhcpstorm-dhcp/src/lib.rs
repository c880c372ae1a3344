//! Rogue DHCP ecosystem simulation
//!
//! This crate contains the actors of an adversarial DHCP segment:
//! - Semantic DHCP message model (DISCOVER, OFFER, REQUEST, ACK and friends)
//! - Rogue server with pool expansion, fabricated fallback addresses and
//!   starvation-attacker classification
//! - Starvation client flooding DISCOVERs with forged identities
//! - A standard-behaving victim server and client model
//!
//! Everything runs single threaded on the `dhcpstorm-sim` scheduler and
//! broadcast bus; no real sockets are involved.

pub mod classify;
pub mod client;
pub mod config;
pub mod lease;
pub mod legit;
pub mod message;
pub mod pool;
pub mod responder;
pub mod rogue;
pub mod starvation;

// Re-export the actors and their configs for convenience
pub use classify::AttackerClassifier;
pub use client::{BoundLease, DhcpClient};
pub use config::{ClientConfig, LegitServerConfig, RogueServerConfig, StarvationConfig};
pub use lease::{Lease, LeaseTable};
pub use legit::LegitDhcpServer;
pub use message::{DhcpMessage, DhcpOption, MessageType, ReplyOptions, UNSPECIFIED};
pub use pool::AddressPool;
pub use responder::DhcpResponder;
pub use rogue::RogueDhcpServer;
pub use starvation::StarvationClient;
