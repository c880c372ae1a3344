//! Dhcpstorm simulation engine
//!
//! A single-threaded discrete-event engine:
//! - Virtual-clock scheduler with cancellable timers, ordered by
//!   (deadline, registration sequence)
//! - Broadcast bus connecting actors on one simulated LAN segment
//!
//! The engine is protocol-agnostic; everything DHCP lives above it.

pub mod bus;
pub mod scheduler;

pub use bus::{Bus, TapId};
pub use scheduler::{Scheduler, TimerHandle};
