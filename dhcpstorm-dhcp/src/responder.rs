//! Server-side message seam

use crate::message::DhcpMessage;

/// Turns one inbound client message into at most one reply.
///
/// Both server variants implement this independently; there is no shared
/// server base. `None` means silence, which DHCP clients absorb by
/// retrying on their own.
pub trait DhcpResponder {
    fn respond(&mut self, msg: &DhcpMessage) -> Option<DhcpMessage>;
}
