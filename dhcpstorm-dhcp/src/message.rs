//! Semantic DHCP message model
//!
//! The simulation exchanges decoded records, not wire bytes; only the
//! fields the handshake logic consumes are modeled. Byte-accurate
//! encoding is a transport concern and stays outside this crate.

use std::fmt;
use std::net::Ipv4Addr;
use std::time::Duration;

use dhcpstorm_core::MacAddr;

/// The "no address" sentinel (0.0.0.0).
pub const UNSPECIFIED: Ipv4Addr = Ipv4Addr::UNSPECIFIED;

/// DHCP message type (RFC 2132 option 53 values)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Discover = 1,
    Offer = 2,
    Request = 3,
    Decline = 4,
    Ack = 5,
    Nak = 6,
    Release = 7,
    Inform = 8,
}

impl MessageType {
    /// Parse from the option 53 code
    pub fn from_code(value: u8) -> Option<Self> {
        match value {
            1 => Some(MessageType::Discover),
            2 => Some(MessageType::Offer),
            3 => Some(MessageType::Request),
            4 => Some(MessageType::Decline),
            5 => Some(MessageType::Ack),
            6 => Some(MessageType::Nak),
            7 => Some(MessageType::Release),
            8 => Some(MessageType::Inform),
            _ => None,
        }
    }

    /// The option 53 code
    pub fn code(&self) -> u8 {
        *self as u8
    }

    /// Get human-readable name
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Discover => "DISCOVER",
            MessageType::Offer => "OFFER",
            MessageType::Request => "REQUEST",
            MessageType::Decline => "DECLINE",
            MessageType::Ack => "ACK",
            MessageType::Nak => "NAK",
            MessageType::Release => "RELEASE",
            MessageType::Inform => "INFORM",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The options the handshake logic reads and writes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhcpOption {
    /// Option 50: address the client asks for
    RequestedIp(Ipv4Addr),
    /// Option 54: server identifier
    ServerId(Ipv4Addr),
    /// Option 1: subnet mask
    SubnetMask(Ipv4Addr),
    /// Option 3: default router
    Router(Ipv4Addr),
    /// Option 51: lease time in seconds
    LeaseTime(u32),
    /// Option 58: renewal (T1) time in seconds
    RenewalTime(u32),
    /// Option 59: rebinding (T2) time in seconds
    RebindingTime(u32),
}

/// Option set a server attaches to its OFFER and ACK replies.
///
/// The advertised lease is always the server's default lease; the
/// shorter starvation/reservation holds are internal bookkeeping the
/// client never sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplyOptions {
    pub server_id: Ipv4Addr,
    pub netmask: Ipv4Addr,
    pub router: Ipv4Addr,
    pub lease: Duration,
}

impl ReplyOptions {
    pub fn lease_secs(&self) -> u32 {
        self.lease.as_secs() as u32
    }

    /// T1 = 50% of lease time
    pub fn renew_secs(&self) -> u32 {
        (self.lease.as_secs() / 2) as u32
    }

    /// T2 = 87.5% of lease time
    pub fn rebind_secs(&self) -> u32 {
        (self.lease.as_secs() * 7 / 8) as u32
    }
}

/// One decoded DHCP message as delivered on the bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DhcpMessage {
    pub msg_type: MessageType,
    /// Transaction ID
    pub xid: u32,
    /// Client hardware address
    pub chaddr: MacAddr,
    /// Client's current address (0.0.0.0 while unconfigured)
    pub ciaddr: Ipv4Addr,
    /// Address the server assigns ("your" address)
    pub yiaddr: Ipv4Addr,
    pub options: Vec<DhcpOption>,
}

impl DhcpMessage {
    /// Client-side DISCOVER broadcast
    pub fn discover(xid: u32, chaddr: MacAddr) -> Self {
        Self {
            msg_type: MessageType::Discover,
            xid,
            chaddr,
            ciaddr: UNSPECIFIED,
            yiaddr: UNSPECIFIED,
            options: Vec::new(),
        }
    }

    /// Client-side REQUEST for `requested`, naming the chosen server.
    ///
    /// An unspecified `requested` produces no RequestedIp option; the
    /// server then allocates fresh.
    pub fn request(
        xid: u32,
        chaddr: MacAddr,
        requested: Ipv4Addr,
        server_id: Option<Ipv4Addr>,
    ) -> Self {
        let mut options = Vec::new();
        if requested != UNSPECIFIED {
            options.push(DhcpOption::RequestedIp(requested));
        }
        if let Some(server_id) = server_id {
            options.push(DhcpOption::ServerId(server_id));
        }
        Self {
            msg_type: MessageType::Request,
            xid,
            chaddr,
            ciaddr: UNSPECIFIED,
            yiaddr: UNSPECIFIED,
            options,
        }
    }

    /// Server-side OFFER for `yiaddr`
    pub fn offer(xid: u32, chaddr: MacAddr, yiaddr: Ipv4Addr, reply: &ReplyOptions) -> Self {
        Self::reply(MessageType::Offer, xid, chaddr, yiaddr, reply)
    }

    /// Server-side ACK for `yiaddr`
    pub fn ack(xid: u32, chaddr: MacAddr, yiaddr: Ipv4Addr, reply: &ReplyOptions) -> Self {
        Self::reply(MessageType::Ack, xid, chaddr, yiaddr, reply)
    }

    fn reply(
        msg_type: MessageType,
        xid: u32,
        chaddr: MacAddr,
        yiaddr: Ipv4Addr,
        reply: &ReplyOptions,
    ) -> Self {
        Self {
            msg_type,
            xid,
            chaddr,
            ciaddr: UNSPECIFIED,
            yiaddr,
            options: vec![
                DhcpOption::SubnetMask(reply.netmask),
                DhcpOption::Router(reply.router),
                DhcpOption::LeaseTime(reply.lease_secs()),
                DhcpOption::RenewalTime(reply.renew_secs()),
                DhcpOption::RebindingTime(reply.rebind_secs()),
                DhcpOption::ServerId(reply.server_id),
            ],
        }
    }

    /// Get requested IP (option 50) if present
    pub fn requested_ip(&self) -> Option<Ipv4Addr> {
        self.options.iter().find_map(|opt| match opt {
            DhcpOption::RequestedIp(addr) => Some(*addr),
            _ => None,
        })
    }

    /// Get server identifier (option 54) if present
    pub fn server_id(&self) -> Option<Ipv4Addr> {
        self.options.iter().find_map(|opt| match opt {
            DhcpOption::ServerId(addr) => Some(*addr),
            _ => None,
        })
    }

    /// Get subnet mask (option 1) if present
    pub fn subnet_mask(&self) -> Option<Ipv4Addr> {
        self.options.iter().find_map(|opt| match opt {
            DhcpOption::SubnetMask(addr) => Some(*addr),
            _ => None,
        })
    }

    /// Get default router (option 3) if present
    pub fn router(&self) -> Option<Ipv4Addr> {
        self.options.iter().find_map(|opt| match opt {
            DhcpOption::Router(addr) => Some(*addr),
            _ => None,
        })
    }

    /// Get lease time in seconds (option 51) if present
    pub fn lease_secs(&self) -> Option<u32> {
        self.options.iter().find_map(|opt| match opt {
            DhcpOption::LeaseTime(secs) => Some(*secs),
            _ => None,
        })
    }

    /// Get renewal time in seconds (option 58) if present
    pub fn renew_secs(&self) -> Option<u32> {
        self.options.iter().find_map(|opt| match opt {
            DhcpOption::RenewalTime(secs) => Some(*secs),
            _ => None,
        })
    }

    /// Get rebinding time in seconds (option 59) if present
    pub fn rebind_secs(&self) -> Option<u32> {
        self.options.iter().find_map(|opt| match opt {
            DhcpOption::RebindingTime(secs) => Some(*secs),
            _ => None,
        })
    }
}
