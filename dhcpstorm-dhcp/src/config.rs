//! Actor configuration
//!
//! Plain structs with builder-style setters, validated once at actor
//! construction rather than at each access. Defaults mirror the knobs
//! of the modeled rogue ecosystem: a 10.0.0.100-150 real pool backed by
//! a 10.0.0.201-254 fabricated range, hour-long advertised leases, and
//! a 10 ms flood interval.

use std::net::Ipv4Addr;
use std::time::Duration;

use dhcpstorm_core::{Error, MacAddr, Result};

/// Smallest accepted pool expansion step.
pub const EXPANSION_MIN: u32 = 10;
/// Largest accepted pool expansion step.
pub const EXPANSION_MAX: u32 = 1000;

/// Rogue server knobs.
#[derive(Debug, Clone)]
pub struct RogueServerConfig {
    /// Address advertised as router and server identifier
    pub server_addr: Ipv4Addr,
    /// First address of the real pool
    pub pool_start: Ipv4Addr,
    /// Last address of the real pool (grows on expansion)
    pub pool_end: Ipv4Addr,
    /// First address of the fabricated range
    pub fake_start: Ipv4Addr,
    /// Last address of the fabricated range
    pub fake_end: Ipv4Addr,
    /// Subnet mask advertised in replies
    pub netmask: Ipv4Addr,
    /// Fall back to fabricated addresses when the pool is exhausted
    pub use_fake_addresses: bool,
    /// Grow the pool when it runs low
    pub dynamic_expansion: bool,
    /// Addresses added per expansion
    pub expansion_size: u32,
    /// Lease granted on REQUEST and advertised in every reply
    pub default_lease: Duration,
    /// Very short lease for suspected starvation attackers
    pub starvation_lease: Duration,
}

impl Default for RogueServerConfig {
    fn default() -> Self {
        Self {
            server_addr: Ipv4Addr::new(10, 0, 0, 99),
            pool_start: Ipv4Addr::new(10, 0, 0, 100),
            pool_end: Ipv4Addr::new(10, 0, 0, 150),
            fake_start: Ipv4Addr::new(10, 0, 0, 201),
            fake_end: Ipv4Addr::new(10, 0, 0, 254),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            use_fake_addresses: true,
            dynamic_expansion: true,
            expansion_size: 50,
            default_lease: Duration::from_secs(3600),
            starvation_lease: Duration::from_secs(5),
        }
    }
}

impl RogueServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server_addr(mut self, addr: Ipv4Addr) -> Self {
        self.server_addr = addr;
        self
    }

    pub fn with_pool_range(mut self, start: Ipv4Addr, end: Ipv4Addr) -> Self {
        self.pool_start = start;
        self.pool_end = end;
        self
    }

    pub fn with_fake_range(mut self, start: Ipv4Addr, end: Ipv4Addr) -> Self {
        self.fake_start = start;
        self.fake_end = end;
        self
    }

    pub fn with_netmask(mut self, netmask: Ipv4Addr) -> Self {
        self.netmask = netmask;
        self
    }

    pub fn with_use_fake_addresses(mut self, enabled: bool) -> Self {
        self.use_fake_addresses = enabled;
        self
    }

    pub fn with_dynamic_expansion(mut self, enabled: bool) -> Self {
        self.dynamic_expansion = enabled;
        self
    }

    pub fn with_expansion_size(mut self, size: u32) -> Self {
        self.expansion_size = size;
        self
    }

    pub fn with_default_lease(mut self, lease: Duration) -> Self {
        self.default_lease = lease;
        self
    }

    pub fn with_starvation_lease(mut self, lease: Duration) -> Self {
        self.starvation_lease = lease;
        self
    }

    /// Check numeric ranges and pool geometry.
    pub fn validate(&self) -> Result<()> {
        if !(EXPANSION_MIN..=EXPANSION_MAX).contains(&self.expansion_size) {
            return Err(Error::invalid_parameter(
                "expansion_size",
                "must be between 10 and 1000",
            ));
        }
        if u32::from(self.pool_start) > u32::from(self.pool_end) {
            return Err(Error::config("real pool range is empty"));
        }
        if u32::from(self.fake_start) > u32::from(self.fake_end) {
            return Err(Error::config("fake range is empty"));
        }
        if u32::from(self.pool_end) >= u32::from(self.fake_start) {
            return Err(Error::config(
                "real pool must sit strictly below the fake range",
            ));
        }
        if self.default_lease.is_zero() {
            return Err(Error::invalid_parameter("default_lease", "must be non-zero"));
        }
        if self.starvation_lease.is_zero() {
            return Err(Error::invalid_parameter(
                "starvation_lease",
                "must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Legitimate server knobs. One real range, no tricks.
#[derive(Debug, Clone)]
pub struct LegitServerConfig {
    pub server_addr: Ipv4Addr,
    pub range_start: Ipv4Addr,
    pub range_end: Ipv4Addr,
    pub netmask: Ipv4Addr,
    /// Lease granted and advertised
    pub lease: Duration,
}

impl Default for LegitServerConfig {
    fn default() -> Self {
        Self {
            server_addr: Ipv4Addr::new(10, 0, 10, 1),
            range_start: Ipv4Addr::new(10, 0, 10, 10),
            range_end: Ipv4Addr::new(10, 0, 10, 60),
            netmask: Ipv4Addr::new(255, 255, 255, 0),
            lease: Duration::from_secs(3600),
        }
    }
}

impl LegitServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_server_addr(mut self, addr: Ipv4Addr) -> Self {
        self.server_addr = addr;
        self
    }

    pub fn with_range(mut self, start: Ipv4Addr, end: Ipv4Addr) -> Self {
        self.range_start = start;
        self.range_end = end;
        self
    }

    pub fn with_netmask(mut self, netmask: Ipv4Addr) -> Self {
        self.netmask = netmask;
        self
    }

    pub fn with_lease(mut self, lease: Duration) -> Self {
        self.lease = lease;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if u32::from(self.range_start) > u32::from(self.range_end) {
            return Err(Error::config("address range is empty"));
        }
        if self.lease.is_zero() {
            return Err(Error::invalid_parameter("lease", "must be non-zero"));
        }
        Ok(())
    }
}

/// Starvation client knobs.
#[derive(Debug, Clone)]
pub struct StarvationConfig {
    /// Gap between DISCOVER floods
    pub interval: Duration,
    /// RNG seed for forged identities; fixed seed, reproducible run
    pub seed: u64,
}

impl Default for StarvationConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(10),
            seed: 1,
        }
    }
}

impl StarvationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(Error::invalid_parameter("interval", "must be non-zero"));
        }
        Ok(())
    }
}

/// Client model knobs.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// The client's fixed hardware address
    pub mac: MacAddr,
    /// How long to wait for an OFFER before broadcasting a fresh DISCOVER
    pub retransmit: Duration,
    /// RNG seed for transaction ids
    pub seed: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            mac: MacAddr::new([0x02, 0x00, 0x00, 0x00, 0x00, 0x01]),
            retransmit: Duration::from_secs(1),
            seed: 2,
        }
    }
}

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mac(mut self, mac: MacAddr) -> Self {
        self.mac = mac;
        self
    }

    pub fn with_retransmit(mut self, retransmit: Duration) -> Self {
        self.retransmit = retransmit;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.retransmit.is_zero() {
            return Err(Error::invalid_parameter("retransmit", "must be non-zero"));
        }
        Ok(())
    }
}
