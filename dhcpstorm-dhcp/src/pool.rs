//! Rogue address pool
//!
//! An ordered free list over a growable real range, plus a fabricated
//! overflow range that is generated rather than tracked. The two ranges
//! never overlap: expansion refuses to cross the fake range start.

use std::collections::BTreeSet;
use std::net::Ipv4Addr;

use tracing::{debug, trace};

/// Free-address count below which the server attempts expansion.
pub const LOW_WATERMARK: usize = 10;

/// Free real addresses plus the fabricated-address cursor.
///
/// Invariant: every free-list member lies inside `real_start..=real_end`,
/// and an address is never both free and leased (callers route returns
/// through [`AddressPool::release`], which drops anything out of range).
#[derive(Debug, Clone)]
pub struct AddressPool {
    free: BTreeSet<Ipv4Addr>,
    real_start: Ipv4Addr,
    real_end: Ipv4Addr,
    fake_start: Ipv4Addr,
    fake_end: Ipv4Addr,
    /// Next fabricated address, kept per instance so two rogue servers
    /// never share a cursor
    fake_cursor: u32,
}

impl AddressPool {
    /// Build a pool with every real-range address free. Range geometry
    /// is validated by the owning config before this is called.
    pub fn new(
        real_start: Ipv4Addr,
        real_end: Ipv4Addr,
        fake_start: Ipv4Addr,
        fake_end: Ipv4Addr,
    ) -> Self {
        let free = (u32::from(real_start)..=u32::from(real_end))
            .map(Ipv4Addr::from)
            .collect();
        Self {
            free,
            real_start,
            real_end,
            fake_start,
            fake_end,
            fake_cursor: u32::from(fake_start),
        }
    }

    /// Pop the lowest free real address, or `None` when exhausted.
    pub fn allocate_real(&mut self) -> Option<Ipv4Addr> {
        let addr = self.free.pop_first();
        if let Some(addr) = addr {
            trace!(address = %addr, "allocated real address");
        }
        addr
    }

    /// Produce the next fabricated address. The cursor advances
    /// monotonically and wraps past the range end, so after a full wrap
    /// the same address can be handed to a second client. Fabricated
    /// addresses are unreachable by construction, so the collision is
    /// harmless and deliberately kept.
    pub fn allocate_fake(&mut self) -> Ipv4Addr {
        let addr = Ipv4Addr::from(self.fake_cursor);
        self.fake_cursor += 1;
        if self.fake_cursor > u32::from(self.fake_end) {
            self.fake_cursor = u32::from(self.fake_start);
        }
        trace!(address = %addr, "allocated fake address");
        addr
    }

    /// Grow the real range by `by` addresses. Refuses (and returns
    /// false) when the grown range would pass the fake range start.
    pub fn expand(&mut self, by: u32) -> bool {
        let new_end = match u32::from(self.real_end).checked_add(by) {
            Some(end) => end,
            None => {
                debug!(by, "expansion past the top of the address space, refusing");
                return false;
            }
        };
        if new_end > u32::from(self.fake_start) {
            debug!(by, "expansion would overlap fake range, refusing");
            return false;
        }
        for addr in (u32::from(self.real_end) + 1)..=new_end {
            self.free.insert(Ipv4Addr::from(addr));
        }
        self.real_end = Ipv4Addr::from(new_end);
        debug!(
            real_end = %self.real_end,
            size = self.real_range_size(),
            "expanded real pool"
        );
        true
    }

    /// Return an address to the free list. Addresses outside the current
    /// real range (fabricated ones included) are dropped silently.
    pub fn release(&mut self, addr: Ipv4Addr) {
        if self.in_real_range(addr) {
            self.free.insert(addr);
            trace!(address = %addr, "released");
        } else {
            trace!(address = %addr, "ignoring release outside real range");
        }
    }

    /// Remove a specific address from the free list if present. Used
    /// when a REQUEST names an address outright.
    pub fn claim(&mut self, addr: Ipv4Addr) -> bool {
        self.free.remove(&addr)
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    /// Current size of the real range, expansion included.
    pub fn real_range_size(&self) -> u32 {
        u32::from(self.real_end) - u32::from(self.real_start) + 1
    }

    pub fn real_end(&self) -> Ipv4Addr {
        self.real_end
    }

    pub fn in_real_range(&self, addr: Ipv4Addr) -> bool {
        (u32::from(self.real_start)..=u32::from(self.real_end)).contains(&u32::from(addr))
    }

    pub fn in_fake_range(&self, addr: Ipv4Addr) -> bool {
        (u32::from(self.fake_start)..=u32::from(self.fake_end)).contains(&u32::from(addr))
    }
}
