//! Lease bookkeeping
//!
//! One record per client identity, decremented by the owning server's
//! 1-second sweep. Expiry hands addresses back through a release sink so
//! the table works for both the rogue pool and the legitimate server's
//! plain free list.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::time::Duration;

use tracing::{debug, trace};

use dhcpstorm_core::MacAddr;

/// The expiry sweep quantum: one simulated second.
pub const TICK: Duration = Duration::from_secs(1);

/// A granted address and the time left on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lease {
    pub address: Ipv4Addr,
    pub remaining: Duration,
}

/// Client identity to lease mapping. At most one record per identity;
/// inserting again overwrites.
#[derive(Debug, Default)]
pub struct LeaseTable {
    leases: HashMap<MacAddr, Lease>,
}

impl LeaseTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The idempotency primitive: an existing lease short-circuits any
    /// new allocation, so a client can never hold two addresses.
    pub fn lookup(&self, id: MacAddr) -> Option<Ipv4Addr> {
        self.leases.get(&id).map(|lease| lease.address)
    }

    pub fn get(&self, id: MacAddr) -> Option<&Lease> {
        self.leases.get(&id)
    }

    /// Create or overwrite the lease for `id`.
    pub fn insert(&mut self, id: MacAddr, address: Ipv4Addr, duration: Duration) {
        trace!(chaddr = %id, address = %address, remaining = ?duration, "lease recorded");
        self.leases.insert(
            id,
            Lease {
                address,
                remaining: duration,
            },
        );
    }

    pub fn contains(&self, id: MacAddr) -> bool {
        self.leases.contains_key(&id)
    }

    pub fn active_count(&self) -> usize {
        self.leases.len()
    }

    /// Addresses currently under lease, in no particular order.
    pub fn leased_addresses(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
        self.leases.values().map(|lease| lease.address)
    }

    /// One expiry sweep: decrement every record by [`TICK`] and remove
    /// the ones that hit zero, feeding their addresses to `release`.
    /// Expired identities are collected first, then removed, so no
    /// record is skipped mid-iteration.
    pub fn tick<F>(&mut self, mut release: F)
    where
        F: FnMut(Ipv4Addr),
    {
        let mut expired = Vec::new();
        for (id, lease) in self.leases.iter_mut() {
            lease.remaining = lease.remaining.saturating_sub(TICK);
            if lease.remaining.is_zero() {
                expired.push(*id);
            }
        }
        if expired.is_empty() {
            return;
        }
        debug!(expired = expired.len(), "lease sweep");
        for id in expired {
            if let Some(lease) = self.leases.remove(&id) {
                trace!(chaddr = %id, address = %lease.address, "lease expired");
                release(lease.address);
            }
        }
    }

    /// Drop every record, feeding each address to `release`. Used on
    /// server stop so a restart begins from a full pool.
    pub fn release_all<F>(&mut self, mut release: F)
    where
        F: FnMut(Ipv4Addr),
    {
        for (_, lease) in self.leases.drain() {
            release(lease.address);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::AddressPool;

    fn mac(last: u8) -> MacAddr {
        MacAddr::new([0x02, 0, 0, 0, 0, last])
    }

    fn addr(last: u8) -> Ipv4Addr {
        Ipv4Addr::new(10, 0, 0, last)
    }

    #[test]
    fn test_lookup_and_insert() {
        let mut table = LeaseTable::new();
        assert_eq!(table.lookup(mac(1)), None);

        table.insert(mac(1), addr(100), Duration::from_secs(10));
        assert_eq!(table.lookup(mac(1)), Some(addr(100)));
        assert!(table.contains(mac(1)));
        assert_eq!(table.active_count(), 1);
    }

    #[test]
    fn test_insert_overwrites_single_record() {
        let mut table = LeaseTable::new();
        table.insert(mac(1), addr(100), Duration::from_secs(10));
        table.insert(mac(1), addr(101), Duration::from_secs(99));

        assert_eq!(table.active_count(), 1);
        assert_eq!(table.lookup(mac(1)), Some(addr(101)));
        assert_eq!(
            table.get(mac(1)).unwrap().remaining,
            Duration::from_secs(99)
        );
    }

    #[test]
    fn test_expiry_after_exactly_d_ticks() {
        let mut table = LeaseTable::new();
        table.insert(mac(1), addr(100), Duration::from_secs(3));

        let mut released = Vec::new();
        table.tick(|a| released.push(a));
        table.tick(|a| released.push(a));
        // Two ticks in: still held, one second left.
        assert!(released.is_empty());
        assert_eq!(
            table.get(mac(1)).unwrap().remaining,
            Duration::from_secs(1)
        );

        table.tick(|a| released.push(a));
        assert_eq!(released, vec![addr(100)]);
        assert!(!table.contains(mac(1)));
    }

    #[test]
    fn test_simultaneous_expiries_all_removed() {
        let mut table = LeaseTable::new();
        for i in 0..10 {
            table.insert(mac(i), addr(100 + i), Duration::from_secs(1));
        }

        let mut released = Vec::new();
        table.tick(|a| released.push(a));

        assert_eq!(released.len(), 10);
        assert_eq!(table.active_count(), 0);
    }

    #[test]
    fn test_expired_address_is_allocatable_again() {
        let mut pool = AddressPool::new(addr(100), addr(100), addr(201), addr(254));
        let mut table = LeaseTable::new();

        let a = pool.allocate_real().unwrap();
        table.insert(mac(1), a, Duration::from_secs(2));
        assert_eq!(pool.free_count(), 0);

        table.tick(|x| pool.release(x));
        assert_eq!(pool.allocate_real(), None);

        table.tick(|x| pool.release(x));
        assert_eq!(pool.allocate_real(), Some(a));
    }

    #[test]
    fn test_fake_lease_expiry_never_pollutes_free_list() {
        let mut pool = AddressPool::new(addr(100), addr(101), addr(201), addr(254));
        let mut table = LeaseTable::new();

        let fake = pool.allocate_fake();
        table.insert(mac(1), fake, Duration::from_secs(1));

        let before = pool.free_count();
        table.tick(|x| pool.release(x));
        assert_eq!(pool.free_count(), before);
    }

    #[test]
    fn test_release_all_refills_pool() {
        let mut pool = AddressPool::new(addr(100), addr(102), addr(201), addr(254));
        let mut table = LeaseTable::new();

        for i in 0..3 {
            let a = pool.allocate_real().unwrap();
            table.insert(mac(i), a, Duration::from_secs(100));
        }
        assert_eq!(pool.free_count(), 0);

        table.release_all(|x| pool.release(x));
        assert_eq!(table.active_count(), 0);
        assert_eq!(pool.free_count(), 3);
    }
}
