//! Attacker heuristics
//!
//! A cheap proxy for starvation detection with no per-client rate
//! tracking: once the pool is mostly leased, unknown identities are
//! treated as attackers. Known-legitimate clients are exempt forever.
//! False positives under organic load spikes are accepted behavior.

use std::collections::HashSet;

use tracing::trace;

use dhcpstorm_core::MacAddr;

/// Leased fraction of the real range above which unknown clients are
/// suspected.
const PRESSURE_THRESHOLD: f64 = 0.8;

/// Append-only record of clients believed legitimate, plus the
/// pool-pressure test.
#[derive(Debug, Default)]
pub struct AttackerClassifier {
    legitimate: HashSet<MacAddr>,
}

impl AttackerClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify one inbound identity against the current pool state.
    ///
    /// `real_range_size` is the range size at classification time, so a
    /// later expansion raises the threshold for subsequent messages.
    pub fn is_suspected_attacker(
        &self,
        id: MacAddr,
        active_leases: usize,
        real_range_size: u32,
    ) -> bool {
        if self.legitimate.contains(&id) {
            return false;
        }
        active_leases as f64 > f64::from(real_range_size) * PRESSURE_THRESHOLD
    }

    /// Record `id` as legitimate; returns false when already present.
    pub fn mark_legitimate(&mut self, id: MacAddr) -> bool {
        let added = self.legitimate.insert(id);
        if added {
            trace!(chaddr = %id, "marked legitimate");
        }
        added
    }

    pub fn is_legitimate(&self, id: MacAddr) -> bool {
        self.legitimate.contains(&id)
    }

    pub fn legitimate_count(&self) -> usize {
        self.legitimate.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac(last: u8) -> MacAddr {
        MacAddr::new([0x02, 0, 0, 0, 0, last])
    }

    #[test]
    fn test_threshold_on_default_pool_size() {
        let classifier = AttackerClassifier::new();

        // 51 addresses: the cutoff sits at 40.8 leases, so 40 is still
        // fine and 41 crosses it.
        assert!(!classifier.is_suspected_attacker(mac(1), 40, 51));
        assert!(classifier.is_suspected_attacker(mac(1), 41, 51));
        assert!(classifier.is_suspected_attacker(mac(1), 51, 51));
    }

    #[test]
    fn test_low_pressure_is_never_suspect() {
        let classifier = AttackerClassifier::new();
        assert!(!classifier.is_suspected_attacker(mac(1), 0, 51));
        assert!(!classifier.is_suspected_attacker(mac(1), 10, 51));
    }

    #[test]
    fn test_legitimate_clients_are_never_reclassified() {
        let mut classifier = AttackerClassifier::new();
        assert!(classifier.mark_legitimate(mac(1)));

        // Full pressure, still not an attacker.
        assert!(!classifier.is_suspected_attacker(mac(1), 51, 51));
        // A different client at the same pressure is.
        assert!(classifier.is_suspected_attacker(mac(2), 51, 51));
    }

    #[test]
    fn test_mark_legitimate_is_idempotent() {
        let mut classifier = AttackerClassifier::new();
        assert!(classifier.mark_legitimate(mac(1)));
        assert!(!classifier.mark_legitimate(mac(1)));
        assert_eq!(classifier.legitimate_count(), 1);
    }

    #[test]
    fn test_expansion_raises_threshold() {
        let classifier = AttackerClassifier::new();
        // 41 leases cross the line for a 51-address range but not for
        // the expanded 101-address range.
        assert!(classifier.is_suspected_attacker(mac(1), 41, 51));
        assert!(!classifier.is_suspected_attacker(mac(1), 41, 101));
    }
}
