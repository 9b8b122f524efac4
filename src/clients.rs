//! Target Client Registry
//!
//! Tracks stations seen communicating with the current target, for
//! unicast (smart) deauthentication bursts. Fixed capacity with
//! least-recently-seen eviction so long sessions stay bounded.

use std::time::Instant;

use crate::ieee80211::MacAddr;

/// A client observed talking to the target
#[derive(Debug, Clone, Copy)]
pub struct ClientRecord {
    pub mac: MacAddr,
    /// Last observed signal strength
    pub rssi: i8,
    pub last_seen: Instant,
}

/// Set of known target clients, deduplicated by address
#[derive(Debug)]
pub struct ClientRegistry {
    records: Vec<ClientRecord>,
    capacity: usize,
}

impl ClientRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    /// Insert or refresh a client. Idempotent on address; when the
    /// registry is full the least-recently-seen record is evicted.
    pub fn upsert(&mut self, mac: MacAddr, rssi: i8, now: Instant) {
        if let Some(rec) = self.records.iter_mut().find(|r| r.mac == mac) {
            rec.rssi = rssi;
            rec.last_seen = now;
            return;
        }

        if self.records.len() >= self.capacity {
            if let Some(oldest) = self
                .records
                .iter()
                .enumerate()
                .min_by_key(|(_, r)| r.last_seen)
                .map(|(i, _)| i)
            {
                self.records.remove(oldest);
            }
        }

        self.records.push(ClientRecord {
            mac,
            rssi,
            last_seen: now,
        });
    }

    /// All known clients in insertion order
    pub fn all(&self) -> &[ClientRecord] {
        &self.records
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn mac(last: u8) -> MacAddr {
        MacAddr::new([0x11, 0x12, 0x13, 0x14, 0x15, last])
    }

    #[test]
    fn test_upsert_idempotent_on_address() {
        let mut reg = ClientRegistry::new(8);
        let t0 = Instant::now();

        reg.upsert(mac(1), -70, t0);
        reg.upsert(mac(1), -55, t0 + Duration::from_secs(1));

        assert_eq!(reg.len(), 1);
        assert_eq!(reg.all()[0].rssi, -55);
        assert_eq!(reg.all()[0].last_seen, t0 + Duration::from_secs(1));
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut reg = ClientRegistry::new(8);
        let t0 = Instant::now();

        for i in 0..4 {
            reg.upsert(mac(i), -60, t0 + Duration::from_millis(i as u64));
        }
        // Refreshing an earlier client must not reorder
        reg.upsert(mac(0), -50, t0 + Duration::from_secs(1));

        let order: Vec<u8> = reg.all().iter().map(|r| r.mac.as_bytes()[5]).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_lru_eviction_when_full() {
        let mut reg = ClientRegistry::new(3);
        let t0 = Instant::now();

        reg.upsert(mac(1), -60, t0);
        reg.upsert(mac(2), -60, t0 + Duration::from_secs(1));
        reg.upsert(mac(3), -60, t0 + Duration::from_secs(2));

        // Refresh the oldest so mac(2) becomes least recently seen
        reg.upsert(mac(1), -60, t0 + Duration::from_secs(3));
        reg.upsert(mac(4), -60, t0 + Duration::from_secs(4));

        assert_eq!(reg.len(), 3);
        let present: Vec<u8> = reg.all().iter().map(|r| r.mac.as_bytes()[5]).collect();
        assert!(!present.contains(&2));
        assert!(present.contains(&1));
        assert!(present.contains(&4));
    }

    #[test]
    fn test_clear() {
        let mut reg = ClientRegistry::new(4);
        reg.upsert(mac(1), -60, Instant::now());
        reg.clear();
        assert!(reg.is_empty());
    }
}
