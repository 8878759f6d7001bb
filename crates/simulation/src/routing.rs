//! Distance-vector routing table.
//!
//! Minimal DV: no split-horizon, no poisoned reverse, no count-to-infinity
//! mitigation. Stale state is bounded by the 1 Hz topology refresh, which
//! purges every route whose next hop is no longer a current neighbour
//! before re-advertising.

use leosim_types::{Address, RouteEntry, RoutingAdvertisement};
use std::collections::{BTreeMap, BTreeSet};
use tracing::trace;

/// Forwarding table: destination → (next hop, cost). At most one entry per
/// destination; every next hop is a current neighbour.
#[derive(Debug, Default, Clone)]
pub struct RoutingTable {
    entries: BTreeMap<Address, RouteEntry>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, destination: Address) -> Option<&RouteEntry> {
        self.entries.get(&destination)
    }

    pub fn next_hop(&self, destination: Address) -> Option<Address> {
        self.entries.get(&destination).map(|entry| entry.next_hop)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RouteEntry> {
        self.entries.values()
    }

    /// Refresh after a neighbour-list rebuild: drop every entry whose next
    /// hop vanished from the neighbour set, then (re)install the direct
    /// route to each current neighbour at its fresh distance.
    pub fn local_update<I>(&mut self, neighbors: I)
    where
        I: IntoIterator<Item = (Address, f64)> + Clone,
    {
        let current: BTreeSet<Address> = neighbors
            .clone()
            .into_iter()
            .map(|(address, _)| address)
            .collect();
        self.entries
            .retain(|_, entry| current.contains(&entry.next_hop));

        for (address, distance_km) in neighbors {
            self.insert_local(address, distance_km);
        }
    }

    /// Install the direct route to a neighbour.
    pub fn insert_local(&mut self, neighbor: Address, distance_km: f64) {
        self.entries.insert(
            neighbor,
            RouteEntry {
                destination: neighbor,
                next_hop: neighbor,
                cost_km: distance_km,
            },
        );
    }

    /// Remove every route through the given next hop (used when a dynamic
    /// link is torn down between refreshes).
    pub fn purge_next_hop(&mut self, next_hop: Address) {
        self.entries.retain(|_, entry| entry.next_hop != next_hop);
    }

    /// Build the advertisement for one broadcast round: the full table plus
    /// the self-entry at cost zero.
    pub fn advertisement(&self, self_addr: Address) -> RoutingAdvertisement {
        let mut entries: Vec<(Address, f64)> = self
            .entries
            .values()
            .map(|entry| (entry.destination, entry.cost_km))
            .collect();
        entries.push((self_addr, 0.0));
        RoutingAdvertisement {
            source: self_addr,
            entries,
        }
    }

    /// Merge an advertisement received from neighbour `advert.source` over
    /// a link of cost `link_cost_km`. A candidate replaces an existing
    /// route only when strictly cheaper; ties keep the older route, which
    /// avoids oscillation between equal-cost paths. Returns the number of
    /// entries inserted or improved.
    pub fn merge(
        &mut self,
        self_addr: Address,
        advert: &RoutingAdvertisement,
        link_cost_km: f64,
    ) -> usize {
        let mut changed = 0;
        for &(destination, cost_km) in &advert.entries {
            if destination == self_addr {
                continue;
            }
            let total = cost_km + link_cost_km;
            match self.entries.get(&destination) {
                Some(existing) if total >= existing.cost_km => {}
                _ => {
                    trace!(
                        %destination,
                        via = %advert.source,
                        cost_km = total,
                        "route installed"
                    );
                    self.entries.insert(
                        destination,
                        RouteEntry {
                            destination,
                            next_hop: advert.source,
                            cost_km: total,
                        },
                    );
                    changed += 1;
                }
            }
        }
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u32) -> Address {
        Address(n)
    }

    #[test]
    fn local_update_installs_direct_routes() {
        let mut table = RoutingTable::new();
        table.local_update(vec![(addr(2), 500.0), (addr(3), 700.0)]);

        assert_eq!(table.len(), 2);
        let entry = table.get(addr(2)).unwrap();
        assert_eq!(entry.next_hop, addr(2));
        assert_eq!(entry.cost_km, 500.0);
    }

    #[test]
    fn local_update_evicts_routes_through_lost_neighbors() {
        let mut table = RoutingTable::new();
        table.local_update(vec![(addr(2), 500.0)]);
        table.merge(
            addr(1),
            &RoutingAdvertisement {
                source: addr(2),
                entries: vec![(addr(4), 600.0)],
            },
            500.0,
        );
        assert!(table.get(addr(4)).is_some());

        // Neighbour 2 goes out of range: both its direct route and the
        // learned route through it must disappear.
        table.local_update(vec![(addr(3), 800.0)]);
        assert!(table.get(addr(2)).is_none());
        assert!(table.get(addr(4)).is_none());
        assert!(table.get(addr(3)).is_some());
    }

    #[test]
    fn merge_inserts_and_strictly_improves() {
        let mut table = RoutingTable::new();
        table.local_update(vec![(addr(2), 500.0), (addr(3), 2000.0)]);

        let advert = RoutingAdvertisement {
            source: addr(2),
            entries: vec![(addr(2), 0.0), (addr(3), 400.0), (addr(4), 600.0)],
        };
        let changed = table.merge(addr(1), &advert, 500.0);

        // 3 improves (900 < 2000), 4 is new, 2 does not (500 >= 500).
        assert_eq!(changed, 2);
        let via_two = table.get(addr(3)).unwrap();
        assert_eq!(via_two.next_hop, addr(2));
        assert_eq!(via_two.cost_km, 900.0);
        assert_eq!(table.get(addr(4)).unwrap().cost_km, 1100.0);
        assert_eq!(table.get(addr(2)).unwrap().next_hop, addr(2));
    }

    #[test]
    fn merge_monotonically_decreases_cost() {
        let mut table = RoutingTable::new();
        table.local_update(vec![(addr(2), 500.0), (addr(5), 300.0)]);

        table.merge(
            addr(1),
            &RoutingAdvertisement {
                source: addr(2),
                entries: vec![(addr(9), 1000.0)],
            },
            500.0,
        );
        let before = table.get(addr(9)).unwrap().cost_km;

        table.merge(
            addr(1),
            &RoutingAdvertisement {
                source: addr(5),
                entries: vec![(addr(9), 200.0)],
            },
            300.0,
        );
        let after = table.get(addr(9)).unwrap();

        assert!(after.cost_km < before);
        assert_eq!(after.next_hop, addr(5));
    }

    #[test]
    fn ties_keep_the_older_route() {
        let mut table = RoutingTable::new();
        table.local_update(vec![(addr(2), 500.0), (addr(5), 500.0)]);

        table.merge(
            addr(1),
            &RoutingAdvertisement {
                source: addr(2),
                entries: vec![(addr(9), 700.0)],
            },
            500.0,
        );
        table.merge(
            addr(1),
            &RoutingAdvertisement {
                source: addr(5),
                entries: vec![(addr(9), 700.0)],
            },
            500.0,
        );

        assert_eq!(table.get(addr(9)).unwrap().next_hop, addr(2));
    }

    #[test]
    fn self_entries_are_ignored() {
        let mut table = RoutingTable::new();
        table.local_update(vec![(addr(2), 500.0)]);
        table.merge(
            addr(1),
            &RoutingAdvertisement {
                source: addr(2),
                entries: vec![(addr(1), 0.0)],
            },
            500.0,
        );
        assert!(table.get(addr(1)).is_none());
    }

    #[test]
    fn advertisement_carries_full_table_and_self_entry() {
        let mut table = RoutingTable::new();
        table.local_update(vec![(addr(2), 500.0), (addr(3), 700.0)]);

        let advert = table.advertisement(addr(1));
        assert_eq!(advert.source, addr(1));
        assert_eq!(advert.entries.len(), 3);
        assert!(advert.entries.contains(&(addr(1), 0.0)));
        assert!(advert.entries.contains(&(addr(2), 500.0)));
    }

    #[test]
    fn purge_next_hop_removes_direct_and_learned() {
        let mut table = RoutingTable::new();
        table.local_update(vec![(addr(2), 500.0), (addr(3), 700.0)]);
        table.merge(
            addr(1),
            &RoutingAdvertisement {
                source: addr(2),
                entries: vec![(addr(8), 100.0)],
            },
            500.0,
        );

        table.purge_next_hop(addr(2));
        assert!(table.get(addr(2)).is_none());
        assert!(table.get(addr(8)).is_none());
        assert!(table.get(addr(3)).is_some());
    }
}
