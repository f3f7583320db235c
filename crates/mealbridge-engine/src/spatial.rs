//! In-memory spatial projection of open donations.
//!
//! The index holds a derived `(id, coordinate)` view and is never
//! authoritative: [`DonationStore`](crate::store::DonationStore) keeps it
//! consistent by removing entries synchronously within every Open -> non-Open
//! transition. A linear scan under a read-write lock is plenty at food-rescue
//! scale; readers never observe a partially written entry.

use std::collections::HashMap;
use std::sync::RwLock;

use mealbridge_shared::{geo, Coordinate, DonationId};

#[derive(Debug, Clone, Copy)]
struct Entry {
    coordinate: Coordinate,
    seq: u64,
}

#[derive(Debug, Default)]
struct IndexInner {
    entries: HashMap<DonationId, Entry>,
    next_seq: u64,
}

/// Concurrent nearest-neighbor index over donation positions.
#[derive(Debug, Default)]
pub struct SpatialIndex {
    inner: RwLock<IndexInner>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or re-position) a donation. Insertion order is retained for
    /// unranked listings.
    pub fn insert(&self, id: DonationId, coordinate: Coordinate) {
        let mut inner = self.write();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(id, Entry { coordinate, seq });
    }

    /// Remove a donation from the index. Returns whether it was present.
    pub fn remove(&self, id: DonationId) -> bool {
        self.write().entries.remove(&id).is_some()
    }

    pub fn contains(&self, id: DonationId) -> bool {
        self.read().entries.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The `limit` entries nearest to `origin`, closest first, with
    /// distances in meters. Entries beyond `max_radius_m` are dropped.
    ///
    /// With no origin, entries come back in insertion order and without
    /// distances; callers must not read a ranking into that order.
    pub fn nearest(
        &self,
        origin: Option<Coordinate>,
        limit: usize,
        max_radius_m: Option<f64>,
    ) -> Vec<(DonationId, Option<f64>)> {
        let inner = self.read();

        match origin {
            Some(origin) => {
                let mut ranked: Vec<(DonationId, f64)> = inner
                    .entries
                    .iter()
                    .map(|(id, entry)| (*id, geo::distance_m(&origin, &entry.coordinate)))
                    .filter(|(_, d)| max_radius_m.map_or(true, |r| *d <= r))
                    .collect();
                ranked.sort_by(|a, b| a.1.total_cmp(&b.1));
                ranked.truncate(limit);
                ranked.into_iter().map(|(id, d)| (id, Some(d))).collect()
            }
            None => {
                let mut unranked: Vec<(DonationId, u64)> = inner
                    .entries
                    .iter()
                    .map(|(id, entry)| (*id, entry.seq))
                    .collect();
                unranked.sort_by_key(|(_, seq)| *seq);
                unranked.truncate(limit);
                unranked.into_iter().map(|(id, _)| (id, None)).collect()
            }
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, IndexInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, IndexInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coord(lat: f64, lng: f64) -> Coordinate {
        Coordinate::new(lat, lng)
    }

    #[test]
    fn nearest_orders_by_distance() {
        let index = SpatialIndex::new();
        let near = DonationId::new();
        let mid = DonationId::new();
        let far = DonationId::new();

        index.insert(far, coord(8.0, 3.0));
        index.insert(near, coord(6.01, 3.0));
        index.insert(mid, coord(6.5, 3.0));

        let got = index.nearest(Some(coord(6.0, 3.0)), 10, None);
        let ids: Vec<_> = got.iter().map(|(id, _)| *id).collect();
        assert_eq!(ids, vec![near, mid, far]);

        // Distances are present and increasing.
        let dists: Vec<f64> = got.iter().map(|(_, d)| d.unwrap()).collect();
        assert!(dists[0] < dists[1] && dists[1] < dists[2]);
    }

    #[test]
    fn limit_and_radius_apply() {
        let index = SpatialIndex::new();
        for i in 0..5 {
            index.insert(DonationId::new(), coord(6.0 + i as f64 * 0.1, 3.0));
        }

        assert_eq!(index.nearest(Some(coord(6.0, 3.0)), 2, None).len(), 2);

        // ~0.1 degrees of latitude is ~11 km; a 15 km radius keeps two.
        let within = index.nearest(Some(coord(6.0, 3.0)), 10, Some(15_000.0));
        assert_eq!(within.len(), 2);
    }

    #[test]
    fn removed_entries_never_come_back() {
        let index = SpatialIndex::new();
        let id = DonationId::new();
        index.insert(id, coord(6.1, 3.3));

        assert!(index.remove(id));
        assert!(!index.remove(id));

        for radius in [None, Some(1e9)] {
            let got = index.nearest(Some(coord(6.1, 3.3)), 100, radius);
            assert!(got.iter().all(|(got_id, _)| *got_id != id));
        }
        assert!(index.nearest(None, 100, None).is_empty());
    }

    #[test]
    fn unranked_listing_keeps_insertion_order() {
        let index = SpatialIndex::new();
        let first = DonationId::new();
        let second = DonationId::new();
        index.insert(first, coord(50.0, 8.0));
        index.insert(second, coord(6.0, 3.0));

        let got = index.nearest(None, 10, None);
        assert_eq!(got[0], (first, None));
        assert_eq!(got[1], (second, None));
    }

    #[test]
    fn zero_distance_at_own_position() {
        let index = SpatialIndex::new();
        let id = DonationId::new();
        index.insert(id, coord(6.1, 3.3));

        let got = index.nearest(Some(coord(6.1, 3.3)), 1, None);
        assert_eq!(got.len(), 1);
        assert!(got[0].1.unwrap() < 1e-6);
    }

    #[test]
    fn concurrent_readers_and_writers() {
        use std::sync::Arc;

        let index = Arc::new(SpatialIndex::new());
        let mut handles = Vec::new();

        for t in 0..4 {
            let index = Arc::clone(&index);
            handles.push(std::thread::spawn(move || {
                for i in 0..50 {
                    let id = DonationId::new();
                    index.insert(id, coord((t * 50 + i) as f64 * 0.001, 3.0));
                    // Every observed entry must carry a real distance.
                    for (_, d) in index.nearest(Some(coord(0.0, 3.0)), 20, None) {
                        assert!(d.unwrap().is_finite());
                    }
                    index.remove(id);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }
        assert!(index.is_empty());
    }
}
