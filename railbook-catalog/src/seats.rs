use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

/// In-memory occupied/free projection for one train's seats.
///
/// Occupancy truth lives in the ticket store; this registry is a cache
/// rebuilt at startup and maintained incrementally after each committed
/// reservation or cancellation. The seat set is fixed at creation and
/// never resized.
#[derive(Debug)]
pub struct SeatRegistry {
    order: Vec<String>,
    occupied: RwLock<HashSet<String>>,
}

impl SeatRegistry {
    pub fn new(seat_ids: Vec<String>) -> Self {
        Self {
            order: seat_ids,
            occupied: RwLock::new(HashSet::new()),
        }
    }

    /// Seat identifiers in assignment order.
    pub fn seat_ids(&self) -> &[String] {
        &self.order
    }

    pub fn total_seats(&self) -> usize {
        self.order.len()
    }

    /// Canonical identifier for a seat, matched case-insensitively.
    pub fn resolve(&self, seat_id: &str) -> Option<String> {
        self.order
            .iter()
            .find(|s| s.eq_ignore_ascii_case(seat_id))
            .cloned()
    }

    pub fn is_occupied(&self, seat_id: &str) -> bool {
        match self.resolve(seat_id) {
            Some(canonical) => self.read().contains(&canonical),
            None => false,
        }
    }

    /// Mark a seat occupied. Returns false for a seat this train does not
    /// have.
    pub fn occupy(&self, seat_id: &str) -> bool {
        match self.resolve(seat_id) {
            Some(canonical) => {
                self.write().insert(canonical);
                true
            }
            None => false,
        }
    }

    /// Release a seat back to the pool. Returns false for an unknown seat.
    pub fn release(&self, seat_id: &str) -> bool {
        match self.resolve(seat_id) {
            Some(canonical) => {
                self.write().remove(&canonical);
                true
            }
            None => false,
        }
    }

    /// Drop all occupancy, ahead of a reconciliation replay.
    pub fn clear(&self) {
        self.write().clear();
    }

    pub fn occupied_count(&self) -> usize {
        self.read().len()
    }

    pub fn available_count(&self) -> usize {
        self.order.len() - self.occupied_count()
    }

    /// Free seats in assignment order.
    pub fn available_seats(&self) -> Vec<String> {
        let occupied = self.read();
        self.order
            .iter()
            .filter(|s| !occupied.contains(*s))
            .cloned()
            .collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashSet<String>> {
        self.occupied.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashSet<String>> {
        self.occupied.write().unwrap_or_else(PoisonError::into_inner)
    }
}
