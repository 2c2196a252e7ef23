use serde::Serialize;

use crate::seats::SeatRegistry;

/// A scheduled train: immutable identity and route, plus the seat
/// registry it exclusively owns. Seats are created once as `S1..Sn`.
#[derive(Debug)]
pub struct Train {
    train_id: String,
    name: String,
    route: Vec<String>,
    registry: SeatRegistry,
}

impl Train {
    pub fn new(train_id: &str, name: &str, route: Vec<String>, total_seats: usize) -> Self {
        let seat_ids = (1..=total_seats).map(|i| format!("S{i}")).collect();
        Self {
            train_id: train_id.to_string(),
            name: name.to_string(),
            route,
            registry: SeatRegistry::new(seat_ids),
        }
    }

    pub fn train_id(&self) -> &str {
        &self.train_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn route(&self) -> &[String] {
        &self.route
    }

    pub fn registry(&self) -> &SeatRegistry {
        &self.registry
    }

    pub fn total_seats(&self) -> usize {
        self.registry.total_seats()
    }

    pub fn booked_seat_count(&self) -> usize {
        self.registry.occupied_count()
    }

    pub fn available_seat_count(&self) -> usize {
        self.registry.available_count()
    }

    /// Whether this train stops at `start` and later at `end`. Stop names
    /// are trimmed and matched case-insensitively; the first occurrence of
    /// each wins.
    pub fn has_stops(&self, start: &str, end: &str) -> bool {
        let start = start.trim();
        let end = end.trim();
        if start.is_empty() || end.is_empty() {
            return false;
        }

        let position = |name: &str| {
            self.route
                .iter()
                .position(|stop| stop.trim().eq_ignore_ascii_case(name))
        };
        match (position(start), position(end)) {
            (Some(s), Some(e)) => s < e,
            _ => false,
        }
    }

    pub fn summary(&self) -> TrainSummary {
        TrainSummary {
            train_id: self.train_id.clone(),
            name: self.name.clone(),
            route: self.route.clone(),
            total_seats: self.total_seats(),
            available_seats: self.available_seat_count(),
        }
    }
}

/// Read-only snapshot of a train for display and listings.
#[derive(Debug, Clone, Serialize)]
pub struct TrainSummary {
    pub train_id: String,
    pub name: String,
    pub route: Vec<String>,
    pub total_seats: usize,
    pub available_seats: usize,
}
