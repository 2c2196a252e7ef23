use std::sync::{Arc, PoisonError, RwLock};

use crate::train::Train;

/// The set of known trains. Read-mostly; trains are added through the
/// admin surface and never removed or resized.
pub struct TrainCatalog {
    trains: RwLock<Vec<Arc<Train>>>,
}

impl TrainCatalog {
    pub fn new() -> Self {
        Self {
            trains: RwLock::new(Vec::new()),
        }
    }

    /// Register a train. The route is normalized (trimmed, empty stops
    /// dropped) and must keep at least two stops; train numbers are
    /// unique case-insensitively.
    pub fn add_train(
        &self,
        train_id: &str,
        name: &str,
        route: Vec<String>,
        total_seats: usize,
    ) -> Result<Arc<Train>, CatalogError> {
        let route: Vec<String> = route
            .iter()
            .map(|stop| stop.trim().to_string())
            .filter(|stop| !stop.is_empty())
            .collect();
        if route.len() < 2 {
            return Err(CatalogError::RouteTooShort);
        }

        let mut trains = self.trains.write().unwrap_or_else(PoisonError::into_inner);
        if trains
            .iter()
            .any(|t| t.train_id().eq_ignore_ascii_case(train_id))
        {
            return Err(CatalogError::DuplicateTrain(train_id.to_string()));
        }

        let train = Arc::new(Train::new(train_id, name, route, total_seats));
        trains.push(Arc::clone(&train));
        Ok(train)
    }

    pub fn all_trains(&self) -> Vec<Arc<Train>> {
        self.trains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn find_train(&self, train_id: &str) -> Option<Arc<Train>> {
        self.trains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .find(|t| t.train_id().eq_ignore_ascii_case(train_id))
            .cloned()
    }

    /// Canonical seat identifier on a train, or None when either side is
    /// unknown.
    pub fn find_seat(&self, train_id: &str, seat_id: &str) -> Option<String> {
        self.find_train(train_id)?.registry().resolve(seat_id)
    }

    /// Trains stopping at `start` and later at `end`.
    pub fn search(&self, start: &str, end: &str) -> Vec<Arc<Train>> {
        self.trains
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|t| t.has_stops(start, end))
            .cloned()
            .collect()
    }
}

impl Default for TrainCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Train number already exists: {0}")]
    DuplicateTrain(String),

    #[error("A train route must contain at least two stops")]
    RouteTooShort,
}
