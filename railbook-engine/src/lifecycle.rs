use std::fmt;
use std::sync::Arc;

use chrono::Local;
use railbook_catalog::{Train, TrainCatalog};
use railbook_core::{
    AuditAction, AuditTrail, BookingError, TicketRecord, TicketStatus, TicketStore,
};
use tracing::warn;

use crate::audit::record_best_effort;

/// A ticket resolved back to its live train. The persisted record keeps
/// plain identifiers; the catalog supplies the object at read time.
#[derive(Debug, Clone)]
pub struct Ticket {
    pub record: TicketRecord,
    pub train: Arc<Train>,
}

impl Ticket {
    pub fn pnr(&self) -> &str {
        &self.record.pnr
    }

    pub fn seat_id(&self) -> &str {
        &self.record.seat_id
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PNR {} | {} | {} ({}) | seat {} | {}",
            self.record.pnr,
            self.record.passenger,
            self.train.name(),
            self.train.train_id(),
            self.record.seat_id,
            self.record.travel_date
        )
    }
}

/// Cancellation and passenger-facing ticket queries.
pub struct TicketLifecycle {
    store: Arc<dyn TicketStore>,
    audit: Arc<dyn AuditTrail>,
    catalog: Arc<TrainCatalog>,
}

impl TicketLifecycle {
    pub fn new(
        store: Arc<dyn TicketStore>,
        audit: Arc<dyn AuditTrail>,
        catalog: Arc<TrainCatalog>,
    ) -> Self {
        Self {
            store,
            audit,
            catalog,
        }
    }

    /// Transition a ticket ACTIVE -> CANCELLED and release its seat.
    ///
    /// Idempotent from the caller's perspective: an unknown locator or an
    /// already-cancelled ticket reports false, never an error.
    pub async fn cancel(&self, pnr: &str) -> Result<bool, BookingError> {
        let Some(record) = self.store.find_by_pnr(pnr).await? else {
            return Ok(false);
        };
        if !record.is_active() {
            return Ok(false);
        }
        if !self
            .store
            .update_status(&record.pnr, TicketStatus::Active, TicketStatus::Cancelled)
            .await?
        {
            // Lost the race against a concurrent cancel.
            return Ok(false);
        }

        match self.catalog.find_train(&record.train_id) {
            Some(train) => match self.store.list_active().await {
                Ok(active) => {
                    // A reservation may have re-taken the seat between the
                    // status flip above and this projection update; release
                    // only if no active row still holds it.
                    let retaken = active.iter().any(|r| {
                        r.train_id.eq_ignore_ascii_case(&record.train_id)
                            && r.seat_id.eq_ignore_ascii_case(&record.seat_id)
                    });
                    if !retaken {
                        train.registry().release(&record.seat_id);
                    }
                }
                Err(err) => {
                    warn!(
                        pnr = %record.pnr,
                        %err,
                        "could not confirm the seat is free, leaving occupancy to reconciliation"
                    );
                }
            },
            None => {
                warn!(
                    pnr = %record.pnr,
                    train = %record.train_id,
                    "cancelled ticket references an unknown train"
                );
            }
        }

        let details = format!("Cancelled ticket PNR {}", record.pnr);
        record_best_effort(
            self.audit.as_ref(),
            &record.passenger,
            &record.pnr,
            AuditAction::Cancel,
            &details,
        )
        .await;
        Ok(true)
    }

    /// ACTIVE tickets with a travel date not before today, for the given
    /// passenger or booking agent.
    pub async fn find_active(&self, identity: &str) -> Result<Vec<Ticket>, BookingError> {
        let today = Local::now().date_naive();
        let records = self
            .store
            .list_by_passenger(identity, Some(TicketStatus::Active))
            .await?;
        Ok(records
            .into_iter()
            .filter(|r| r.travel_date >= today)
            .filter_map(|r| self.resolve(r))
            .collect())
    }

    /// ACTIVE tickets whose travel date is strictly before today.
    pub async fn find_past(&self, identity: &str) -> Result<Vec<Ticket>, BookingError> {
        let today = Local::now().date_naive();
        let records = self
            .store
            .list_by_passenger(identity, Some(TicketStatus::Active))
            .await?;
        Ok(records
            .into_iter()
            .filter(|r| r.travel_date < today)
            .filter_map(|r| self.resolve(r))
            .collect())
    }

    /// CANCELLED tickets regardless of travel date.
    pub async fn find_cancelled(&self, identity: &str) -> Result<Vec<Ticket>, BookingError> {
        let records = self
            .store
            .list_by_passenger(identity, Some(TicketStatus::Cancelled))
            .await?;
        Ok(records
            .into_iter()
            .filter_map(|r| self.resolve(r))
            .collect())
    }

    /// Resolve a single ticket for display.
    pub async fn find_by_pnr(&self, pnr: &str) -> Result<Option<Ticket>, BookingError> {
        let Some(record) = self.store.find_by_pnr(pnr).await? else {
            return Ok(None);
        };
        Ok(self.resolve(record))
    }

    /// Attach the live train, skipping rows whose train or seat no longer
    /// resolves. Data drift is logged, never surfaced to the caller.
    fn resolve(&self, record: TicketRecord) -> Option<Ticket> {
        match self.catalog.find_train(&record.train_id) {
            Some(train) if train.registry().resolve(&record.seat_id).is_some() => {
                Some(Ticket { record, train })
            }
            Some(_) => {
                warn!(
                    pnr = %record.pnr,
                    seat = %record.seat_id,
                    "could not resolve seat for ticket, excluding from results"
                );
                None
            }
            None => {
                warn!(
                    pnr = %record.pnr,
                    train = %record.train_id,
                    "could not resolve train for ticket, excluding from results"
                );
                None
            }
        }
    }
}
