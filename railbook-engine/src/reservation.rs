use std::sync::Arc;

use chrono::NaiveDate;
use railbook_catalog::{Train, TrainCatalog};
use railbook_core::{
    pnr, validate, AuditAction, AuditTrail, BookingError, ReservationTx, StoreError, TicketRecord,
    TicketStore,
};
use tracing::{info, warn};

use crate::audit::record_best_effort;
use crate::lifecycle::Ticket;

/// Default bound on locator regeneration when the store reports a
/// duplicate key on insert.
pub const DEFAULT_PNR_ATTEMPTS: u32 = 5;

/// Atomic multi-seat reservation against the ticket store.
///
/// Either every requested seat is booked and flipped occupied, or none
/// are. Mutual exclusion is delegated to the store's train-scoped
/// transaction; the registry is only touched after a successful commit,
/// so a failed attempt leaves both layers untouched.
pub struct ReservationEngine {
    store: Arc<dyn TicketStore>,
    audit: Arc<dyn AuditTrail>,
    catalog: Arc<TrainCatalog>,
    pnr_attempts: u32,
}

impl ReservationEngine {
    pub fn new(
        store: Arc<dyn TicketStore>,
        audit: Arc<dyn AuditTrail>,
        catalog: Arc<TrainCatalog>,
    ) -> Self {
        Self {
            store,
            audit,
            catalog,
            pnr_attempts: DEFAULT_PNR_ATTEMPTS,
        }
    }

    /// Override the locator retry bound, normally wired from
    /// `BookingRules` in the store configuration.
    pub fn with_pnr_attempts(mut self, attempts: u32) -> Self {
        self.pnr_attempts = attempts.max(1);
        self
    }

    /// Reserve one seat per passenger on the given train and date.
    ///
    /// Seats are assigned deterministically: the first free seats in
    /// identifier order, one per passenger in input order. `booked_by` is
    /// the identity placing the booking; it is recorded on a ticket only
    /// when it differs from that ticket's passenger (an agent booking on
    /// someone else's behalf).
    pub async fn reserve(
        &self,
        train_id: &str,
        travel_date: &str,
        passengers: &[String],
        booked_by: &str,
    ) -> Result<Vec<Ticket>, BookingError> {
        let date = validate::parse_travel_date(travel_date)?;
        if passengers.is_empty() {
            return Err(BookingError::EmptyRequest);
        }
        let train = self
            .catalog
            .find_train(train_id)
            .ok_or_else(|| BookingError::UnknownTrain(train_id.to_string()))?;

        let mut tx = self.store.begin_exclusive(train.train_id()).await?;
        let created = match self
            .allocate(tx.as_mut(), &train, date, passengers, booked_by)
            .await
        {
            Ok(created) => created,
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(%rollback_err, "rollback after failed reservation also failed");
                }
                return Err(err);
            }
        };
        tx.commit().await?;

        // Registry projection only after the rows are durable.
        for record in &created {
            train.registry().occupy(&record.seat_id);
        }
        for record in &created {
            let details = format!(
                "Booked seat {} on train {} for user {}",
                record.seat_id, record.train_id, record.passenger
            );
            record_best_effort(
                self.audit.as_ref(),
                &record.passenger,
                &record.pnr,
                AuditAction::Book,
                &details,
            )
            .await;
        }
        info!(
            train = %train.train_id(),
            date = %date,
            seats = created.len(),
            "reservation committed"
        );

        Ok(created
            .into_iter()
            .map(|record| Ticket {
                record,
                train: Arc::clone(&train),
            })
            .collect())
    }

    /// The locked read-pool-and-insert sequence. Runs entirely inside the
    /// exclusive transaction; any error aborts the whole batch.
    async fn allocate(
        &self,
        tx: &mut dyn ReservationTx,
        train: &Train,
        date: NaiveDate,
        passengers: &[String],
        booked_by: &str,
    ) -> Result<Vec<TicketRecord>, BookingError> {
        let active = tx.active_seat_ids().await?;
        let pool: Vec<&String> = train
            .registry()
            .seat_ids()
            .iter()
            .filter(|seat| !active.iter().any(|taken| taken.eq_ignore_ascii_case(seat)))
            .collect();

        if pool.len() < passengers.len() {
            return Err(BookingError::InsufficientSeats {
                requested: passengers.len(),
                available: pool.len(),
            });
        }

        let mut created = Vec::with_capacity(passengers.len());
        for (passenger, seat_id) in passengers.iter().zip(pool) {
            let record = self
                .insert_with_fresh_locator(tx, passenger, booked_by, train.train_id(), seat_id, date)
                .await?;
            created.push(record);
        }
        Ok(created)
    }

    async fn insert_with_fresh_locator(
        &self,
        tx: &mut dyn ReservationTx,
        passenger: &str,
        booked_by: &str,
        train_id: &str,
        seat_id: &str,
        date: NaiveDate,
    ) -> Result<TicketRecord, BookingError> {
        let agent = (!booked_by.eq_ignore_ascii_case(passenger)).then_some(booked_by);
        for attempt in 1..=self.pnr_attempts {
            let record = TicketRecord::new(
                pnr::generate(),
                passenger,
                agent,
                train_id,
                seat_id,
                date,
            );
            match tx.insert_ticket(&record).await {
                Ok(()) => return Ok(record),
                Err(StoreError::DuplicateLocator(dup)) => {
                    warn!(locator = %dup, attempt, "locator collision on insert, regenerating");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Err(BookingError::LocatorConflict(self.pnr_attempts))
    }
}
