use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Days, Local, NaiveDate};
use railbook_catalog::TrainCatalog;
use railbook_core::{
    AuditAction, BookingError, ReservationTx, StoreError, TicketRecord, TicketStatus, TicketStore,
};
use railbook_engine::{reconcile, ReservationEngine, TicketLifecycle};
use railbook_store::{MemoryAuditTrail, MemoryTicketStore};

struct Fixture {
    engine: Arc<ReservationEngine>,
    lifecycle: TicketLifecycle,
    store: MemoryTicketStore,
    audit: MemoryAuditTrail,
    catalog: Arc<TrainCatalog>,
}

fn fixture(seats: usize) -> Fixture {
    let catalog = Arc::new(TrainCatalog::new());
    catalog
        .add_train(
            "T1",
            "City Express",
            vec!["Mumbai".into(), "Pune".into(), "Delhi".into()],
            seats,
        )
        .unwrap();

    let store = MemoryTicketStore::new();
    let audit = MemoryAuditTrail::new();
    let engine = Arc::new(ReservationEngine::new(
        Arc::new(store.clone()),
        Arc::new(audit.clone()),
        Arc::clone(&catalog),
    ));
    let lifecycle = TicketLifecycle::new(
        Arc::new(store.clone()),
        Arc::new(audit.clone()),
        Arc::clone(&catalog),
    );
    Fixture {
        engine,
        lifecycle,
        store,
        audit,
        catalog,
    }
}

fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

#[tokio::test]
async fn books_first_free_seats_in_order() {
    let fx = fixture(3);
    let tickets = fx
        .engine
        .reserve("T1", "2030-01-01", &names(&["alice", "bob"]), "alice")
        .await
        .unwrap();

    assert_eq!(tickets.len(), 2);
    assert_eq!(tickets[0].record.passenger, "alice");
    assert_eq!(tickets[0].seat_id(), "S1");
    assert_eq!(tickets[1].record.passenger, "bob");
    assert_eq!(tickets[1].seat_id(), "S2");

    let train = fx.catalog.find_train("T1").unwrap();
    assert!(!train.registry().is_occupied("S3"));
    assert_eq!(train.available_seat_count(), 1);

    let book_entries: Vec<_> = fx
        .audit
        .entries()
        .into_iter()
        .filter(|e| e.action == AuditAction::Book)
        .collect();
    assert_eq!(book_entries.len(), 2);
    assert!(book_entries.iter().all(|e| e.pnr.is_some()));
}

#[tokio::test]
async fn rejects_batches_larger_than_the_free_pool() {
    let fx = fixture(3);
    fx.engine
        .reserve("T1", "2030-01-01", &names(&["alice", "bob"]), "alice")
        .await
        .unwrap();

    let err = fx
        .engine
        .reserve("T1", "2030-01-01", &names(&["carol", "dave"]), "carol")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        BookingError::InsufficientSeats {
            requested: 2,
            available: 1
        }
    ));
    // The whole batch aborted: no ticket for carol or dave anywhere.
    assert_eq!(fx.store.ticket_count(), 2);
}

#[tokio::test]
async fn cancel_releases_the_seat_for_reuse() {
    let fx = fixture(3);
    let tickets = fx
        .engine
        .reserve("T1", "2030-01-01", &names(&["alice", "bob"]), "alice")
        .await
        .unwrap();
    let alice_pnr = tickets[0].pnr().to_string();

    assert!(fx.lifecycle.cancel(&alice_pnr).await.unwrap());
    let train = fx.catalog.find_train("T1").unwrap();
    assert!(!train.registry().is_occupied("S1"));

    // The released seat is the first free seat again.
    let replacement = fx
        .engine
        .reserve("T1", "2030-01-01", &names(&["carol"]), "carol")
        .await
        .unwrap();
    assert_eq!(replacement[0].seat_id(), "S1");

    // Cancelling twice reports no change and disturbs nothing.
    assert!(!fx.lifecycle.cancel(&alice_pnr).await.unwrap());
    assert!(!fx.lifecycle.cancel("NO-SUCH-PNR").await.unwrap());
    assert!(train.registry().is_occupied("S1"));

    let cancel_entries: Vec<_> = fx
        .audit
        .entries()
        .into_iter()
        .filter(|e| e.action == AuditAction::Cancel)
        .collect();
    assert_eq!(cancel_entries.len(), 1);
}

#[tokio::test]
async fn cancel_waits_for_an_inflight_reservation() {
    let fx = fixture(3);
    let tickets = fx
        .engine
        .reserve("T1", "2030-01-01", &names(&["alice"]), "alice")
        .await
        .unwrap();
    let pnr = tickets[0].pnr().to_string();

    // While a reservation transaction holds the train, a cancel on the
    // same train must block rather than interleave.
    let tx = fx.store.begin_exclusive("t1").await.unwrap();
    let blocked = tokio::time::timeout(Duration::from_millis(50), fx.lifecycle.cancel(&pnr)).await;
    assert!(blocked.is_err(), "cancel should wait for the open transaction");
    assert!(fx.store.find_by_pnr(&pnr).await.unwrap().unwrap().is_active());

    tx.rollback().await.unwrap();
    assert!(fx.lifecycle.cancel(&pnr).await.unwrap());
    let train = fx.catalog.find_train("T1").unwrap();
    assert!(!train.registry().is_occupied("S1"));
}

#[tokio::test]
async fn cancel_keeps_the_seat_while_another_active_row_holds_it() {
    let fx = fixture(3);
    let future = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
    fx.store.seed(seeded_record("PNR-A", "alice", "T1", "S1", future));
    fx.store.seed(seeded_record("PNR-B", "bob", "T1", "s1", future));
    let train = fx.catalog.find_train("T1").unwrap();
    train.registry().occupy("S1");

    // Another active row still claims the seat, so the projection must not
    // free it.
    assert!(fx.lifecycle.cancel("PNR-A").await.unwrap());
    assert!(train.registry().is_occupied("S1"));

    assert!(fx.lifecycle.cancel("PNR-B").await.unwrap());
    assert!(!train.registry().is_occupied("S1"));
}

#[tokio::test]
async fn agent_identity_recorded_only_for_third_party_bookings() {
    let fx = fixture(3);
    let tickets = fx
        .engine
        .reserve("T1", "2030-01-01", &names(&["Alice", "bob"]), "alice")
        .await
        .unwrap();

    let own = tickets.iter().find(|t| t.record.passenger == "Alice").unwrap();
    assert_eq!(own.record.booked_by, None);
    let booked = tickets.iter().find(|t| t.record.passenger == "bob").unwrap();
    assert_eq!(booked.record.booked_by.as_deref(), Some("alice"));
}

#[tokio::test]
async fn rejects_invalid_requests_without_side_effects() {
    let fx = fixture(3);

    let yesterday = Local::now()
        .date_naive()
        .checked_sub_days(Days::new(1))
        .unwrap();
    let err = fx
        .engine
        .reserve("T1", &yesterday.to_string(), &names(&["alice"]), "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::PastDate(_)));

    let err = fx
        .engine
        .reserve("T1", "01/02/2030", &names(&["alice"]), "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::InvalidDate(_)));

    let err = fx.engine.reserve("T1", "2030-01-01", &[], "alice").await.unwrap_err();
    assert!(matches!(err, BookingError::EmptyRequest));

    let err = fx
        .engine
        .reserve("T99", "2030-01-01", &names(&["alice"]), "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::UnknownTrain(_)));

    assert_eq!(fx.store.ticket_count(), 0);
    let train = fx.catalog.find_train("T1").unwrap();
    assert_eq!(train.available_seat_count(), 3);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_reservations_never_oversell() {
    let fx = fixture(3);

    let first = {
        let engine = Arc::clone(&fx.engine);
        tokio::spawn(async move {
            engine
                .reserve("T1", "2030-01-01", &names(&["alice", "bob"]), "alice")
                .await
        })
    };
    let second = {
        let engine = Arc::clone(&fx.engine);
        tokio::spawn(async move {
            engine
                .reserve("T1", "2030-01-01", &names(&["carol", "dave"]), "carol")
                .await
        })
    };

    let outcomes = [first.await.unwrap(), second.await.unwrap()];
    let wins = outcomes.iter().filter(|r| r.is_ok()).count();
    assert_eq!(wins, 1, "exactly one of the racing reservations succeeds");
    let loss = outcomes.iter().find(|r| r.is_err()).unwrap();
    assert!(matches!(
        loss,
        Err(BookingError::InsufficientSeats {
            requested: 2,
            available: 1
        })
    ));

    // No seat granted twice, and no more seats than the train has.
    let active = fx.store.list_active().await.unwrap();
    let mut seats: Vec<_> = active.iter().map(|r| r.seat_id.clone()).collect();
    seats.sort();
    seats.dedup();
    assert_eq!(seats.len(), active.len());
    assert_eq!(active.len(), 2);

    let train = fx.catalog.find_train("T1").unwrap();
    assert_eq!(train.booked_seat_count(), 2);
}

// Store wrapper that fails the Nth insert, for atomicity checks.
struct FailingStore {
    inner: MemoryTicketStore,
    allow_inserts: usize,
}

struct FailingTx {
    tx: Box<dyn ReservationTx>,
    remaining: usize,
}

#[async_trait]
impl TicketStore for FailingStore {
    async fn begin_exclusive(&self, train_id: &str) -> Result<Box<dyn ReservationTx>, StoreError> {
        let tx = self.inner.begin_exclusive(train_id).await?;
        Ok(Box::new(FailingTx {
            tx,
            remaining: self.allow_inserts,
        }))
    }

    async fn update_status(
        &self,
        pnr: &str,
        from: TicketStatus,
        to: TicketStatus,
    ) -> Result<bool, StoreError> {
        self.inner.update_status(pnr, from, to).await
    }

    async fn list_active(&self) -> Result<Vec<TicketRecord>, StoreError> {
        self.inner.list_active().await
    }

    async fn find_by_pnr(&self, pnr: &str) -> Result<Option<TicketRecord>, StoreError> {
        self.inner.find_by_pnr(pnr).await
    }

    async fn list_by_passenger(
        &self,
        identity: &str,
        status: Option<TicketStatus>,
    ) -> Result<Vec<TicketRecord>, StoreError> {
        self.inner.list_by_passenger(identity, status).await
    }
}

#[async_trait]
impl ReservationTx for FailingTx {
    async fn active_seat_ids(&mut self) -> Result<Vec<String>, StoreError> {
        self.tx.active_seat_ids().await
    }

    async fn insert_ticket(&mut self, ticket: &TicketRecord) -> Result<(), StoreError> {
        if self.remaining == 0 {
            return Err(StoreError::Unavailable("injected insert failure".into()));
        }
        self.remaining -= 1;
        self.tx.insert_ticket(ticket).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await
    }
}

#[tokio::test]
async fn failed_batch_leaves_no_partial_state() {
    let catalog = Arc::new(TrainCatalog::new());
    catalog
        .add_train("T1", "City Express", vec!["A".into(), "B".into()], 3)
        .unwrap();
    let memory = MemoryTicketStore::new();
    let store = FailingStore {
        inner: memory.clone(),
        allow_inserts: 1,
    };
    let engine = ReservationEngine::new(
        Arc::new(store),
        Arc::new(MemoryAuditTrail::new()),
        Arc::clone(&catalog),
    );

    let err = engine
        .reserve("T1", "2030-01-01", &names(&["alice", "bob"]), "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::Store(StoreError::Unavailable(_))));

    // Zero tickets and zero occupancy from the failed attempt.
    assert_eq!(memory.ticket_count(), 0);
    let train = catalog.find_train("T1").unwrap();
    assert_eq!(train.booked_seat_count(), 0);
}

// Store wrapper that reports a duplicate locator a fixed number of times
// before delegating, to exercise the regenerate-and-retry path.
struct CollidingStore {
    inner: MemoryTicketStore,
    collisions: Arc<AtomicUsize>,
}

struct CollidingTx {
    tx: Box<dyn ReservationTx>,
    collisions: Arc<AtomicUsize>,
}

#[async_trait]
impl TicketStore for CollidingStore {
    async fn begin_exclusive(&self, train_id: &str) -> Result<Box<dyn ReservationTx>, StoreError> {
        let tx = self.inner.begin_exclusive(train_id).await?;
        Ok(Box::new(CollidingTx {
            tx,
            collisions: Arc::clone(&self.collisions),
        }))
    }

    async fn update_status(
        &self,
        pnr: &str,
        from: TicketStatus,
        to: TicketStatus,
    ) -> Result<bool, StoreError> {
        self.inner.update_status(pnr, from, to).await
    }

    async fn list_active(&self) -> Result<Vec<TicketRecord>, StoreError> {
        self.inner.list_active().await
    }

    async fn find_by_pnr(&self, pnr: &str) -> Result<Option<TicketRecord>, StoreError> {
        self.inner.find_by_pnr(pnr).await
    }

    async fn list_by_passenger(
        &self,
        identity: &str,
        status: Option<TicketStatus>,
    ) -> Result<Vec<TicketRecord>, StoreError> {
        self.inner.list_by_passenger(identity, status).await
    }
}

#[async_trait]
impl ReservationTx for CollidingTx {
    async fn active_seat_ids(&mut self) -> Result<Vec<String>, StoreError> {
        self.tx.active_seat_ids().await
    }

    async fn insert_ticket(&mut self, ticket: &TicketRecord) -> Result<(), StoreError> {
        if self.collisions.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |c| c.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::DuplicateLocator(ticket.pnr.clone()));
        }
        self.tx.insert_ticket(ticket).await
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await
    }
}

#[tokio::test]
async fn locator_collisions_are_retried_with_fresh_locators() {
    let catalog = Arc::new(TrainCatalog::new());
    catalog
        .add_train("T1", "City Express", vec!["A".into(), "B".into()], 3)
        .unwrap();
    let memory = MemoryTicketStore::new();
    let store = CollidingStore {
        inner: memory.clone(),
        collisions: Arc::new(AtomicUsize::new(2)),
    };
    let engine = ReservationEngine::new(
        Arc::new(store),
        Arc::new(MemoryAuditTrail::new()),
        Arc::clone(&catalog),
    );

    let tickets = engine
        .reserve("T1", "2030-01-01", &names(&["alice"]), "alice")
        .await
        .unwrap();
    assert_eq!(tickets.len(), 1);
    assert_eq!(memory.ticket_count(), 1);
}

#[tokio::test]
async fn locator_retry_is_bounded() {
    let catalog = Arc::new(TrainCatalog::new());
    catalog
        .add_train("T1", "City Express", vec!["A".into(), "B".into()], 3)
        .unwrap();
    let memory = MemoryTicketStore::new();
    let store = CollidingStore {
        inner: memory.clone(),
        collisions: Arc::new(AtomicUsize::new(usize::MAX)),
    };
    let engine = ReservationEngine::new(
        Arc::new(store),
        Arc::new(MemoryAuditTrail::new()),
        Arc::clone(&catalog),
    )
    .with_pnr_attempts(3);

    let err = engine
        .reserve("T1", "2030-01-01", &names(&["alice"]), "alice")
        .await
        .unwrap_err();
    assert!(matches!(err, BookingError::LocatorConflict(3)));
    assert_eq!(memory.ticket_count(), 0);
}

fn seeded_record(pnr: &str, passenger: &str, train: &str, seat: &str, date: NaiveDate) -> TicketRecord {
    TicketRecord::new(pnr.to_string(), passenger, None, train, seat, date)
}

#[tokio::test]
async fn reconcile_rebuilds_registries_and_is_idempotent() {
    let fx = fixture(3);
    let future = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();

    fx.store.seed(seeded_record("PNR-A", "alice", "T1", "S2", future));
    // Stale rows: unknown train, unknown seat.
    fx.store.seed(seeded_record("PNR-B", "bob", "TX", "S1", future));
    fx.store.seed(seeded_record("PNR-C", "carol", "T1", "S99", future));
    // Cancelled rows never occupy a seat.
    let mut cancelled = seeded_record("PNR-D", "dave", "T1", "S1", future);
    cancelled.status = TicketStatus::Cancelled;
    fx.store.seed(cancelled);

    // Drift in the cache is corrected by the replay.
    let train = fx.catalog.find_train("T1").unwrap();
    train.registry().occupy("S3");

    let report = reconcile(&fx.catalog, &fx.store).await.unwrap();
    assert_eq!(report.applied, 1);
    assert_eq!(report.skipped, 2);
    assert_eq!(train.registry().available_seats(), vec!["S1", "S3"]);

    let again = reconcile(&fx.catalog, &fx.store).await.unwrap();
    assert_eq!(again, report);
    assert_eq!(train.registry().available_seats(), vec!["S1", "S3"]);
}

#[tokio::test]
async fn passenger_queries_classify_by_status_and_date() {
    let fx = fixture(3);
    let future = NaiveDate::from_ymd_opt(2030, 1, 1).unwrap();
    let past = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();

    fx.store.seed(seeded_record("PNR-UP", "alice", "T1", "S1", future));
    fx.store.seed(seeded_record("PNR-OLD", "alice", "T1", "S2", past));
    let mut cancelled = seeded_record("PNR-GONE", "alice", "T1", "S3", future);
    cancelled.status = TicketStatus::Cancelled;
    fx.store.seed(cancelled);
    // Unresolvable drift row: excluded from every listing, never an error.
    fx.store.seed(seeded_record("PNR-DRIFT", "alice", "TX", "S1", future));
    // Booked by alice as agent for someone else: still hers to see.
    let mut for_dave = seeded_record("PNR-AGENT", "dave", "T1", "S3", future);
    for_dave.booked_by = Some("alice".into());
    fx.store.seed(for_dave);

    let mut active: Vec<String> = fx
        .lifecycle
        .find_active("alice")
        .await
        .unwrap()
        .iter()
        .map(|t| t.pnr().to_string())
        .collect();
    active.sort();
    assert_eq!(active, vec!["PNR-AGENT", "PNR-UP"]);

    let past_tickets = fx.lifecycle.find_past("alice").await.unwrap();
    assert_eq!(past_tickets.len(), 1);
    assert_eq!(past_tickets[0].pnr(), "PNR-OLD");

    let cancelled_tickets = fx.lifecycle.find_cancelled("alice").await.unwrap();
    assert_eq!(cancelled_tickets.len(), 1);
    assert_eq!(cancelled_tickets[0].pnr(), "PNR-GONE");

    let shown = fx.lifecycle.find_by_pnr("pnr-up").await.unwrap().unwrap();
    assert_eq!(shown.train.name(), "City Express");
    assert!(fx.lifecycle.find_by_pnr("PNR-NONE").await.unwrap().is_none());
}
