use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use railbook_core::{
    AuditAction, AuditTrail, ReservationTx, StoreError, TicketRecord, TicketStatus, TicketStore,
};
use sqlx::{PgPool, Postgres, Row, Transaction};
use tracing::warn;

/// Postgres-backed ticket store.
///
/// Train-scoped mutual exclusion is an advisory transaction lock keyed on
/// the train id, taken at `begin_exclusive`; the FOR UPDATE read of the
/// active rows additionally blocks concurrent cancellations on the same
/// train until the reservation commits.
pub struct PgTicketStore {
    pool: PgPool,
}

impl PgTicketStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TicketRow {
    pnr: String,
    passenger: String,
    booked_by: Option<String>,
    train_id: String,
    seat_id: String,
    travel_date: NaiveDate,
    status: String,
    created_at: DateTime<Utc>,
}

impl TicketRow {
    fn into_record(self) -> Option<TicketRecord> {
        let Some(status) = TicketStatus::parse(&self.status) else {
            warn!(pnr = %self.pnr, status = %self.status, "skipping ticket with unknown status");
            return None;
        };
        Some(TicketRecord {
            pnr: self.pnr,
            passenger: self.passenger,
            booked_by: self.booked_by,
            train_id: self.train_id,
            seat_id: self.seat_id,
            travel_date: self.travel_date,
            status,
            created_at: self.created_at,
        })
    }
}

fn store_err(err: sqlx::Error) -> StoreError {
    StoreError::Unavailable(err.to_string())
}

const SELECT_TICKET: &str = "SELECT pnr, passenger, booked_by, train_id, seat_id, travel_date, status, created_at FROM tickets";

#[async_trait]
impl TicketStore for PgTicketStore {
    async fn begin_exclusive(&self, train_id: &str) -> Result<Box<dyn ReservationTx>, StoreError> {
        let mut tx = self.pool.begin().await.map_err(store_err)?;
        // Serializes reservations per train; released at commit/rollback.
        // Reservations for different trains hash to different keys and
        // do not block each other.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext(upper($1)))")
            .bind(train_id)
            .execute(&mut *tx)
            .await
            .map_err(store_err)?;
        Ok(Box::new(PgReservationTx {
            tx,
            train_id: train_id.to_string(),
        }))
    }

    async fn update_status(
        &self,
        pnr: &str,
        from: TicketStatus,
        to: TicketStatus,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE tickets SET status = $1 WHERE pnr = $2 AND status = $3")
            .bind(to.as_str())
            .bind(pnr)
            .bind(from.as_str())
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_active(&self) -> Result<Vec<TicketRecord>, StoreError> {
        let rows = sqlx::query_as::<_, TicketRow>(&format!(
            "{SELECT_TICKET} WHERE status = 'ACTIVE' ORDER BY created_at, pnr"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(rows.into_iter().filter_map(TicketRow::into_record).collect())
    }

    async fn find_by_pnr(&self, pnr: &str) -> Result<Option<TicketRecord>, StoreError> {
        let row = sqlx::query_as::<_, TicketRow>(&format!("{SELECT_TICKET} WHERE upper(pnr) = upper($1)"))
            .bind(pnr)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(row.and_then(TicketRow::into_record))
    }

    async fn list_by_passenger(
        &self,
        identity: &str,
        status: Option<TicketStatus>,
    ) -> Result<Vec<TicketRecord>, StoreError> {
        let rows = match status {
            Some(status) => {
                sqlx::query_as::<_, TicketRow>(&format!(
                    "{SELECT_TICKET} WHERE (passenger = $1 OR booked_by = $1) AND status = $2 ORDER BY created_at, pnr"
                ))
                .bind(identity)
                .bind(status.as_str())
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, TicketRow>(&format!(
                    "{SELECT_TICKET} WHERE passenger = $1 OR booked_by = $1 ORDER BY created_at, pnr"
                ))
                .bind(identity)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(store_err)?;
        Ok(rows.into_iter().filter_map(TicketRow::into_record).collect())
    }
}

struct PgReservationTx {
    tx: Transaction<'static, Postgres>,
    train_id: String,
}

#[async_trait]
impl ReservationTx for PgReservationTx {
    async fn active_seat_ids(&mut self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(
            "SELECT seat_id FROM tickets WHERE upper(train_id) = upper($1) AND status = 'ACTIVE' FOR UPDATE",
        )
        .bind(&self.train_id)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(store_err)?;
        Ok(rows
            .iter()
            .map(|row| row.get::<String, _>("seat_id"))
            .collect())
    }

    async fn insert_ticket(&mut self, ticket: &TicketRecord) -> Result<(), StoreError> {
        let result = sqlx::query(
            "INSERT INTO tickets (pnr, passenger, booked_by, train_id, seat_id, travel_date, status, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(&ticket.pnr)
        .bind(&ticket.passenger)
        .bind(&ticket.booked_by)
        .bind(&ticket.train_id)
        .bind(&ticket.seat_id)
        .bind(ticket.travel_date)
        .bind(ticket.status.as_str())
        .bind(ticket.created_at)
        .execute(&mut *self.tx)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(StoreError::DuplicateLocator(ticket.pnr.clone()))
            }
            Err(err) => Err(store_err(err)),
        }
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.commit().await.map_err(store_err)
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        self.tx.rollback().await.map_err(store_err)
    }
}

/// Booking history writer. The primary tier resolves the acting user's id
/// from the users table; the fallback tier writes the reduced row with
/// just the username.
pub struct PgAuditTrail {
    pool: PgPool,
}

impl PgAuditTrail {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditTrail for PgAuditTrail {
    async fn record(
        &self,
        identity: &str,
        pnr: &str,
        action: AuditAction,
        details: &str,
    ) -> Result<(), StoreError> {
        let user_id: Option<i32> = sqlx::query("SELECT id FROM users WHERE username = $1")
            .bind(identity)
            .fetch_optional(&self.pool)
            .await
            .map_err(store_err)?
            .map(|row| row.get::<i32, _>("id"));

        sqlx::query(
            "INSERT INTO booking_history (user_id, pnr, username, action, details) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(user_id)
        .bind(pnr)
        .bind(identity)
        .bind(action.as_str())
        .bind(details)
        .execute(&self.pool)
        .await
        .map_err(store_err)?;
        Ok(())
    }

    async fn record_fallback(
        &self,
        identity: &str,
        action: AuditAction,
        details: &str,
    ) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO booking_history (username, action, details) VALUES ($1, $2, $3)")
            .bind(identity)
            .bind(action.as_str())
            .bind(details)
            .execute(&self.pool)
            .await
            .map_err(store_err)?;
        Ok(())
    }
}
