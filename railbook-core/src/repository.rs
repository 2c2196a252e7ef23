use async_trait::async_trait;

use crate::error::StoreError;
use crate::ticket::{AuditAction, TicketRecord, TicketStatus};

/// Durable ticket storage. The single source of truth for seat occupancy;
/// in-memory registries are projections of its ACTIVE rows.
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Open a transaction holding an exclusive reservation scope for one
    /// train. While the transaction is live no other reservation or
    /// cancellation may interleave on that train; reservations on other
    /// trains are unaffected.
    async fn begin_exclusive(&self, train_id: &str) -> Result<Box<dyn ReservationTx>, StoreError>;

    /// Compare-and-set a ticket's status. Returns false when the ticket
    /// does not exist or is not currently in `from`.
    async fn update_status(
        &self,
        pnr: &str,
        from: TicketStatus,
        to: TicketStatus,
    ) -> Result<bool, StoreError>;

    /// Every ACTIVE ticket in the store, for startup reconciliation.
    async fn list_active(&self) -> Result<Vec<TicketRecord>, StoreError>;

    async fn find_by_pnr(&self, pnr: &str) -> Result<Option<TicketRecord>, StoreError>;

    /// Tickets where the given identity is the passenger or the booking
    /// agent, optionally narrowed by status.
    async fn list_by_passenger(
        &self,
        identity: &str,
        status: Option<TicketStatus>,
    ) -> Result<Vec<TicketRecord>, StoreError>;
}

/// One in-flight reservation. All inserts are staged; nothing is visible
/// to other callers until `commit`.
#[async_trait]
pub trait ReservationTx: Send {
    /// Seat identifiers referenced by ACTIVE tickets on the locked train,
    /// read under the exclusive scope.
    async fn active_seat_ids(&mut self) -> Result<Vec<String>, StoreError>;

    /// Stage one ticket row. Surfaces `StoreError::DuplicateLocator` when
    /// the locator is already taken so the caller can regenerate.
    async fn insert_ticket(&mut self, ticket: &TicketRecord) -> Result<(), StoreError>;

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;

    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// Best-effort booking history. Failures are tolerated by callers and
/// must never roll back the operation being audited.
#[async_trait]
pub trait AuditTrail: Send + Sync {
    async fn record(
        &self,
        identity: &str,
        pnr: &str,
        action: AuditAction,
        details: &str,
    ) -> Result<(), StoreError>;

    /// Reduced-schema write attempted when the primary record fails.
    async fn record_fallback(
        &self,
        identity: &str,
        action: AuditAction,
        details: &str,
    ) -> Result<(), StoreError>;
}
