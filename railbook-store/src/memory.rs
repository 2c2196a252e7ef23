use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex, PoisonError, RwLock};

use async_trait::async_trait;
use railbook_core::{
    AuditAction, AuditTrail, ReservationTx, StoreError, TicketRecord, TicketStatus, TicketStore,
};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// In-process ticket store with the same locking discipline as the
/// Postgres store: one exclusive lock per train held for the duration of
/// the reservation read-and-insert window, and cancellations taking the
/// same lock. Backs the test suites and embedded deployments.
#[derive(Clone, Default)]
pub struct MemoryTicketStore {
    inner: Arc<MemoryInner>,
}

#[derive(Default)]
struct MemoryInner {
    tickets: RwLock<HashMap<String, TicketRecord>>,
    train_locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl MemoryInner {
    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, TicketRecord>> {
        self.tickets.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, TicketRecord>> {
        self.tickets.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a row directly, bypassing the reservation path. For seeding
    /// pre-existing state in tests and tools.
    pub fn seed(&self, record: TicketRecord) {
        self.inner.write().insert(record.pnr.clone(), record);
    }

    /// Total rows ever stored, cancelled included.
    pub fn ticket_count(&self) -> usize {
        self.inner.read().len()
    }

    fn train_lock(&self, train_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self
            .inner
            .train_locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(train_id.to_ascii_uppercase()).or_default())
    }

    fn sorted(mut records: Vec<TicketRecord>) -> Vec<TicketRecord> {
        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.pnr.cmp(&b.pnr))
        });
        records
    }
}

#[async_trait]
impl TicketStore for MemoryTicketStore {
    async fn begin_exclusive(&self, train_id: &str) -> Result<Box<dyn ReservationTx>, StoreError> {
        let guard = self.train_lock(train_id).lock_owned().await;
        Ok(Box::new(MemoryReservationTx {
            inner: Arc::clone(&self.inner),
            train_id: train_id.to_string(),
            staged: Vec::new(),
            _guard: guard,
        }))
    }

    async fn update_status(
        &self,
        pnr: &str,
        from: TicketStatus,
        to: TicketStatus,
    ) -> Result<bool, StoreError> {
        let train_id = match self.inner.read().get(pnr) {
            Some(record) => record.train_id.clone(),
            None => return Ok(false),
        };

        // Mutually exclusive with an in-flight reservation on this train.
        let lock = self.train_lock(&train_id);
        let _guard = lock.lock().await;

        let mut tickets = self.inner.write();
        match tickets.get_mut(pnr) {
            Some(record) if record.status == from => {
                record.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_active(&self) -> Result<Vec<TicketRecord>, StoreError> {
        let records = self
            .inner
            .read()
            .values()
            .filter(|r| r.status == TicketStatus::Active)
            .cloned()
            .collect();
        Ok(Self::sorted(records))
    }

    async fn find_by_pnr(&self, pnr: &str) -> Result<Option<TicketRecord>, StoreError> {
        Ok(self
            .inner
            .read()
            .values()
            .find(|r| r.pnr.eq_ignore_ascii_case(pnr))
            .cloned())
    }

    async fn list_by_passenger(
        &self,
        identity: &str,
        status: Option<TicketStatus>,
    ) -> Result<Vec<TicketRecord>, StoreError> {
        let records = self
            .inner
            .read()
            .values()
            .filter(|r| r.passenger == identity || r.booked_by.as_deref() == Some(identity))
            .filter(|r| status.map_or(true, |s| r.status == s))
            .cloned()
            .collect();
        Ok(Self::sorted(records))
    }
}

struct MemoryReservationTx {
    inner: Arc<MemoryInner>,
    train_id: String,
    staged: Vec<TicketRecord>,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl ReservationTx for MemoryReservationTx {
    async fn active_seat_ids(&mut self) -> Result<Vec<String>, StoreError> {
        Ok(self
            .inner
            .read()
            .values()
            .filter(|r| {
                r.status == TicketStatus::Active && r.train_id.eq_ignore_ascii_case(&self.train_id)
            })
            .map(|r| r.seat_id.clone())
            .collect())
    }

    async fn insert_ticket(&mut self, ticket: &TicketRecord) -> Result<(), StoreError> {
        let committed = self.inner.read();
        if committed.contains_key(&ticket.pnr) || self.staged.iter().any(|s| s.pnr == ticket.pnr) {
            return Err(StoreError::DuplicateLocator(ticket.pnr.clone()));
        }
        drop(committed);
        self.staged.push(ticket.clone());
        Ok(())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut tickets = self.inner.write();
        for record in &self.staged {
            tickets.insert(record.pnr.clone(), record.clone());
        }
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        // Staged rows are simply dropped.
        Ok(())
    }
}

/// Audit trail kept in memory, inspectable from tests.
#[derive(Clone, Default)]
pub struct MemoryAuditTrail {
    entries: Arc<StdMutex<Vec<AuditEntry>>>,
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub username: String,
    /// None for reduced-schema fallback writes.
    pub pnr: Option<String>,
    pub action: AuditAction,
    pub details: String,
}

impl MemoryAuditTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl AuditTrail for MemoryAuditTrail {
    async fn record(
        &self,
        identity: &str,
        pnr: &str,
        action: AuditAction,
        details: &str,
    ) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(AuditEntry {
                username: identity.to_string(),
                pnr: Some(pnr.to_string()),
                action,
                details: details.to_string(),
            });
        Ok(())
    }

    async fn record_fallback(
        &self,
        identity: &str,
        action: AuditAction,
        details: &str,
    ) -> Result<(), StoreError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(AuditEntry {
                username: identity.to_string(),
                pnr: None,
                action,
                details: details.to_string(),
            });
        Ok(())
    }
}
