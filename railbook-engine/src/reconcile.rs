use railbook_catalog::TrainCatalog;
use railbook_core::{StoreError, TicketStore};
use tracing::{info, warn};

/// Outcome of a reconciliation pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    /// ACTIVE tickets projected onto a seat registry.
    pub applied: usize,
    /// Rows referencing an unknown train or seat, skipped with a warning.
    pub skipped: usize,
}

/// Rebuild every train's seat registry from the ACTIVE rows in the store.
///
/// Runs once at startup before booking traffic is accepted. Registries
/// are cleared first, so occupancy afterwards is a pure function of the
/// ACTIVE rows at that point in time and repeated runs are idempotent.
/// Stale rows never abort the pass.
pub async fn reconcile(
    catalog: &TrainCatalog,
    store: &dyn TicketStore,
) -> Result<ReconcileReport, StoreError> {
    for train in catalog.all_trains() {
        train.registry().clear();
    }

    let mut report = ReconcileReport::default();
    for record in store.list_active().await? {
        match catalog.find_train(&record.train_id) {
            Some(train) => {
                if train.registry().occupy(&record.seat_id) {
                    report.applied += 1;
                } else {
                    warn!(
                        pnr = %record.pnr,
                        train = %record.train_id,
                        seat = %record.seat_id,
                        "skipping active ticket referencing an unknown seat"
                    );
                    report.skipped += 1;
                }
            }
            None => {
                warn!(
                    pnr = %record.pnr,
                    train = %record.train_id,
                    "skipping active ticket referencing an unknown train"
                );
                report.skipped += 1;
            }
        }
    }

    info!(
        applied = report.applied,
        skipped = report.skipped,
        "seat registries reconciled from ticket store"
    );
    Ok(report)
}
