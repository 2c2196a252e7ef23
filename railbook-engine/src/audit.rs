use railbook_core::{AuditAction, AuditTrail};
use tracing::warn;

/// Two-tier best-effort audit write: the primary row, then the
/// reduced-schema fallback, then a log line. The surrounding booking or
/// cancellation has already committed and is never affected.
pub(crate) async fn record_best_effort(
    audit: &dyn AuditTrail,
    identity: &str,
    pnr: &str,
    action: AuditAction,
    details: &str,
) {
    let Err(primary) = audit.record(identity, pnr, action, details).await else {
        return;
    };
    if let Err(fallback) = audit.record_fallback(identity, action, details).await {
        warn!(
            %pnr,
            action = action.as_str(),
            %primary,
            %fallback,
            "audit write failed on both tiers"
        );
    }
}
