use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Ticket lifecycle states. The transition is one-way: a cancelled ticket
/// never becomes active again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    Active,
    Cancelled,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Active => "ACTIVE",
            TicketStatus::Cancelled => "CANCELLED",
        }
    }

    /// Lenient parse for values coming back from the store.
    pub fn parse(value: &str) -> Option<TicketStatus> {
        match value.trim().to_ascii_uppercase().as_str() {
            "ACTIVE" => Some(TicketStatus::Active),
            "CANCELLED" => Some(TicketStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit actions recorded against the booking history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Book,
    Cancel,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Book => "BOOK",
            AuditAction::Cancel => "CANCEL",
        }
    }
}

/// A persisted ticket row. Train and seat are plain identifiers; live
/// objects are resolved through the catalog at read time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketRecord {
    pub pnr: String,
    pub passenger: String,
    /// Identity that placed the booking, when it differs from the
    /// passenger (an agent booking on someone's behalf).
    pub booked_by: Option<String>,
    pub train_id: String,
    pub seat_id: String,
    pub travel_date: NaiveDate,
    pub status: TicketStatus,
    pub created_at: DateTime<Utc>,
}

impl TicketRecord {
    pub fn new(
        pnr: String,
        passenger: &str,
        booked_by: Option<&str>,
        train_id: &str,
        seat_id: &str,
        travel_date: NaiveDate,
    ) -> Self {
        Self {
            pnr,
            passenger: passenger.to_string(),
            booked_by: booked_by.map(str::to_string),
            train_id: train_id.to_string(),
            seat_id: seat_id.to_string(),
            travel_date,
            status: TicketStatus::Active,
            created_at: Utc::now(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == TicketStatus::Active
    }
}
