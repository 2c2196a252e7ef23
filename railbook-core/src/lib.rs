pub mod error;
pub mod pnr;
pub mod repository;
pub mod ticket;
pub mod validate;

pub use error::{BookingError, StoreError};
pub use repository::{AuditTrail, ReservationTx, TicketStore};
pub use ticket::{AuditAction, TicketRecord, TicketStatus};
