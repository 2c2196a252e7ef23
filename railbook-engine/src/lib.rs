mod audit;
pub mod lifecycle;
pub mod reconcile;
pub mod reservation;

pub use lifecycle::{Ticket, TicketLifecycle};
pub use reconcile::{reconcile, ReconcileReport};
pub use reservation::ReservationEngine;
