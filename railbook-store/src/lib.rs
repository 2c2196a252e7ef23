pub mod app_config;
pub mod catalog_repo;
pub mod database;
pub mod memory;
pub mod ticket_repo;

pub use app_config::Config;
pub use catalog_repo::PgCatalogStore;
pub use database::DbClient;
pub use memory::{MemoryAuditTrail, MemoryTicketStore};
pub use ticket_repo::{PgAuditTrail, PgTicketStore};
