pub mod catalog;
pub mod seats;
pub mod train;

pub use catalog::{CatalogError, TrainCatalog};
pub use seats::SeatRegistry;
pub use train::{Train, TrainSummary};
