use chrono::NaiveDate;

/// Failures raised by a ticket store implementation.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The locator already exists. Recoverable: regenerate and retry the
    /// single insert.
    #[error("Duplicate locator: {0}")]
    DuplicateLocator(String),

    /// The store could not be reached or the transaction could not
    /// complete. Fatal to the operation, which must have no effect.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Caller-facing errors from the reservation and lifecycle surface.
#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("Invalid travel date, expected YYYY-MM-DD: {0}")]
    InvalidDate(String),

    #[error("Travel date {0} is before today")]
    PastDate(NaiveDate),

    #[error("At least one passenger is required")]
    EmptyRequest,

    #[error("Unknown train: {0}")]
    UnknownTrain(String),

    #[error("Not enough seats available. Requested {requested}, available {available}")]
    InsufficientSeats { requested: usize, available: usize },

    #[error("Could not allocate a unique PNR after {0} attempts")]
    LocatorConflict(u32),

    #[error(transparent)]
    Store(#[from] StoreError),
}
