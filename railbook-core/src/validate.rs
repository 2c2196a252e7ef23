use chrono::{Local, NaiveDate};

use crate::error::BookingError;

/// Parse a travel date and reject anything before today.
pub fn parse_travel_date(raw: &str) -> Result<NaiveDate, BookingError> {
    let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| BookingError::InvalidDate(raw.to_string()))?;
    if date < Local::now().date_naive() {
        return Err(BookingError::PastDate(date));
    }
    Ok(date)
}
