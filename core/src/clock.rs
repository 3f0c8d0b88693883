//! Business-date clock. Daily limit windows roll over on the tenant's
//! local calendar date, not the UTC date.

use chrono::{Duration, NaiveDate, Utc};

pub trait BusinessCalendar: Send + Sync {
    fn business_date(&self) -> NaiveDate;
}

/// Derives the business date from wall-clock UTC shifted by the tenant's
/// configured offset.
#[derive(Debug, Clone, Copy)]
pub struct TenantClock {
    utc_offset_minutes: i32,
}

impl TenantClock {
    pub fn new(utc_offset_minutes: i32) -> Self {
        Self { utc_offset_minutes }
    }
}

impl BusinessCalendar for TenantClock {
    fn business_date(&self) -> NaiveDate {
        (Utc::now() + Duration::minutes(self.utc_offset_minutes as i64)).date_naive()
    }
}

/// A pinned calendar for tests and replay tooling.
#[derive(Debug, Clone, Copy)]
pub struct FixedCalendar(pub NaiveDate);

impl BusinessCalendar for FixedCalendar {
    fn business_date(&self) -> NaiveDate {
        self.0
    }
}
