//! Calendar-day arithmetic in a fixed-offset reference zone.
//!
//! Day boundaries are the reference zone's local midnights. The zone is a
//! plain UTC offset: no daylight-saving transitions are applied, so a window
//! that crosses a DST change keeps the standard-time boundaries throughout.

use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use tally_config::{ForecastConfig, WeekendConfig};

/// Reference timezone for day bucketing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceZone {
    offset: FixedOffset,
}

impl ReferenceZone {
    pub fn new(offset: FixedOffset) -> Self {
        ReferenceZone { offset }
    }

    pub fn from_config(config: &ForecastConfig) -> Self {
        ReferenceZone::new(config.reference_offset())
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Calendar date of `t` in the reference zone.
    pub fn date_of(&self, t: DateTime<Utc>) -> NaiveDate {
        t.with_timezone(&self.offset).date_naive()
    }

    /// Local midnight opening `date`, as a UTC instant.
    pub fn day_start(&self, date: NaiveDate) -> DateTime<Utc> {
        let local_midnight = date.and_time(NaiveTime::default());
        let utc = local_midnight - Duration::seconds(i64::from(self.offset.local_minus_utc()));
        Utc.from_utc_datetime(&utc)
    }

    /// Local midnight closing `date` (exclusive end).
    pub fn day_end(&self, date: NaiveDate) -> DateTime<Utc> {
        self.day_start(date) + Duration::hours(24)
    }

    /// Every calendar date touched by `[start, end]`, inclusive on both ends.
    pub fn days_spanned(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> impl Iterator<Item = NaiveDate> {
        let first = self.date_of(start);
        let last = self.date_of(end);
        first.iter_days().take_while(move |d| *d <= last)
    }

    /// Hours of `[start, end)` that fall on a configured weekend day.
    ///
    /// Steps hour by hour from `start`, classifying each step by the
    /// reference-zone weekday at its beginning.
    pub fn weekend_hours(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        weekend: &WeekendConfig,
    ) -> u32 {
        let mut hours = 0;
        let mut current = start;
        while current < end {
            if weekend.is_weekend(self.date_of(current).weekday()) {
                hours += 1;
            }
            current += Duration::hours(1);
        }
        hours
    }
}

impl Default for ReferenceZone {
    fn default() -> Self {
        ReferenceZone::new(tally_config::forecast::fixed_offset(
            tally_config::forecast::DEFAULT_UTC_OFFSET_HOURS,
        ))
    }
}
