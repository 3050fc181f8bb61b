use anyhow::{anyhow, Result};
use cadence_core::clock::SystemClock;
use cadence_core::engine::ExpansionEngine;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::config::Config;

pub mod list;
pub mod rule;
pub mod task;

/// Everything a command needs besides its own arguments.
pub struct Context<R> {
    pub engine: ExpansionEngine<R, SystemClock>,
    pub owner: String,
    pub config: Config,
    pub tz: Tz,
}

impl<R> Context<R> {
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.tz).date_naive()
    }
}

/// The UTC instants bounding the closed day range `[from, to]`.
pub fn day_bounds(from: NaiveDate, to: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let last_instant = NaiveTime::from_hms_nano_opt(23, 59, 59, 999_999_999)
        .ok_or_else(|| anyhow!("Invalid end of day"))?;
    let start = Utc.from_utc_datetime(&from.and_time(NaiveTime::MIN));
    let end = Utc.from_utc_datetime(&to.and_time(last_instant));
    Ok((start, end))
}

/// Last day of a window of `days` days starting at `from`.
pub fn window_end(from: NaiveDate, days: u32) -> Result<NaiveDate> {
    let span = i64::from(days.max(1)) - 1;
    from.checked_add_signed(Duration::days(span))
        .ok_or_else(|| anyhow!("A {}-day window starting {} runs past the last supported date", days, from))
}
