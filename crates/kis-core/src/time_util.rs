//! Wall-clock helpers and trading-session derivation.
//!
//! Every "is it the day session?" decision goes through
//! [`SessionWindow::session_at`]; no other code inspects the hour.

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, NaiveDate, Timelike, Utc};
use chrono_tz::Tz;
use serde::Deserialize;

use crate::enums::Session;
use crate::error::{KisError, Result};

/// Current time as **seconds** since Unix epoch.
#[inline]
pub fn now_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

/// The local time window in which the broker's day-session (US daytime
/// trading) is open. Outside the window orders go to the regular session.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SessionWindow {
    /// Timezone the hours are expressed in.
    #[serde(default = "default_timezone")]
    pub timezone: Tz,

    /// First hour (inclusive) of the day session.
    #[serde(default = "default_day_start")]
    pub day_start_hour: u32,

    /// Hour (exclusive) at which the day session ends.
    #[serde(default = "default_day_end")]
    pub day_end_hour: u32,
}

impl Default for SessionWindow {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            day_start_hour: default_day_start(),
            day_end_hour: default_day_end(),
        }
    }
}

impl SessionWindow {
    /// Derive the session for a UTC instant.
    pub fn session_at(&self, now: DateTime<Utc>) -> Session {
        let hour = now.with_timezone(&self.timezone).hour();
        if (self.day_start_hour..self.day_end_hour).contains(&hour) {
            Session::Day
        } else {
            Session::Night
        }
    }

    /// Calendar date of `now` in the window's timezone.
    pub fn local_date(&self, now: DateTime<Utc>) -> NaiveDate {
        now.with_timezone(&self.timezone).date_naive()
    }

    /// Reject windows that are empty or run past midnight.
    pub fn validate(&self) -> Result<()> {
        if self.day_start_hour >= self.day_end_hour || self.day_end_hour > 24 {
            return Err(KisError::Config(format!(
                "invalid session window {}..{}",
                self.day_start_hour, self.day_end_hour
            )));
        }
        Ok(())
    }
}

fn default_timezone() -> Tz {
    chrono_tz::Asia::Seoul
}

fn default_day_start() -> u32 {
    10
}

fn default_day_end() -> u32 {
    18
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn seoul(h: u32, m: u32) -> DateTime<Utc> {
        chrono_tz::Asia::Seoul
            .with_ymd_and_hms(2024, 3, 4, h, m, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn day_window_is_half_open() {
        let window = SessionWindow::default();
        assert_eq!(window.session_at(seoul(9, 59)), Session::Night);
        assert_eq!(window.session_at(seoul(10, 0)), Session::Day);
        assert_eq!(window.session_at(seoul(17, 59)), Session::Day);
        assert_eq!(window.session_at(seoul(18, 0)), Session::Night);
        assert_eq!(window.session_at(seoul(23, 30)), Session::Night);
    }

    #[test]
    fn session_uses_window_timezone_not_utc() {
        // 02:00 UTC is 11:00 in Seoul.
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 2, 0, 0).unwrap();
        assert_eq!(SessionWindow::default().session_at(now), Session::Day);
    }

    #[test]
    fn local_date_crosses_midnight() {
        // 16:00 UTC on the 4th is 01:00 on the 5th in Seoul.
        let now = Utc.with_ymd_and_hms(2024, 3, 4, 16, 0, 0).unwrap();
        let date = SessionWindow::default().local_date(now);
        assert_eq!(date, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
    }

    #[test]
    fn validate_rejects_inverted_window() {
        let window = SessionWindow {
            day_start_hour: 18,
            day_end_hour: 10,
            ..SessionWindow::default()
        };
        assert!(matches!(window.validate(), Err(KisError::Config(_))));
        assert!(SessionWindow::default().validate().is_ok());
    }
}
