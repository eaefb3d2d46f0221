//! UTC wall-clock timestamps for audit records.
//!
//! Only two renderings are needed: the extended ISO-8601 form stored inside
//! each log record and the compact form used in log file names. Conversion
//! from epoch seconds is done locally to avoid pulling in a date library.

use std::time::{SystemTime, SystemTimeError, UNIX_EPOCH};

/// A UTC instant with one-second resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct UtcTimestamp {
    epoch_secs: u64,
}

/// Calendar fields of a [`UtcTimestamp`].
struct Civil {
    year: u32,
    month: u32,
    day: u32,
    hour: u32,
    minute: u32,
    second: u32,
}

impl UtcTimestamp {
    /// The current system time.
    ///
    /// # Errors
    ///
    /// Returns [`SystemTimeError`] when the clock is set before 1970.
    pub fn now() -> Result<Self, SystemTimeError> {
        let epoch_secs = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs();
        Ok(Self { epoch_secs })
    }

    /// A timestamp `epoch_secs` seconds after the Unix epoch.
    #[must_use]
    pub const fn from_epoch_secs(epoch_secs: u64) -> Self {
        Self { epoch_secs }
    }

    /// Format as `YYYY-MM-DDThh:mm:ssZ`.
    ///
    /// # Examples
    ///
    /// ```
    /// use updates_inbox::timestamp::UtcTimestamp;
    ///
    /// let ts = UtcTimestamp::from_epoch_secs(1_739_354_400);
    /// assert_eq!(ts.iso8601(), "2025-02-12T10:00:00Z");
    /// ```
    #[must_use]
    pub fn iso8601(self) -> String {
        let c = self.civil();
        format!(
            "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}Z",
            c.year, c.month, c.day, c.hour, c.minute, c.second
        )
    }

    /// Format as `YYYYMMDDThhmmssZ`, safe for file names.
    #[must_use]
    pub fn compact(self) -> String {
        let c = self.civil();
        format!(
            "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
            c.year, c.month, c.day, c.hour, c.minute, c.second
        )
    }

    fn civil(self) -> Civil {
        let (year, month, day) = civil_from_epoch(self.epoch_secs);
        #[expect(
            clippy::cast_possible_truncation,
            reason = "seconds within a day always fit in u32"
        )]
        let day_secs = (self.epoch_secs % 86_400) as u32;
        Civil {
            year,
            month,
            day,
            hour: day_secs / 3_600,
            minute: (day_secs % 3_600) / 60,
            second: day_secs % 60,
        }
    }
}

/// Convert a Unix epoch timestamp to a `(year, month, day)` triple.
///
/// Adapted from Howard Hinnant's `civil_from_days` algorithm, which is
/// public domain and widely used in C++ `<chrono>` implementations.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    reason = "post-epoch dates keep every intermediate positive and small"
)]
fn civil_from_epoch(epoch_secs: u64) -> (u32, u32, u32) {
    let z = (epoch_secs / 86_400) as i64 + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097) as u64; // day of era [0, 146_096]
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let y = (yoe as i64) + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // day of year
    let mp = (5 * doy + 2) / 153;
    let d = doy - (153 * mp + 2) / 5 + 1;
    let m = if mp < 10 { mp + 3 } else { mp - 9 };
    let y = if m <= 2 { y + 1 } else { y };
    (y as u32, m as u32, d as u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::epoch(0, "1970-01-01T00:00:00Z", "19700101T000000Z")]
    #[case::leap_day(951_782_400, "2000-02-29T00:00:00Z", "20000229T000000Z")]
    #[case::end_of_year(1_704_067_199, "2023-12-31T23:59:59Z", "20231231T235959Z")]
    #[case::afternoon(1_770_854_400 + 13 * 3_600 + 5 * 60 + 9, "2026-02-12T13:05:09Z", "20260212T130509Z")]
    fn formats_known_instants(
        #[case] secs: u64,
        #[case] iso: &str,
        #[case] compact: &str,
    ) {
        let ts = UtcTimestamp::from_epoch_secs(secs);
        assert_eq!(ts.iso8601(), iso);
        assert_eq!(ts.compact(), compact);
    }

    #[test]
    fn now_is_after_2020() {
        let ts = UtcTimestamp::now().expect("system time");
        assert!(ts > UtcTimestamp::from_epoch_secs(1_577_836_800));
        assert_eq!(ts.iso8601().len(), 20);
        assert_eq!(ts.compact().len(), 16);
    }
}
