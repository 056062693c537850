//! Activity type and date extraction from track names.
//!
//! Track names follow the pattern `<type> <date> ...`, e.g. `"Run 05/01/2020"`
//! or `"Morning Ride 2020-05-02"`. The type is the leading run of non-digit
//! characters; the date is parsed from the text starting at the first digit,
//! ignoring whatever follows it (`"Run 05/01/2020-1047"` is dated 2020-05-01).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Activity type used when a name is empty.
pub const UNKNOWN_ACTIVITY_TYPE: &str = "Unknown";

/// Type and date derived from a track name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityInfo {
    pub activity_type: String,
    /// `None` when the name carries no parseable date
    pub activity_date: Option<NaiveDate>,
}

impl ActivityInfo {
    /// Derive type and date from a raw track name.
    ///
    /// `formats` are chrono format strings. The one that consumes the longest
    /// date prefix wins; on a tie the earlier format is used.
    ///
    /// # Example
    /// ```
    /// use run_history::naming::ActivityInfo;
    /// use chrono::NaiveDate;
    ///
    /// let info = ActivityInfo::from_name("Run 05/01/2020", &["%m/%d/%Y"]);
    /// assert_eq!(info.activity_type, "Run");
    /// assert_eq!(info.activity_date, NaiveDate::from_ymd_opt(2020, 5, 1));
    /// ```
    pub fn from_name<S: AsRef<str>>(name: &str, formats: &[S]) -> Self {
        let digit_start = name.find(|c: char| c.is_ascii_digit());

        let (head, tail) = match digit_start {
            Some(idx) => name.split_at(idx),
            None => (name, ""),
        };

        let mut activity_type = head.trim().to_string();
        if activity_type.is_empty() {
            activity_type = name.trim().to_string();
        }
        if activity_type.is_empty() {
            activity_type = UNKNOWN_ACTIVITY_TYPE.to_string();
        }

        Self {
            activity_type,
            activity_date: parse_leading_date(tail, formats),
        }
    }
}

/// Date at the start of `s`, with any trailing text left unparsed.
fn parse_leading_date<S: AsRef<str>>(s: &str, formats: &[S]) -> Option<NaiveDate> {
    if s.is_empty() {
        return None;
    }
    // `%y` stops after two year digits, so `05/01/2019` must go to `%Y`
    formats
        .iter()
        .filter_map(|fmt| NaiveDate::parse_and_remainder(s, fmt.as_ref()).ok())
        .min_by_key(|(_, rest)| rest.len())
        .map(|(date, _)| date)
}
