//! User-driven filter criteria and the pure predicate applied to the feed.
//!
//! Filtering runs over snapshots the client already holds; changing the
//! criteria never re-queries a source.

use chrono::{
  DateTime, Datelike, Days, Local, LocalResult, NaiveDate, NaiveTime, TimeZone,
};
use serde::{Deserialize, Serialize};

use crate::post::PostRecord;

// ─── Date range ──────────────────────────────────────────────────────────────

/// A calendar range of departure dates, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DateRange {
  /// Monday through Sunday of the current week.
  ThisWeek,
  /// Monday through Sunday of the following week.
  NextWeek,
  Custom { start: NaiveDate, end: NaiveDate },
}

impl DateRange {
  /// Resolve to `(first_day, last_day)` relative to `today`.
  pub fn days(self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    let monday = today - Days::new(u64::from(today.weekday().num_days_from_monday()));
    match self {
      Self::ThisWeek => (monday, monday + Days::new(6)),
      Self::NextWeek => (monday + Days::new(7), monday + Days::new(13)),
      Self::Custom { start, end } => (start, end),
    }
  }

  /// Resolve to inclusive epoch-millisecond bounds in `tz`: from the first
  /// millisecond of the first day to the last millisecond of the last day.
  pub fn bounds_millis<Tz: TimeZone>(self, today: NaiveDate, tz: &Tz) -> (i64, i64) {
    let (first, last) = self.days(today);
    let start = day_start_millis(first, tz);
    let end = last
      .succ_opt()
      .map_or(i64::MAX, |next| day_start_millis(next, tz) - 1);
    (start, end)
  }
}

/// Epoch millis of local midnight on `day`. A midnight skipped by a DST jump
/// falls back to the UTC interpretation.
fn day_start_millis<Tz: TimeZone>(day: NaiveDate, tz: &Tz) -> i64 {
  let midnight = day.and_time(NaiveTime::MIN);
  match tz.from_local_datetime(&midnight) {
    LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.timestamp_millis(),
    LocalResult::None => midnight.and_utc().timestamp_millis(),
  }
}

// ─── Criteria ────────────────────────────────────────────────────────────────

/// Immutable filter settings chosen by the user. All set fields are ANDed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterCriteria {
  /// Case-insensitive substring of the post's origin.
  pub origin:      Option<String>,
  /// Case-insensitive substring of the post's destination.
  pub destination: Option<String>,
  pub date_range:  Option<DateRange>,
}

impl FilterCriteria {
  /// Build criteria, trimming text fields and treating blank text as unset.
  pub fn new(
    origin: Option<String>,
    destination: Option<String>,
    date_range: Option<DateRange>,
  ) -> Self {
    Self {
      origin: non_blank(origin),
      destination: non_blank(destination),
      date_range,
    }
  }

  pub fn is_active(&self) -> bool {
    self.origin.is_some() || self.destination.is_some() || self.date_range.is_some()
  }

  /// Number of set fields, for display next to a filter control.
  pub fn active_count(&self) -> usize {
    usize::from(self.origin.is_some())
      + usize::from(self.destination.is_some())
      + usize::from(self.date_range.is_some())
  }

  /// Evaluate against the local clock and time zone.
  pub fn matches(&self, post: &PostRecord) -> bool {
    let now: DateTime<Local> = Local::now();
    self.matches_on(post, now.date_naive(), &Local)
  }

  /// Evaluate with an explicit `today` and calendar time zone.
  pub fn matches_on<Tz: TimeZone>(&self, post: &PostRecord, today: NaiveDate, tz: &Tz) -> bool {
    if let Some(origin) = &self.origin
      && !contains_ignore_case(&post.origin, origin)
    {
      return false;
    }
    if let Some(destination) = &self.destination
      && !contains_ignore_case(&post.destination, destination)
    {
      return false;
    }
    if let Some(range) = self.date_range {
      let (start, end) = range.bounds_millis(today, tz);
      if !(start..=end).contains(&post.scheduled_at_millis) {
        return false;
      }
    }
    true
  }
}

fn non_blank(s: Option<String>) -> Option<String> {
  s.map(|s| s.trim().to_owned()).filter(|s| !s.is_empty())
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
  haystack.to_lowercase().contains(&needle.to_lowercase())
}
