use crate::model::{Holiday, SchoolClass, Weekday};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Term {
    First,
    Second,
}

impl Term {
    /// Anything that is not recognisably the first half is treated as the
    /// second half, matching how stored labels have always been read.
    pub fn from_label(label: &str) -> Self {
        let t = label.trim().to_lowercase();
        let first = t.starts_with('1') || t == "first half" || t.starts_with("1st");
        if first {
            Term::First
        } else {
            Term::Second
        }
    }

    pub fn for_date(date: NaiveDate) -> Self {
        if date.month() <= 6 {
            Term::First
        } else {
            Term::Second
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Term::First => "1º Semestre",
            Term::Second => "2º Semestre",
        }
    }

    /// Feb 1 to end of June, or Aug 1 to Dec 31.
    pub fn default_range(self, year: i32) -> Option<(NaiveDate, NaiveDate)> {
        let (start_month, end_month) = match self {
            Term::First => (2, 6),
            Term::Second => (8, 12),
        };
        let start = NaiveDate::from_ymd_opt(year, start_month, 1)?;
        let end = last_day_of_month(year, end_month)?;
        Some((start, end))
    }
}

pub fn days_in_month(year: i32, month: u32) -> Option<u32> {
    last_day_of_month(year, month).map(|d| d.day())
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    let (ny, nm) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(ny, nm, 1)?.pred_opt()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionDate {
    pub date: NaiveDate,
    pub day_name: &'static str,
    pub short: &'static str,
}

impl SessionDate {
    pub fn new(date: NaiveDate) -> Self {
        let day = Weekday::from_chrono(date.weekday());
        Self {
            date,
            day_name: day.name(),
            short: day.short(),
        }
    }
}

/// Every date in the term (or the explicit range, when both ends are given)
/// that falls on one of `weekdays`, in ascending order.
///
/// Dates are calendar dates with no time component, so there is no
/// timezone or daylight-saving shift to guard against.
pub fn generate_session_dates(
    year: i32,
    semester_label: &str,
    weekdays: &BTreeSet<Weekday>,
    explicit_start: Option<NaiveDate>,
    explicit_end: Option<NaiveDate>,
) -> Vec<SessionDate> {
    if weekdays.is_empty() {
        return Vec::new();
    }
    let range = match (explicit_start, explicit_end) {
        (Some(s), Some(e)) => Some((s, e)),
        _ => Term::from_label(semester_label).default_range(year),
    };
    let Some((start, end)) = range else {
        return Vec::new();
    };

    start
        .iter_days()
        .take_while(|d| *d <= end)
        .filter(|d| weekdays.contains(&Weekday::from_chrono(d.weekday())))
        .map(SessionDate::new)
        .collect()
}

/// Session dates for a class from its own schedule and term.
pub fn class_session_dates(class: &SchoolClass) -> Vec<SessionDate> {
    let weekdays: BTreeSet<Weekday> = class.days.iter().copied().collect();
    generate_session_dates(
        class.year,
        &class.semester,
        &weekdays,
        class.start_date,
        class.end_date,
    )
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarDay {
    pub date: NaiveDate,
    pub day_name: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holiday: Option<String>,
}

/// One entry per day of the month, each carrying the holiday name if any.
/// Holidays are only markers here; they never remove session dates.
pub fn month_calendar(year: i32, month: u32, holidays: &[Holiday]) -> Option<Vec<CalendarDay>> {
    let days = days_in_month(year, month)?;
    let out = (1..=days)
        .filter_map(|d| NaiveDate::from_ymd_opt(year, month, d))
        .map(|date| CalendarDay {
            date,
            day_name: Weekday::from_chrono(date.weekday()).name(),
            holiday: holidays
                .iter()
                .find(|h| h.date == date)
                .map(|h| h.name.clone()),
        })
        .collect();
    Some(out)
}
