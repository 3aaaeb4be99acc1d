use crate::error::{AppError, AppResult};
use crate::model::EarningsRecord;
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;

/// Parses a `MM-YYYY` month key.
pub fn parse_month(key: &str) -> AppResult<(i32, u32)> {
    let bad = || AppError::Validation(format!("month must be MM-YYYY, got {key:?}"));
    let (m, y) = key.trim().split_once('-').ok_or_else(bad)?;
    if m.len() != 2 || y.len() != 4 {
        return Err(bad());
    }
    let month: u32 = m.parse().map_err(|_| bad())?;
    let year: i32 = y.parse().map_err(|_| bad())?;
    if !(1..=12).contains(&month) {
        return Err(bad());
    }
    Ok((year, month))
}

pub fn month_key(year: i32, month: u32) -> String {
    format!("{month:02}-{year:04}")
}

/// Sorts `MM-YYYY` keys chronologically; malformed keys sort first.
pub fn month_sort_key(key: &str) -> (i32, u32) {
    parse_month(key).unwrap_or((i32::MIN, 0))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsInput {
    pub month: String,
    pub value_per_class: f64,
    #[serde(default = "one")]
    pub classes_per_day: u32,
    #[serde(default)]
    pub selected_days: Vec<NaiveDate>,
}

fn one() -> u32 {
    1
}

/// Builds the record to store for a month. An existing record for the same
/// month keeps its id so the save replaces it.
pub fn plan_upsert(
    existing: &[EarningsRecord],
    input: EarningsInput,
    new_id: impl FnOnce() -> String,
    updated_at: String,
) -> AppResult<EarningsRecord> {
    let (year, month) = parse_month(&input.month)?;
    if !input.value_per_class.is_finite() || input.value_per_class < 0.0 {
        return Err(AppError::Validation(
            "value per class must be a non-negative number".to_string(),
        ));
    }
    if input.classes_per_day == 0 {
        return Err(AppError::Validation(
            "classes per day must be at least 1".to_string(),
        ));
    }

    let mut days = input.selected_days;
    if let Some(stray) = days
        .iter()
        .find(|d| d.year() != year || d.month() != month)
    {
        return Err(AppError::Validation(format!(
            "{stray} is outside {}",
            input.month.trim()
        )));
    }
    days.sort();
    days.dedup();

    let key = month_key(year, month);
    let id = existing
        .iter()
        .find(|r| r.month == key)
        .map(|r| r.id.clone())
        .unwrap_or_else(new_id);

    let total_classes = days.len() as u32 * input.classes_per_day;
    Ok(EarningsRecord {
        id,
        month: key,
        value_per_class: input.value_per_class,
        classes_per_day: input.classes_per_day,
        total_classes,
        total_amount: f64::from(total_classes) * input.value_per_class,
        selected_days: days,
        updated_at: Some(updated_at),
    })
}

pub fn annual_total(records: &[EarningsRecord], year: i32) -> f64 {
    records
        .iter()
        .filter(|r| parse_month(&r.month).map(|(y, _)| y == year).unwrap_or(false))
        .map(|r| r.total_amount)
        .sum()
}
