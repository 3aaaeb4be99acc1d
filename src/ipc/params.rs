//! Parameter extraction shared by the handlers.

use crate::error::{AppError, AppResult};
use crate::model::Weekday;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeSet;
use std::path::PathBuf;

pub fn get_required_str(params: &Value, key: &str) -> AppResult<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| AppError::bad_params(format!("missing params.{key}")))
}

pub fn get_opt_str(params: &Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

pub fn get_required_i32(params: &Value, key: &str) -> AppResult<i32> {
    params
        .get(key)
        .and_then(|v| v.as_i64())
        .and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| AppError::bad_params(format!("params.{key} must be an integer")))
}

pub fn get_required_u32(params: &Value, key: &str) -> AppResult<u32> {
    params
        .get(key)
        .and_then(|v| v.as_u64())
        .and_then(|n| u32::try_from(n).ok())
        .ok_or_else(|| AppError::bad_params(format!("params.{key} must be a positive integer")))
}

pub fn get_required_path(params: &Value, key: &str) -> AppResult<PathBuf> {
    get_required_str(params, key).map(PathBuf::from)
}

fn parse_date(key: &str, raw: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::bad_params(format!("params.{key} must be YYYY-MM-DD")))
}

pub fn get_required_date(params: &Value, key: &str) -> AppResult<NaiveDate> {
    let raw = get_required_str(params, key)?;
    parse_date(key, &raw)
}

/// Absent, null and empty strings all mean "no date".
pub fn get_opt_date(params: &Value, key: &str) -> AppResult<Option<NaiveDate>> {
    match get_opt_str(params, key) {
        Some(raw) => parse_date(key, &raw).map(Some),
        None => Ok(None),
    }
}

pub fn get_str_list(params: &Value, key: &str) -> AppResult<Vec<String>> {
    let Some(items) = params.get(key).and_then(|v| v.as_array()) else {
        return Err(AppError::bad_params(format!("params.{key} must be an array")));
    };
    items
        .iter()
        .map(|v| {
            v.as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| AppError::bad_params(format!("params.{key} must hold strings")))
        })
        .collect()
}

pub fn get_weekdays(params: &Value, key: &str) -> AppResult<BTreeSet<Weekday>> {
    get_str_list(params, key)?
        .iter()
        .map(|raw| {
            Weekday::parse(raw)
                .ok_or_else(|| AppError::bad_params(format!("unknown weekday: {raw}")))
        })
        .collect()
}

/// Deserializes the whole params object into a form type.
pub fn decode<T: DeserializeOwned>(params: &Value) -> AppResult<T> {
    serde_json::from_value(params.clone()).map_err(|e| AppError::bad_params(e.to_string()))
}

pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
