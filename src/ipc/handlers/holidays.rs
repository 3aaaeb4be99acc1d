use crate::calendar;
use crate::error::{AppError, AppResult};
use crate::ipc::error::respond;
use crate::ipc::params::{get_required_date, get_required_i32, get_required_str, get_required_u32, new_id};
use crate::ipc::types::{AppState, Request};
use crate::model::Holiday;
use serde_json::json;
use tracing::info;

fn handle_list(state: &mut AppState, _params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let ws = state.workspace()?;
    Ok(json!({ "holidays": ws.snapshot.holidays.as_slice() }))
}

fn handle_create(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let name = get_required_str(params, "name")?;
    let date = get_required_date(params, "date")?;
    if name.trim().is_empty() {
        return Err(AppError::Validation("holiday name is required".into()));
    }
    let holiday = Holiday {
        id: new_id(),
        date,
        name: name.trim().to_string(),
    };
    let ws = state.workspace_mut()?;
    ws.save_holiday(holiday.clone())?;
    info!(holiday_id = %holiday.id, %date, "holiday created");
    Ok(json!({ "holiday": holiday }))
}

fn handle_delete(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let id = get_required_str(params, "holidayId")?;
    state.workspace_mut()?.delete_holiday(&id)?;
    info!(holiday_id = %id, "holiday deleted");
    Ok(json!({ "deleted": true }))
}

fn handle_month(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let year = get_required_i32(params, "year")?;
    let month = get_required_u32(params, "month")?;
    let ws = state.workspace()?;
    let days = calendar::month_calendar(year, month, &ws.snapshot.holidays)
        .ok_or_else(|| AppError::bad_params("params.month must be 1..12"))?;
    Ok(json!({ "year": year, "month": month, "days": days }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "holidays.list" => handle_list(state, &req.params),
        "holidays.create" => handle_create(state, &req.params),
        "holidays.delete" => handle_delete(state, &req.params),
        "calendar.month" => handle_month(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, outcome))
}
