use crate::calendar;
use crate::error::{AppError, AppResult};
use crate::ipc::error::respond;
use crate::ipc::params::{
    get_opt_date, get_required_i32, get_required_path, get_required_str, get_weekdays,
};
use crate::ipc::types::{AppState, Request};
use crate::state::Workspace;
use serde_json::json;
use tracing::info;

fn handle_health(state: &mut AppState, _params: &serde_json::Value) -> AppResult<serde_json::Value> {
    Ok(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": state.workspace.as_ref().map(|w| w.path.to_string_lossy().to_string())
    }))
}

fn handle_workspace_select(
    state: &mut AppState,
    params: &serde_json::Value,
) -> AppResult<serde_json::Value> {
    let path = get_required_path(params, "path")?;
    // Release the old connection before opening the new one.
    state.workspace = None;
    let ws = Workspace::open(&path).map_err(AppError::Io)?;
    let result = json!({
        "workspacePath": path.to_string_lossy(),
        "students": ws.snapshot.students.len(),
        "classes": ws.snapshot.classes.len(),
    });
    state.workspace = Some(ws);
    info!(workspace = %path.display(), "workspace selected");
    Ok(result)
}

/// Session dates for an ad-hoc schedule; no workspace needed.
fn handle_session_dates(
    _state: &mut AppState,
    params: &serde_json::Value,
) -> AppResult<serde_json::Value> {
    let year = get_required_i32(params, "year")?;
    let semester = get_required_str(params, "semester")?;
    let weekdays = get_weekdays(params, "days")?;
    let start = get_opt_date(params, "startDate")?;
    let end = get_opt_date(params, "endDate")?;
    let dates = calendar::generate_session_dates(year, &semester, &weekdays, start, end);
    Ok(json!({ "dates": dates }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "health" => handle_health(state, &req.params),
        "workspace.select" => handle_workspace_select(state, &req.params),
        "calendar.sessionDates" => handle_session_dates(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, outcome))
}
