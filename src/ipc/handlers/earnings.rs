use crate::earnings::{self, EarningsInput};
use crate::error::AppResult;
use crate::ipc::error::respond;
use crate::ipc::params::{decode, get_required_i32, get_required_str, new_id};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use tracing::info;

fn handle_list(state: &mut AppState, _params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let ws = state.workspace()?;
    Ok(json!({ "records": ws.snapshot.earnings.as_slice() }))
}

fn handle_save(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let input: EarningsInput = decode(params)?;
    let ws = state.workspace_mut()?;
    let updated_at = chrono::Utc::now().to_rfc3339();
    let record = earnings::plan_upsert(&ws.snapshot.earnings, input, new_id, updated_at)?;
    ws.save_earnings(record.clone())?;
    info!(
        month = %record.month,
        total_classes = record.total_classes,
        total_amount = record.total_amount,
        "earnings saved"
    );
    Ok(json!({ "record": record }))
}

fn handle_delete(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let id = get_required_str(params, "recordId")?;
    state.workspace_mut()?.delete_earnings(&id)?;
    info!(record_id = %id, "earnings record deleted");
    Ok(json!({ "deleted": true }))
}

fn handle_annual_total(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let year = get_required_i32(params, "year")?;
    let ws = state.workspace()?;
    Ok(json!({
        "year": year,
        "total": earnings::annual_total(&ws.snapshot.earnings, year),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "earnings.list" => handle_list(state, &req.params),
        "earnings.save" => handle_save(state, &req.params),
        "earnings.delete" => handle_delete(state, &req.params),
        "earnings.annualTotal" => handle_annual_total(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, outcome))
}
