use crate::calendar::SessionDate;
use crate::error::AppResult;
use crate::export;
use crate::frequency;
use crate::ipc::error::respond;
use crate::ipc::params::{get_required_date, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::roster;
use chrono::NaiveDate;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::info;

fn handle_sheet_open(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let class_id = get_required_str(params, "classId")?;
    let ws = state.workspace()?;
    let class = ws.snapshot.class(&class_id)?;

    // Same columns as the class report, so both show the same percentages.
    let dates = export::sheet_dates(class, &ws.snapshot.records);
    let sessions: Vec<SessionDate> = dates.iter().copied().map(SessionDate::new).collect();
    let students = roster::active_roster(class, &ws.snapshot.students);
    let statuses = frequency::statuses_by_date(&ws.snapshot.records, &class_id);

    let marks: BTreeMap<NaiveDate, _> = statuses
        .iter()
        .filter(|(_, m)| !m.is_empty())
        .map(|(d, m)| (*d, m))
        .collect();
    let rows: Vec<serde_json::Value> = students
        .iter()
        .map(|s| {
            json!({
                "student": s,
                "summary": frequency::summarize(&dates, &statuses, &s.id),
            })
        })
        .collect();

    Ok(json!({
        "class": class,
        "dates": sessions,
        "students": rows,
        "marks": marks,
    }))
}

fn handle_toggle(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let class_id = get_required_str(params, "classId")?;
    let student_id = get_required_str(params, "studentId")?;
    let date = get_required_date(params, "date")?;
    let ws = state.workspace_mut()?;
    let (record, status) = ws.toggle_cell(&class_id, &student_id, date)?;
    info!(
        %class_id,
        %student_id,
        %date,
        status = status.map(|s| s.as_str()).unwrap_or("unmarked"),
        "attendance cell toggled"
    );
    Ok(json!({
        "recordId": record.id,
        "classId": class_id,
        "studentId": student_id,
        "date": date,
        "status": status,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "attendance.sheetOpen" => handle_sheet_open(state, &req.params),
        "attendance.toggle" => handle_toggle(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, outcome))
}
