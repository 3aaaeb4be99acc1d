use crate::error::{AppError, AppResult};
use crate::forms::{self, StudentForm};
use crate::ipc::error::respond;
use crate::ipc::params::{decode, get_opt_str, get_required_str, new_id};
use crate::ipc::types::{AppState, Request};
use crate::model::{Student, StudentStatus};
use crate::roster;
use serde_json::json;
use tracing::info;

fn student_json(ws: &crate::state::Workspace, id: &str) -> AppResult<serde_json::Value> {
    let s = ws.snapshot.student(id)?;
    Ok(json!({ "student": s }))
}

fn handle_list(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let ws = state.workspace()?;
    let status = match get_opt_str(params, "status") {
        Some(raw) => Some(
            StudentStatus::parse(&raw)
                .ok_or_else(|| AppError::bad_params(format!("unknown status: {raw}")))?,
        ),
        None => None,
    };
    let students: Vec<&Student> = ws
        .snapshot
        .students
        .iter()
        .filter(|s| status.map(|st| s.status == st).unwrap_or(true))
        .collect();
    Ok(json!({ "students": students }))
}

fn save(state: &mut AppState, form: StudentForm) -> AppResult<serde_json::Value> {
    let ws = state.workspace_mut()?;
    let today = chrono::Local::now().date_naive();
    let change = forms::plan_student_save(
        &ws.snapshot.students,
        &ws.snapshot.classes,
        form,
        new_id,
        today,
    )?;
    let id = change
        .students
        .first()
        .map(|s| s.id.clone())
        .unwrap_or_default();
    ws.commit_roster(change)?;
    info!(student_id = %id, "student saved");
    student_json(ws, &id)
}

fn handle_create(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let mut form: StudentForm = decode(params)?;
    form.id = None;
    save(state, form)
}

fn handle_update(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let form: StudentForm = decode(params)?;
    if form.id.is_none() {
        return Err(AppError::bad_params("missing params.id"));
    }
    save(state, form)
}

fn handle_delete(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let student_id = get_required_str(params, "studentId")?;
    let ws = state.workspace_mut()?;
    let change = roster::delete_student(&ws.snapshot.students, &ws.snapshot.classes, &student_id)?;
    let touched = change.classes.len();
    ws.commit_roster(change)?;
    info!(%student_id, classes_touched = touched, "student deleted");
    Ok(json!({ "deleted": true, "classesUpdated": touched }))
}

fn handle_set_status(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let student_id = get_required_str(params, "studentId")?;
    let raw = get_required_str(params, "status")?;
    let status = StudentStatus::parse(&raw)
        .ok_or_else(|| AppError::bad_params(format!("unknown status: {raw}")))?;
    let ws = state.workspace_mut()?;
    let change = roster::set_status(&ws.snapshot.students, &ws.snapshot.classes, &student_id, status)?;
    let touched = change.classes.len();
    ws.commit_roster(change)?;
    info!(%student_id, status = status.as_str(), classes_touched = touched, "student status changed");
    let mut out = student_json(ws, &student_id)?;
    out["classesUpdated"] = json!(touched);
    Ok(out)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "students.list" => handle_list(state, &req.params),
        "students.create" => handle_create(state, &req.params),
        "students.update" => handle_update(state, &req.params),
        "students.delete" => handle_delete(state, &req.params),
        "students.setStatus" => handle_set_status(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, outcome))
}
