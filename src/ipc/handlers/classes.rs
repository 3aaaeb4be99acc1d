use crate::error::{AppError, AppResult};
use crate::forms::{self, ClassForm};
use crate::ipc::error::respond;
use crate::ipc::params::{
    decode, get_opt_date, get_opt_str, get_required_i32, get_required_str, get_str_list, new_id,
};
use crate::ipc::types::{AppState, Request};
use crate::model::SchoolClass;
use crate::roster::{self, RosterChange};
use crate::state::Workspace;
use serde_json::json;
use tracing::info;

fn class_json(ws: &Workspace, id: &str) -> AppResult<serde_json::Value> {
    Ok(json!({ "class": ws.snapshot.class(id)? }))
}

fn handle_list(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let ws = state.workspace()?;
    let year = params.get("year").and_then(|v| v.as_i64());
    let semester = get_opt_str(params, "semester");
    let include_archived = params
        .get("includeArchived")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);

    let classes: Vec<&SchoolClass> = ws
        .snapshot
        .classes
        .iter()
        .filter(|c| include_archived || !c.archived)
        .filter(|c| year.map(|y| i64::from(c.year) == y).unwrap_or(true))
        .filter(|c| {
            semester
                .as_deref()
                .map(|s| crate::model::same_semester(&c.semester, s))
                .unwrap_or(true)
        })
        .collect();
    Ok(json!({ "classes": classes }))
}

fn handle_roster(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let class_id = get_required_str(params, "classId")?;
    let ws = state.workspace()?;
    let class = ws.snapshot.class(&class_id)?;
    let students = roster::resolve_roster(class, &ws.snapshot.students);
    Ok(json!({ "classId": class_id, "students": students }))
}

fn save(state: &mut AppState, form: ClassForm) -> AppResult<serde_json::Value> {
    let ws = state.workspace_mut()?;
    let id = form.id.clone().unwrap_or_else(new_id);
    let change =
        forms::plan_class_save(&ws.snapshot.students, &ws.snapshot.classes, form, || id.clone())?;
    let students_touched = change.students.len();
    ws.commit_roster(change)?;
    info!(class_id = %id, students_touched, "class saved");
    class_json(ws, &id)
}

fn handle_create(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let mut form: ClassForm = decode(params)?;
    form.id = None;
    save(state, form)
}

fn handle_update(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let form: ClassForm = decode(params)?;
    if form.id.is_none() {
        return Err(AppError::bad_params("missing params.id"));
    }
    save(state, form)
}

fn handle_delete(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let class_id = get_required_str(params, "classId")?;
    let ws = state.workspace_mut()?;
    let change = roster::delete_class(&ws.snapshot.students, &ws.snapshot.classes, &class_id)?;
    let touched = change.students.len();
    ws.commit_roster(change)?;
    info!(%class_id, students_touched = touched, "class deleted");
    Ok(json!({ "deleted": true, "studentsUpdated": touched }))
}

fn handle_reorder(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let ids = get_str_list(params, "classIds")?;
    let ws = state.workspace_mut()?;
    let change = roster::reorder(&ws.snapshot.classes, &ids)?;
    ws.commit_roster(change)?;
    let order: Vec<&str> = ws.snapshot.classes.iter().map(|c| c.id.as_str()).collect();
    Ok(json!({ "classIds": order }))
}

fn handle_update_term_dates(
    state: &mut AppState,
    params: &serde_json::Value,
) -> AppResult<serde_json::Value> {
    let year = get_required_i32(params, "year")?;
    let semester = get_required_str(params, "semester")?;
    let start = get_opt_date(params, "startDate")?;
    let end = get_opt_date(params, "endDate")?;
    let ws = state.workspace_mut()?;
    let rows = forms::plan_term_dates(&ws.snapshot.classes, year, &semester, start, end);
    let updated = rows.len();
    ws.commit_classes(rows)?;
    info!(year, %semester, updated, "term dates updated");
    Ok(json!({ "updated": updated }))
}

fn handle_clone_to_term(
    state: &mut AppState,
    params: &serde_json::Value,
) -> AppResult<serde_json::Value> {
    let year = get_required_i32(params, "year")?;
    let semester = get_required_str(params, "semester")?;
    if semester.trim().is_empty() {
        return Err(AppError::bad_params("params.semester must not be empty"));
    }
    let ws = state.workspace_mut()?;
    let change = roster::clone_to_term(&ws.snapshot.classes, year, semester.trim(), new_id)?;
    let created: Vec<String> = change
        .classes
        .iter()
        .filter(|c| !c.archived)
        .map(|c| c.id.clone())
        .collect();
    let archived = change.classes.len() - created.len();
    ws.commit_roster(change)?;
    info!(year, %semester, archived, created = created.len(), "classes cloned to new term");
    Ok(json!({ "archived": archived, "createdClassIds": created }))
}

fn membership(
    state: &mut AppState,
    params: &serde_json::Value,
    plan: impl FnOnce(&Workspace, &str, &str) -> AppResult<RosterChange>,
) -> AppResult<serde_json::Value> {
    let class_id = get_required_str(params, "classId")?;
    let student_id = get_required_str(params, "studentId")?;
    let ws = state.workspace_mut()?;
    let change = plan(ws, &class_id, &student_id)?;
    ws.commit_roster(change)?;
    Ok(json!({
        "class": ws.snapshot.class(&class_id)?,
        "student": ws.snapshot.student(&student_id)?,
    }))
}

fn handle_enroll(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    membership(state, params, |ws, class_id, student_id| {
        info!(class_id, student_id, "enrolling student");
        roster::enroll(&ws.snapshot.students, &ws.snapshot.classes, class_id, student_id)
    })
}

fn handle_remove(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    membership(state, params, |ws, class_id, student_id| {
        info!(class_id, student_id, "removing student from class");
        roster::remove(&ws.snapshot.students, &ws.snapshot.classes, class_id, student_id)
    })
}

fn handle_transfer(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let student_id = get_required_str(params, "studentId")?;
    let from = get_required_str(params, "fromClassId")?;
    let to = get_required_str(params, "toClassId")?;
    let ws = state.workspace_mut()?;
    let change = roster::transfer(&ws.snapshot.students, &ws.snapshot.classes, &student_id, &from, &to)?;
    ws.commit_roster(change)?;
    info!(%student_id, %from, %to, "student transferred");
    Ok(json!({
        "student": ws.snapshot.student(&student_id)?,
        "fromClass": ws.snapshot.class(&from)?,
        "toClass": ws.snapshot.class(&to)?,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "classes.list" => handle_list(state, &req.params),
        "classes.roster" => handle_roster(state, &req.params),
        "classes.create" => handle_create(state, &req.params),
        "classes.update" => handle_update(state, &req.params),
        "classes.delete" => handle_delete(state, &req.params),
        "classes.reorder" => handle_reorder(state, &req.params),
        "classes.updateTermDates" => handle_update_term_dates(state, &req.params),
        "classes.cloneToTerm" => handle_clone_to_term(state, &req.params),
        "classes.enroll" => handle_enroll(state, &req.params),
        "classes.removeStudent" => handle_remove(state, &req.params),
        "classes.transfer" => handle_transfer(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, outcome))
}
