use crate::calendar::Term;
use crate::error::{AppError, AppResult};
use crate::export;
use crate::frequency::{self, DashboardFilter};
use crate::ipc::error::respond;
use crate::ipc::params::{get_opt_date, get_opt_str, get_required_i32, get_required_path, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::roster;
use chrono::Datelike;
use serde_json::json;
use tracing::info;

fn handle_class_summary(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let class_id = get_required_str(params, "classId")?;
    let ws = state.workspace()?;
    let class = ws.snapshot.class(&class_id)?;
    let dates = export::sheet_dates(class, &ws.snapshot.records);
    let students = roster::report_roster(class, &ws.snapshot.students);
    let summary = frequency::summarize_class(&class_id, &dates, &ws.snapshot.records, &students);
    Ok(json!({ "dates": dates, "summary": summary }))
}

fn handle_student_history(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let student_id = get_required_str(params, "studentId")?;
    let ws = state.workspace()?;
    let student = ws.snapshot.student(&student_id)?;

    let mut overall = frequency::Tally::default();
    let classes: Vec<serde_json::Value> = ws
        .snapshot
        .classes
        .iter()
        .filter(|c| c.has_student(&student_id) || student.is_enrolled_in(&c.id))
        .map(|c| {
            let (tally, marks) =
                frequency::student_class_history(&ws.snapshot.records, &c.id, &student_id);
            overall.merge(tally);
            let marks: Vec<serde_json::Value> = marks
                .into_iter()
                .map(|(date, status)| json!({ "date": date, "status": status }))
                .collect();
            json!({
                "classId": c.id,
                "courseName": c.course_name,
                "year": c.year,
                "semester": c.semester,
                "archived": c.archived,
                "summary": tally.summary(),
                "marks": marks,
            })
        })
        .collect();

    Ok(json!({
        "student": student,
        "classes": classes,
        "overall": overall.summary(),
    }))
}

fn handle_dashboard(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let ws = state.workspace()?;
    let today = get_opt_date(params, "today")?.unwrap_or_else(|| chrono::Local::now().date_naive());
    let mode = get_opt_str(params, "mode").unwrap_or_else(|| "always".to_string());
    let semester;
    let filter = match mode.as_str() {
        "always" => DashboardFilter::Always,
        "period" => {
            // Without an explicit term the dashboard looks at the one containing `today`.
            let year = match params.get("year") {
                Some(_) => get_required_i32(params, "year")?,
                None => today.year(),
            };
            semester = get_opt_str(params, "semester")
                .unwrap_or_else(|| Term::for_date(today).label().to_string());
            DashboardFilter::Period {
                year,
                semester: &semester,
            }
        }
        other => {
            return Err(AppError::bad_params(format!(
                "params.mode must be always or period, got {other}"
            )))
        }
    };
    let dash = frequency::dashboard(
        filter,
        today,
        &ws.snapshot.students,
        &ws.snapshot.classes,
        &ws.snapshot.records,
    );
    Ok(json!({ "dashboard": dash }))
}

fn handle_export_class_csv(state: &mut AppState, params: &serde_json::Value) -> AppResult<serde_json::Value> {
    let class_id = get_required_str(params, "classId")?;
    let ws = state.workspace()?;
    let class = ws.snapshot.class(&class_id)?;
    let out_path = match params.get("outPath") {
        Some(_) => get_required_path(params, "outPath")?,
        None => ws.path.join("exports").join(export::default_file_name(class)),
    };
    let students = roster::report_roster(class, &ws.snapshot.students);
    let csv = export::class_sheet_csv(class, &students, &ws.snapshot.records);
    export::write_sheet(&out_path, &csv)?;
    info!(%class_id, path = %out_path.display(), rows = students.len(), "class sheet exported");
    Ok(json!({
        "path": out_path.to_string_lossy(),
        "rowsExported": students.len(),
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "reports.classSummary" => handle_class_summary(state, &req.params),
        "reports.studentHistory" => handle_student_history(state, &req.params),
        "reports.dashboard" => handle_dashboard(state, &req.params),
        "reports.exportClassCsv" => handle_export_class_csv(state, &req.params),
        _ => return None,
    };
    Some(respond(&req.id, outcome))
}
