use crate::calendar;
use crate::frequency::{self, StatusesByDate};
use crate::model::{AttendanceRecord, SchoolClass, Student};
use anyhow::Context;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::path::Path;

fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Columns of an attendance sheet: the class schedule plus any date that
/// already carries a record, so off-schedule marks stay visible.
pub fn sheet_dates(class: &SchoolClass, records: &[AttendanceRecord]) -> Vec<NaiveDate> {
    let mut dates: BTreeSet<NaiveDate> = calendar::class_session_dates(class)
        .into_iter()
        .map(|s| s.date)
        .collect();
    dates.extend(
        records
            .iter()
            .filter(|r| r.class_id == class.id)
            .map(|r| r.date),
    );
    dates.into_iter().collect()
}

pub fn default_file_name(class: &SchoolClass) -> String {
    let course = class.course_name.split_whitespace().collect::<Vec<_>>().join("_");
    format!("Frequencia_{}_{}.csv", course, class.year)
}

fn cell(statuses: &StatusesByDate, date: &NaiveDate, student_id: &str) -> String {
    statuses
        .get(date)
        .and_then(|m| m.get(student_id))
        .map(|s| s.code().to_string())
        .unwrap_or_default()
}

/// Renders the class sheet as CSV text.
pub fn class_sheet_csv(
    class: &SchoolClass,
    roster: &[&Student],
    records: &[AttendanceRecord],
) -> String {
    let dates = sheet_dates(class, records);
    let statuses = frequency::statuses_by_date(records, &class.id);

    let mut lines = Vec::with_capacity(roster.len() + 4);
    lines.push(csv_quote(&format!(
        "RELATÓRIO DE FREQUÊNCIA - {}",
        class.course_name.to_uppercase()
    )));
    lines.push(csv_quote(&format!(
        "Período: {} • {}",
        class.year, class.semester
    )));
    lines.push(String::new());

    let mut header = vec!["Aluno".to_string()];
    header.extend(dates.iter().map(|d| d.format("%d/%m").to_string()));
    header.extend(["Faltas", "Presenças", "% Frequência"].map(String::from));
    lines.push(header.join(","));

    for student in roster {
        let mut row = vec![csv_quote(&student.name)];
        row.extend(dates.iter().map(|d| cell(&statuses, d, &student.id)));
        let summary = frequency::summarize(&dates, &statuses, &student.id);
        row.push(summary.absences.to_string());
        row.push(summary.presences.to_string());
        row.push(
            summary
                .frequency_percent
                .map(|p| format!("{p}%"))
                .unwrap_or_default(),
        );
        lines.push(row.join(","));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

pub fn write_sheet(out_path: &Path, csv: &str) -> anyhow::Result<()> {
    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }
    std::fs::write(out_path, csv)
        .with_context(|| format!("failed to write {}", out_path.display()))
}
