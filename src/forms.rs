//! Create/update forms for students and classes.

use crate::error::{AppError, AppResult};
use crate::model::{SchoolClass, Student, StudentStatus, Weekday};
use crate::roster::{self, RosterChange};
use chrono::NaiveDate;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentForm {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub status: StudentStatus,
    #[serde(default)]
    pub observations: Option<String>,
    #[serde(default)]
    pub registration_date: Option<NaiveDate>,
}

/// Saves a student from the form. Enrollment history is never edited here;
/// a status other than "cursando" drops the student from live rosters.
pub fn plan_student_save(
    students: &[Student],
    classes: &[SchoolClass],
    form: StudentForm,
    new_id: impl FnOnce() -> String,
    today: NaiveDate,
) -> AppResult<RosterChange> {
    let name = form.name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name is required".into()));
    }

    let existing = match form.id.as_deref() {
        Some(id) => Some(
            students
                .iter()
                .find(|s| s.id == id)
                .ok_or_else(|| AppError::not_found("student", id))?,
        ),
        None => None,
    };

    let mut student = Student {
        id: existing.map(|s| s.id.clone()).unwrap_or_else(new_id),
        name: name.to_string(),
        phone: form.phone.trim().to_string(),
        status: form.status,
        enrolled_class_ids: existing
            .map(|s| s.enrolled_class_ids.clone())
            .unwrap_or_default(),
        observations: form.observations.filter(|o| !o.trim().is_empty()),
        registration_date: form
            .registration_date
            .or_else(|| existing.and_then(|s| s.registration_date)),
    };
    if existing.is_none() && student.registration_date.is_none() {
        student.registration_date = Some(today);
    }

    let digits = student.phone_digits();
    if !digits.is_empty() {
        if let Some(other) = students
            .iter()
            .find(|s| s.id != student.id && s.phone_digits() == digits)
        {
            return Err(AppError::DuplicatePhone {
                existing_student_id: other.id.clone(),
            });
        }
    }

    let mut change = RosterChange::default();
    if !student.status.is_active() {
        for c in classes.iter().filter(|c| c.has_student(&student.id)) {
            let mut c = c.clone();
            roster::remove_id(&mut c.student_ids, &student.id);
            change.put_class(c);
        }
    }
    change.put_student(student);
    Ok(change)
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassForm {
    #[serde(default)]
    pub id: Option<String>,
    pub course_name: String,
    #[serde(default)]
    pub days: Vec<Weekday>,
    #[serde(default)]
    pub time: String,
    #[serde(default = "one")]
    pub frequency: u8,
    #[serde(default)]
    pub student_ids: Vec<String>,
    pub year: i32,
    pub semester: String,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

fn one() -> u8 {
    1
}

/// Saves a class from the form; the selected students become its roster.
pub fn plan_class_save(
    students: &[Student],
    classes: &[SchoolClass],
    form: ClassForm,
    new_id: impl FnOnce() -> String,
) -> AppResult<RosterChange> {
    let course_name = form.course_name.trim();
    if course_name.is_empty() || form.days.is_empty() {
        return Err(AppError::Validation(
            "course name and at least one weekday are required".into(),
        ));
    }
    if form.semester.trim().is_empty() {
        return Err(AppError::Validation("semester is required".into()));
    }
    if !matches!(form.frequency, 1 | 2) {
        return Err(AppError::Validation(format!(
            "frequency must be 1 or 2 sessions per week, got {}",
            form.frequency
        )));
    }
    for id in &form.student_ids {
        if !students.iter().any(|s| &s.id == id) {
            return Err(AppError::not_found("student", id.clone()));
        }
    }

    let existing = match form.id.as_deref() {
        Some(id) => Some(
            classes
                .iter()
                .find(|c| c.id == id)
                .ok_or_else(|| AppError::not_found("class", id))?,
        ),
        None => None,
    };

    let mut days = form.days;
    days.sort();
    days.dedup();

    let class = SchoolClass {
        id: existing.map(|c| c.id.clone()).unwrap_or_else(new_id),
        course_name: course_name.to_string(),
        days,
        time: form.time.trim().to_string(),
        frequency: form.frequency,
        student_ids: Vec::new(),
        position: existing
            .map(|c| c.position)
            .unwrap_or(classes.len() as i64),
        semester: form.semester.trim().to_string(),
        year: form.year,
        archived: existing.map(|c| c.archived).unwrap_or(false),
        start_date: form.start_date,
        end_date: form.end_date,
    };
    Ok(roster::set_class_roster(students, class, &form.student_ids))
}

/// Sets the same start and end date on every class of a year + semester.
pub fn plan_term_dates(
    classes: &[SchoolClass],
    year: i32,
    semester: &str,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
) -> Vec<SchoolClass> {
    classes
        .iter()
        .filter(|c| c.in_term(year, semester))
        .map(|c| SchoolClass {
            start_date,
            end_date,
            ..c.clone()
        })
        .collect()
}
