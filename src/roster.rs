//! Class membership.
//!
//! Membership is recorded on both sides: `SchoolClass::student_ids` (the live
//! roster) and `Student::enrolled_class_ids` (enrollment history). Reads take
//! the union of both. Every mutation here is a pure plan: it returns the rows
//! that must be written, and the caller persists them in one transaction
//! before swapping them into the in-memory snapshot.

use crate::error::{AppError, AppResult};
use crate::model::{SchoolClass, Student, StudentStatus};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RosterChange {
    pub students: Vec<Student>,
    pub classes: Vec<SchoolClass>,
    pub deleted_student_ids: Vec<String>,
    pub deleted_class_ids: Vec<String>,
}

impl RosterChange {
    pub fn is_empty(&self) -> bool {
        self.students.is_empty()
            && self.classes.is_empty()
            && self.deleted_student_ids.is_empty()
            && self.deleted_class_ids.is_empty()
    }

    pub(crate) fn put_student(&mut self, s: Student) {
        match self.students.iter_mut().find(|x| x.id == s.id) {
            Some(slot) => *slot = s,
            None => self.students.push(s),
        }
    }

    pub(crate) fn put_class(&mut self, c: SchoolClass) {
        match self.classes.iter_mut().find(|x| x.id == c.id) {
            Some(slot) => *slot = c,
            None => self.classes.push(c),
        }
    }
}

/// Students that belong to `class` by either membership signal, each once,
/// sorted by name.
pub fn resolve_roster<'a>(class: &SchoolClass, students: &'a [Student]) -> Vec<&'a Student> {
    let mut out: Vec<&Student> = students
        .iter()
        .filter(|s| class.has_student(&s.id) || s.is_enrolled_in(&class.id))
        .collect();
    out.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    out
}

/// Students who take attendance in `class`.
pub fn active_roster<'a>(class: &SchoolClass, students: &'a [Student]) -> Vec<&'a Student> {
    resolve_roster(class, students)
        .into_iter()
        .filter(|s| s.status.is_active())
        .collect()
}

/// Students shown in class reports: active or completed.
pub fn report_roster<'a>(class: &SchoolClass, students: &'a [Student]) -> Vec<&'a Student> {
    resolve_roster(class, students)
        .into_iter()
        .filter(|s| s.status != StudentStatus::Desistiu)
        .collect()
}

fn find_student<'a>(students: &'a [Student], id: &str) -> AppResult<&'a Student> {
    students
        .iter()
        .find(|s| s.id == id)
        .ok_or_else(|| AppError::not_found("student", id))
}

fn find_class<'a>(classes: &'a [SchoolClass], id: &str) -> AppResult<&'a SchoolClass> {
    classes
        .iter()
        .find(|c| c.id == id)
        .ok_or_else(|| AppError::not_found("class", id))
}

fn push_unique(list: &mut Vec<String>, id: &str) {
    if !list.iter().any(|x| x == id) {
        list.push(id.to_string());
    }
}

pub(crate) fn remove_id(list: &mut Vec<String>, id: &str) {
    list.retain(|x| x != id);
}

fn enrolled(student: &Student, class_id: &str) -> Student {
    let mut s = student.clone();
    push_unique(&mut s.enrolled_class_ids, class_id);
    s.status = StudentStatus::Cursando;
    s
}

pub fn enroll(
    students: &[Student],
    classes: &[SchoolClass],
    class_id: &str,
    student_id: &str,
) -> AppResult<RosterChange> {
    let class = find_class(classes, class_id)?;
    let student = find_student(students, student_id)?;

    let mut c = class.clone();
    push_unique(&mut c.student_ids, student_id);

    let mut change = RosterChange::default();
    change.put_student(enrolled(student, class_id));
    change.put_class(c);
    Ok(change)
}

pub fn remove(
    students: &[Student],
    classes: &[SchoolClass],
    class_id: &str,
    student_id: &str,
) -> AppResult<RosterChange> {
    let class = find_class(classes, class_id)?;
    let student = find_student(students, student_id)?;

    let mut c = class.clone();
    remove_id(&mut c.student_ids, student_id);
    let mut s = student.clone();
    remove_id(&mut s.enrolled_class_ids, class_id);

    let mut change = RosterChange::default();
    change.put_student(s);
    change.put_class(c);
    Ok(change)
}

pub fn transfer(
    students: &[Student],
    classes: &[SchoolClass],
    student_id: &str,
    from_class_id: &str,
    to_class_id: &str,
) -> AppResult<RosterChange> {
    let from = find_class(classes, from_class_id)?;
    let to = find_class(classes, to_class_id)?;
    let student = find_student(students, student_id)?;

    if to.has_student(student_id) || student.is_enrolled_in(to_class_id) {
        return Err(AppError::AlreadyEnrolled {
            student_id: student_id.to_string(),
            class_id: to_class_id.to_string(),
        });
    }

    let mut from = from.clone();
    remove_id(&mut from.student_ids, student_id);
    let mut to = to.clone();
    push_unique(&mut to.student_ids, student_id);

    let mut s = student.clone();
    remove_id(&mut s.enrolled_class_ids, from_class_id);
    push_unique(&mut s.enrolled_class_ids, to_class_id);

    let mut change = RosterChange::default();
    change.put_class(from);
    change.put_class(to);
    change.put_student(s);
    Ok(change)
}

/// Leaving "cursando" drops the student from every live roster; the
/// enrollment history stays as it was.
pub fn set_status(
    students: &[Student],
    classes: &[SchoolClass],
    student_id: &str,
    status: StudentStatus,
) -> AppResult<RosterChange> {
    let student = find_student(students, student_id)?;
    let mut change = RosterChange::default();
    if student.status == status {
        return Ok(change);
    }
    let mut s = student.clone();
    s.status = status;
    change.put_student(s);
    if !status.is_active() {
        for c in classes.iter().filter(|c| c.has_student(student_id)) {
            let mut c = c.clone();
            remove_id(&mut c.student_ids, student_id);
            change.put_class(c);
        }
    }
    Ok(change)
}

/// The class edit form: `selected` becomes the class's roster, and the
/// difference is applied to each student's enrollment history.
pub fn set_class_roster(
    students: &[Student],
    class: SchoolClass,
    selected: &[String],
) -> RosterChange {
    let mut change = RosterChange::default();
    let mut class = class;
    class.student_ids.clear();
    for id in selected {
        push_unique(&mut class.student_ids, id);
    }

    for s in students {
        let wanted = class.has_student(&s.id);
        let has = s.is_enrolled_in(&class.id);
        // A selected student may still carry this class in their history
        // after withdrawing; selecting them again must reactivate them.
        if wanted && (!has || !s.status.is_active()) {
            change.put_student(enrolled(s, &class.id));
        } else if !wanted && has {
            let mut s = s.clone();
            remove_id(&mut s.enrolled_class_ids, &class.id);
            change.put_student(s);
        }
    }
    change.put_class(class);
    change
}

/// Archives every non-archived class and creates an empty-roster copy of
/// each for the given term.
pub fn clone_to_term(
    classes: &[SchoolClass],
    year: i32,
    semester: &str,
    mut new_id: impl FnMut() -> String,
) -> AppResult<RosterChange> {
    let active: Vec<&SchoolClass> = classes.iter().filter(|c| !c.archived).collect();
    if active.is_empty() {
        return Err(AppError::Validation("there are no active classes to clone".into()));
    }
    let mut change = RosterChange::default();
    for c in &active {
        let mut archived = (*c).clone();
        archived.archived = true;
        change.put_class(archived);
    }
    for c in active {
        change.put_class(SchoolClass {
            id: new_id(),
            course_name: c.course_name.clone(),
            days: c.days.clone(),
            time: c.time.clone(),
            frequency: c.frequency,
            student_ids: Vec::new(),
            position: c.position,
            semester: semester.to_string(),
            year,
            archived: false,
            start_date: None,
            end_date: None,
        });
    }
    Ok(change)
}

pub fn delete_student(
    students: &[Student],
    classes: &[SchoolClass],
    student_id: &str,
) -> AppResult<RosterChange> {
    find_student(students, student_id)?;
    let mut change = RosterChange::default();
    for c in classes.iter().filter(|c| c.has_student(student_id)) {
        let mut c = c.clone();
        remove_id(&mut c.student_ids, student_id);
        change.put_class(c);
    }
    change.deleted_student_ids.push(student_id.to_string());
    Ok(change)
}

pub fn delete_class(
    students: &[Student],
    classes: &[SchoolClass],
    class_id: &str,
) -> AppResult<RosterChange> {
    find_class(classes, class_id)?;
    let mut change = RosterChange::default();
    for s in students.iter().filter(|s| s.is_enrolled_in(class_id)) {
        let mut s = s.clone();
        remove_id(&mut s.enrolled_class_ids, class_id);
        change.put_student(s);
    }
    change.deleted_class_ids.push(class_id.to_string());
    Ok(change)
}

/// Rewrites positions 0..n following `ordered_ids`; classes not listed keep
/// their relative order after the listed ones.
pub fn reorder(classes: &[SchoolClass], ordered_ids: &[String]) -> AppResult<RosterChange> {
    for id in ordered_ids {
        find_class(classes, id)?;
    }
    let mut ordered: Vec<&SchoolClass> = ordered_ids
        .iter()
        .filter_map(|id| classes.iter().find(|c| &c.id == id))
        .collect();
    let mut rest: Vec<&SchoolClass> = classes
        .iter()
        .filter(|c| !ordered_ids.contains(&c.id))
        .collect();
    rest.sort_by_key(|c| c.position);
    ordered.extend(rest);

    let mut change = RosterChange::default();
    for (i, c) in ordered.into_iter().enumerate() {
        let mut c = c.clone();
        c.position = i as i64;
        change.put_class(c);
    }
    Ok(change)
}
