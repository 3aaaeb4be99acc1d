use crate::model::{AttendanceRecord, AttendanceStatus};
use chrono::NaiveDate;
use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

/// unmarked -> presente -> ausente -> justificado -> unmarked
pub fn advance(current: Option<AttendanceStatus>) -> Option<AttendanceStatus> {
    match current {
        None => Some(AttendanceStatus::Presente),
        Some(AttendanceStatus::Presente) => Some(AttendanceStatus::Ausente),
        Some(AttendanceStatus::Ausente) => Some(AttendanceStatus::Justificado),
        Some(AttendanceStatus::Justificado) => None,
    }
}

/// Builds the full record to upsert after setting one cell.
///
/// The record id of an existing (class, date) record is reused; `new_id` is
/// only consulted when no record exists yet. A `None` status removes the key.
pub fn apply_mark(
    existing: Option<&AttendanceRecord>,
    class_id: &str,
    date: NaiveDate,
    student_id: &str,
    next: Option<AttendanceStatus>,
    new_id: impl FnOnce() -> String,
) -> AttendanceRecord {
    let mut record = match existing {
        Some(r) => r.clone(),
        None => AttendanceRecord {
            id: new_id(),
            date,
            class_id: class_id.to_string(),
            statuses: Default::default(),
        },
    };
    match next {
        Some(status) => {
            record.statuses.insert(student_id.to_string(), status);
        }
        None => {
            record.statuses.remove(student_id);
        }
    }
    record
}

pub fn find_record<'a>(
    records: &'a [AttendanceRecord],
    class_id: &str,
    date: NaiveDate,
) -> Option<&'a AttendanceRecord> {
    records
        .iter()
        .find(|r| r.class_id == class_id && r.date == date)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CellKey {
    pub student_id: String,
    pub date: NaiveDate,
}

/// Cells with a write in flight. A cell stays busy for as long as its
/// guard is alive; other cells are unaffected.
///
/// The stdin loop handles one request at a time and `Workspace::toggle_cell`
/// holds the guard only for its own synchronous write, so a second request
/// can never observe a busy cell over IPC and `cell_busy` is not produced
/// there today. The marker only rejects a toggle made while a guard for the
/// same cell is still held in-process.
#[derive(Debug, Default, Clone)]
pub struct PendingCells {
    busy: Rc<RefCell<HashSet<CellKey>>>,
}

impl PendingCells {
    pub fn try_begin(&self, key: CellKey) -> Option<CellGuard> {
        if !self.busy.borrow_mut().insert(key.clone()) {
            return None;
        }
        Some(CellGuard {
            busy: Rc::clone(&self.busy),
            key,
        })
    }
}

#[derive(Debug)]
pub struct CellGuard {
    busy: Rc<RefCell<HashSet<CellKey>>>,
    key: CellKey,
}

impl Drop for CellGuard {
    fn drop(&mut self) {
        self.busy.borrow_mut().remove(&self.key);
    }
}
