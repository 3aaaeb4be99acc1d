use crate::attendance::{self, CellKey, PendingCells};
use crate::db::{self, Entity};
use crate::earnings;
use crate::error::{AppError, AppResult};
use crate::model::{AttendanceRecord, AttendanceStatus, EarningsRecord, Holiday, SchoolClass, Student};
use crate::roster::RosterChange;
use chrono::NaiveDate;
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Immutable view of every collection. Mutations build a new snapshot;
/// readers holding the old one never see a partial update.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub students: Arc<Vec<Student>>,
    pub classes: Arc<Vec<SchoolClass>>,
    pub records: Arc<Vec<AttendanceRecord>>,
    pub holidays: Arc<Vec<Holiday>>,
    pub earnings: Arc<Vec<EarningsRecord>>,
}

fn upsert_by_id<T: Entity + Clone>(list: &[T], rows: &[T]) -> Vec<T> {
    let mut out = list.to_vec();
    for row in rows {
        match out.iter_mut().find(|x| x.id() == row.id()) {
            Some(slot) => *slot = row.clone(),
            None => out.push(row.clone()),
        }
    }
    out
}

fn sort_students(list: &mut [Student]) {
    list.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
}

fn sort_classes(list: &mut [SchoolClass]) {
    list.sort_by(|a, b| a.position.cmp(&b.position).then_with(|| a.id.cmp(&b.id)));
}

impl Snapshot {
    pub fn load(conn: &Connection) -> AppResult<Self> {
        Ok(Self {
            students: Arc::new(db::get_all(conn)?),
            classes: Arc::new(db::get_all(conn)?),
            records: Arc::new(db::get_all(conn)?),
            holidays: Arc::new(db::get_all(conn)?),
            earnings: Arc::new(db::get_all(conn)?),
        })
    }

    pub fn class(&self, id: &str) -> AppResult<&SchoolClass> {
        self.classes
            .iter()
            .find(|c| c.id == id)
            .ok_or_else(|| AppError::not_found("class", id))
    }

    pub fn student(&self, id: &str) -> AppResult<&Student> {
        self.students
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| AppError::not_found("student", id))
    }

    pub fn with_roster_change(&self, change: &RosterChange) -> Snapshot {
        let mut students = upsert_by_id(&self.students, &change.students);
        students.retain(|s| !change.deleted_student_ids.contains(&s.id));
        sort_students(&mut students);

        let mut classes = upsert_by_id(&self.classes, &change.classes);
        classes.retain(|c| !change.deleted_class_ids.contains(&c.id));
        sort_classes(&mut classes);

        let records = if change.deleted_class_ids.is_empty() {
            Arc::clone(&self.records)
        } else {
            Arc::new(
                self.records
                    .iter()
                    .filter(|r| !change.deleted_class_ids.contains(&r.class_id))
                    .cloned()
                    .collect(),
            )
        };

        Snapshot {
            students: Arc::new(students),
            classes: Arc::new(classes),
            records,
            ..self.clone()
        }
    }

    pub fn with_classes(&self, rows: &[SchoolClass]) -> Snapshot {
        let mut classes = upsert_by_id(&self.classes, rows);
        sort_classes(&mut classes);
        Snapshot {
            classes: Arc::new(classes),
            ..self.clone()
        }
    }

    pub fn with_record(&self, record: &AttendanceRecord) -> Snapshot {
        Snapshot {
            records: Arc::new(upsert_by_id(&self.records, std::slice::from_ref(record))),
            ..self.clone()
        }
    }

    pub fn with_holidays(&self, holidays: Vec<Holiday>) -> Snapshot {
        let mut holidays = holidays;
        holidays.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
        Snapshot {
            holidays: Arc::new(holidays),
            ..self.clone()
        }
    }

    /// Newest month first.
    pub fn with_earnings(&self, rows: Vec<EarningsRecord>) -> Snapshot {
        let mut rows = rows;
        rows.sort_by_key(|r| std::cmp::Reverse(earnings::month_sort_key(&r.month)));
        Snapshot {
            earnings: Arc::new(rows),
            ..self.clone()
        }
    }
}

/// An open workspace: the store connection plus the current snapshot.
pub struct Workspace {
    pub path: PathBuf,
    pub conn: Connection,
    pub snapshot: Snapshot,
    pub pending: PendingCells,
}

impl Workspace {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = db::open_db(path)?;
        let snapshot = Snapshot::load(&conn)?;
        info!(
            workspace = %path.display(),
            students = snapshot.students.len(),
            classes = snapshot.classes.len(),
            records = snapshot.records.len(),
            "workspace opened"
        );
        Ok(Self {
            path: path.to_path_buf(),
            conn,
            snapshot,
            pending: PendingCells::default(),
        })
    }

    /// Persists a membership change, then publishes it.
    pub fn commit_roster(&mut self, change: RosterChange) -> AppResult<()> {
        if change.is_empty() {
            return Ok(());
        }
        if let Err(e) = db::persist_roster_change(&self.conn, &change) {
            warn!(error = %e, "roster change rejected by store");
            return Err(e);
        }
        debug!(
            students = change.students.len(),
            classes = change.classes.len(),
            "roster change committed"
        );
        self.snapshot = self.snapshot.with_roster_change(&change);
        Ok(())
    }

    pub fn commit_classes(&mut self, rows: Vec<SchoolClass>) -> AppResult<()> {
        if let Err(e) = db::save_all(&self.conn, &rows) {
            warn!(error = %e, count = rows.len(), "bulk class update rejected by store");
            return Err(e);
        }
        self.snapshot = self.snapshot.with_classes(&rows);
        Ok(())
    }

    pub fn save_holiday(&mut self, holiday: Holiday) -> AppResult<()> {
        if let Err(e) = db::save(&self.conn, &holiday) {
            warn!(error = %e, "holiday write failed");
            return Err(e);
        }
        let mut rows: Vec<Holiday> = self.snapshot.holidays.to_vec();
        rows.retain(|h| h.id != holiday.id);
        rows.push(holiday);
        self.snapshot = self.snapshot.with_holidays(rows);
        Ok(())
    }

    pub fn delete_holiday(&mut self, id: &str) -> AppResult<()> {
        if !db::delete::<Holiday>(&self.conn, id)? {
            return Err(AppError::not_found("holiday", id));
        }
        let rows = self.snapshot.holidays.iter().filter(|h| h.id != id).cloned().collect();
        self.snapshot = self.snapshot.with_holidays(rows);
        Ok(())
    }

    pub fn save_earnings(&mut self, record: EarningsRecord) -> AppResult<()> {
        if let Err(e) = db::save(&self.conn, &record) {
            warn!(error = %e, month = %record.month, "earnings write failed");
            return Err(e);
        }
        let mut rows: Vec<EarningsRecord> = self.snapshot.earnings.to_vec();
        rows.retain(|r| r.id != record.id);
        rows.push(record);
        self.snapshot = self.snapshot.with_earnings(rows);
        Ok(())
    }

    pub fn delete_earnings(&mut self, id: &str) -> AppResult<()> {
        if !db::delete::<EarningsRecord>(&self.conn, id)? {
            return Err(AppError::not_found("earnings record", id));
        }
        let rows = self.snapshot.earnings.iter().filter(|r| r.id != id).cloned().collect();
        self.snapshot = self.snapshot.with_earnings(rows);
        Ok(())
    }

    /// Advances one attendance cell and persists the whole record.
    ///
    /// Nothing is published until the store accepts the write, so a failed
    /// write leaves the previous state in place.
    pub fn toggle_cell(
        &mut self,
        class_id: &str,
        student_id: &str,
        date: NaiveDate,
    ) -> AppResult<(AttendanceRecord, Option<AttendanceStatus>)> {
        self.snapshot.class(class_id)?;
        self.snapshot.student(student_id)?;

        let key = CellKey {
            student_id: student_id.to_string(),
            date,
        };
        let Some(_guard) = self.pending.try_begin(key) else {
            debug!(class_id, student_id, %date, "cell busy, click ignored");
            return Err(AppError::CellBusy);
        };

        let existing = attendance::find_record(&self.snapshot.records, class_id, date);
        let current = existing.and_then(|r| r.statuses.get(student_id).copied());
        let next = attendance::advance(current);
        let record = attendance::apply_mark(existing, class_id, date, student_id, next, || {
            uuid::Uuid::new_v4().to_string()
        });

        if let Err(e) = db::save(&self.conn, &record) {
            warn!(error = %e, class_id, student_id, %date, "attendance write failed");
            return Err(e);
        }
        self.snapshot = self.snapshot.with_record(&record);
        Ok((record, next))
    }
}
