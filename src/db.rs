use crate::error::AppResult;
use crate::model::{
    AttendanceRecord, AttendanceStatus, EarningsRecord, Holiday, SchoolClass, Student,
    StudentStatus,
};
use crate::roster::RosterChange;
use chrono::NaiveDate;
use rusqlite::types::{Type, Value};
use rusqlite::{params_from_iter, Connection, Row};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::Path;

pub const DB_FILE: &str = "attendance.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let conn = Connection::open(workspace.join(DB_FILE))?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            phone TEXT NOT NULL DEFAULT '',
            status TEXT NOT NULL DEFAULT 'cursando',
            enrolled_class_ids TEXT NOT NULL DEFAULT '[]',
            observations TEXT,
            registration_date TEXT
        );
        CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            course_name TEXT NOT NULL,
            days TEXT NOT NULL DEFAULT '[]',
            time TEXT NOT NULL DEFAULT '',
            frequency INTEGER NOT NULL DEFAULT 1,
            student_ids TEXT NOT NULL DEFAULT '[]',
            position INTEGER NOT NULL DEFAULT 0,
            semester TEXT NOT NULL,
            year INTEGER NOT NULL,
            archived INTEGER NOT NULL DEFAULT 0,
            start_date TEXT,
            end_date TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_classes_term ON classes(year, semester);
        CREATE TABLE IF NOT EXISTS attendance_records(
            id TEXT PRIMARY KEY,
            date TEXT NOT NULL,
            class_id TEXT NOT NULL,
            statuses TEXT NOT NULL DEFAULT '{}',
            UNIQUE(class_id, date)
        );
        CREATE INDEX IF NOT EXISTS idx_attendance_records_class ON attendance_records(class_id);
        CREATE TABLE IF NOT EXISTS holidays(
            id TEXT PRIMARY KEY,
            date TEXT NOT NULL,
            name TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS earnings_records(
            id TEXT PRIMARY KEY,
            month TEXT NOT NULL UNIQUE,
            value_per_class REAL NOT NULL,
            classes_per_day INTEGER NOT NULL,
            total_classes INTEGER NOT NULL,
            total_amount REAL NOT NULL,
            selected_days TEXT NOT NULL DEFAULT '[]',
            updated_at TEXT
        );",
    )
}

/// A row type of the store. Column names are the snake_case persisted names;
/// the in-memory model is camelCase on the wire. Each impl owns the full
/// mapping for its table, in both directions.
pub trait Entity: Sized {
    const TABLE: &'static str;
    /// Persisted columns; `id` first.
    const COLUMNS: &'static [&'static str];
    const ORDER_BY: &'static str;

    fn id(&self) -> &str;
    fn to_values(&self) -> AppResult<Vec<Value>>;
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;
}

fn select_sql<T: Entity>() -> String {
    format!(
        "SELECT {} FROM {} ORDER BY {}",
        T::COLUMNS.join(", "),
        T::TABLE,
        T::ORDER_BY
    )
}

fn upsert_sql<T: Entity>() -> String {
    let placeholders = vec!["?"; T::COLUMNS.len()].join(", ");
    let updates = T::COLUMNS[1..]
        .iter()
        .map(|c| format!("{c} = excluded.{c}"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "INSERT INTO {}({}) VALUES({}) ON CONFLICT(id) DO UPDATE SET {}",
        T::TABLE,
        T::COLUMNS.join(", "),
        placeholders,
        updates
    )
}

pub fn get_all<T: Entity>(conn: &Connection) -> AppResult<Vec<T>> {
    let mut stmt = conn.prepare(&select_sql::<T>())?;
    let rows = stmt
        .query_map([], |r| T::from_row(r))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn save<T: Entity>(conn: &Connection, row: &T) -> AppResult<()> {
    conn.execute(&upsert_sql::<T>(), params_from_iter(row.to_values()?))?;
    Ok(())
}

/// Upserts every row or none of them.
pub fn save_all<T: Entity>(conn: &Connection, rows: &[T]) -> AppResult<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(&upsert_sql::<T>())?;
        for row in rows {
            stmt.execute(params_from_iter(row.to_values()?))?;
        }
    }
    tx.commit()?;
    Ok(())
}

pub fn delete<T: Entity>(conn: &Connection, id: &str) -> AppResult<bool> {
    let n = conn.execute(&format!("DELETE FROM {} WHERE id = ?", T::TABLE), [id])?;
    Ok(n > 0)
}

/// Writes both sides of a membership change in a single transaction.
/// Deleting a class also deletes its attendance records.
pub fn persist_roster_change(conn: &Connection, change: &RosterChange) -> AppResult<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(&upsert_sql::<Student>())?;
        for s in &change.students {
            stmt.execute(params_from_iter(s.to_values()?))?;
        }
        let mut stmt = tx.prepare(&upsert_sql::<SchoolClass>())?;
        for c in &change.classes {
            stmt.execute(params_from_iter(c.to_values()?))?;
        }
        for id in &change.deleted_student_ids {
            tx.execute("DELETE FROM students WHERE id = ?", [id])?;
        }
        for id in &change.deleted_class_ids {
            tx.execute("DELETE FROM attendance_records WHERE class_id = ?", [id])?;
            tx.execute("DELETE FROM classes WHERE id = ?", [id])?;
        }
    }
    tx.commit()?;
    Ok(())
}

fn to_json_text<T: serde::Serialize>(v: &T) -> AppResult<Value> {
    Ok(Value::Text(serde_json::to_string(v)?))
}

fn opt_text(v: Option<String>) -> Value {
    v.map(Value::Text).unwrap_or(Value::Null)
}

fn opt_date(v: Option<NaiveDate>) -> Value {
    opt_text(v.map(|d| d.to_string()))
}

fn json_col<T: DeserializeOwned + Default>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: Option<String> = row.get(idx)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") | Some("null") => Ok(T::default()),
        Some(text) => serde_json::from_str(text)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))),
    }
}

fn parse_date(idx: usize, raw: &str) -> rusqlite::Result<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn date_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    parse_date(idx, &raw)
}

fn opt_date_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => parse_date(idx, s).map(Some),
    }
}

impl Entity for Student {
    const TABLE: &'static str = "students";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "phone",
        "status",
        "enrolled_class_ids",
        "observations",
        "registration_date",
    ];
    const ORDER_BY: &'static str = "name, id";

    fn id(&self) -> &str {
        &self.id
    }

    fn to_values(&self) -> AppResult<Vec<Value>> {
        Ok(vec![
            Value::Text(self.id.clone()),
            Value::Text(self.name.clone()),
            Value::Text(self.phone.clone()),
            Value::Text(self.status.as_str().to_string()),
            to_json_text(&self.enrolled_class_ids)?,
            opt_text(self.observations.clone()),
            opt_date(self.registration_date),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let status: Option<String> = row.get(3)?;
        Ok(Student {
            id: row.get(0)?,
            name: row.get(1)?,
            phone: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
            status: status
                .as_deref()
                .and_then(StudentStatus::parse)
                .unwrap_or_default(),
            enrolled_class_ids: json_col(row, 4)?,
            observations: row.get(5)?,
            registration_date: opt_date_col(row, 6)?,
        })
    }
}

impl Entity for SchoolClass {
    const TABLE: &'static str = "classes";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "course_name",
        "days",
        "time",
        "frequency",
        "student_ids",
        "position",
        "semester",
        "year",
        "archived",
        "start_date",
        "end_date",
    ];
    const ORDER_BY: &'static str = "position, id";

    fn id(&self) -> &str {
        &self.id
    }

    fn to_values(&self) -> AppResult<Vec<Value>> {
        Ok(vec![
            Value::Text(self.id.clone()),
            Value::Text(self.course_name.clone()),
            to_json_text(&self.days)?,
            Value::Text(self.time.clone()),
            Value::Integer(i64::from(self.frequency)),
            to_json_text(&self.student_ids)?,
            Value::Integer(self.position),
            Value::Text(self.semester.clone()),
            Value::Integer(i64::from(self.year)),
            Value::Integer(i64::from(self.archived)),
            opt_date(self.start_date),
            opt_date(self.end_date),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(SchoolClass {
            id: row.get(0)?,
            course_name: row.get(1)?,
            days: json_col(row, 2)?,
            time: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            frequency: row.get::<_, i64>(4)?.clamp(1, 2) as u8,
            student_ids: json_col(row, 5)?,
            position: row.get(6)?,
            semester: row.get(7)?,
            year: row.get(8)?,
            archived: row.get::<_, i64>(9)? != 0,
            start_date: opt_date_col(row, 10)?,
            end_date: opt_date_col(row, 11)?,
        })
    }
}

impl Entity for AttendanceRecord {
    const TABLE: &'static str = "attendance_records";
    const COLUMNS: &'static [&'static str] = &["id", "date", "class_id", "statuses"];
    const ORDER_BY: &'static str = "date, class_id";

    fn id(&self) -> &str {
        &self.id
    }

    fn to_values(&self) -> AppResult<Vec<Value>> {
        Ok(vec![
            Value::Text(self.id.clone()),
            Value::Text(self.date.to_string()),
            Value::Text(self.class_id.clone()),
            to_json_text(&self.statuses)?,
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        // Null and unknown values read as unmarked.
        let raw: BTreeMap<String, Option<String>> = json_col(row, 3)?;
        let statuses = raw
            .into_iter()
            .filter_map(|(k, v)| v.as_deref().and_then(AttendanceStatus::parse).map(|s| (k, s)))
            .collect();
        Ok(AttendanceRecord {
            id: row.get(0)?,
            date: date_col(row, 1)?,
            class_id: row.get(2)?,
            statuses,
        })
    }
}

impl Entity for Holiday {
    const TABLE: &'static str = "holidays";
    const COLUMNS: &'static [&'static str] = &["id", "date", "name"];
    const ORDER_BY: &'static str = "date, id";

    fn id(&self) -> &str {
        &self.id
    }

    fn to_values(&self) -> AppResult<Vec<Value>> {
        Ok(vec![
            Value::Text(self.id.clone()),
            Value::Text(self.date.to_string()),
            Value::Text(self.name.clone()),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Holiday {
            id: row.get(0)?,
            date: date_col(row, 1)?,
            name: row.get(2)?,
        })
    }
}

impl Entity for EarningsRecord {
    const TABLE: &'static str = "earnings_records";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "month",
        "value_per_class",
        "classes_per_day",
        "total_classes",
        "total_amount",
        "selected_days",
        "updated_at",
    ];
    const ORDER_BY: &'static str = "substr(month, 4, 4) DESC, substr(month, 1, 2) DESC";

    fn id(&self) -> &str {
        &self.id
    }

    fn to_values(&self) -> AppResult<Vec<Value>> {
        Ok(vec![
            Value::Text(self.id.clone()),
            Value::Text(self.month.clone()),
            Value::Real(self.value_per_class),
            Value::Integer(i64::from(self.classes_per_day)),
            Value::Integer(i64::from(self.total_classes)),
            Value::Real(self.total_amount),
            to_json_text(&self.selected_days)?,
            opt_text(self.updated_at.clone()),
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(EarningsRecord {
            id: row.get(0)?,
            month: row.get(1)?,
            value_per_class: row.get(2)?,
            classes_per_day: row.get::<_, i64>(3)?.max(0) as u32,
            total_classes: row.get::<_, i64>(4)?.max(0) as u32,
            total_amount: row.get(5)?,
            selected_days: json_col(row, 6)?,
            updated_at: row.get(7)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Weekday;

    fn mem() -> Connection {
        let conn = Connection::open_in_memory().expect("open");
        init_schema(&conn).expect("schema");
        conn
    }

    fn sample_class(id: &str) -> SchoolClass {
        SchoolClass {
            id: id.into(),
            course_name: "Violão".into(),
            days: vec![Weekday::Terca, Weekday::Quinta],
            time: "18:30".into(),
            frequency: 2,
            student_ids: vec!["s1".into()],
            position: 3,
            semester: "1º Semestre".into(),
            year: 2024,
            archived: false,
            start_date: NaiveDate::from_ymd_opt(2024, 2, 5),
            end_date: None,
        }
    }

    #[test]
    fn class_row_mapping_is_lossless() {
        let conn = mem();
        let c = sample_class("c1");
        save(&conn, &c).expect("save");
        let all: Vec<SchoolClass> = get_all(&conn).expect("load");
        assert_eq!(all, vec![c]);

        let days: String = conn
            .query_row("SELECT days FROM classes WHERE id = 'c1'", [], |r| r.get(0))
            .expect("raw");
        assert_eq!(days, "[\"Terça\",\"Quinta\"]");
    }

    #[test]
    fn save_upserts_by_id() {
        let conn = mem();
        let mut c = sample_class("c1");
        save(&conn, &c).expect("insert");
        c.archived = true;
        c.student_ids.clear();
        save(&conn, &c).expect("update");
        let all: Vec<SchoolClass> = get_all(&conn).expect("load");
        assert_eq!(all.len(), 1);
        assert!(all[0].archived);
        assert!(all[0].student_ids.is_empty());
        assert!(delete::<SchoolClass>(&conn, "c1").expect("delete"));
        assert!(!delete::<SchoolClass>(&conn, "c1").expect("delete again"));
    }

    #[test]
    fn null_and_unknown_statuses_read_as_unmarked() {
        let conn = mem();
        conn.execute(
            "INSERT INTO attendance_records(id, date, class_id, statuses)
             VALUES('r1', '2024-03-04', 'c1', '{\"a\":\"presente\",\"b\":null,\"c\":\"feriado\"}')",
            [],
        )
        .expect("insert");
        let all: Vec<AttendanceRecord> = get_all(&conn).expect("load");
        assert_eq!(all[0].statuses.len(), 1);
        assert_eq!(all[0].statuses.get("a"), Some(&AttendanceStatus::Presente));
    }

    #[test]
    fn one_record_per_class_and_date() {
        let conn = mem();
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).expect("date");
        let a = AttendanceRecord {
            id: "r1".into(),
            date,
            class_id: "c1".into(),
            statuses: Default::default(),
        };
        let mut b = a.clone();
        b.id = "r2".into();
        save(&conn, &a).expect("first");
        assert!(save(&conn, &b).is_err());
    }

    #[test]
    fn save_all_is_all_or_nothing() {
        let conn = mem();
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).expect("date");
        let a = AttendanceRecord {
            id: "r1".into(),
            date,
            class_id: "c1".into(),
            statuses: Default::default(),
        };
        let mut b = a.clone();
        b.id = "r2".into();
        assert!(save_all(&conn, &[a, b]).is_err());
        let all: Vec<AttendanceRecord> = get_all(&conn).expect("load");
        assert!(all.is_empty());
    }

    #[test]
    fn roster_change_deletes_class_records() {
        let conn = mem();
        save(&conn, &sample_class("c1")).expect("class");
        save(
            &conn,
            &AttendanceRecord {
                id: "r1".into(),
                date: NaiveDate::from_ymd_opt(2024, 3, 5).expect("date"),
                class_id: "c1".into(),
                statuses: Default::default(),
            },
        )
        .expect("record");
        let change = RosterChange {
            deleted_class_ids: vec!["c1".into()],
            ..Default::default()
        };
        persist_roster_change(&conn, &change).expect("persist");
        assert!(get_all::<SchoolClass>(&conn).expect("classes").is_empty());
        assert!(get_all::<AttendanceRecord>(&conn).expect("records").is_empty());
    }
}
