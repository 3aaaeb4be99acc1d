use crate::model::{AttendanceRecord, AttendanceStatus, SchoolClass, Student, StudentStatus};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Marked-session counts. Unmarked sessions are never counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tally {
    pub present: u32,
    pub justified: u32,
    pub absent: u32,
}

impl Tally {
    pub fn add(&mut self, status: AttendanceStatus) {
        match status {
            AttendanceStatus::Presente => self.present += 1,
            AttendanceStatus::Justificado => self.justified += 1,
            AttendanceStatus::Ausente => self.absent += 1,
        }
    }

    pub fn merge(&mut self, other: Tally) {
        self.present += other.present;
        self.justified += other.justified;
        self.absent += other.absent;
    }

    /// Justified absences count as attended.
    pub fn presences(&self) -> u32 {
        self.present + self.justified
    }

    pub fn total(&self) -> u32 {
        self.presences() + self.absent
    }

    pub fn percent(&self) -> Option<u32> {
        round_percent(self.presences(), self.total())
    }

    pub fn summary(&self) -> FrequencySummary {
        FrequencySummary {
            presences: self.presences(),
            absences: self.absent,
            justified: self.justified,
            frequency_percent: self.percent(),
        }
    }
}

/// Round half up to a whole percent; `None` when nothing was counted.
pub fn round_percent(part: u32, total: u32) -> Option<u32> {
    if total == 0 {
        return None;
    }
    let part = u64::from(part);
    let total = u64::from(total);
    Some(((part * 200 + total) / (total * 2)) as u32)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrequencySummary {
    pub presences: u32,
    pub absences: u32,
    pub justified: u32,
    pub frequency_percent: Option<u32>,
}

pub type StatusesByDate = HashMap<NaiveDate, BTreeMap<String, AttendanceStatus>>;

/// Statuses of one class keyed by date.
pub fn statuses_by_date(records: &[AttendanceRecord], class_id: &str) -> StatusesByDate {
    records
        .iter()
        .filter(|r| r.class_id == class_id)
        .map(|r| (r.date, r.statuses.clone()))
        .collect()
}

pub fn tally_student(
    dates: &[NaiveDate],
    statuses: &StatusesByDate,
    student_id: &str,
) -> Tally {
    let mut t = Tally::default();
    for d in dates {
        if let Some(s) = statuses.get(d).and_then(|m| m.get(student_id)) {
            t.add(*s);
        }
    }
    t
}

pub fn summarize(
    dates: &[NaiveDate],
    statuses: &StatusesByDate,
    student_id: &str,
) -> FrequencySummary {
    tally_student(dates, statuses, student_id).summary()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRow {
    pub student_id: String,
    pub name: String,
    pub status: StudentStatus,
    #[serde(flatten)]
    pub summary: FrequencySummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummary {
    pub class_id: String,
    pub rows: Vec<StudentRow>,
    #[serde(flatten)]
    pub overall: FrequencySummary,
}

/// Per-student and class-wide summaries over the given dates.
pub fn summarize_class(
    class_id: &str,
    dates: &[NaiveDate],
    records: &[AttendanceRecord],
    roster: &[&Student],
) -> ClassSummary {
    let statuses = statuses_by_date(records, class_id);
    let mut overall = Tally::default();
    let rows = roster
        .iter()
        .map(|s| {
            let t = tally_student(dates, &statuses, &s.id);
            overall.merge(t);
            StudentRow {
                student_id: s.id.clone(),
                name: s.name.clone(),
                status: s.status,
                summary: t.summary(),
            }
        })
        .collect();
    ClassSummary {
        class_id: class_id.to_string(),
        rows,
        overall: overall.summary(),
    }
}

/// Every mark a student has in one class, regardless of schedule.
pub fn student_class_history(
    records: &[AttendanceRecord],
    class_id: &str,
    student_id: &str,
) -> (Tally, Vec<(NaiveDate, AttendanceStatus)>) {
    let mut marks: Vec<(NaiveDate, AttendanceStatus)> = records
        .iter()
        .filter(|r| r.class_id == class_id)
        .filter_map(|r| r.statuses.get(student_id).map(|s| (r.date, *s)))
        .collect();
    marks.sort_by_key(|(d, _)| *d);
    let mut t = Tally::default();
    for (_, s) in &marks {
        t.add(*s);
    }
    (t, marks)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DashboardFilter<'a> {
    Always,
    Period { year: i32, semester: &'a str },
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Dashboard {
    pub class_count: usize,
    pub student_count: usize,
    pub status_counts: BTreeMap<&'static str, usize>,
    pub today_class_ids: Vec<String>,
    pub marks: Tally,
    pub frequency_percent: Option<u32>,
}

/// Dashboard figures over every class or over one year + semester.
pub fn dashboard(
    filter: DashboardFilter<'_>,
    today: NaiveDate,
    students: &[Student],
    classes: &[SchoolClass],
    records: &[AttendanceRecord],
) -> Dashboard {
    let selected: Vec<&SchoolClass> = match filter {
        DashboardFilter::Always => classes.iter().collect(),
        DashboardFilter::Period { year, semester } => {
            classes.iter().filter(|c| c.in_term(year, semester)).collect()
        }
    };

    let included: Vec<&Student> = match filter {
        DashboardFilter::Always => students.iter().collect(),
        DashboardFilter::Period { .. } => students
            .iter()
            .filter(|s| {
                selected
                    .iter()
                    .any(|c| c.has_student(&s.id) || s.is_enrolled_in(&c.id))
            })
            .collect(),
    };

    let mut status_counts = BTreeMap::new();
    for s in &included {
        *status_counts.entry(s.status.as_str()).or_insert(0) += 1;
    }

    let weekday = crate::model::Weekday::from_chrono(chrono::Datelike::weekday(&today));
    let today_class_ids = selected
        .iter()
        .filter(|c| c.days.contains(&weekday))
        .map(|c| c.id.clone())
        .collect();

    let mut marks = Tally::default();
    for r in records
        .iter()
        .filter(|r| selected.iter().any(|c| c.id == r.class_id))
    {
        for s in r.statuses.values() {
            marks.add(*s);
        }
    }

    Dashboard {
        class_count: selected.len(),
        student_count: included.len(),
        status_counts,
        today_class_ids,
        marks,
        frequency_percent: marks.percent(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Weekday;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    fn student(id: &str, status: StudentStatus, classes: &[&str]) -> Student {
        Student {
            id: id.into(),
            name: id.to_uppercase(),
            phone: String::new(),
            status,
            enrolled_class_ids: classes.iter().map(|c| c.to_string()).collect(),
            observations: None,
            registration_date: None,
        }
    }

    fn class(id: &str, year: i32, semester: &str, days: &[Weekday], ids: &[&str]) -> SchoolClass {
        SchoolClass {
            id: id.into(),
            course_name: format!("Course {id}"),
            days: days.to_vec(),
            time: "08:00".into(),
            frequency: 1,
            student_ids: ids.iter().map(|s| s.to_string()).collect(),
            position: 0,
            semester: semester.into(),
            year,
            archived: false,
            start_date: None,
            end_date: None,
        }
    }

    #[test]
    fn ten_sessions_with_two_unmarked() {
        let dates: Vec<NaiveDate> = (1..=10).map(|d| ymd(2024, 3, d)).collect();
        let mut statuses = StatusesByDate::new();
        for (i, d) in dates.iter().enumerate() {
            let status = match i {
                0..=5 => Some(AttendanceStatus::Presente),
                6 => Some(AttendanceStatus::Justificado),
                7 => Some(AttendanceStatus::Ausente),
                _ => None,
            };
            let mut m = BTreeMap::new();
            if let Some(s) = status {
                m.insert("s1".to_string(), s);
            }
            statuses.insert(*d, m);
        }
        let sum = summarize(&dates, &statuses, "s1");
        assert_eq!(sum.presences, 7);
        assert_eq!(sum.absences, 1);
        assert_eq!(sum.justified, 1);
        assert_eq!(sum.frequency_percent, Some(88));
    }

    #[test]
    fn no_marks_is_none_not_zero() {
        let dates = vec![ymd(2024, 3, 1), ymd(2024, 3, 8)];
        let sum = summarize(&dates, &StatusesByDate::new(), "s1");
        assert_eq!(sum.frequency_percent, None);
        assert_eq!(sum.presences, 0);

        let mut statuses = StatusesByDate::new();
        statuses.insert(dates[0], BTreeMap::from([("s1".to_string(), AttendanceStatus::Ausente)]));
        assert_eq!(summarize(&dates, &statuses, "s1").frequency_percent, Some(0));
    }

    #[test]
    fn marks_outside_dates_are_ignored() {
        let dates = vec![ymd(2024, 3, 1)];
        let mut statuses = StatusesByDate::new();
        statuses.insert(ymd(2024, 3, 2), BTreeMap::from([("s1".to_string(), AttendanceStatus::Ausente)]));
        assert_eq!(summarize(&dates, &statuses, "s1").frequency_percent, None);
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(round_percent(1, 8), Some(13)); // 12.5
        assert_eq!(round_percent(7, 8), Some(88)); // 87.5
        assert_eq!(round_percent(2, 3), Some(67));
        assert_eq!(round_percent(1, 3), Some(33));
        assert_eq!(round_percent(0, 0), None);
    }

    #[test]
    fn class_summary_aggregates_rows() {
        let a = student("a", StudentStatus::Cursando, &["c1"]);
        let b = student("b", StudentStatus::Cursando, &["c1"]);
        let d1 = ymd(2024, 3, 4);
        let d2 = ymd(2024, 3, 11);
        let records = vec![
            AttendanceRecord {
                id: "r1".into(),
                date: d1,
                class_id: "c1".into(),
                statuses: BTreeMap::from([
                    ("a".to_string(), AttendanceStatus::Presente),
                    ("b".to_string(), AttendanceStatus::Ausente),
                ]),
            },
            AttendanceRecord {
                id: "r2".into(),
                date: d2,
                class_id: "c1".into(),
                statuses: BTreeMap::from([("a".to_string(), AttendanceStatus::Justificado)]),
            },
            AttendanceRecord {
                id: "r3".into(),
                date: d2,
                class_id: "other".into(),
                statuses: BTreeMap::from([("b".to_string(), AttendanceStatus::Presente)]),
            },
        ];
        let sum = summarize_class("c1", &[d1, d2], &records, &[&a, &b]);
        assert_eq!(sum.rows[0].summary.frequency_percent, Some(100));
        assert_eq!(sum.rows[1].summary.frequency_percent, Some(0));
        assert_eq!(sum.overall.presences, 2);
        assert_eq!(sum.overall.absences, 1);
        assert_eq!(sum.overall.frequency_percent, Some(67));
    }

    #[test]
    fn dashboard_period_filters_classes_students_and_records() {
        let today = ymd(2024, 3, 4); // Monday
        let students = vec![
            student("a", StudentStatus::Cursando, &["c1"]),
            student("b", StudentStatus::Desistiu, &[]),
            student("c", StudentStatus::Concluiu, &["old"]),
        ];
        let classes = vec![
            class("c1", 2024, "1º Semestre", &[Weekday::Segunda], &["a", "b"]),
            class("old", 2023, "2º Semestre", &[Weekday::Segunda], &["c"]),
        ];
        let records = vec![
            AttendanceRecord {
                id: "r1".into(),
                date: today,
                class_id: "c1".into(),
                statuses: BTreeMap::from([
                    ("a".to_string(), AttendanceStatus::Presente),
                    ("b".to_string(), AttendanceStatus::Ausente),
                ]),
            },
            AttendanceRecord {
                id: "r2".into(),
                date: ymd(2023, 9, 4),
                class_id: "old".into(),
                statuses: BTreeMap::from([("c".to_string(), AttendanceStatus::Ausente)]),
            },
        ];

        let d = dashboard(
            DashboardFilter::Period {
                year: 2024,
                semester: "1º semestre ",
            },
            today,
            &students,
            &classes,
            &records,
        );
        assert_eq!(d.class_count, 1);
        assert_eq!(d.student_count, 2);
        assert_eq!(d.status_counts.get("desistiu"), Some(&1));
        assert_eq!(d.today_class_ids, vec!["c1".to_string()]);
        assert_eq!(d.frequency_percent, Some(50));

        let all = dashboard(DashboardFilter::Always, today, &students, &classes, &records);
        assert_eq!(all.student_count, 3);
        assert_eq!(all.marks.total(), 3);
        assert_eq!(all.frequency_percent, Some(33));
    }
}
