use chrono::NaiveDate;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StudentStatus {
    #[default]
    Cursando,
    Desistiu,
    Concluiu,
}

impl StudentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StudentStatus::Cursando => "cursando",
            StudentStatus::Desistiu => "desistiu",
            StudentStatus::Concluiu => "concluiu",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cursando" | "active" => Some(StudentStatus::Cursando),
            "desistiu" | "withdrawn" => Some(StudentStatus::Desistiu),
            "concluiu" | "completed" => Some(StudentStatus::Concluiu),
            _ => None,
        }
    }

    pub fn is_active(self) -> bool {
        self == StudentStatus::Cursando
    }
}

impl<'de> Deserialize<'de> for StudentStatus {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        StudentStatus::parse(&raw)
            .ok_or_else(|| de::Error::custom(format!("unknown student status: {raw}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub status: StudentStatus,
    /// Every class the student has ever been enrolled in.
    #[serde(default)]
    pub enrolled_class_ids: Vec<String>,
    #[serde(default)]
    pub observations: Option<String>,
    #[serde(default)]
    pub registration_date: Option<NaiveDate>,
}

impl Student {
    pub fn is_enrolled_in(&self, class_id: &str) -> bool {
        self.enrolled_class_ids.iter().any(|id| id == class_id)
    }

    /// Digits of the phone number; used for duplicate detection.
    pub fn phone_digits(&self) -> String {
        self.phone.chars().filter(|c| c.is_ascii_digit()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchoolClass {
    pub id: String,
    pub course_name: String,
    pub days: Vec<Weekday>,
    #[serde(default)]
    pub time: String,
    #[serde(default = "default_frequency")]
    pub frequency: u8,
    #[serde(default)]
    pub student_ids: Vec<String>,
    #[serde(default)]
    pub position: i64,
    pub semester: String,
    pub year: i32,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub end_date: Option<NaiveDate>,
}

fn default_frequency() -> u8 {
    1
}

impl SchoolClass {
    pub fn has_student(&self, student_id: &str) -> bool {
        self.student_ids.iter().any(|id| id == student_id)
    }

    pub fn in_term(&self, year: i32, semester: &str) -> bool {
        self.year == year && same_semester(&self.semester, semester)
    }
}

/// Semester labels are free text; compare them trimmed and case-folded.
pub fn same_semester(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Weekday {
    Segunda,
    #[serde(rename = "Terça")]
    Terca,
    Quarta,
    Quinta,
    Sexta,
    #[serde(rename = "Sábado")]
    Sabado,
    Domingo,
}

impl Weekday {
    pub fn name(self) -> &'static str {
        match self {
            Weekday::Segunda => "Segunda",
            Weekday::Terca => "Terça",
            Weekday::Quarta => "Quarta",
            Weekday::Quinta => "Quinta",
            Weekday::Sexta => "Sexta",
            Weekday::Sabado => "Sábado",
            Weekday::Domingo => "Domingo",
        }
    }

    pub fn short(self) -> &'static str {
        match self {
            Weekday::Segunda => "SEG",
            Weekday::Terca => "TER",
            Weekday::Quarta => "QUA",
            Weekday::Quinta => "QUI",
            Weekday::Sexta => "SEX",
            Weekday::Sabado => "SAB",
            Weekday::Domingo => "DOM",
        }
    }

    /// Accepts the stored names, their unaccented forms and English names.
    pub fn parse(raw: &str) -> Option<Self> {
        let t = raw.trim().to_lowercase();
        let day = match t.as_str() {
            "segunda" | "monday" => Weekday::Segunda,
            "terça" | "terca" | "tuesday" => Weekday::Terca,
            "quarta" | "wednesday" => Weekday::Quarta,
            "quinta" | "thursday" => Weekday::Quinta,
            "sexta" | "friday" => Weekday::Sexta,
            "sábado" | "sabado" | "saturday" => Weekday::Sabado,
            "domingo" | "sunday" => Weekday::Domingo,
            _ => return None,
        };
        Some(day)
    }

    pub fn from_chrono(day: chrono::Weekday) -> Self {
        match day {
            chrono::Weekday::Mon => Weekday::Segunda,
            chrono::Weekday::Tue => Weekday::Terca,
            chrono::Weekday::Wed => Weekday::Quarta,
            chrono::Weekday::Thu => Weekday::Quinta,
            chrono::Weekday::Fri => Weekday::Sexta,
            chrono::Weekday::Sat => Weekday::Sabado,
            chrono::Weekday::Sun => Weekday::Domingo,
        }
    }
}

impl<'de> Deserialize<'de> for Weekday {
    fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(d)?;
        Weekday::parse(&raw).ok_or_else(|| de::Error::custom(format!("unknown weekday: {raw}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Presente,
    Ausente,
    Justificado,
}

impl AttendanceStatus {
    /// Single-letter sheet code: P (present), F (falta), J (justified).
    pub fn code(self) -> char {
        match self {
            AttendanceStatus::Presente => 'P',
            AttendanceStatus::Ausente => 'F',
            AttendanceStatus::Justificado => 'J',
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Presente => "presente",
            AttendanceStatus::Ausente => "ausente",
            AttendanceStatus::Justificado => "justificado",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "presente" | "present" => Some(AttendanceStatus::Presente),
            "ausente" | "absent" => Some(AttendanceStatus::Ausente),
            "justificado" | "justified" => Some(AttendanceStatus::Justificado),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub date: NaiveDate,
    pub class_id: String,
    /// Missing key means the cell is unmarked.
    #[serde(default)]
    pub statuses: BTreeMap<String, AttendanceStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Holiday {
    pub id: String,
    pub date: NaiveDate,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EarningsRecord {
    pub id: String,
    /// `MM-YYYY`
    pub month: String,
    pub value_per_class: f64,
    pub classes_per_day: u32,
    pub total_classes: u32,
    pub total_amount: f64,
    #[serde(default)]
    pub selected_days: Vec<NaiveDate>,
    #[serde(default)]
    pub updated_at: Option<String>,
}
