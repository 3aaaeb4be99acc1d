use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadParams(String),
    #[error("{0}")]
    Validation(String),
    #[error("another student already uses this phone number")]
    DuplicatePhone { existing_student_id: String },
    #[error("student {student_id} is already enrolled in class {class_id}")]
    AlreadyEnrolled { student_id: String, class_id: String },
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("a write for this cell is still in progress")]
    CellBusy,
    #[error("select a workspace first")]
    NoWorkspace,
    #[error("store rejected the write: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("stored row could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("{0:#}")]
    Io(#[from] anyhow::Error),
}

impl AppError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        AppError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        AppError::BadParams(message.into())
    }

    /// Stable code sent on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::BadParams(_) => "bad_params",
            AppError::Validation(_) => "validation_failed",
            AppError::DuplicatePhone { .. } => "duplicate_phone",
            AppError::AlreadyEnrolled { .. } => "already_enrolled",
            AppError::NotFound { .. } => "not_found",
            AppError::CellBusy => "cell_busy",
            AppError::NoWorkspace => "no_workspace",
            AppError::Store(_) | AppError::Decode(_) => "store_failed",
            AppError::Io(_) => "io_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            AppError::DuplicatePhone {
                existing_student_id,
            } => Some(json!({ "studentId": existing_student_id })),
            AppError::AlreadyEnrolled {
                student_id,
                class_id,
            } => Some(json!({ "studentId": student_id, "classId": class_id })),
            AppError::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
            _ => None,
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
