use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("invalid class id {input:?}: expected an integer in [0, 300]")]
    InvalidClassId { input: String },

    #[error("grade store unavailable: {0}")]
    StoreUnavailable(#[from] sqlx::Error),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("student_id must be >= 0, got {0}")]
    NegativeStudentId(i32),

    #[error("class_id must be in [0, 300], got {0}")]
    ClassIdOutOfRange(i32),
}
