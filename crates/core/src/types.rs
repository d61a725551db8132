/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Seconds from the start of a video half. Event and clip positions are
/// stored in this form rather than wall-clock time so that the two halves
/// of a match can be analyzed independently.
pub type VideoSecs = f64;
