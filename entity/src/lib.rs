// School records (owned by the attendance application, read here)
pub mod attendance_status;
pub mod attendances;
pub mod classes;
pub mod display_tokens;
pub mod fcm_tokens;
pub mod parents;
pub mod schools;
pub mod student_parents;
pub mod students;

// Notification delivery (owned by this service)
pub mod delivery_outcomes;
pub mod delivery_result;
pub mod notification_jobs;

/// A type alias that represents the school records' integer primary keys.
/// Aliased so that it's easy to change the underlying type if necessary.
pub type Id = i64;
