pub use entity::{
    attendances, classes, delivery_outcomes, display_tokens, fcm_tokens, notification_jobs,
    parents, schools, student_parents, students, Id,
};

pub mod attendance;
pub mod delivery_outcome;
pub mod display_token;
pub mod error;
pub mod guardian;
pub mod notification_job;
