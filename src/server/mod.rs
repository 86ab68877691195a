mod auth;
pub mod dto;
pub mod response;
mod router;
mod study_plans;
mod uploads;
pub mod validation;

pub use router::{AppState, create_router};
pub use uploads::{ALLOWED_CONTENT_TYPES, MAX_FILE_SIZE, MAX_FILES};
