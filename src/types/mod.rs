mod job;
mod models;
mod study_plan;

pub use job::{FileMeta, JobStatus, UploadJob};
pub use models::{RESET_CODE_TTL_MINUTES, RefreshToken, ResetCode, User};
pub use study_plan::{CalendarEntry, CourseEntries, PlanEntry, StudyPeriod, StudyPlan, Task};
