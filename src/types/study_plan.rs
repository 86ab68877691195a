use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A study plan written by the external syllabus workflow. Read-only to the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudyPlan {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub courses: Vec<CourseEntries>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_courses: Option<i64>,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseEntries {
    pub course: String,
    #[serde(default)]
    pub entries: Vec<PlanEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntry {
    pub assessment_name: String,
    pub assessment_type: String,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub study_period: Option<StudyPeriod>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyPeriod {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    #[serde(default)]
    pub task: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub estimated_time: Option<String>,
}

/// One assessment flattened out of its course, as shown on the calendar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEntry {
    pub course: String,
    pub assessment_name: String,
    pub assessment_type: String,
    pub due_date: Option<String>,
    pub study_period: Option<StudyPeriod>,
    pub tasks: Vec<Task>,
}

impl StudyPlan {
    /// Flattens every course's entries and orders them by due date, undated entries last.
    #[must_use]
    pub fn calendar_entries(&self) -> Vec<CalendarEntry> {
        let mut entries: Vec<CalendarEntry> = self
            .courses
            .iter()
            .flat_map(|course| {
                course.entries.iter().map(move |entry| CalendarEntry {
                    course: course.course.clone(),
                    assessment_name: entry.assessment_name.clone(),
                    assessment_type: entry.assessment_type.clone(),
                    due_date: entry.due_date.clone().filter(|d| !d.trim().is_empty()),
                    study_period: entry.study_period.clone(),
                    tasks: entry.tasks.clone(),
                })
            })
            .collect();

        entries.sort_by(|a, b| compare_due(a.due_date.as_deref(), b.due_date.as_deref()));
        entries
    }
}

fn compare_due(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a.and_then(parse_due_date), b.and_then(parse_due_date)) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Accepts RFC 3339 timestamps, `YYYY-MM-DDTHH:MM:SS`, and plain `YYYY-MM-DD` dates.
/// Anything else is treated like a missing due date.
fn parse_due_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.naive_utc())
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str, due: Option<&str>) -> PlanEntry {
        PlanEntry {
            assessment_name: name.to_string(),
            assessment_type: "exam".to_string(),
            due_date: due.map(str::to_string),
            study_period: None,
            tasks: vec![],
        }
    }

    fn plan(courses: Vec<CourseEntries>) -> StudyPlan {
        StudyPlan {
            id: "plan-1".to_string(),
            user_id: "user-1".to_string(),
            courses,
            total_courses: None,
            saved_at: Utc::now(),
        }
    }

    #[test]
    fn test_calendar_orders_by_due_date_with_missing_last() {
        let plan = plan(vec![CourseEntries {
            course: "CS 101".to_string(),
            entries: vec![
                entry("Final", Some("2024-03-01")),
                entry("Participation", None),
                entry("Midterm", Some("2024-01-15")),
            ],
        }]);

        let dues: Vec<Option<String>> = plan
            .calendar_entries()
            .into_iter()
            .map(|e| e.due_date)
            .collect();

        assert_eq!(
            dues,
            vec![
                Some("2024-01-15".to_string()),
                Some("2024-03-01".to_string()),
                None
            ]
        );
    }

    #[test]
    fn test_calendar_flattens_all_courses() {
        let plan = plan(vec![
            CourseEntries {
                course: "MATH 200".to_string(),
                entries: vec![entry("Quiz 1", Some("2024-02-10T09:00:00Z"))],
            },
            CourseEntries {
                course: "HIST 110".to_string(),
                entries: vec![entry("Essay", Some("2024-02-01"))],
            },
        ]);

        let entries = plan.calendar_entries();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].course, "HIST 110");
        assert_eq!(entries[0].assessment_name, "Essay");
        assert_eq!(entries[1].course, "MATH 200");
    }

    #[test]
    fn test_blank_and_unparseable_dates_sort_last() {
        let plan = plan(vec![CourseEntries {
            course: "BIO 150".to_string(),
            entries: vec![
                entry("Lab report", Some("")),
                entry("Poster", Some("sometime in march")),
                entry("Exam", Some("2024-04-20")),
            ],
        }]);

        let entries = plan.calendar_entries();
        assert_eq!(entries[0].assessment_name, "Exam");
        assert!(entries.iter().any(|e| e.assessment_name == "Lab report" && e.due_date.is_none()));
    }

    #[test]
    fn test_plan_deserializes_workflow_document() {
        let raw = serde_json::json!({
            "id": "p1",
            "userId": "u1",
            "savedAt": "2024-01-05T12:00:00Z",
            "courses": [{
                "course": "CS 101",
                "entries": [{
                    "assessmentName": "Project",
                    "assessmentType": "assignment",
                    "studyPeriod": {"start": "2024-01-10", "end": "2024-01-20"},
                    "tasks": [{"task": "Outline", "estimatedTime": "2h"}]
                }]
            }]
        });

        let plan: StudyPlan = serde_json::from_value(raw).unwrap();
        let entry = &plan.courses[0].entries[0];
        assert_eq!(entry.due_date, None);
        assert_eq!(entry.tasks[0].estimated_time.as_deref(), Some("2h"));
        assert_eq!(
            entry.study_period.as_ref().and_then(|p| p.end.as_deref()),
            Some("2024-01-20")
        );
    }
}
