#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::roster::{Assignment, RosterRow, SubmissionState};

/// A calendar date as the service encodes it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct DateWire {
    /// Year
    pub year:  i32,
    /// Month, 1-12
    pub month: u32,
    /// Day of month
    pub day:   u32,
}

/// A time of day as the service encodes it. Omitted fields are zero.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default)]
pub struct TimeWire {
    /// Hours, 0-23
    #[serde(default)]
    pub hours:   u32,
    /// Minutes, 0-59
    #[serde(default)]
    pub minutes: u32,
}

/// One coursework item.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct CourseWorkWire {
    /// Coursework id
    pub id:         String,
    /// Title shown to students
    #[serde(default)]
    pub title:      String,
    /// Maximum points, when the assignment is graded
    #[serde(default)]
    pub max_points: Option<f64>,
    /// Due date (UTC)
    #[serde(default)]
    pub due_date:   Option<DateWire>,
    /// Due time (UTC)
    #[serde(default)]
    pub due_time:   Option<TimeWire>,
}

impl CourseWorkWire {
    /// Combines the due date and time into a UTC timestamp.
    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        let date = self.due_date?;
        let time = self.due_time.unwrap_or_default();
        let date = NaiveDate::from_ymd_opt(date.year, date.month, date.day)?;
        let time = NaiveTime::from_hms_opt(time.hours, time.minutes, 0)?;
        Some(date.and_time(time).and_utc())
    }
}

impl From<CourseWorkWire> for Assignment {
    fn from(wire: CourseWorkWire) -> Self {
        let due = wire.due_at();
        Assignment {
            id: wire.id,
            title: wire.title,
            max_points: wire.max_points,
            due,
        }
    }
}

/// The attachments container of a submission.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct AssignmentSubmissionWire {
    /// Attachment payloads; only their presence matters here.
    #[serde(default)]
    pub attachments: Vec<serde_json::Value>,
}

/// One student submission.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StudentSubmissionWire {
    /// Submission id
    pub id:                    String,
    /// Remote user id of the student
    #[serde(default)]
    pub user_id:               String,
    /// Lifecycle state
    #[serde(default)]
    pub state:                 String,
    /// Assigned grade, if any
    #[serde(default)]
    pub assigned_grade:        Option<f64>,
    /// Draft grade, if any
    #[serde(default)]
    pub draft_grade:           Option<f64>,
    /// Whether the service flags this submission as late
    #[serde(default)]
    pub late:                  Option<bool>,
    /// Creation timestamp
    #[serde(default)]
    pub creation_time:         Option<DateTime<Utc>>,
    /// Last update timestamp
    #[serde(default)]
    pub update_time:           Option<DateTime<Utc>>,
    /// Attachments of an assignment-type submission
    #[serde(default)]
    pub assignment_submission: Option<AssignmentSubmissionWire>,
}

impl StudentSubmissionWire {
    /// Builds a roster row, resolving the student's profile and lateness.
    pub fn into_row(
        self,
        profiles: &HashMap<String, ProfileWire>,
        due: Option<DateTime<Utc>>,
    ) -> RosterRow {
        let state = SubmissionState::from_remote(&self.state);
        let is_late = self.late.unwrap_or_else(|| match (due, self.update_time) {
            (Some(due), Some(updated)) => state == SubmissionState::TurnedIn && updated > due,
            _ => false,
        });
        let has_attachments = self
            .assignment_submission
            .as_ref()
            .is_some_and(|sub| !sub.attachments.is_empty());
        let profile = profiles.get(&self.user_id);

        RosterRow {
            submission_id: self.id,
            student_name: profile
                .and_then(|p| p.name.as_ref())
                .map(|n| n.full_name.clone())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("User {}", self.user_id)),
            student_email: profile
                .and_then(|p| p.email_address.clone())
                .unwrap_or_default(),
            student_id: self.user_id,
            state,
            assigned_grade: self.assigned_grade,
            draft_grade: self.draft_grade,
            has_attachments,
            is_late,
            submitted_at: self.update_time.or(self.creation_time),
        }
    }
}

/// One page of the submissions listing.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPage {
    /// Submissions on this page
    #[serde(default)]
    pub student_submissions: Vec<StudentSubmissionWire>,
    /// Token for the next page; absent on the last one
    #[serde(default)]
    pub next_page_token:     Option<String>,
}

/// A person's name.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct NameWire {
    /// Full display name
    #[serde(default)]
    pub full_name: String,
}

/// A user profile.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct ProfileWire {
    /// Display name
    #[serde(default)]
    pub name:          Option<NameWire>,
    /// Email, if visible to the caller
    #[serde(default)]
    pub email_address: Option<String>,
}

/// A course roster entry.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct StudentWire {
    /// Remote user id
    pub user_id: String,
    /// Profile of the student
    #[serde(default)]
    pub profile: ProfileWire,
}

/// One page of the course roster listing.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct StudentPage {
    /// Students on this page
    #[serde(default)]
    pub students:        Vec<StudentWire>,
    /// Token for the next page; absent on the last one
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Error envelope returned by the service.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ErrorEnvelope {
    /// Error details
    #[serde(default)]
    pub error: ErrorBody,
}

/// Error details returned by the service.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ErrorBody {
    /// HTTP-equivalent status code
    #[serde(default)]
    pub code:    u16,
    /// Human readable message
    #[serde(default)]
    pub message: String,
    /// Canonical status name, e.g. `PERMISSION_DENIED`
    #[serde(default)]
    pub status:  String,
}
