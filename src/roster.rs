#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{collections::HashMap, fmt::Display};

use chrono::{DateTime, Utc};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use typed_builder::TypedBuilder;

use crate::{classroom::ClassroomApi, error::SyncError};

/// Lifecycle of a student submission, as the remote service reports it.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmissionState {
    /// Created but never turned in.
    #[default]
    NotSubmitted,
    /// Turned in by the student.
    TurnedIn,
    /// Returned to the student; grades are visible.
    Returned,
    /// Taken back by the student after turning it in.
    ReclaimedByStudent,
}

impl SubmissionState {
    /// Maps the service's state names; `NEW`, `CREATED` and anything
    /// unrecognised count as not submitted.
    pub fn from_remote(state: &str) -> Self {
        match state.trim().to_ascii_uppercase().as_str() {
            "TURNED_IN" => SubmissionState::TurnedIn,
            "RETURNED" => SubmissionState::Returned,
            "RECLAIMED_BY_STUDENT" => SubmissionState::ReclaimedByStudent,
            _ => SubmissionState::NotSubmitted,
        }
    }

    /// Name used in exported tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionState::NotSubmitted => "NOT_SUBMITTED",
            SubmissionState::TurnedIn => "TURNED_IN",
            SubmissionState::Returned => "RETURNED",
            SubmissionState::ReclaimedByStudent => "RECLAIMED_BY_STUDENT",
        }
    }
}

impl Display for SubmissionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One student's state for one assignment.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, TypedBuilder)]
#[builder(field_defaults(default, setter(into)))]
#[builder(doc)]
pub struct RosterRow {
    /// Stable identifier; the only join key between snapshots.
    pub submission_id:   String,
    /// Display name. Not unique, never used for matching.
    pub student_name:    String,
    /// Remote user id of the student.
    pub student_id:      String,
    /// Email of the student, when visible.
    pub student_email:   String,
    /// Lifecycle state.
    pub state:           SubmissionState,
    /// Grade visible to the student once returned.
    pub assigned_grade:  Option<f64>,
    /// Grade never visible to the student.
    pub draft_grade:     Option<f64>,
    /// Whether the submission carries attachments.
    pub has_attachments: bool,
    /// Whether the submission was turned in after the due date.
    pub is_late:         bool,
    /// Last time the submission changed.
    pub submitted_at:    Option<DateTime<Utc>>,
}

/// Metadata of the assignment a snapshot was taken of.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct Assignment {
    /// Assignment (coursework) id
    pub id:         String,
    /// Title
    pub title:      String,
    /// Maximum points, for graded assignments
    pub max_points: Option<f64>,
    /// Due timestamp, if the assignment has one
    pub due:        Option<DateTime<Utc>>,
}

/// A point-in-time read of every submission of one assignment.
///
/// Never mutated; every cycle fetches a fresh one.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// The assignment this snapshot belongs to.
    assignment: Assignment,
    /// Rows in the order the service returned them.
    rows:       Vec<RosterRow>,
    /// Position of each submission id in `rows`.
    by_id:      HashMap<String, usize>,
}

impl Snapshot {
    /// Builds a snapshot. Should the service list a submission id twice, the
    /// first occurrence is kept.
    pub fn new(assignment: Assignment, rows: Vec<RosterRow>) -> Self {
        let mut by_id = HashMap::with_capacity(rows.len());
        let mut unique = Vec::with_capacity(rows.len());
        for row in rows {
            if by_id.contains_key(&row.submission_id) {
                tracing::warn!(
                    "Submission `{}` was listed twice for assignment `{}`; keeping the first",
                    row.submission_id,
                    assignment.id
                );
                continue;
            }
            by_id.insert(row.submission_id.clone(), unique.len());
            unique.push(row);
        }

        Self {
            assignment,
            rows: unique,
            by_id,
        }
    }

    /// Returns the assignment metadata.
    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    /// Returns the assignment id.
    pub fn assignment_id(&self) -> &str {
        &self.assignment.id
    }

    /// Returns every row.
    pub fn rows(&self) -> &[RosterRow] {
        &self.rows
    }

    /// Looks a row up by submission id.
    pub fn find(&self, submission_id: &str) -> Option<&RosterRow> {
        self.by_id.get(submission_id).map(|&i| &self.rows[i])
    }

    /// Number of submissions.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when the assignment has no submissions.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Fixed, 1-based display numbering of a snapshot for one interactive
/// session.
///
/// Rows are ordered by student name, then submission id, so the numbering is
/// stable across redraws. The numbers mean nothing to the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct DisplayIndex {
    /// `(display index, submission id)` pairs in display order.
    entries: Vec<(usize, String)>,
}

impl DisplayIndex {
    /// Numbers the rows of `snapshot`.
    pub fn new(snapshot: &Snapshot) -> Self {
        let entries = snapshot
            .rows()
            .iter()
            .sorted_by(|a, b| {
                a.student_name
                    .to_lowercase()
                    .cmp(&b.student_name.to_lowercase())
                    .then_with(|| a.submission_id.cmp(&b.submission_id))
            })
            .enumerate()
            .map(|(i, row)| (i + 1, row.submission_id.clone()))
            .collect();
        Self { entries }
    }

    /// Submission id shown at `index`.
    pub fn submission_id(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|i| self.entries.get(i))
            .map(|(_, id)| id.as_str())
    }

    /// Number of displayed rows.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is displayed.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over `(display index, submission id)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.entries.iter().map(|(i, id)| (*i, id.as_str()))
    }
}

/// Reads the current submission and grade state of one assignment.
///
/// Fails with [`SyncError::AssignmentNotFound`] when the id does not resolve
/// and [`SyncError::RemoteUnavailable`] once the transport gives up.
pub async fn fetch_snapshot<A: ClassroomApi>(
    api: &A,
    assignment_id: &str,
) -> Result<Snapshot, SyncError> {
    tracing::debug!("Fetching snapshot of assignment `{assignment_id}`");
    let assignment = api
        .assignment(assignment_id)
        .await
        .map_err(|e| SyncError::from_snapshot_failure(assignment_id, e))?;
    let rows = api
        .fetch_submissions(&assignment)
        .await
        .map_err(|e| SyncError::from_snapshot_failure(assignment_id, e))?;
    tracing::debug!("Fetched {} submissions for `{}`", rows.len(), assignment.title);

    Ok(Snapshot::new(assignment, rows))
}
