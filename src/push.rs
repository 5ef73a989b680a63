#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fmt::Display;

use crate::{
    classroom::ClassroomApi,
    error::RemoteError,
    reconcile::{ChangeSet, GradeChange, GradeTarget},
    roster::{RosterRow, Snapshot},
};

/// What happened to one attempted change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// The remote grade now holds the target value.
    Applied,
    /// Nothing was written because the grade already held the target value.
    Skipped,
    /// The service refused the write for lack of permission.
    PermissionDenied,
    /// The write failed for any other reason.
    Failed,
}

impl Display for PushOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            PushOutcome::Applied => "applied",
            PushOutcome::Skipped => "skipped",
            PushOutcome::PermissionDenied => "permission denied",
            PushOutcome::Failed => "failed",
        })
    }
}

/// Outcome of one [`GradeChange`].
#[derive(Debug, Clone, PartialEq)]
pub struct PushResult {
    /// Submission the change was for
    pub submission_id: String,
    /// Field(s) the change targeted
    pub kind:          GradeTarget,
    /// Value the change tried to write
    pub grade:         f64,
    /// What happened
    pub outcome:       PushOutcome,
    /// Human readable detail
    pub detail:        String,
}

/// Applies every change of `set`, one submission at a time.
///
/// A failure on one submission never stops the others; every change gets
/// exactly one result, in change-set order. Grading never returns a
/// submission to its student.
pub async fn push_changes<A: ClassroomApi>(
    api: &A,
    snapshot: &Snapshot,
    set: &ChangeSet,
) -> Vec<PushResult> {
    let total = set.changes.len();
    let mut results = Vec::with_capacity(total);

    for (i, change) in set.changes.iter().enumerate() {
        let row = snapshot.find(&change.submission_id);
        let result = match row {
            Some(row) => apply_one(api, snapshot.assignment_id(), row, change).await,
            None => PushResult {
                submission_id: change.submission_id.clone(),
                kind:          change.target_kind,
                grade:         change.target_grade,
                outcome:       PushOutcome::Failed,
                detail:        "submission is not part of the snapshot".into(),
            },
        };

        tracing::info!(
            "[{}/{}] {} ({}): {} grade {} {}",
            i + 1,
            total,
            row.map(|r| r.student_name.as_str()).unwrap_or("?"),
            change.submission_id,
            change.target_kind,
            change.target_grade,
            result.outcome
        );
        results.push(result);
    }

    results
}

/// Whether pushing `change` would write anything, given `snapshot`.
///
/// Changes whose submission is missing from the snapshot count as writes;
/// the push reports them as failed.
pub fn needs_write(snapshot: &Snapshot, change: &GradeChange) -> bool {
    snapshot.find(&change.submission_id).is_none_or(|row| {
        let (draft, assigned) = pending_writes(row, change);
        draft || assigned
    })
}

/// `(draft, assigned)`: which fields of `row` differ from the change target.
fn pending_writes(row: &RosterRow, change: &GradeChange) -> (bool, bool) {
    let value = change.target_grade;
    (
        change.target_kind.writes_draft() && row.draft_grade != Some(value),
        change.target_kind.writes_assigned() && row.assigned_grade != Some(value),
    )
}

/// Writes the fields of one change that differ from the snapshot.
async fn apply_one<A: ClassroomApi>(
    api: &A,
    assignment_id: &str,
    row: &RosterRow,
    change: &GradeChange,
) -> PushResult {
    let value = change.target_grade;
    let (write_draft, write_assigned) = pending_writes(row, change);

    let mut result = PushResult {
        submission_id: change.submission_id.clone(),
        kind:          change.target_kind,
        grade:         value,
        outcome:       PushOutcome::Skipped,
        detail:        "already at target".into(),
    };
    if !write_draft && !write_assigned {
        return result;
    }

    if write_draft
        && let Err(err) = api
            .set_draft_grade(assignment_id, &change.submission_id, value)
            .await
    {
        return failed(result, "draft", err);
    }
    if write_assigned
        && let Err(err) = api
            .set_assigned_grade(assignment_id, &change.submission_id, value)
            .await
    {
        let stage = if write_draft {
            "assigned (draft was applied)"
        } else {
            "assigned"
        };
        return failed(result, stage, err);
    }

    result.outcome = PushOutcome::Applied;
    result.detail = match (write_draft, write_assigned) {
        (true, true) => "draft and assigned grade set".into(),
        (true, false) => "draft grade set".into(),
        _ => "assigned grade set".into(),
    };
    result
}

/// Marks `result` as failed at `stage`.
fn failed(mut result: PushResult, stage: &str, err: RemoteError) -> PushResult {
    result.outcome = match err {
        RemoteError::PermissionDenied(_) => PushOutcome::PermissionDenied,
        _ => PushOutcome::Failed,
    };
    result.detail = format!("{stage}: {err}");
    result
}
