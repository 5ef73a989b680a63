#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fmt::Display;

use crate::{classroom::ClassroomApi, constants::PROBE_GRADE, error::RemoteError, roster::Snapshot};

/// Whether the caller may write grades directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Direct grade writes succeed.
    Capable,
    /// The service refused the probe write.
    Denied,
    /// The probe could not tell, e.g. a transient failure.
    Unknown,
}

impl Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Capability::Capable => "capable",
            Capability::Denied => "denied",
            Capability::Unknown => "unknown",
        })
    }
}

/// Outcome of a capability probe.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeReport {
    /// What the probe concluded
    pub capability:     Capability,
    /// Submission the probe wrote to, if any
    pub submission_id:  Option<String>,
    /// Explanation of the conclusion
    pub detail:         String,
    /// Set when the probe wrote a value and could not clear it again
    pub revert_failure: Option<RemoteError>,
}

impl ProbeReport {
    /// Whether direct writes may proceed.
    pub fn is_capable(&self) -> bool {
        self.capability == Capability::Capable
    }
}

/// Determines whether grades of the snapshot's assignment can be written.
///
/// The service offers no read-only permission check, so the probe writes a
/// draft grade to one submission. A submission that already holds a draft
/// grade is preferred and receives that same value back. Otherwise a probe
/// value is written and cleared again; a failed clear is reported in
/// [`ProbeReport::revert_failure`].
pub async fn probe_capability<A: ClassroomApi>(api: &A, snapshot: &Snapshot) -> ProbeReport {
    let assignment_id = snapshot.assignment_id();
    let target = snapshot
        .rows()
        .iter()
        .find(|r| r.draft_grade.is_some())
        .or_else(|| snapshot.rows().first());

    let Some(row) = target else {
        return ProbeReport {
            capability:     Capability::Unknown,
            submission_id:  None,
            detail:         "the assignment has no submissions to probe".into(),
            revert_failure: None,
        };
    };

    let submission_id = row.submission_id.as_str();
    let (value, needs_revert) = match row.draft_grade {
        Some(existing) => (existing, false),
        None => (PROBE_GRADE, true),
    };
    tracing::debug!("Probing grade permission on `{submission_id}` with draft grade {value}");

    let write = api.set_draft_grade(assignment_id, submission_id, value).await;
    let mut report = ProbeReport {
        capability:     Capability::Capable,
        submission_id:  Some(submission_id.to_string()),
        detail:         "draft grade write accepted".into(),
        revert_failure: None,
    };

    match write {
        Ok(()) => {}
        Err(RemoteError::PermissionDenied(msg)) => {
            report.capability = Capability::Denied;
            report.detail = msg;
            return report;
        }
        Err(err) => {
            report.capability = Capability::Unknown;
            report.detail = err.to_string();
            return report;
        }
    }

    if needs_revert && let Err(err) = api.clear_draft_grade(assignment_id, submission_id).await {
        tracing::error!(
            "Could not clear the probe draft grade {value} on `{submission_id}`: {err}. Clear it \
             manually."
        );
        report.revert_failure = Some(err);
    }

    report
}
