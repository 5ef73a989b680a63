#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::fmt;

/// Errors reported by the remote classroom collaborator.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum RemoteError {
    /// The caller's credentials may not perform this operation.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    /// The service could not be reached, or kept failing after the retry
    /// budget was spent.
    #[error("Remote service unavailable: {0}")]
    Unavailable(String),
    /// The addressed resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
    /// The service refused the request for another reason.
    #[error("Request rejected ({status}): {message}")]
    Rejected {
        /// HTTP status code returned by the service
        status:  u16,
        /// Message extracted from the error body
        message: String,
    },
}

impl RemoteError {
    /// True for failures worth retrying at the transport level.
    pub fn is_transient(&self) -> bool {
        matches!(self, RemoteError::Unavailable(_))
    }
}

/// Errors that abort a whole run.
///
/// Everything else is recovered locally and surfaced in the report.
#[derive(thiserror::Error, Debug)]
pub enum SyncError {
    /// The grade table's required shape is broken.
    #[error("Malformed grade table: {0}")]
    MalformedTable(String),
    /// The assignment id did not resolve.
    #[error("Assignment `{0}` was not found")]
    AssignmentNotFound(String),
    /// The initial snapshot could not be fetched.
    #[error("Could not reach the classroom service: {0}")]
    RemoteUnavailable(String),
    /// Any other remote failure while building the snapshot.
    #[error(transparent)]
    Remote(RemoteError),
    /// Reading or writing the grade table failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl SyncError {
    /// Maps a remote failure during the snapshot read onto the run-fatal
    /// taxonomy.
    pub fn from_snapshot_failure(assignment_id: &str, err: RemoteError) -> Self {
        match err {
            RemoteError::NotFound(_) => SyncError::AssignmentNotFound(assignment_id.to_string()),
            RemoteError::Unavailable(msg) => SyncError::RemoteUnavailable(msg),
            other => SyncError::Remote(other),
        }
    }
}

/// Why a single input row was excluded from a change set.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// The submission id is not part of the current snapshot.
    UnknownSubmission(String),
    /// The grade is not a finite number within the accepted range.
    InvalidGrade(String),
    /// A grade was entered on a row without a submission id.
    MissingSubmissionId,
    /// A bulk selector token could not be parsed.
    MalformedToken(String),
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::UnknownSubmission(id) => write!(f, "unknown submission `{id}`"),
            RejectReason::InvalidGrade(msg) => write!(f, "invalid grade: {msg}"),
            RejectReason::MissingSubmissionId => write!(f, "missing submission id"),
            RejectReason::MalformedToken(msg) => write!(f, "malformed selector: {msg}"),
        }
    }
}
