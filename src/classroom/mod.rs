#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The remote classroom collaborator: the narrow read/write contract the grade
//! synchronization core consumes, and its REST implementation.

/// REST implementation of [`ClassroomApi`] on top of reqwest
pub mod http;
/// Wire shapes of the classroom REST API
pub mod models;

use std::future::Future;

pub use http::HttpClassroom;

use crate::{
    error::RemoteError,
    roster::{Assignment, RosterRow},
};

/// Everything the grade synchronization core needs from the remote service.
///
/// Implementations own pagination and transient-failure retries; callers
/// treat an `Unavailable` error as final.
pub trait ClassroomApi {
    /// Resolves an assignment's metadata.
    fn assignment(
        &self,
        assignment_id: &str,
    ) -> impl Future<Output = Result<Assignment, RemoteError>> + Send;

    /// Returns every submission of an already resolved assignment, joined
    /// with the student's display name. Order is unspecified.
    fn fetch_submissions(
        &self,
        assignment: &Assignment,
    ) -> impl Future<Output = Result<Vec<RosterRow>, RemoteError>> + Send;

    /// Sets the draft grade of one submission.
    fn set_draft_grade(
        &self,
        assignment_id: &str,
        submission_id: &str,
        value: f64,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Sets the assigned (final) grade of one submission. Does not return it.
    fn set_assigned_grade(
        &self,
        assignment_id: &str,
        submission_id: &str,
        value: f64,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Removes the draft grade of one submission.
    fn clear_draft_grade(
        &self,
        assignment_id: &str,
        submission_id: &str,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Returns a submission to its student, making the assigned grade
    /// visible.
    fn return_submission(
        &self,
        assignment_id: &str,
        submission_id: &str,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;
}
