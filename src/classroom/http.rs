#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::collections::HashMap;

use anyhow::Result;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;

use super::{
    ClassroomApi,
    models::{CourseWorkWire, ErrorEnvelope, ProfileWire, StudentPage, SubmissionPage},
};
use crate::{
    config::{ClassroomEnv, ConfigHandle, RetryPolicy},
    error::RemoteError,
    roster::{Assignment, RosterRow},
};

/// Talks to the classroom REST API for one course.
#[derive(Clone)]
pub struct HttpClassroom {
    /// Shared HTTP client
    client:    Client,
    /// Endpoint and credentials
    env:       ClassroomEnv,
    /// Course every request is scoped to
    course_id: String,
    /// Transient-failure retry policy
    retry:     RetryPolicy,
    /// Page size for listings
    page_size: u32,
}

impl HttpClassroom {
    /// Creates a client for `course_id`.
    pub fn new(
        client: Client,
        env: ClassroomEnv,
        course_id: impl Into<String>,
        retry: RetryPolicy,
        page_size: u32,
    ) -> Self {
        Self {
            client,
            env,
            course_id: course_id.into(),
            retry,
            page_size,
        }
    }

    /// Creates a client from the global configuration.
    pub fn from_config(config: &ConfigHandle, course_override: Option<&str>) -> Result<Self> {
        Ok(Self::new(
            config.http_client(),
            config.classroom()?.clone(),
            config.course_id(course_override)?,
            config.retry(),
            config.page_size(),
        ))
    }

    /// Returns the course this client is scoped to.
    pub fn course_id(&self) -> &str {
        &self.course_id
    }

    /// URL of the coursework collection member `assignment_id`.
    fn course_work_url(&self, assignment_id: &str) -> String {
        format!("{}/courses/{}/courseWork/{}", self.env.api_base(), self.course_id, assignment_id)
    }

    /// URL of one submission.
    fn submission_url(&self, assignment_id: &str, submission_id: &str) -> String {
        format!("{}/studentSubmissions/{}", self.course_work_url(assignment_id), submission_id)
    }

    /// Sends the request produced by `build`, retrying transient failures
    /// with exponential backoff.
    async fn send<F>(&self, build: F) -> Result<Response, RemoteError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0u32;
        loop {
            let result = match build().bearer_auth(self.env.access_token()).send().await {
                Ok(response) => classify(response).await,
                Err(err) => Err(RemoteError::Unavailable(err.to_string())),
            };

            match result {
                Err(err) if err.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    let delay = self.retry.delay_for(attempt);
                    tracing::debug!(
                        "Transient failure ({err}); retry {attempt}/{} in {delay:?}",
                        self.retry.max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => {
                    if err.is_transient() {
                        tracing::warn!("Giving up after {attempt} retries: {err}");
                    }
                    return Err(err);
                }
                Ok(response) => return Ok(response),
            }
        }
    }

    /// Sends a request and decodes its JSON body.
    async fn send_json<T, F>(&self, build: F) -> Result<T, RemoteError>
    where
        T: DeserializeOwned,
        F: Fn() -> RequestBuilder,
    {
        self.send(build)
            .await?
            .json::<T>()
            .await
            .map_err(|e| RemoteError::Unavailable(format!("Could not decode response: {e}")))
    }

    /// Lists the course roster, keyed by user id.
    async fn profiles(&self) -> Result<HashMap<String, ProfileWire>, RemoteError> {
        let url = format!("{}/courses/{}/students", self.env.api_base(), self.course_id);
        let mut profiles = HashMap::new();
        let mut token: Option<String> = None;

        loop {
            let page: StudentPage = self
                .send_json(|| {
                    let mut req = self
                        .client
                        .get(&url)
                        .query(&[("pageSize", self.page_size.to_string())]);
                    if let Some(token) = &token {
                        req = req.query(&[("pageToken", token)]);
                    }
                    req
                })
                .await?;

            profiles.extend(page.students.into_iter().map(|s| (s.user_id, s.profile)));
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(profiles)
    }

    /// Patches grade fields of one submission.
    async fn patch_submission(
        &self,
        assignment_id: &str,
        submission_id: &str,
        update_mask: &str,
        body: serde_json::Value,
    ) -> Result<(), RemoteError> {
        let url = self.submission_url(assignment_id, submission_id);
        self.send(|| {
            self.client
                .request(Method::PATCH, &url)
                .query(&[("updateMask", update_mask)])
                .json(&body)
        })
        .await?;
        Ok(())
    }
}

impl ClassroomApi for HttpClassroom {
    async fn assignment(&self, assignment_id: &str) -> Result<Assignment, RemoteError> {
        let url = self.course_work_url(assignment_id);
        let wire: CourseWorkWire = self.send_json(|| self.client.get(&url)).await?;
        Ok(wire.into())
    }

    async fn fetch_submissions(
        &self,
        assignment: &Assignment,
    ) -> Result<Vec<RosterRow>, RemoteError> {
        let due = assignment.due;
        let profiles = match self.profiles().await {
            Ok(profiles) => profiles,
            Err(err) => {
                tracing::warn!(
                    "Could not list the course roster, showing user ids instead: {err}"
                );
                HashMap::new()
            }
        };
        let url = format!("{}/studentSubmissions", self.course_work_url(&assignment.id));

        let mut rows = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let page: SubmissionPage = self
                .send_json(|| {
                    let mut req = self
                        .client
                        .get(&url)
                        .query(&[("pageSize", self.page_size.to_string())]);
                    if let Some(token) = &token {
                        req = req.query(&[("pageToken", token)]);
                    }
                    req
                })
                .await?;

            rows.extend(
                page.student_submissions
                    .into_iter()
                    .map(|s| s.into_row(&profiles, due)),
            );
            match page.next_page_token.filter(|t| !t.is_empty()) {
                Some(next) => token = Some(next),
                None => break,
            }
        }

        Ok(rows)
    }

    async fn set_draft_grade(
        &self,
        assignment_id: &str,
        submission_id: &str,
        value: f64,
    ) -> Result<(), RemoteError> {
        self.patch_submission(
            assignment_id,
            submission_id,
            "draftGrade",
            json!({ "draftGrade": value }),
        )
        .await
    }

    async fn set_assigned_grade(
        &self,
        assignment_id: &str,
        submission_id: &str,
        value: f64,
    ) -> Result<(), RemoteError> {
        self.patch_submission(
            assignment_id,
            submission_id,
            "assignedGrade",
            json!({ "assignedGrade": value }),
        )
        .await
    }

    async fn clear_draft_grade(
        &self,
        assignment_id: &str,
        submission_id: &str,
    ) -> Result<(), RemoteError> {
        // A masked field absent from the body is cleared.
        self.patch_submission(assignment_id, submission_id, "draftGrade", json!({}))
            .await
    }

    async fn return_submission(
        &self,
        assignment_id: &str,
        submission_id: &str,
    ) -> Result<(), RemoteError> {
        let url = format!("{}:return", self.submission_url(assignment_id, submission_id));
        self.send(|| self.client.post(&url).json(&json!({}))).await?;
        Ok(())
    }
}

/// Maps an HTTP response onto the collaborator error taxonomy.
async fn classify(response: Response) -> Result<Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|env| {
            if env.error.status.is_empty() {
                env.error.message
            } else {
                format!("{} ({})", env.error.message, env.error.status)
            }
        })
        .unwrap_or(body);

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::PermissionDenied(message),
        StatusCode::NOT_FOUND => RemoteError::NotFound(message),
        StatusCode::TOO_MANY_REQUESTS | StatusCode::REQUEST_TIMEOUT => {
            RemoteError::Unavailable(message)
        }
        s if s.is_server_error() => RemoteError::Unavailable(message),
        s => RemoteError::Rejected {
            status: s.as_u16(),
            message,
        },
    })
}
