#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{
    path::PathBuf,
    sync::{Arc, Mutex, OnceLock},
    time::Duration,
};

use anyhow::{Context, Result, ensure};
use reqwest::Client;

use crate::{
    constants::{DEFAULT_API_BASE, DEFAULT_GRADES_FILE},
    reconcile::GradeBounds,
};

/// Credentials and endpoint of the classroom service, if configured.
#[derive(Clone)]
pub struct ClassroomEnv {
    /// REST base URL, without a trailing slash.
    api_base:     String,
    /// Bearer token sent with every request.
    access_token: String,
}

impl ClassroomEnv {
    /// Builds a credential bundle from already-resolved values.
    pub fn new(api_base: impl Into<String>, access_token: impl Into<String>) -> Self {
        let api_base = api_base.into();
        Self {
            api_base:     api_base.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    /// Reads the credential bundle from the environment; `None` when the
    /// token is missing.
    fn from_env() -> Option<Self> {
        let token = std::env::var("CLASSROOM_ACCESS_TOKEN").ok()?.trim().to_owned();
        if token.is_empty() {
            return None;
        }
        let base = std::env::var("CLASSROOM_API_BASE")
            .map(|value| value.trim().to_owned())
            .unwrap_or_else(|_| DEFAULT_API_BASE.to_string());
        Some(Self::new(base, token))
    }

    /// Returns the REST base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Returns the bearer token.
    pub fn access_token(&self) -> &str {
        &self.access_token
    }
}

/// Retry policy applied by the transport to transient failures.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Number of retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubled for every further one.
    pub base_delay:  Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay:  Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

/// Runtime configuration shared across the crate.
pub struct ConfigState {
    /// Classroom credentials, if configured.
    classroom:        Option<ClassroomEnv>,
    /// Course addressed by remote commands.
    course_id:        Option<String>,
    /// Shared reqwest HTTP client reused across remote calls.
    http_client:      Client,
    /// Transport retry policy.
    retry:            RetryPolicy,
    /// Page size requested from paginated listings.
    page_size:        u32,
    /// Accepted grade range.
    grade_bounds:     GradeBounds,
    /// Whether exports carry the optional metadata columns and preamble.
    export_metadata:  bool,
    /// Where the permission fallback writes its export.
    fallback_file:    PathBuf,
}

impl ConfigState {
    /// Construct a new configuration instance by reading the environment.
    fn new() -> Result<Self> {
        let http_client = Client::builder()
            // Avoid macOS dynamic store lookups that fail in sandboxed environments.
            .no_proxy()
            .build()
            .context("Failed to construct shared HTTP client")?;

        let course_id = std::env::var("COURSE_ID")
            .ok()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty());

        let retry = RetryPolicy {
            max_retries: read_env("CLASSROOM_MAX_RETRIES", 3u32),
            base_delay:  Duration::from_millis(read_env("CLASSROOM_RETRY_BASE_MS", 500u64)),
        };

        let grade_bounds =
            GradeBounds::new(read_env("GRADE_MIN", 0.0f64), read_env("GRADE_MAX", 100.0f64))
                .context("GRADE_MIN/GRADE_MAX do not form a valid range")?;

        let fallback_file = std::env::var("GRADESYNC_FALLBACK_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_GRADES_FILE));

        Ok(Self {
            classroom: ClassroomEnv::from_env(),
            course_id,
            http_client,
            retry,
            page_size: read_env("CLASSROOM_PAGE_SIZE", 100u32).max(1),
            grade_bounds,
            export_metadata: read_env("GRADESYNC_EXPORT_METADATA", true),
            fallback_file,
        })
    }

    /// Returns the classroom credentials, or an error naming what is missing.
    pub fn classroom(&self) -> Result<&ClassroomEnv> {
        self.classroom
            .as_ref()
            .context("CLASSROOM_ACCESS_TOKEN is not set; add it to your environment or .env file")
    }

    /// Resolves the course id, preferring an explicit override.
    pub fn course_id(&self, explicit: Option<&str>) -> Result<String> {
        let course = explicit
            .map(str::to_owned)
            .or_else(|| self.course_id.clone())
            .context("No course id given and COURSE_ID is not set")?;
        ensure!(!course.trim().is_empty(), "Course id must not be empty");
        Ok(course)
    }

    /// Returns a clone of the shared reqwest HTTP client.
    pub fn http_client(&self) -> Client {
        self.http_client.clone()
    }

    /// Returns the transport retry policy.
    pub fn retry(&self) -> RetryPolicy {
        self.retry
    }

    /// Returns the page size for paginated listings.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Returns the configured grade range.
    pub fn grade_bounds(&self) -> GradeBounds {
        self.grade_bounds
    }

    /// Returns whether exports include the optional metadata columns.
    pub fn export_metadata(&self) -> bool {
        self.export_metadata
    }

    /// Returns the path used by the permission fallback export.
    pub fn fallback_file(&self) -> &PathBuf {
        &self.fallback_file
    }
}

/// Shared configuration handle used throughout the crate.
#[derive(Clone)]
pub struct ConfigHandle(Arc<ConfigState>);

impl std::ops::Deref for ConfigHandle {
    type Target = ConfigState;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Global storage for the lazily constructed configuration state.
static CONFIG_SLOT: OnceLock<Mutex<Option<Arc<ConfigState>>>> = OnceLock::new();

/// Returns the mutex guarding the global configuration slot.
fn slot() -> &'static Mutex<Option<Arc<ConfigState>>> {
    CONFIG_SLOT.get_or_init(|| Mutex::new(None))
}

/// Ensure the global configuration has been initialized and return a handle.
pub fn ensure_initialized() -> Result<ConfigHandle> {
    let mut guard = slot()
        .lock()
        .map_err(|_| anyhow::anyhow!("config slot poisoned"))?;
    if let Some(cfg) = guard.as_ref() {
        return Ok(ConfigHandle(Arc::clone(cfg)));
    }

    let cfg = Arc::new(ConfigState::new()?);
    *guard = Some(Arc::clone(&cfg));
    Ok(ConfigHandle(cfg))
}

/// Returns the active configuration, initializing it on demand.
pub fn get() -> Result<ConfigHandle> {
    ensure_initialized()
}

/// Parses an environment variable, falling back to `default` when it is
/// missing or does not parse.
fn read_env<T: std::str::FromStr>(env: &str, default: T) -> T {
    std::env::var(env)
        .ok()
        .and_then(|value| value.trim().parse::<T>().ok())
        .unwrap_or(default)
}
