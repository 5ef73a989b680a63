#![allow(dead_code)]

use std::{
    collections::HashMap,
    fs,
    path::PathBuf,
    sync::Mutex,
};

use gradesync::{
    classroom::ClassroomApi,
    commands::SyncSettings,
    error::RemoteError,
    roster::{Assignment, RosterRow, SubmissionState},
};
use uuid::Uuid;

/// A remote write the fake received.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Draft(String, f64),
    Assigned(String, f64),
    Clear(String),
    Return(String),
}

/// In-memory classroom for tests. Holds one assignment.
pub struct FakeClassroom {
    assignment: Assignment,
    inner:      Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    rows:        Vec<RosterRow>,
    calls:       Vec<Call>,
    deny_all:    Option<RemoteError>,
    fail_for:    HashMap<String, RemoteError>,
    fail_clear:  Option<RemoteError>,
    fetch_error: Option<RemoteError>,
}

impl FakeClassroom {
    pub fn new(rows: Vec<RosterRow>) -> Self {
        Self {
            assignment: Assignment {
                id: "cw-1".into(),
                title: "Lab 1".into(),
                max_points: Some(100.0),
                due: None,
            },
            inner:      Mutex::new(Inner {
                rows,
                ..Default::default()
            }),
        }
    }

    /// Five students; `s3` has a draft grade, `s4` an assigned one.
    pub fn class() -> Self {
        let names = ["Dana", "ada", "Cole", "Bea", "Eli"];
        let rows = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let mut row = RosterRow::builder()
                    .submission_id(format!("s{}", i + 1))
                    .student_name(*name)
                    .student_id(format!("u{}", i + 1))
                    .state(SubmissionState::TurnedIn)
                    .build();
                if i == 2 {
                    row.draft_grade = Some(65.0);
                }
                if i == 3 {
                    row.assigned_grade = Some(90.0);
                    row.draft_grade = Some(90.0);
                }
                row
            })
            .collect();
        Self::new(rows)
    }

    pub fn assignment_id(&self) -> &str {
        &self.assignment.id
    }

    /// Every write is refused with `err`.
    pub fn deny_all(&self, err: RemoteError) {
        self.inner.lock().unwrap().deny_all = Some(err);
    }

    /// Writes to `submission_id` fail with `err`.
    pub fn fail_for(&self, submission_id: &str, err: RemoteError) {
        self.inner
            .lock()
            .unwrap()
            .fail_for
            .insert(submission_id.to_string(), err);
    }

    /// Clearing a draft grade fails with `err`.
    pub fn fail_clear(&self, err: RemoteError) {
        self.inner.lock().unwrap().fail_clear = Some(err);
    }

    /// Reading submissions fails with `err`.
    pub fn fail_fetch(&self, err: RemoteError) {
        self.inner.lock().unwrap().fetch_error = Some(err);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().unwrap().calls.clear();
    }

    /// Draft and assigned grade writes only.
    pub fn grade_writes(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Draft(..) | Call::Assigned(..)))
            .count()
    }

    pub fn row(&self, submission_id: &str) -> RosterRow {
        self.inner
            .lock()
            .unwrap()
            .rows
            .iter()
            .find(|r| r.submission_id == submission_id)
            .cloned()
            .expect("known submission")
    }

    pub fn grades(&self) -> Vec<(String, Option<f64>, Option<f64>)> {
        self.inner
            .lock()
            .unwrap()
            .rows
            .iter()
            .map(|r| (r.submission_id.clone(), r.draft_grade, r.assigned_grade))
            .collect()
    }

    fn write<F>(&self, submission_id: &str, call: Call, apply: F) -> Result<(), RemoteError>
    where
        F: FnOnce(&mut RosterRow),
    {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(call.clone());
        if let Some(err) = &inner.deny_all {
            return Err(err.clone());
        }
        if let Some(err) = inner.fail_for.get(submission_id) {
            return Err(err.clone());
        }
        if matches!(call, Call::Clear(_))
            && let Some(err) = &inner.fail_clear
        {
            return Err(err.clone());
        }
        match inner
            .rows
            .iter_mut()
            .find(|r| r.submission_id == submission_id)
        {
            Some(row) => {
                apply(row);
                Ok(())
            }
            None => Err(RemoteError::NotFound(submission_id.to_string())),
        }
    }

    fn check_assignment(&self, assignment_id: &str) -> Result<(), RemoteError> {
        if assignment_id == self.assignment.id {
            Ok(())
        } else {
            Err(RemoteError::NotFound(format!("coursework {assignment_id}")))
        }
    }
}

impl ClassroomApi for FakeClassroom {
    async fn assignment(&self, assignment_id: &str) -> Result<Assignment, RemoteError> {
        self.check_assignment(assignment_id)?;
        Ok(self.assignment.clone())
    }

    async fn fetch_submissions(
        &self,
        assignment: &Assignment,
    ) -> Result<Vec<RosterRow>, RemoteError> {
        self.check_assignment(&assignment.id)?;
        let inner = self.inner.lock().unwrap();
        if let Some(err) = &inner.fetch_error {
            return Err(err.clone());
        }
        Ok(inner.rows.clone())
    }

    async fn set_draft_grade(
        &self,
        assignment_id: &str,
        submission_id: &str,
        value: f64,
    ) -> Result<(), RemoteError> {
        self.check_assignment(assignment_id)?;
        self.write(submission_id, Call::Draft(submission_id.into(), value), |row| {
            row.draft_grade = Some(value)
        })
    }

    async fn set_assigned_grade(
        &self,
        assignment_id: &str,
        submission_id: &str,
        value: f64,
    ) -> Result<(), RemoteError> {
        self.check_assignment(assignment_id)?;
        self.write(submission_id, Call::Assigned(submission_id.into(), value), |row| {
            row.assigned_grade = Some(value)
        })
    }

    async fn clear_draft_grade(
        &self,
        assignment_id: &str,
        submission_id: &str,
    ) -> Result<(), RemoteError> {
        self.check_assignment(assignment_id)?;
        self.write(submission_id, Call::Clear(submission_id.into()), |row| {
            row.draft_grade = None
        })
    }

    async fn return_submission(
        &self,
        assignment_id: &str,
        submission_id: &str,
    ) -> Result<(), RemoteError> {
        self.check_assignment(assignment_id)?;
        self.write(submission_id, Call::Return(submission_id.into()), |row| {
            row.state = SubmissionState::Returned
        })
    }
}

pub fn temp_root() -> PathBuf {
    let root = std::env::temp_dir().join(format!("gradesync-{}", Uuid::new_v4()));
    fs::create_dir_all(&root).expect("create temp root");
    root
}

/// Settings writing the fallback export into `root`.
pub fn settings(root: &std::path::Path) -> SyncSettings {
    SyncSettings::builder()
        .fallback_file(root.join("fallback.csv"))
        .course_id("course-1")
        .build()
}
