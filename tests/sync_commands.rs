mod common;

use std::{fs, io::Cursor};

use common::{Call, FakeClassroom, settings, temp_root};
use gradesync::{
    commands,
    error::{RejectReason, RemoteError, SyncError},
    probe::Capability,
    push::PushOutcome,
    reconcile::{GradeTarget, RowRef},
    roster::SubmissionState,
    table::GradeColumns,
};

#[tokio::test]
async fn unedited_export_imports_as_an_empty_change_set() {
    let root = temp_root();
    let api = FakeClassroom::class();
    let path = root.join("grades.csv");

    let snapshot = commands::export_grades(
        &api,
        &settings(&root),
        api.assignment_id(),
        &path,
        GradeColumns::Both,
    )
    .await
    .expect("export");
    assert_eq!(snapshot.len(), 5);
    assert!(fs::read_to_string(&path).expect("read export").starts_with("Assignment: Lab 1"));

    let report = commands::import_grades(&api, &settings(&root), api.assignment_id(), &path, false)
        .await
        .expect("import");

    assert!(report.changes.is_empty());
    assert!(report.changes.rejected.is_empty());
    assert_eq!(report.summary().skipped, 5);
    assert_eq!(report.summary().applied, 0);
    assert!(api.calls().is_empty());

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn reapplying_a_change_set_leaves_grades_unchanged() {
    let root = temp_root();
    let api = FakeClassroom::class();
    let path = root.join("edited.csv");
    fs::write(&path, "Submission ID,Grade\ns1,80\ns2,75.5\n").expect("write table");

    let first = commands::push_grades_from_file(
        &api,
        &settings(&root),
        api.assignment_id(),
        &path,
        GradeTarget::Both,
    )
    .await
    .expect("first push");
    assert_eq!(first.summary().applied, 2);
    let after_first = api.grades();

    let second = commands::push_grades_from_file(
        &api,
        &settings(&root),
        api.assignment_id(),
        &path,
        GradeTarget::Both,
    )
    .await
    .expect("second push");

    assert_eq!(api.grades(), after_first);
    assert_eq!(api.row("s1").assigned_grade, Some(80.0));
    assert_eq!(api.row("s2").draft_grade, Some(75.5));
    assert!(
        second
            .results
            .iter()
            .all(|r| r.outcome == PushOutcome::Skipped)
    );
    assert_eq!(second.results.len(), 2);

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn duplicate_rows_keep_the_last_grade() {
    let root = temp_root();
    let api = FakeClassroom::class();
    let path = root.join("dupes.csv");
    fs::write(&path, "Submission ID,Grade to Assign\ns1,70\ns2,\ns1,90\n").expect("write table");

    let report = commands::import_grades(&api, &settings(&root), api.assignment_id(), &path, true)
        .await
        .expect("import");

    assert_eq!(report.changes.changes.len(), 1);
    assert_eq!(report.changes.changes[0].submission_id, "s1");
    assert_eq!(report.changes.changes[0].target_grade, 90.0);
    assert!(report.changes.rejected.is_empty());

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn unknown_submissions_are_rejected_not_pushed() {
    let root = temp_root();
    let api = FakeClassroom::class();
    let path = root.join("ghost.csv");
    fs::write(&path, "Submission ID,Grade\nghost,80\ns5,60\n").expect("write table");

    let report = commands::import_grades(&api, &settings(&root), api.assignment_id(), &path, false)
        .await
        .expect("import");

    assert_eq!(report.changes.rejected.len(), 1);
    assert_eq!(report.changes.rejected[0].source, RowRef::Line(2));
    assert_eq!(
        report.changes.rejected[0].reason,
        RejectReason::UnknownSubmission("ghost".into())
    );
    assert!(
        !report
            .changes
            .changes
            .iter()
            .any(|c| c.submission_id == "ghost")
    );
    assert!(!api.calls().iter().any(|c| matches!(c, Call::Draft(id, _) if id == "ghost")));
    assert_eq!(api.row("s5").assigned_grade, Some(60.0));
    assert_eq!(report.summary().rejected, 1);

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn dry_run_computes_the_same_changes_without_calls() {
    let root = temp_root();
    let api = FakeClassroom::class();
    let path = root.join("dry.csv");
    fs::write(&path, "Student Name,Submission ID,Grade to Assign\nDana,s1,88\nEli,s5,abc\n")
        .expect("write table");

    let dry = commands::import_grades(&api, &settings(&root), api.assignment_id(), &path, true)
        .await
        .expect("dry run");
    assert!(api.calls().is_empty());
    assert!(dry.results.is_empty());
    assert!(dry.probe.is_none());

    let commit = commands::import_grades(&api, &settings(&root), api.assignment_id(), &path, false)
        .await
        .expect("commit");

    assert_eq!(dry.changes, commit.changes);
    assert!(api.calls().contains(&Call::Draft("s1".into(), 88.0)));
    assert!(api.calls().contains(&Call::Assigned("s1".into(), 88.0)));
    assert_eq!(commit.summary().applied, 1);
    assert_eq!(commit.summary().rejected, 1);

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn denied_probe_falls_back_to_export_without_writes() {
    let root = temp_root();
    let api = FakeClassroom::class();
    api.deny_all(RemoteError::PermissionDenied("ProjectPermissionDenied".into()));

    let report = commands::grade_all(
        &api,
        &settings(&root),
        api.assignment_id(),
        "80",
        GradeTarget::Final,
        false,
    )
    .await
    .expect("grade all");

    assert_eq!(report.probe.as_ref().map(|p| p.capability), Some(Capability::Denied));
    assert!(report.results.is_empty());
    assert_eq!(api.calls(), vec![Call::Draft("s3".into(), 65.0)]);
    assert_eq!(api.row("s1").assigned_grade, None);

    let fallback = root.join("fallback.csv");
    assert_eq!(report.fallback_file.as_ref(), Some(&fallback));
    assert!(
        fs::read_to_string(&fallback)
            .expect("fallback export")
            .contains("Submission ID")
    );
    let guidance = report.guidance();
    assert!(guidance[0].starts_with("Permission denied"));
    assert!(guidance[0].contains("fallback.csv"));
    assert_eq!(report.summary().withheld, 5);
    assert_eq!(report.summary().denied, 0);

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn unknown_probe_falls_back_with_different_guidance() {
    let root = temp_root();
    let api = FakeClassroom::class();
    api.deny_all(RemoteError::Unavailable("deadline exceeded".into()));

    let report = commands::grade_all(
        &api,
        &settings(&root),
        api.assignment_id(),
        "80",
        GradeTarget::Draft,
        false,
    )
    .await
    .expect("grade all");

    assert_eq!(report.probe.as_ref().map(|p| p.capability), Some(Capability::Unknown));
    assert!(report.results.is_empty());
    assert_eq!(api.grade_writes(), 1);
    assert!(root.join("fallback.csv").exists());

    let guidance = report.guidance();
    assert!(guidance[0].starts_with("Could not determine"));
    assert!(!guidance[0].contains("Permission denied"));

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn bulk_selection_grades_the_selected_indices() {
    let root = temp_root();
    let api = FakeClassroom::class();
    let mut out = Vec::new();

    // ada=1 (s2), Bea=2 (s4), Cole=3 (s3), Dana=4 (s1), Eli=5 (s5)
    let report = commands::push_grades_bulk(
        &api,
        &settings(&root),
        api.assignment_id(),
        GradeTarget::Draft,
        false,
        Cursor::new("1-3:80 5:95\n\n4:10\n"),
        &mut out,
    )
    .await
    .expect("bulk");

    assert_eq!(api.row("s2").draft_grade, Some(80.0));
    assert_eq!(api.row("s4").draft_grade, Some(80.0));
    assert_eq!(api.row("s3").draft_grade, Some(80.0));
    assert_eq!(api.row("s5").draft_grade, Some(95.0));
    assert_eq!(api.row("s1").draft_grade, None);
    assert_eq!(api.row("s4").assigned_grade, Some(90.0));
    assert_eq!(report.summary().applied, 4);

    let text = String::from_utf8(out).expect("utf8");
    assert!(text.contains("4 grade(s) selected"));

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn bulk_echoes_malformed_tokens_and_keeps_the_rest() {
    let root = temp_root();
    let api = FakeClassroom::class();
    let mut out = Vec::new();

    let report = commands::push_grades_bulk(
        &api,
        &settings(&root),
        api.assignment_id(),
        GradeTarget::Draft,
        true,
        Cursor::new("7:50 x:1 2:70\nall:abc\n"),
        &mut out,
    )
    .await
    .expect("bulk");

    let text = String::from_utf8(out).expect("utf8");
    assert!(text.contains("Ignored token `7:50`"));
    assert!(text.contains("Ignored token `x:1`"));
    assert!(text.contains("Ignored token `all:abc`"));
    assert_eq!(report.changes.changes.len(), 1);
    assert_eq!(report.changes.changes[0].submission_id, "s4");
    assert_eq!(report.changes.rejected.len(), 3);
    assert!(api.calls().is_empty());

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn push_draft_grades_promotes_drafts() {
    let root = temp_root();
    let api = FakeClassroom::class();

    let report = commands::push_draft_grades(&api, &settings(&root), api.assignment_id(), false)
        .await
        .expect("promote");

    assert_eq!(api.row("s3").assigned_grade, Some(65.0));
    let outcome = |id: &str| {
        report
            .results
            .iter()
            .find(|r| r.submission_id == id)
            .map(|r| r.outcome)
    };
    assert_eq!(outcome("s3"), Some(PushOutcome::Applied));
    assert_eq!(outcome("s4"), Some(PushOutcome::Skipped));
    assert_eq!(report.results.len(), 2);

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn out_of_range_grades_are_rejected() {
    let root = temp_root();
    let api = FakeClassroom::class();

    let report = commands::grade_all(
        &api,
        &settings(&root),
        api.assignment_id(),
        "150",
        GradeTarget::Final,
        false,
    )
    .await
    .expect("grade all");

    assert!(report.changes.is_empty());
    assert_eq!(report.summary().rejected, 5);
    assert!(
        report
            .changes
            .rejected
            .iter()
            .all(|r| matches!(r.reason, RejectReason::InvalidGrade(_)))
    );
    assert!(api.calls().is_empty());

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn grading_never_returns_but_return_submission_does() {
    let root = temp_root();
    let api = FakeClassroom::class();

    commands::grade_one(&api, &settings(&root), api.assignment_id(), "s1", "77", GradeTarget::Both)
        .await
        .expect("grade one");
    assert!(!api.calls().iter().any(|c| matches!(c, Call::Return(_))));
    assert_eq!(api.row("s1").state, SubmissionState::TurnedIn);
    assert_eq!(api.row("s1").assigned_grade, Some(77.0));

    commands::return_submission(&api, api.assignment_id(), "s1")
        .await
        .expect("return");
    assert_eq!(api.row("s1").state, SubmissionState::Returned);

    assert!(
        commands::return_submission(&api, api.assignment_id(), "ghost")
            .await
            .is_err()
    );

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn snapshot_failures_abort_the_run() {
    let root = temp_root();
    let api = FakeClassroom::class();

    let err =
        commands::grade_all(&api, &settings(&root), "missing", "80", GradeTarget::Draft, false)
            .await
            .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<SyncError>(),
        Some(SyncError::AssignmentNotFound(id)) if id == "missing"
    ));

    api.fail_fetch(RemoteError::Unavailable("connection reset".into()));
    let err = commands::show_grades(&api, api.assignment_id())
        .await
        .unwrap_err();
    assert!(matches!(err.downcast_ref::<SyncError>(), Some(SyncError::RemoteUnavailable(_))));
    assert!(api.calls().is_empty());

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn malformed_table_aborts_the_import() {
    let root = temp_root();
    let api = FakeClassroom::class();
    let path = root.join("broken.csv");
    fs::write(&path, "Student Name,Grade to Assign\nDana,80\n").expect("write table");

    let err = commands::import_grades(&api, &settings(&root), api.assignment_id(), &path, false)
        .await
        .unwrap_err();

    assert!(matches!(err.downcast_ref::<SyncError>(), Some(SyncError::MalformedTable(_))));
    assert!(api.calls().is_empty());

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn show_grades_counts_grading_progress() {
    let api = FakeClassroom::class();

    let overview = commands::show_grades(&api, api.assignment_id())
        .await
        .expect("show grades");

    assert_eq!(overview.total, 5);
    assert_eq!(overview.fully_graded, 1);
    assert_eq!(overview.draft_only, 1);
    assert_eq!(overview.ungraded, 3);
}

#[tokio::test]
async fn bulk_out_of_range_token_keeps_the_earlier_grade() {
    let root = temp_root();
    let api = FakeClassroom::class();
    let mut out = Vec::new();

    // index 2 is Bea (s4)
    let report = commands::push_grades_bulk(
        &api,
        &settings(&root),
        api.assignment_id(),
        GradeTarget::Draft,
        true,
        Cursor::new("all:70 2:150\n"),
        &mut out,
    )
    .await
    .expect("bulk");

    assert_eq!(report.changes.changes.len(), 5);
    let bea = report
        .changes
        .changes
        .iter()
        .find(|c| c.submission_id == "s4")
        .expect("s4 keeps a change");
    assert_eq!(bea.target_grade, 70.0);
    assert_eq!(report.changes.rejected.len(), 1);
    assert!(matches!(report.changes.rejected[0].reason, RejectReason::MalformedToken(_)));
    assert!(String::from_utf8(out).expect("utf8").contains("Ignored token `2:150`"));

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn changes_already_at_target_skip_the_permission_check() {
    let root = temp_root();
    let api = FakeClassroom::class();
    api.deny_all(RemoteError::PermissionDenied("ProjectPermissionDenied".into()));

    let report = commands::grade_one(
        &api,
        &settings(&root),
        api.assignment_id(),
        "s4",
        "90",
        GradeTarget::Both,
    )
    .await
    .expect("grade one");

    assert!(report.probe.is_none());
    assert!(api.calls().is_empty());
    assert!(!root.join("fallback.csv").exists());
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].outcome, PushOutcome::Skipped);
    assert_eq!(report.summary().withheld, 0);

    let _ = fs::remove_dir_all(root);
}

#[tokio::test]
async fn export_shows_only_the_selected_grades() {
    let root = temp_root();
    let api = FakeClassroom::class();
    let path = root.join("drafts.csv");

    commands::export_grades(
        &api,
        &settings(&root),
        api.assignment_id(),
        &path,
        GradeColumns::Draft,
    )
    .await
    .expect("export");

    let text = fs::read_to_string(&path).expect("read export");
    let header = text
        .lines()
        .find(|l| l.contains("Submission ID"))
        .expect("header row");
    assert!(header.contains("Draft Grade"));
    assert!(!header.contains("Assigned Grade"));
    assert!(header.ends_with("Grade to Assign"));

    let _ = fs::remove_dir_all(root);
}
