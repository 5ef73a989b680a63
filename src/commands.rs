#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The grade synchronization commands. Every command fetches a fresh
//! [`Snapshot`], and every write path runs through the reconciler, the
//! capability probe and the push engine, in that order.

use std::{
    io::{BufRead, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use typed_builder::TypedBuilder;

use crate::{
    classroom::ClassroomApi,
    config::ConfigHandle,
    constants::DEFAULT_GRADES_FILE,
    probe::probe_capability,
    push::{needs_write, push_changes},
    reconcile::{GradeBounds, GradeEntry, GradeTarget, ParsedInput, RowRef, reconcile},
    report::{GradeOverview, SyncReport, render_roster},
    roster::{DisplayIndex, Snapshot, fetch_snapshot},
    selector::parse_selection,
    table::{ExportOptions, GradeColumns, read_table, write_table},
};

/// Settings shared by all commands of one invocation.
#[derive(Debug, Clone, TypedBuilder)]
pub struct SyncSettings {
    /// Accepted grade range before widening to an assignment's max points
    #[builder(default)]
    pub bounds:          GradeBounds,
    /// Where the permission fallback writes its export
    #[builder(default = PathBuf::from(DEFAULT_GRADES_FILE), setter(into))]
    pub fallback_file:   PathBuf,
    /// Whether exports include the optional metadata columns and preamble
    #[builder(default = true)]
    pub export_metadata: bool,
    /// Course id written into export preambles
    #[builder(default, setter(strip_option, into))]
    pub course_id:       Option<String>,
}

impl SyncSettings {
    /// Builds settings from the global configuration.
    ///
    /// `max_grade` overrides the configured upper grade bound.
    pub fn from_config(
        config: &ConfigHandle,
        course_id: &str,
        max_grade: Option<f64>,
    ) -> Result<Self> {
        let configured = config.grade_bounds();
        let bounds = match max_grade {
            Some(max) => GradeBounds::new(configured.min(), max)
                .context("--max-grade does not form a valid range with GRADE_MIN")?,
            None => configured,
        };

        Ok(Self::builder()
            .bounds(bounds)
            .fallback_file(config.fallback_file().clone())
            .export_metadata(config.export_metadata())
            .course_id(course_id)
            .build())
    }

    /// Export options showing `grade_columns`.
    fn export_options(&self, grade_columns: GradeColumns) -> ExportOptions {
        ExportOptions {
            grade_columns,
            metadata:      self.export_metadata,
            course_id:     if self.export_metadata {
                self.course_id.clone()
            } else {
                None
            },
        }
    }

    /// Grade range for `snapshot`'s assignment.
    fn bounds_for(&self, snapshot: &Snapshot) -> GradeBounds {
        self.bounds.for_max_points(snapshot.assignment().max_points)
    }
}

/// Reconciles `input` against `snapshot` and, unless `dry_run`, probes and
/// pushes the result.
///
/// No probe runs when no change would write. A `Denied` or `Unknown` probe
/// routes the run to the export fallback and writes no grades.
async fn sync<A: ClassroomApi>(
    api: &A,
    settings: &SyncSettings,
    snapshot: &Snapshot,
    input: ParsedInput,
    target: GradeTarget,
    dry_run: bool,
) -> SyncReport {
    let changes = reconcile(snapshot, input, target, settings.bounds_for(snapshot));
    let mut report = SyncReport::new(snapshot, changes);
    report.dry_run = dry_run;

    if dry_run || report.changes.is_empty() {
        return report;
    }
    if !report.changes.changes.iter().any(|c| needs_write(snapshot, c)) {
        tracing::debug!("Every change is already at its target; skipping the permission probe");
        report.results = push_changes(api, snapshot, &report.changes).await;
        return report;
    }

    let probe = probe_capability(api, snapshot).await;
    tracing::debug!("Grade permission probe: {} ({})", probe.capability, probe.detail);
    if !probe.is_capable() {
        report.fallback_file = fallback_export(settings, snapshot);
        report.probe = Some(probe);
        return report;
    }
    report.probe = Some(probe);

    report.results = push_changes(api, snapshot, &report.changes).await;
    report
}

/// Writes the fallback export; failures are logged, not raised.
fn fallback_export(settings: &SyncSettings, snapshot: &Snapshot) -> Option<PathBuf> {
    match write_table(
        &settings.fallback_file,
        snapshot,
        &settings.export_options(GradeColumns::Both),
    ) {
        Ok(()) => Some(settings.fallback_file.clone()),
        Err(err) => {
            tracing::error!(
                "Could not write the fallback export to {}: {err}",
                settings.fallback_file.display()
            );
            None
        }
    }
}

/// One entry per submission, all carrying `grade`.
fn every_row(snapshot: &Snapshot, grade: &str) -> ParsedInput {
    ParsedInput {
        entries:  snapshot
            .rows()
            .iter()
            .map(|row| GradeEntry {
                source:        RowRef::Argument,
                submission_id: row.submission_id.clone(),
                student_name:  Some(row.student_name.clone()),
                grade:         grade.to_string(),
            })
            .collect(),
        rejected: vec![],
    }
}

/// Gives every submission of an assignment the same grade.
pub async fn grade_all<A: ClassroomApi>(
    api: &A,
    settings: &SyncSettings,
    assignment_id: &str,
    grade: &str,
    kind: GradeTarget,
    dry_run: bool,
) -> Result<SyncReport> {
    let snapshot = fetch_snapshot(api, assignment_id).await?;
    let input = every_row(&snapshot, grade);
    Ok(sync(api, settings, &snapshot, input, kind, dry_run).await)
}

/// Grades one submission.
pub async fn grade_one<A: ClassroomApi>(
    api: &A,
    settings: &SyncSettings,
    assignment_id: &str,
    submission_id: &str,
    grade: &str,
    kind: GradeTarget,
) -> Result<SyncReport> {
    let snapshot = fetch_snapshot(api, assignment_id).await?;
    let input = ParsedInput {
        entries:  vec![GradeEntry {
            source:        RowRef::Argument,
            submission_id: submission_id.to_string(),
            student_name:  None,
            grade:         grade.to_string(),
        }],
        rejected: vec![],
    };
    Ok(sync(api, settings, &snapshot, input, kind, false).await)
}

/// Promotes every existing draft grade to the assigned grade.
pub async fn push_draft_grades<A: ClassroomApi>(
    api: &A,
    settings: &SyncSettings,
    assignment_id: &str,
    dry_run: bool,
) -> Result<SyncReport> {
    let snapshot = fetch_snapshot(api, assignment_id).await?;
    let input = ParsedInput {
        entries:  snapshot
            .rows()
            .iter()
            .filter_map(|row| {
                row.draft_grade.map(|draft| GradeEntry {
                    source:        RowRef::Argument,
                    submission_id: row.submission_id.clone(),
                    student_name:  Some(row.student_name.clone()),
                    grade:         draft.to_string(),
                })
            })
            .collect(),
        rejected: vec![],
    };
    if input.entries.is_empty() {
        tracing::info!("No draft grades to promote for `{}`", snapshot.assignment().title);
    }
    Ok(sync(api, settings, &snapshot, input, GradeTarget::Final, dry_run).await)
}

/// Pushes the grades of an edited grade table.
pub async fn push_grades_from_file<A: ClassroomApi>(
    api: &A,
    settings: &SyncSettings,
    assignment_id: &str,
    path: &Path,
    kind: GradeTarget,
) -> Result<SyncReport> {
    sync_file(api, settings, assignment_id, path, kind, false).await
}

/// Imports an edited grade table, setting draft and assigned grades.
///
/// With `dry_run` the full report is computed but nothing is probed or
/// written.
pub async fn import_grades<A: ClassroomApi>(
    api: &A,
    settings: &SyncSettings,
    assignment_id: &str,
    path: &Path,
    dry_run: bool,
) -> Result<SyncReport> {
    sync_file(api, settings, assignment_id, path, GradeTarget::Both, dry_run).await
}

/// Shared body of the file-driven commands.
async fn sync_file<A: ClassroomApi>(
    api: &A,
    settings: &SyncSettings,
    assignment_id: &str,
    path: &Path,
    kind: GradeTarget,
    dry_run: bool,
) -> Result<SyncReport> {
    let table = read_table(path)
        .with_context(|| format!("Could not read grade table {}", path.display()))?;
    tracing::debug!("Read {:?} grade table from {}", table.layout, path.display());

    let snapshot = fetch_snapshot(api, assignment_id).await?;
    Ok(sync(api, settings, &snapshot, table.input, kind, dry_run).await)
}

/// Interactive bulk grading.
///
/// Shows the numbered roster on `out`, then reads selector lines such as
/// `1-3:80 5:95` from `input` until an empty line or end of input. The
/// numbering stays fixed for the whole session; later selections override
/// earlier ones.
pub async fn push_grades_bulk<A, R, W>(
    api: &A,
    settings: &SyncSettings,
    assignment_id: &str,
    kind: GradeTarget,
    dry_run: bool,
    input: R,
    mut out: W,
) -> Result<SyncReport>
where
    A: ClassroomApi,
    R: BufRead,
    W: Write,
{
    let snapshot = fetch_snapshot(api, assignment_id).await?;
    let index = DisplayIndex::new(&snapshot);
    if index.is_empty() {
        bail!("Assignment `{assignment_id}` has no submissions to grade");
    }

    writeln!(out, "{}", render_roster(&snapshot, &index))?;
    writeln!(
        out,
        "Enter grades as `N:G`, `N1-N2:G` or `all:G`, separated by spaces. An empty line \
         finishes."
    )?;

    let bounds = settings.bounds_for(&snapshot);
    let mut collected = ParsedInput::default();
    for line in input.lines() {
        let line = line.context("Could not read grading input")?;
        if line.trim().is_empty() {
            break;
        }

        let parsed = parse_selection(&line, &index, bounds);
        for rejection in &parsed.rejected {
            writeln!(out, "Ignored {}: {}", rejection.source, rejection.reason)?;
        }
        writeln!(out, "{} grade(s) selected", parsed.entries.len())?;
        collected.entries.extend(parsed.entries);
        collected.rejected.extend(parsed.rejected);
    }

    Ok(sync(api, settings, &snapshot, collected, kind, dry_run).await)
}

/// Exports the current roster as an editable grade table showing the
/// existing grades selected by `grade_columns`.
pub async fn export_grades<A: ClassroomApi>(
    api: &A,
    settings: &SyncSettings,
    assignment_id: &str,
    path: &Path,
    grade_columns: GradeColumns,
) -> Result<Snapshot> {
    let snapshot = fetch_snapshot(api, assignment_id).await?;
    write_table(path, &snapshot, &settings.export_options(grade_columns))
        .with_context(|| format!("Could not write grade table {}", path.display()))?;
    Ok(snapshot)
}

/// Prints the roster with its grades and returns the grading overview.
pub async fn show_grades<A: ClassroomApi>(api: &A, assignment_id: &str) -> Result<GradeOverview> {
    let snapshot = fetch_snapshot(api, assignment_id).await?;
    println!("{}", render_roster(&snapshot, &DisplayIndex::new(&snapshot)));
    Ok(GradeOverview::of(&snapshot))
}

/// Runs the capability probe on its own. The report carries no changes,
/// only the probe outcome and its guidance.
pub async fn test_permissions<A: ClassroomApi>(
    api: &A,
    assignment_id: &str,
) -> Result<SyncReport> {
    let snapshot = fetch_snapshot(api, assignment_id).await?;
    let mut report = SyncReport::new(&snapshot, Default::default());
    report.probe = Some(probe_capability(api, &snapshot).await);
    Ok(report)
}

/// Returns one submission to its student.
pub async fn return_submission<A: ClassroomApi>(
    api: &A,
    assignment_id: &str,
    submission_id: &str,
) -> Result<()> {
    let snapshot = fetch_snapshot(api, assignment_id).await?;
    let Some(row) = snapshot.find(submission_id) else {
        bail!("Submission `{submission_id}` is not part of assignment `{assignment_id}`");
    };

    api.return_submission(assignment_id, submission_id)
        .await
        .with_context(|| format!("Could not return the submission of {}", row.student_name))?;
    tracing::info!("Returned `{submission_id}` to {}", row.student_name);
    Ok(())
}
