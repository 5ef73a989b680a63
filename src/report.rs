#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{collections::HashMap, fmt::Display, path::PathBuf};

use colored::Colorize;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Panel, Style, Width, object::Rows},
};

use crate::{
    constants::NOT_GRADED,
    probe::{Capability, ProbeReport},
    push::{PushOutcome, PushResult},
    reconcile::ChangeSet,
    roster::{DisplayIndex, Snapshot},
};

/// Aggregate counts of one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    /// Rows considered
    pub total_rows: usize,
    /// Changes written
    pub applied:    usize,
    /// Blank rows plus changes already at their target
    pub skipped:    usize,
    /// Rows excluded for bad input
    pub rejected:   usize,
    /// Writes refused for lack of permission
    pub denied:     usize,
    /// Writes that failed otherwise
    pub failed:     usize,
    /// Changes not attempted because of a dry run or the permission fallback
    pub withheld:   usize,
}

impl Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "total {} | applied {} | skipped {} | rejected {} | denied {} | failed {} | withheld \
             {}",
            self.total_rows,
            self.applied,
            self.skipped,
            self.rejected,
            self.denied,
            self.failed,
            self.withheld
        )
    }
}

/// Unified outcome of one grade synchronization run.
///
/// Rejected input rows and remote push outcomes end up side by side, so a
/// reader can tell bad input from remote refusal.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// Assignment the run addressed
    pub assignment_id: String,
    /// Assignment title, for headings
    pub title:         String,
    /// The reconciled changes and rejections
    pub changes:       ChangeSet,
    /// One result per change actually attempted
    pub results:       Vec<PushResult>,
    /// Whether writes were deliberately withheld
    pub dry_run:       bool,
    /// Outcome of the permission probe, when one ran
    pub probe:         Option<ProbeReport>,
    /// Where the fallback export was written, if one was
    pub fallback_file: Option<PathBuf>,
    /// Student names keyed by submission id
    names:             HashMap<String, String>,
}

/// One printed line of a report.
#[derive(Tabled)]
struct ReportLine {
    /// Submission or input location
    #[tabled(rename = "Row")]
    row:     String,
    /// Student display name
    #[tabled(rename = "Student")]
    student: String,
    /// Grade field(s)
    #[tabled(rename = "Kind")]
    kind:    String,
    /// Target value
    #[tabled(rename = "Grade")]
    grade:   String,
    /// What happened
    #[tabled(rename = "Outcome")]
    outcome: String,
    /// Why
    #[tabled(rename = "Detail")]
    detail:  String,
}

impl SyncReport {
    /// Starts a report for `changes` reconciled against `snapshot`.
    pub fn new(snapshot: &Snapshot, changes: ChangeSet) -> Self {
        Self {
            assignment_id: snapshot.assignment_id().to_string(),
            title: snapshot.assignment().title.clone(),
            changes,
            results: Vec::new(),
            dry_run: false,
            probe: None,
            fallback_file: None,
            names: snapshot
                .rows()
                .iter()
                .map(|r| (r.submission_id.clone(), r.student_name.clone()))
                .collect(),
        }
    }

    /// Aggregate counts.
    pub fn summary(&self) -> Summary {
        let count = |outcome: PushOutcome| {
            self.results
                .iter()
                .filter(|r| r.outcome == outcome)
                .count()
        };
        Summary {
            total_rows: self.changes.total_rows,
            applied:    count(PushOutcome::Applied),
            skipped:    count(PushOutcome::Skipped) + self.changes.unchanged,
            rejected:   self.changes.rejected.len(),
            denied:     count(PushOutcome::PermissionDenied),
            failed:     count(PushOutcome::Failed),
            withheld:   if self.results.is_empty() && (self.dry_run || self.fell_back()) {
                self.changes.changes.len()
            } else {
                0
            },
        }
    }

    /// Whether the changes were routed to the export fallback instead of
    /// being written.
    pub fn fell_back(&self) -> bool {
        self.probe.as_ref().is_some_and(|p| !p.is_capable())
    }

    /// Advice for the user, distinguishing confirmed denial from an
    /// undetermined capability.
    pub fn guidance(&self) -> Vec<String> {
        let mut out = Vec::new();
        let next = match &self.fallback_file {
            Some(path) => format!(
                "The current roster was exported to {}; fill in the Grade to Assign column and \
                 run import-grades",
                path.display()
            ),
            None => "Use export-grades, fill in the Grade to Assign column and run \
                     import-grades"
                .to_string(),
        };

        if let Some(probe) = &self.probe {
            match probe.capability {
                Capability::Denied => out.push(format!(
                    "Permission denied: this account may not write grades for assignment `{}` \
                     ({}). {next} with an account that can grade, or enter the grades in the \
                     classroom web interface.",
                    self.assignment_id, probe.detail
                )),
                Capability::Unknown => out.push(format!(
                    "Could not determine whether this account may write grades ({}). Nothing \
                     was written. Retry later, or: {next} once the service is reachable.",
                    probe.detail
                )),
                Capability::Capable => {}
            }
            if let (Some(err), Some(id)) = (&probe.revert_failure, &probe.submission_id) {
                out.push(format!(
                    "The permission probe could not clear its test draft grade on submission \
                     `{id}` ({err}). Clear that draft grade manually."
                ));
            }
        }

        let summary = self.summary();
        if summary.denied > 0 {
            out.push(format!(
                "{} write(s) were denied; export-grades then import-grades is the fallback path.",
                summary.denied
            ));
        }
        if self.dry_run && !self.changes.is_empty() {
            out.push(format!(
                "Dry run: {} change(s) planned, nothing written. Re-run with --commit to apply.",
                self.changes.changes.len()
            ));
        }
        out
    }

    /// Itemized lines: rejections first, then push results or planned changes.
    fn lines(&self) -> Vec<ReportLine> {
        let name = |id: &str| self.names.get(id).cloned().unwrap_or_default();
        let mut lines: Vec<ReportLine> = self
            .changes
            .rejected
            .iter()
            .map(|r| ReportLine {
                row:     r.source.to_string(),
                student: String::new(),
                kind:    String::new(),
                grade:   String::new(),
                outcome: "rejected".into(),
                detail:  r.reason.to_string(),
            })
            .collect();

        if self.results.is_empty() {
            let outcome = if self.fell_back() { "not written" } else { "planned" };
            lines.extend(self.changes.changes.iter().map(|c| ReportLine {
                row:     c.submission_id.clone(),
                student: name(&c.submission_id),
                kind:    c.target_kind.to_string(),
                grade:   c.target_grade.to_string(),
                outcome: outcome.into(),
                detail:  String::new(),
            }));
        } else {
            lines.extend(self.results.iter().map(|r| ReportLine {
                row:     r.submission_id.clone(),
                student: name(&r.submission_id),
                kind:    r.kind.to_string(),
                grade:   r.grade.to_string(),
                outcome: r.outcome.to_string(),
                detail:  r.detail.clone(),
            }));
        }
        lines
    }

    /// Renders the report for the terminal.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let lines = self.lines();
        let summary = self.summary();

        if !lines.is_empty() {
            let heading = if self.dry_run {
                format!("{} (dry run)", self.title)
            } else {
                self.title.clone()
            };
            out.push_str(
                &Table::new(&lines)
                    .with(Panel::header(heading))
                    .with(Panel::footer(summary.to_string()))
                    .with(Modify::new(Rows::new(1..)).with(Width::wrap(40).keep_words(true)))
                    .with(
                        Modify::new(Rows::first())
                            .with(Alignment::center())
                            .with(Alignment::center_vertical()),
                    )
                    .with(
                        Modify::new(Rows::last())
                            .with(Alignment::center())
                            .with(Alignment::center_vertical()),
                    )
                    .with(Style::modern())
                    .to_string(),
            );
            out.push('\n');
        } else {
            out.push_str(&format!("{}\n", summary.to_string().bold()));
        }

        for line in self.guidance() {
            out.push_str(&format!("{}\n", line.yellow()));
        }
        out
    }
}

/// Grading progress of a roster.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GradeOverview {
    /// Submissions in the roster
    pub total:        usize,
    /// Submissions with an assigned grade
    pub fully_graded: usize,
    /// Submissions with only a draft grade
    pub draft_only:   usize,
    /// Submissions with neither grade
    pub ungraded:     usize,
}

impl GradeOverview {
    /// Counts the grading state of `snapshot`.
    pub fn of(snapshot: &Snapshot) -> Self {
        snapshot
            .rows()
            .iter()
            .fold(Self::default(), |mut acc, row| {
                acc.total += 1;
                match (row.assigned_grade, row.draft_grade) {
                    (Some(_), _) => acc.fully_graded += 1,
                    (None, Some(_)) => acc.draft_only += 1,
                    (None, None) => acc.ungraded += 1,
                }
                acc
            })
    }
}

impl Display for GradeOverview {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} submissions: {} graded, {} draft only, {} ungraded",
            self.total, self.fully_graded, self.draft_only, self.ungraded
        )
    }
}

/// One printed roster line.
#[derive(Tabled)]
struct RosterLine {
    /// Display index
    #[tabled(rename = "#")]
    index:    usize,
    /// Student display name
    #[tabled(rename = "Student")]
    student:  String,
    /// Submission id
    #[tabled(rename = "Submission ID")]
    id:       String,
    /// Lifecycle state
    #[tabled(rename = "State")]
    state:    String,
    /// Assigned grade
    #[tabled(rename = "Assigned")]
    assigned: String,
    /// Draft grade
    #[tabled(rename = "Draft")]
    draft:    String,
    /// Late marker
    #[tabled(rename = "Late")]
    late:     String,
}

/// Renders the roster numbered by `index`, with a grading overview footer.
pub fn render_roster(snapshot: &Snapshot, index: &DisplayIndex) -> String {
    let grade = |g: Option<f64>| g.map(|v| v.to_string()).unwrap_or_else(|| NOT_GRADED.into());
    let lines: Vec<RosterLine> = index
        .iter()
        .filter_map(|(i, id)| snapshot.find(id).map(|row| (i, row)))
        .map(|(i, row)| RosterLine {
            index:    i,
            student:  row.student_name.clone(),
            id:       row.submission_id.clone(),
            state:    row.state.to_string(),
            assigned: grade(row.assigned_grade),
            draft:    grade(row.draft_grade),
            late:     if row.is_late { "yes".into() } else { String::new() },
        })
        .collect();

    Table::new(&lines)
        .with(Panel::header(snapshot.assignment().title.clone()))
        .with(Panel::footer(GradeOverview::of(snapshot).to_string()))
        .with(
            Modify::new(Rows::first())
                .with(Alignment::center())
                .with(Alignment::center_vertical()),
        )
        .with(Style::modern())
        .to_string()
}
