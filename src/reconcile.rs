#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::{collections::HashMap, fmt::Display, str::FromStr};

use anyhow::{Result, ensure};
use serde::{Deserialize, Serialize};

use crate::{constants::GRADE_DECIMALS, error::RejectReason, roster::Snapshot};

/// Which grade field a change writes.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GradeTarget {
    /// Only the draft grade (never visible to the student).
    Draft,
    /// Only the assigned grade.
    Final,
    /// Draft and assigned together.
    Both,
}

impl GradeTarget {
    /// Whether the draft grade is written.
    pub fn writes_draft(&self) -> bool {
        matches!(self, GradeTarget::Draft | GradeTarget::Both)
    }

    /// Whether the assigned grade is written.
    pub fn writes_assigned(&self) -> bool {
        matches!(self, GradeTarget::Final | GradeTarget::Both)
    }
}

impl FromStr for GradeTarget {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "draft" => Ok(GradeTarget::Draft),
            "final" | "assigned" => Ok(GradeTarget::Final),
            "both" => Ok(GradeTarget::Both),
            other => Err(format!("unknown grade kind `{other}` (expected draft, final or both)")),
        }
    }
}

impl Display for GradeTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            GradeTarget::Draft => "draft",
            GradeTarget::Final => "final",
            GradeTarget::Both => "both",
        })
    }
}

/// Inclusive range of accepted grade values.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct GradeBounds {
    /// Lowest accepted grade
    min: f64,
    /// Highest accepted grade
    max: f64,
}

impl Default for GradeBounds {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 100.0,
        }
    }
}

impl GradeBounds {
    /// Creates a range; `min` must not exceed `max` and both must be finite.
    pub fn new(min: f64, max: f64) -> Result<Self> {
        ensure!(min.is_finite() && max.is_finite(), "grade bounds must be finite");
        ensure!(min <= max, "grade minimum {min} exceeds maximum {max}");
        Ok(Self { min, max })
    }

    /// Lowest accepted grade.
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Highest accepted grade.
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Widens the upper bound to an assignment's maximum points when those
    /// are larger.
    pub fn for_max_points(self, max_points: Option<f64>) -> Self {
        match max_points {
            Some(points) if points.is_finite() && points > self.max => Self {
                min: self.min,
                max: points,
            },
            _ => self,
        }
    }

    /// Parses and validates a grade, rounding to the supported precision.
    pub fn parse(&self, raw: &str) -> Result<f64, RejectReason> {
        let value: f64 = raw
            .trim()
            .parse()
            .map_err(|_| RejectReason::InvalidGrade(format!("`{}` is not a number", raw.trim())))?;
        if !value.is_finite() {
            return Err(RejectReason::InvalidGrade(format!("`{}` is not finite", raw.trim())));
        }

        let value = round_grade(value);
        if value < self.min || value > self.max {
            return Err(RejectReason::InvalidGrade(format!(
                "{value} is outside {}..={}",
                self.min, self.max
            )));
        }
        Ok(value)
    }
}

/// Rounds a grade half away from zero to the supported number of decimals.
pub fn round_grade(value: f64) -> f64 {
    let scale = 10f64.powi(GRADE_DECIMALS);
    (value * scale).round() / scale
}

/// Where an input row came from, for the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowRef {
    /// A 1-based line of the grade table file.
    Line(usize),
    /// A bulk selector token.
    Token(String),
    /// A value given on the command line.
    Argument,
}

impl Display for RowRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RowRef::Line(n) => write!(f, "line {n}"),
            RowRef::Token(t) => write!(f, "token `{t}`"),
            RowRef::Argument => f.write_str("argument"),
        }
    }
}

/// One requested grade in canonical form, whatever the input format.
#[derive(Debug, Clone, PartialEq)]
pub struct GradeEntry {
    /// Origin of the entry
    pub source:        RowRef,
    /// Submission the grade is for
    pub submission_id: String,
    /// Display name as it appeared in the input, if any
    pub student_name:  Option<String>,
    /// Raw grade text; blank means "no change"
    pub grade:         String,
}

/// A row excluded from a change set.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    /// Origin of the rejected row
    pub source: RowRef,
    /// Why it was excluded
    pub reason: RejectReason,
}

/// Input handed to the reconciler: entries plus anything the parser already
/// refused.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedInput {
    /// Canonical entries in input order
    pub entries:  Vec<GradeEntry>,
    /// Rows the parser could not turn into entries
    pub rejected: Vec<Rejection>,
}

/// One grade mutation to apply.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct GradeChange {
    /// Submission to change
    pub submission_id: String,
    /// Value to write
    pub target_grade:  f64,
    /// Field(s) to write
    pub target_kind:   GradeTarget,
}

/// The validated, deduplicated set of grade mutations for one push.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChangeSet {
    /// Changes in first-appearance order of their submission id
    pub changes:    Vec<GradeChange>,
    /// Rows excluded from application
    pub rejected:   Vec<Rejection>,
    /// Rows considered, including blank and rejected ones
    pub total_rows: usize,
    /// Rows left blank, meaning no change
    pub unchanged:  usize,
}

impl ChangeSet {
    /// True when nothing would be written.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Turns parsed input into a change set against `snapshot`.
///
/// * blank grade: no change, not reported as an error
/// * unknown submission id: rejected
/// * non-numeric, non-finite or out-of-range grade: rejected
/// * repeated submission id: the last occurrence wins
///
/// Pure with respect to its inputs.
pub fn reconcile(
    snapshot: &Snapshot,
    input: ParsedInput,
    target: GradeTarget,
    bounds: GradeBounds,
) -> ChangeSet {
    let mut set = ChangeSet {
        total_rows: input.entries.len() + input.rejected.len(),
        rejected: input.rejected,
        ..Default::default()
    };
    let mut position: HashMap<String, usize> = HashMap::new();

    for entry in input.entries {
        if entry.grade.trim().is_empty() {
            set.unchanged += 1;
            continue;
        }

        let submission_id = entry.submission_id.trim();
        if snapshot.find(submission_id).is_none() {
            set.rejected.push(Rejection {
                source: entry.source,
                reason: RejectReason::UnknownSubmission(submission_id.to_string()),
            });
            continue;
        }

        let value = match bounds.parse(&entry.grade) {
            Ok(value) => value,
            Err(reason) => {
                set.rejected.push(Rejection {
                    source: entry.source,
                    reason,
                });
                continue;
            }
        };

        let change = GradeChange {
            submission_id: submission_id.to_string(),
            target_grade:  value,
            target_kind:   target,
        };
        match position.get(submission_id) {
            Some(&i) => {
                tracing::debug!(
                    "{} overrides an earlier grade for `{submission_id}`",
                    entry.source
                );
                set.changes[i] = change;
            }
            None => {
                position.insert(submission_id.to_string(), set.changes.len());
                set.changes.push(change);
            }
        }
    }

    set
}
