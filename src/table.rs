#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! The grade table codec: writes a snapshot as an editable CSV table and
//! reads an edited table back into canonical [`GradeEntry`] rows.
//!
//! Two layouts are accepted on import, told apart by their header row:
//!
//! * **metadata**: the full export, recognised by its `Student Name` column
//! * **simple**: at least `Submission ID` plus a `Grade to Assign` or `Grade`
//!   column
//!
//! Columns are always resolved by header name, never by position.

use std::{collections::HashMap, fmt::Display, path::Path, str::FromStr};

use itertools::Itertools;

use crate::{
    constants::*,
    error::{RejectReason, SyncError},
    reconcile::{GradeEntry, ParsedInput, Rejection, RowRef},
    roster::{DisplayIndex, RosterRow, Snapshot},
};

/// Which existing grade values an export surfaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GradeColumns {
    /// Only the assigned grade.
    Assigned,
    /// Only the draft grade.
    Draft,
    /// Both grades.
    #[default]
    Both,
}

impl FromStr for GradeColumns {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "assigned" | "final" => Ok(GradeColumns::Assigned),
            "draft" => Ok(GradeColumns::Draft),
            "both" => Ok(GradeColumns::Both),
            other => Err(format!(
                "unknown grade columns `{other}` (expected assigned, draft or both)"
            )),
        }
    }
}

impl Display for GradeColumns {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            GradeColumns::Assigned => "assigned",
            GradeColumns::Draft => "draft",
            GradeColumns::Both => "both",
        })
    }
}

/// Controls the shape of an exported table.
#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    /// Which existing grades to show
    pub grade_columns: GradeColumns,
    /// Include state, attachment, lateness and contact columns
    pub metadata:      bool,
    /// Course id written into the preamble; no preamble when `None`
    pub course_id:     Option<String>,
}

/// Column layout detected on import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableLayout {
    /// The full export layout.
    Metadata,
    /// Submission id and grade only.
    Simple,
}

/// Result of reading a grade table.
#[derive(Debug, Clone)]
pub struct ImportedTable {
    /// Detected layout
    pub layout: TableLayout,
    /// Entries and per-row failures
    pub input:  ParsedInput,
}

/// Renders `snapshot` as CSV text, one row per submission in display order.
pub fn export_table(snapshot: &Snapshot, options: &ExportOptions) -> String {
    let mut lines: Vec<String> = Vec::new();

    if let Some(course_id) = &options.course_id {
        let assignment = snapshot.assignment();
        lines.push(csv_record([format!("Assignment: {}", assignment.title)]));
        lines.push(csv_record([format!("Course ID: {course_id}")]));
        lines.push(csv_record([format!("Assignment ID: {}", assignment.id)]));
        lines.push(String::new());
    }

    let columns = export_columns(options);
    lines.push(csv_record(columns.iter().map(|c| c.to_string())));

    let index = DisplayIndex::new(snapshot);
    for row in index.iter().filter_map(|(_, id)| snapshot.find(id)) {
        lines.push(csv_record(columns.iter().map(|c| cell(row, c))));
    }

    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Writes the export of `snapshot` to `path`.
pub fn write_table(
    path: &Path,
    snapshot: &Snapshot,
    options: &ExportOptions,
) -> Result<(), SyncError> {
    std::fs::write(path, export_table(snapshot, options))?;
    tracing::info!("Wrote {} rows to {}", snapshot.len(), path.display());
    Ok(())
}

/// Reads and parses the grade table at `path`.
pub fn read_table(path: &Path) -> Result<ImportedTable, SyncError> {
    let text = std::fs::read_to_string(path)?;
    parse_table(&text)
}

/// Headers of an export, in order.
fn export_columns(options: &ExportOptions) -> Vec<&'static str> {
    let mut columns = vec![HEADER_STUDENT_NAME];
    if options.metadata {
        columns.extend([HEADER_EMAIL, HEADER_USER_ID]);
    }
    columns.push(HEADER_SUBMISSION_ID);
    if options.metadata {
        columns.push(HEADER_STATE);
    }
    if matches!(options.grade_columns, GradeColumns::Assigned | GradeColumns::Both) {
        columns.push(HEADER_ASSIGNED_GRADE);
    }
    if matches!(options.grade_columns, GradeColumns::Draft | GradeColumns::Both) {
        columns.push(HEADER_DRAFT_GRADE);
    }
    if options.metadata {
        columns.extend([HEADER_HAS_ATTACHMENTS, HEADER_LATE, HEADER_SUBMISSION_TIME]);
    }
    columns.push(HEADER_GRADE_TO_ASSIGN);
    columns
}

/// Value of `column` for `row`.
fn cell(row: &RosterRow, column: &str) -> String {
    let grade = |g: Option<f64>| g.map(|v| v.to_string()).unwrap_or_else(|| NOT_GRADED.into());
    let yes_no = |b: bool| if b { "Yes" } else { "No" }.to_string();

    match column {
        HEADER_STUDENT_NAME => row.student_name.clone(),
        HEADER_EMAIL => row.student_email.clone(),
        HEADER_USER_ID => row.student_id.clone(),
        HEADER_SUBMISSION_ID => row.submission_id.clone(),
        HEADER_STATE => row.state.to_string(),
        HEADER_ASSIGNED_GRADE => grade(row.assigned_grade),
        HEADER_DRAFT_GRADE => grade(row.draft_grade),
        HEADER_HAS_ATTACHMENTS => yes_no(row.has_attachments),
        HEADER_LATE => yes_no(row.is_late),
        HEADER_SUBMISSION_TIME => row
            .submitted_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_default(),
        _ => String::new(),
    }
}

/// Parses grade table text.
///
/// Rows above the header (the export preamble) are ignored. A table without a
/// submission id or grade column is rejected as a whole.
pub fn parse_table(text: &str) -> Result<ImportedTable, SyncError> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let records = parse_records(text);

    let (header_pos, header) = records
        .iter()
        .enumerate()
        .find_map(|(i, (_, cells))| {
            cells
                .iter()
                .any(|c| same_header(c, HEADER_SUBMISSION_ID))
                .then_some((i, cells))
        })
        .ok_or_else(|| {
            SyncError::MalformedTable(format!("no `{HEADER_SUBMISSION_ID}` column found"))
        })?;

    let mut index: HashMap<String, usize> = HashMap::new();
    for (i, name) in header.iter().enumerate() {
        index.entry(normalize(name)).or_insert(i);
    }
    let column = |name: &str| index.get(&normalize(name)).copied();

    let id_col = column(HEADER_SUBMISSION_ID)
        .ok_or_else(|| SyncError::MalformedTable(format!("no `{HEADER_SUBMISSION_ID}` column")))?;
    let grade_col = column(HEADER_GRADE_TO_ASSIGN)
        .or_else(|| column(HEADER_GRADE))
        .ok_or_else(|| {
            SyncError::MalformedTable(format!(
                "no `{HEADER_GRADE_TO_ASSIGN}` or `{HEADER_GRADE}` column"
            ))
        })?;
    let name_col = column(HEADER_STUDENT_NAME);
    let layout = if name_col.is_some() {
        TableLayout::Metadata
    } else {
        TableLayout::Simple
    };

    let mut input = ParsedInput::default();
    for (line, cells) in records.iter().skip(header_pos + 1) {
        if cells.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        let get = |i: usize| cells.get(i).map(|c| c.trim()).unwrap_or_default();
        let submission_id = get(id_col);
        let grade = get(grade_col);

        if submission_id.is_empty() {
            if !grade.is_empty() {
                input.rejected.push(Rejection {
                    source: RowRef::Line(*line),
                    reason: RejectReason::MissingSubmissionId,
                });
            }
            continue;
        }

        input.entries.push(GradeEntry {
            source:        RowRef::Line(*line),
            submission_id: submission_id.to_string(),
            student_name:  name_col.map(get).filter(|n| !n.is_empty()).map(str::to_owned),
            grade:         grade.to_string(),
        });
    }

    tracing::debug!(
        "Parsed {:?} grade table: {} entries, {} rejected",
        layout,
        input.entries.len(),
        input.rejected.len()
    );
    Ok(ImportedTable { layout, input })
}

/// Header comparison key.
fn normalize(header: &str) -> String {
    header.trim().to_lowercase()
}

/// Case- and whitespace-insensitive header match.
fn same_header(cell: &str, header: &str) -> bool {
    normalize(cell) == normalize(header)
}

/// Quotes a CSV field when needed.
fn csv_quote(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') || s.contains('\r') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Joins fields into one CSV line.
fn csv_record<I, S>(fields: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    fields.into_iter().map(|f| csv_quote(f.as_ref())).join(",")
}

/// Splits CSV text into records, each tagged with the 1-based line it starts
/// on. Quoted fields may span lines.
fn parse_records(text: &str) -> Vec<(usize, Vec<String>)> {
    let mut records = Vec::new();
    let mut fields: Vec<String> = Vec::new();
    let mut buf = String::new();
    let mut in_quotes = false;
    let mut line = 1usize;
    let mut record_line = 1usize;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes && chars.peek() == Some(&'"') => {
                buf.push('"');
                chars.next();
            }
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => fields.push(std::mem::take(&mut buf)),
            '\r' if !in_quotes => {}
            '\n' if !in_quotes => {
                fields.push(std::mem::take(&mut buf));
                records.push((record_line, std::mem::take(&mut fields)));
                line += 1;
                record_line = line;
            }
            '\n' => {
                buf.push(ch);
                line += 1;
            }
            _ => buf.push(ch),
        }
    }
    if !buf.is_empty() || !fields.is_empty() {
        fields.push(buf);
        records.push((record_line, fields));
    }
    records
}
