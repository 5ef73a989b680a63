#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

/// Default REST endpoint of the classroom service.
pub const DEFAULT_API_BASE: &str = "https://classroom.googleapis.com/v1";

/// File written by `export-grades` and by the permission fallback when no
/// path is given.
pub const DEFAULT_GRADES_FILE: &str = "grades.csv";

/// Header of the student display name column.
pub const HEADER_STUDENT_NAME: &str = "Student Name";

/// Header of the student email column (informational).
pub const HEADER_EMAIL: &str = "Email";

/// Header of the remote user id column (informational).
pub const HEADER_USER_ID: &str = "User ID";

/// Header of the submission id column. The only join key on import.
pub const HEADER_SUBMISSION_ID: &str = "Submission ID";

/// Header of the submission state column.
pub const HEADER_STATE: &str = "State";

/// Header of the assigned grade column.
pub const HEADER_ASSIGNED_GRADE: &str = "Assigned Grade";

/// Header of the draft grade column.
pub const HEADER_DRAFT_GRADE: &str = "Draft Grade";

/// Header of the attachment indicator column.
pub const HEADER_HAS_ATTACHMENTS: &str = "Has Attachments";

/// Header of the lateness indicator column.
pub const HEADER_LATE: &str = "Late";

/// Header of the submission timestamp column (informational).
pub const HEADER_SUBMISSION_TIME: &str = "Submission Time";

/// Header of the editable grade column in the metadata layout.
pub const HEADER_GRADE_TO_ASSIGN: &str = "Grade to Assign";

/// Short spelling of the editable grade column accepted in the simple layout.
pub const HEADER_GRADE: &str = "Grade";

/// Marker written in place of a grade that has not been set.
pub const NOT_GRADED: &str = "Not graded";

/// Value used by the capability probe when the probed submission has no
/// draft grade of its own. It is cleared again right after.
pub const PROBE_GRADE: f64 = 0.0;

/// Number of decimal places grades are rounded to.
pub const GRADE_DECIMALS: i32 = 2;
