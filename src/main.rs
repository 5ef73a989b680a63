#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

//! # gradesync
//!
//! Export a classroom assignment's grades to an editable table, fill it in,
//! and push the grades back.
//!
//! Configure `COURSE_ID` and `CLASSROOM_ACCESS_TOKEN` in your environment or a
//! `.env` file, then run e.g. `gradesync export-grades <ASSIGNMENT>`.

use std::path::PathBuf;

use anyhow::{Context, Result};
use bpaf::*;
use colored::Colorize;
use dotenvy::dotenv;
use gradesync::{
    classroom::HttpClassroom,
    commands::{self, SyncSettings},
    config,
    constants::DEFAULT_GRADES_FILE,
    probe::Capability,
    reconcile::GradeTarget,
    table::GradeColumns,
};
use tracing::{Level, metadata::LevelFilter};
use tracing_subscriber::{fmt, prelude::*, util::SubscriberInitExt};

/// Grade commands.
#[derive(Debug, Clone)]
enum Cmd {
    /// Give every submission the same grade
    GradeAll {
        /// Which grade field(s) to write
        kind:       GradeTarget,
        /// Report without writing
        dry_run:    bool,
        /// Assignment id
        assignment: String,
        /// Grade value
        grade:      String,
    },
    /// Grade one submission
    Grade {
        /// Which grade field(s) to write
        kind:       GradeTarget,
        /// Assignment id
        assignment: String,
        /// Submission id
        submission: String,
        /// Grade value
        grade:      String,
    },
    /// Promote draft grades to assigned grades
    PushDraftGrades {
        /// Report without writing
        dry_run:    bool,
        /// Assignment id
        assignment: String,
    },
    /// Push an edited grade table
    PushGradesFromFile {
        /// Which grade field(s) to write
        kind:       GradeTarget,
        /// Assignment id
        assignment: String,
        /// Grade table
        file:       PathBuf,
    },
    /// Interactive bulk grading
    PushGradesBulk {
        /// Which grade field(s) to write
        kind:       GradeTarget,
        /// Report without writing
        dry_run:    bool,
        /// Assignment id
        assignment: String,
    },
    /// Export the roster as a grade table
    ExportGrades {
        /// Destination file
        output:     PathBuf,
        /// Which existing grades to show
        grades:     GradeColumns,
        /// Assignment id
        assignment: String,
    },
    /// Import an edited grade table
    ImportGrades {
        /// Actually write grades; dry run otherwise
        commit:     bool,
        /// Assignment id
        assignment: String,
        /// Grade table
        file:       PathBuf,
    },
    /// Show the roster and its grades
    ShowGrades(String),
    /// Check grade write permission
    TestPermissions(String),
    /// Return a submission to its student
    ReturnSubmission(String, String),
}

/// Options shared by every command.
#[derive(Debug, Clone)]
struct Opts {
    /// Course id overriding `COURSE_ID`
    course:    Option<String>,
    /// Upper grade bound overriding `GRADE_MAX`
    max_grade: Option<f64>,
    /// The command to run
    cmd:       Cmd,
}

/// Parse the command line arguments and return `Opts`
fn options() -> Opts {
    /// parses the assignment id
    fn a() -> impl Parser<String> {
        positional("ASSIGNMENT").help("Assignment (coursework) id")
    }

    /// parses a submission id
    fn s() -> impl Parser<String> {
        positional("SUBMISSION").help("Submission id")
    }

    /// parses a grade table path
    fn f() -> impl Parser<PathBuf> {
        positional("FILE").help("Grade table (CSV)")
    }

    /// parses a grade value
    fn g() -> impl Parser<String> {
        positional("GRADE").help("Grade value")
    }

    /// parses the grade kind, defaulting to `default`
    fn k(default: GradeTarget) -> impl Parser<GradeTarget> {
        long("kind")
            .short('k')
            .help("Grade field(s) to write: draft, final or both")
            .argument::<GradeTarget>("KIND")
            .fallback(default)
            .display_fallback()
    }

    /// parses the dry run switch
    fn d() -> impl Parser<bool> {
        long("dry-run")
            .help("Report what would change without writing anything")
            .switch()
    }

    let grade_all = {
        let (kind, dry_run, assignment, grade) = (k(GradeTarget::Draft), d(), a(), g());
        construct!(Cmd::GradeAll {
            kind,
            dry_run,
            assignment,
            grade
        })
        .to_options()
        .command("grade-all")
        .help("Give every submission of an assignment the same grade")
    };

    let grade = {
        let (kind, assignment, submission, grade) = (k(GradeTarget::Both), a(), s(), g());
        construct!(Cmd::Grade {
            kind,
            assignment,
            submission,
            grade
        })
        .to_options()
        .command("grade")
        .help("Grade one submission")
    };

    let push_draft = {
        let (dry_run, assignment) = (d(), a());
        construct!(Cmd::PushDraftGrades {
            dry_run,
            assignment
        })
        .to_options()
        .command("push-draft-grades")
        .help("Promote every draft grade to the assigned grade")
    };

    let push_file = {
        let (kind, assignment, file) = (k(GradeTarget::Both), a(), f());
        construct!(Cmd::PushGradesFromFile {
            kind,
            assignment,
            file
        })
        .to_options()
        .command("push-grades-from-file")
        .help("Push the grades of an edited grade table")
    };

    let push_bulk = {
        let (kind, dry_run, assignment) = (k(GradeTarget::Draft), d(), a());
        construct!(Cmd::PushGradesBulk {
            kind,
            dry_run,
            assignment
        })
        .to_options()
        .command("push-grades-bulk")
        .help("Grade interactively with selectors such as `1-3:80 5:95`")
    };

    let export = {
        let output = long("output")
            .short('o')
            .help("Where to write the grade table")
            .argument::<PathBuf>("FILE")
            .fallback(PathBuf::from(DEFAULT_GRADES_FILE));
        let grades = long("grades")
            .short('g')
            .help("Existing grades to show: assigned, draft or both")
            .argument::<GradeColumns>("GRADES")
            .fallback(GradeColumns::Both)
            .display_fallback();
        let assignment = a();
        construct!(Cmd::ExportGrades {
            output,
            grades,
            assignment
        })
            .to_options()
            .command("export-grades")
            .help("Export the roster as an editable grade table")
    };

    let import = {
        let commit = long("commit")
            .help("Write the grades; without it the import is a dry run")
            .switch();
        let (assignment, file) = (a(), f());
        construct!(Cmd::ImportGrades {
            commit,
            assignment,
            file
        })
        .to_options()
        .command("import-grades")
        .help("Import an edited grade table (draft and assigned grades)")
    };

    let show = construct!(Cmd::ShowGrades(a()))
        .to_options()
        .command("show-grades")
        .help("Show the roster with its grades");

    let test = construct!(Cmd::TestPermissions(a()))
        .to_options()
        .command("test-permissions")
        .help("Check whether this account may write grades");

    let return_cmd = construct!(Cmd::ReturnSubmission(a(), s()))
        .to_options()
        .command("return-submission")
        .help("Return a submission, making its assigned grade visible");

    let cmd = construct!([
        grade_all, grade, push_draft, push_file, push_bulk, export, import, show, test,
        return_cmd
    ]);

    let course = long("course")
        .short('c')
        .help("Course id (defaults to COURSE_ID)")
        .argument::<String>("COURSE")
        .optional();
    let max_grade = long("max-grade")
        .help("Highest accepted grade (defaults to GRADE_MAX)")
        .argument::<f64>("POINTS")
        .optional();

    construct!(Opts {
        course,
        max_grade,
        cmd
    })
    .to_options()
    .descr("Keep classroom grades in sync with an editable grade table")
    .run()
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let level = std::env::var("GRADESYNC_LOG")
        .ok()
        .and_then(|value| value.trim().parse::<Level>().ok())
        .unwrap_or(Level::INFO);
    let fmt = fmt::layer()
        .without_time()
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr);
    let filter_layer = LevelFilter::from_level(level);
    tracing_subscriber::registry()
        .with(fmt)
        .with(filter_layer)
        .init();

    let opts = options();
    let config = config::get()?;
    let api = HttpClassroom::from_config(&config, opts.course.as_deref())?;
    let settings = SyncSettings::from_config(&config, api.course_id(), opts.max_grade)?;

    let report = match opts.cmd {
        Cmd::GradeAll {
            kind,
            dry_run,
            assignment,
            grade,
        } => commands::grade_all(&api, &settings, &assignment, &grade, kind, dry_run).await?,
        Cmd::Grade {
            kind,
            assignment,
            submission,
            grade,
        } => commands::grade_one(&api, &settings, &assignment, &submission, &grade, kind).await?,
        Cmd::PushDraftGrades {
            dry_run,
            assignment,
        } => commands::push_draft_grades(&api, &settings, &assignment, dry_run).await?,
        Cmd::PushGradesFromFile {
            kind,
            assignment,
            file,
        } => commands::push_grades_from_file(&api, &settings, &assignment, &file, kind).await?,
        Cmd::PushGradesBulk {
            kind,
            dry_run,
            assignment,
        } => {
            let stdin = std::io::stdin().lock();
            let stdout = std::io::stdout().lock();
            commands::push_grades_bulk(&api, &settings, &assignment, kind, dry_run, stdin, stdout)
                .await?
        }
        Cmd::ExportGrades {
            output,
            grades,
            assignment,
        } => {
            let snapshot =
                commands::export_grades(&api, &settings, &assignment, &output, grades).await?;
            println!(
                "Exported {} submissions of {} to {}",
                snapshot.len(),
                snapshot.assignment().title.bold(),
                output.display()
            );
            println!(
                "Fill in the Grade to Assign column, then run `gradesync import-grades \
                 {assignment} {}`",
                output.display()
            );
            return Ok(());
        }
        Cmd::ImportGrades {
            commit,
            assignment,
            file,
        } => commands::import_grades(&api, &settings, &assignment, &file, !commit).await?,
        Cmd::ShowGrades(assignment) => {
            let overview = commands::show_grades(&api, &assignment).await?;
            println!("{}", overview.to_string().bold());
            return Ok(());
        }
        Cmd::TestPermissions(assignment) => {
            let report = commands::test_permissions(&api, &assignment).await?;
            if let Some(probe) = &report.probe {
                let verdict = match probe.capability {
                    Capability::Capable => "Grade writes are permitted".green(),
                    Capability::Denied => "Grade writes are denied".red(),
                    Capability::Unknown => "Grade write permission is undetermined".yellow(),
                };
                println!("{verdict}: {}", probe.detail);
            }
            for line in report.guidance() {
                println!("{}", line.yellow());
            }
            return Ok(());
        }
        Cmd::ReturnSubmission(assignment, submission) => {
            commands::return_submission(&api, &assignment, &submission)
                .await
                .context("Failed to return the submission")?;
            return Ok(());
        }
    };

    print!("{}", report.render());
    Ok(())
}
