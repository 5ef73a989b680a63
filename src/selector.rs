#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]

use std::collections::BTreeMap;

use crate::{
    error::RejectReason,
    reconcile::{GradeBounds, GradeEntry, ParsedInput, Rejection, RowRef},
    roster::DisplayIndex,
};

/// Which display indices a token covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Span {
    /// `N`
    Single(usize),
    /// `N1-N2`, inclusive
    Range(usize, usize),
    /// `all`
    All,
}

/// Parses one line of bulk grading input against a session's display index.
///
/// Tokens are whitespace separated and take the forms `N:G`, `N1-N2:G` and
/// `all:G`. Later tokens override earlier ones for the indices they share.
/// Malformed tokens, including grades outside `bounds`, are rejected
/// individually and never override an earlier valid token; the rest of the
/// line still applies. The result feeds the reconciler like a parsed grade
/// table.
pub fn parse_selection(line: &str, index: &DisplayIndex, bounds: GradeBounds) -> ParsedInput {
    let mut chosen: BTreeMap<usize, (String, String)> = BTreeMap::new();
    let mut rejected = Vec::new();

    for token in line.split_whitespace() {
        match parse_token(token, index.len(), bounds) {
            Ok((span, grade)) => {
                let (start, end) = match span {
                    Span::Single(n) => (n, n),
                    Span::Range(a, b) => (a, b),
                    Span::All => (1, index.len()),
                };
                for i in start..=end {
                    chosen.insert(i, (grade.clone(), token.to_string()));
                }
            }
            Err(msg) => rejected.push(Rejection {
                source: RowRef::Token(token.to_string()),
                reason: RejectReason::MalformedToken(msg),
            }),
        }
    }

    let entries = chosen
        .into_iter()
        .filter_map(|(i, (grade, token))| {
            index.submission_id(i).map(|id| GradeEntry {
                source: RowRef::Token(token),
                submission_id: id.to_string(),
                student_name: None,
                grade,
            })
        })
        .collect();

    ParsedInput { entries, rejected }
}

/// Parses a single `selector:grade` token.
fn parse_token(token: &str, len: usize, bounds: GradeBounds) -> Result<(Span, String), String> {
    let (selector, grade) = token
        .split_once(':')
        .ok_or_else(|| format!("`{token}` has no `:grade` part"))?;
    bounds
        .parse(grade)
        .map_err(|reason| format!("`{token}`: {reason}"))?;

    let in_range = |n: usize| {
        if (1..=len).contains(&n) {
            Ok(n)
        } else {
            Err(format!("index {n} in `{token}` is outside 1..={len}"))
        }
    };
    let number = |s: &str| {
        s.trim()
            .parse::<usize>()
            .map_err(|_| format!("`{s}` in `{token}` is not an index or `all`"))
    };

    let span = if selector.eq_ignore_ascii_case("all") {
        Span::All
    } else if let Some((a, b)) = selector.split_once('-') {
        let (a, b) = (in_range(number(a)?)?, in_range(number(b)?)?);
        if a > b {
            return Err(format!("range `{selector}` in `{token}` is inverted"));
        }
        Span::Range(a, b)
    } else {
        Span::Single(in_range(number(selector)?)?)
    };

    Ok((span, grade.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roster::{Assignment, RosterRow, Snapshot};

    fn index(n: usize) -> DisplayIndex {
        let rows = (1..=n)
            .map(|i| {
                RosterRow::builder()
                    .submission_id(format!("sub-{i}"))
                    .student_name(format!("Student {i:02}"))
                    .build()
            })
            .collect();
        DisplayIndex::new(&Snapshot::new(Assignment::default(), rows))
    }

    fn parse(line: &str, n: usize) -> ParsedInput {
        parse_selection(line, &index(n), GradeBounds::default())
    }

    fn grades(input: &ParsedInput) -> Vec<(&str, &str)> {
        input
            .entries
            .iter()
            .map(|e| (e.submission_id.as_str(), e.grade.as_str()))
            .collect()
    }

    #[test]
    fn range_and_single_tokens() {
        let input = parse("1-3:80 5:95", 5);

        assert!(input.rejected.is_empty());
        assert_eq!(grades(&input), vec![
            ("sub-1", "80"),
            ("sub-2", "80"),
            ("sub-3", "80"),
            ("sub-5", "95"),
        ]);
    }

    #[test]
    fn later_tokens_override_earlier_ones() {
        let input = parse("all:70 2:100", 3);

        assert_eq!(grades(&input), vec![("sub-1", "70"), ("sub-2", "100"), ("sub-3", "70")]);
        assert_eq!(input.entries[1].source, RowRef::Token("2:100".into()));
    }

    #[test]
    fn malformed_tokens_are_rejected_individually() {
        let input = parse("1:abc 3-2:50 9:10 some:5 nograde 2:60", 4);

        assert_eq!(grades(&input), vec![("sub-2", "60")]);
        let rejected: Vec<_> = input
            .rejected
            .iter()
            .map(|r| match &r.source {
                RowRef::Token(t) => t.as_str(),
                _ => "",
            })
            .collect();
        assert_eq!(rejected, vec!["1:abc", "3-2:50", "9:10", "some:5", "nograde"]);
        assert!(
            input
                .rejected
                .iter()
                .all(|r| matches!(r.reason, RejectReason::MalformedToken(_)))
        );
    }

    #[test]
    fn zero_is_out_of_range() {
        let input = parse("0:50", 2);
        assert!(input.entries.is_empty());
        assert_eq!(input.rejected.len(), 1);
    }

    #[test]
    fn out_of_range_token_keeps_the_earlier_grade() {
        let input = parse("all:70 2:150", 3);

        assert_eq!(grades(&input), vec![("sub-1", "70"), ("sub-2", "70"), ("sub-3", "70")]);
        assert_eq!(input.rejected.len(), 1);
        assert_eq!(input.rejected[0].source, RowRef::Token("2:150".into()));
        assert!(matches!(input.rejected[0].reason, RejectReason::MalformedToken(_)));
    }

    #[test]
    fn bounds_follow_the_assignment() {
        let bounds = GradeBounds::default().for_max_points(Some(150.0));
        let input = parse_selection("2:150", &index(3), bounds);

        assert!(input.rejected.is_empty());
        assert_eq!(grades(&input), vec![("sub-2", "150")]);
    }
}
