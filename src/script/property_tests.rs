//! Property-based tests for comment stripping and segmentation.

use proptest::prelude::*;

use super::lexer::{Step, steps, strip_comments};

// ============================================================================
// Test Strategies - Input Generation
// ============================================================================

/// Lines that contain nothing but comments and blanks.
fn comment_line() -> impl Strategy<Value = String> {
    prop_oneof![
        Just(String::new()),
        "[ \t]{0,4}".prop_map(String::from),
        "[ \t]{0,4}--[a-zA-Z0-9 ;.]{0,20}".prop_map(String::from),
        "[ \t]{0,4}/\\*[a-zA-Z0-9 ;.\n]{0,20}\\*/[ \t]{0,4}".prop_map(String::from),
    ]
}

fn comment_buffer() -> impl Strategy<Value = String> {
    prop::collection::vec(comment_line(), 0..12).prop_map(|lines| lines.join("\n"))
}

/// Simple terminated statements.
fn statement() -> impl Strategy<Value = String> {
    "(INSERT INTO t VALUES \\([0-9]{1,3}\\)|SELECT [0-9]{1,3}|DELETE FROM t)"
        .prop_map(|s| format!("{s};"))
}

proptest! {
    /// Comments and blank lines never produce a step.
    #[test]
    fn comment_only_buffers_are_empty(buffer in comment_buffer()) {
        let text = strip_comments(&buffer);
        prop_assert_eq!(steps(&text).count(), 0);
    }

    /// Each terminated line is exactly one unit, in order.
    #[test]
    fn one_unit_per_terminated_line(stmts in prop::collection::vec(statement(), 0..20)) {
        let buffer = stmts.join("\n  \n");
        let text = strip_comments(&buffer);
        let units: Vec<String> = steps(&text)
            .map(|step| match step {
                Ok(Step::Statement(unit)) => unit,
                other => panic!("unexpected step {other:?}"),
            })
            .collect();
        prop_assert_eq!(units, stmts);
    }

    /// Trailing line comments never change the units.
    #[test]
    fn trailing_comments_are_ignored(
        stmts in prop::collection::vec(statement(), 1..10),
        note in "[a-zA-Z ]{0,16}",
    ) {
        let plain = stmts.join("\n");
        let commented = stmts
            .iter()
            .map(|s| format!("{s}  -- {note}"))
            .collect::<Vec<_>>()
            .join("\n");
        let a: Vec<_> = steps(&strip_comments(&plain)).map(Result::unwrap).collect();
        let b: Vec<_> = steps(&strip_comments(&commented)).map(Result::unwrap).collect();
        prop_assert_eq!(a, b);
    }

    /// No line comment marker survives stripping.
    #[test]
    fn no_line_comment_survives(buffer in "[a-zA-Z0-9 ;\\-/*\n]{0,80}") {
        let stripped = strip_comments(&buffer);
        prop_assert!(!stripped.contains("--"));
        prop_assert!(stripped.lines().count() <= buffer.lines().count().max(1));
    }
}
