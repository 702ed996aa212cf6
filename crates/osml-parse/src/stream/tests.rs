use super::*;
use crate::CollectingLogger;
use osml_tokenizer::SourceId;
use proptest::prelude::*;

fn parse_with(input: &str, options: &ParserOptions) -> (Vec<String>, Vec<ErrorKind>) {
    let mut tokenizer = Tokenizer::default();
    let mut logger = CollectingLogger::new();
    let reader = SourceReader::from_bytes(SourceId(0), input.as_bytes().to_vec());
    let mut parser = OsmlStreamParser::new(reader, &mut tokenizer, options);
    let events = parser.parse_to_vec(&tokenizer, &mut logger).unwrap();
    assert!(parser.is_finished());
    let lines = events.iter().map(ToString::to_string).collect();
    (lines, logger.error_kinds())
}

fn parse(input: &str) -> (Vec<String>, Vec<ErrorKind>) {
    parse_with(input, &ParserOptions::default())
}

/// Parse input that must not produce any diagnostics.
fn events(input: &str) -> Vec<String> {
    let (lines, errors) = parse(input);
    assert!(errors.is_empty(), "unexpected errors {errors:?} for {input:?}");
    lines
}

#[test]
fn test_collapsed_data() {
    assert_eq!(
        events(" hello \t world "),
        ["Data \"hello world\" #0[1,14)", "End #0[15,15)"]
    );
}

#[test]
fn test_block_comment_splits_data() {
    assert_eq!(
        events("a%{ c\n\n d}%b"),
        ["Data \"a\" #0[0,1)", "Data \"b\" #0[11,12)", "End #0[12,12)"]
    );
}

#[test]
fn test_command_with_name_and_arguments() {
    assert_eq!(
        events("\\test#bla[a=1,b=2]"),
        [
            "CommandStart test {a=1, b=2, name=\"bla\"} #0[0,5)",
            "End #0[18,18)"
        ]
    );
}

#[test]
fn test_begin_end() {
    assert_eq!(
        events("\\begin{book}a\\end{book}"),
        [
            "CommandStart book {} range #0[0,12)",
            "FieldStart default #0[12,12)",
            "Data \"a\" #0[12,13)",
            "FieldEnd #0[13,23)",
            "End #0[23,23)"
        ]
    );
}

#[test]
fn test_annotation_start_followed_by_text() {
    assert_eq!(
        events("<\\a>"),
        [
            "AnnotationStart a {} #0[0,3)",
            "Data \">\" #0[3,4)",
            "End #0[4,4)"
        ]
    );
}

#[test]
fn test_annotation_with_fields() {
    assert_eq!(
        events("<\\b{c}{d}{!e} f \\>"),
        [
            "AnnotationStart b {} #0[0,3)",
            "FieldStart #0[3,4)",
            "Data \"c\" #0[4,5)",
            "FieldEnd #0[5,6)",
            "FieldStart #0[6,7)",
            "Data \"d\" #0[7,8)",
            "FieldEnd #0[8,9)",
            "FieldStart default #0[9,11)",
            "Data \"e\" #0[11,12)",
            "FieldEnd #0[12,13)",
            "Data \"f\" #0[14,15)",
            "AnnotationEnd \"\" {} #0[16,18)",
            "End #0[18,18)"
        ]
    );
}

#[test]
fn test_named_annotation_end() {
    assert_eq!(
        events("\\a#x>"),
        ["AnnotationEnd \"a\" {name=\"x\"} #0[0,5)", "End #0[5,5)"]
    );
}

#[test]
fn test_escapes() {
    assert_eq!(events("a\\{b\\}"), ["Data \"a{b}\" #0[0,6)", "End #0[6,6)"]);
    assert_eq!(events("\\é"), ["Data \"é\" #0[1,3)", "End #0[3,3)"]);
}

#[test]
fn test_whitespace_before_field_is_dropped() {
    let expected = [
        "CommandStart a {} #0[0,2)",
        "FieldStart #0[3,4)",
        "Data \"b\" #0[4,5)",
        "FieldEnd #0[5,6)",
        "End #0[6,6)",
    ];
    for mode in [WhitespaceMode::Preserve, WhitespaceMode::Trim, WhitespaceMode::Collapse] {
        let options = ParserOptions::default().with_whitespace(mode);
        let (lines, errors) = parse_with("\\a {b}", &options);
        assert!(errors.is_empty());
        assert_eq!(lines, expected, "{mode:?}");
    }
}

#[test]
fn test_line_comment() {
    assert_eq!(
        events("a % c\nb"),
        ["Data \"a\" #0[0,1)", "Data \"b\" #0[6,7)", "End #0[7,7)"]
    );
}

#[test]
fn test_nested_block_comment() {
    assert_eq!(
        events("a%{ %{ x }% y }%b"),
        ["Data \"a\" #0[0,1)", "Data \"b\" #0[16,17)", "End #0[17,17)"]
    );
}

#[test]
fn test_unclosed_block_comment() {
    let (lines, errors) = parse("a%{ b");
    assert_eq!(lines, ["Data \"a\" #0[0,1)", "End #0[5,5)"]);
    assert_eq!(errors, [ErrorKind::UnexpectedEnd]);
}

#[test]
fn test_brace_comment_outside_block_comment() {
    assert_eq!(
        events("\\a{x}% c\ny"),
        [
            "CommandStart a {} #0[0,2)",
            "FieldStart #0[2,3)",
            "Data \"x\" #0[3,4)",
            "FieldEnd #0[4,5)",
            "Data \"y\" #0[9,10)",
            "End #0[10,10)"
        ]
    );
}

#[test]
fn test_unbalanced_braces() {
    let (lines, errors) = parse("a}");
    assert_eq!(lines, ["Data \"a\" #0[0,1)", "End #0[2,2)"]);
    assert_eq!(errors, [ErrorKind::UnbalancedField]);

    let (lines, errors) = parse("{a");
    assert_eq!(lines, ["End #0[2,2)"]);
    assert_eq!(errors, [ErrorKind::UnbalancedField]);
}

#[test]
fn test_field_after_default_field() {
    let (lines, errors) = parse("\\a{!x}{y}");
    assert_eq!(
        lines,
        [
            "CommandStart a {} #0[0,2)",
            "FieldStart default #0[2,4)",
            "Data \"x\" #0[4,5)",
            "FieldEnd #0[5,6)",
            "End #0[9,9)"
        ]
    );
    assert_eq!(errors, [ErrorKind::FieldAfterDefault]);
}

#[test]
fn test_misplaced_field_swallows_commands() {
    let (lines, errors) = parse("\\a{!y}{\\b{z}} w");
    assert_eq!(
        lines,
        [
            "CommandStart a {} #0[0,2)",
            "FieldStart default #0[2,4)",
            "Data \"y\" #0[4,5)",
            "FieldEnd #0[5,6)",
            "Data \"w\" #0[14,15)",
            "End #0[15,15)"
        ]
    );
    assert_eq!(errors, [ErrorKind::FieldAfterDefault]);

    let (lines, errors) = parse("{<\\x \\y{z}} w");
    assert_eq!(lines, ["Data \"w\" #0[12,13)", "End #0[13,13)"]);
    assert_eq!(errors, [ErrorKind::UnbalancedField]);
}

#[test]
fn test_mismatched_end() {
    let (lines, errors) = parse("\\begin{a}\\end{b}\\end{a}");
    assert_eq!(
        lines,
        [
            "CommandStart a {} range #0[0,9)",
            "FieldStart default #0[9,9)",
            "FieldEnd #0[16,23)",
            "End #0[23,23)"
        ]
    );
    assert_eq!(errors, [ErrorKind::InvalidCommand]);

    let (lines, errors) = parse("\\end{b}");
    assert_eq!(lines, ["End #0[7,7)"]);
    assert_eq!(errors, [ErrorKind::InvalidCommand]);
}

#[test]
fn test_unended_range() {
    let (lines, errors) = parse("\\begin{a}x");
    assert_eq!(
        lines,
        [
            "CommandStart a {} range #0[0,9)",
            "FieldStart default #0[9,9)",
            "Data \"x\" #0[9,10)",
            "FieldEnd #0[10,10)",
            "End #0[10,10)"
        ]
    );
    assert_eq!(errors, [ErrorKind::UnexpectedEnd]);
}

#[test]
fn test_invalid_identifiers() {
    let (lines, errors) = parse("a\\");
    assert_eq!(lines, ["Data \"a\" #0[0,1)", "End #0[2,2)"]);
    assert_eq!(errors, [ErrorKind::InvalidIdentifier]);

    let (_, errors) = parse("<\\ x");
    assert_eq!(errors, [ErrorKind::InvalidIdentifier]);

    let (_, errors) = parse("\\begin x");
    assert_eq!(errors, [ErrorKind::InvalidIdentifier]);
}

#[test]
fn test_bad_arguments() {
    let (lines, errors) = parse("\\a[b=1,b=2]");
    assert_eq!(lines, ["CommandStart a {} #0[0,2)", "End #0[11,11)"]);
    assert_eq!(errors, [ErrorKind::ArgumentValidation]);

    let (_, errors) = parse("\\a[b=1");
    assert_eq!(errors, [ErrorKind::UnexpectedEnd]);
}

#[test]
fn test_user_token() {
    let mut tokenizer = Tokenizer::default();
    let strong = tokenizer.register_token("**");
    let mut logger = CollectingLogger::new();
    let reader = SourceReader::from_bytes(SourceId(0), b"a**b".to_vec());
    let mut parser = OsmlStreamParser::new(reader, &mut tokenizer, &ParserOptions::default());
    let events = parser.parse_to_vec(&tokenizer, &mut logger).unwrap();
    let lines: Vec<String> = events.iter().map(ToString::to_string).collect();
    assert_eq!(
        lines,
        [
            "Data \"a\" #0[0,1)".to_string(),
            format!("TokenStart {strong} #0[1,3)"),
            "Data \"b\" #0[3,4)".to_string(),
            "End #0[4,4)".to_string(),
        ]
    );
}

#[test]
fn test_pushed_input() {
    let mut tokenizer = Tokenizer::default();
    let mut logger = CollectingLogger::new();
    let mut reader = SourceReader::new(SourceId(0));
    reader.feed(b"\\begin{bo");
    let mut parser = OsmlStreamParser::new(reader, &mut tokenizer, &ParserOptions::default());

    assert_eq!(parser.next_event(&tokenizer, &mut logger).unwrap(), None);
    assert!(!parser.is_finished());

    parser.reader_mut().feed(b"ok}a\\end{book}");
    parser.reader_mut().close();
    let events = parser.parse_to_vec(&tokenizer, &mut logger).unwrap();
    let lines: Vec<String> = events.iter().map(ToString::to_string).collect();
    assert_eq!(
        lines,
        [
            "CommandStart book {} range #0[0,12)",
            "FieldStart default #0[12,12)",
            "Data \"a\" #0[12,13)",
            "FieldEnd #0[13,23)",
            "End #0[23,23)"
        ]
    );
    assert!(logger.diagnostics().is_empty());
}

#[test]
fn test_is_identifier() {
    for name in ["a", "a:b", "_x-1", "ns:sub:name"] {
        assert!(is_identifier(name), "{name}");
    }
    for name in ["", "1a", "a:", ":a", "a::b", "a b"] {
        assert!(!is_identifier(name), "{name}");
    }
}

proptest! {
    #[test]
    fn fields_are_balanced(input in "[a-c\\\\{}!%<>#=,\\[\\] \n]{0,40}") {
        let (lines, _) = parse(&input);
        let starts = lines.iter().filter(|l| l.starts_with("FieldStart")).count();
        let ends = lines.iter().filter(|l| l.starts_with("FieldEnd")).count();
        prop_assert_eq!(starts, ends);
        prop_assert_eq!(lines.iter().filter(|l| l.starts_with("End ")).count(), 1);
        prop_assert!(lines.last().is_some_and(|l| l.starts_with("End ")));
    }
}
