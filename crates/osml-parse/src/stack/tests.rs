use super::*;
use crate::{
    CollectingLogger, DocumentHandler, NoConstants, NoSources, NodeType, State, StructureHandler,
    UserCallbacks, WILDCARD, default_state_graph,
};
use osml_tokenizer::SourceId;

fn loc(start: u32, end: u32) -> SourceLocation {
    SourceLocation::new(SourceId(0), start, end)
}

/// Open the root command, run `f` against the stack and collect the output.
fn drive(
    graph: &StateGraph,
    f: impl FnOnce(&mut ParserStack<'_>) -> Result<(), Error>,
) -> (Vec<String>, CollectingLogger) {
    let options = ParserOptions::default();
    let mut logger = CollectingLogger::new();
    let mut resolver = NoSources;
    let events = {
        let mut stack = ParserStack::new(graph, &options, &mut logger, &mut resolver, &NoConstants);
        stack
            .command_start("document", Map::new(), false, loc(0, 0))
            .unwrap();
        f(&mut stack).unwrap();
        stack.into_events()
    };
    (events.iter().map(ToString::to_string).collect(), logger)
}

/// `document > list > item`, nothing else.
fn list_graph() -> StateGraph {
    let mut builder = StateGraph::builder();
    let document = builder.add(
        State::new("document")
            .parent(StateId::NONE)
            .creates(NodeType::DOCUMENT)
            .handler(DocumentHandler::create),
    );
    let list = builder.add(
        State::new("list")
            .parent(document)
            .creates(NodeType::STRUCTURE)
            .creates(NodeType::FIELD)
            .handler(StructureHandler::create),
    );
    builder.add(
        State::new("item")
            .parent(list)
            .creates(NodeType::STRUCTURE)
            .creates(NodeType::FIELD)
            .handler(StructureHandler::create),
    );
    builder.build()
}

#[test]
fn test_implicit_default_field() {
    let graph = default_state_graph();
    let (lines, logger) = drive(&graph, |stack| {
        stack.command_start("a", Map::new(), false, loc(0, 2))?;
        stack.data("x", loc(3, 4))?;
        stack.end(loc(4, 4))
    });
    assert_eq!(
        lines,
        [
            "CommandStart a {} #0[0,2)",
            "FieldStart default #0[3,4)",
            "Data \"x\" #0[3,4)",
            "FieldEnd #0[4,4)",
            "End #0[4,4)"
        ]
    );
    assert!(logger.diagnostics().is_empty());
}

#[test]
fn test_unroll_to_parent() {
    let graph = list_graph();
    let (lines, logger) = drive(&graph, |stack| {
        stack.command_start("list", Map::new(), false, loc(0, 5))?;
        stack.command_start("item", Map::new(), false, loc(6, 11))?;
        stack.data("x", loc(12, 13))?;
        stack.command_start("item", Map::new(), false, loc(14, 19))?;
        stack.data("y", loc(20, 21))?;
        assert_eq!(stack.depth(), 3);
        assert_eq!(stack.current_name(), Some("item"));
        assert_eq!(
            stack.scope().signature(),
            [
                NodeType::DOCUMENT,
                NodeType::STRUCTURE,
                NodeType::FIELD,
                NodeType::STRUCTURE,
                NodeType::FIELD
            ]
        );
        stack.end(loc(21, 21))
    });
    assert_eq!(
        lines,
        [
            "CommandStart list {} #0[0,5)",
            "FieldStart default #0[6,11)",
            "CommandStart item {} #0[6,11)",
            "FieldStart default #0[12,13)",
            "Data \"x\" #0[12,13)",
            "FieldEnd #0[14,14)",
            "CommandStart item {} #0[14,19)",
            "FieldStart default #0[20,21)",
            "Data \"y\" #0[20,21)",
            "FieldEnd #0[21,21)",
            "FieldEnd #0[21,21)",
            "End #0[21,21)"
        ]
    );
    assert!(logger.diagnostics().is_empty());
}

#[test]
fn test_invalid_command_swallows_its_fields() {
    let graph = list_graph();
    let (lines, logger) = drive(&graph, |stack| {
        stack.command_start("bogus", Map::new(), false, loc(0, 6))?;
        stack.field_start(false, loc(6, 7))?;
        stack.data("hidden", loc(7, 13))?;
        stack.field_end(loc(13, 14))?;
        stack.data("y", loc(14, 15))?;
        stack.end(loc(15, 15))
    });
    assert_eq!(lines, ["Data \"y\" #0[14,15)", "End #0[15,15)"]);
    assert_eq!(logger.error_kinds(), [ErrorKind::InvalidCommand]);
    assert_eq!(
        logger.diagnostics()[0].message,
        "command \"bogus\" is not expected here, expected one of: list"
    );
}

#[test]
fn test_rejected_start_retries_further_out() {
    let mut builder = StateGraph::builder();
    let document = builder.add(
        State::new("document")
            .parent(StateId::NONE)
            .creates(NodeType::DOCUMENT)
            .handler(DocumentHandler::create),
    );
    let any = builder.add(
        State::new(WILDCARD)
            .parent(document)
            .creates(NodeType::STRUCTURE)
            .creates(NodeType::FIELD)
            .handler(StructureHandler::create),
    );
    builder.add_parent(any, any);
    // Only allowed directly inside the document. Output of a rejected
    // attempt is discarded.
    let strict = UserCallbacks::new().on_start(|info, ctx, args| {
        let location = ctx.location();
        ctx.emit(ParseEvent::CommandStart {
            name: info.name.clone(),
            args: args.clone(),
            range: false,
            location,
        });
        Ok(ctx
            .scope()
            .leaf()
            .is_some_and(|node| node.ty == NodeType::DOCUMENT))
    });
    builder.add(
        State::new("strict")
            .parent(document)
            .parent(any)
            .handler(strict.into_ctor()),
    );
    let graph = builder.build();

    let (lines, logger) = drive(&graph, |stack| {
        stack.command_start("a", Map::new(), false, loc(0, 2))?;
        stack.command_start("strict", Map::new(), false, loc(3, 10))?;
        assert_eq!(stack.depth(), 2);
        stack.end(loc(10, 10))
    });
    assert_eq!(
        lines,
        [
            "CommandStart a {} #0[0,2)",
            "FieldStart default #0[3,10)",
            "FieldEnd #0[3,3)",
            "CommandStart strict {} #0[3,10)",
            "End #0[10,10)"
        ]
    );
    assert!(logger.diagnostics().is_empty());
}

#[test]
fn test_unbalanced_field_start() {
    let graph = default_state_graph();
    let (lines, logger) = drive(&graph, |stack| {
        stack.data("a", loc(0, 1))?;
        stack.field_start(false, loc(1, 2))?;
        stack.data("b", loc(2, 3))?;
        stack.field_end(loc(3, 4))?;
        stack.end(loc(4, 4))
    });
    assert_eq!(lines, ["Data \"a\" #0[0,1)", "End #0[4,4)"]);
    assert_eq!(logger.error_kinds(), [ErrorKind::UnbalancedField]);
}

#[test]
fn test_unbalanced_field_end() {
    let graph = default_state_graph();
    let (lines, logger) = drive(&graph, |stack| {
        stack.data("a", loc(0, 1))?;
        stack.field_end(loc(1, 2))?;
        stack.end(loc(2, 2))
    });
    assert_eq!(lines, ["Data \"a\" #0[0,1)", "End #0[2,2)"]);
    assert_eq!(logger.error_kinds(), [ErrorKind::UnbalancedField]);
}

#[test]
fn test_field_after_default_field() {
    let graph = default_state_graph();
    let (lines, logger) = drive(&graph, |stack| {
        stack.command_start("a", Map::new(), false, loc(0, 2))?;
        stack.field_start(true, loc(2, 4))?;
        stack.data("x", loc(4, 5))?;
        stack.field_end(loc(5, 6))?;
        stack.field_start(false, loc(6, 7))?;
        stack.data("y", loc(7, 8))?;
        stack.field_end(loc(8, 9))?;
        stack.end(loc(9, 9))
    });
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
    assert_eq!(logger.error_kinds(), [ErrorKind::FieldAfterDefault]);
}

#[test]
fn test_range_end_closes_nested_commands() {
    let graph = default_state_graph();
    let (lines, logger) = drive(&graph, |stack| {
        stack.command_start("a", Map::new(), true, loc(0, 9))?;
        stack.field_start(true, loc(9, 9))?;
        stack.command_start("b", Map::new(), false, loc(9, 11))?;
        stack.data("y", loc(12, 13))?;
        stack.range_end(loc(13, 20))?;
        assert_eq!(stack.depth(), 1);
        stack.end(loc(20, 20))
    });
    assert_eq!(
        lines,
        [
            "CommandStart a {} range #0[0,9)",
            "FieldStart default #0[9,9)",
            "CommandStart b {} #0[9,11)",
            "FieldStart default #0[12,13)",
            "Data \"y\" #0[12,13)",
            "FieldEnd #0[13,13)",
            "FieldEnd #0[13,13)",
            "End #0[20,20)"
        ]
    );
    assert!(logger.diagnostics().is_empty());
}

#[test]
fn test_unended_range() {
    let graph = default_state_graph();
    let (lines, logger) = drive(&graph, |stack| {
        stack.command_start("a", Map::new(), true, loc(0, 9))?;
        stack.field_start(true, loc(9, 9))?;
        stack.data("x", loc(9, 10))?;
        stack.end(loc(10, 10))
    });
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
    assert_eq!(logger.error_kinds(), [ErrorKind::UnexpectedEnd]);
    assert_eq!(
        logger.diagnostics()[0].message,
        "reached the end of input, but \\begin{a} was never ended"
    );
}

#[test]
fn test_annotation_spans_commands() {
    let graph = default_state_graph();
    let (lines, logger) = drive(&graph, |stack| {
        stack.annotation_start("a", Map::new(), false, loc(0, 3))?;
        stack.data("x", loc(4, 5))?;
        stack.command_start("b", Map::new(), false, loc(6, 8))?;
        stack.data("y", loc(9, 10))?;
        stack.annotation_end("a", Map::new(), loc(11, 14))?;
        assert_eq!(stack.depth(), 1);
        stack.end(loc(14, 14))
    });
    assert_eq!(
        lines,
        [
            "AnnotationStart a {} #0[0,3)",
            "Data \"x\" #0[4,5)",
            "CommandStart b {} #0[6,8)",
            "FieldStart default #0[9,10)",
            "Data \"y\" #0[9,10)",
            "FieldEnd #0[11,11)",
            "AnnotationEnd \"a\" {} #0[11,14)",
            "End #0[14,14)"
        ]
    );
    assert!(logger.diagnostics().is_empty());
}

#[test]
fn test_annotation_must_not_cross_fields() {
    let graph = default_state_graph();
    let (lines, logger) = drive(&graph, |stack| {
        stack.annotation_start("a", Map::new(), false, loc(0, 3))?;
        stack.command_start("b", Map::new(), false, loc(4, 6))?;
        stack.field_start(false, loc(6, 7))?;
        stack.data("x", loc(8, 9))?;
        stack.annotation_end("a", Map::new(), loc(10, 13))?;
        stack.field_end(loc(14, 15))?;
        stack.end(loc(15, 15))
    });
    assert_eq!(
        lines,
        [
            "AnnotationStart a {} #0[0,3)",
            "CommandStart b {} #0[4,6)",
            "FieldStart #0[6,7)",
            "Data \"x\" #0[8,9)",
            "FieldEnd #0[14,15)",
            "End #0[15,15)"
        ]
    );
    assert_eq!(logger.error_kinds(), [ErrorKind::AnnotationMismatch]);
}

#[test]
fn test_annotation_end_without_start() {
    let graph = default_state_graph();
    let (lines, logger) = drive(&graph, |stack| {
        stack.annotation_end("", Map::new(), loc(0, 2))?;
        stack.annotation_end("z", Map::new(), loc(2, 5))?;
        stack.end(loc(5, 5))
    });
    assert_eq!(lines, ["End #0[5,5)"]);
    assert_eq!(
        logger.error_kinds(),
        [ErrorKind::AnnotationMismatch, ErrorKind::AnnotationMismatch]
    );
}

#[test]
fn test_unended_annotation() {
    let graph = default_state_graph();
    let (lines, logger) = drive(&graph, |stack| {
        stack.annotation_start("a", Map::new(), false, loc(0, 3))?;
        stack.end(loc(3, 3))
    });
    assert_eq!(lines, ["AnnotationStart a {} #0[0,3)", "End #0[3,3)"]);
    assert_eq!(logger.error_kinds(), [ErrorKind::UnexpectedEnd]);
}

#[test]
fn test_annotations_not_allowed() {
    let graph = list_graph();
    let (lines, logger) = drive(&graph, |stack| {
        stack.annotation_start("list", Map::new(), false, loc(0, 6))?;
        stack.end(loc(6, 6))
    });
    assert_eq!(lines, ["End #0[6,6)"]);
    assert_eq!(logger.error_kinds(), [ErrorKind::InvalidCommand]);
}

#[test]
fn test_user_tokens() {
    let callbacks = UserCallbacks::new()
        .on_start(|_, ctx, _| {
            ctx.register_token("**");
            Ok(true)
        })
        .on_token_start(|_, _, _| Ok(true))
        .on_token_end(|_, _, _| Ok(EndTokenResult::EndedThis))
        .on_data(|_, ctx, content| {
            let location = ctx.location();
            ctx.emit(ParseEvent::Data {
                content: content.to_string(),
                location,
            });
            Ok(true)
        });
    let mut builder = StateGraph::builder();
    builder.add(
        State::new("document")
            .parent(StateId::NONE)
            .handler(callbacks.into_ctor())
            .supports_tokens(true),
    );
    let graph = builder.build();

    let mut strong = TokenId::EMPTY;
    let (lines, logger) = drive(&graph, |stack| {
        strong = stack.tokenizer().token_id("**");
        assert!(strong.is_user());
        stack.data("a", loc(0, 1))?;
        stack.token(strong, loc(1, 3))?;
        stack.data("b", loc(3, 4))?;
        stack.token(strong, loc(4, 6))?;
        stack.end(loc(6, 6))
    });
    assert_eq!(
        lines,
        [
            "Data \"a\" #0[0,1)".to_string(),
            format!("TokenStart {strong} #0[1,3)"),
            "Data \"b\" #0[3,4)".to_string(),
            format!("TokenEnd {strong} #0[4,6)"),
            "End #0[6,6)".to_string(),
        ]
    );
    assert!(logger.diagnostics().is_empty());
}

#[test]
fn test_unclaimed_token_is_data() {
    let graph = default_state_graph();
    let (lines, logger) = drive(&graph, |stack| {
        let id = stack.tokenizer_mut().register_token("~~");
        stack.token(id, loc(0, 2))?;
        stack.end(loc(2, 2))
    });
    assert_eq!(lines, ["Data \"~~\" #0[0,2)", "End #0[2,2)"]);
    assert!(logger.diagnostics().is_empty());
}

#[test]
fn test_frame_tokens_are_released() {
    let callbacks = UserCallbacks::new().on_start(|_, ctx, _| {
        ctx.register_token("==");
        Ok(true)
    });
    let mut builder = StateGraph::builder();
    let document = builder.add(
        State::new("document")
            .parent(StateId::NONE)
            .handler(DocumentHandler::create),
    );
    builder.add(
        State::new("marked")
            .parent(document)
            .handler(callbacks.into_ctor()),
    );
    let graph = builder.build();

    drive(&graph, |stack| {
        stack.command_start("marked", Map::new(), false, loc(0, 7))?;
        assert!(stack.tokenizer().token_id("==").is_user());
        stack.end(loc(7, 7))?;
        assert!(stack.tokenizer().token_id("==").is_empty());
        Ok(())
    });
}
