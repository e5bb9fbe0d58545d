use rael::{
    ast::{ExprKind, InstructionKind, LoopKind},
    diagnostics::{DiagnosticKind, Position},
    parser::{parse_expression, parse_program},
    Source,
};

#[test]
fn parses_a_small_program() {
    let code = "\
:xs ?= {1, 2, 3}
loop :x through :xs {
    if :x = 2 skip
    log :x
}";
    let program = parse_program(Source::anonymous(code)).expect("parse should succeed");
    assert_eq!(program.instructions.len(), 2);
    match &program.instructions[1].kind {
        InstructionKind::Loop {
            kind: LoopKind::Through { key, condition, .. },
            body,
        } => {
            assert_eq!(key, "x");
            assert!(condition.is_none());
            assert_eq!(body.len(), 2);
        }
        other => panic!("expected a through loop, got {other:?}"),
    }
}

#[test]
fn lexer_errors_surface_through_the_parser() {
    let err = parse_program(Source::anonymous("log 1\nlog $")).expect_err("stray character");
    assert_eq!(err.kind, DiagnosticKind::Lexer);
    assert_eq!(err.position, Some(Position::new(10, 2, 5)));
}

#[test]
fn missing_block_after_catch_is_reported() {
    let err = parse_program(Source::anonymous("catch 1 log 2")).expect_err("no handler");
    assert_eq!(err.kind, DiagnosticKind::Parser);
    assert_eq!(err.message, "Expected a block after catch expression");
}

#[test]
fn standalone_expressions_accept_calls_and_members() {
    let expr = parse_expression(Source::anonymous(":Math:Max(1, 2)")).expect("parse");
    match expr.kind {
        ExprKind::Call { callee, args } => {
            assert_eq!(args.len(), 2);
            assert!(matches!(callee.kind, ExprKind::Member { ref key, .. } if key == "Max"));
        }
        other => panic!("expected a call, got {other:?}"),
    }
}
