//! Constant folding: literal expressions reduce at compile time and emit
//! no code, and the `compute` entry point agrees with the compile path.

use stave_common::ErrorKind;
use stave_expr::Lit;

mod common;
use common::Fixture;

#[test]
fn literal_arithmetic_folds_to_one_operand() {
    let mut fx = Fixture::new();
    let result = fx.compile("1 + 2 * 3").unwrap();
    assert_eq!(result.lit_value(), Some(Lit::Int(7)));
    assert!(fx.code().is_empty(), "no instructions for a folded expression");
}

#[test]
fn compile_and_compute_agree() {
    let mut fx = Fixture::new();
    let compiled = fx.compile("2 + 3").unwrap();
    assert_eq!(compiled.lit_value(), Some(Lit::Int(5)));
    let mut fx = Fixture::new();
    let computed = fx.compute("2 + 3").unwrap();
    assert_eq!(computed.lit_value(), Some(Lit::Int(5)));
}

#[test]
fn parenthesized_groups_fold() {
    let mut fx = Fixture::new();
    let result = fx.compile("(1 + 2) * (3 + 4)").unwrap();
    assert_eq!(result.lit_value(), Some(Lit::Int(21)));
    assert!(fx.code().is_empty());
}

#[test]
fn adding_zero_to_a_variable_is_not_simplified() {
    let mut fx = Fixture::new();
    fx.declare("x", "int", true);
    let result = fx.compile("x + 0").unwrap();
    assert!(!result.is_lit_value(), "no algebraic simplification");
    assert_eq!(fx.opcodes(), vec!["ADD"]);
}

#[test]
fn cast_chain_folds_through_char() {
    let mut fx = Fixture::new();
    let result = fx.compile("(int)(char)65").unwrap();
    assert_eq!(result.lit_value(), Some(Lit::Int(65)));
    assert!(fx.code().is_empty());
}

#[test]
fn repeated_cast_is_the_same_as_one() {
    let mut fx = Fixture::new();
    let once = fx.compile("(long)7").unwrap();
    let mut fx = Fixture::new();
    let twice = fx.compile("(long)(long)7").unwrap();
    assert_eq!(once.lit_value(), twice.lit_value());
    assert_eq!(once.lit_value(), Some(Lit::Lon(7)));
}

#[test]
fn mixed_widths_promote_to_the_maximum() {
    let mut fx = Fixture::new();
    let result = fx.compile("2 * 3L").unwrap();
    assert_eq!(result.lit_value(), Some(Lit::Lon(6)));
}

#[test]
fn float_arithmetic_folds() {
    let mut fx = Fixture::new();
    let result = fx.compile("1.5 + 2.5").unwrap();
    assert_eq!(result.lit_value(), Some(Lit::Flo(4.0)));
}

#[test]
fn comparisons_and_logic_fold_to_booleans() {
    let mut fx = Fixture::new();
    assert_eq!(fx.compile("2 < 3").unwrap().lit_value(), Some(Lit::Bol(true)));
    assert_eq!(
        fx.compile("true && false").unwrap().lit_value(),
        Some(Lit::Bol(false))
    );
    assert_eq!(
        fx.compile("!false || false").unwrap().lit_value(),
        Some(Lit::Bol(true))
    );
    assert!(fx.code().is_empty());
}

#[test]
fn string_literals_concatenate_and_compare() {
    let mut fx = Fixture::new();
    let result = fx.compile("\"he\" + \"llo\"").unwrap();
    let adr = match result.lit_value() {
        Some(Lit::Str(adr)) => adr,
        other => panic!("expected a string literal, got {other:?}"),
    };
    assert_eq!(fx.writer.lit_string_at(adr), Some("hello"));
    assert_eq!(
        fx.compile("\"abc\" == \"abc\"").unwrap().lit_value(),
        Some(Lit::Bol(true))
    );
    assert!(fx.code().is_empty());
}

#[test]
fn overflow_reports_the_failing_operation() {
    let mut fx = Fixture::new();
    let err = fx.compile("2147483647 * 2").unwrap_err();
    assert_eq!(
        err.to_string(),
        "overflow multiplying 2147483647 * 2 as Integer"
    );
}

#[test]
fn division_and_modulo_by_zero_are_errors() {
    let mut fx = Fixture::new();
    assert_eq!(
        fx.compile("1 / 0").unwrap_err().kind,
        ErrorKind::DivisionByZero
    );
    assert_eq!(
        fx.compile("1 % 0").unwrap_err().kind,
        ErrorKind::ModuloByZero
    );
}

#[test]
fn float_division_by_zero_is_a_float_exception() {
    let mut fx = Fixture::new();
    let err = fx.compile("1.0 / 0.0").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::FloatException(_)));
}

#[test]
fn compute_refuses_non_literal_operands() {
    let mut fx = Fixture::new();
    fx.declare("x", "int", true);
    let err = fx.compute("x + 1").unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotComputable);
}

#[test]
fn compute_refuses_assignments() {
    let mut fx = Fixture::new();
    fx.declare("x", "int", true);
    let err = fx.compute("x = 1").unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotComputable);
}

#[test]
fn shift_folds_and_range_checks_the_count() {
    let mut fx = Fixture::new();
    assert_eq!(fx.compile("1 << 4").unwrap().lit_value(), Some(Lit::Int(16)));
    let err = fx.compile("1 << 40").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::FoldOverflow { .. }));
}
